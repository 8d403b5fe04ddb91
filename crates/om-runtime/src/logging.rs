use std::fmt::Display;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, fmt, reload};

static SINK: OnceLock<reload::Handle<LevelFilter, Registry>> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LogError {
    #[error("cannot install the log sink: {0}")]
    Install(String),
    #[error(transparent)]
    Reload(#[from] reload::Error),
}

/// Logger handed to operators. Every instance writes to the same
/// process-wide sink under the `operator` target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatorLogger;

impl OperatorLogger {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn info(&self, msg: impl Display) {
        tracing::info!(target: "operator", "{msg}");
    }

    pub fn debug(&self, msg: impl Display) {
        tracing::debug!(target: "operator", "{msg}");
    }

    pub fn warning(&self, msg: impl Display) {
        tracing::warn!(target: "operator", "{msg}");
    }

    pub fn error(&self, msg: impl Display) {
        tracing::error!(target: "operator", "{msg}");
    }

    /// Configure the process-wide sink to emit timestamped, leveled lines at
    /// `level` and above.
    ///
    /// This is global state: the first call installs the subscriber, later
    /// calls (from any logger, any `MockApi`) only swap its level. Fails if a
    /// different global subscriber was installed first.
    pub fn add_handler(&self, level: Level) -> Result<(), LogError> {
        install_sink(LevelFilter::from_level(level))
    }

    /// Level of the installed sink, if any.
    #[must_use]
    pub fn sink_level() -> Option<LevelFilter> {
        SINK.get().and_then(|handle| handle.clone_current())
    }
}

fn install_sink(level: LevelFilter) -> Result<(), LogError> {
    if let Some(handle) = SINK.get() {
        handle.modify(|filter| *filter = level)?;
        return Ok(());
    }

    let (filter, handle) = reload::Layer::new(level);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|err| LogError::Install(err.to_string()))?;

    SINK.set(handle)
        .map_err(|_| LogError::Install("log sink handle was already stored".to_owned()))
}

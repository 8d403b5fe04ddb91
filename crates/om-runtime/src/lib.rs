#![forbid(unsafe_code)]

//! Stand-in for the host runtime API an operator receives at construction.
//!
//! Operators are written against [`OperatorApi`]. Under test they get a
//! [`MockApi`], which records every outbound message instead of routing it
//! and accepts (then drops) every lifecycle hook registration.

use std::path::Path;
use std::time::Duration;

use om_message::Message;

pub mod config;
pub mod logging;

pub use config::{ConfigError, DESCRIPTOR_FILE, OperatorConfig, TYPE_KEY};
pub use logging::{LogError, OperatorLogger};

pub type PortCallback = Box<dyn FnMut(Message)>;
pub type Generator = Box<dyn FnMut()>;
pub type TimerCallback = Box<dyn FnMut()>;
pub type ShutdownHandler = Box<dyn FnOnce()>;

/// Data an operator can put on an output port.
#[derive(Debug, Clone, PartialEq)]
pub enum SendData {
    Text(String),
    Message(Message),
}

impl SendData {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Message(_) => None,
        }
    }

    #[must_use]
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(msg) => Some(msg),
            Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Message(_) => "message",
        }
    }
}

impl From<Message> for SendData {
    fn from(value: Message) -> Self {
        Self::Message(value)
    }
}

impl From<String> for SendData {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SendData {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// One outbound send, kept for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRecord {
    pub port: String,
    pub data: SendData,
}

/// Capabilities the host runtime offers an operator.
pub trait OperatorApi {
    fn config(&self) -> &OperatorConfig;

    fn logger(&self) -> &OperatorLogger;

    fn send(&mut self, port: &str, data: SendData);

    /// Register `callback` for messages arriving on `ports`.
    fn set_port_callback(&mut self, ports: &[&str], callback: PortCallback);

    fn add_generator(&mut self, generator: Generator);

    fn add_timer(&mut self, period: Duration, callback: TimerCallback);

    fn add_shutdown_handler(&mut self, handler: ShutdownHandler);

    fn send_message(&mut self, port: &str, msg: Message)
    where
        Self: Sized,
    {
        self.send(port, SendData::Message(msg));
    }

    fn send_text(&mut self, port: &str, text: impl Into<String>)
    where
        Self: Sized,
    {
        self.send(port, SendData::Text(text.into()));
    }
}

impl<A: OperatorApi + ?Sized> OperatorApi for &mut A {
    fn config(&self) -> &OperatorConfig {
        (**self).config()
    }

    fn logger(&self) -> &OperatorLogger {
        (**self).logger()
    }

    fn send(&mut self, port: &str, data: SendData) {
        (**self).send(port, data);
    }

    fn set_port_callback(&mut self, ports: &[&str], callback: PortCallback) {
        (**self).set_port_callback(ports, callback);
    }

    fn add_generator(&mut self, generator: Generator) {
        (**self).add_generator(generator);
    }

    fn add_timer(&mut self, period: Duration, callback: TimerCallback) {
        (**self).add_timer(period, callback);
    }

    fn add_shutdown_handler(&mut self, handler: ShutdownHandler) {
        (**self).add_shutdown_handler(handler);
    }
}

/// Capturing [`OperatorApi`]. Owns its capture buffer, so one instance per
/// test case keeps cases isolated. Logging is the exception: see
/// [`OperatorLogger::add_handler`].
#[derive(Debug)]
pub struct MockApi {
    config: OperatorConfig,
    logger: OperatorLogger,
    captured: Vec<CaptureRecord>,
    print_send_msg: bool,
}

impl MockApi {
    /// Load the operator's `operator.json` from the directory of
    /// `source_path`. Any descriptor problem aborts construction.
    pub fn new(source_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = OperatorConfig::load(source_path)?;
        tracing::debug!(keys = config.len(), "loaded operator config");
        Ok(Self::from_config(config))
    }

    #[must_use]
    pub fn from_config(config: OperatorConfig) -> Self {
        Self {
            config,
            logger: OperatorLogger::new(),
            captured: Vec::new(),
            print_send_msg: true,
        }
    }

    #[must_use]
    pub fn captured(&self) -> &[CaptureRecord] {
        &self.captured
    }

    /// Data sent on `port`, in send order.
    pub fn captured_on<'a>(&'a self, port: &'a str) -> impl Iterator<Item = &'a SendData> + 'a {
        self.captured
            .iter()
            .filter(move |record| record.port == port)
            .map(|record| &record.data)
    }

    pub fn take_captured(&mut self) -> Vec<CaptureRecord> {
        std::mem::take(&mut self.captured)
    }

    pub fn clear_captured(&mut self) {
        self.captured.clear();
    }

    #[must_use]
    pub fn print_send_msg(&self) -> bool {
        self.print_send_msg
    }

    /// Toggle echoing each send to stdout.
    pub fn set_print_send_msg(&mut self, enabled: bool) {
        self.print_send_msg = enabled;
    }
}

impl OperatorApi for MockApi {
    fn config(&self) -> &OperatorConfig {
        &self.config
    }

    fn logger(&self) -> &OperatorLogger {
        &self.logger
    }

    // ports are not checked against any declared interface
    fn send(&mut self, port: &str, data: SendData) {
        tracing::debug!(port, kind = data.kind(), "captured send");
        if self.print_send_msg {
            println!("{}", render_send(port, &data));
        }
        self.captured.push(CaptureRecord {
            port: port.to_owned(),
            data,
        });
    }

    // The hooks below are inert: the mock never schedules or invokes them.

    fn set_port_callback(&mut self, ports: &[&str], _callback: PortCallback) {
        tracing::trace!(?ports, "ignoring port callback registration");
    }

    fn add_generator(&mut self, _generator: Generator) {
        tracing::trace!("ignoring generator registration");
    }

    fn add_timer(&mut self, period: Duration, _callback: TimerCallback) {
        tracing::trace!(?period, "ignoring timer registration");
    }

    fn add_shutdown_handler(&mut self, _handler: ShutdownHandler) {
        tracing::trace!("ignoring shutdown handler registration");
    }
}

/// Human-readable line(s) for one send. Not a stable format.
#[must_use]
pub fn render_send(port: &str, data: &SendData) -> String {
    match data {
        SendData::Text(text) => format!("PORT {port}: {text}"),
        SendData::Message(msg) => format!(
            "PORT {port}: \nattributes: {}\nbody: {}",
            msg.attributes(),
            msg.body()
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;
    use std::time::Duration;

    use om_message::{Body, Message};
    use serde_json::json;

    use super::{
        CaptureRecord, ConfigError, MockApi, OperatorApi, OperatorConfig, SendData, render_send,
    };

    fn quiet_api() -> MockApi {
        let config = OperatorConfig::from_descriptor(json!({"config": {"$type": "X", "threshold": 5}}))
            .expect("config");
        let mut api = MockApi::from_config(config);
        api.set_print_send_msg(false);
        api
    }

    struct Forwarder<A> {
        api: A,
    }

    impl<A: OperatorApi> Forwarder<A> {
        fn on_input(&mut self, msg: Message) {
            let threshold = self.api.config().get_as::<i64>("threshold").unwrap_or_default();
            self.api.logger().debug(format_args!("forwarding at {threshold}"));
            self.api.send_message("output", msg);
            self.api.send_text("log", format!("threshold={threshold}"));
        }
    }

    #[test]
    fn sends_are_appended_in_call_order() {
        let mut api = quiet_api();
        api.send("a", "first".into());
        api.send("b", Message::from_body(json!(2)).into());
        api.send("a", "third".into());

        assert_eq!(api.captured().len(), 3);
        assert_eq!(
            api.captured()[1],
            CaptureRecord {
                port: "b".to_owned(),
                data: SendData::Message(Message::from_body(json!(2))),
            }
        );
        let on_a = api
            .captured_on("a")
            .filter_map(SendData::as_text)
            .collect::<Vec<_>>();
        assert_eq!(on_a, vec!["first", "third"]);
    }

    #[test]
    fn operator_can_borrow_the_mock() {
        let mut api = quiet_api();
        {
            let mut op = Forwarder { api: &mut api };
            op.on_input(Message::from_body(Body::Bytes(b"raw".to_vec())));
        }

        let records = api.take_captured();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].port, "output");
        assert_eq!(records[1].data.as_text(), Some("threshold=5"));
        assert!(api.captured().is_empty());
    }

    #[test]
    fn lifecycle_hooks_are_accepted_and_never_invoked() {
        let fired = Rc::new(Cell::new(false));
        let mut api = quiet_api();

        let flag = Rc::clone(&fired);
        api.set_port_callback(&["input"], Box::new(move |_msg| flag.set(true)));
        let flag = Rc::clone(&fired);
        api.add_generator(Box::new(move || flag.set(true)));
        let flag = Rc::clone(&fired);
        api.add_timer(Duration::from_millis(1), Box::new(move || flag.set(true)));
        let flag = Rc::clone(&fired);
        api.add_shutdown_handler(Box::new(move || flag.set(true)));

        assert!(!fired.get());
        assert!(api.captured().is_empty());
    }

    #[test]
    fn render_send_distinguishes_text_and_messages() {
        assert_eq!(render_send("out", &"hello".into()), "PORT out: hello");
        let msg = Message::new(Body::Value(json!("x")), json!({"a": 1}));
        assert_eq!(
            render_send("out", &msg.into()),
            "PORT out: \nattributes: {\"a\":1}\nbody: \"x\""
        );
    }

    #[test]
    fn clear_resets_the_buffer_and_printing_is_on_by_default() {
        let mut api = MockApi::from_config(OperatorConfig::default());
        assert!(api.print_send_msg());
        api.set_print_send_msg(false);
        api.send("p", "x".into());
        api.clear_captured();
        assert!(api.captured().is_empty());
    }

    #[test]
    fn new_loads_descriptor_and_fails_fast_without_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("operator.rs");
        let err = MockApi::new(&source).expect_err("no descriptor");
        assert!(matches!(err, ConfigError::Read { .. }));

        fs::write(
            dir.path().join("operator.json"),
            r#"{"config": {"$type": "X", "threshold": 5}}"#,
        )
        .expect("write");
        let api = MockApi::new(&source).expect("api");
        assert_eq!(api.config().get("threshold"), Some(&json!(5)));
        assert!(!api.config().contains("$type"));
    }
}

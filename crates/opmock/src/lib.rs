#![forbid(unsafe_code)]

//! Exercise a pipeline operator outside its host.
//!
//! Build a [`MockApi`] and a [`FixtureLoader`] from the operator's source
//! path, hand the mock to the operator, feed it fixture messages, then
//! assert on [`MockApi::captured`].

pub use om_fixture::{ATTRIBUTES_SUFFIX, FixtureError, FixtureLoader, TESTDATA_DIR};
pub use om_frame::{Column, DataFrame, FrameError};
pub use om_io::{IoError, read_csv_str, write_csv_string};
pub use om_message::{
    Body, ColumnSpec, Message, MessageError, TableDescriptor, TableSchema, TypeMapping,
};
pub use om_runtime::{
    CaptureRecord, ConfigError, DESCRIPTOR_FILE, Generator, LogError, MockApi, OperatorApi,
    OperatorConfig, OperatorLogger, PortCallback, SendData, ShutdownHandler, TimerCallback,
    render_send,
};
pub use om_types::{DType, NullKind, Scalar};

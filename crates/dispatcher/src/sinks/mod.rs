//! Output implementations
//!
//! LogSink, FileSink and MemorySink serve every role; NetworkSink serves the
//! publisher and alert roles only.

mod file;
mod log;
mod memory;
mod network;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::memory::MemorySink;
pub use self::network::{NetworkFormat, NetworkSink, NetworkSinkConfig};

//! # Dispatcher
//!
//! 输出分发模块。
//!
//! 负责：
//! - 每个协作方 (feature sink / misfit sink / publisher / alert transport)
//!   一个独立队列 + worker
//! - 隔离慢输出与失败输出，不阻塞路由主链路
//! - 关闭时排空队列，再 flush + close

pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{AlertTransport, FeatureSink, MisfitSink, Publisher};
pub use delivery::Delivery;
pub use dispatcher::Dispatcher;
pub use error::DispatcherError;
pub use handle::OutputHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink, MemorySink, NetworkSink};

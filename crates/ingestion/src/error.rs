//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 读取输入流失败
    #[error("failed to read {source_name}: {source}")]
    Read {
        /// 输入名称 (文件路径或 stdin)
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    /// 记录解析失败
    #[error("failed to decode record {sequence}: {message}")]
    Decode {
        /// 记录序号
        sequence: u64,
        /// 错误消息
        message: String,
    },

    /// 下游已关闭
    #[error("record channel closed after {sequence} records")]
    ChannelClosed {
        /// 已发送的记录数
        sequence: u64,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;

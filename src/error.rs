//! VoiceStream 错误类型定义
//!
//! 采集与传输模块的错误类型统一在此定义，使用 thiserror 自动派生 Error trait

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use thiserror::Error;

/// 错误回调
///
/// 采集、传输和解析错误统一经由该回调上报给协作方
pub type ErrorHook = Arc<dyn Fn(StreamError) + Send + Sync>;

/// 统一错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// 采集相关错误
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// 连接相关错误
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// 入站消息解析失败 (非致命)
    #[error("Message parse failed: {0}")]
    MessageParse(String),

    /// 协议违规 (如入站二进制帧)
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// 协作方回调 panic
    #[error("{0} callback panicked")]
    CallbackPanic(&'static str),
}

/// 采集相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("No input device available")]
    DeviceUnavailable,

    #[error("Capture backend initialization failed: {0}")]
    ContextInitFailed(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),
}

/// 连接相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Connection closed before handshake completed")]
    ClosedBeforeOpen,
}

/// 错误代码（用于协作方显示）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    CaptureNoDevice,
    CaptureInitFailed,
    CaptureFailed,
    TransportConnectFailed,
    TransportClosed,
    MessageParseFailed,
    ProtocolViolation,
    CallbackPanic,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::CaptureNoDevice => write!(f, "CAPTURE_NO_DEVICE"),
            ErrorCode::CaptureInitFailed => write!(f, "CAPTURE_INIT_FAILED"),
            ErrorCode::CaptureFailed => write!(f, "CAPTURE_FAILED"),
            ErrorCode::TransportConnectFailed => write!(f, "TRANSPORT_CONNECT_FAILED"),
            ErrorCode::TransportClosed => write!(f, "TRANSPORT_CLOSED"),
            ErrorCode::MessageParseFailed => write!(f, "MESSAGE_PARSE_FAILED"),
            ErrorCode::ProtocolViolation => write!(f, "PROTOCOL_VIOLATION"),
            ErrorCode::CallbackPanic => write!(f, "CALLBACK_PANIC"),
        }
    }
}

impl StreamError {
    /// 获取对应的错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            StreamError::Capture(e) => match e {
                CaptureError::DeviceUnavailable => ErrorCode::CaptureNoDevice,
                CaptureError::ContextInitFailed(_) => ErrorCode::CaptureInitFailed,
                CaptureError::CaptureFailed(_) => ErrorCode::CaptureFailed,
            },
            StreamError::Connect(e) => match e {
                ConnectError::TransportFailure(_) => ErrorCode::TransportConnectFailed,
                ConnectError::ClosedBeforeOpen => ErrorCode::TransportClosed,
            },
            StreamError::MessageParse(_) => ErrorCode::MessageParseFailed,
            StreamError::ProtocolViolation(_) => ErrorCode::ProtocolViolation,
            StreamError::CallbackPanic(_) => ErrorCode::CallbackPanic,
        }
    }

    /// 检查是否为可恢复错误
    ///
    /// 采集错误通过重新 start 恢复，连接错误通过重新 connect 恢复；
    /// 解析错误本身不影响会话
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StreamError::CallbackPanic(_))
    }
}

/// 调用协作方回调，捕获 panic 并转发到错误回调
///
/// 协作方抛出的 panic 不得中断采集循环或读取循环
pub(crate) fn dispatch<T>(
    hook: &(dyn Fn(T) + Send + Sync),
    value: T,
    what: &'static str,
    errors: &ErrorHook,
) {
    if catch_unwind(AssertUnwindSafe(|| hook(value))).is_err() {
        tracing::warn!("{} callback panicked", what);
        dispatch_error(errors, StreamError::CallbackPanic(what));
    }
}

/// 调用错误回调，自身 panic 时仅记录日志
pub(crate) fn dispatch_error(errors: &ErrorHook, error: StreamError) {
    if catch_unwind(AssertUnwindSafe(|| errors(error))).is_err() {
        tracing::warn!("error callback panicked");
    }
}

//! 网络通信模块
//!
//! 提供 WebSocket 流式传输、入站消息解码和转写合并辅助

pub mod message;
pub mod transcript;
pub mod transport;

pub use message::ServerMessage;
pub use transcript::{TranscriptEntry, TranscriptState};
pub use transport::{ConnectionState, MessageHook, StreamTransport, TransportConfig};

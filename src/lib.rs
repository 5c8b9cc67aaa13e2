//! VoiceStream 核心库
//!
//! 将麦克风实时音频经持久双工 WebSocket 连接推送到远端语音转写服务，
//! 并以类型化事件下发增量/最终转写结果。两个独立组件：
//!
//! - [`ResamplingFramer`] — 采集原生采样率样本，线性重采样到目标采样率，
//!   按固定节拍产出定长 PCM16 帧；对网络一无所知
//! - [`StreamTransport`] — 单条双工连接：出站二进制帧、入站 JSON 消息
//!   解码为 [`ServerMessage`]、连接状态机与错误/关闭语义
//!
//! 上层编排（界面、转写展示）由协作方负责：协作方提供端点 URL 与
//! start/stop、connect/close 指令，通过构造时注入的回调接收帧、
//! 消息与错误事件

pub mod audio;
pub mod error;
pub mod network;

pub use audio::{AudioFrame, ChunkHook, ResampleState, ResamplingFramer, StreamConfig};
pub use error::{CaptureError, ConnectError, ErrorCode, ErrorHook, StreamError};
pub use network::{
    ConnectionState, MessageHook, ServerMessage, StreamTransport, TranscriptEntry,
    TranscriptState, TransportConfig,
};

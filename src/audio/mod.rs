//! 音频处理模块
//!
//! 提供音频采集、线性重采样和定长分帧功能

pub mod capture;
pub mod framer;
pub mod resampler;

pub use capture::{BlockSink, CaptureSession, MicCapture, StreamErrorSink};
pub use framer::{AudioFrame, ChunkHook, ResampleState, ResamplingFramer, StreamConfig};
pub use resampler::{quantize_pcm16, quantize_sample, resample_linear};

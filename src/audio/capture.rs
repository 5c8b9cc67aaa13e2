//! 音频采集模块
//!
//! 使用 cpal 获取默认输入设备并采集原生采样率的浮点样本块

use crate::error::CaptureError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// 原生样本块回调 (单通道样本, 原生采样率)
pub type BlockSink = Box<dyn FnMut(&[f32], u32) + Send>;

/// 采集后端运行期错误回调
pub type StreamErrorSink = Box<dyn Fn(CaptureError) + Send>;

/// 采集会话句柄
///
/// 由持有方独占，Drop 即释放底层设备。独立成 trait，
/// 无音频硬件的环境可注入替身会话
pub trait CaptureSession {}

impl CaptureSession for MicCapture {}

/// 麦克风采集会话
///
/// 持有一路 cpal 输入流，多通道输入在采集线程内混合为单通道后
/// 以原生采样率的浮点块上交。Drop 即释放设备
pub struct MicCapture {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
}

impl MicCapture {
    /// 打开默认输入设备并启动采集
    ///
    /// `on_block` 在采集线程上按块回调 (单通道样本, 原生采样率)；
    /// `on_stream_error` 在采集后端报错时回调
    pub fn open<D, E>(mut on_block: D, on_stream_error: E) -> Result<Self, CaptureError>
    where
        D: FnMut(&[f32], u32) + Send + 'static,
        E: Fn(CaptureError) + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::DeviceUnavailable)?;

        let default_config = device
            .default_input_config()
            .map_err(|e| CaptureError::ContextInitFailed(e.to_string()))?;

        let channels = default_config.channels();
        let sample_rate: u32 = default_config.sample_rate();

        let config = cpal::StreamConfig {
            channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        // Reused downmix scratch buffer, lives on the capture thread.
        let mut mono: Vec<f32> = Vec::new();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _| {
                    if channels <= 1 {
                        on_block(data, sample_rate);
                    } else {
                        mono.clear();
                        mono.extend(
                            data.chunks(channels as usize)
                                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                        );
                        on_block(&mono, sample_rate);
                    }
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                    on_stream_error(CaptureError::CaptureFailed(err.to_string()));
                },
                None,
            )
            .map_err(|e| CaptureError::ContextInitFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::ContextInitFailed(e.to_string()))?;

        tracing::info!("Audio capture started: {}Hz, {} channels", sample_rate, channels);

        Ok(Self { stream, sample_rate, channels })
    }

    /// 设备原生采样率
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// 设备通道数 (上交的数据始终为单通道)
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        let _ = self.stream.pause();
        tracing::info!("Audio capture stopped");
    }
}

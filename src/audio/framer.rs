//! 重采样分帧模块
//!
//! 消费采集回调上交的原生采样率样本块，重采样到目标采样率，
//! 按固定时长节拍切出定长 PCM16 帧

use crate::audio::capture::{BlockSink, CaptureSession, MicCapture, StreamErrorSink};
use crate::audio::resampler::{quantize_pcm16, resample_linear};
use crate::error::{self, CaptureError, ErrorHook};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 帧回调
///
/// 每产出一帧调用一次，按产出顺序；帧所有权随调用转移
pub type ChunkHook = Arc<dyn Fn(AudioFrame) + Send + Sync>;

/// 流配置
///
/// 构造后不可变；所有可调参数仅在此处
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// 目标采样率 (Hz)
    pub target_sample_rate: u32,
    /// 帧时长 (毫秒)
    pub frame_duration_ms: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000,
            frame_duration_ms: 250,
        }
    }
}

impl StreamConfig {
    /// 每帧样本数
    pub fn samples_per_frame(&self) -> usize {
        (self.target_sample_rate as f64 * self.frame_duration_ms as f64 / 1000.0).round() as usize
    }

    /// 每帧字节数 (小端 16 位 PCM)
    pub fn frame_bytes(&self) -> usize {
        self.samples_per_frame() * 2
    }

    /// 帧时长
    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_duration_ms as u64)
    }
}

/// 音频帧
///
/// 恰好 `samples_per_frame` 个小端 16 位有符号 PCM 样本，单通道，目标采样率
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    data: Vec<u8>,
}

impl AudioFrame {
    /// 由浮点样本量化构帧
    pub fn from_samples(samples: &[f32]) -> Self {
        Self { data: quantize_pcm16(samples) }
    }

    /// 帧字节
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// 取出帧字节，所有权转移给传输层
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// 帧内样本数
    pub fn sample_count(&self) -> usize {
        self.data.len() / 2
    }
}

/// 重采样状态
///
/// 待发样本缓冲区 + 上次产帧时间。仅在采集回调的执行上下文内修改，
/// cpal 回调运行在独立音频线程上，因此由调用方用互斥锁保护
#[derive(Debug)]
pub struct ResampleState {
    pending: Vec<f32>,
    last_emit: Instant,
}

impl ResampleState {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            last_emit: Instant::now(),
        }
    }

    /// 消费一个原生采样率样本块，返回本次产出的帧 (可能为空)
    ///
    /// 距上次产帧满一个帧时长且缓冲区存满至少一帧时，按先后顺序
    /// 排空**所有**完整帧；回调节拍落后时一次补齐，避免缓冲区无界增长。
    /// 不足一帧的余量保留到下一轮
    pub fn ingest(
        &mut self,
        block: &[f32],
        native_rate: u32,
        config: &StreamConfig,
        now: Instant,
    ) -> Vec<AudioFrame> {
        let resampled = resample_linear(block, native_rate, config.target_sample_rate);
        self.pending.extend_from_slice(&resampled);

        let samples_per_frame = config.samples_per_frame();
        let mut frames = Vec::new();

        if now.duration_since(self.last_emit) >= config.frame_duration()
            && self.pending.len() >= samples_per_frame
        {
            while self.pending.len() >= samples_per_frame {
                let samples: Vec<f32> = self.pending.drain(..samples_per_frame).collect();
                frames.push(AudioFrame::from_samples(&samples));
            }
            self.last_emit = now;
        }

        frames
    }

    /// 缓冲样本数
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 清空缓冲并重置节拍
    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_emit = Instant::now();
    }
}

impl Default for ResampleState {
    fn default() -> Self {
        Self::new()
    }
}

/// 重采样分帧器
///
/// 独占麦克风句柄；对网络一无所知。start/stop 幂等，
/// stop 总是安全且总是胜出
pub struct ResamplingFramer {
    config: StreamConfig,
    state: Arc<Mutex<ResampleState>>,
    capture: Option<Box<dyn CaptureSession>>,
    /// 采集后端报错后置位；会话视为已结束，资源在下次 stop/start 释放
    failed: Arc<AtomicBool>,
    on_chunk: ChunkHook,
    on_error: ErrorHook,
}

impl ResamplingFramer {
    /// 创建分帧器，回调由协作方在构造时提供
    pub fn new(config: StreamConfig, on_chunk: ChunkHook, on_error: ErrorHook) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(ResampleState::new())),
            capture: None,
            failed: Arc::new(AtomicBool::new(false)),
            on_chunk,
            on_error,
        }
    }

    /// 启动采集会话
    ///
    /// 已在录音时为空操作。失败时保证完全回收 (等价于已调用 stop)
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.start_with(|on_block, on_stream_error| {
            MicCapture::open(on_block, on_stream_error)
                .map(|capture| Box::new(capture) as Box<dyn CaptureSession>)
        })
    }

    /// 用给定的会话工厂启动，测试时注入替身采集源
    fn start_with<O>(&mut self, open: O) -> Result<(), CaptureError>
    where
        O: FnOnce(BlockSink, StreamErrorSink) -> Result<Box<dyn CaptureSession>, CaptureError>,
    {
        if self.is_recording() {
            return Ok(());
        }
        // Fresh session: empty buffer, cleared failure latch.
        self.stop();

        let config = self.config.clone();
        let state = self.state.clone();
        let failed = self.failed.clone();
        let failed_latch = self.failed.clone();
        let on_chunk = self.on_chunk.clone();
        let on_error = self.on_error.clone();
        let on_error_latch = self.on_error.clone();

        let on_block: BlockSink = Box::new(move |block, native_rate| {
            if failed.load(Ordering::SeqCst) {
                return;
            }
            let frames = state.lock().ingest(block, native_rate, &config, Instant::now());
            for frame in frames {
                error::dispatch(on_chunk.as_ref(), frame, "chunk", &on_error);
            }
        });
        let on_stream_error: StreamErrorSink = Box::new(move |err| {
            failed_latch.store(true, Ordering::SeqCst);
            error::dispatch_error(&on_error_latch, err.into());
        });

        match open(on_block, on_stream_error) {
            Ok(capture) => {
                self.capture = Some(capture);
                Ok(())
            }
            Err(e) => {
                self.stop();
                Err(e)
            }
        }
    }

    /// 停止采集会话，释放麦克风并丢弃缓冲样本
    ///
    /// 幂等，任何状态下均可调用
    pub fn stop(&mut self) {
        self.capture = None;
        self.failed.store(false, Ordering::SeqCst);
        self.state.lock().clear();
    }

    /// 是否存在活跃采集会话
    pub fn is_recording(&self) -> bool {
        self.capture.is_some() && !self.failed.load(Ordering::SeqCst)
    }

    /// 当前配置
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

impl Drop for ResamplingFramer {
    fn drop(&mut self) {
        self.stop();
    }
}

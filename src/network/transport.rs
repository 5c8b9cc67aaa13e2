//! 流式传输模块
//!
//! 使用 tokio-tungstenite 维护单条双工 WebSocket 连接：
//! 出站二进制音频帧、入站 JSON 消息、显式连接状态机

use crate::audio::AudioFrame;
use crate::error::{self, ConnectError, ErrorHook, StreamError};
use crate::network::message::ServerMessage;
use futures_util::future::{BoxFuture, Shared};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// 消息回调
///
/// 每条成功解析的入站消息调用一次，按到达顺序
pub type MessageHook = Arc<dyn Fn(ServerMessage) + Send + Sync>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SharedConnect = Shared<BoxFuture<'static, Result<(), ConnectError>>>;

/// 连接状态
///
/// `Closed --connect--> Connecting --握手成功--> Open`；
/// 握手失败、任一方关闭或传输错误均回到 `Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    Connecting,
    Open,
}

impl ConnectionState {
    /// 检查是否已打开
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "Closed"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
        }
    }
}

/// 传输配置
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// 目标端点 URL (由协作方提供)
    pub url: String,
    /// 连接超时 (秒)
    pub connect_timeout_secs: u64,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout_secs: 30,
        }
    }
}

/// 出站队列条目
enum Outbound {
    Frame(Vec<u8>),
    Close,
}

/// 流式传输器
///
/// 每个实例至多一条活跃底层连接；对象在多轮 connect/close 间可复用。
/// 克隆共享同一连接
#[derive(Clone)]
pub struct StreamTransport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    config: TransportConfig,
    state: Mutex<ConnectionState>,
    /// 连接代数；close 与新建连接各自递增，旧任务据此识别自身已过期
    generation: AtomicU64,
    /// 尝试序号；仅用于识别 pending 中的条目
    attempt: AtomicU64,
    /// 最近一次 close 时的尝试水位；不晚于该水位发起的进行中尝试已作废，
    /// 之后的 connect 不再加入，而是发起全新尝试
    closed_watermark: AtomicU64,
    out_tx: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    /// 进行中的连接尝试，所有并发 connect 调用共享同一结果
    pending: tokio::sync::Mutex<Option<(u64, SharedConnect)>>,
    on_message: MessageHook,
    on_error: ErrorHook,
}

impl StreamTransport {
    /// 创建传输器，回调由协作方在构造时提供
    pub fn new(config: TransportConfig, on_message: MessageHook, on_error: ErrorHook) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                config,
                state: Mutex::new(ConnectionState::Closed),
                generation: AtomicU64::new(0),
                attempt: AtomicU64::new(0),
                closed_watermark: AtomicU64::new(0),
                out_tx: Mutex::new(None),
                pending: tokio::sync::Mutex::new(None),
                on_message,
                on_error,
            }),
        }
    }

    /// 建立连接
    ///
    /// `Open` 时立即成功；`Connecting` 时所有调用方等待同一进行中尝试
    /// (至多一次底层连接)；`Closed` 时发起新尝试。
    /// 每次尝试恰好 resolve/reject 一次
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let (attempt_id, dial) = {
            let mut pending = self.inner.pending.lock().await;
            if self.inner.state.lock().is_open() {
                return Ok(());
            }
            let watermark = self.inner.closed_watermark.load(Ordering::SeqCst);
            match pending.as_ref() {
                // 仅加入 close 之后发起的尝试；更早的已被 close 作废，
                // 替换之，避免新调用方等到一个注定失败的结果
                Some((id, dial)) if *id > watermark => (*id, dial.clone()),
                _ => {
                    let id = self.inner.attempt.fetch_add(1, Ordering::SeqCst) + 1;
                    let dial = TransportInner::dial(self.inner.clone()).boxed().shared();
                    *pending = Some((id, dial.clone()));
                    (id, dial)
                }
            }
        };

        let result = dial.await;

        // 本次尝试已 resolve，清除后下次 connect 发起全新尝试；
        // 期间若已有更新的尝试则保持不动
        let mut pending = self.inner.pending.lock().await;
        if matches!(pending.as_ref(), Some((id, _)) if *id == attempt_id) {
            *pending = None;
        }
        result
    }

    /// 发送一帧音频
    ///
    /// 同步、即发即弃；连接未打开时静默丢弃 (调用方应以 is_open 做门控)。
    /// 出站队列无界，不回传背压
    pub fn send_audio_chunk(&self, frame: AudioFrame) {
        if !self.is_open() {
            tracing::trace!(
                "Dropping {} byte frame, connection not open",
                frame.as_bytes().len()
            );
            return;
        }
        let out_tx = self.inner.out_tx.lock();
        if let Some(tx) = out_tx.as_ref() {
            let _ = tx.send(Outbound::Frame(frame.into_bytes()));
        }
    }

    /// 关闭连接
    ///
    /// 幂等；无论先前状态如何都转移到 `Closed`。
    /// 与进行中的 connect 竞争时关闭胜出，该尝试以 `ClosedBeforeOpen` 失败；
    /// close 之后的 connect 发起全新尝试，不会重放已作废的结果
    pub fn close(&self) {
        let previous = {
            let mut state = self.inner.state.lock();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            // 作废进行中的连接尝试
            self.inner
                .closed_watermark
                .store(self.inner.attempt.load(Ordering::SeqCst), Ordering::SeqCst);
            std::mem::replace(&mut *state, ConnectionState::Closed)
        };
        if let Some(tx) = self.inner.out_tx.lock().take() {
            let _ = tx.send(Outbound::Close);
        }
        if previous != ConnectionState::Closed {
            tracing::info!("Connection closed");
        }
    }

    /// 检查连接是否已打开
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// 当前连接状态
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }
}

impl TransportInner {
    /// 发起一次底层连接尝试
    async fn dial(inner: Arc<TransportInner>) -> Result<(), ConnectError> {
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = inner.state.lock();
            if inner.generation.load(Ordering::SeqCst) != generation {
                return Err(ConnectError::ClosedBeforeOpen);
            }
            *state = ConnectionState::Connecting;
        }
        tracing::info!("Connecting to {}", inner.config.url);

        let timeout = Duration::from_secs(inner.config.connect_timeout_secs);
        let stream = match tokio::time::timeout(timeout, connect_async(inner.config.url.as_str()))
            .await
        {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                inner.mark_closed(generation);
                return Err(ConnectError::TransportFailure(e.to_string()));
            }
            Err(_) => {
                inner.mark_closed(generation);
                return Err(ConnectError::TransportFailure("connection timed out".to_string()));
            }
        };

        let (sink, source) = stream.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        {
            let mut state = inner.state.lock();
            // close() 可能与握手竞争；关闭胜出，连接直接丢弃
            if inner.generation.load(Ordering::SeqCst) != generation {
                return Err(ConnectError::ClosedBeforeOpen);
            }
            *inner.out_tx.lock() = Some(out_tx);
            *state = ConnectionState::Open;
        }
        tracing::info!("Connected to {}", inner.config.url);

        tokio::spawn(TransportInner::write_loop(inner.clone(), sink, out_rx, generation));
        tokio::spawn(TransportInner::read_loop(inner.clone(), source, generation));

        Ok(())
    }

    /// 入站读取循环
    ///
    /// 解析失败与入站二进制帧走错误回调且不关闭连接；
    /// 传输错误先上报错误事件，再转移状态
    async fn read_loop(inner: Arc<TransportInner>, mut source: SplitStream<WsStream>, generation: u64) {
        while let Some(message) = source.next().await {
            if inner.generation.load(Ordering::SeqCst) != generation {
                break;
            }
            match message {
                Ok(Message::Text(text)) => match ServerMessage::parse(text.as_str()) {
                    Ok(msg) => {
                        error::dispatch(inner.on_message.as_ref(), msg, "message", &inner.on_error);
                    }
                    Err(e) => {
                        error::dispatch_error(
                            &inner.on_error,
                            StreamError::MessageParse(e.to_string()),
                        );
                    }
                },
                Ok(Message::Binary(data)) => {
                    error::dispatch_error(
                        &inner.on_error,
                        StreamError::ProtocolViolation(format!(
                            "unexpected binary frame ({} bytes)",
                            data.len()
                        )),
                    );
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => break,
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    error::dispatch_error(
                        &inner.on_error,
                        StreamError::Connect(ConnectError::TransportFailure(e.to_string())),
                    );
                    break;
                }
            }
        }
        inner.mark_closed(generation);
    }

    /// 出站写入循环，排空队列写入二进制帧
    async fn write_loop(
        inner: Arc<TransportInner>,
        mut sink: SplitSink<WsStream, Message>,
        mut out_rx: mpsc::UnboundedReceiver<Outbound>,
        generation: u64,
    ) {
        while let Some(outbound) = out_rx.recv().await {
            match outbound {
                Outbound::Frame(bytes) => {
                    if let Err(e) = sink.send(Message::Binary(bytes.into())).await {
                        error::dispatch_error(
                            &inner.on_error,
                            StreamError::Connect(ConnectError::TransportFailure(e.to_string())),
                        );
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.close().await;
                    break;
                }
            }
        }
        inner.mark_closed(generation);
    }

    /// 当前代未变时转移到 Closed 并撤下出站通道
    fn mark_closed(&self, generation: u64) {
        let mut state = self.state.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            *state = ConnectionState::Closed;
            *self.out_tx.lock() = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_transport(url: &str) -> StreamTransport {
        StreamTransport::new(TransportConfig::new(url), Arc::new(|_| {}), Arc::new(|_| {}))
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::Open.to_string(), "Open");
    }

    #[test]
    fn test_connection_state_is_open() {
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Connecting.is_open());
        assert!(!ConnectionState::Closed.is_open());
        assert_eq!(ConnectionState::default(), ConnectionState::Closed);
    }

    #[test]
    fn test_transport_config_defaults() {
        let config = TransportConfig::new("ws://127.0.0.1:9000/stt");
        assert_eq!(config.url, "ws://127.0.0.1:9000/stt");
        assert_eq!(config.connect_timeout_secs, 30);
    }

    #[test]
    fn test_initial_state_is_closed() {
        let transport = noop_transport("ws://127.0.0.1:9000");
        assert_eq!(transport.state(), ConnectionState::Closed);
        assert!(!transport.is_open());
    }

    #[test]
    fn test_send_while_closed_is_silent_noop() {
        // No runtime, no connection: must neither block nor error.
        let transport = noop_transport("ws://127.0.0.1:9000");
        let frame = crate::audio::AudioFrame::from_samples(&[0.0; 16]);
        transport.send_audio_chunk(frame);
        assert!(!transport.is_open());
    }

    #[test]
    fn test_close_while_closed_is_noop() {
        let transport = noop_transport("ws://127.0.0.1:9000");
        transport.close();
        transport.close();
        assert_eq!(transport.state(), ConnectionState::Closed);
    }
}

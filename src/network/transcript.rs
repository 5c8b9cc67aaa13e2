//! 转写状态模块
//!
//! 协作方侧的 partial/final 合并辅助：中间结果覆盖当前 partial，
//! 最终结果追加历史并清空 partial

use crate::network::message::ServerMessage;
use chrono::{DateTime, Utc};

/// 一条已定稿的转写
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// 转写合并状态
#[derive(Debug, Clone, Default)]
pub struct TranscriptState {
    partial: String,
    history: Vec<TranscriptEntry>,
}

impl TranscriptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一条服务端消息
    ///
    /// 错误消息不改变转写状态
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::Transcript { text, is_final: false } => {
                self.partial = text.clone();
            }
            ServerMessage::Transcript { text, is_final: true } => {
                self.history.push(TranscriptEntry {
                    text: text.clone(),
                    timestamp: Utc::now(),
                });
                self.partial.clear();
            }
            ServerMessage::Error { .. } => {}
        }
    }

    /// 当前中间结果，无则为 None
    pub fn partial(&self) -> Option<&str> {
        if self.partial.is_empty() { None } else { Some(&self.partial) }
    }

    /// 已定稿历史
    pub fn history(&self) -> &[TranscriptEntry] {
        &self.history
    }

    /// 清空全部状态
    pub fn clear(&mut self) {
        self.partial.clear();
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_then_final() {
        let mut state = TranscriptState::new();
        state.apply(&ServerMessage::Transcript { text: "hell".to_string(), is_final: false });
        assert_eq!(state.partial(), Some("hell"));
        assert!(state.history().is_empty());

        state.apply(&ServerMessage::Transcript { text: "hello".to_string(), is_final: true });
        assert_eq!(state.partial(), None);
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.history()[0].text, "hello");
    }

    #[test]
    fn test_partial_replaces_previous_partial() {
        let mut state = TranscriptState::new();
        state.apply(&ServerMessage::Transcript { text: "he".to_string(), is_final: false });
        state.apply(&ServerMessage::Transcript { text: "hey".to_string(), is_final: false });
        assert_eq!(state.partial(), Some("hey"));
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_error_message_leaves_state_untouched() {
        let mut state = TranscriptState::new();
        state.apply(&ServerMessage::Transcript { text: "hi".to_string(), is_final: false });
        state.apply(&ServerMessage::Error { message: "overloaded".to_string() });
        assert_eq!(state.partial(), Some("hi"));
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_clear() {
        let mut state = TranscriptState::new();
        state.apply(&ServerMessage::Transcript { text: "done".to_string(), is_final: true });
        state.apply(&ServerMessage::Transcript { text: "more".to_string(), is_final: false });
        state.clear();
        assert_eq!(state.partial(), None);
        assert!(state.history().is_empty());
    }
}

//! 入站消息模块
//!
//! 服务端文本帧解码为封闭的带标签联合类型；
//! 解析失败走错误回调，不关闭连接

use serde::Deserialize;

/// 服务端消息
///
/// 每个入站文本帧为一个 JSON 对象，`type` 字段区分变体；
/// 未知 `type` 或缺失必填字段视为解析失败
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 转写结果；`is_final` 缺省为 false (中间结果)
    Transcript {
        text: String,
        #[serde(default)]
        is_final: bool,
    },

    /// 服务端错误
    Error { message: String },
}

impl ServerMessage {
    /// 解析一条入站文本帧
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// 是否为最终转写结果
    pub fn is_final_transcript(&self) -> bool {
        matches!(self, ServerMessage::Transcript { is_final: true, .. })
    }
}

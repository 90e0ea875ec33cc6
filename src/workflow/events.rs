//! 工作流过程事件：用于流式展示推理、检索调用与最终回答
//!
//! 事件只进不出：发送失败（展示层已退出）静默忽略，绝不影响控制流。

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// 过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 进入新阶段
    StageUpdate { stage: String },
    /// THINKING 阶段的一小段推理文本（随流到达）
    ReasoningToken { text: String },
    /// 开始调用外部工具（检索）
    ToolStart {
        tool: String,
        query: String,
        mode: String,
    },
    /// 工具返回（预览，避免过长）
    ToolResult { tool: String, preview: String },
    /// 最终回答的一小段（流式输出）
    FinalToken { text: String },
    /// 错误
    Error { text: String },
}

/// fire-and-forget 发送；无订阅者或通道关闭时忽略
pub(crate) fn send_event(tx: &Option<&UnboundedSender<AgentEvent>>, ev: AgentEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

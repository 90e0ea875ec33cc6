//! 会话状态与阶段定义
//!
//! SessionState 是单次问答交换的全部可变状态，由引擎独占，不跨交换共享。
//! 字段单写者约定：reasoning_notes 归 THINKING，draft_answer 归 ANSWERING，
//! critique_log 归 CRITIQUING（只追加），search_cache 归 SEARCHING（同一查询幂等），
//! final_answer 仅 FINALIZING 可写且每次交换恰好写一次。

use std::collections::BTreeMap;

use serde_json::Value;

use crate::memory::Message;
use crate::search::SearchMode;

/// 工作流阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Thinking,
    Routing,
    Answering,
    Critiquing,
    Searching,
    Finalizing,
    Done,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Thinking => "thinking",
            Stage::Routing => "routing",
            Stage::Answering => "answering",
            Stage::Critiquing => "critiquing",
            Stage::Searching => "searching",
            Stage::Finalizing => "finalizing",
            Stage::Done => "done",
        }
    }
}

/// 单次交换的会话状态
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// 角色标注的消息序列（先前历史 + 本次问题），只追加
    pub messages: Vec<Message>,
    /// THINKING 产出的推理笔记，下游各阶段只读
    pub reasoning_notes: String,
    /// 当前最佳草稿，ANSWERING 每次覆盖
    pub draft_answer: String,
    /// 评审意见，只追加；长度即循环计数
    pub critique_log: Vec<String>,
    /// 最近一次决策标签，瞬态
    pub routing_decision: String,
    /// 待执行的检索查询与深度，瞬态
    pub search_query: String,
    pub search_mode: SearchMode,
    /// 查询文本 -> 原始结果负载；同一查询幂等覆盖，不同查询永不冲突，从不淘汰。
    /// 按查询文本有序，渲染进 prompt 的结果顺序可复现
    pub search_cache: BTreeMap<String, Value>,
    /// 最终回答，仅 FINALIZING 写入
    pub final_answer: Option<String>,
}

impl SessionState {
    /// 以先前历史与当前问题创建新交换的状态
    pub fn new(question: &str, prior_messages: &[Message]) -> Self {
        let mut messages = prior_messages.to_vec();
        messages.push(Message::user(question));
        Self {
            messages,
            ..Default::default()
        }
    }

    /// 当前处理中的问题（最新一条 user 消息）
    pub fn question(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::memory::Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// THINKING 进入时显式清空交换内瞬态字段，杜绝上一次交换的残留
    pub fn reset_transients(&mut self) {
        self.reasoning_notes.clear();
        self.draft_answer.clear();
        self.critique_log.clear();
        self.routing_decision.clear();
        self.search_query.clear();
        self.search_mode = SearchMode::Basic;
        self.search_cache.clear();
        self.final_answer = None;
    }

    /// 写入检索结果；同一字面查询覆盖单条缓存项
    pub fn cache_result(&mut self, query: &str, payload: Value) {
        self.search_cache.insert(query.to_string(), payload);
    }

    /// 渲染全部缓存结果供 prompt 使用（撰写/评审/定稿都看到累计结果）
    pub fn search_results_block(&self) -> String {
        if self.search_cache.is_empty() {
            return "(no search results)".to_string();
        }
        self.search_cache
            .iter()
            .map(|(query, payload)| format!("Query: {}\nResults: {}", query, payload))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// 渲染全部历史评审意见供 prompt 使用
    pub fn critique_block(&self) -> String {
        if self.critique_log.is_empty() {
            return "(no critique yet)".to_string();
        }
        self.critique_log
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_is_latest_user_message() {
        let prior = vec![
            Message::user("old question"),
            Message::assistant("old answer"),
        ];
        let state = SessionState::new("new question", &prior);
        assert_eq!(state.question(), "new question");
        assert_eq!(state.messages.len(), 3);
    }

    #[test]
    fn test_cache_is_idempotent_per_exact_query() {
        let mut state = SessionState::default();
        state.cache_result("capital of France", json!({"v": 1}));
        state.cache_result("capital of France", json!({"v": 2}));
        assert_eq!(state.search_cache.len(), 1);
        assert_eq!(state.search_cache["capital of France"]["v"], 2);
    }

    #[test]
    fn test_cache_is_case_sensitive() {
        let mut state = SessionState::default();
        state.cache_result("capital of France", json!({}));
        state.cache_result("capital of france", json!({}));
        assert_eq!(state.search_cache.len(), 2);
    }

    #[test]
    fn test_search_results_block_is_ordered_by_query() {
        let mut state = SessionState::default();
        state.cache_result("zebra facts", json!({"v": "z"}));
        state.cache_result("ant facts", json!({"v": "a"}));
        let block = state.search_results_block();
        let ant = block.find("ant facts").unwrap();
        let zebra = block.find("zebra facts").unwrap();
        assert!(ant < zebra);
        assert_eq!(block, state.search_results_block());
    }

    #[test]
    fn test_reset_transients_clears_everything_but_messages() {
        let mut state = SessionState::new("q", &[]);
        state.reasoning_notes = "notes".into();
        state.draft_answer = "draft".into();
        state.critique_log.push("c".into());
        state.routing_decision = "search".into();
        state.search_query = "q".into();
        state.search_mode = SearchMode::Deep;
        state.cache_result("q", json!({}));
        state.final_answer = Some("a".into());

        state.reset_transients();

        assert!(state.reasoning_notes.is_empty());
        assert!(state.draft_answer.is_empty());
        assert!(state.critique_log.is_empty());
        assert!(state.routing_decision.is_empty());
        assert!(state.search_query.is_empty());
        assert_eq!(state.search_mode, SearchMode::Basic);
        assert!(state.search_cache.is_empty());
        assert!(state.final_answer.is_none());
        assert_eq!(state.messages.len(), 1);
    }
}

//! 结构化决策与状态转移
//!
//! 路由/评审决策由模型以 JSON 产出，解析为封闭枚举后交给纯转移函数选择下一阶段。
//! 未知标签与缺失字段一律落到安全默认（finalize / basic），决不因不可解析的决策阻塞前进。

use schemars::JsonSchema;
use serde::Deserialize;

use crate::search::SearchMode;
use crate::workflow::state::Stage;

/// 评审循环上限：critique_log 追加后长度超过该值即强制定稿。
/// 检查发生在追加之后，因此第 3 条新评审仍可触发改写，第 4 条起强制 finalize。
pub const MAX_CRITIQUE_ROUNDS: usize = 3;

/// 路由决策原始结构（ROUTING 阶段的 LLM JSON 输出）
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RouteDecision {
    /// 需要联网检索时的查询文本，不需要时留空
    pub search_query: String,
    /// finalize / search / writer 之一
    pub final_decision: String,
}

impl Default for RouteDecision {
    fn default() -> Self {
        Self {
            search_query: String::new(),
            final_decision: "finalize".to_string(),
        }
    }
}

/// 路由去向（封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChoice {
    Finalize,
    Search,
    Writer,
}

impl RouteDecision {
    /// 校验决策标签；未知标签回退 Finalize
    pub fn choice(&self) -> RouteChoice {
        match self.final_decision.trim().to_lowercase().as_str() {
            "search" => RouteChoice::Search,
            "writer" => RouteChoice::Writer,
            "finalize" => RouteChoice::Finalize,
            other => {
                tracing::warn!(tag = other, "unknown routing tag, falling back to finalize");
                RouteChoice::Finalize
            }
        }
    }
}

/// 评审决策原始结构（CRITIQUING 阶段的 LLM JSON 输出）
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CritiqueDecision {
    /// 对草稿的思考过程
    pub thoughts: String,
    /// 具体修改意见；is_new_critique 为 true 时追加进 critique_log
    pub critique: String,
    /// 本条意见相对历史评审是否有新内容
    pub is_new_critique: bool,
    /// 需要联网检索时的查询文本，不需要时留空
    pub search_query: String,
    /// basic / deep
    pub search_mode: String,
    /// good / search / fix 之一
    pub final_decision: String,
}

impl Default for CritiqueDecision {
    fn default() -> Self {
        Self {
            thoughts: String::new(),
            critique: String::new(),
            is_new_critique: false,
            search_query: String::new(),
            search_mode: "basic".to_string(),
            final_decision: "good".to_string(),
        }
    }
}

/// 评审去向（封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CritiqueChoice {
    Good,
    Search,
    Fix,
}

impl CritiqueDecision {
    /// 校验决策标签；未知标签回退 Good（即直接定稿）
    pub fn choice(&self) -> CritiqueChoice {
        match self.final_decision.trim().to_lowercase().as_str() {
            "search" => CritiqueChoice::Search,
            "fix" => CritiqueChoice::Fix,
            "good" => CritiqueChoice::Good,
            other => {
                tracing::warn!(tag = other, "unknown critique tag, falling back to good");
                CritiqueChoice::Good
            }
        }
    }

    /// 解析检索深度；未知值回退 basic
    pub fn mode(&self) -> SearchMode {
        match self.search_mode.trim().to_lowercase().as_str() {
            "deep" => SearchMode::Deep,
            _ => SearchMode::Basic,
        }
    }

    /// 是否带来了新的评审内容
    pub fn is_novel(&self) -> bool {
        self.is_new_critique && !self.critique.trim().is_empty()
    }
}

/// 路由后的下一阶段：search 且查询非空 -> 检索；writer -> 撰写；其余 -> 定稿
pub fn next_after_routing(decision: &RouteDecision) -> Stage {
    match decision.choice() {
        RouteChoice::Search if !decision.search_query.trim().is_empty() => Stage::Searching,
        RouteChoice::Writer => Stage::Answering,
        // search 无查询文本时降级定稿，而非崩溃或空转
        _ => Stage::Finalizing,
    }
}

/// 评审后的下一阶段；critique_len 为追加之后的 critique_log 长度。
/// fix 仅在「有新内容且未超上限」时才被采纳，否则引擎覆盖模型意图强制定稿。
pub fn next_after_critique(decision: &CritiqueDecision, critique_len: usize) -> Stage {
    match decision.choice() {
        CritiqueChoice::Search if !decision.search_query.trim().is_empty() => Stage::Searching,
        CritiqueChoice::Fix if decision.is_novel() && critique_len <= MAX_CRITIQUE_ROUNDS => {
            Stage::Answering
        }
        _ => Stage::Finalizing,
    }
}

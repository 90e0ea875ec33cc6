//! 工作流层：状态机引擎、会话状态、决策解析、提示词与过程事件

pub mod decision;
pub mod engine;
pub mod events;
pub mod prompts;
pub mod state;

pub use decision::{
    next_after_critique, next_after_routing, CritiqueChoice, CritiqueDecision, RouteChoice,
    RouteDecision, MAX_CRITIQUE_ROUNDS,
};
pub use engine::WorkflowEngine;
pub use events::AgentEvent;
pub use state::{SessionState, Stage};

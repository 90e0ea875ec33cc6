//! Wren - Rust 推理问答智能体
//!
//! 对单个用户问题执行「思考 -> 路由 -> (撰写 ⇄ 评审 ⇄ 检索) -> 定稿」的多阶段工作流，
//! 过程事件（推理 Token、检索调用、最终回答）流式推送给展示层。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: 补全客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、结构化输出解析
//! - **memory**: 对话历史（跨问题保留，供 THINKING 阶段作为上下文）
//! - **observability**: 日志初始化
//! - **search**: 联网检索客户端（Tavily / Mock），basic 与 deep 两档
//! - **workflow**: 工作流引擎（状态机、决策解析、会话状态、提示词、事件）

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod search;
pub mod workflow;

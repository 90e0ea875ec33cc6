//! 记忆层：对话历史（跨问题保留在一次 CLI 会话内）

pub mod conversation;

pub use conversation::{ConversationMemory, Message, Role};

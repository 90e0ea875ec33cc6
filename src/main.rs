//! Wren - Rust 推理问答智能体
//!
//! 入口：初始化日志、加载配置、运行命令行问答循环。
//! 每个问题跑一次完整工作流，过程事件（推理、检索、最终回答）边到边打印；
//! 历史在一次会话内跨问题保留，作为下一个问题的上下文。

use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use wren::config::{load_config, AppConfig};
use wren::llm::create_completion_client;
use wren::memory::{ConversationMemory, Message};
use wren::search::create_search_client;
use wren::workflow::{AgentEvent, WorkflowEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wren::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, using defaults");
        AppConfig::default()
    });

    let llm = create_completion_client(&cfg);
    let search = create_search_client(&cfg);
    let engine = WorkflowEngine::from_config(llm, search, &cfg.llm.timeouts);
    let mut history = ConversationMemory::new(cfg.app.max_context_turns);

    let name = cfg.app.name.as_deref().unwrap_or("wren");
    println!("{} - ask a question (exit / quit to leave)", name);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                match ev {
                    AgentEvent::StageUpdate { stage } => eprintln!("[{}]", stage),
                    AgentEvent::ReasoningToken { text } | AgentEvent::FinalToken { text } => {
                        print!("{}", text);
                        let _ = std::io::stdout().flush();
                    }
                    AgentEvent::ToolStart { tool, query, mode } => {
                        eprintln!("[{}:{}] {}", tool, mode, query)
                    }
                    AgentEvent::ToolResult { .. } => {}
                    AgentEvent::Error { text } => eprintln!("[error] {}", text),
                }
            }
        });

        let result = engine
            .run(question, history.messages(), Some(&tx), CancellationToken::new())
            .await;
        drop(tx);
        let _ = printer.await;
        println!();

        match result {
            Ok(answer) => {
                history.push(Message::user(question));
                history.push(Message::assistant(answer));
            }
            Err(e) => {
                eprintln!("could not complete the request: {}", e);
            }
        }
    }

    Ok(())
}

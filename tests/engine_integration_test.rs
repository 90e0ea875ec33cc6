//! 工作流引擎集成测试：脚本化 LLM 与检索客户端驱动各条路径

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use wren::core::AgentError;
use wren::llm::{CompletionClient, TokenStream};
use wren::memory::{Message, Role};
use wren::search::{SearchClient, SearchMode};
use wren::workflow::{AgentEvent, WorkflowEngine};

/// 脚本化补全客户端：按顺序吐出预置回复，记录每次收到的 prompt
struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    /// 从第 N 次调用（0 起）开始人为变慢，用于超时场景
    slow_from: Option<usize>,
}

impl ScriptedLlm {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            slow_from: None,
        })
    }

    fn slow_from(replies: &[&str], n: usize) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            slow_from: Some(n),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn exhausted(&self) -> bool {
        self.replies.lock().unwrap().is_empty()
    }

    fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(n) = self.slow_from {
            if index >= n {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
        let joined = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(joined);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "script exhausted".to_string())
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, String> {
        let content = self.complete(messages).await?;
        Ok(Box::pin(stream::iter(vec![Ok(content)])))
    }
}

/// 记录型检索客户端：记下每次 (query, mode)，返回可辨识的结果负载
#[derive(Default)]
struct RecordingSearch {
    calls: Mutex<Vec<(String, SearchMode)>>,
}

impl RecordingSearch {
    fn calls(&self) -> Vec<(String, SearchMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchClient for RecordingSearch {
    async fn search(&self, query: &str, mode: SearchMode) -> Result<Value, String> {
        self.calls.lock().unwrap().push((query.to_string(), mode));
        Ok(json!({
            "results": [{"content": format!("web data for <{}>", query)}],
        }))
    }
}

fn route_json(decision: &str, query: &str) -> String {
    format!(r#"{{"search_query": "{}", "final_decision": "{}"}}"#, query, decision)
}

fn critique_json(decision: &str, query: &str, mode: &str, is_new: bool, text: &str) -> String {
    format!(
        r#"{{"thoughts": "t", "critique": "{}", "is_new_critique": {}, "search_query": "{}", "search_mode": "{}", "final_decision": "{}"}}"#,
        text, is_new, query, mode, decision
    )
}

async fn drain(rx: &mut mpsc::UnboundedReceiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

/// 场景 A：简单问题，路由直接 finalize，不检索不评审
#[tokio::test]
async fn test_scenario_simple_question_finalizes_directly() {
    let llm = ScriptedLlm::new(&[
        "trivial arithmetic, answer directly",
        &route_json("finalize", ""),
        "The answer is 4.",
    ]);
    let search = Arc::new(RecordingSearch::default());
    let engine = WorkflowEngine::new(llm.clone(), search.clone());

    let answer = engine
        .run("2+2?", &[], None, CancellationToken::new())
        .await
        .unwrap();

    assert!(answer.contains("4"));
    assert_eq!(llm.calls(), 3);
    assert!(llm.exhausted());
    assert!(search.calls().is_empty());
}

/// 场景 B：时事问题，路由检索一次，评审通过；恰好一次检索调用
#[tokio::test]
async fn test_scenario_current_event_searches_once() {
    let llm = ScriptedLlm::new(&[
        "this needs fresh data",
        &route_json("search", "latest rust release"),
        "draft built on search data",
        &critique_json("good", "", "basic", false, ""),
        "final answer with fresh facts",
    ]);
    let search = Arc::new(RecordingSearch::default());
    let engine = WorkflowEngine::new(llm.clone(), search.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let answer = engine
        .run("what is new in rust?", &[], Some(&tx), CancellationToken::new())
        .await
        .unwrap();
    drop(tx);

    assert_eq!(answer, "final answer with fresh facts");
    assert_eq!(search.calls(), vec![("latest rust release".to_string(), SearchMode::Basic)]);

    // 撰写阶段的 prompt 应包含缓存的检索结果（调用顺序：思考0 路由1 撰写2 评审3 定稿4）
    assert!(llm.prompt(2).contains("web data for <latest rust release>"));

    // 事件顺序：推理 -> 检索开始 -> 检索结果 -> 最终回答
    let events = drain(&mut rx).await;
    let pos = |pred: &dyn Fn(&AgentEvent) -> bool| events.iter().position(|e| pred(e)).unwrap();
    let reasoning = pos(&|e| matches!(e, AgentEvent::ReasoningToken { .. }));
    let tool_start = pos(&|e| matches!(e, AgentEvent::ToolStart { .. }));
    let tool_result = pos(&|e| matches!(e, AgentEvent::ToolResult { .. }));
    let final_token = pos(&|e| matches!(e, AgentEvent::FinalToken { .. }));
    assert!(reasoning < tool_start);
    assert!(tool_start < tool_result);
    assert!(tool_result < final_token);
}

/// 场景 C：评审上限边界。连续 3 条新 fix 都被采纳（第 3 条追加后长度恰为 3），
/// 第 4 条 fix 被引擎强制定稿
#[tokio::test]
async fn test_scenario_critique_cap_boundary() {
    let llm = ScriptedLlm::new(&[
        "needs careful drafting",
        &route_json("writer", ""),
        "draft v1",
        &critique_json("fix", "", "basic", true, "add sources"),
        "draft v2",
        &critique_json("fix", "", "basic", true, "tighten wording"),
        "draft v3",
        &critique_json("fix", "", "basic", true, "fix the intro"),
        "draft v4",
        &critique_json("fix", "", "basic", true, "one more pass"),
        "final after four critiques",
    ]);
    let search = Arc::new(RecordingSearch::default());
    let engine = WorkflowEngine::new(llm.clone(), search.clone());

    let answer = engine
        .run("write an essay", &[], None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer, "final after four critiques");
    // 思考1 + 路由1 + 撰写4 + 评审4 + 定稿1
    assert_eq!(llm.calls(), 11);
    assert!(llm.exhausted());
    assert!(search.calls().is_empty());

    // 定稿 prompt 应带上全部 4 条评审意见
    let final_prompt = llm.prompt(10);
    for c in ["add sources", "tighten wording", "fix the intro", "one more pass"] {
        assert!(final_prompt.contains(c), "missing critique: {}", c);
    }
}

/// 场景 D：fix 但 is_new_critique=false，引擎无视模型意图直接定稿
#[tokio::test]
async fn test_scenario_stale_fix_goes_straight_to_finalizing() {
    let llm = ScriptedLlm::new(&[
        "needs drafting",
        &route_json("writer", ""),
        "draft v1",
        &critique_json("fix", "", "basic", false, "same old complaint"),
        "final answer",
    ]);
    let search = Arc::new(RecordingSearch::default());
    let engine = WorkflowEngine::new(llm.clone(), search.clone());

    let answer = engine
        .run("question", &[], None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer, "final answer");
    assert_eq!(llm.calls(), 5);
}

/// 场景 E：撰写阶段超时，交换失败，无最终回答，评审阶段未被调用
#[tokio::test]
async fn test_scenario_timeout_during_answering_aborts() {
    let llm = ScriptedLlm::slow_from(
        &["notes", &route_json("writer", ""), "never delivered"],
        2,
    );
    let search = Arc::new(RecordingSearch::default());
    let engine = WorkflowEngine::new(llm.clone(), search.clone())
        .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));

    let err = engine
        .run("question", &[], None, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::NetworkTimeout));
    // 思考、路由、撰写各启动一次；评审从未开始
    assert_eq!(llm.calls(), 3);
    assert!(search.calls().is_empty());
}

/// 评审阶段请求 deep 检索：检索累计进缓存，重写稿能同时看到两次结果
#[tokio::test]
async fn test_critique_requested_deep_search_compounds_cache() {
    let llm = ScriptedLlm::new(&[
        "needs data",
        &route_json("search", "topic overview"),
        "draft v1",
        &critique_json("search", "topic details", "deep", true, "needs specifics"),
        "draft v2",
        &critique_json("good", "", "basic", false, ""),
        "final",
    ]);
    let search = Arc::new(RecordingSearch::default());
    let engine = WorkflowEngine::new(llm.clone(), search.clone());

    let answer = engine
        .run("tell me about the topic", &[], None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer, "final");
    assert_eq!(
        search.calls(),
        vec![
            ("topic overview".to_string(), SearchMode::Basic),
            ("topic details".to_string(), SearchMode::Deep),
        ]
    );

    // 第二次撰写（调用顺序：0思考 1路由 2撰写 3评审 4撰写 5评审 6定稿）看到两份缓存
    let redraft_prompt = llm.prompt(4);
    assert!(redraft_prompt.contains("web data for <topic overview>"));
    assert!(redraft_prompt.contains("web data for <topic details>"));
}

/// 路由输出彻底不可解析：降级 finalize，仍产出唯一一份最终回答
#[tokio::test]
async fn test_malformed_routing_decision_falls_back_to_finalize() {
    let llm = ScriptedLlm::new(&[
        "notes",
        "I refuse to answer in JSON today",
        "final answer despite the chaos",
    ]);
    let search = Arc::new(RecordingSearch::default());
    let engine = WorkflowEngine::new(llm.clone(), search.clone());

    let answer = engine
        .run("question", &[], None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer, "final answer despite the chaos");
    assert_eq!(llm.calls(), 3);
    assert!(search.calls().is_empty());
}

/// 评审输出彻底不可解析：降级 good（即定稿），交换不中断
#[tokio::test]
async fn test_malformed_critique_decision_falls_back_to_finalize() {
    let llm = ScriptedLlm::new(&[
        "notes",
        &route_json("writer", ""),
        "draft v1",
        "utter garbage, not json at all",
        "final answer",
    ]);
    let search = Arc::new(RecordingSearch::default());
    let engine = WorkflowEngine::new(llm.clone(), search.clone());

    let answer = engine
        .run("question", &[], None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer, "final answer");
    // 思考1 + 路由1 + 撰写1 + 评审1 + 定稿1，撰写不再被重访
    assert_eq!(llm.calls(), 5);
    assert!(search.calls().is_empty());
}

/// 评审决策标签不在 good/search/fix 之内：降级 good，即使带了非空查询也不检索
#[tokio::test]
async fn test_unknown_critique_tag_falls_back_to_finalize() {
    let llm = ScriptedLlm::new(&[
        "notes",
        &route_json("writer", ""),
        "draft v1",
        &critique_json("retry", "some query", "basic", false, ""),
        "final answer",
    ]);
    let search = Arc::new(RecordingSearch::default());
    let engine = WorkflowEngine::new(llm.clone(), search.clone());

    let answer = engine
        .run("question", &[], None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer, "final answer");
    assert_eq!(llm.calls(), 5);
    assert!(search.calls().is_empty());
}

/// 历史作为上下文传入：思考阶段的消息应包含先前轮次
#[tokio::test]
async fn test_prior_messages_reach_thinking_stage() {
    let finalize = route_json("finalize", "");
    let llm = ScriptedLlm::new(&["notes", &finalize, "final", "notes", &finalize, "final"]);
    let search = Arc::new(RecordingSearch::default());
    let engine = WorkflowEngine::new(llm.clone(), search.clone());

    let prior = vec![
        Message::user("earlier question"),
        Message::assistant("earlier answer"),
    ];
    engine
        .run("first question", &[], None, CancellationToken::new())
        .await
        .unwrap();
    engine
        .run("follow-up", &prior, None, CancellationToken::new())
        .await
        .unwrap();

    let thinking_prompt = llm.prompt(3);
    assert!(thinking_prompt.contains("earlier question"));
    assert!(thinking_prompt.contains("earlier answer"));
    assert_eq!(prior[0].role, Role::User);
}

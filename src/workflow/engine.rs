//! 工作流引擎
//!
//! 思考 -> 路由 -> (撰写 ⇄ 评审 ⇄ 检索) -> 定稿 的有限状态机。
//! 阶段严格串行（后一阶段的输入依赖前一阶段的输出），唯一的并发在阶段内部：
//! 补全调用边流 Token 边推送事件，引擎阻塞等待该调用完整结束。
//! 评审循环是图中唯一的环，由评审上限与 is_new_critique 信号共同保证终止，
//! 两者都由引擎强制执行，不信任模型自觉。

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::LlmTimeoutsSection;
use crate::core::AgentError;
use crate::llm::{structured, CompletionClient};
use crate::memory::Message;
use crate::search::{SearchClient, SearchMode};
use crate::workflow::decision::{
    next_after_critique, next_after_routing, CritiqueDecision, RouteDecision,
};
use crate::workflow::events::{send_event, AgentEvent};
use crate::workflow::prompts;
use crate::workflow::state::{SessionState, Stage};

/// 工具结果事件预览最大字符数
const RESULT_PREVIEW_CHARS: usize = 200;

/// 流式事件的 Token 种类（推理侧信道 / 最终回答）
enum TokenKind {
    Reasoning,
    Final,
}

/// 工作流引擎：持有共享的补全与检索客户端（只读句柄，可多交换并发复用），
/// 每次 run 新建独占的 SessionState
pub struct WorkflowEngine {
    llm: Arc<dyn CompletionClient>,
    search: Arc<dyn SearchClient>,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl WorkflowEngine {
    pub fn new(llm: Arc<dyn CompletionClient>, search: Arc<dyn SearchClient>) -> Self {
        Self {
            llm,
            search,
            request_timeout: Duration::from_secs(60),
            stream_timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(
        llm: Arc<dyn CompletionClient>,
        search: Arc<dyn SearchClient>,
        timeouts: &LlmTimeoutsSection,
    ) -> Self {
        Self::new(llm, search).with_timeouts(
            Duration::from_secs(timeouts.request),
            Duration::from_secs(timeouts.stream),
        )
    }

    /// 设置外部调用超时（request：单次调用；stream：相邻 Token 间隔）
    pub fn with_timeouts(mut self, request: Duration, stream: Duration) -> Self {
        self.request_timeout = request;
        self.stream_timeout = stream;
        self
    }

    /// 执行一次完整交换：问题 -> 最终回答
    ///
    /// prior_messages 为本会话先前轮次的历史（跨问题保留由调用方负责）。
    /// 取消令牌仅在阶段之间检查，绝不打断阶段内的阻塞调用。
    /// 任何未恢复的阶段失败直接返回 Err，不产出 final_answer。
    pub async fn run(
        &self,
        question: &str,
        prior_messages: &[Message],
        event_tx: Option<&UnboundedSender<AgentEvent>>,
        cancel: CancellationToken,
    ) -> Result<String, AgentError> {
        let exchange_id = uuid::Uuid::new_v4();
        let mut state = SessionState::new(question, prior_messages);
        let mut stage = Stage::Thinking;

        tracing::info!(%exchange_id, question = %question, "exchange started");

        loop {
            if cancel.is_cancelled() {
                send_event(&event_tx, AgentEvent::Error {
                    text: "Cancelled by user".to_string(),
                });
                return Err(AgentError::Cancelled);
            }

            send_event(&event_tx, AgentEvent::StageUpdate {
                stage: stage.name().to_string(),
            });
            tracing::debug!(
                %exchange_id,
                stage = stage.name(),
                critique_rounds = state.critique_log.len(),
                cached_queries = state.search_cache.len(),
                "stage enter"
            );

            if stage == Stage::Done {
                break;
            }

            stage = match self.step(stage, &mut state, &event_tx).await {
                Ok(next) => next,
                Err(e) => {
                    send_event(&event_tx, AgentEvent::Error { text: e.to_string() });
                    tracing::warn!(%exchange_id, stage = stage.name(), error = %e, "exchange aborted");
                    return Err(e);
                }
            };
        }

        let (prompt_tokens, completion_tokens, total_tokens) = self.llm.token_usage();
        tracing::info!(
            %exchange_id,
            critique_rounds = state.critique_log.len(),
            cached_queries = state.search_cache.len(),
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "exchange finished"
        );

        state
            .final_answer
            .ok_or_else(|| AgentError::LlmError("exchange finished without a final answer".to_string()))
    }

    /// 执行单个阶段并返回下一阶段（转移表见 decision 模块）
    async fn step(
        &self,
        stage: Stage,
        state: &mut SessionState,
        events: &Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<Stage, AgentError> {
        match stage {
            Stage::Thinking => {
                self.think(state, events).await?;
                Ok(Stage::Routing)
            }
            Stage::Routing => {
                let decision = self.route(state).await?;
                Ok(next_after_routing(&decision))
            }
            Stage::Answering => {
                self.draft(state).await?;
                Ok(Stage::Critiquing)
            }
            Stage::Critiquing => {
                let decision = self.critique(state).await?;
                Ok(next_after_critique(&decision, state.critique_log.len()))
            }
            Stage::Searching => {
                // 检索后一律回到撰写：首稿前检索与评审补数据共用同一条重写路径
                self.search_web(state, events).await?;
                Ok(Stage::Answering)
            }
            Stage::Finalizing => {
                self.finalize(state, events).await?;
                Ok(Stage::Done)
            }
            Stage::Done => Ok(Stage::Done),
        }
    }

    /// THINKING：清空瞬态字段，流式产出推理笔记
    async fn think(
        &self,
        state: &mut SessionState,
        events: &Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<(), AgentError> {
        state.reset_transients();

        let system = prompts::render(
            prompts::REASONER_TEMPLATE,
            &[("user_question", state.question())],
        );
        let mut messages = vec![Message::system(system)];
        messages.extend(state.messages.iter().cloned());

        let notes = self
            .stream_completion(&messages, events, TokenKind::Reasoning)
            .await?;
        state.reasoning_notes = notes;
        Ok(())
    }

    /// ROUTING：结构化决策 {search_query, final_decision}；不可解析时降级 finalize
    async fn route(&self, state: &mut SessionState) -> Result<RouteDecision, AgentError> {
        let system = prompts::render(
            prompts::ROUTER_TEMPLATE,
            &[
                ("user_question", state.question()),
                ("reasoning_notes", &state.reasoning_notes),
                (
                    "format_instructions",
                    &structured::schema_instructions::<RouteDecision>(),
                ),
            ],
        );

        let output = self.complete(&[Message::system(system)]).await?;
        let decision = match structured::parse_structured::<RouteDecision>(&output) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "routing decision unparseable, falling back to finalize");
                RouteDecision::default()
            }
        };

        state.routing_decision = decision.final_decision.clone();
        state.search_query = decision.search_query.trim().to_string();
        // 首次检索一律 basic，deep 留给评审阶段按需升级
        state.search_mode = SearchMode::Basic;

        tracing::info!(decision = %state.routing_decision, query = %state.search_query, "routing decision");
        Ok(decision)
    }

    /// ANSWERING：基于推理笔记与全部累计检索结果撰写草稿
    async fn draft(&self, state: &mut SessionState) -> Result<(), AgentError> {
        let system = prompts::render(
            prompts::WRITER_TEMPLATE,
            &[
                ("user_question", state.question()),
                ("reasoning_notes", &state.reasoning_notes),
                ("search_results", &state.search_results_block()),
            ],
        );

        let output = self.complete(&[Message::system(system)]).await?;
        state.draft_answer = output;
        Ok(())
    }

    /// CRITIQUING：结构化评审决策；新意见追加进 critique_log
    async fn critique(&self, state: &mut SessionState) -> Result<CritiqueDecision, AgentError> {
        let system = prompts::render(
            prompts::CRITIC_TEMPLATE,
            &[
                ("user_question", state.question()),
                ("reasoning_notes", &state.reasoning_notes),
                ("draft_answer", &state.draft_answer),
                ("critique_log", &state.critique_block()),
                ("search_results", &state.search_results_block()),
                (
                    "format_instructions",
                    &structured::schema_instructions::<CritiqueDecision>(),
                ),
            ],
        );

        let output = self.complete(&[Message::system(system)]).await?;
        let decision = match structured::parse_structured::<CritiqueDecision>(&output) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "critique decision unparseable, falling back to good");
                CritiqueDecision::default()
            }
        };

        state.routing_decision = decision.final_decision.clone();
        state.search_query = decision.search_query.trim().to_string();
        state.search_mode = decision.mode();

        if decision.is_novel() {
            state.critique_log.push(decision.critique.trim().to_string());
        }

        tracing::info!(
            decision = %state.routing_decision,
            is_new = decision.is_new_critique,
            critique_rounds = state.critique_log.len(),
            "critique decision"
        );
        Ok(decision)
    }

    /// SEARCHING：执行检索并写入缓存（同一字面查询幂等）
    async fn search_web(
        &self,
        state: &mut SessionState,
        events: &Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<(), AgentError> {
        let query = state.search_query.clone();
        let mode = state.search_mode;

        send_event(events, AgentEvent::ToolStart {
            tool: "web_search".to_string(),
            query: query.clone(),
            mode: mode.as_str().to_string(),
        });

        let payload = timeout(self.request_timeout, self.search.search(&query, mode))
            .await
            .map_err(|_| AgentError::NetworkTimeout)?
            .map_err(AgentError::SearchError)?;

        let preview: String = payload.to_string().chars().take(RESULT_PREVIEW_CHARS).collect();
        send_event(events, AgentEvent::ToolResult {
            tool: "web_search".to_string(),
            preview: preview.clone(),
        });

        state
            .messages
            .push(Message::tool(format!("web_search[{}] {}: {}", mode.as_str(), query, preview)));
        state.cache_result(&query, payload);
        Ok(())
    }

    /// FINALIZING：汇总草稿、检索结果与全部评审意见，流式产出最终回答
    async fn finalize(
        &self,
        state: &mut SessionState,
        events: &Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<(), AgentError> {
        let system = prompts::render(
            prompts::FINALIZER_TEMPLATE,
            &[
                ("user_question", state.question()),
                ("reasoning_notes", &state.reasoning_notes),
                ("draft_answer", &state.draft_answer),
                ("search_results", &state.search_results_block()),
                ("critique_log", &state.critique_block()),
            ],
        );

        let answer = self
            .stream_completion(&[Message::system(system)], events, TokenKind::Final)
            .await?;
        state.messages.push(Message::assistant(answer.clone()));
        state.final_answer = Some(answer);
        Ok(())
    }

    /// 带超时的非流式补全
    async fn complete(&self, messages: &[Message]) -> Result<String, AgentError> {
        timeout(self.request_timeout, self.llm.complete(messages))
            .await
            .map_err(|_| AgentError::NetworkTimeout)?
            .map_err(AgentError::LlmError)
    }

    /// 带超时的流式补全：Token 随到随推给展示层，同时累计为完整文本
    async fn stream_completion(
        &self,
        messages: &[Message],
        events: &Option<&UnboundedSender<AgentEvent>>,
        kind: TokenKind,
    ) -> Result<String, AgentError> {
        let mut stream = timeout(self.request_timeout, self.llm.complete_stream(messages))
            .await
            .map_err(|_| AgentError::NetworkTimeout)?
            .map_err(AgentError::LlmError)?;

        let mut acc = String::new();
        loop {
            let next = timeout(self.stream_timeout, stream.next())
                .await
                .map_err(|_| AgentError::NetworkTimeout)?;
            let Some(token) = next else { break };
            let token = token.map_err(AgentError::LlmError)?;
            if token.is_empty() {
                continue;
            }
            let ev = match kind {
                TokenKind::Reasoning => AgentEvent::ReasoningToken { text: token.clone() },
                TokenKind::Final => AgentEvent::FinalToken { text: token.clone() },
            };
            send_event(events, ev);
            acc.push_str(&token);
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionClient;
    use crate::search::MockSearchClient;

    #[tokio::test]
    async fn test_mock_flow_finalizes_directly() {
        // Mock LLM 对结构化请求一律回 finalize，应走 思考->路由->定稿
        let engine = WorkflowEngine::new(
            Arc::new(MockCompletionClient),
            Arc::new(MockSearchClient),
        );
        let answer = engine
            .run("hello", &[], None, CancellationToken::new())
            .await
            .unwrap();
        assert!(answer.contains("hello"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let engine = WorkflowEngine::new(
            Arc::new(MockCompletionClient),
            Arc::new(MockSearchClient),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine.run("hello", &[], None, cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }
}

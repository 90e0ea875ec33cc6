//! 各阶段提示词模板
//!
//! 模板用 {placeholder} 占位，render 逐个替换。决策类模板末尾拼入
//! llm::structured::schema_instructions 生成的 JSON Schema。

pub const REASONER_TEMPLATE: &str = r#"You are an analyst agent. Think the user's question through before any answer is written.
Write down your thoughts: why is the user asking this, what exactly do they need, and is this really the question they meant to ask?
Web search will be available later in the workflow, so take it into account while planning - but do not plan a search for things you already know.
If the answer depends on current or recent information, prefer searching, since your knowledge may be stale.

User question: {user_question}
"#;

pub const ROUTER_TEMPLATE: &str = r#"You are a coordinator agent. Decide the first step for answering the user's question.

User question: {user_question}

Your thoughts about the question:
<THINK>
{reasoning_notes}
</THINK>

Pick exactly one decision:
1. finalize - everything needed for the answer is already at hand, or the question is simple and clear; go straight to the final answer.
2. search - a web search is needed first; put the query text into search_query.
3. writer - a detailed draft should be written first and then reviewed by a critic.

Respond with JSON only, matching this schema:
{format_instructions}"#;

pub const WRITER_TEMPLATE: &str = r#"You are a writer agent. Answer the user's question, taking your earlier thoughts into account.

User question: {user_question}

Your thoughts about the question:
<THINK>
{reasoning_notes}
</THINK>

Search results (if any):
<SEARCH_RESULTS>
{search_results}
</SEARCH_RESULTS>

Now answer the user:
"#;

pub const CRITIC_TEMPLATE: &str = r#"You are a critic agent. Evaluate the draft answer to the user's question and decide what to do with it:
good - the draft is ready, nothing new to add;
search - web data is needed to improve it; put the query text into search_query and pick search_mode (basic first; deep only if an earlier basic search on the topic was not enough);
fix - the draft should be rewritten; put your concrete feedback into critique and set is_new_critique to true only if it is not a repeat of earlier feedback.

User question: {user_question}

Your thoughts about the question:
<THINK>
{reasoning_notes}
</THINK>

Draft answer:
<DRAFT>
{draft_answer}
</DRAFT>

Feedback you already gave earlier (do not repeat it):
<OLD_CRITIQUE>
{critique_log}
</OLD_CRITIQUE>

Search results (if any):
<SEARCH_RESULTS>
{search_results}
</SEARCH_RESULTS>

Respond with JSON only, matching this schema:
{format_instructions}"#;

pub const FINALIZER_TEMPLATE: &str = r#"You are the finalizing editor. Write the final answer, reconciling the draft, your earlier thoughts and every piece of critique below.

User question: {user_question}

Your thoughts about the question:
<THINK>
{reasoning_notes}
</THINK>

Draft answer:
<DRAFT>
{draft_answer}
</DRAFT>

Search results (if any):
<SEARCH_RESULTS>
{search_results}
</SEARCH_RESULTS>

Critique of the draft (address all of it):
<CRITIQUE>
{critique_log}
</CRITIQUE>

Write the final version of the answer, clear and complete:
"#;

/// 逐个替换 {key} 占位符
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_placeholders() {
        let out = render(
            ROUTER_TEMPLATE,
            &[
                ("user_question", "2+2?"),
                ("reasoning_notes", "trivial arithmetic"),
                ("format_instructions", "{schema}"),
            ],
        );
        assert!(out.contains("2+2?"));
        assert!(out.contains("trivial arithmetic"));
        assert!(!out.contains("{user_question}"));
        assert!(!out.contains("{format_instructions}"));
    }
}

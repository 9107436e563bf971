//! LLM-as-judge evaluator.

use super::evaluator::{Evaluator, error_result};
use crate::providers::ChatModel;
use crate::types::EvaluationResult;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// Judging instruction sent as the system message.
pub const JUDGE_PROMPT: &str = "You are a system that evaluates the correctness of a response to a question.
The question will be provided in <question>...</question> tags.
The response will be provided in <response>...</response> tags.
The expected answer will be provided in <expected_answer>...</expected_answer> tags.

The response doesn't have to exactly match all the words/context the expected answer. It just needs to be right about
the answer to the actual question itself.

Evaluate whether the response is correct or not, and return your reasoning in <reasoning>...</reasoning> tags.
Then return the result in <result>...</result> tags, either as 'true' or 'false'.";

/// Asks a chat model whether the response matches the expected answer.
pub struct LlmJudgeEvaluator {
    model: Arc<dyn ChatModel>,
}

impl LlmJudgeEvaluator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

fn judge_message(question: &str, response: &str, expected_answer: &str) -> String {
    format!(
        "<question>\n{question}\n</question>\n\
         <response>\n{response}\n</response>\n\
         <expected_answer>\n{expected_answer}\n</expected_answer>"
    )
}

/// Trimmed content of the first `<tag>...</tag>` pair, if any.
pub fn extract_xml_tag(text: &str, tag: &str) -> Option<String> {
    let tag = regex::escape(tag);
    let re = Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>")).ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

#[async_trait]
impl Evaluator for LlmJudgeEvaluator {
    async fn evaluate(
        &self,
        question: &str,
        response: &str,
        expected_answer: &str,
    ) -> EvaluationResult {
        let user = judge_message(question, response, expected_answer);
        let raw = match self.model.complete(JUDGE_PROMPT, &user).await {
            Ok(raw) => raw,
            Err(e) => return error_result(question, response, expected_answer, e),
        };
        debug!(model = self.model.model_name(), reply = %raw, "Judge reply");

        let (is_correct, reasoning) = match extract_xml_tag(&raw, "result") {
            Some(result) => (
                result.eq_ignore_ascii_case("true"),
                extract_xml_tag(&raw, "reasoning").unwrap_or_default(),
            ),
            None => (false, format!("No result found: ({raw})")),
        };

        EvaluationResult {
            question: question.to_string(),
            response: response.to_string(),
            expected_answer: expected_answer.to_string(),
            is_correct,
            reasoning,
        }
    }
}

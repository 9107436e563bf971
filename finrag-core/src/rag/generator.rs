//! Answer generation from retrieved context.

use crate::error::Result;
use crate::providers::ChatModel;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Instruction sent with every generation request.
pub const SYSTEM_PROMPT: &str = "Eres un analista financiero experto en empresas argentinas. \
Responde en español con base EXCLUSIVA en el contexto provisto. \
Tu tarea es interpretar correctamente términos financieros y sus equivalentes abreviados \
(por ejemplo: \"EBITDA Aj.\" = \"EBITDA Ajustado\", \"Flujo libre\" = \"FCF\"). \
Entiende sinónimos y siglas, y prioriza los datos consolidados sobre los de segmentos. \
Si hay números o valores explícitos, devuélvelos de forma clara y unificada. \
Si el dato no está en el texto, razona con lo más cercano posible dentro del contexto, pero no inventes.";

/// Turns a question and its supporting passages into an answer.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate_response(&self, query: &str, context: &[String]) -> Result<String>;
}

/// Generator backed by a chat model. The reply is returned untouched.
pub struct LlmResponseGenerator {
    model: Arc<dyn ChatModel>,
}

impl LlmResponseGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

/// User message carrying the joined passages and the question in tags.
pub fn build_user_message(query: &str, context: &[String]) -> String {
    format!(
        "<context>\n{}\n</context>\n<question>\n{}\n</question>",
        context.join("\n"),
        query
    )
}

#[async_trait]
impl ResponseGenerator for LlmResponseGenerator {
    async fn generate_response(&self, query: &str, context: &[String]) -> Result<String> {
        let user = build_user_message(query, context);
        debug!(
            model = self.model.model_name(),
            passages = context.len(),
            chars = user.len(),
            "Generating response"
        );
        Ok(self.model.complete(SYSTEM_PROMPT, &user).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, RagError};
    use crate::providers::MockChatModel;

    #[test]
    fn test_user_message_layout() {
        let msg = build_user_message(
            "¿Deuda neta?",
            &["Pasaje uno".to_string(), "Pasaje dos".to_string()],
        );
        assert_eq!(
            msg,
            "<context>\nPasaje uno\nPasaje dos\n</context>\n<question>\n¿Deuda neta?\n</question>"
        );
    }

    #[test]
    fn test_system_prompt_constraints() {
        assert!(SYSTEM_PROMPT.contains("español"));
        assert!(SYSTEM_PROMPT.contains("EXCLUSIVA"));
        assert!(SYSTEM_PROMPT.contains("\"EBITDA Aj.\" = \"EBITDA Ajustado\""));
        assert!(SYSTEM_PROMPT.contains("consolidados sobre los de segmentos"));
    }

    #[tokio::test]
    async fn test_returns_raw_reply() {
        let model = Arc::new(MockChatModel::with_response("  EBITDA: USD 4.900 M  "));
        let generator = LlmResponseGenerator::new(model.clone());
        let answer = generator
            .generate_response("EBITDA?", &["ctx".to_string()])
            .await
            .unwrap();
        assert_eq!(answer, "  EBITDA: USD 4.900 M  ");

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, SYSTEM_PROMPT);
        assert!(calls[0].1.starts_with("<context>\nctx\n</context>"));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let model = Arc::new(MockChatModel::new());
        model.queue_reply(Err(ProviderError::Connection {
            message: "reset".into(),
        }));
        let err = LlmResponseGenerator::new(model)
            .generate_response("q", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Provider(_)));
    }
}

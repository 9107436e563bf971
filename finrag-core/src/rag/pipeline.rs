//! End-to-end RAG pipeline.
//!
//! Retrieval, generation, guardrails and evaluation run strictly one after
//! another. Evaluation pauses before each question so the chained rerank,
//! chat and embedding calls stay under provider rate limits.

use crate::config::{EvaluationConfig, FinragConfig, JudgeKind};
use crate::error::{RagError, Result};
use crate::eval::{
    Evaluator, LlmJudgeEvaluator, MetricsSummary, SimilarityEvaluator,
    compute_metrics_with_threshold,
};
use crate::persistence::atomic_write_json;
use crate::providers::{create_chat_model, create_embedding_model, create_reranker, pause_ms};
use crate::rag::datastore::{Datastore, SqliteDatastore};
use crate::rag::generator::{LlmResponseGenerator, ResponseGenerator};
use crate::rag::guardrails::ethical_guardrails;
use crate::rag::indexer::{ChunkingIndexer, Indexer};
use crate::rag::retriever::{RerankingRetriever, Retriever};
use crate::types::{Document, EvaluationResult, SampleQuestion};
use std::sync::Arc;
use tracing::{debug, info};

/// Characters of each retrieved passage shown in logs.
const PREVIEW_CHARS: usize = 500;

/// Per-question results of an evaluation run and the metrics written for it.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub results: Vec<EvaluationResult>,
    pub metrics: MetricsSummary,
}

/// Wires the collaborators together.
pub struct RagPipeline {
    datastore: Arc<dyn Datastore>,
    indexer: Arc<dyn Indexer>,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn ResponseGenerator>,
    evaluator: Option<Arc<dyn Evaluator>>,
    evaluation: EvaluationConfig,
}

impl RagPipeline {
    pub fn new(
        datastore: Arc<dyn Datastore>,
        indexer: Arc<dyn Indexer>,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn ResponseGenerator>,
    ) -> Self {
        Self {
            datastore,
            indexer,
            retriever,
            generator,
            evaluator: None,
            evaluation: EvaluationConfig::default(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Pacing, grounding threshold and summary path for [`evaluate`](Self::evaluate).
    pub fn with_evaluation_config(mut self, config: EvaluationConfig) -> Self {
        self.evaluation = config;
        self
    }

    /// Build every collaborator from configuration.
    ///
    /// Fails when a hosted provider's API key is missing from the environment.
    pub fn from_config(config: &FinragConfig) -> Result<Self> {
        let embedder = create_embedding_model(&config.embeddings)?;

        let datastore = match &config.datastore.path {
            Some(path) => SqliteDatastore::open(path, embedder.clone())?,
            None => SqliteDatastore::in_memory(embedder.clone())?,
        }
        .with_batch_size(config.embeddings.batch_size);
        let datastore: Arc<dyn Datastore> = Arc::new(datastore);

        let indexer = Arc::new(ChunkingIndexer::new(config.chunking.clone()));
        let retriever = Arc::new(RerankingRetriever::from_config(
            &config.rerank,
            datastore.clone(),
            create_reranker(&config.rerank)?,
        ));
        let chat = create_chat_model(&config.llm)?;
        let generator = Arc::new(LlmResponseGenerator::new(chat.clone()));

        let evaluator: Arc<dyn Evaluator> = match config.evaluation.judge {
            JudgeKind::Similarity => Arc::new(SimilarityEvaluator::from_config(
                &config.evaluation,
                embedder,
            )),
            JudgeKind::Llm => Arc::new(LlmJudgeEvaluator::new(chat)),
        };

        Ok(Self::new(datastore, indexer, retriever, generator)
            .with_evaluator(evaluator)
            .with_evaluation_config(config.evaluation.clone()))
    }

    /// Remove everything from the datastore.
    pub async fn reset(&self) -> Result<()> {
        self.datastore.reset().await
    }

    /// Index and store documents, returning how many items were added.
    pub async fn add_documents(&self, documents: &[Document]) -> Result<usize> {
        let items = self.indexer.index(documents)?;
        self.datastore.add_items(&items).await?;
        info!(items = items.len(), documents = documents.len(), "Added items to the datastore");
        Ok(items.len())
    }

    /// Retrieve, generate and filter an answer.
    pub async fn process_query(&self, query: &str) -> Result<String> {
        self.process_query_with_top_k(query, self.retriever.default_top_k())
            .await
    }

    pub async fn process_query_with_top_k(&self, query: &str, top_k: usize) -> Result<String> {
        let passages = self.retriever.search(query, top_k).await?;
        info!(count = passages.len(), query, "Found results");
        for (i, passage) in passages.iter().enumerate() {
            debug!(rank = i + 1, passage = %preview(passage), "Retrieved passage");
        }

        let response = self.generator.generate_response(query, &passages).await?;
        Ok(ethical_guardrails(&response))
    }

    /// Answer and judge every question in order, then write the metrics
    /// summary.
    ///
    /// Retrieval and generation errors abort the run. Evaluator problems
    /// only ever show up as incorrect results.
    pub async fn evaluate(&self, questions: &[SampleQuestion]) -> Result<Vec<EvaluationResult>> {
        Ok(self.evaluate_with_metrics(questions).await?.results)
    }

    /// [`evaluate`](Self::evaluate), also returning the written metrics.
    pub async fn evaluate_with_metrics(&self, questions: &[SampleQuestion]) -> Result<EvaluationReport> {
        if questions.is_empty() {
            return Err(RagError::EmptyBatch);
        }
        let evaluator = self
            .evaluator
            .as_ref()
            .ok_or_else(|| RagError::config("pipeline has no evaluator"))?;

        info!(questions = questions.len(), "Starting evaluation");
        let mut results = Vec::with_capacity(questions.len());
        for sample in questions {
            pause_ms(self.evaluation.question_delay_ms).await;
            let response = self.process_query(&sample.question).await?;
            results.push(
                evaluator
                    .evaluate(&sample.question, &response, &sample.answer)
                    .await,
            );
        }

        for (i, result) in results.iter().enumerate() {
            let mark = if result.is_correct { "✅" } else { "❌" };
            info!(
                question = %result.question,
                response = %result.response,
                expected = %result.expected_answer,
                reasoning = %result.reasoning,
                "{mark} Q{}",
                i + 1
            );
        }

        let metrics = compute_metrics_with_threshold(&results, self.evaluation.grounding_threshold)?;
        atomic_write_json(&self.evaluation.summary_path, &metrics)?;
        info!(
            accuracy = metrics.accuracy,
            groundedness = metrics.groundedness,
            hallucination_rate = metrics.hallucination_rate,
            path = %self.evaluation.summary_path.display(),
            "Evaluation summary written"
        );
        info!("Total score: {:.1}% accuracy", metrics.accuracy * 100.0);
        Ok(EvaluationReport { results, metrics })
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::eval::MetricsSummary;
    use crate::persistence::load_json;
    use crate::providers::{HashingEmbeddings, MockChatModel, MockReranker};
    use crate::rag::guardrails::{PREDICTION_REFUSAL, SOURCE_SUFFIX};

    struct Fixture {
        pipeline: RagPipeline,
        chat: Arc<MockChatModel>,
        _dir: tempfile::TempDir,
    }

    fn fixture(chat: MockChatModel, reranker: MockReranker) -> Fixture {
        paced_fixture(chat, reranker, 0)
    }

    fn paced_fixture(chat: MockChatModel, reranker: MockReranker, question_delay_ms: u64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(HashingEmbeddings::new(128));
        let datastore: Arc<dyn Datastore> =
            Arc::new(SqliteDatastore::in_memory(embedder.clone()).unwrap());
        let retriever = Arc::new(
            RerankingRetriever::new(datastore.clone(), Arc::new(reranker))
                .with_retry_policy(RetryPolicy::immediate()),
        );
        let chat = Arc::new(chat);
        let evaluation = EvaluationConfig {
            summary_path: dir.path().join("results").join("evaluation_summary.json"),
            question_delay_ms,
            semantic_delay_ms: 0,
            ..EvaluationConfig::default()
        };

        let pipeline = RagPipeline::new(
            datastore,
            Arc::new(ChunkingIndexer::default()),
            retriever,
            Arc::new(LlmResponseGenerator::new(chat.clone())),
        )
        .with_evaluator(Arc::new(
            SimilarityEvaluator::from_config(&evaluation, embedder),
        ))
        .with_evaluation_config(evaluation);

        Fixture {
            pipeline,
            chat,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_add_documents_reports_count() {
        let f = fixture(MockChatModel::new(), MockReranker::new());
        let added = f
            .pipeline
            .add_documents(&[Document::new("uno"), Document::new("dos")])
            .await
            .unwrap();
        assert_eq!(added, 2);
        f.pipeline.reset().await.unwrap();
        assert_eq!(f.pipeline.datastore.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_process_query_applies_guardrails() {
        let f = fixture(
            MockChatModel::with_response("La deuda neta fue USD 7.000 M"),
            MockReranker::new(),
        );
        f.pipeline
            .add_documents(&[Document::new("Deuda neta consolidada: USD 7.000 M")])
            .await
            .unwrap();

        let answer = f.pipeline.process_query("¿Deuda neta?").await.unwrap();
        assert_eq!(answer, format!("La deuda neta fue USD 7.000 M{SOURCE_SUFFIX}"));
        assert!(f.chat.calls()[0].1.contains("Deuda neta consolidada"));
    }

    #[tokio::test]
    async fn test_prediction_reply_is_refused() {
        let f = fixture(
            MockChatModel::with_response("Nuestra predicción es un alza"),
            MockReranker::new(),
        );
        let answer = f.pipeline.process_query("¿Y el año próximo?").await.unwrap();
        assert_eq!(answer, PREDICTION_REFUSAL);
    }

    #[tokio::test]
    async fn test_evaluate_empty_batch() {
        let f = fixture(MockChatModel::new(), MockReranker::new());
        assert!(matches!(
            f.pipeline.evaluate(&[]).await,
            Err(RagError::EmptyBatch)
        ));
        assert!(f.chat.calls().is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_without_evaluator() {
        let f = fixture(MockChatModel::new(), MockReranker::new());
        let mut pipeline = f.pipeline;
        pipeline.evaluator = None;
        let err = pipeline
            .evaluate(&[SampleQuestion::new("q", "a")])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[tokio::test]
    async fn test_evaluate_writes_summary() {
        let f = fixture(MockChatModel::with_response("USD 7.000 M"), MockReranker::new());
        let questions = vec![
            SampleQuestion::new("¿Deuda neta?", "USD 7.000 M"),
            SampleQuestion::new("¿Dotación?", "25.000 empleados en total en el grupo"),
        ];
        let results = f.pipeline.evaluate(&questions).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].expected_answer, "USD 7.000 M");
        assert!(results[0].reasoning.starts_with("Similarity: "));
        assert!(!results[1].is_correct);

        let summary: MetricsSummary = load_json(&f.pipeline.evaluation.summary_path).unwrap();
        assert_eq!(summary.groundedness + summary.hallucination_rate, 1.0);
        assert_eq!(summary.groundedness, 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluate_pauses_before_each_question() {
        let question_delay_ms = EvaluationConfig::default().question_delay_ms;
        let f = paced_fixture(MockChatModel::new(), MockReranker::new(), question_delay_ms);
        let questions = vec![
            SampleQuestion::new("¿Deuda neta?", "USD 7.000 M"),
            SampleQuestion::new("¿EBITDA?", "USD 4.900 M"),
        ];

        let start = tokio::time::Instant::now();
        let report = f.pipeline.evaluate_with_metrics(&questions).await.unwrap();
        assert_eq!(start.elapsed().as_millis(), 12_000);

        let asked: Vec<String> = f.chat.calls().into_iter().map(|(_, user)| user).collect();
        assert_eq!(asked.len(), 2);
        assert!(asked[0].ends_with("<question>\n¿Deuda neta?\n</question>"));
        assert!(asked[1].ends_with("<question>\n¿EBITDA?\n</question>"));
        assert_eq!(report.results.len(), 2);
        assert_eq!(
            load_json::<MetricsSummary>(&f.pipeline.evaluation.summary_path).unwrap(),
            report.metrics
        );
    }

    #[tokio::test]
    async fn test_rerank_exhaustion_aborts_evaluation() {
        let f = fixture(MockChatModel::new(), MockReranker::always_rate_limited());
        f.pipeline
            .add_documents(&[Document::new("algo de contexto")])
            .await
            .unwrap();
        let err = f
            .pipeline
            .evaluate(&[SampleQuestion::new("q", "a")])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::RateLimitExhausted { .. }));
        assert!(!f.pipeline.evaluation.summary_path.exists());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "ñ".repeat(600);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("corto"), "corto");
    }
}

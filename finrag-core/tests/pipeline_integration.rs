//! End-to-end pipeline tests with scripted providers.

use std::sync::Arc;

use finrag_core::config::{EvaluationConfig, RetryPolicy};
use finrag_core::error::RagError;
use finrag_core::eval::{MetricsSummary, SimilarityEvaluator};
use finrag_core::providers::{HashingEmbeddings, MockChatModel, MockEmbeddings, MockReranker};
use finrag_core::rag::guardrails::{PREDICTION_REFUSAL, SOURCE_SUFFIX};
use finrag_core::rag::{
    ChunkingIndexer, ChunkingStrategy, Datastore, RagPipeline, RerankingRetriever,
    SqliteDatastore, load_documents, load_sample_questions,
};
use finrag_core::rag::generator::LlmResponseGenerator;
use finrag_core::types::SampleQuestion;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Harness {
    pipeline: RagPipeline,
    chat: Arc<MockChatModel>,
    reranker: Arc<MockReranker>,
    judge_embedder: Arc<MockEmbeddings>,
    summary_path: std::path::PathBuf,
    dir: TempDir,
}

fn harness(chat: MockChatModel, reranker: MockReranker) -> Harness {
    let dir = TempDir::new().unwrap();
    let summary_path = dir.path().join("results").join("evaluation_summary.json");

    let datastore: Arc<dyn Datastore> = Arc::new(
        SqliteDatastore::open(
            &dir.path().join("store.db"),
            Arc::new(HashingEmbeddings::new(256)),
        )
        .unwrap(),
    );
    let chat = Arc::new(chat);
    let reranker = Arc::new(reranker);
    let judge_embedder = Arc::new(MockEmbeddings::new(64));

    let evaluation = EvaluationConfig {
        summary_path: summary_path.clone(),
        ..EvaluationConfig::default()
    }
    .without_delays();

    let pipeline = RagPipeline::new(
        datastore.clone(),
        Arc::new(ChunkingIndexer::new(ChunkingStrategy::Sentence {
            max_sentences: 1,
            overlap_sentences: 0,
        })),
        Arc::new(
            RerankingRetriever::new(datastore, reranker.clone())
                .with_top_k(2)
                .with_retry_policy(RetryPolicy::immediate()),
        ),
        Arc::new(LlmResponseGenerator::new(chat.clone())),
    )
    .with_evaluator(Arc::new(SimilarityEvaluator::from_config(
        &evaluation,
        judge_embedder.clone(),
    )))
    .with_evaluation_config(evaluation);

    Harness {
        pipeline,
        chat,
        reranker,
        judge_embedder,
        summary_path,
        dir,
    }
}

const REPORT: &str = "La deuda neta consolidada fue de USD 7.000 millones. \
El EBITDA ajustado alcanzó USD 4.900 millones. \
La dotación total fue de 25.000 empleados.";

#[tokio::test]
async fn ingest_query_and_rerank_order() {
    let h = harness(
        MockChatModel::with_response("El EBITDA Ajustado fue USD 4.900 millones."),
        MockReranker::with_order(vec![2, 0, 1]),
    );
    std::fs::write(h.dir.path().join("ypf.txt"), REPORT).unwrap();
    let docs = load_documents(&[h.dir.path().join("ypf.txt")]).await.unwrap();
    assert_eq!(h.pipeline.add_documents(&docs).await.unwrap(), 3);

    let answer = h.pipeline.process_query("¿EBITDA Aj. 2023?").await.unwrap();
    assert_eq!(
        answer,
        format!("El EBITDA Ajustado fue USD 4.900 millones.{SOURCE_SUFFIX}")
    );
    assert_eq!(h.reranker.call_count(), 1);

    // Two passages reach the model, in the reranker's order.
    let (_, user) = &h.chat.calls()[0];
    let context = user
        .strip_prefix("<context>\n")
        .and_then(|s| s.split("\n</context>").next())
        .unwrap();
    assert_eq!(context.lines().count(), 2);
}

#[tokio::test]
async fn prediction_reply_becomes_refusal() {
    let h = harness(
        MockChatModel::with_response("La predicción para 2025 es de crecimiento."),
        MockReranker::new(),
    );
    h.pipeline
        .add_documents(&[finrag_core::Document::new(REPORT)])
        .await
        .unwrap();
    let answer = h.pipeline.process_query("¿Qué pasará?").await.unwrap();
    assert_eq!(answer, PREDICTION_REFUSAL);
}

#[tokio::test]
async fn rerank_exhaustion_is_fatal() {
    let h = harness(MockChatModel::new(), MockReranker::always_rate_limited());
    h.pipeline
        .add_documents(&[finrag_core::Document::new(REPORT)])
        .await
        .unwrap();

    let err = h.pipeline.process_query("¿Deuda?").await.unwrap_err();
    assert!(matches!(
        err,
        RagError::RateLimitExhausted { ref service, attempts: 5 } if service == "rerank"
    ));
    assert_eq!(h.reranker.call_count(), 5);
    assert!(h.chat.calls().is_empty());
}

#[tokio::test]
async fn evaluation_writes_summary_and_skips_needless_embeddings() {
    let h = harness(MockChatModel::with_response("USD 7.000 M"), MockReranker::new());
    h.pipeline
        .add_documents(&[finrag_core::Document::new(REPORT)])
        .await
        .unwrap();

    let questions_path = h.dir.path().join("questions.json");
    let expected = format!("USD 7.000 M{SOURCE_SUFFIX}").to_uppercase();
    std::fs::write(
        &questions_path,
        serde_json::to_string(&vec![SampleQuestion::new("¿Deuda neta?", expected.clone())])
            .unwrap(),
    )
    .unwrap();
    let questions = load_sample_questions(&questions_path).unwrap();

    let results = h.pipeline.evaluate(&questions).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].is_correct);
    assert!(results[0].reasoning.starts_with("Similarity: 1.00. ✅"));
    assert_eq!(h.judge_embedder.call_count(), 0);

    let raw = std::fs::read_to_string(&h.summary_path).unwrap();
    assert!(raw.contains("    \"accuracy\": 1.0"));
    let summary: MetricsSummary = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        summary,
        MetricsSummary {
            accuracy: 1.0,
            groundedness: 1.0,
            hallucination_rate: 0.0,
        }
    );
}

#[tokio::test]
async fn evaluation_marks_unrelated_answers_incorrect() {
    let h = harness(MockChatModel::with_response("xyz"), MockReranker::new());
    h.judge_embedder
        .set_vector(&format!("xyz{SOURCE_SUFFIX}"), vec![1.0, 0.0]);
    h.judge_embedder.set_vector("25.000", vec![0.0, 1.0]);

    let results = h
        .pipeline
        .evaluate(&[SampleQuestion::new("¿Dotación?", "25.000")])
        .await
        .unwrap();
    assert!(!results[0].is_correct);
    assert!(results[0].reasoning.contains("Semantic Similarity: 0.00. "));
    assert_eq!(h.judge_embedder.call_count(), 1);
}

#[tokio::test]
async fn evaluation_overwrites_previous_summary() {
    let h = harness(MockChatModel::with_response("nada"), MockReranker::new());
    std::fs::create_dir_all(h.summary_path.parent().unwrap()).unwrap();
    std::fs::write(&h.summary_path, "stale").unwrap();

    h.pipeline
        .evaluate(&[SampleQuestion::new("q", "otra cosa")])
        .await
        .unwrap();
    let summary: MetricsSummary =
        serde_json::from_str(&std::fs::read_to_string(&h.summary_path).unwrap()).unwrap();
    assert_eq!(summary.accuracy, 0.0);
}

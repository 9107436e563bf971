//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use finrag_core::FinragConfig;
use finrag_core::RagPipeline;
use finrag_core::rag::{load_documents, load_sample_questions};
use std::path::{Path, PathBuf};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_path),
        Commands::Reset => {
            let pipeline = build_pipeline(&load(workspace, config_path)?)?;
            pipeline.reset().await?;
            println!("Datastore cleared.");
            Ok(())
        }
        Commands::Add { paths } => handle_add(paths, workspace, config_path).await,
        Commands::Query { question, top_k } => {
            let pipeline = build_pipeline(&load(workspace, config_path)?)?;
            let answer = match top_k {
                Some(k) => pipeline.process_query_with_top_k(&question, k).await?,
                None => pipeline.process_query(&question).await?,
            };
            println!("{answer}");
            Ok(())
        }
        Commands::Evaluate { questions, summary } => {
            handle_evaluate(&questions, summary, workspace, config_path).await
        }
    }
}

/// Load configuration and anchor relative data paths at the workspace.
fn load(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<FinragConfig> {
    let mut config = finrag_core::load_config(Some(workspace), config_path)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    resolve_paths(&mut config, workspace);
    tracing::debug!(
        workspace = %workspace.display(),
        llm = %config.llm.model,
        embeddings = ?config.embeddings.provider,
        rerank = ?config.rerank.provider,
        "Loaded configuration"
    );
    Ok(config)
}

fn resolve_paths(config: &mut FinragConfig, workspace: &Path) {
    if let Some(path) = config.datastore.path.as_mut()
        && path.is_relative()
    {
        *path = workspace.join(&*path);
    }
    if config.evaluation.summary_path.is_relative() {
        config.evaluation.summary_path = workspace.join(&config.evaluation.summary_path);
    }
}

/// `--summary` wins over the configured path; relative values sit in the workspace.
fn override_summary_path(config: &mut FinragConfig, summary: Option<PathBuf>, workspace: &Path) {
    if let Some(summary) = summary {
        config.evaluation.summary_path = workspace.join(summary);
    }
}

fn build_pipeline(config: &FinragConfig) -> anyhow::Result<RagPipeline> {
    RagPipeline::from_config(config).map_err(|e| anyhow::anyhow!("Failed to build pipeline: {}", e))
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let path = workspace.join("finrag.toml");
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                return Ok(());
            }
            let toml_str = toml::to_string_pretty(&FinragConfig::default())?;
            std::fs::write(&path, &toml_str)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = finrag_core::load_config(Some(workspace), config_path)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn handle_add(
    paths: Vec<PathBuf>,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&load(workspace, config_path)?)?;
    let documents = load_documents(&paths).await?;
    if documents.is_empty() {
        println!("No supported documents found.");
        return Ok(());
    }
    let added = pipeline.add_documents(&documents).await?;
    println!(
        "Added {} items from {} documents to the datastore.",
        added,
        documents.len()
    );
    Ok(())
}

async fn handle_evaluate(
    questions_path: &Path,
    summary: Option<PathBuf>,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = load(workspace, config_path)?;
    override_summary_path(&mut config, summary, workspace);
    let questions = load_sample_questions(questions_path)?;
    let pipeline = build_pipeline(&config)?;

    println!("Evaluating {} questions...", questions.len());
    let report = pipeline.evaluate_with_metrics(&questions).await?;

    for (i, result) in report.results.iter().enumerate() {
        let mark = if result.is_correct { "✅" } else { "❌" };
        println!("{mark} Q{}: {}", i + 1, result.question);
        println!("Response: {}", result.response);
        println!("Expected: {}", result.expected_answer);
        println!("Reasoning: {}\n{}", result.reasoning, "-".repeat(50));
    }

    let metrics = report.metrics;
    println!("\nEvaluation summary:");
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    println!(
        "Total score: {:.1}% accuracy (summary written to {})",
        metrics.accuracy * 100.0,
        config.evaluation.summary_path.display()
    );
    Ok(())
}

//! Command line interface for arxivlens.
//!
//! Indexes PDFs into per-document vector indexes and searches them with history-aware query
//! expansion and a confidence filter.
//!
//! # Usage
//!
//! ```bash
//! # Index a paper with a local ONNX sentence encoder
//! arxivlens --model-dir ./models/all-MiniLM-L6-v2 index attention.pdf
//!
//! # Search it, expanding the query with earlier user turns
//! arxivlens --model-dir ./models/all-MiniLM-L6-v2 search attention.pdf "how does it scale?" \
//!     --history chat.json -k 8
//!
//! # Offline mode without model files
//! arxivlens --hashing-dim 512 index attention.pdf --force
//!
//! # Inspect or delete persisted artifacts
//! arxivlens status attention.pdf
//! arxivlens forget attention.pdf
//! ```
//!
//! Set `RUST_LOG=arxivlens_retrieval=debug` to trace cache hits and index builds.

mod model;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arxivlens_core::{EmbeddingModel, Message};
use arxivlens_pdf::PdfExtractor;
use arxivlens_retrieval::{Pipeline, RetrievalConfig, SearchOutcome};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::model::{Backend, ModelChoice};

#[derive(Parser, Debug)]
#[command(name = "arxivlens", version, about)]
struct Args {
    /// Directory holding an ONNX sentence encoder (`model.onnx` and `tokenizer.json`).
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Use the offline hashing embedder with this many dimensions.
    #[arg(long, global = true, conflicts_with = "model_dir")]
    hashing_dim: Option<usize>,

    /// TOML file with retrieval settings.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for persisted indexes. Overrides the config file.
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, chunk and index a PDF.
    Index {
        /// PDF to index.
        pdf: PathBuf,
        /// Rebuild even if an index already exists.
        #[arg(long)]
        force: bool,
    },
    /// Search an indexed PDF. Indexes it first if needed.
    Search {
        /// PDF to search.
        pdf: PathBuf,
        /// Question or keywords.
        query: String,
        /// Number of nearest neighbors considered before filtering. Defaults to the config's
        /// `top_k`.
        #[arg(short)]
        k: Option<usize>,
        /// JSON file with earlier turns: `[{"role": "user", "content": "..."}]`.
        #[arg(long)]
        history: Option<PathBuf>,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the manifest of an indexed PDF.
    Status {
        /// PDF to inspect.
        pdf: PathBuf,
    },
    /// Delete the persisted index of a PDF.
    Forget {
        /// PDF whose index is deleted.
        pdf: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let top_k = match &args.command {
        Command::Search { k, .. } => *k,
        _ => None,
    };
    let config = load_config(args.config.as_deref(), args.index_dir, top_k)?;

    let choice = ModelChoice::from_args(args.model_dir.map(|p| expand_tilde(&p)), args.hashing_dim);
    let service = choice.into_service();
    let model = service.initialize().context("failed to load embedding model")?;
    info!(model = %model.model_id(), dim = model.dim(), "embedding model ready");

    let pipeline: Pipeline<Backend, PdfExtractor> =
        Pipeline::new(config, model, PdfExtractor::new())?;

    match args.command {
        Command::Index { pdf, force } => {
            let report = pipeline.process(&pdf, force).await?;
            if report.reused {
                println!(
                    "{}: already indexed ({} chunks, {}). Use --force to rebuild.",
                    pdf.display(),
                    report.chunk_count,
                    report.index_kind
                );
            } else {
                println!(
                    "{}: indexed {} chunks ({}), {} table rows, {} images",
                    pdf.display(),
                    report.chunk_count,
                    report.index_kind,
                    report.tables.len(),
                    report.images.len()
                );
            }
        }
        Command::Search {
            pdf,
            query,
            history,
            json,
            ..
        } => {
            let history = match history {
                Some(path) => read_history(&path)?,
                None => Vec::new(),
            };
            let outcome = pipeline.retrieve(&pdf, &query, &history).await?;
            print_outcome(&outcome, json)?;
        }
        Command::Status { pdf } => match pipeline.status(&pdf)? {
            Some(manifest) => println!("{}", serde_json::to_string_pretty(&manifest)?),
            None => println!("{}: not indexed", pdf.display()),
        },
        Command::Forget { pdf } => {
            if pipeline.forget(&pdf)? {
                println!("{}: index deleted", pdf.display());
            } else {
                println!("{}: nothing to delete", pdf.display());
            }
        }
    }

    Ok(())
}

fn load_config(
    path: Option<&Path>,
    index_dir: Option<PathBuf>,
    top_k: Option<usize>,
) -> Result<RetrievalConfig> {
    let mut config = match path {
        Some(path) => RetrievalConfig::from_file(expand_tilde(path))
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => RetrievalConfig::default(),
    };
    if let Some(dir) = index_dir {
        config.index_dir = expand_tilde(&dir);
    }
    if let Some(top_k) = top_k {
        config.top_k = top_k;
    }
    Ok(config)
}

fn read_history(path: &Path) -> Result<Vec<Message>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read history {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid history {}", path.display()))
}

fn print_outcome(outcome: &SearchOutcome, json: bool) -> Result<()> {
    if json {
        let value = match outcome {
            SearchOutcome::Hits(hits) => serde_json::to_value(hits)?,
            SearchOutcome::NoRelevantInformation => serde_json::Value::Array(Vec::new()),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match outcome {
        SearchOutcome::Hits(hits) => {
            for (rank, hit) in hits.iter().enumerate() {
                println!("{}. [chunk {} | d={:.4}] {}", rank + 1, hit.id, hit.distance, hit.text);
            }
        }
        SearchOutcome::NoRelevantInformation => {
            for text in outcome.texts() {
                println!("{text}");
            }
        }
    }
    Ok(())
}

/// Expand ~ to home directory in a path.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_search_with_global_options() {
        let args = Args::try_parse_from([
            "arxivlens",
            "search",
            "paper.pdf",
            "what is attention?",
            "-k",
            "8",
            "--hashing-dim",
            "256",
        ])
        .unwrap();

        assert_eq!(args.hashing_dim, Some(256));
        match args.command {
            Command::Search { pdf, query, k, .. } => {
                assert_eq!(pdf, PathBuf::from("paper.pdf"));
                assert_eq!(query, "what is attention?");
                assert_eq!(k, Some(8));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn model_dir_conflicts_with_hashing() {
        let result = Args::try_parse_from([
            "arxivlens",
            "--model-dir",
            "m",
            "--hashing-dim",
            "8",
            "status",
            "paper.pdf",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn index_dir_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("arxivlens.toml");
        std::fs::write(&file, "top_k = 3\nindex_dir = \"/from/file\"\n").unwrap();

        let config = load_config(Some(&file), Some("/from/flag".into()), None).unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.index_dir, PathBuf::from("/from/flag"));
    }

    #[test]
    fn config_top_k_survives_search_without_k() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("arxivlens.toml");
        std::fs::write(&file, "top_k = 8\n").unwrap();

        let args = Args::try_parse_from([
            "arxivlens",
            "--config",
            file.to_str().unwrap(),
            "search",
            "paper.pdf",
            "what is attention?",
        ])
        .unwrap();
        let Command::Search { k, .. } = args.command else {
            panic!("expected search");
        };
        assert_eq!(k, None);

        let config = load_config(args.config.as_deref(), None, k).unwrap();
        assert_eq!(config.top_k, 8);

        let config = load_config(Some(&file), None, Some(2)).unwrap();
        assert_eq!(config.top_k, 2);
    }

    #[test]
    fn history_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("chat.json");
        std::fs::write(&file, r#"[{"role":"user","content":"explain transformers"}]"#).unwrap();

        assert_eq!(
            read_history(&file).unwrap(),
            vec![Message::user("explain transformers")]
        );
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_tilde(Path::new("~/models"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("models"));
        }
        assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
    }
}

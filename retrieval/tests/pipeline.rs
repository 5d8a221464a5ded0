//! Document lifecycle through [`Pipeline`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arxivlens_core::{AnswerContext, AnswerGenerator, ExtractedDocument, Extractor, Message};
use arxivlens_retrieval::{
    HashingEmbedding, IndexKind, NO_RELEVANT_INFORMATION, Pipeline, RetrievalConfig,
    RetrievalError, SearchOutcome,
};
use parking_lot::Mutex;
use tempfile::{TempDir, tempdir};

const PAPER: &str =
    "Transformers use self-attention. RNNs process sequences sequentially. Attention requires no recurrence.";

struct TextFile {
    tables: Vec<String>,
}

impl Extractor for TextFile {
    fn extract(&self, path: &Path) -> arxivlens_core::Result<ExtractedDocument> {
        Ok(ExtractedDocument {
            text: fs::read_to_string(path)?,
            tables: self.tables.clone(),
            images: Vec::new(),
        })
    }
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<AnswerContext>>,
}

impl AnswerGenerator for Recorder {
    async fn generate(
        &self,
        query: &str,
        context: &AnswerContext,
        _history: &[Message],
    ) -> arxivlens_core::Result<String> {
        self.seen.lock().push(context.clone());
        Ok(format!("{query}: {}", context.chunks.join(" ")))
    }
}

struct Broken;

impl AnswerGenerator for Broken {
    async fn generate(
        &self,
        _query: &str,
        _context: &AnswerContext,
        _history: &[Message],
    ) -> arxivlens_core::Result<String> {
        Err(anyhow::anyhow!("model offline"))
    }
}

fn pipeline_in(
    dir: &Path,
    dim: usize,
    tables: Vec<String>,
    top_k: usize,
) -> Pipeline<HashingEmbedding, TextFile> {
    let config = RetrievalConfig::builder()
        .index_dir(dir.join("indexes"))
        .max_chunk_chars(40)
        .top_k(top_k)
        .build();
    Pipeline::new(
        config,
        Arc::new(HashingEmbedding::new(dim)),
        TextFile { tables },
    )
    .unwrap()
}

struct Fixture {
    dir: TempDir,
    pipeline: Pipeline<HashingEmbedding, TextFile>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_tables(Vec::new())
    }

    fn with_tables(tables: Vec<String>) -> Self {
        Self::build(tables, 3)
    }

    fn with_top_k(top_k: usize) -> Self {
        Self::build(Vec::new(), top_k)
    }

    fn build(tables: Vec<String>, top_k: usize) -> Self {
        let dir = tempdir().unwrap();
        let pipeline = pipeline_in(dir.path(), 1024, tables, top_k);
        Self { dir, pipeline }
    }

    fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }
}

#[tokio::test]
async fn process_skips_existing_unless_forced() {
    let fixture = Fixture::new();
    let paper = fixture.write("paper.txt", PAPER);

    let first = fixture.pipeline.process(&paper, false).await.unwrap();
    assert!(!first.reused);
    assert_eq!(first.chunk_count, 3);
    assert_eq!(first.index_kind, IndexKind::Flat);

    let second = fixture.pipeline.process(&paper, false).await.unwrap();
    assert!(second.reused);
    assert_eq!(second.chunk_count, 3);

    fs::write(&paper, "Only one sentence now.").unwrap();
    let unchanged = fixture.pipeline.process(&paper, false).await.unwrap();
    assert_eq!(unchanged.chunk_count, 3);

    let forced = fixture.pipeline.process(&paper, true).await.unwrap();
    assert!(!forced.reused);
    assert_eq!(forced.chunk_count, 1);
}

#[tokio::test]
async fn retrieve_ranks_relevant_chunks() {
    let fixture = Fixture::new();
    let paper = fixture.write("paper.txt", PAPER);
    fixture.pipeline.process(&paper, false).await.unwrap();

    let outcome = fixture
        .pipeline
        .retrieve(&paper, "self-attention", &[])
        .await
        .unwrap();
    assert_eq!(
        outcome.texts(),
        vec![
            "Transformers use self-attention.".to_string(),
            "Attention requires no recurrence.".to_string(),
        ]
    );
}

#[tokio::test]
async fn retrieve_rebuilds_missing_artifacts() {
    let fixture = Fixture::new();
    let paper = fixture.write("paper.txt", PAPER);

    let outcome = fixture
        .pipeline
        .retrieve(&paper, "self-attention", &[])
        .await
        .unwrap();
    assert_eq!(outcome.hits()[0].id, 0);

    let manifest = fixture.pipeline.status(&paper).unwrap().unwrap();
    let paths = fixture.pipeline.store().store().paths(&manifest.document);
    fs::remove_file(&paths.chunks).unwrap();

    let again = fixture
        .pipeline
        .retrieve(&paper, "self-attention", &[])
        .await
        .unwrap();
    assert_eq!(again, outcome);
    assert!(paths.chunks.exists());
}

#[tokio::test]
async fn empty_extraction_is_an_error() {
    let fixture = Fixture::new();
    let blank = fixture.write("blank.txt", "   \n\t ");

    let err = fixture.pipeline.process(&blank, false).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Extraction(_)));
    assert!(fixture.pipeline.status(&blank).unwrap().is_none());
}

#[tokio::test]
async fn empty_query_is_rejected_before_loading() {
    let fixture = Fixture::new();
    let missing = fixture.dir.path().join("missing.txt");

    let err = fixture
        .pipeline
        .retrieve(&missing, "  ", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidInput(_)));
}

#[tokio::test]
async fn answer_passes_hits_and_tables() {
    let fixture = Fixture::with_tables(vec!["model | BLEU".into(), "base | 27.3".into()]);
    let paper = fixture.write("paper.txt", PAPER);
    fixture.pipeline.process(&paper, false).await.unwrap();

    let recorder = Recorder::default();
    let answer = fixture
        .pipeline
        .answer(&recorder, "self-attention", &[&paper], &[])
        .await
        .unwrap();

    assert!(answer.starts_with("self-attention: Transformers use self-attention."));
    let seen = recorder.seen.lock();
    assert!(!seen[0].fallback);
    assert_eq!(seen[0].chunks.len(), 2);
    assert_eq!(seen[0].tables, vec!["model | BLEU", "base | 27.3"]);
}

#[tokio::test]
async fn process_rebuilds_artifacts_of_another_model() {
    let fixture = Fixture::new();
    let paper = fixture.write("paper.txt", PAPER);
    fixture.pipeline.process(&paper, false).await.unwrap();

    let other = pipeline_in(fixture.dir.path(), 512, Vec::new(), 3);
    let report = other.process(&paper, false).await.unwrap();
    assert!(!report.reused);
    assert_eq!(report.chunk_count, 3);
    assert_eq!(
        other.status(&paper).unwrap().unwrap().model_id,
        "hashing-trigram-512"
    );

    let outcome = other
        .retrieve(&paper, "Transformers use self-attention.", &[])
        .await
        .unwrap();
    assert_eq!(outcome.hits()[0].id, 0);
    assert!(other.process(&paper, false).await.unwrap().reused);
}

#[tokio::test]
async fn short_document_keeps_its_only_chunk() {
    let fixture = Fixture::with_top_k(5);
    let note = fixture.write("note.txt", "Transformers use self-attention.");
    fixture.pipeline.process(&note, false).await.unwrap();

    let outcome = fixture
        .pipeline
        .retrieve(&note, "Transformers use self-attention.", &[])
        .await
        .unwrap();
    assert_eq!(outcome.texts(), vec!["Transformers use self-attention.".to_string()]);
}

#[tokio::test]
async fn answer_falls_back_without_confident_hits() {
    let fixture = Fixture::with_top_k(1);
    let note = fixture.write("note.txt", "A single sentence.");
    fixture.pipeline.process(&note, false).await.unwrap();

    let outcome = fixture
        .pipeline
        .retrieve(&note, "attention", &[])
        .await
        .unwrap();
    assert_eq!(outcome, SearchOutcome::NoRelevantInformation);

    let recorder = Recorder::default();
    fixture
        .pipeline
        .answer(&recorder, "attention", &[&note], &[])
        .await
        .unwrap();
    let seen = recorder.seen.lock();
    assert!(seen[0].fallback);
    assert_eq!(seen[0].chunks, vec![NO_RELEVANT_INFORMATION.to_string()]);
}

#[tokio::test]
async fn generator_failure_is_reported() {
    let fixture = Fixture::new();
    let paper = fixture.write("paper.txt", PAPER);

    let err = fixture
        .pipeline
        .answer(&Broken, "self-attention", &[&paper], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Generation(_)));
}

#[tokio::test]
async fn status_and_forget() {
    let fixture = Fixture::new();
    let paper = fixture.write("paper.txt", PAPER);
    assert!(fixture.pipeline.status(&paper).unwrap().is_none());

    fixture.pipeline.process(&paper, false).await.unwrap();
    let manifest = fixture.pipeline.status(&paper).unwrap().unwrap();
    assert_eq!(manifest.chunk_count, 3);
    assert_eq!(manifest.model_id, "hashing-trigram-1024");

    assert!(fixture.pipeline.forget(&paper).unwrap());
    assert!(fixture.pipeline.status(&paper).unwrap().is_none());
    assert!(!fixture.pipeline.forget(&paper).unwrap());
}

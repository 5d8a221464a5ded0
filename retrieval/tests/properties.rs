//! Behavioural properties of the retrieval core.

use std::fs;
use std::sync::Arc;

use arxivlens_core::Message;
use arxivlens_retrieval::{
    CachedStore, DocumentId, Embedder, HashingEmbedding, IndexBuilder, IndexParams, IndexStore,
    ModelFingerprint, NO_RELEVANT_INFORMATION, QueryExpander, RetrievalConfig, RetrievalError,
    SearchOutcome, Searcher, VectorIndex,
};
use tempfile::tempdir;

const DIM: usize = 1024;

fn scenario_chunks() -> Vec<String> {
    vec![
        "Transformers use self-attention.".to_string(),
        "RNNs process sequences sequentially.".to_string(),
        "Attention requires no recurrence.".to_string(),
    ]
}

fn embedder() -> Embedder<HashingEmbedding> {
    Embedder::new(Arc::new(HashingEmbedding::new(DIM)), 16)
}

fn builder(params: IndexParams) -> IndexBuilder<HashingEmbedding> {
    IndexBuilder::new(embedder(), params)
}

fn default_params() -> IndexParams {
    IndexParams::from(&RetrievalConfig::default())
}

fn ivf_params() -> IndexParams {
    IndexParams {
        ivf_min_vectors: 64,
        ivf_points_per_list: 8,
        ..default_params()
    }
}

fn searcher() -> Searcher<HashingEmbedding> {
    Searcher::new(embedder(), QueryExpander::new(10), 75.0)
}

fn corpus(n: usize) -> Vec<String> {
    let topics = ["attention", "convolution", "recurrence", "embedding", "pruning"];
    (0..n)
        .map(|i| {
            format!(
                "Paragraph {i} studies {} in layer {} of model {}.",
                topics[i % topics.len()],
                i % 13,
                i / 7
            )
        })
        .collect()
}

fn store(dir: &std::path::Path) -> IndexStore {
    IndexStore::new(dir, ModelFingerprint::of(&HashingEmbedding::new(DIM)))
}

#[tokio::test]
async fn self_retrieval_flat_and_ivf() {
    for params in [default_params(), ivf_params()] {
        let chunks = corpus(96);
        let built = builder(params).build(chunks.clone()).await.unwrap();
        let embedder = embedder();

        for (id, text) in chunks.iter().enumerate().step_by(5) {
            let query = embedder.encode_query(text).await.unwrap().to_vec();
            let hits = built.index.search(&query, 1).unwrap();
            assert_eq!(hits[0].id, id, "{:?} failed for {text}", built.index.kind());
        }
    }
}

#[tokio::test]
async fn small_documents_retrieve_every_chunk_through_searcher() {
    let documents = [
        vec!["Transformers use self-attention.".to_string()],
        vec![
            "Alpha beta gamma.".to_string(),
            "Delta epsilon zeta.".to_string(),
            "Eta theta iota.".to_string(),
        ],
    ];
    let dir = tempdir().unwrap();
    let store = store(dir.path());

    for (n, chunks) in documents.into_iter().enumerate() {
        let id = DocumentId::new(format!("small-{n}"));
        let built = builder(default_params()).build(chunks.clone()).await.unwrap();
        store.save(&id, &built.index, &built.chunks).unwrap();
        let loaded = store.load(&id).unwrap();

        for (chunk_id, text) in chunks.iter().enumerate() {
            let outcome = searcher().search(text, Some(&loaded), &[], 5).await.unwrap();
            assert!(!outcome.is_empty(), "{text} fell back");
            assert_eq!(outcome.hits()[0].id, chunk_id);
            assert_eq!(outcome.hits().len(), chunks.len());
        }
    }
}

#[tokio::test]
async fn save_load_round_trip() {
    let dir = tempdir().unwrap();
    let store = store(dir.path());
    let id = DocumentId::from_path("attention.pdf");

    for params in [default_params(), ivf_params()] {
        let built = builder(params).build(corpus(80)).await.unwrap();
        store.save(&id, &built.index, &built.chunks).unwrap();
        let loaded = store.load(&id).unwrap();

        assert_eq!(loaded.chunks, built.chunks);
        let probe = embedder().encode_query("pruning in layer 3").await.unwrap().to_vec();
        assert_eq!(
            loaded.index.search(&probe, 5).unwrap(),
            built.index.search(&probe, 5).unwrap()
        );
    }
}

#[tokio::test]
async fn returned_ids_resolve_into_chunk_list() {
    let dir = tempdir().unwrap();
    let store = store(dir.path());
    let id = DocumentId::new("bounds");
    let built = builder(ivf_params()).build(corpus(70)).await.unwrap();
    store.save(&id, &built.index, &built.chunks).unwrap();
    let loaded = store.load(&id).unwrap();

    let embedder = embedder();
    for query in ["attention", "model 4", "layer 12 recurrence", "nothing related at all"] {
        let vector = embedder.encode_query(query).await.unwrap().to_vec();
        for neighbor in loaded.index.search(&vector, 50).unwrap() {
            assert!(neighbor.id < loaded.chunks.len());
        }
    }
}

#[tokio::test]
async fn kept_hits_are_below_dynamic_threshold() {
    let built = builder(default_params()).build(corpus(40)).await.unwrap();
    let dir = tempdir().unwrap();
    let store = store(dir.path());
    let id = DocumentId::new("threshold");
    store.save(&id, &built.index, &built.chunks).unwrap();
    let loaded = store.load(&id).unwrap();
    let embedder = embedder();
    let searcher = searcher();

    for k in 1..=8 {
        for query in ["attention layer", "convolution model 2", "paragraph 17"] {
            let vector = embedder.encode_query(query).await.unwrap().to_vec();
            let raw = loaded.index.search(&vector, k).unwrap();
            let distances: Vec<f32> = raw.iter().map(|n| n.distance).collect();
            let threshold = arxivlens_retrieval::percentile(&distances, 75.0).unwrap();

            let outcome = searcher.search(query, Some(&loaded), &[], k).await.unwrap();
            assert!(outcome.hits().len() <= k);
            for hit in outcome.hits() {
                assert!(hit.distance < threshold);
            }
        }
    }
}

#[tokio::test]
async fn search_without_index_is_not_ready() {
    let result = searcher().search("attention", None, &[], 5).await;
    assert!(matches!(result, Err(RetrievalError::NotReady(_))));
}

#[tokio::test]
async fn empty_query_is_invalid_input() {
    let built = builder(default_params()).build(scenario_chunks()).await.unwrap();
    let dir = tempdir().unwrap();
    let store = store(dir.path());
    let id = DocumentId::new("q");
    store.save(&id, &built.index, &built.chunks).unwrap();
    let loaded = store.load(&id).unwrap();

    for query in ["", "   "] {
        assert!(matches!(
            searcher().search(query, Some(&loaded), &[], 5).await,
            Err(RetrievalError::InvalidInput(_))
        ));
    }
}

#[test]
fn loading_unknown_document_is_not_found() {
    let dir = tempdir().unwrap();
    let err = store(dir.path())
        .load(&DocumentId::from_path("never-indexed.pdf"))
        .unwrap_err();
    assert!(matches!(err, RetrievalError::NotFound { .. }));
}

#[tokio::test]
async fn end_to_end_ranking() {
    let built = builder(default_params()).build(scenario_chunks()).await.unwrap();
    let query = embedder().encode_query("self-attention").await.unwrap().to_vec();

    let top2: Vec<usize> = built
        .index
        .search(&query, 2)
        .unwrap()
        .iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(top2, vec![0, 2]);

    let dir = tempdir().unwrap();
    let store = store(dir.path());
    let id = DocumentId::new("scenario");
    store.save(&id, &built.index, &built.chunks).unwrap();
    let loaded = store.load(&id).unwrap();

    let outcome = searcher()
        .search("self-attention", Some(&loaded), &[], 3)
        .await
        .unwrap();
    assert_eq!(
        outcome.texts(),
        vec![
            "Transformers use self-attention.".to_string(),
            "Attention requires no recurrence.".to_string(),
        ]
    );

    let narrow = searcher()
        .search("self-attention", Some(&loaded), &[], 2)
        .await
        .unwrap();
    assert_eq!(narrow.hits()[0].id, 0);
}

#[tokio::test]
async fn single_neighbor_falls_back_to_sentinel() {
    let built = builder(default_params()).build(scenario_chunks()).await.unwrap();
    let dir = tempdir().unwrap();
    let store = store(dir.path());
    let id = DocumentId::new("sentinel");
    store.save(&id, &built.index, &built.chunks).unwrap();
    let loaded = store.load(&id).unwrap();

    let outcome = searcher()
        .search("self-attention", Some(&loaded), &[], 1)
        .await
        .unwrap();
    assert_eq!(outcome, SearchOutcome::NoRelevantInformation);
    assert_eq!(outcome.texts(), vec![NO_RELEVANT_INFORMATION.to_string()]);
}

#[test]
fn expansion_resolves_pronoun_from_history() {
    let history = vec![Message::user("explain transformers")];
    let terms = QueryExpander::new(5).expand_terms("it", &history);
    assert!(terms.iter().any(|t| t == "transformers"));
}

#[tokio::test]
async fn deleted_index_file_means_not_found() {
    let dir = tempdir().unwrap();
    let cache = CachedStore::new(store(dir.path()));
    let id = DocumentId::from_path("paper.pdf");
    let built = builder(default_params()).build(scenario_chunks()).await.unwrap();
    cache.save(&id, &built.index, &built.chunks).unwrap();
    cache.load(&id).unwrap();

    fs::remove_file(cache.store().paths(&id).index).unwrap();

    assert!(cache.store().paths(&id).chunks.exists());
    assert!(matches!(
        cache.load(&id),
        Err(RetrievalError::NotFound { .. })
    ));
}

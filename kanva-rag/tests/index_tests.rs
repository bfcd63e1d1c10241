//! Integration tests for building and querying a `RagIndex`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use kanva_rag::{
    ArticleRecord, EmbeddingProvider, FallbackEmbeddingProvider, FixedSizeChunker, RagConfig,
    RagError, RagIndex, Result, RuleRecord, SourceKind, build_rag_index, ensure_embeddable,
    retrieve_relevant_chunks,
};

const DIM: usize = 256;

/// Deterministic bag-of-words embedding: identical texts embed identically and
/// texts sharing words point in similar directions.
struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_embeddable(text)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut v = vec![0.0f32; DIM];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() % DIM as u64) as usize] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

struct Down;

#[async_trait]
impl EmbeddingProvider for Down {
    fn name(&self) -> &str {
        "down"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::embedding("down", "403 PERMISSION_DENIED"))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

fn rule(id: &str, title: &str, content: &str) -> RuleRecord {
    RuleRecord {
        id: Some(id.into()),
        title: Some(title.into()),
        content: Some(content.into()),
        regulation_reference: Some("СНиП 31-01-2003".into()),
        ..Default::default()
    }
}

fn article(id: &str, title: &str, content: &str) -> ArticleRecord {
    ArticleRecord {
        id: Some(id.into()),
        title: Some(title.into()),
        article_number: Some("29".into()),
        content: Some(content.into()),
        law_name: Some("Жилищный кодекс".into()),
        chapter: None,
    }
}

#[tokio::test]
async fn empty_inputs_build_an_empty_index() {
    let embedder = HashEmbedder::new();
    let index = build_rag_index(&[], &[], &RagConfig::default(), &embedder).await.unwrap();
    assert!(index.is_empty());
    assert!(retrieve_relevant_chunks(&[1.0; DIM], &index, 5).is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn each_record_contributes_its_chunks_in_order() {
    let embedder = HashEmbedder::new();
    let chunker = FixedSizeChunker::new(1000, 200).unwrap();
    let rules = vec![rule("1", "Несущие стены", "Снос запрещен"), rule("2", "Газ", "Не переносить")];
    let articles = vec![article("a1", "Переустройство", "Требует согласования")];

    let index = RagIndex::build(&rules, &articles, &chunker, &embedder).await.unwrap();

    assert_eq!(index.len(), 3);
    let kinds: Vec<_> = index.entries().iter().map(|e| e.chunk.source_kind()).collect();
    assert_eq!(kinds, vec![Some(SourceKind::Rule), Some(SourceKind::Rule), Some(SourceKind::Article)]);

    let first = &index.entries()[0].chunk.metadata;
    assert_eq!(first["rule_id"], "1");
    assert_eq!(first["title"], "Несущие стены");
    assert_eq!(first["regulation_reference"], "СНиП 31-01-2003");
    assert_eq!(first["chunk_index"], "0");

    let last = &index.entries()[2].chunk.metadata;
    assert_eq!(last["article_id"], "a1");
    assert_eq!(last["law_name"], "Жилищный кодекс");
    assert_eq!(last["article_number"], "29");
}

#[tokio::test]
async fn n_records_of_k_chunks_yield_n_times_k_entries() {
    let embedder = HashEmbedder::new();
    // Each rendered rule is exactly 60 characters long.
    let body = "x".repeat(60 - "Название правила: ".chars().count());
    let rules: Vec<_> = (0..4)
        .map(|i| RuleRecord { id: Some(i.to_string()), title: Some(body.clone()), ..Default::default() })
        .collect();
    assert_eq!(rules[0].render().chars().count(), 60);

    // size 20 / overlap 0 -> three chunks per rule.
    let config = RagConfig::builder().chunk_size(20).chunk_overlap(0).build().unwrap();
    let index = build_rag_index(&rules, &[], &config, &embedder).await.unwrap();

    assert_eq!(index.len(), 12);
    let indices: Vec<_> =
        index.entries()[..3].iter().map(|e| e.chunk.metadata["chunk_index"].clone()).collect();
    assert_eq!(indices, vec!["0", "1", "2"]);
}

#[tokio::test]
async fn retrieval_prefers_matching_record() {
    let embedder = HashEmbedder::new();
    let rules = vec![
        rule("1", "вентиляция", "вентиляция кухни вентиляция"),
        rule("2", "стены", "несущие стены нельзя сносить"),
    ];
    let index = build_rag_index(&rules, &[], &RagConfig::default(), &embedder).await.unwrap();

    let query = embedder.embed("несущие стены сносить").await.unwrap();
    let results = index.search(&query, 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.metadata["rule_id"], "2");

    let texts = retrieve_relevant_chunks(&query, &index, 10);
    assert_eq!(texts.len(), 2);
    assert!(texts[0].contains("несущие стены"));
}

#[tokio::test]
async fn empty_records_are_skipped() {
    let embedder = HashEmbedder::new();
    let rules = vec![RuleRecord::default(), rule("2", "Газ", "Не переносить")];
    let index = build_rag_index(&rules, &[], &RagConfig::default(), &embedder).await.unwrap();
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn build_fails_when_no_strategy_can_embed() {
    let embedder = FallbackEmbeddingProvider::new(Arc::new(Down), None);
    let rules = vec![rule("1", "Газ", "Не переносить")];
    let err = build_rag_index(&rules, &[], &RagConfig::default(), &embedder).await.unwrap_err();
    match err {
        RagError::EmbeddingUnavailable { primary, .. } => {
            assert!(!primary.contains("PERMISSION_DENIED"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn build_uses_fallback_when_primary_is_down() {
    let local = Arc::new(HashEmbedder::new());
    let embedder = FallbackEmbeddingProvider::new(Arc::new(Down), Some(local.clone()));
    let rules = vec![rule("1", "Газ", "Не переносить")];
    let index = build_rag_index(&rules, &[], &RagConfig::default(), &embedder).await.unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(local.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn trailing_whitespace_windows_are_not_embedded() {
    let embedder = HashEmbedder::new();
    let trailing = RuleRecord { content: Some("abc   ".into()), ..Default::default() };
    // "Содержание: abc   " is 18 characters; the window at 15 is all spaces.
    let chunker = FixedSizeChunker::new(4, 1).unwrap();

    let index = RagIndex::build(&[trailing], &[], &chunker, &embedder).await.unwrap();

    assert_eq!(index.len(), 5);
    assert!(index.entries().iter().all(|e| !e.chunk.text.trim().is_empty()));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn padded_records_still_build_with_contiguous_chunk_indices() {
    let embedder = HashEmbedder::new();
    let padded = RuleRecord {
        id: Some("1".into()),
        content: Some(format!("abc{}\n\n", " ".repeat(40))),
        ..Default::default()
    };
    let rules = vec![padded, rule("2", "Газ", "Не переносить")];
    let config = RagConfig::builder().chunk_size(10).chunk_overlap(0).build().unwrap();

    let index = build_rag_index(&rules, &[], &config, &embedder).await.unwrap();

    let first: Vec<_> = index
        .entries()
        .iter()
        .filter(|e| e.chunk.metadata.get("rule_id").map(String::as_str) == Some("1"))
        .map(|e| (e.chunk.text.as_str(), e.chunk.metadata["chunk_index"].as_str()))
        .collect();
    assert_eq!(first, vec![("Содержание", "0"), (": abc     ", "1")]);
    assert!(index.entries().iter().all(|e| !e.chunk.text.trim().is_empty()));
    assert!(index.entries().iter().any(|e| e.chunk.metadata["rule_id"] == "2"));
}

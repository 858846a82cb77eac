//! Retrieval against an in-memory knowledge base with scripted embeddings.

use std::sync::Arc;

use chrono::Utc;
use nexus_db::MemoryDocumentStore;
use nexus_inference::mock::{MockFailure, MockProvider};
use nexus_inference::{EmbeddingProvider, FallbackExecutor, ProviderKind};
use nexus_search::{DocumentStore, KnowledgeDocument, RagRetriever, CONTEXT_HEADER};

const QUERY: &str = "What are our quarterly goals?";

fn doc(id: &str, category: &str, embedding: Option<Vec<f32>>) -> KnowledgeDocument {
    let now = Utc::now();
    KnowledgeDocument {
        id: id.to_string(),
        title: format!("Title {}", id),
        content: format!("Content of {}", id),
        category: category.to_string(),
        tags: vec!["strategy".to_string()],
        source: "handbook".to_string(),
        source_url: None,
        embedding,
        embedding_updated_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn executor(provider: &MockProvider) -> Arc<FallbackExecutor> {
    Arc::new(
        FallbackExecutor::default()
            .with_embedding(vec![Arc::new(provider.clone()) as Arc<dyn EmbeddingProvider>]),
    )
}

fn query_embedder() -> MockProvider {
    MockProvider::new(ProviderKind::OpenAi, "text-embedding-3-small").embedding_for(QUERY, vec![1.0, 0.0])
}

fn retriever(provider: &MockProvider, store: &Arc<MemoryDocumentStore>) -> RagRetriever {
    RagRetriever::new(executor(provider), store.clone() as Arc<dyn DocumentStore>)
}

#[tokio::test]
async fn test_most_similar_document_wins() {
    let store = Arc::new(MemoryDocumentStore::new(vec![
        doc("orthogonal", "goals", Some(vec![0.0, 1.0])),
        doc("aligned", "goals", Some(vec![1.0, 0.0])),
    ]));
    let provider = query_embedder();

    let results = retriever(&provider, &store).retrieve(QUERY, 1, None).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document_id, "aligned");
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_results_sorted_descending_and_truncated() {
    let store = Arc::new(MemoryDocumentStore::new(vec![
        doc("low", "goals", Some(vec![0.1, 1.0])),
        doc("high", "goals", Some(vec![1.0, 0.1])),
        doc("mid", "goals", Some(vec![1.0, 1.0])),
    ]));
    let provider = query_embedder();

    let results = retriever(&provider, &store).retrieve(QUERY, 2, None).await;

    let ids: Vec<_> = results.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids, vec!["high", "mid"]);
}

#[tokio::test]
async fn test_ties_keep_fetch_order() {
    let store = Arc::new(MemoryDocumentStore::new(vec![
        doc("first", "goals", Some(vec![2.0, 0.0])),
        doc("second", "goals", Some(vec![1.0, 0.0])),
        doc("third", "goals", Some(vec![3.0, 0.0])),
    ]));
    let provider = query_embedder();

    let results = retriever(&provider, &store).retrieve(QUERY, 3, None).await;

    let ids: Vec<_> = results.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_missing_embedding_is_backfilled_and_ranked() {
    let store = Arc::new(MemoryDocumentStore::new(vec![
        doc("stored", "goals", Some(vec![0.0, 1.0])),
        doc("fresh", "goals", None),
    ]));
    let provider = query_embedder().embedding_for("Title fresh\nContent of fresh", vec![0.9, 0.1]);

    let results = retriever(&provider, &store).retrieve(QUERY, 2, None).await;

    assert_eq!(results[0].document_id, "fresh");
    assert_eq!(store.single_writes().await, vec!["fresh"]);
    let updated = store.get("fresh").await.unwrap();
    assert_eq!(updated.embedding, Some(vec![0.9, 0.1]));
    assert!(updated.embedding_updated_at.is_some());
    assert_eq!(provider.inputs()[1], "Title fresh\nContent of fresh");
}

#[tokio::test]
async fn test_failed_write_back_still_ranks_document() {
    let store = Arc::new(MemoryDocumentStore::new(vec![doc("fresh", "goals", None)]));
    store.fail_updates(true);
    let provider = query_embedder().embedding_for("Title fresh", vec![1.0, 0.0]);

    let results = retriever(&provider, &store).retrieve(QUERY, 3, None).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document_id, "fresh");
    assert!(store.get("fresh").await.unwrap().embedding.is_none());
}

#[tokio::test]
async fn test_failed_document_embedding_skips_document() {
    let store = Arc::new(MemoryDocumentStore::new(vec![
        doc("broken", "goals", None),
        doc("fine", "goals", Some(vec![1.0, 0.0])),
    ]));
    let provider = query_embedder().failing_embedding_for("Title broken", MockFailure::Transport(500));

    let results = retriever(&provider, &store).retrieve(QUERY, 3, None).await;

    let ids: Vec<_> = results.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids, vec!["fine"]);
    assert!(store.single_writes().await.is_empty());
}

#[tokio::test]
async fn test_dimension_mismatch_is_skipped() {
    let store = Arc::new(MemoryDocumentStore::new(vec![
        doc("wide", "goals", Some(vec![1.0, 0.0, 0.0])),
        doc("fine", "goals", Some(vec![0.5, 0.5])),
    ]));
    let provider = query_embedder();

    let results = retriever(&provider, &store).retrieve(QUERY, 3, None).await;

    let ids: Vec<_> = results.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids, vec!["fine"]);
}

#[tokio::test]
async fn test_category_filter() {
    let store = Arc::new(MemoryDocumentStore::new(vec![
        doc("culture", "values", Some(vec![1.0, 0.0])),
        doc("plan", "goals", Some(vec![1.0, 0.0])),
    ]));
    let provider = query_embedder();
    let retriever = retriever(&provider, &store);

    let goals = vec!["goals".to_string()];
    let results = retriever.retrieve(QUERY, 3, Some(&goals)).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].category, "goals");

    let none = vec!["finance".to_string()];
    assert!(retriever.retrieve(QUERY, 3, Some(&none)).await.is_empty());

    // An empty list means no filter.
    assert_eq!(retriever.retrieve(QUERY, 3, Some(&[])).await.len(), 2);
}

#[tokio::test]
async fn test_zero_top_k_does_no_work() {
    let store = Arc::new(MemoryDocumentStore::new(vec![doc("a", "goals", None)]));
    let provider = query_embedder();

    assert!(retriever(&provider, &store).retrieve(QUERY, 0, None).await.is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_query_embedding_failure_yields_empty() {
    let store = Arc::new(MemoryDocumentStore::new(vec![doc("a", "goals", Some(vec![1.0, 0.0]))]));
    let provider = MockProvider::new(ProviderKind::OpenAi, "e").failing(MockFailure::Unreachable);

    assert!(retriever(&provider, &store).retrieve(QUERY, 3, None).await.is_empty());
}

#[tokio::test]
async fn test_store_failure_yields_empty() {
    let store = Arc::new(MemoryDocumentStore::new(vec![doc("a", "goals", Some(vec![1.0, 0.0]))]));
    store.fail_fetch(true);
    let provider = query_embedder();

    assert!(retriever(&provider, &store).retrieve(QUERY, 3, None).await.is_empty());
}

#[tokio::test]
async fn test_augment_prompt_with_context() {
    let store = Arc::new(MemoryDocumentStore::new(vec![doc("plan", "goals", Some(vec![1.0, 0.0]))]));
    let provider = query_embedder();

    let augmented = retriever(&provider, &store)
        .augment_prompt("You are a helpful assistant.", QUERY, 3, None)
        .await;

    assert_eq!(augmented.sources.len(), 1);
    assert!(augmented.prompt.starts_with("You are a helpful assistant.\n\n"));
    assert!(augmented.prompt.contains(CONTEXT_HEADER.trim()));
    assert!(augmented.prompt.contains("[Title plan]\nContent of plan\nSource: handbook"));
    assert!(augmented.prompt.ends_with(&format!("User question: {}", QUERY)));
}

#[tokio::test]
async fn test_augment_prompt_without_context() {
    let store = Arc::new(MemoryDocumentStore::new(vec![]));
    let provider = query_embedder();

    let augmented = retriever(&provider, &store)
        .augment_prompt("", QUERY, 3, None)
        .await;

    assert!(augmented.sources.is_empty());
    assert_eq!(augmented.prompt, format!("User question: {}", QUERY));
}

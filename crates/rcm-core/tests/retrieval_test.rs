//! Integration tests for the document retriever and its tool adapter.

use std::sync::Arc;

use serde_json::json;

use rcm_core::generation::Tool;
use rcm_core::retrieval::{DocumentRetriever, KnowledgeBase, RetrievalResult, RetrieverTool};

#[test]
fn lookup_is_idempotent() {
    let retriever = DocumentRetriever::builtin();
    let first = retriever.retrieve("PMP-001-EAST");
    for _ in 0..5 {
        assert_eq!(retriever.retrieve("PMP-001-EAST"), first);
    }
    assert!(first.found);
}

#[test]
fn unknown_equipment_is_a_miss_not_an_error() {
    let result = DocumentRetriever::builtin().retrieve("UNKNOWN-999");
    assert_eq!(result, RetrievalResult::not_found());
}

#[tokio::test]
async fn concurrent_lookups_share_one_retriever() {
    let retriever = Arc::new(DocumentRetriever::builtin());
    let handles: Vec<_> = ["PMP-001", "MOTOR-ELET-01", "UNKNOWN-999", "PMP-001-B"]
        .into_iter()
        .map(|id| {
            let retriever = Arc::clone(&retriever);
            tokio::spawn(async move { retriever.retrieve(id).found })
        })
        .collect();

    let mut found = Vec::new();
    for handle in handles {
        found.push(handle.await.unwrap());
    }
    assert_eq!(found, vec![true, true, false, true]);
}

#[tokio::test]
async fn custom_catalog_from_file_backs_the_tool() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("catalog.toml");
    std::fs::write(
        &path,
        r#"
[entries."CMP"]
manual = "Generic compressor manual.pdf"
content = "Drain condensate daily."

[entries."CMP-7"]
manual = "Atlas CMP-7 manual.pdf"
content = "Replace the air filter every 1000 hours."
"#,
    )
    .unwrap();

    let kb = KnowledgeBase::from_toml_file(&path).unwrap();
    let tool = RetrieverTool::new(Arc::new(DocumentRetriever::new(kb)));

    let out = tool
        .call(json!({ "equipmentName": "CMP-7-NORTH" }))
        .await
        .unwrap();
    assert_eq!(
        out,
        json!({
            "found": true,
            "documentName": "Atlas CMP-7 manual.pdf",
            "relevantExcerpts": "Replace the air filter every 1000 hours."
        })
    );

    let miss = tool.call(json!({ "equipmentName": "PMP-001" })).await.unwrap();
    assert_eq!(miss, json!({ "found": false }));
}

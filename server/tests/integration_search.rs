use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use searchindex_core::persist::{save_all, save_text, IndexPaths, MetaFile};
use searchindex_core::{InvertedIndex, SourceDocument};
use serde_json::Value;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &std::path::Path) {
    let paths = IndexPaths::new(dir);
    let docs = vec![
        SourceDocument {
            name: "sbm_test".into(),
            title: "A group-based test".into(),
            body: "Stochastic block model test. The block probabilities are compared.".into(),
            filename: Some("sbm_test.ipynb".into()),
        },
        SourceDocument {
            name: "er_unmatched_test".into(),
            title: "A density-based test".into(),
            body: "Erdos-Renyi model of the network density.".into(),
            filename: Some("er_unmatched_test.ipynb".into()),
        },
        SourceDocument {
            name: "outline".into(),
            title: "Block outline".into(),
            body: "Table of contents.".into(),
            filename: Some("outline.md".into()),
        },
    ];
    for (doc_id, doc) in docs.iter().enumerate() {
        save_text(&paths, doc_id as u32, &doc.body).unwrap();
    }
    let index = InvertedIndex::build(docs);
    let meta = MetaFile::for_index(&index, "2026-10-18T00:00:00Z");
    save_all(&paths, &index, &meta).unwrap();
}

async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn app_for(dir: &std::path::Path) -> Router {
    server::build_app(dir.to_path_buf()).unwrap()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = call(app_for(dir.path()), "/search?q=block&k=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"].as_u64(), Some(2));
    let arr = json["results"].as_array().unwrap();
    // title match first
    assert_eq!(arr[0]["name"], "outline");
    assert_eq!(arr[1]["name"], "sbm_test");
    assert_eq!(arr[1]["filename"], "sbm_test.ipynb");
    assert!(arr[1]["snippet"].as_str().unwrap().contains("<em>block</em>"));
}

#[tokio::test]
async fn mode_any_unions_terms() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (_, all) = call(app_for(dir.path()), "/search?q=block%20density").await;
    assert_eq!(all["total_hits"].as_u64(), Some(0));
    let (_, any) = call(app_for(dir.path()), "/search?q=block%20density&mode=any").await;
    assert_eq!(any["total_hits"].as_u64(), Some(3));
}

#[tokio::test]
async fn k_limits_results_but_not_total() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (_, json) = call(app_for(dir.path()), "/search?q=test&k=1").await;
    assert_eq!(json["total_hits"].as_u64(), Some(2));
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_terms_return_empty_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = call(app_for(dir.path()), "/search?q=zebrafish").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn doc_endpoint_returns_metadata_or_404() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, json) = call(app_for(dir.path()), "/doc/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "A density-based test");
    assert_eq!(json["text"], "Erdos-Renyi model of the network density.");

    let (status, json) = call(app_for(dir.path()), "/doc/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not found");
}

#[tokio::test]
async fn missing_index_fails_at_startup() {
    let dir = tempdir().unwrap();
    assert!(server::build_app(dir.path().join("absent")).is_err());
}

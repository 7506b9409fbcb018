use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use searchindex_core::persist::{load_index, load_text, IndexPaths};
use searchindex_core::{DocId, InvertedIndex, MatchMode, QueryOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

const SNIPPET_BEFORE: usize = 100;
const SNIPPET_LEN: usize = 300;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub mode: MatchMode,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f32,
    pub name: String,
    pub title: String,
    pub filename: String,
    pub snippet: Option<String>,
}

/// Shared by every handler; the index is immutable so no locking is needed.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<InvertedIndex>,
    pub index_root: Arc<PathBuf>,
}

pub fn build_app(index_dir: impl Into<PathBuf>) -> Result<Router> {
    // Load the whole index at startup
    let index_root: PathBuf = index_dir.into();
    let index = load_index(&IndexPaths::new(&index_root))
        .with_context(|| format!("loading index from {}", index_root.display()))?;
    tracing::info!(num_docs = index.num_docs(), num_terms = index.num_terms(), "index loaded");
    Ok(router(AppState { index: Arc::new(index), index_root: Arc::new(index_root) }))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let opts = QueryOptions { mode: params.mode, ..Default::default() };
    let hits = state.index.search(&params.q, &opts);
    let total_hits = hits.len();
    let k = params.k.clamp(1, 100);

    let paths = IndexPaths::new(state.index_root.as_path());
    // Raw query words (exclusions dropped) for highlighting
    let raw_terms: Vec<String> = params
        .q
        .split_whitespace()
        .filter(|s| !s.starts_with('-'))
        .map(|s| s.to_string())
        .collect();
    let mut results: Vec<SearchHit> = Vec::with_capacity(k.min(total_hits));
    for hit in hits.into_iter().take(k) {
        if let Some(meta) = state.index.doc(hit.doc_id) {
            let snippet = load_text(&paths, hit.doc_id).and_then(|text| snippet_from_text(&text, &raw_terms));
            results.push(SearchHit {
                doc_id: hit.doc_id,
                score: hit.score,
                name: meta.name.clone(),
                title: meta.title.clone(),
                filename: meta.filename.clone(),
                snippet,
            });
        }
    }

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total_hits, took_ms = elapsed.as_millis() as u64, "search");
    Json(SearchResponse { query: params.q, took_ms: elapsed.as_millis(), total_hits, results })
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let Some(meta) = state.index.doc(doc_id) else {
        return Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" }))));
    };
    let mut obj = serde_json::json!({
        "doc_id": doc_id,
        "name": meta.name,
        "title": meta.title,
        "filename": meta.filename,
    });
    if let Some(text) = load_text(&IndexPaths::new(state.index_root.as_path()), doc_id) {
        obj["text"] = serde_json::Value::String(text);
    }
    Ok(Json(obj))
}

fn snippet_from_text(text: &str, raw_terms: &[String]) -> Option<String> {
    if text.trim().is_empty() { return None; }
    // find first match (case-insensitive) of any raw term
    let first_idx = raw_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .find_map(|t| term_regex(t).and_then(|re| re.find(text)).map(|m| m.start()));
    let snippet = match first_idx {
        Some(idx) => {
            let start = floor_char_boundary(text, idx.saturating_sub(SNIPPET_BEFORE));
            let end = floor_char_boundary(text, (start + SNIPPET_LEN).min(text.len()));
            text[start..end].to_string()
        }
        None => text.chars().take(SNIPPET_LEN - SNIPPET_BEFORE).collect(),
    };
    Some(highlight_terms(&snippet, raw_terms))
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn term_regex(term: &str) -> Option<regex::Regex> {
    regex::RegexBuilder::new(&regex::escape(term)).case_insensitive(true).build().ok()
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if t.trim().is_empty() { continue; }
        if let Some(pat) = term_regex(t) {
            s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_centers_on_first_match_and_highlights() {
        let text = format!("{}Fisher exact test{}", "x ".repeat(200), " y".repeat(200));
        let snippet = snippet_from_text(&text, &["fisher".to_string()]).unwrap();
        assert!(snippet.contains("<em>Fisher</em> exact test"));
        assert!(snippet.len() < text.len());
    }

    #[test]
    fn snippet_never_splits_characters() {
        let text = "é".repeat(300) + " Rényi";
        let snippet = snippet_from_text(&text, &["rényi".to_string()]).unwrap();
        assert!(snippet.ends_with("<em>Rényi</em>"));
    }

    #[test]
    fn snippet_without_match_is_a_prefix() {
        let snippet = snippet_from_text("stochastic block model", &["zebra".to_string()]).unwrap();
        assert_eq!(snippet, "stochastic block model");
        assert!(snippet_from_text("   ", &[]).is_none());
    }
}

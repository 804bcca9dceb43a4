//! HTTP API server for UI callers.
//!
//! `/ask` returns the answer as one Markdown string alongside the structured
//! sources, so a chat front end can render it directly.

use super::start;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, RetrievalPlan};
use crate::rag::{StructuredSource, NO_DOCUMENTS_MESSAGE};
use crate::vector_store::{DocumentChunk, Vocabulary};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = start(Operation::Ask, settings).await?;
    let state = Arc::new(AppState { orchestrator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Sift API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Ask", "POST /ask");
    Output::kv("Search", "POST /search");
    Output::kv("Vocabulary", "GET  /vocabulary");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask))
        .route("/search", post(search))
        .route("/vocabulary", get(vocabulary))
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    /// Answer and sources rendered as Markdown.
    markdown: String,
    answer: String,
    sources: Vec<StructuredSource>,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    plan: PlanInfo,
    results: Vec<DocumentChunk>,
}

#[derive(Serialize)]
struct PlanInfo {
    shows: Vec<String>,
    hosts: Vec<String>,
    topics: Vec<String>,
    date: Option<String>,
    filter: Option<serde_json::Value>,
    parse_failed: bool,
}

impl From<&RetrievalPlan> for PlanInfo {
    fn from(plan: &RetrievalPlan) -> Self {
        Self {
            shows: plan.parsed.shows.iter().cloned().collect(),
            hosts: plan.parsed.hosts.iter().cloned().collect(),
            topics: plan.parsed.topics.clone(),
            date: plan.parsed.date.map(|d| d.to_string()),
            filter: plan.filter.as_ref().map(|f| f.to_json()),
            parse_failed: plan.parse_failed,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    error!("Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ask(State(state): State<Arc<AppState>>, Json(req): Json<AskRequest>) -> Response {
    match state.orchestrator.answer(&req.question).await {
        Ok(Some(answer)) => Json(AskResponse {
            markdown: answer.to_markdown(),
            answer: answer.text,
            sources: answer.sources,
        })
        .into_response(),
        Ok(None) => Json(AskResponse {
            markdown: NO_DOCUMENTS_MESSAGE.to_string(),
            answer: String::new(),
            sources: Vec::new(),
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn search(State(state): State<Arc<AppState>>, Json(req): Json<SearchRequest>) -> Response {
    let orchestrator = &state.orchestrator;
    let budget = req
        .limit
        .unwrap_or(orchestrator.settings().retrieval.context_budget);

    match orchestrator.retrieve_with_budget(&req.query, budget).await {
        Ok((plan, results)) => Json(SearchResponse {
            plan: PlanInfo::from(&plan),
            results,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn vocabulary(State(state): State<Arc<AppState>>) -> Json<Vocabulary> {
    Json(state.orchestrator.vocabulary().clone())
}

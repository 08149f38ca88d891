//! HTTP handlers
//!
//! Introspection endpoints read the shared state and always succeed. The
//! query endpoints run the agent inside a span tagged with a fresh request
//! id and map failures to `{"detail": ...}` bodies.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::state::AppState;
use super::trace::{reshape, simple_response};
use super::types::{
    AskResponse, ConfigResponse, ErrorResponse, HealthResponse, QueryRequest, SimpleAskResponse,
    ToolsResponse,
};
use crate::providers::Message;

/// Failure of a query endpoint
#[derive(Debug)]
pub enum ApiError {
    /// Startup has not published the agent yet
    NotReady,
    /// The agent run failed
    Execution(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::NotReady => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Agent not initialized".to_string(),
            ),
            Self::Execution(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_ready: state.is_ready(),
        tools_loaded: state.tools_loaded(),
    })
}

pub async fn config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        model: state.model.clone(),
        endpoint: state.endpoint.clone(),
        mcp_server: state.mcp_server.clone(),
        tools_count: state.tools_loaded(),
    })
}

pub async fn tools(State(state): State<Arc<AppState>>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state
            .context()
            .map(|c| c.tools.clone())
            .unwrap_or_default(),
    })
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let trace = run_query(&state, &request.query)
        .instrument(info_span!("ask", request_id = %Uuid::new_v4()))
        .await?;

    let (messages, final_response) = reshape(&trace);
    Ok(Json(AskResponse {
        query: request.query,
        messages,
        final_response,
    }))
}

pub async fn ask_simple(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<SimpleAskResponse>, ApiError> {
    let trace = run_query(&state, &request.query)
        .instrument(info_span!("ask_simple", request_id = %Uuid::new_v4()))
        .await?;

    Ok(Json(SimpleAskResponse {
        response: simple_response(&trace),
    }))
}

async fn run_query(state: &AppState, query: &str) -> Result<Vec<Message>, ApiError> {
    let Some(context) = state.context() else {
        warn!("Query rejected: agent not initialized");
        return Err(ApiError::NotReady);
    };

    info!("Processing query: {}", query);
    match context.agent.execute(query).await {
        Ok(trace) => {
            info!("Query completed successfully");
            Ok(trace)
        }
        Err(e) => {
            error!("Error processing query: {}", e);
            Err(ApiError::Execution(e))
        }
    }
}

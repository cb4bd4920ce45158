//! Axum server for the graph generation API

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::core::error::{Error, Result};
use crate::graph::{self, Category};
use crate::layout::{spring_layout_3d, DEFAULT_ITERATIONS, DEFAULT_K, DEFAULT_SEED};
use crate::tracer::{self, TraceConfig};

/// Positions land in [-POSITION_SCALE, POSITION_SCALE] on every axis.
const POSITION_SCALE: f64 = 10.0;

// =============================================================================
// STATE
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub trace_config: TraceConfig,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            trace_config: TraceConfig::default(),
        }
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Deserialize)]
pub struct GenerateGraphRequest {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateGraphResponse {
    pub graph: GraphPayload,
    pub trace: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct GraphPayload {
    pub nodes: Vec<NodePayload>,
    pub edges: Vec<EdgePayload>,
}

#[derive(Debug, Serialize)]
pub struct NodePayload {
    pub id: u32,
    pub code: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub position: [f64; 3],
}

#[derive(Debug, Serialize)]
pub struct EdgePayload {
    pub source: u32,
    pub target: u32,
}

/// Error wrapper that renders as `{"error": "..."}` with the right status.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::MissingCode | Error::Parse { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn api_generate_graph(
    State(state): State<AppState>,
    payload: Option<Json<GenerateGraphRequest>>,
) -> std::result::Result<Json<GenerateGraphResponse>, ApiError> {
    let code = payload
        .and_then(|Json(request)| request.code)
        .ok_or(Error::MissingCode)?;

    let response = generate_graph(&code, &state.trace_config).await?;
    Ok(Json(response))
}

/// Build graph, layout and trace for one snippet.
pub async fn generate_graph(code: &str, config: &TraceConfig) -> Result<GenerateGraphResponse> {
    let graph = graph::build(code)?;
    let positions = spring_layout_3d(&graph, DEFAULT_SEED, DEFAULT_K, DEFAULT_ITERATIONS);

    let nodes = graph
        .nodes
        .iter()
        .map(|node| {
            let unit = positions.get(&node.id).copied().unwrap_or_default();
            NodePayload {
                id: node.id,
                code: node.code.clone(),
                // Untagged lines present as plain data on the wire.
                node_type: node
                    .category
                    .map_or(Category::DataChange.as_str(), Category::as_str),
                position: [
                    unit[0] * POSITION_SCALE,
                    unit[1] * POSITION_SCALE,
                    unit[2] * POSITION_SCALE,
                ],
            }
        })
        .collect();

    let edges = graph
        .edges
        .iter()
        .map(|edge| EdgePayload {
            source: edge.source,
            target: edge.target,
        })
        .collect();

    let trace = tracer::trace(code, config).await;

    Ok(GenerateGraphResponse {
        graph: GraphPayload { nodes, edges },
        trace,
    })
}

// =============================================================================
// SERVER
// =============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate_graph", post(api_generate_graph))
        // Browser front ends run on a different origin during development.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(host: &str, port: u16) -> Result<()> {
    let host: IpAddr = host.parse().map_err(|_| Error::Internal {
        message: format!("invalid listen address: {host}"),
    })?;
    let addr = SocketAddr::new(host, port);

    let app = router(AppState::default());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "holograph listening");
    eprintln!("holograph running at http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_generate_graph_wire_shape() {
        let config = TraceConfig {
            max_events: 200,
            timeout: Duration::from_millis(500),
        };
        let response = generate_graph("x = 1\nprint(x)\n", &config).await.unwrap();

        assert_eq!(response.graph.nodes.len(), 2);
        assert_eq!(response.graph.nodes[0].node_type, "data_change");
        assert_eq!(response.graph.nodes[1].node_type, "function_call");
        for node in &response.graph.nodes {
            assert!(node.position.iter().all(|c| c.abs() <= POSITION_SCALE + 1e-9));
        }
        assert_eq!(response.graph.edges.len(), 1);
        assert_eq!(response.graph.edges[0].source, 1);
        assert_eq!(response.graph.edges[0].target, 2);
        assert_eq!(response.trace, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_untagged_lines_default_to_data_change() {
        let config = TraceConfig::default();
        let response = generate_graph("pass\n", &config).await.unwrap();
        assert_eq!(response.graph.nodes[0].node_type, "data_change");
    }

    #[tokio::test]
    async fn test_parse_error_propagates() {
        let config = TraceConfig::default();
        let err = generate_graph("def f(:\n", &config).await.unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }
}

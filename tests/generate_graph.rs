//! End-to-end tests for the graph generation API

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use holograph::tracer::TraceConfig;
use holograph::web::server::{router, AppState};

fn app() -> axum::Router {
    let state = AppState {
        trace_config: TraceConfig {
            max_events: 200,
            timeout: std::time::Duration::from_millis(500),
        },
    };
    router(state)
}

async fn post_code(body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/generate_graph")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

#[tokio::test]
async fn test_assignment_then_call() {
    let (status, body) = post_code(json!({ "code": "x = 1\nprint(x)\n" })).await;
    assert_eq!(status, StatusCode::OK);

    let nodes = body["graph"]["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0]["id"], 1);
    assert_eq!(nodes[0]["code"], "x = 1");
    assert_eq!(nodes[0]["type"], "data_change");
    assert_eq!(nodes[1]["type"], "function_call");

    for node in nodes {
        let position = node["position"].as_array().unwrap();
        assert_eq!(position.len(), 3);
        for coord in position {
            assert!(coord.as_f64().unwrap().abs() <= 10.0 + 1e-9);
        }
    }

    let edges = body["graph"]["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["source"], 1);
    assert_eq!(edges[0]["target"], 2);

    assert_eq!(body["trace"], json!([1, 2]));
}

#[tokio::test]
async fn test_loop_has_back_edge_and_bounded_trace() {
    let (status, body) = post_code(json!({ "code": "for i in range(3):\n    print(i)\n" })).await;
    assert_eq!(status, StatusCode::OK);

    let edges = body["graph"]["edges"].as_array().unwrap();
    let pairs: Vec<(i64, i64)> = edges
        .iter()
        .map(|e| (e["source"].as_i64().unwrap(), e["target"].as_i64().unwrap()))
        .collect();
    assert_eq!(pairs, vec![(1, 2), (2, 1)]);

    // Each line appears exactly once, regardless of iteration count.
    assert_eq!(body["trace"], json!([1, 2]));
}

#[tokio::test]
async fn test_missing_code_field_is_rejected() {
    let (status, body) = post_code(json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request. 'code' field is required.");
}

#[tokio::test]
async fn test_parse_error_reports_line_and_text() {
    let (status, body) = post_code(json!({ "code": "x = 1\ndef broken(:\n" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("line 2"), "got: {message}");
    assert!(message.contains("def broken(:"), "got: {message}");
}

#[tokio::test]
async fn test_infinite_loop_still_responds() {
    let (status, body) = post_code(json!({ "code": "while True:\n    x = 1\n" })).await;
    assert_eq!(status, StatusCode::OK);
    // Graph is complete; trace is the partial set the deadline allowed.
    assert_eq!(body["graph"]["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(body["trace"], json!([1, 2]));
}

#[tokio::test]
async fn test_snippet_exception_returns_partial_trace() {
    let (status, body) =
        post_code(json!({ "code": "a = 1\nb = a / 0\nc = 3\n" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trace"], json!([1, 2]));
}

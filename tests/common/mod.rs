#![allow(dead_code)]

use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral port and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A backend that behaves: OCR echoes the upload, explain echoes its input,
/// chat answers according to the message text.
pub fn healthy_backend() -> Router {
    Router::new()
        .route("/ocr", post(ocr))
        .route("/explain", post(explain))
        .route("/chat", post(chat))
        .route("/config.json", get(config_document))
}

async fn ocr(mut multipart: Multipart) -> impl IntoResponse {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap_or_default();
        return (
            StatusCode::OK,
            Json(json!({
                "10": "tenth",
                "2": "",
                "1": format!("{} bytes from {}", bytes.len(), name),
            })),
        );
    }
    (StatusCode::BAD_REQUEST, Json(json!({ "error": "no file" })))
}

async fn explain(Json(body): Json<Value>) -> Json<Value> {
    let language = body["language"].as_str().unwrap_or_default();
    let message = body["message"].as_str().unwrap_or_default();
    Json(json!({ "response": format!("[{}] {}", language, message) }))
}

async fn chat(Json(body): Json<Value>) -> axum::response::Response {
    match body["message"].as_str().unwrap_or_default() {
        "fail" => Json(json!({ "success": false, "error": "quota exceeded" })).into_response(),
        "empty" => Json(json!({ "success": true, "response": "" })).into_response(),
        "down" => (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response(),
        message => Json(json!({ "success": true, "response": format!("**re:** {}", message) }))
            .into_response(),
    }
}

async fn config_document() -> Json<Value> {
    Json(json!({ "localapi": "http://127.0.0.1:9/" }))
}

/// A backend where every endpoint misbehaves in its own way
pub fn broken_backend() -> Router {
    Router::new()
        .route("/ocr", post(|| async { StatusCode::BAD_GATEWAY }))
        .route(
            "/explain",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model offline") }),
        )
        .route("/chat", post(|| async { "not json" }))
}

/// Explain answers 200 with a body that is not the expected JSON
pub fn garbled_backend() -> Router {
    Router::new()
        .route("/explain", post(|| async { "<html>oops</html>" }))
        .route("/chat", post(|| async { Json(json!({})) }))
}

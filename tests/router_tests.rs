use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use opengmao::config::Config;
use opengmao::router::gmao_router;
use opengmao::testing::{ScriptedModel, TEST_KEY, test_config, test_state};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;

const BOUNDARY: &str = "opengmao-test-boundary";

async fn app_with(cfg: Config, model: ScriptedModel) -> Router {
    let state = test_state(cfg, model).await.expect("failed to build state");
    gmao_router(state)
}

async fn app(model: ScriptedModel) -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let router = app_with(test_config(dir.path()), model).await;
    (router, dir)
}

fn multipart(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Body {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn multipart_request(uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("x-api-key", TEST_KEY)
        .body(body)
        .expect("failed to build request")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-api-key", TEST_KEY)
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

fn raw_json_request(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-api-key", TEST_KEY)
        .body(Body::from(body))
        .expect("failed to build request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-api-key", TEST_KEY)
        .body(Body::empty())
        .expect("failed to build request")
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.expect("request failed");
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    (status, body.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, req).await;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

/// Poll a document until its extraction is no longer running.
async fn settled_document(app: &Router, uri: &str) -> Value {
    for _ in 0..100 {
        let (_, current) = send_json(app, get(uri)).await;
        if current["status"] != "processing" {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Value::Null
}

async fn create_asset(app: &Router, name: &str) -> Value {
    let (status, asset) = send_json(app, json_request("POST", "/api/assets", json!({"name": name}))).await;
    assert_eq!(status, StatusCode::CREATED);
    asset
}

#[tokio::test]
async fn health_needs_no_key() {
    let (app, _dir) = app(ScriptedModel::new()).await;
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn api_rejects_missing_or_wrong_key() {
    let (app, _dir) = app(ScriptedModel::new()).await;

    let req = Request::builder()
        .uri("/api/assets")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["error"]["localized"]["fr"], "Authentification requise.");

    let req = Request::builder()
        .uri("/api/assets")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri(format!("/api/assets?key={TEST_KEY}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);
}

#[tokio::test]
async fn chat_returns_413_for_oversized_body() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.limits.max_json_bytes = 1024;
    let app = app_with(cfg, ScriptedModel::new().on("chat", "ok")).await;

    let oversized = "a".repeat(4096);
    let (status, body) =
        send_json(&app, json_request("POST", "/api/chat", json!({"message": oversized}))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn malformed_requests_get_the_json_error_body() {
    let (app, _dir) = app(ScriptedModel::new().on("chat", "ok")).await;

    let (status, body) = send_json(&app, json_request("POST", "/api/chat", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
    assert!(body["error"]["localized"]["fr"].is_string());

    let (status, body) = send_json(&app, raw_json_request("/api/chat", "{\"message\": ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let req = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("x-api-key", TEST_KEY)
        .body(Body::from(r#"{"message": "oil level"}"#))
        .unwrap();
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let (status, body) = send_json(&app, get("/api/work-orders?status=bogus")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let req = Request::builder()
        .method("POST")
        .uri("/api/transcribe")
        .header(header::CONTENT_TYPE, "text/plain")
        .header("x-api-key", TEST_KEY)
        .body(Body::from("not a form"))
        .unwrap();
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn upload_rejects_non_pdf_and_oversized_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.limits.max_upload_bytes = 1024;
    let app = app_with(cfg, ScriptedModel::new()).await;

    let req = multipart_request(
        "/api/documents",
        multipart("file", "notes.txt", "text/plain", b"just some notes"),
    );
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "UNSUPPORTED_FORMAT");

    let mut big = b"%PDF-1.7\n".to_vec();
    big.resize(2048, b'x');
    let req = multipart_request(
        "/api/documents",
        multipart("file", "big.pdf", "application/pdf", &big),
    );
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");

    let req = multipart_request(
        "/api/documents",
        multipart("attachment", "a.pdf", "application/pdf", b"%PDF-1.7"),
    );
    assert_eq!(send(&app, req).await.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_extracts_in_background_and_deduplicates() {
    let model = ScriptedModel::new()
        .on(
            "metadata",
            r#"{"title": "P-101 manual", "manufacturer": "Grundfos", "model": "CR 10"}"#,
        )
        .on("classify", r#"{"category": "manual"}"#)
        .on(
            "sections",
            r#"{"sections": [{"heading": "Seal", "content": "Replace the shaft seal yearly."}]}"#,
        )
        .on("assets", r#"{"assets": [{"name": "Pump P-101", "model": "CR 10"}]}"#)
        .on("parts", r#"{"components": [], "spare_parts": []}"#)
        .on(
            "maintenance",
            r#"{"tasks": [{"asset": "Pump P-101", "task": "Replace shaft seal",
                "interval_value": 1, "interval_unit": "yearly"}]}"#,
        );
    let (app, _dir) = app(model).await;
    let pdf = b"%PDF-1.7 pump manual";

    let req = multipart_request(
        "/api/documents",
        multipart("file", "p101.pdf", "application/pdf", pdf),
    );
    let (status, doc) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(doc["status"], "processing");
    let id = doc["id"].as_str().unwrap().to_string();

    let mut extracted = Value::Null;
    for _ in 0..100 {
        let (_, current) = send_json(&app, get(&format!("/api/documents/{id}"))).await;
        if current["status"] != "processing" {
            extracted = current;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(extracted["status"], "extracted", "{extracted}");
    assert_eq!(extracted["assets_found"], 1);
    assert_eq!(extracted["tasks_found"], 1);

    let req = multipart_request(
        "/api/documents",
        multipart("file", "copy.pdf", "application/pdf", pdf),
    );
    let (status, again) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"], id.as_str());

    let (_, assets) = send_json(&app, get("/api/assets")).await;
    assert_eq!(assets.as_array().unwrap().len(), 1);
    assert_eq!(assets[0]["name"], "Pump P-101");
}

#[tokio::test]
async fn concurrent_reprocess_requests_start_one_extraction() {
    let gate = Arc::new(Notify::new());
    let model = ScriptedModel::new()
        .on("metadata", r#"{"title": "P-101 manual"}"#)
        .on(
            "sections",
            r#"{"sections": [{"heading": "Seal", "content": "Replace the shaft seal yearly."}]}"#,
        )
        .hold("sections", gate.clone());
    let (app, _dir) = app(model).await;

    let req = multipart_request(
        "/api/documents",
        multipart("file", "p101.pdf", "application/pdf", b"%PDF-1.7 pump manual"),
    );
    let (status, doc) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = doc["id"].as_str().unwrap().to_string();
    let doc_uri = format!("/api/documents/{id}");
    let reprocess_uri = format!("/api/documents/{id}/reprocess");

    let (status, body) =
        send_json(&app, json_request("POST", &reprocess_uri, Value::Null)).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"]["code"], "CONFLICT");

    gate.notify_one();
    assert_eq!(settled_document(&app, &doc_uri).await["status"], "extracted");

    let (first, second) = tokio::join!(
        send(&app, json_request("POST", &reprocess_uri, Value::Null)),
        send(&app, json_request("POST", &reprocess_uri, Value::Null)),
    );
    let mut statuses = [first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::ACCEPTED, StatusCode::CONFLICT]);

    gate.notify_one();
    assert_eq!(settled_document(&app, &doc_uri).await["status"], "extracted");
}

#[tokio::test]
async fn chat_answers_and_keeps_the_conversation() {
    let model = ScriptedModel::new().on("chat", "Coupez l'alimentation avant toute intervention.");
    let (app, _dir) = app(model).await;

    let (status, reply) = send_json(
        &app,
        json_request(
            "POST",
            "/api/chat",
            json!({"message": "Quelles sont les consignes de sécurité pour le compresseur ?"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["language"], "fr");
    assert_eq!(reply["intent"], "safety");
    assert_eq!(reply["cached"], false);

    let conversation_id = reply["conversation_id"].as_str().unwrap();
    let (status, messages) =
        send_json(&app, get(&format!("/api/conversations/{conversation_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages.as_array().unwrap().len(), 2);
    assert_eq!(messages[1]["role"], "assistant");

    let (status, _) = send(&app, get("/api/conversations/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send_json(&app, json_request("POST", "/api/chat", json!({"message": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn ai_routes_are_rate_limited() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.limits.ai_requests_per_minute = 1;
    let app = app_with(cfg, ScriptedModel::new().on("chat", "ok")).await;

    let ask = || json_request("POST", "/api/chat", json!({"message": "oil level"}));
    assert_eq!(send(&app, ask()).await.0, StatusCode::OK);

    let resp = app.clone().oneshot(ask()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key(header::RETRY_AFTER));

    // plain CRUD stays available
    assert_eq!(send(&app, get("/api/work-orders")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn dependency_suggestions_can_be_reviewed() {
    let model = ScriptedModel::new().on(
        "dependencies",
        r#"{"dependencies": [{"source": "Compressor C1", "target": "Transformer T1",
            "kind": "power", "confidence": 0.9}]}"#,
    );
    let (app, _dir) = app(model).await;
    create_asset(&app, "Compressor C1").await;
    create_asset(&app, "Transformer T1").await;

    let (status, suggestions) = send_json(
        &app,
        json_request(
            "POST",
            "/api/dependencies/suggest",
            json!({"text": "C1 is fed by transformer T1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(suggestions[0]["status"], "pending");
    let id = suggestions[0]["id"].as_str().unwrap();

    let (status, accepted) = send_json(
        &app,
        json_request("POST", &format!("/api/dependencies/{id}/accept"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "accepted");

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/api/dependencies/{id}/reject"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, pending) = send_json(&app, get("/api/dependencies?status=pending")).await;
    assert!(pending.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn qr_code_resolves_to_the_asset() {
    let (app, _dir) = app(ScriptedModel::new()).await;
    let asset = create_asset(&app, "Boiler B2").await;
    let id = asset["id"].as_str().unwrap();
    let code = asset["qr_code"].as_str().unwrap();

    let resp = app
        .clone()
        .oneshot(get(&format!("/api/assets/{id}/qr")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/svg+xml");

    let (status, found) =
        send_json(&app, get(&format!("/api/qr/{}", code.to_lowercase()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], id);
    assert!(found["components"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, get("/api/qr/ZZZZZZZZZZZZ")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn aliases_are_deduplicated() {
    let (app, _dir) = app(ScriptedModel::new()).await;
    let asset = create_asset(&app, "Chiller CH-1").await;
    let uri = format!("/api/assets/{}/aliases", asset["id"].as_str().unwrap());

    let (status, aliases) = send_json(&app, json_request("POST", &uri, json!({"alias": "Groupe froid"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(aliases, json!(["Groupe froid"]));

    let (status, aliases) = send_json(&app, json_request("POST", &uri, json!({"alias": "groupe-froid"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(aliases.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn work_order_lifecycle_over_http() {
    let (app, _dir) = app(ScriptedModel::new()).await;
    let asset = create_asset(&app, "Conveyor CV-3").await;

    let (status, wo) = send_json(
        &app,
        json_request(
            "POST",
            "/api/work-orders",
            json!({"title": "Replace drive belt", "asset_id": asset["id"], "priority": "high"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(wo["status"], "open");
    let uri = format!("/api/work-orders/{}", wo["id"].as_str().unwrap());

    let (status, body) = send_json(&app, json_request("PATCH", &uri, json!({"status": "completed"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = send(&app, json_request("PATCH", &uri, json!({"status": "in_progress"}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, done) = send_json(&app, json_request("PATCH", &uri, json!({"status": "completed"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(done["completed_at"].is_string());

    let (_, open) = send_json(&app, get("/api/work-orders?status=open")).await;
    assert!(open.as_array().unwrap().is_empty());
}

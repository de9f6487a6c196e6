pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::history::handlers as history;
use crate::ingest::handlers as ingest;
use crate::pipeline::handlers as pipeline;
use crate::review::handlers as review;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Generation
        .route("/api/v1/outreach/single", post(pipeline::handle_single))
        .route("/api/v1/outreach/batch", post(pipeline::handle_batch))
        .route("/api/v1/ingest/preview", post(ingest::handle_preview))
        // Background batches
        .route("/api/v1/batches", post(pipeline::handle_start_batch))
        .route("/api/v1/batches/template", get(pipeline::handle_template))
        .route("/api/v1/batches/:id", get(pipeline::handle_get_batch))
        .route(
            "/api/v1/batches/:id/cancel",
            post(pipeline::handle_cancel_batch),
        )
        // History and review
        .route("/api/v1/messages", get(history::handle_list))
        .route("/api/v1/messages/search", get(history::handle_search))
        .route("/api/v1/messages/stats", get(history::handle_stats))
        .route("/api/v1/messages/events", get(review::handle_events))
        .route("/api/v1/messages/export", get(history::handle_export))
        .route(
            "/api/v1/messages/:id",
            get(history::handle_get).delete(history::handle_delete),
        )
        .route(
            "/api/v1/messages/:id/download",
            get(history::handle_download),
        )
        .route(
            "/api/v1/messages/:id/approve",
            post(review::handle_approve),
        )
        .route("/api/v1/messages/:id/reject", post(review::handle_reject))
        .route(
            "/api/v1/profiles/:username",
            get(history::handle_get_profile),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tokio_stream::StreamExt;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, OutreachBackend, StoreBackend};
    use crate::models::message::{MessageType, Purpose};
    use crate::outreach::{CannedMessageGenerator, CannedProfileResolver};
    use crate::pipeline::{BatchProcessor, BatchRegistry, BatchSettings};
    use crate::review::ReviewService;
    use crate::store::{InMemoryMessageStore, MessageStore};

    fn test_state() -> AppState {
        let config = Config {
            store_backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            gemini_api_key: None,
            gemini_model: "gemini-pro".to_string(),
            outreach_backend: OutreachBackend::Canned,
            sender_org: "Fluxor".to_string(),
            default_message_type: MessageType::Email,
            default_purpose: Purpose::Partnership,
            batch_delay_ms: 0,
            persist_retries: 0,
            port: 0,
            rust_log: "info".to_string(),
        };
        let store: Arc<dyn MessageStore> = Arc::new(InMemoryMessageStore::new());
        let processor = BatchProcessor::new(
            Arc::new(CannedProfileResolver),
            Arc::new(CannedMessageGenerator::new("Fluxor")),
            store.clone(),
            BatchSettings {
                inter_item_delay: Duration::ZERO,
                ..BatchSettings::from_config(&config)
            },
        );
        AppState {
            review: ReviewService::new(store.clone()),
            store,
            processor,
            batches: BatchRegistry::new(),
            config,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(test_state());
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "outreach-api");
        assert_eq!(body["outreach"], "canned");
    }

    #[tokio::test]
    async fn test_generate_then_review() {
        let app = build_router(test_state());

        let (status, message) = send(
            &app,
            post_json(
                "/api/v1/outreach/single",
                json!({"identifier": "https://linkedin.com/in/john-doe", "message_type": "linkedin"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(message["status"], "pending");
        assert_eq!(message["message_type"], "linkedin");
        let id = message["id"].as_str().unwrap().to_string();

        let (status, approved) = send(
            &app,
            post_json(
                &format!("/api/v1/messages/{id}/approve"),
                json!({"reviewer": "ops"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["status"], "approved");
        assert_eq!(approved["reviewed_by"], "ops");

        let reject = Request::post(format!("/api/v1/messages/{id}/reject"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, reject).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

        let (_, stats) = send(&app, get("/api/v1/messages/stats")).await;
        assert_eq!(stats, json!({"pending": 0, "approved": 1, "rejected": 0, "total": 1}));

        let (status, profile) = send(&app, get("/api/v1/profiles/john-doe")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inline_batch_reports_rejected_rows() {
        let app = build_router(test_state());
        let csv = "https://linkedin.com/in/john-doe\njane-smith\nbad username!\n";

        let (status, body) = send(&app, post_json("/api/v1/outreach/batch", json!({"csv": csv}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["attempted"], 2);
        assert_eq!(body["rejected"].as_array().unwrap().len(), 1);

        let (_, page) = send(&app, get("/api/v1/messages?limit=1&status=pending")).await;
        assert_eq!(page["total"], 2);
        assert_eq!(page["messages"].as_array().unwrap().len(), 1);

        let (_, found) = send(&app, get("/api/v1/messages/search?q=JANE")).await;
        assert_eq!(found["total"], 1);
    }

    #[tokio::test]
    async fn test_invalid_input_is_a_validation_error() {
        let app = build_router(test_state());

        let (status, body) = send(
            &app,
            post_json("/api/v1/outreach/batch", json!({"csv": "username\nno way\n"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["rows"][0]["identifier"], "no way");

        let (status, _) = send(
            &app,
            post_json("/api/v1/outreach/single", json!({"identifier": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_message_is_not_found() {
        let app = build_router(test_state());
        let uri = format!("/api/v1/messages/{}", uuid::Uuid::new_v4());
        let (status, body) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let delete = Request::delete(&uri).body(Body::empty()).unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_preview_template_and_export() {
        let app = build_router(test_state());

        let (status, template) = send(&app, get("/api/v1/batches/template")).await;
        assert_eq!(status, StatusCode::OK);
        let template = template.as_str().unwrap().to_string();
        assert!(template.starts_with("LinkedIn Profile\n"));

        let preview = Request::post("/api/v1/ingest/preview")
            .header(header::CONTENT_TYPE, "text/csv")
            .body(Body::from(template))
            .unwrap();
        let (status, parsed) = send(&app, preview).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parsed["identifiers"], json!(["john-doe", "jane-smith", "alex-chen"]));

        send(&app, post_json("/api/v1/outreach/single", json!({"identifier": "alex-chen"}))).await;
        let (status, exported) = send(&app, get("/api/v1/messages/export?format=json")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(exported[0]["username"], "alex-chen");
        assert_eq!(exported[0]["status"], "pending");

        let (status, _) = send(&app, get("/api/v1/messages/export?format=csv&status=approved")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    const BOUNDARY: &str = "outreach-test-boundary";

    fn multipart(fields: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Request::post("/api/v1/batches")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn wait_for_job(app: &Router, id: &str) -> Value {
        for _ in 0..200 {
            let (status, job) = send(app, get(&format!("/api/v1/batches/{id}"))).await;
            assert_eq!(status, StatusCode::OK);
            if job["state"] != "running" {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("batch {id} did not finish");
    }

    #[tokio::test]
    async fn test_background_batch_from_upload() {
        let app = build_router(test_state());
        let csv = "LinkedIn Profile\njohn-doe\nbad username!\nhttps://linkedin.com/in/jane-smith\n";

        let (status, started) = send(
            &app,
            multipart(&[("file", csv), ("message_type", "linkedin"), ("purpose", "product")]),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(started["job"]["total"], 2);
        assert_eq!(started["job"]["message_type"], "linkedin");
        assert_eq!(started["rejected"].as_array().unwrap().len(), 1);

        let id = started["job"]["id"].as_str().unwrap().to_string();
        let job = wait_for_job(&app, &id).await;
        assert_eq!(job["state"], "completed");
        assert_eq!(job["current"], 2);
        assert_eq!(job["messages"].as_array().unwrap().len(), 2);
        assert_eq!(job["messages"][0]["purpose"], "product");

        let cancel = Request::post(format!("/api/v1/batches/{id}/cancel"))
            .body(Body::empty())
            .unwrap();
        let (status, snapshot) = send(&app, cancel).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(snapshot["state"], "completed");
    }

    #[tokio::test]
    async fn test_upload_accepts_csv_field_name() {
        let app = build_router(test_state());
        let (status, started) = send(&app, multipart(&[("csv", "alex-chen\n")])).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(started["job"]["identifiers"], json!(["alex-chen"]));
    }

    #[tokio::test]
    async fn test_upload_validation_errors() {
        let app = build_router(test_state());

        let (status, body) =
            send(&app, multipart(&[("file", "john-doe\n"), ("purpose", "sales")])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = send(&app, multipart(&[("purpose", "product")])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("file"));
    }

    #[tokio::test]
    async fn test_cancel_unknown_batch() {
        let app = build_router(test_state());
        let cancel = Request::post(format!("/api/v1/batches/{}/cancel", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, cancel).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_review_events_stream() {
        let app = build_router(test_state());

        let (_, message) = send(
            &app,
            post_json("/api/v1/outreach/single", json!({"identifier": "jane-smith"})),
        )
        .await;
        let id = message["id"].as_str().unwrap().to_string();

        let response = app.clone().oneshot(get("/api/v1/messages/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        let mut frames = response.into_body().into_data_stream();

        let (status, _) = send(
            &app,
            post_json(&format!("/api/v1/messages/{id}/approve"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let mut text = String::new();
        while !text.ends_with("\n\n") {
            let chunk = tokio::time::timeout(Duration::from_secs(5), frames.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            text.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert!(text.starts_with("event: review\n"), "{text}");
        assert!(text.contains(&id));
        assert!(text.contains("\"status\":\"approved\""));
        assert!(text.contains("\"total\":1"));
    }

    #[tokio::test]
    async fn test_unknown_batch_job() {
        let app = build_router(test_state());
        let (status, _) = send(&app, get(&format!("/api/v1/batches/{}", uuid::Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

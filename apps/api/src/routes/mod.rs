pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::ai::handlers as ai;
use crate::chat::handlers as chat;
use crate::interview::handlers as interview;
use crate::postings::handlers as postings;
use crate::state::AppState;
use crate::triage::handlers as triage;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Chat contexts
        .route("/api/v1/chat-contexts/ingest", post(chat::handle_ingest))
        .route("/api/v1/chat-contexts/:id", get(chat::handle_get_context))
        .route(
            "/api/v1/chat-contexts/:id/deactivate",
            post(chat::handle_deactivate_context),
        )
        .route("/api/v1/ingest-jobs", get(chat::handle_list_jobs))
        .route("/api/v1/ingest-jobs/:id", get(chat::handle_get_job))
        // Interview sessions
        .route(
            "/api/v1/sessions",
            post(interview::handle_create_session).get(interview::handle_list_sessions),
        )
        .route("/api/v1/sessions/:id", get(interview::handle_get_session))
        .route(
            "/api/v1/sessions/:id/questions",
            get(interview::handle_list_questions).post(interview::handle_add_questions),
        )
        .route(
            "/api/v1/sessions/:id/start",
            post(interview::handle_start_session),
        )
        .route(
            "/api/v1/sessions/:id/pause",
            post(interview::handle_pause_session),
        )
        .route(
            "/api/v1/sessions/:id/resume",
            post(interview::handle_resume_session),
        )
        .route(
            "/api/v1/sessions/:id/cancel",
            post(interview::handle_cancel_session),
        )
        .route(
            "/api/v1/sessions/:id/complete",
            post(interview::handle_complete_session),
        )
        .route(
            "/api/v1/sessions/:id/suggest-answer",
            post(interview::handle_suggest_answer),
        )
        .route(
            "/api/v1/questions/:id/respond",
            post(interview::handle_submit_response),
        )
        .route(
            "/api/v1/smart-responses",
            post(interview::handle_smart_responses),
        )
        // Job postings
        .route(
            "/api/v1/job-postings/ingest",
            post(postings::handle_ingest_posting),
        )
        .route("/api/v1/job-postings", get(postings::handle_list_postings))
        .route(
            "/api/v1/job-postings/search",
            post(postings::handle_search_postings),
        )
        .route("/api/v1/job-postings/:id", get(postings::handle_get_posting))
        .route(
            "/api/v1/job-postings/:id/score",
            post(postings::handle_score_posting),
        )
        // Message triage
        .route("/api/v1/messages/triage", post(triage::handle_triage))
        // Model status
        .route("/api/v1/ai/status", get(ai::handle_ai_status))
        .route("/api/v1/ai/initialize", post(ai::handle_ai_initialize))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::ai::manager::ModelManager;
    use crate::config::Config;
    use crate::store::InMemoryStore;

    fn app() -> Router {
        app_with(Config {
            template_seed: Some(7),
            ..Config::default()
        })
    }

    fn app_with(config: Config) -> Router {
        build_router(AppState::new(
            Arc::new(InMemoryStore::new()),
            ModelManager::template_only(),
            config,
        ))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn chat_payload(url: &str) -> Value {
        json!({
            "url": url,
            "projectTitle": "Booking API",
            "participants": ["Dana", "me"],
            "messages": [
                {"sender": "Dana", "content": "We need a Python developer to build a Django REST API"},
                {"sender": "me", "content": "I have built several Django projects with PostgreSQL"},
                {"sender": "Dana", "content": "Great, what is your experience with AWS deployment?"}
            ]
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_ingest_upserts_by_url_and_freezes() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/v1/chat-contexts/ingest", Some(chat_payload("https://chat/9"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created"], true);
        let id = body["context"]["id"].as_str().unwrap().to_string();
        let topics = body["context"]["extracted_topics"].as_array().unwrap();
        assert!(topics.iter().any(|t| t == "Python"));

        let (status, body) = send(&app, "POST", "/api/v1/chat-contexts/ingest", Some(chat_payload("https://chat/9"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["context"]["id"], id.as_str());

        let (status, _) = send(&app, "POST", &format!("/api/v1/chat-contexts/{id}/deactivate"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "POST", "/api/v1/chat-contexts/ingest", Some(chat_payload("https://chat/9"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (_, jobs) = send(&app, "GET", "/api/v1/ingest-jobs", None).await;
        let statuses: Vec<&str> = jobs.as_array().unwrap().iter().map(|j| j["status"].as_str().unwrap()).collect();
        assert_eq!(statuses, vec!["failed", "completed", "completed"]);
    }

    #[tokio::test]
    async fn test_ingest_succeeds_when_job_history_is_full() {
        let app = app_with(Config {
            ingest_job_history: 1,
            ..Config::default()
        });

        let (status, first) = send(&app, "POST", "/api/v1/chat-contexts/ingest", Some(chat_payload("https://chat/a"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, second) = send(&app, "POST", "/api/v1/chat-contexts/ingest", Some(chat_payload("https://chat/b"))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, jobs) = send(&app, "GET", "/api/v1/ingest-jobs", None).await;
        let jobs = jobs.as_array().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0]["id"], second["job_id"]);
        assert_eq!(jobs[0]["status"], "completed");

        let first_job = first["job_id"].as_str().unwrap();
        let (status, _) = send(&app, "GET", &format!("/api/v1/ingest-jobs/{first_job}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_and_malformed() {
        let app = app();
        let (status, _) = send(&app, "POST", "/api/v1/chat-contexts/ingest", Some(json!({"messages": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "POST", "/api/v1/chat-contexts/ingest", Some(json!("hello"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_interview_round_trip() {
        let app = app();
        let (_, ingested) = send(&app, "POST", "/api/v1/chat-contexts/ingest", Some(chat_payload("https://chat/1"))).await;
        let context_id = ingested["context"]["id"].clone();

        let (status, session) = send(
            &app,
            "POST",
            "/api/v1/sessions",
            Some(json!({"context_id": context_id, "interview_type": "technical", "num_questions": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(session["session_name"], "Interview for Booking API");
        assert_eq!(session["total_questions"], 2);
        let session_id = session["id"].as_str().unwrap().to_string();

        let (status, started) = send(&app, "POST", &format!("/api/v1/sessions/{session_id}/start"), None).await;
        assert_eq!(status, StatusCode::OK);
        let question_id = started["current_question"]["id"].as_str().unwrap().to_string();

        let (status, submitted) = send(
            &app,
            "POST",
            &format!("/api/v1/questions/{question_id}/respond"),
            Some(json!({
                "response_text": "For example, in one project I designed a Django REST API with PostgreSQL and Docker",
                "response_time_seconds": 45.0
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(submitted["progress"]["completed_questions"], 1);
        assert!(submitted["next_question"]["id"].is_string());

        let (status, report) = send(&app, "POST", &format!("/api/v1/sessions/{session_id}/complete"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["statistics"]["total_responses"], 1);
        assert!(!report["recommendations"].as_array().unwrap().is_empty());

        let (status, _) = send(&app, "POST", &format!("/api/v1/sessions/{session_id}/pause"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, listed) = send(&app, "GET", "/api/v1/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (_, ai_status) = send(&app, "GET", "/api/v1/ai/status", None).await;
        assert_eq!(ai_status["statistics"]["completed_sessions"], 1);
        assert_eq!(ai_status["storage_backend"], "memory");
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let (status, body) = send(
            &app(),
            "GET",
            "/api/v1/sessions/00000000-0000-0000-0000-000000000000",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_smart_responses_ranked() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/smart-responses",
            Some(json!({"chat_data": chat_payload("https://chat/2")})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let replies = body.as_array().unwrap();
        assert!(!replies.is_empty() && replies.len() <= 5);
        let confidences: Vec<f64> = replies.iter().map(|r| r["confidence"].as_f64().unwrap()).collect();
        assert!(confidences.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn test_smart_responses_empty_chat_is_422() {
        let (status, body) = send(
            &app(),
            "POST",
            "/api/v1/smart-responses",
            Some(json!({"chat_data": []})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "UNPROCESSABLE_ENTITY");
    }

    #[tokio::test]
    async fn test_job_posting_ingest_score_and_search() {
        let app = app();
        let (status, django) = send(
            &app,
            "POST",
            "/api/v1/job-postings/ingest",
            Some(json!({"payload": {
                "title": "Django REST API",
                "description": "<p>Python and Django developer for a REST API</p>",
                "skills": "python, django, react, aws"
            }})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(django["description"], "Python and Django developer for a REST API");
        assert_eq!(django["match_score"], 0.5);
        let django_id = django["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/job-postings/ingest",
            Some(json!({"title": "Landing page", "description": "React landing page", "skills": ["react"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, scored) = send(
            &app,
            "POST",
            &format!("/api/v1/job-postings/{django_id}/score"),
            Some(json!({"skills": "django"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(scored["match_score"], 1.0);
        let (_, stored) = send(&app, "GET", &format!("/api/v1/job-postings/{django_id}"), None).await;
        assert_eq!(stored["match_score"], 1.0);

        let (status, ranked) = send(
            &app,
            "POST",
            "/api/v1/job-postings/search",
            Some(json!({"skills": ["python", "django"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let ranked = ranked.as_array().unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0]["id"], django_id.as_str());
        assert_eq!(ranked[0]["search_score"], 1.0);
        assert_eq!(ranked[1]["search_score"], 0.0);

        let (_, listed) = send(&app, "GET", "/api/v1/job-postings", None).await;
        assert_eq!(listed[0]["title"], "Landing page");
    }

    #[tokio::test]
    async fn test_job_posting_url_without_description_is_400() {
        let (status, body) = send(
            &app(),
            "POST",
            "/api/v1/job-postings/ingest",
            Some(json!({"title": "x", "url": "https://jobs/9"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_triage() {
        let (status, body) = send(
            &app(),
            "POST",
            "/api/v1/messages/triage",
            Some(json!({"chat_data": [{"sender": "Dana", "content": "What is your rate? How much for this?"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["intent"], "price_question");
        assert_eq!(body["suggested_replies"].as_array().unwrap().len(), 5);
        assert!(body["personalized_reply"].as_str().unwrap().starts_with("I'd be happy"));
    }

    #[tokio::test]
    async fn test_ai_initialize_template_only() {
        let (status, body) = send(&app(), "POST", "/api/v1/ai/initialize", Some(json!({"force_reload": true}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_initialized"], true);
        assert_eq!(body["backend"], "template");
        assert_eq!(body["generator_available"], false);
    }
}

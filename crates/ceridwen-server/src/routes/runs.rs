//! Run endpoints: create, poll, retry.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use ceridwen_store::RunRecord;
use ceridwen_types::{OutputRefs, RunRequest, RunStatus, StepId, StepStatus};

use crate::error::Result;
use crate::state::AppState;

// ── Request/Response types ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunRequest {
    pub subject_id: String,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub channels: Option<Vec<String>>,
    #[serde(default)]
    pub include_video: Option<bool>,
}

impl CreateRunRequest {
    fn to_run_request(&self) -> RunRequest {
        RunRequest {
            goal: self.goal.clone(),
            tone: self.tone.clone(),
            channels: self.channels.clone(),
            include_video: self.include_video,
        }
    }
}

/// Retry override body; all fields optional, omitted fields retain the
/// values stored on the run. An empty object retries as-is.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRunRequest {
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub channels: Option<Vec<String>>,
    #[serde(default)]
    pub include_video: Option<bool>,
}

impl RetryRunRequest {
    fn to_run_request(&self) -> RunRequest {
        RunRequest {
            goal: self.goal.clone(),
            tone: self.tone.clone(),
            channels: self.channels.clone(),
            include_video: self.include_video,
        }
    }
}

/// Response for create and retry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStartedResponse {
    pub run_id: String,
    pub status: RunStatus,
    pub current_step: Option<StepId>,
    pub last_error: Option<String>,
}

impl From<&RunRecord> for RunStartedResponse {
    fn from(run: &RunRecord) -> Self {
        Self {
            run_id: run.id.clone(),
            status: run.status,
            current_step: run.current_step,
            last_error: run.last_error.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StepView {
    pub id: StepId,
    pub label: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full polling projection of a run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshotResponse {
    pub run_id: String,
    pub status: RunStatus,
    pub current_step: Option<StepId>,
    pub last_error: Option<String>,
    pub steps: Vec<StepView>,
    pub output_refs: OutputRefs,
    pub created_at: String,
    pub updated_at: String,
}

impl From<RunRecord> for RunSnapshotResponse {
    fn from(run: RunRecord) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            current_step: run.current_step,
            last_error: run.last_error,
            steps: run
                .steps
                .into_iter()
                .map(|s| StepView {
                    id: s.id,
                    label: s.label,
                    status: s.status,
                    error: s.error,
                })
                .collect(),
            output_refs: run.output_refs,
            created_at: run.created_at.to_rfc3339(),
            updated_at: run.updated_at.to_rfc3339(),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /runs
pub async fn create_run_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateRunRequest>,
) -> Result<impl IntoResponse> {
    let run = state
        .engine
        .start(&req.subject_id, &req.to_run_request())
        .await?;
    Ok((StatusCode::CREATED, Json(RunStartedResponse::from(&run))))
}

/// GET /runs/{runId}
pub async fn get_run_handler(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSnapshotResponse>> {
    let run = state.engine.snapshot(&run_id)?;
    Ok(Json(RunSnapshotResponse::from(run)))
}

/// POST /runs/{runId}/retry
pub async fn retry_run_handler(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(req): Json<RetryRunRequest>,
) -> Result<Json<RunStartedResponse>> {
    let run = state.engine.resume(&run_id, &req.to_run_request()).await?;
    Ok(Json(RunStartedResponse::from(&run)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use ceridwen_engine::testing::{Script, ScriptedExecutor};
    use ceridwen_engine::{EngineConfig, RunEngine};
    use ceridwen_limiter::{AdmissionController, LimiterConfig, Quota};
    use ceridwen_store::{Database, LimitStore, RunStore};

    use crate::{Server, ServerConfig, state::AppState};

    fn test_state(executor: Arc<ScriptedExecutor>, limiter_config: LimiterConfig) -> AppState {
        let db = Database::open_in_memory().unwrap();
        let engine = RunEngine::new(RunStore::new(db.clone()), executor, EngineConfig::default());
        let limiter = AdmissionController::new(LimitStore::new(db), limiter_config);
        AppState::new(engine, limiter, ServerConfig::default())
    }

    fn test_router(executor: Arc<ScriptedExecutor>) -> Router {
        Server::from_state(test_state(executor, LimiterConfig::default())).router()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn create_body() -> Value {
        json!({
            "subjectId": "plan-1",
            "goal": "announce the beta",
            "tone": "friendly",
            "channels": ["Email", "twitter"],
            "includeVideo": false
        })
    }

    #[tokio::test]
    async fn test_create_run_completes() {
        let app = test_router(Arc::new(ScriptedExecutor::new()));

        let response = app.oneshot(post_json("/runs", create_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["status"], "done");
        assert_eq!(body["currentStep"], Value::Null);
        assert_eq!(body["lastError"], Value::Null);
        assert!(body["runId"].as_str().unwrap().len() > 10);
    }

    #[tokio::test]
    async fn test_get_run_snapshot_shape() {
        let app = test_router(Arc::new(ScriptedExecutor::new()));

        let created = app
            .clone()
            .oneshot(post_json("/runs", create_body()))
            .await
            .unwrap();
        let run_id = body_json(created).await["runId"].as_str().unwrap().to_string();

        let response = app.oneshot(get(&format!("/runs/{run_id}"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["runId"], run_id.as_str());
        assert_eq!(body["status"], "done");
        let steps = body["steps"].as_array().unwrap();
        assert_eq!(steps.len(), 7);
        assert_eq!(steps[0]["id"], "brand-voice");
        assert_eq!(steps[0]["label"], "Brand voice");
        assert_eq!(steps[0]["status"], "done");
        assert!(steps[0].get("error").is_none());
        assert!(body["outputRefs"]["draft-copy"].is_object());
        assert!(body["createdAt"].is_string());
        assert!(body["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_get_unknown_run() {
        let app = test_router(Arc::new(ScriptedExecutor::new()));
        let response = app.oneshot(get("/runs/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn test_retry_rejected_unless_failed() {
        let app = test_router(Arc::new(ScriptedExecutor::new()));

        let created = app
            .clone()
            .oneshot(post_json("/runs", create_body()))
            .await
            .unwrap();
        let run_id = body_json(created).await["runId"].as_str().unwrap().to_string();

        let response = app
            .oneshot(post_json(&format!("/runs/{run_id}/retry"), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_failed_run_retries_to_done() {
        use ceridwen_types::StepId;

        let executor = Arc::new(ScriptedExecutor::new().with_script(
            StepId::EmailSequence,
            Script::Fail("smtp template error".to_string()),
        ));
        let app = test_router(executor.clone());

        let created = app
            .clone()
            .oneshot(post_json("/runs", create_body()))
            .await
            .unwrap();
        let body = body_json(created).await;
        let run_id = body["runId"].as_str().unwrap().to_string();
        assert_eq!(body["status"], "failed");
        assert_eq!(body["currentStep"], "email-sequence");
        assert_eq!(body["lastError"], "smtp template error");

        // The snapshot carries the per-step error for the UI
        let snapshot = app
            .clone()
            .oneshot(get(&format!("/runs/{run_id}")))
            .await
            .unwrap();
        let snapshot = body_json(snapshot).await;
        assert_eq!(snapshot["steps"][4]["status"], "failed");
        assert_eq!(snapshot["steps"][4]["error"], "smtp template error");

        executor.set_script(StepId::EmailSequence, Script::Succeed);
        let retried = app
            .oneshot(post_json(&format!("/runs/{run_id}/retry"), json!({})))
            .await
            .unwrap();
        assert_eq!(retried.status(), StatusCode::OK);
        let retried = body_json(retried).await;
        assert_eq!(retried["status"], "done");
        assert_eq!(retried["currentStep"], Value::Null);
    }

    #[tokio::test]
    async fn test_create_rate_limited_with_retry_after() {
        let mut limiter_config = LimiterConfig::default();
        limiter_config
            .endpoints
            .insert("runs.create".to_string(), Quota::new(1, 60));
        let state = test_state(Arc::new(ScriptedExecutor::new()), limiter_config);
        let app = Server::from_state(state).router();

        let first = app
            .clone()
            .oneshot(post_json("/runs", create_body()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(post_json("/runs", create_body()))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = second
            .headers()
            .get("Retry-After")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));
        let body = body_json(second).await;
        assert_eq!(body["code"], "rate_limited");
        assert_eq!(body["retryAfterSeconds"], retry_after);
    }

    #[tokio::test]
    async fn test_rate_limit_disabled_in_config() {
        let mut limiter_config = LimiterConfig::default();
        limiter_config
            .endpoints
            .insert("runs.create".to_string(), Quota::new(1, 60));
        let db = Database::open_in_memory().unwrap();
        let engine = RunEngine::new(
            RunStore::new(db.clone()),
            Arc::new(ScriptedExecutor::new()),
            EngineConfig::default(),
        );
        let limiter = AdmissionController::new(LimitStore::new(db), limiter_config);
        let config = ServerConfig::default().with_rate_limiting(false);
        let app = Server::from_state(AppState::new(engine, limiter, config)).router();

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(post_json("/runs", create_body()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }
    }

    #[tokio::test]
    async fn test_health_not_gated() {
        let mut limiter_config = LimiterConfig::default();
        limiter_config
            .endpoints
            .insert("runs.create".to_string(), Quota::new(0, 60));
        let state = test_state(Arc::new(ScriptedExecutor::new()), limiter_config);
        let app = Server::from_state(state).router();

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }
}

//! REST API server wrapping the executor
//!
//! This server exposes code execution to the query pipeline over HTTP.
//!
//! ## Endpoints
//!
//! POST /api/v1/execute - Execute a code snippet
//! GET /api/v1/executions - List recent execution records
//! GET /health - Service health and admission state
//! GET /api/docs - API documentation

use std::time::{Duration, Instant};

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use chrono::{DateTime, Utc};
use code_executor::{
    utils, Capability, ExecutionOutcome, ExecutionRequest, Executor, ExecutorError,
    ResourceBudget, ServiceConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// Number of recent execution records kept in memory
const RECORD_CAPACITY: usize = 100;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServiceConfig::from_env();
    let bind_addr = (config.host.clone(), config.port);

    let executor =
        Executor::new(config.executor.clone()).map_err(|e| std::io::Error::other(e.to_string()))?;
    let state = web::Data::new(AppState::new(executor, config.default_budget));

    println!(
        "Code executor API server starting on http://{}:{}",
        config.host, config.port
    );
    println!(
        "API documentation available at http://{}:{}/api/docs",
        config.host, config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
            .route("/api/docs", web::get().to(api_docs))
            .service(
                web::scope("/api/v1")
                    .route("/execute", web::post().to(execute))
                    .route("/executions", web::get().to(list_executions)),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}

// ============ API Types ============

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// Code text to execute
    pub code: String,
    /// Wall-clock limit in milliseconds
    pub max_duration_ms: Option<u64>,
    /// Memory limit (e.g., "50M", "1G")
    pub max_memory: Option<String>,
    /// Output limit in bytes
    pub max_output_bytes: Option<u64>,
    /// Grant network access
    pub network: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub id: String,
    #[serde(flatten)]
    pub outcome: ExecutionOutcome,
    pub wall_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub wall_time_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    fn error(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

// ============ Application State ============

pub struct AppState {
    executor: Executor,
    default_budget: ResourceBudget,
    records: Mutex<Vec<ExecutionRecord>>,
}

impl AppState {
    fn new(executor: Executor, default_budget: ResourceBudget) -> Self {
        Self {
            executor,
            default_budget,
            records: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, record: ExecutionRecord) {
        let mut records = self.records.lock().unwrap();
        records.push(record);
        if records.len() > RECORD_CAPACITY {
            records.remove(0);
        }
    }
}

// ============ Handlers ============

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "code-executor",
        "active_sessions": state.executor.admission().active(),
        "max_sessions": state.executor.admission().capacity(),
    }))
}

/// API documentation
async fn api_docs() -> impl Responder {
    let docs = r#"
# Code Executor API v1

## Endpoints

### Execute Code
**POST /api/v1/execute**

```json
{
  "code": "print(2+2)",
  "max_duration_ms": 2000,
  "max_memory": "50M",
  "max_output_bytes": 1024,
  "network": false
}
```

Response `data.status` is one of:
- success          (includes stdout and return_value)
- timeout
- memory_exceeded
- runtime_error    (includes message and stacktrace)
- output_truncated (includes partial output)
- rejected         (static safety screen refused the code)
- cancelled

HTTP status codes:
- 200 execution finished (any status above)
- 400 invalid request (empty code, bad budget)
- 429 admission limit reached, retry later

### List Recent Executions
**GET /api/v1/executions**

### Health
**GET /health**

## Examples

```bash
curl -X POST http://localhost:8080/api/v1/execute \
  -H "Content-Type: application/json" \
  -d '{
    "code": "set_result(sum(range(10)))",
    "max_duration_ms": 2000,
    "max_memory": "50M"
  }'
```
"#;
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(docs)
}

/// Execute a snippet and return its typed outcome
async fn execute(req: web::Json<ExecuteRequest>, state: web::Data<AppState>) -> impl Responder {
    let budget = match budget_from(&req, &state.default_budget) {
        Ok(budget) => budget,
        Err(e) => {
            return HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string()));
        }
    };

    let mut request = ExecutionRequest::new(req.code.clone(), budget);
    if req.network.unwrap_or(false) {
        request = request.with_capability(Capability::Network);
    }

    let id = Uuid::new_v4().to_string();
    let submitted_at = Utc::now();
    let start = Instant::now();

    let state_for_block = state.clone();
    let result = web::block(move || state_for_block.executor.execute(&request)).await;
    let wall_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(outcome)) => {
            state.record(ExecutionRecord {
                id: id.clone(),
                status: outcome.status().to_string(),
                submitted_at,
                wall_time_ms,
            });

            HttpResponse::Ok().json(ApiResponse::ok(
                "Execution finished",
                ExecuteResponse {
                    id,
                    outcome,
                    wall_time_ms,
                },
            ))
        }
        Ok(Err(e)) => match e {
            ExecutorError::InvalidRequest(_) | ExecutorError::InvalidConfig(_) => {
                HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string()))
            }
            ExecutorError::ResourceExhausted(_) => {
                HttpResponse::TooManyRequests().json(ApiResponse::<()>::error(e.to_string()))
            }
            other => {
                HttpResponse::InternalServerError().json(ApiResponse::<()>::error(other.to_string()))
            }
        },
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Execution task failed: {}", e))),
    }
}

/// List recent execution records
async fn list_executions(state: web::Data<AppState>) -> impl Responder {
    let records = state.records.lock().unwrap().clone();
    HttpResponse::Ok().json(ApiResponse::ok(
        format!("Found {} executions", records.len()),
        records,
    ))
}

fn budget_from(
    req: &ExecuteRequest,
    default: &ResourceBudget,
) -> Result<ResourceBudget, ExecutorError> {
    let mut budget = *default;

    if let Some(ms) = req.max_duration_ms {
        budget.max_duration = Duration::from_millis(ms);
    }
    if let Some(ref memory) = req.max_memory {
        budget.max_memory_bytes = utils::parse_memory_size(memory)?;
    }
    if let Some(bytes) = req.max_output_bytes {
        budget.max_output_bytes = bytes;
    }

    Ok(budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use code_executor::ExecutorConfig;
    use tempfile::TempDir;

    fn status_of<R: Responder>(resp: R) -> StatusCode {
        resp.respond_to(&test::TestRequest::default().to_http_request())
            .status()
    }

    fn test_state(tmp: &TempDir) -> web::Data<AppState> {
        let executor = Executor::new(ExecutorConfig {
            scratch_root: tmp.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        web::Data::new(AppState::new(executor, ResourceBudget::default()))
    }

    fn execute_request(code: &str) -> web::Json<ExecuteRequest> {
        web::Json(ExecuteRequest {
            code: code.to_string(),
            max_duration_ms: Some(2_000),
            max_memory: Some("64M".to_string()),
            max_output_bytes: Some(1024),
            network: None,
        })
    }

    #[actix_web::test]
    async fn health_and_docs_endpoints_work() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp);
        assert_eq!(status_of(health_check(state).await), StatusCode::OK);
        assert_eq!(status_of(api_docs().await), StatusCode::OK);
    }

    #[actix_web::test]
    async fn execute_empty_code_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp);

        let resp = execute(execute_request(""), state).await;
        assert_eq!(status_of(resp), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn execute_invalid_memory_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp);

        let req = web::Json(ExecuteRequest {
            code: "print(1)".to_string(),
            max_duration_ms: None,
            max_memory: Some("plenty".to_string()),
            max_output_bytes: None,
            network: None,
        });
        let resp = execute(req, state).await;
        assert_eq!(status_of(resp), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn execute_screened_code_returns_rejected_outcome() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp);

        // rejected by the screen before any interpreter is needed
        let resp = execute(execute_request("import os"), state.clone()).await;
        assert_eq!(status_of(resp), StatusCode::OK);

        let records = state.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, "rejected");
    }

    #[actix_web::test]
    async fn list_executions_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp);
        let resp = list_executions(state).await;
        assert_eq!(status_of(resp), StatusCode::OK);
    }

    #[actix_web::test]
    async fn record_list_is_bounded() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp);

        for i in 0..(RECORD_CAPACITY + 10) {
            state.record(ExecutionRecord {
                id: format!("id-{}", i),
                status: "success".to_string(),
                submitted_at: Utc::now(),
                wall_time_ms: 1,
            });
        }

        let records = state.records.lock().unwrap();
        assert_eq!(records.len(), RECORD_CAPACITY);
        assert_eq!(records[0].id, "id-10");
    }

    #[actix_web::test]
    async fn budget_from_applies_overrides() {
        let req = ExecuteRequest {
            code: "print(1)".to_string(),
            max_duration_ms: Some(250),
            max_memory: Some("1G".to_string()),
            max_output_bytes: Some(9),
            network: None,
        };
        let budget = budget_from(&req, &ResourceBudget::default()).unwrap();
        assert_eq!(budget.max_duration, Duration::from_millis(250));
        assert_eq!(budget.max_memory_bytes, 1024 * 1024 * 1024);
        assert_eq!(budget.max_output_bytes, 9);
    }

    #[actix_web::test]
    async fn budget_from_keeps_defaults() {
        let req = ExecuteRequest {
            code: "print(1)".to_string(),
            max_duration_ms: None,
            max_memory: None,
            max_output_bytes: None,
            network: None,
        };
        let budget = budget_from(&req, &ResourceBudget::default()).unwrap();
        assert_eq!(budget, ResourceBudget::default());
    }

    #[actix_web::test]
    async fn api_response_ok_structure() {
        let response: ApiResponse<String> =
            ApiResponse::ok("test message", "test data".to_string());
        assert!(response.success);
        assert_eq!(response.message, "test message");
        assert_eq!(response.data, Some("test data".to_string()));
    }
}

//! axum router and handlers for the task JSON API.

use axum::{
    Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::{ErrorCode, TaskError};
use crate::service::{TaskService, TaskUpdate};
use crate::types::{Task, TaskPage, TaskTree};

/// Server state shared across handlers.
#[derive(Clone)]
pub struct ApiServer {
    service: Arc<TaskService>,
}

impl ApiServer {
    pub fn new(service: Arc<TaskService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &TaskService {
        &self.service
    }
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

fn status_for(err: &TaskError) -> StatusCode {
    match err {
        TaskError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        TaskError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let field = match &self {
            TaskError::Validation { field, .. } => Some(*field),
            _ => None,
        };
        let error = if self.is_client_error() {
            warn!(code = ?self.code(), error = %self, "Request rejected");
            self.to_string()
        } else {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        };

        let body = ErrorResponse {
            error,
            code: self.code(),
            field,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, TaskError>;

/// Unwrap a JSON body, reporting malformed input as a validation error.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| TaskError::validation("body", rejection.body_text()))
}

/// Lenient integer parsing for query strings; junk falls back to defaults.
fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse::<u32>().ok()).filter(|n| *n > 0)
}

#[derive(Debug, Default, Deserialize)]
struct PageParams {
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TreeParams {
    archived: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest {
    title: Option<String>,
    description: Option<String>,
    parent_task: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    title: Option<String>,
    description: Option<String>,
    completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveTaskRequest {
    #[serde(default)]
    parent_task: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    message: &'static str,
    deleted: usize,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn list_active(
    State(state): State<ApiServer>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<TaskPage>> {
    let page = state.service().list_active(
        parse_positive(params.page.as_deref()),
        parse_positive(params.limit.as_deref()),
    )?;
    Ok(Json(page))
}

async fn list_archived(
    State(state): State<ApiServer>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<TaskPage>> {
    let page = state.service().list_archived(
        parse_positive(params.page.as_deref()),
        parse_positive(params.limit.as_deref()),
    )?;
    Ok(Json(page))
}

async fn task_tree(
    State(state): State<ApiServer>,
    Query(params): Query<TreeParams>,
) -> ApiResult<Json<Vec<TaskTree>>> {
    let archived = params.archived.as_deref() == Some("true");
    Ok(Json(state.service().tree(archived)?))
}

async fn get_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.service().get(&task_id)?))
}

async fn create_task(
    State(state): State<ApiServer>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let request = json_body(payload)?;
    let title = request
        .title
        .ok_or_else(|| TaskError::validation("title", "Title is required"))?;
    let task = state
        .service()
        .create(&title, request.description.as_deref(), request.parent_task)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let request = json_body(payload)?;
    let task = state.service().update(
        &task_id,
        TaskUpdate {
            title: request.title,
            description: request.description,
            completed: request.completed,
        },
    )?;
    Ok(Json(task))
}

async fn move_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<String>,
    payload: Result<Json<MoveTaskRequest>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let request = json_body(payload)?;
    Ok(Json(state.service().move_task(&task_id, request.parent_task)?))
}

async fn delete_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let deleted = state.service().delete(&task_id)?;
    Ok(Json(DeleteResponse {
        message: "Task and all subtasks deleted successfully",
        deleted,
    }))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router with all routes.
pub fn build_router(state: ApiServer) -> Router {
    // The browser client is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/tasks", post(create_task))
        .route("/api/tasks/active", get(list_active))
        .route("/api/tasks/archived", get(list_archived))
        .route("/api/tasks/tree", get(task_tree))
        .route(
            "/api/tasks/{task_id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/api/tasks/{task_id}/move", patch(move_task))
        .route("/api/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle for a running HTTP server.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections, drain in-flight requests and wait.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "HTTP server task ended abnormally");
        }
    }
}

/// Bind `addr` and serve the API in a background task.
pub async fn start_server(service: Arc<TaskService>, addr: &str) -> anyhow::Result<ServerHandle> {
    let app = build_router(ApiServer::new(service));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Task API shutting down");
            })
            .await
        {
            error!("HTTP server error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr: bound_addr,
        shutdown_tx,
        task,
    })
}

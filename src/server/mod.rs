use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::errors::GenError;
use crate::pipeline::Pipeline;
use crate::wire::{
    CreateProjectInput, EditScreenInput, GenerateManifestInput, GenerateScreenInput, ScreenKey, UpdateProjectInput,
};

/// Header carrying the opaque caller identity set by the auth proxy.
pub const IDENTITY_HEADER: &str = "x-user-id";
/// Optional display name used when the caller's user row is first created.
pub const NAME_HEADER: &str = "x-user-name";

pub type AppState = Arc<Pipeline>;

/// A pipeline error plus the message the endpoint reports for it.
pub struct ApiError {
    err: GenError,
    context: &'static str,
}

impl ApiError {
    fn new(context: &'static str) -> impl FnOnce(GenError) -> ApiError {
        move |err| ApiError { err, context }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.err {
            GenError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized User" }))).into_response()
            }
            GenError::Parse { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Failed to parse config" }))).into_response()
            }
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": self.context, "details": other.to_string() })),
            )
                .into_response(),
        }
    }
}

fn caller(headers: &HeaderMap) -> Option<&str> {
    header(headers, IDENTITY_HEADER)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/user", post(ensure_user))
        .route("/api/generate-config", post(generate_config).delete(delete_screen))
        .route("/api/generate-screen-ui", post(generate_screen_ui))
        .route("/api/edit-screen", post(edit_screen))
        .route("/api/project", post(create_project).get(get_project).put(update_project))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn health(State(p): State<AppState>) -> Json<serde_json::Value> {
    let caps = p.capabilities();
    Json(json!({
        "ok": true,
        "model": !crate::policy::should_mock(caps.credential()),
        "database": caps.database_url.is_some(),
    }))
}

async fn ensure_user(State(p): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let out = p
        .ensure_user(caller(&headers), header(&headers, NAME_HEADER))
        .await
        .map_err(ApiError::new("Failed to process user"))?;
    Ok(Json(out.value).into_response())
}

async fn generate_config(
    State(p): State<AppState>,
    Json(input): Json<GenerateManifestInput>,
) -> Result<Response, ApiError> {
    let out = p.generate_manifest(&input).await.map_err(ApiError::new("Failed to generate config"))?;
    Ok(Json(out.value).into_response())
}

async fn delete_screen(
    State(p): State<AppState>,
    headers: HeaderMap,
    Query(key): Query<ScreenKey>,
) -> Result<Response, ApiError> {
    p.delete_screen(caller(&headers), &key.project_id, &key.screen_id)
        .await
        .map_err(ApiError::new("Failed to delete"))?;
    Ok(Json(json!({ "msg": "Deleted" })).into_response())
}

async fn generate_screen_ui(
    State(p): State<AppState>,
    Json(input): Json<GenerateScreenInput>,
) -> Result<Response, ApiError> {
    let out = p
        .generate_screen_markup(&input)
        .await
        .map_err(ApiError::new("Failed to generate screen UI"))?;
    Ok(Json(out.value).into_response())
}

async fn edit_screen(State(p): State<AppState>, Json(input): Json<EditScreenInput>) -> Result<Response, ApiError> {
    let out = p.edit_screen_markup(&input).await.map_err(ApiError::new("Failed to edit screen"))?;
    Ok(Json(out.value).into_response())
}

async fn create_project(
    State(p): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateProjectInput>,
) -> Result<Response, ApiError> {
    let out = p
        .create_project(caller(&headers), &input)
        .await
        .map_err(ApiError::new("Failed to create project"))?;
    Ok(Json(out.value).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectQuery {
    project_id: Option<String>,
}

async fn get_project(
    State(p): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ProjectQuery>,
) -> Result<Response, ApiError> {
    let who = caller(&headers);
    let body = match q.project_id {
        Some(id) => Json(p.project_detail(who, &id).await.map_err(ApiError::new("Failed to fetch projects"))?)
            .into_response(),
        None => Json(p.list_projects(who).await.map_err(ApiError::new("Failed to fetch projects"))?).into_response(),
    };
    Ok(body)
}

async fn update_project(
    State(p): State<AppState>,
    Json(input): Json<UpdateProjectInput>,
) -> Result<Response, ApiError> {
    let out = p.update_project(&input).await.map_err(ApiError::new("Failed to update project"))?;
    Ok(Json(out).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_header_trimmed_and_required() {
        let mut h = HeaderMap::new();
        assert_eq!(caller(&h), None);
        h.insert(IDENTITY_HEADER, "  ".parse().unwrap());
        assert_eq!(caller(&h), None);
        h.insert(IDENTITY_HEADER, " user@example.com ".parse().unwrap());
        assert_eq!(caller(&h), Some("user@example.com"));
    }

    #[test]
    fn error_status_mapping() {
        let unauthorized = ApiError::new("x")(GenError::Unauthorized).into_response();
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
        let parse = ApiError::new("x")(GenError::Parse { reason: "eof".into(), text: "{".into() }).into_response();
        assert_eq!(parse.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let transport = ApiError::new("x")(GenError::transport(Some(500), "boom")).into_response();
        assert_eq!(transport.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use crate::error::ApiError;
use crate::model::{
    ActivatedLink, Activation, IssuedLink, LinkSpecification, LinkStatus, Verification,
};
use crate::registry::Registry;
use crate::utils::{to_link, with_timeout};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use url::Url;

const PIXEL_CACHE_CONTROL_HEADER_VALUE: &str = "no-store, no-cache, must-revalidate, max-age=0";
const DEFAULT_TIMEOUT: u64 = 300;
const VERIFICATION_PATH: &str = "verification";
const STATUS_PATH: &str = "links";

#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub public_url: Url,
    pub pixel: Bytes,
    pub uniform_verification_response: bool,
}

pub async fn create_link(
    State(state): State<AppState>,
    link_specification: Result<Json<LinkSpecification>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedLink>), ApiError> {
    let Json(link_specification) =
        link_specification.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let email = link_specification
        .email
        .ok_or_else(|| ApiError::BadRequest("No email provided in request".into()))?;
    let id = with_timeout(DEFAULT_TIMEOUT, state.registry.create(&email)).await??;
    Ok((
        StatusCode::CREATED,
        Json(IssuedLink {
            verification_url: to_link(&state.public_url, VERIFICATION_PATH, &id)?,
            status_url: to_link(&state.public_url, STATUS_PATH, &id)?,
            email,
            id,
        }),
    ))
}

pub async fn get_link_status(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> Result<Json<LinkStatus>, ApiError> {
    let link = with_timeout(DEFAULT_TIMEOUT, state.registry.snapshot(&link_id))
        .await??
        .ok_or(ApiError::InvalidLink)?;
    Ok(Json(LinkStatus {
        state: link.state(),
        verification_url: to_link(&state.public_url, VERIFICATION_PATH, &link.id)?,
        link,
    }))
}

pub async fn activate_link(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> Result<Json<ActivatedLink>, ApiError> {
    match with_timeout(DEFAULT_TIMEOUT, state.registry.activate(&link_id)).await?? {
        Activation::Armed => Ok(Json(ActivatedLink {
            id: link_id,
            is_active: true,
        })),
        Activation::AlreadyRead => Err(ApiError::AlreadyRead),
        Activation::NotFound => Err(ApiError::InvalidLink),
    }
}

pub async fn delete_link(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_timeout(DEFAULT_TIMEOUT, state.registry.delete(&link_id)).await??;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn verify(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> Result<Response, ApiError> {
    let verification = with_timeout(DEFAULT_TIMEOUT, state.registry.verify(&link_id)).await??;
    if verification == Verification::Unknown && !state.uniform_verification_response {
        tracing::debug!(link_id = %link_id, "Verification fetch for unknown link");
        return Err(ApiError::InvalidLink);
    }
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, PIXEL_CACHE_CONTROL_HEADER_VALUE),
            (header::PRAGMA, "no-cache"),
        ],
        state.pixel.clone(),
    )
        .into_response())
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/links", post(create_link))
        .route("/links/:id", get(get_link_status).delete(delete_link))
        .route("/links/:id/activate", post(activate_link))
        .route("/verification/:id", get(verify))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

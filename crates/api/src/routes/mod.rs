use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Extension, Multipart, Path, Query, State};
use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use civicdesk_domain::{
    access::{ComplaintAction, authorize},
    complaint::{Complaint, ComplaintCreate, ComplaintFields, MAX_PHOTOS, PhotoUpload},
    error::DomainError,
    idempotency::BeginOutcome,
    lifecycle::StatusUpdate,
    ports::idempotency::SubmissionKey,
    query::{AuthorityListQuery, AuthorityListing},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::middleware::AuthContext;
use crate::{
    error::ApiError, middleware as app_middleware, observability, state::AppState, validation,
};

const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
const MAX_CREATE_BODY_BYTES: usize = MAX_PHOTOS * MAX_PHOTO_BYTES + 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/complaints",
            post(create_complaint)
                .layer(DefaultBodyLimit::max(MAX_CREATE_BODY_BYTES))
                .get(list_authority_complaints),
        )
        .route("/complaints/my", get(list_my_complaints))
        .route("/complaints/all", get(list_all_complaints))
        .route("/complaints/:complaint_id", get(get_complaint))
        .route("/complaints/:complaint_id/upvote", post(upvote_complaint))
        .route(
            "/complaints/:complaint_id/status",
            put(update_complaint_status),
        )
        .route("/complaints/:complaint_id/reopen", put(reopen_complaint))
        .route_layer(middleware::from_fn(app_middleware::require_auth_middleware));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(protected)
        .layer(middleware::from_fn(app_middleware::metrics_layer))
        .layer(app_middleware::timeout_layer())
        .layer(app_middleware::trace_layer())
        .layer(app_middleware::set_request_id_layer())
        .layer(app_middleware::propagate_request_id_layer())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_middleware,
        ))
        .layer(middleware::from_fn(
            app_middleware::correlation_id_middleware,
        ));

    if !state.config.app_env.eq_ignore_ascii_case("test") {
        app = app.layer(app_middleware::rate_limit_layer());
    }

    app.with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.clone(),
    })
}

async fn metrics() -> Result<Response, ApiError> {
    let body = observability::render_metrics().ok_or(ApiError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}

async fn create_complaint(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(auth): Extension<AuthContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let actor = auth.actor()?;
    authorize(&actor, ComplaintAction::File, None).map_err(map_domain_error)?;
    let input = read_complaint_form(multipart?).await?;
    let request_id = request_id_from_headers(&headers)?;
    let key = SubmissionKey::new(actor.user_id.clone(), request_id);

    match state.submissions.begin(&key).await.map_err(map_domain_error)? {
        BeginOutcome::Replay(complaint) => {
            observability::register_submission_replay();
            Ok((StatusCode::CREATED, Json(complaint)).into_response())
        }
        BeginOutcome::InProgress => Err(ApiError::Conflict),
        BeginOutcome::Started => {
            let complaint = match state.complaints.create(&actor, input).await {
                Ok(complaint) => complaint,
                Err(err) => {
                    state.submissions.release(&key).await;
                    return Err(map_domain_error(err));
                }
            };

            if let Err(err) = state.submissions.complete(&key, &complaint).await {
                tracing::warn!(
                    complaint_id = %complaint.complaint_id,
                    error = %err,
                    "filed complaint will not be replayed"
                );
            }
            Ok((StatusCode::CREATED, Json(complaint)).into_response())
        }
    }
}

/// Collects the text fields and photo parts of a complaint submission.
async fn read_complaint_form(mut multipart: Multipart) -> Result<ComplaintCreate, ApiError> {
    let mut fields = ComplaintFields {
        title: String::new(),
        description: String::new(),
        location_text: String::new(),
        department: String::new(),
    };
    let mut photos = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => fields.title = field.text().await.map_err(invalid_multipart)?,
            "description" => fields.description = field.text().await.map_err(invalid_multipart)?,
            "location_text" | "locationText" => {
                fields.location_text = field.text().await.map_err(invalid_multipart)?;
            }
            "department" => fields.department = field.text().await.map_err(invalid_multipart)?,
            "photos" | "photos[]" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|file_name| !file_name.is_empty());
                let bytes = field.bytes().await.map_err(invalid_multipart)?;
                // Browsers send an empty, unnamed part when no file was picked.
                if bytes.is_empty() && file_name.is_none() {
                    continue;
                }
                if photos.len() == MAX_PHOTOS {
                    return Err(ApiError::Validation(format!(
                        "at most {MAX_PHOTOS} photos may be attached"
                    )));
                }
                if bytes.len() > MAX_PHOTO_BYTES {
                    return Err(ApiError::Validation(format!(
                        "photo exceeds {} MiB",
                        MAX_PHOTO_BYTES / (1024 * 1024)
                    )));
                }
                photos.push(PhotoUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    Ok(ComplaintCreate { fields, photos })
}

fn invalid_multipart(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::Validation(format!("invalid multipart body: {err}"))
}

async fn list_my_complaints(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Complaint>>, ApiError> {
    let actor = auth.actor()?;
    let complaints = state
        .complaints
        .list_for_citizen(&actor)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(complaints))
}

#[derive(Debug, Deserialize, Validate)]
struct BrowseQuery {
    #[validate(length(max = 100))]
    department: Option<String>,
}

async fn list_all_complaints(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<BrowseQuery>, QueryRejection>,
) -> Result<Json<Vec<Complaint>>, ApiError> {
    let Query(query) = query?;
    validation::validate(&query)?;
    let actor = auth.actor()?;
    let complaints = state
        .complaints
        .list_public(&actor, query.department.as_deref())
        .await
        .map_err(map_domain_error)?;
    Ok(Json(complaints))
}

#[derive(Debug, Deserialize, Validate)]
struct AuthorityListParams {
    #[validate(length(max = 32))]
    status: Option<String>,
    #[validate(length(max = 200))]
    area: Option<String>,
    #[validate(length(max = 16))]
    sort: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

async fn list_authority_complaints(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    params: Result<Query<AuthorityListParams>, QueryRejection>,
) -> Result<Json<AuthorityListing>, ApiError> {
    let Query(params) = params?;
    validation::validate(&params)?;
    let actor = auth.actor()?;
    let request = AuthorityListQuery {
        status: params.status,
        area: params.area,
        sort: params.sort,
        page: params.page,
        limit: params.limit,
    };
    let listing = state
        .complaints
        .list_for_authority(&actor, &request)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(listing))
}

async fn get_complaint(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(complaint_id): Path<String>,
) -> Result<Json<Complaint>, ApiError> {
    let actor = auth.actor()?;
    let complaint = state
        .complaints
        .get(&actor, &complaint_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(complaint))
}

async fn upvote_complaint(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(complaint_id): Path<String>,
) -> Result<Json<Complaint>, ApiError> {
    let actor = auth.actor()?;
    let complaint = state
        .complaints
        .upvote(&actor, &complaint_id)
        .await
        .map_err(|err| match err {
            // Voting on your own complaint is a bad request, not an access failure.
            DomainError::Forbidden(message) => ApiError::InvalidState(message),
            other => map_domain_error(other),
        })?;
    Ok(Json(complaint))
}

#[derive(Debug, Deserialize, Validate)]
struct StatusUpdateRequest {
    #[validate(length(max = 32))]
    status: Option<String>,
    #[validate(length(max = 2000))]
    comment: Option<String>,
}

async fn update_complaint_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(complaint_id): Path<String>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<Complaint>, ApiError> {
    let Json(payload) = payload?;
    validation::validate(&payload)?;
    let actor = auth.actor()?;
    let update = StatusUpdate {
        status: payload.status,
        comment: payload.comment,
    };
    let complaint = state
        .complaints
        .update_status(&actor, &complaint_id, update)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(complaint))
}

#[derive(Serialize)]
struct ReopenResponse {
    message: &'static str,
    complaint: Complaint,
}

async fn reopen_complaint(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(complaint_id): Path<String>,
) -> Result<Json<ReopenResponse>, ApiError> {
    let actor = auth.actor()?;
    let complaint = state
        .complaints
        .reopen(&actor, &complaint_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(ReopenResponse {
        message: "Complaint reopened successfully",
        complaint,
    }))
}

fn request_id_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(std::string::ToString::to_string)
        .ok_or_else(|| ApiError::Validation("missing request id".into()))
}

fn map_domain_error(err: DomainError) -> ApiError {
    match err {
        DomainError::Validation(message) => ApiError::Validation(message),
        DomainError::InvalidState(message) => ApiError::InvalidState(message),
        DomainError::AlreadyVoted => ApiError::AlreadyVoted,
        DomainError::NotFound => ApiError::NotFound,
        DomainError::Forbidden(message) => ApiError::Forbidden(message),
        DomainError::Conflict => ApiError::Conflict,
        DomainError::Store(message) => ApiError::Store(message),
    }
}

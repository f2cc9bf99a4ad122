use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use geobuild_core::{Claims, ServiceError};

use crate::api::AppState;
use crate::model::{ChecklistRequest, ChecklistView, LockRequest, ReportLock};
use crate::photos::{StoredPhoto, MAX_PHOTO_BYTES};

/// Room for multipart boundaries and the small text fields.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_checklists).post(create_checklist))
        .route(
            "/photos",
            post(upload_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + MULTIPART_OVERHEAD)),
        )
        .route("/photos/{file_name}", get(get_photo))
        .route("/{id}", get(get_checklist).put(update_checklist))
        .route("/{id}/lock", post(lock_checklist))
        .route("/{id}/unlock", post(unlock_checklist))
}

async fn list_checklists(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChecklistView>>, ServiceError> {
    Ok(Json(state.engine.list_all()?))
}

async fn get_checklist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChecklistView>, ServiceError> {
    Ok(Json(state.engine.get(&id)?))
}

async fn create_checklist(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<ChecklistRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ServiceError> {
    let Json(req) = body?;
    let checklist = state.engine.create(&claims, req)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"message": "Checklist created successfully", "checklist": checklist})),
    ))
}

async fn update_checklist(
    State(state): State<AppState>,
    Path(id): Path<String>,
    claims: Claims,
    body: Result<Json<ChecklistRequest>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let Json(req) = body?;
    let checklist = state.engine.update(&id, &claims, req)?;
    Ok(Json(
        json!({"message": "Checklist updated successfully", "checklist": checklist}),
    ))
}

/// POST /rmChecklist/{id}/lock: body is optional.
async fn lock_checklist(
    State(state): State<AppState>,
    Path(id): Path<String>,
    claims: Claims,
    body: Bytes,
) -> Result<Json<ReportLock>, ServiceError> {
    let req: LockRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LockRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ServiceError::Validation(e.to_string()))?
    };
    Ok(Json(state.engine.lock(&id, &claims, req)?))
}

async fn unlock_checklist(
    State(state): State<AppState>,
    Path(id): Path<String>,
    claims: Claims,
) -> Result<Json<Value>, ServiceError> {
    state.engine.unlock(&id, &claims)?;
    Ok(Json(json!({"message": "Report unlocked"})))
}

// ---------------------------------------------------------------------------
// Photos
// ---------------------------------------------------------------------------

async fn upload_photo(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<StoredPhoto>, ServiceError> {
    let mut multipart = multipart.map_err(|e| ServiceError::Validation(e.body_text()))?;

    let mut file_name: Option<String> = None;
    let mut data = Bytes::new();
    let mut section: Option<String> = None;
    let mut slot: Option<i64> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                data = field.bytes().await?;
            }
            "section" => section = Some(field.text().await?),
            "slot" => slot = field.text().await?.trim().parse().ok(),
            _ => {}
        }
    }

    let stored = state
        .photos
        .upload(file_name.as_deref(), &data, section.as_deref(), slot)?;
    Ok(Json(stored))
}

async fn get_photo(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let (data, content_type) = state.photos.open(&file_name)?;
    Ok(([(header::CONTENT_TYPE, content_type)], data))
}

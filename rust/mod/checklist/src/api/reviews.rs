use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use geobuild_core::{Claims, Page, PageParams, ServiceError};

use crate::api::AppState;
use crate::model::{
    AddCommentRequest, ApproveRequest, ChecklistView, Comment, DashboardStats, RejectRequest,
    RevisionRequest,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/stats", get(dashboard_stats))
        .route("/reviews/pending", get(pending_reviews))
        .route("/reviews/in-progress", get(in_progress_reviews))
        .route("/reviews/completed", get(completed_reviews))
        .route("/reviews/my-active", get(my_active_reviews))
        .route("/reviews/{id}", get(get_report))
        .route("/reviews/{id}/comments", get(list_comments).post(add_comment))
        .route("/reviews/{id}/assign", post(assign))
        .route("/reviews/{id}/revision", post(request_revision))
        .route("/reviews/{id}/approve", post(approve))
        .route("/reviews/{id}/reject", post(reject))
        .route("/site-visits/upcoming", get(upcoming_site_visits))
}

// ---------------------------------------------------------------------------
// Dashboard and queues
// ---------------------------------------------------------------------------

async fn dashboard_stats(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<DashboardStats>, ServiceError> {
    Ok(Json(state.engine.dashboard(&claims)?))
}

async fn pending_reviews(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<ChecklistView>>, ServiceError> {
    Ok(Json(state.engine.pending(&page)?))
}

async fn in_progress_reviews(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<ChecklistView>>, ServiceError> {
    Ok(Json(state.engine.in_progress(&page)?))
}

async fn completed_reviews(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<ChecklistView>>, ServiceError> {
    Ok(Json(state.engine.completed(&page)?))
}

async fn my_active_reviews(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<ChecklistView>>, ServiceError> {
    Ok(Json(state.engine.my_active(&claims)?))
}

async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChecklistView>, ServiceError> {
    Ok(Json(state.engine.get_report(&id)?))
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>, ServiceError> {
    Ok(Json(state.engine.comments(&id)?))
}

async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    claims: Claims,
    body: Result<Json<AddCommentRequest>, JsonRejection>,
) -> Result<Json<Comment>, ServiceError> {
    let Json(req) = body?;
    Ok(Json(state.engine.add_comment(&id, &claims, req)?))
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

async fn assign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    claims: Claims,
) -> Result<Json<Value>, ServiceError> {
    state.engine.assign(&id, &claims)?;
    Ok(Json(json!({"message": "Report assigned successfully"})))
}

async fn request_revision(
    State(state): State<AppState>,
    Path(id): Path<String>,
    claims: Claims,
    body: Result<Json<RevisionRequest>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let Json(req) = body?;
    state.engine.request_revision(&id, &claims, req)?;
    Ok(Json(json!({"message": "Revision requested successfully"})))
}

/// The body is optional; an empty one approves without notes.
async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    claims: Claims,
    body: Bytes,
) -> Result<Json<Value>, ServiceError> {
    let req: ApproveRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ApproveRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ServiceError::Validation(e.to_string()))?
    };
    state.engine.approve(&id, &claims, req)?;
    Ok(Json(json!({"message": "Report approved successfully"})))
}

async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    claims: Claims,
    body: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let Json(req) = body?;
    state.engine.reject(&id, &claims, req)?;
    Ok(Json(json!({"message": "Report rejected successfully"})))
}

/// Site visits are not scheduled through this service yet.
async fn upcoming_site_visits() -> Json<Vec<Value>> {
    Json(Vec::new())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use geobuild_core::Role;
    use serde_json::json;

    use crate::api::test_util::{app, call, get_req, json_req};
    use crate::engine::tests::{claims, RecordingNotifier};

    fn qs() -> geobuild_core::Claims {
        claims("qs-1", "Quinn Surveyor", Role::Qs)
    }

    fn new_checklist() -> serde_json::Value {
        json!({
            "customerNumber": "0001",
            "customerName": "Jane Doe",
            "projectName": "Villa",
            "ibpsNo": "IB-1",
            "assignedToRM": "rm-1",
            "status": "pending_qs_review"
        })
    }

    async fn submitted(router: &axum::Router) -> String {
        let (_, created) = call(router.clone(), json_req("POST", "/rmChecklist", new_checklist())).await;
        let id = created["checklist"]["id"].as_str().unwrap().to_string();
        let (status, _) = call(
            router.clone(),
            json_req("PUT", &format!("/rmChecklist/{id}"), new_checklist()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        id
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::post(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn review_flow_over_http() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (router, _dir) = app(notifier.clone(), qs());
        let id = submitted(&router).await;

        let (status, page) = call(router.clone(), get_req("/qs/reviews/pending?page=1&pageSize=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["pageSize"], 5);
        assert_eq!(page["items"][0]["id"], id.as_str());

        let (status, body) = call(router.clone(), post_empty(&format!("/qs/reviews/{id}/assign"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Report assigned successfully");

        let (_, mine) = call(router.clone(), get_req("/qs/reviews/my-active")).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);

        let (status, comment) = call(
            router.clone(),
            json_req(
                "POST",
                &format!("/qs/reviews/{id}/comments"),
                json!({"comment": "Checking BQ", "isInternal": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(comment["isInternal"], true);
        assert_eq!(comment["userRole"], "QS");

        let (status, body) = call(router.clone(), post_empty(&format!("/qs/reviews/{id}/approve"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Report approved successfully");

        let (_, report) = call(router.clone(), get_req(&format!("/qs/reviews/{id}"))).await;
        assert_eq!(report["status"], "approved");
        assert_eq!(report["reviewedBy"], "qs-1");

        let (_, comments) = call(router.clone(), get_req(&format!("/qs/reviews/{id}/comments"))).await;
        assert_eq!(comments.as_array().unwrap().len(), 1);

        let (status, body) = call(
            router.clone(),
            json_req("POST", &format!("/qs/reviews/{id}/reject"), json!({"reason": "late"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Report is already finalised");

        let (_, stats) = call(router.clone(), get_req("/qs/dashboard/stats")).await;
        assert_eq!(stats["completedToday"], 1);
        assert_eq!(stats["scheduledVisits"], 0);
        assert_eq!(stats["averageResponseTime"], "0h");

        let (_, completed) = call(router, get_req("/qs/reviews/completed")).await;
        assert_eq!(completed["total"], 1);
    }

    #[tokio::test]
    async fn reject_and_revision_write_comments() {
        let (router, _dir) = app(Arc::new(RecordingNotifier::default()), qs());
        let rejected = submitted(&router).await;
        let revised = submitted(&router).await;

        let (status, _) = call(
            router.clone(),
            json_req("POST", &format!("/qs/reviews/{rejected}/reject"), json!({"reason": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            router.clone(),
            json_req("POST", &format!("/qs/reviews/{rejected}/reject"), json!({"reason": "No photos"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Report rejected successfully");

        let (status, body) = call(
            router.clone(),
            json_req(
                "POST",
                &format!("/qs/reviews/{revised}/revision"),
                json!({"notes": "Update", "requiredChanges": ["BQ", "Photos"]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Revision requested successfully");

        let (_, comments) = call(router.clone(), get_req(&format!("/qs/reviews/{rejected}/comments"))).await;
        assert_eq!(comments[0]["text"], "Rejected: No photos");
        let (_, comments) = call(router, get_req(&format!("/qs/reviews/{revised}/comments"))).await;
        assert_eq!(
            comments[0]["text"],
            "Revision requested: Update\nRequired changes: BQ, Photos"
        );
    }

    #[tokio::test]
    async fn unknown_report_and_site_visits() {
        let (router, _dir) = app(Arc::new(RecordingNotifier::default()), qs());
        let (status, body) = call(router.clone(), post_empty("/qs/reviews/nope/assign")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Report with ID nope not found");

        let (status, _) = call(router.clone(), get_req("/qs/reviews/nope/comments")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(router, get_req("/qs/site-visits/upcoming")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn missing_identity_is_401() {
        let (router, _dir) = app(Arc::new(RecordingNotifier::default()), qs());
        let id = submitted(&router).await;
        let (anonymous, _dir2) = app(Arc::new(RecordingNotifier::default()), claims("", "", Role::Qs));
        // Separate engine, so the id is unknown there; identity is checked first.
        let (status, body) = call(anonymous, post_empty(&format!("/qs/reviews/{id}/assign"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "User not authenticated");
    }
}

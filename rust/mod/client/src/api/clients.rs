use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use geobuild_core::{Page, PageParams, ServiceError};

use crate::model::{Client, ClientFilter, ClientSearchQuery, CreateClientRequest, UpdateClientRequest};
use crate::store::ClientStore;

type StoreState = Arc<ClientStore>;

pub fn router(store: Arc<ClientStore>) -> Router {
    Router::new()
        .route("/clients", get(list_clients).post(create_client))
        .route("/clients/search", get(search_clients))
        .route("/clients/customer/{customer_number}", get(get_by_customer_number))
        .route(
            "/clients/{id}",
            get(get_client).put(update_client).delete(delete_client),
        )
        .with_state(store)
}

// ---------------------------------------------------------------------------
// GET /clients
// ---------------------------------------------------------------------------

async fn list_clients(
    State(store): State<StoreState>,
    Query(filter): Query<ClientFilter>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<Client>>, ServiceError> {
    Ok(Json(store.list(filter.search.as_deref(), &page)?))
}

// ---------------------------------------------------------------------------
// GET /clients/search
// ---------------------------------------------------------------------------

async fn search_clients(
    State(store): State<StoreState>,
    Query(query): Query<ClientSearchQuery>,
) -> Result<Json<Vec<Client>>, ServiceError> {
    Ok(Json(store.search(&query.q)?))
}

// ---------------------------------------------------------------------------
// GET /clients/customer/{customer_number}
// ---------------------------------------------------------------------------

async fn get_by_customer_number(
    State(store): State<StoreState>,
    Path(customer_number): Path<String>,
) -> Result<Json<Client>, ServiceError> {
    Ok(Json(store.get_by_customer_number(&customer_number)?))
}

// ---------------------------------------------------------------------------
// GET /clients/{id}
// ---------------------------------------------------------------------------

async fn get_client(
    State(store): State<StoreState>,
    Path(id): Path<String>,
) -> Result<Json<Client>, ServiceError> {
    Ok(Json(store.get(&id)?))
}

// ---------------------------------------------------------------------------
// POST /clients
// ---------------------------------------------------------------------------

async fn create_client(
    State(store): State<StoreState>,
    Json(req): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), ServiceError> {
    let client = store.create(req)?;
    Ok((StatusCode::CREATED, Json(client)))
}

// ---------------------------------------------------------------------------
// PUT /clients/{id}
// ---------------------------------------------------------------------------

async fn update_client(
    State(store): State<StoreState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateClientRequest>,
) -> Result<StatusCode, ServiceError> {
    store.update(&id, req)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// DELETE /clients/{id}
// ---------------------------------------------------------------------------

async fn delete_client(
    State(store): State<StoreState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    store.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::store::test_store;

    async fn call(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn crud_over_http() {
        let app = router(Arc::new(test_store()));

        let (status, created) = call(
            app.clone(),
            json_req(
                "POST",
                "/clients",
                json!({"customerId": "C-1", "customerNumber": "0001", "name": "Acme",
                       "email": "acme@example.com", "projectName": "Villa"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["customerNumber"], "0001");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, body) = call(app.clone(), get_req("/clients?search=acm&page=1&pageSize=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["pageSize"], 5);
        assert_eq!(body["totalPages"], 1);

        let (status, body) = call(app.clone(), get_req("/clients/customer/0001")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.as_str());

        let (status, body) = call(app.clone(), get_req("/clients/search?q=villa")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = call(app.clone(), get_req("/clients/search")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = call(
            app.clone(),
            json_req("PUT", &format!("/clients/{id}"), json!({"name": "Acme Ltd"})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = call(app.clone(), get_req(&format!("/clients/{id}"))).await;
        assert_eq!(body["name"], "Acme Ltd");

        let (status, _) = call(
            app.clone(),
            Request::delete(format!("/clients/{id}")).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(app, get_req(&format!("/clients/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn duplicate_and_missing_responses() {
        let app = router(Arc::new(test_store()));
        let body = json!({"customerId": "C-1", "customerNumber": "0001", "name": "Acme",
                          "email": "acme@example.com"});
        let (status, _) = call(app.clone(), json_req("POST", "/clients", body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, resp) = call(app.clone(), json_req("POST", "/clients", body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(resp["message"], "Customer ID already exists.");

        let (status, _) = call(
            app.clone(),
            json_req("POST", "/clients", json!({"customerId": "C-9"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, resp) = call(app, get_req("/clients/customer/404")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(resp["message"], "Client with customer number 404 not found");
    }
}

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::debug;

use geobuild_core::{Claims, ServiceError};

use crate::hub::Hub;

/// Turns a bearer token into claims. The server wires in the auth service.
pub type VerifyFn = Arc<dyn Fn(&str) -> Result<Claims, ServiceError> + Send + Sync>;

#[derive(Clone)]
pub struct HubState {
    pub hub: Arc<Hub>,
    pub verify: VerifyFn,
}

#[derive(Debug, Default, Deserialize)]
pub struct HubQuery {
    access_token: Option<String>,
}

pub fn build_router(state: HubState) -> Router {
    Router::new()
        .route("/hub/notificationHub", get(notification_hub))
        .with_state(state)
}

/// GET /hub/notificationHub: WebSocket upgrade. Browsers cannot set
/// headers on a WebSocket, so the token may also come as `?access_token=`.
async fn notification_hub(
    State(state): State<HubState>,
    Query(query): Query<HubQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ServiceError> {
    let token = bearer(&headers)
        .or(query.access_token.as_deref())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("Missing access token".into()))?;
    let claims = (state.verify)(token)?;
    let ws = ws.map_err(|e| ServiceError::Validation(e.body_text()))?;

    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| serve_connection(hub, socket, claims)))
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn serve_connection(hub: Arc<Hub>, socket: WebSocket, claims: Claims) {
    let (id, mut events) = hub.connect(Some(&claims));
    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => hub.handle_frame(id, text.as_str()),
            Message::Close(_) => break,
            _ => {}
        }
    }

    debug!(user = %claims.sub, "hub socket closed");
    hub.disconnect(id);
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use geobuild_core::Role;
    use tower::ServiceExt;

    fn state() -> HubState {
        HubState {
            hub: Arc::new(Hub::new()),
            verify: Arc::new(|token: &str| {
                if token == "good" {
                    Ok(Claims {
                        sub: "u1".into(),
                        email: "u1@example.com".into(),
                        role: Role::Rm,
                        given_name: "U".into(),
                        family_name: "One".into(),
                        name: "U One".into(),
                        iss: "geoback".into(),
                        aud: "GeoBuildClient".into(),
                        iat: 0,
                        exp: 0,
                    })
                } else {
                    Err(ServiceError::Unauthorized("Invalid or expired token".into()))
                }
            }),
        }
    }

    #[tokio::test]
    async fn upgrade_without_token_is_401() {
        let resp = build_router(state())
            .oneshot(Request::get("/hub/notificationHub").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bad_query_token_is_401() {
        let resp = build_router(state())
            .oneshot(
                Request::get("/hub/notificationHub?access_token=bad")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn good_token_without_upgrade_is_400() {
        let resp = build_router(state())
            .oneshot(
                Request::get("/hub/notificationHub")
                    .header("authorization", "Bearer good")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer(&headers), Some("abc"));
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer(&headers), None);
    }
}

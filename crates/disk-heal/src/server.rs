//! HTTP trigger for disk alerts.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::alert::AlertPayload;
use crate::error::RemediationError;
use crate::workflow::Remediator;

/// Server state.
pub struct ServerState {
    pub remediator: Remediator,
    /// Bearer token callers must present.
    pub token: String,
}

/// Response body of the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl TriggerResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status_code: 200,
            body: "OK".to_string(),
        }
    }
}

/// Build the router.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let trigger = Router::new()
        .route("/api/alerts/disk", post(disk_alert_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(health_handler))
        .merge(trigger)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Whether an `Authorization` header value grants access.
#[must_use]
pub fn is_authorized(header: Option<&str>, token: &str) -> bool {
    !token.is_empty() && header == Some(format!("Bearer {token}").as_str())
}

async fn require_bearer(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if !is_authorized(header, &state.token) {
        warn!(path = %request.uri().path(), "Rejected trigger without a valid bearer token");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    next.run(request).await
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Disk alert webhook.
///
/// Always answers 200 once the alerts have been handled. Outcomes are
/// reported through chat and escalation, never through the response.
async fn disk_alert_handler(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Json<TriggerResponse> {
    Json(handle_body(&state.remediator, &body).await)
}

/// Decode a trigger body and handle its alerts.
pub async fn handle_body(remediator: &Remediator, body: &[u8]) -> TriggerResponse {
    match serde_json::from_slice::<AlertPayload>(body) {
        Ok(payload) => {
            info!(alerts = payload.alerts.len(), "Received disk alert webhook");
            let reports = remediator.handle_payload(&payload).await;
            for report in &reports {
                info!(
                    outcome = ?report.outcome,
                    state = %report.final_state(),
                    escalated = report.escalated,
                    "Alert handled"
                );
            }
        }
        Err(e) => {
            let error = RemediationError::MalformedAlert(e.to_string());
            warn!(error = %error, "Ignoring undecodable webhook body");
        }
    }
    TriggerResponse::ok()
}

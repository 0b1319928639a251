//! Pairing code endpoint.
//!
//! GET /?number=<digits>
//!
//! Starts a pairing session in the background and answers as soon as the
//! session produces a pairing code (or fails before it could). The session
//! keeps running after the response to deliver credentials and clean up.

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::domains::pairing::{
    PairingCode, PairingController, PairingError, PhoneNumber, Responder, SessionId,
};
use crate::server::app::AppState;

#[derive(Deserialize)]
pub struct PairQuery {
    /// Phone number in any format; everything but digits is dropped
    number: Option<String>,
}

#[derive(Serialize)]
pub struct PairingCodeResponse {
    code: PairingCode,
}

pub async fn pair_handler(
    Extension(state): Extension<AppState>,
    query: Result<Query<PairQuery>, QueryRejection>,
) -> Result<Json<PairingCodeResponse>, PairingError> {
    // An unreadable query string is answered like a missing number
    let Query(query) = query.map_err(|rejection| {
        debug!(error = %rejection, "rejected pairing query");
        PairingError::Validation
    })?;
    let phone = PhoneNumber::parse(query.number.as_deref().unwrap_or_default())?;

    let deps = &state.deps;
    let session_id = SessionId::new();
    let workspace = deps.workspaces.acquire(&session_id).map_err(|e| {
        error!(session_id = %session_id, error = %e, "failed to allocate session workspace");
        e
    })?;

    let (responder, reply) = Responder::channel();
    PairingController::new(
        phone,
        workspace,
        responder,
        deps.messaging.clone(),
        deps.settings.clone(),
    )
    .spawn(deps.active_sessions.clone());

    match reply.await {
        Ok(Ok(code)) => Ok(Json(PairingCodeResponse { code })),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!(session_id = %session_id, "session dropped without answering");
            Err(PairingError::Unavailable(
                "session ended without a response".to_string(),
            ))
        }
    }
}

impl IntoResponse for PairingError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

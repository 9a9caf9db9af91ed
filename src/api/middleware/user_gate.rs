//! User gating middleware.
//!
//! Sits outside rate limiting, so users turned away here never take a token.

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::api::middleware::error::ApiError;
use crate::api::user::UserInfo;
use crate::gate::UserGate;

/// Wrap `handler` so every request is checked against `gate`.
pub fn with_user_gate(handler: Router, gate: Arc<dyn UserGate>) -> Router {
    handler.layer(middleware::from_fn_with_state(gate, user_gate))
}

/// Admit the request if the gate's current rule set allows its user.
///
/// With no rule set loaded every authenticated user is admitted.
pub async fn user_gate(
    State(gate): State<Arc<dyn UserGate>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(user) = UserInfo::from_request(&request) else {
        error!(proxy = "usergate", "can't detect user from request");
        return ApiError::MissingUser.into_response();
    };

    if let Some(rules) = gate.rule_set() {
        if !rules.admits(&user.name) {
            debug!(user = %user.name, "user not admitted by gating rules");
            return ApiError::Unauthorized.into_response();
        }
    }

    next.run(request).await
}

use axum::{Json, extract::State};
use chrono::Utc;
use marquee_core::policy::PolicyOrigin;
use serde_json::{Value, json};

use crate::infra::app_state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let policy = state.hero.policies().current().await;
    let provider = state.hero.provider();
    let rate_limit = provider.rate_limit_state();

    let (origin, reason) = match &policy.origin {
        PolicyOrigin::Loaded => ("loaded", None),
        PolicyOrigin::Builtin => ("builtin", None),
        PolicyOrigin::Fallback { reason } => ("fallback", Some(reason.clone())),
    };

    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "policy": {
                "version": policy.policy.version,
                "fingerprint": policy.fingerprint,
                "origin": origin,
                "reason": reason,
            },
            "provider": {
                "enabled": provider.is_enabled(),
                "rateLimited": rate_limit.is_active_at(Utc::now()),
                "strikes": rate_limit.strikes,
            },
        }
    }))
}

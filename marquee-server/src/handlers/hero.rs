use axum::{
    Json,
    extract::{Path, Query, State},
};
use marquee_core::PoolRequest;
use marquee_model::{HeroPoolPayload, MediaKind};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

#[derive(Debug, Default, Deserialize)]
pub struct HeroPoolQuery {
    #[serde(default)]
    pub force: bool,
}

/// `GET /api/v1/hero/{kind}`
///
/// The build runs on its own task; if the client goes away the build is
/// cancelled, finishes with local data and is not cached.
pub async fn get_hero_pool(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<HeroPoolQuery>,
) -> AppResult<Json<HeroPoolPayload>> {
    let kind: MediaKind = kind.parse().map_err(|_| {
        AppError::bad_request(format!("Unknown media kind '{kind}'"))
    })?;

    let cancel = CancellationToken::new();
    let _cancel_on_disconnect = cancel.clone().drop_guard();
    let request = PoolRequest {
        force: query.force,
        cancel: Some(cancel),
    };

    let hero = state.hero.clone();
    let payload =
        tokio::spawn(async move { hero.get_pool(kind, request).await })
            .await
            .map_err(|err| {
                AppError::internal(format!("hero pool task failed: {err}"))
            })??;

    Ok(Json(payload))
}

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use entity::daily_digest;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppJsonResult},
    util, ServerState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDigestParams {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDigestResponse {
    pub digest: Option<daily_digest::Model>,
}

/// Runs the digest pipeline for the given date (default: today in the
/// configured timezone). Returns the existing digest unchanged when one was
/// already persisted for that date.
pub async fn run(
    State(state): State<ServerState>,
    params: Option<Json<RunDigestParams>>,
) -> AppJsonResult<RunDigestResponse> {
    let date = params
        .and_then(|Json(params)| params.date)
        .unwrap_or_else(util::local_today);

    let digest = state.orchestrator.run_for_date(date).await?;

    Ok(Json(RunDigestResponse { digest }))
}

pub async fn get_by_date(
    State(state): State<ServerState>,
    Path(date): Path<NaiveDate>,
) -> AppJsonResult<daily_digest::Model> {
    let digest = state
        .digests
        .find_by_date(date)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No digest for {}", date)))?;

    Ok(Json(digest))
}

pub async fn distribute(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> AppJsonResult<daily_digest::Model> {
    let digest = state.distributor.distribute(id).await?;

    Ok(Json(digest))
}

//! RPC request handlers.

use crate::error::RpcError;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use carbon_types::{CreditId, RequestMode, VerificationState};
use carbon_verification::{Disposition, VerificationCoordinator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Verify ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub credit_id: String,
    pub requester: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub credit_id: CreditId,
    pub disposition: Disposition,
    pub wave_ticket: Option<u64>,
    pub state: VerificationState,
}

pub async fn verify(
    State(coordinator): State<VerificationCoordinator>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, RpcError> {
    let credit = parse_credit(&body.credit_id)?;
    if body.requester.trim().is_empty() {
        return Err(RpcError::InvalidRequest("requester must not be empty".into()));
    }

    let result = coordinator
        .request_verification(credit.clone(), body.requester, RequestMode::from_force(body.force))
        .await?;

    Ok(Json(VerifyResponse {
        credit_id: credit,
        disposition: result.disposition,
        wave_ticket: result.wave_ticket,
        state: result.state,
    }))
}

// ── Credit status ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreditStatusResponse {
    pub credit_id: CreditId,
    pub state: VerificationState,
}

pub async fn credit_status(
    State(coordinator): State<VerificationCoordinator>,
    Path(id): Path<String>,
) -> Result<Json<CreditStatusResponse>, RpcError> {
    let credit = parse_credit(&id)?;
    let state = coordinator.status(&credit).await;
    Ok(Json(CreditStatusResponse {
        credit_id: credit,
        state,
    }))
}

pub async fn cancel_wave(
    State(coordinator): State<VerificationCoordinator>,
    Path(id): Path<String>,
) -> Result<StatusCode, RpcError> {
    let credit = parse_credit(&id)?;
    if coordinator.cancel(&credit).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RpcError::NoActiveWave(id))
    }
}

// ── Stats ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub tracked_credits: usize,
    pub registries: Vec<String>,
    pub counters: BTreeMap<&'static str, u64>,
}

pub async fn stats(State(coordinator): State<VerificationCoordinator>) -> Json<StatsResponse> {
    Json(StatsResponse {
        tracked_credits: coordinator.tracked().await,
        registries: coordinator
            .registries()
            .sources()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        counters: coordinator.stats(),
    })
}

fn parse_credit(raw: &str) -> Result<CreditId, RpcError> {
    CreditId::new(raw).map_err(|e| RpcError::InvalidRequest(e.to_string()))
}

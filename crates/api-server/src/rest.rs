//! REST API handlers for allocation requests, click billing, wallet
//! operations, and account health endpoints.

use adboard_allocation::AllocationEngine;
use adboard_core::error::AdboardError;
use adboard_core::types::{
    AllocationRequest, AllocationResponse, ClickEvent, Creative, HealthScore, Insight,
    TopupNotification, WalletAccount, WalletTransaction,
};
use adboard_insights::{HealthScorer, InsightGenerator};
use adboard_ledger::WalletLedger;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Maximum string field length (slug, owner id, reference, etc.).
const MAX_FIELD_LEN: usize = 128;

/// Days of history consulted by the health and insight endpoints.
const SCORING_WINDOW_DAYS: u32 = 14;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AllocationEngine>,
    pub ledger: Arc<WalletLedger>,
    pub scorer: Arc<HealthScorer>,
    pub insights: Arc<InsightGenerator>,
    pub creatives: Arc<RwLock<Vec<Creative>>>,
    pub node_id: String,
    pub start_time: Instant,
}

fn validate_topup(notification: &TopupNotification) -> Result<(), &'static str> {
    if notification.owner.is_empty() {
        return Err("'owner' must not be empty");
    }
    if notification.owner.len() > MAX_FIELD_LEN {
        return Err("'owner' exceeds maximum length");
    }
    if notification.amount_cents <= 0 {
        return Err("'amount_cents' must be positive");
    }
    if notification.reference.is_empty() {
        return Err("'reference' must not be empty");
    }
    Ok(())
}

/// POST /v1/allocate — resolve winners for one placement request.
///
/// Internal failures degrade to an organic-fallback response rather than
/// an error; a page render never blocks on the marketplace.
pub async fn handle_allocate(
    State(state): State<AppState>,
    Json(request): Json<AllocationRequest>,
) -> Result<Json<AllocationResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.engine.allocate(&request) {
        Ok(outcome) => Ok(Json(AllocationResponse {
            winners: outcome.winners,
            fallback_used: outcome.fallback_used,
        })),
        Err(AdboardError::Validation(msg)) => {
            warn!(slug = %request.placement_slug, error = %msg, "Allocation request validation failed");
            metrics::counter!("api.validation_errors").increment(1);
            Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "invalid_allocation_request".to_string(),
                    message: msg,
                }),
            ))
        }
        Err(e) => {
            error!(error = %e, slug = %request.placement_slug, "Allocation failed, serving fallback");
            metrics::counter!("api.errors").increment(1);
            Ok(Json(AllocationResponse {
                winners: Vec::new(),
                fallback_used: true,
            }))
        }
    }
}

/// POST /v1/click — bill a click against a cpc campaign.
pub async fn handle_click(
    State(state): State<AppState>,
    Json(event): Json<ClickEvent>,
) -> Result<Json<ClickResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.engine.record_click(&event) {
        Ok(balance_cents) => Ok(Json(ClickResponse {
            campaign_id: event.campaign_id.to_string(),
            balance_cents,
        })),
        Err(e) => {
            warn!(error = %e, campaign_id = %event.campaign_id, "Click rejected");
            metrics::counter!("api.click_rejections").increment(1);
            Err(error_response(&e))
        }
    }
}

/// POST /v1/topup — credit a confirmed deposit from the payment collaborator.
pub async fn handle_topup(
    State(state): State<AppState>,
    Json(notification): Json<TopupNotification>,
) -> Result<Json<BalanceResponse>, (StatusCode, Json<ErrorResponse>)> {
    if let Err(msg) = validate_topup(&notification) {
        warn!(owner = %notification.owner, error = msg, "Top-up validation failed");
        metrics::counter!("api.validation_errors").increment(1);
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "invalid_topup".to_string(),
                message: msg.to_string(),
            }),
        ));
    }

    match state.ledger.credit(
        &notification.owner,
        notification.amount_cents,
        &notification.reference,
    ) {
        Ok(balance_cents) => Ok(Json(BalanceResponse {
            owner: notification.owner,
            balance_cents,
        })),
        Err(e) => {
            error!(error = %e, owner = %notification.owner, "Top-up credit failed");
            Err(error_response(&e))
        }
    }
}

/// GET /v1/wallet/:owner — account snapshot with full transaction history.
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<WalletResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(account) = state.ledger.account(&owner) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "wallet_not_found".to_string(),
                message: format!("no wallet for owner '{owner}'"),
            }),
        ));
    };

    Ok(Json(WalletResponse {
        account,
        transactions: state.ledger.transactions(&owner),
        chain_verified: state.ledger.verify_chain(&owner),
    }))
}

/// GET /v1/health-score/:owner — composite account health.
pub async fn get_health_score(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Json<HealthScore> {
    Json(state.scorer.score(&owner, SCORING_WINDOW_DAYS))
}

/// GET /v1/insights/:owner — prioritized recommendations for one owner.
pub async fn get_insights(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Json<Vec<Insight>> {
    let creatives = state.creatives.read().clone();
    Json(state.insights.generate(&[owner], &creatives, Utc::now()))
}

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe for Kubernetes.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.start_time.elapsed().as_secs() > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — Liveness probe for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

fn error_response(e: &AdboardError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match e {
        AdboardError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
        AdboardError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        AdboardError::InsufficientBalance(_) => {
            (StatusCode::PAYMENT_REQUIRED, "insufficient_balance")
        }
        AdboardError::BudgetExceeded(_) => (StatusCode::CONFLICT, "budget_exhausted"),
        AdboardError::ConcurrencyConflict(_) => (StatusCode::CONFLICT, "concurrency_conflict"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: e.to_string(),
        }),
    )
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ClickResponse {
    pub campaign_id: String,
    pub balance_cents: i64,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub owner: String,
    pub balance_cents: i64,
}

#[derive(Serialize)]
pub struct WalletResponse {
    pub account: WalletAccount,
    pub transactions: Vec<WalletTransaction>,
    pub chain_verified: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

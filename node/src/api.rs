//! # REST API
//!
//! Builds the axum router that exposes one loan escrow over HTTP. The escrow
//! runs against an in-memory [`Ledger`] standing in for the execution
//! environment: balances, custody and block height.
//!
//! This is a devnet surface. The calling identity (`origin`) is taken from
//! the request body as-is; nothing authenticates it. Sponsored operations
//! still require a real receiver signature.
//!
//! ## Endpoints
//!
//! | Method | Path                             | Description                        |
//! |--------|----------------------------------|------------------------------------|
//! | GET    | `/health`                        | Liveness probe                     |
//! | GET    | `/status`                        | Height, loan count, custody        |
//! | POST   | `/blocks`                        | Advance the block height           |
//! | POST   | `/faucet`                        | Mint devnet value to an account    |
//! | GET    | `/accounts/:address`             | Account balance                    |
//! | GET    | `/loans`                         | All loans, optionally by `status`  |
//! | POST   | `/loans`                         | Request a loan                     |
//! | POST   | `/loans/sponsored`               | Request on a receiver's behalf     |
//! | GET    | `/loans/:id`                     | One loan (`Empty` if unknown)      |
//! | POST   | `/loans/:id/approve`             | Fund a loan                        |
//! | POST   | `/loans/:id/take`                | Receiver takes the funds           |
//! | POST   | `/loans/:id/refuse`              | Receiver refuses, funder refunded  |
//! | POST   | `/loans/:id/cancel`              | Withdraw an unfunded request       |
//! | POST   | `/loans/:id/sponsored-take`      | Take on a receiver's behalf        |
//! | POST   | `/loans/:id/sponsored-refuse`    | Refuse on a receiver's behalf      |
//! | GET    | `/events`                        | Event journal                      |

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use lendpact_contracts::{
    CallContext, EscrowError, JournalEntry, LoanEscrow, LoanId, LoanRecord, LoanStatus,
};
use lendpact_protocol::config::MAX_BLOCKS_PER_ADVANCE;
use lendpact_protocol::crypto::EcdsaSignature;
use lendpact_protocol::identity::Address;
use lendpact_protocol::storage::{Ledger, LedgerError};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network identifier.
    pub network: String,
    /// The escrow and, behind its gateway, the devnet ledger.
    pub escrow: Arc<RwLock<LoanEscrow>>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    pub fn new(version: String, escrow: LoanEscrow, metrics: SharedMetrics) -> Self {
        Self {
            version,
            network: "devnet".into(),
            escrow: Arc::new(RwLock::new(escrow)),
            metrics,
        }
    }

    fn rejected(&self, err: EscrowError) -> ApiError {
        self.metrics.record_rejection(err.kind());
        ApiError::Escrow(err)
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/blocks", post(advance_blocks_handler))
        .route("/faucet", post(faucet_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/loans", get(list_loans_handler).post(request_loan_handler))
        .route("/loans/sponsored", post(sponsored_request_handler))
        .route("/loans/:id", get(loan_handler))
        .route("/loans/:id/approve", post(approve_handler))
        .route("/loans/:id/take", post(take_handler))
        .route("/loans/:id/refuse", post(refuse_handler))
        .route("/loans/:id/cancel", post(cancel_handler))
        .route("/loans/:id/sponsored-take", post(sponsored_take_handler))
        .route("/loans/:id/sponsored-refuse", post(sponsored_refuse_handler))
        .route("/events", get(events_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Escrow error kind (`InvalidState`, ...) or `BadRequest`.
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Escrow(EscrowError),
    Ledger(LedgerError),
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        use lendpact_contracts::ErrorKind::*;
        match self {
            ApiError::Escrow(e) => match e.kind() {
                InvalidAmount | InvalidTtl | InvalidSignature => StatusCode::BAD_REQUEST,
                Unauthorized => StatusCode::FORBIDDEN,
                InvalidState => StatusCode::CONFLICT,
                TransferFailed => StatusCode::UNPROCESSABLE_ENTITY,
            },
            ApiError::Ledger(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::Escrow(e) => ErrorResponse {
                error: e.kind().to_string(),
                message: e.to_string(),
            },
            ApiError::Ledger(e) => ErrorResponse {
                error: "LedgerError".into(),
                message: e.to_string(),
            },
            ApiError::BadRequest(msg) => ErrorResponse {
                error: "BadRequest".into(),
                message: msg.clone(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

fn parse_id(raw: &str) -> Result<LoanId, ApiError> {
    raw.parse::<LoanId>()
        .map_err(|e| ApiError::BadRequest(format!("loan id '{raw}': {e}")))
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    raw.parse::<Address>()
        .map_err(|e| ApiError::BadRequest(format!("address '{raw}': {e}")))
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    /// Blocks to mine. Defaults to one.
    #[serde(default = "one_block")]
    pub blocks: u64,
}

fn one_block() -> u64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct FaucetRequest {
    pub address: Address,
    pub amount: u128,
}

#[derive(Debug, Deserialize)]
pub struct LoanRequestBody {
    pub origin: Address,
    pub amount: u128,
    pub ttl: u64,
}

#[derive(Debug, Deserialize)]
pub struct SponsoredRequestBody {
    /// The sponsor submitting the request.
    pub origin: Address,
    pub receiver: Address,
    pub amount: u128,
    pub ttl: u64,
    pub signature: EcdsaSignature,
}

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    pub origin: Address,
    /// Value attached to the call; must equal the principal.
    pub value: u128,
}

#[derive(Debug, Deserialize)]
pub struct OriginBody {
    pub origin: Address,
    /// Anything but zero is rejected by the escrow.
    #[serde(default)]
    pub value: u128,
}

#[derive(Debug, Deserialize)]
pub struct SponsoredSettlementBody {
    pub origin: Address,
    pub receiver: Address,
    pub signature: EcdsaSignature,
}

#[derive(Debug, Deserialize)]
pub struct LoanFilter {
    pub status: Option<LoanStatus>,
}

#[derive(Debug, Deserialize)]
pub struct EventsFilter {
    /// Only entries with `sequence >= since`.
    #[serde(default)]
    pub since: u64,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub network: String,
    pub block_height: u64,
    /// A ttl this many blocks ahead is what clients should request by default.
    pub suggested_ttl: u64,
    /// Identifiers ever created.
    pub loans: usize,
    pub requests_issued: u64,
    pub custody: u128,
    /// Whether custody matches the sum of approved principals.
    pub solvent: bool,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub address: Address,
    pub balance: u128,
    pub frozen: bool,
}

/// A loan record as served over the API.
#[derive(Debug, Serialize)]
pub struct LoanView {
    pub id: LoanId,
    pub amount: u128,
    pub receiver: Address,
    pub ttl: u64,
    pub status: LoanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funder: Option<Address>,
    /// Advisory; does not block any transition.
    pub expired: bool,
}

impl LoanView {
    fn new(id: LoanId, record: LoanRecord, block_height: u64) -> Self {
        Self {
            id,
            expired: record.is_expired(block_height),
            amount: record.amount,
            receiver: record.receiver,
            ttl: record.ttl,
            status: record.status,
            funder: record.funder,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers: node and ledger
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: node and escrow summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let escrow = state.escrow.read().await;
    let solvency = escrow.check_solvency();
    if let Err(e) = &solvency {
        tracing::error!(error = %e, "escrow solvency check failed");
    }

    Json(StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        block_height: escrow.gateway().block_height(),
        suggested_ttl: escrow
            .gateway()
            .block_height()
            .saturating_add(lendpact_protocol::config::DEFAULT_TTL_WINDOW),
        loans: escrow.loans().len(),
        requests_issued: escrow.requests_issued(),
        custody: escrow.gateway().custody(),
        solvent: solvency.is_ok(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /blocks`: mine empty blocks.
async fn advance_blocks_handler(
    State(state): State<AppState>,
    Json(req): Json<AdvanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.blocks == 0 || req.blocks > MAX_BLOCKS_PER_ADVANCE {
        return Err(ApiError::BadRequest(format!(
            "blocks must be between 1 and {MAX_BLOCKS_PER_ADVANCE}"
        )));
    }

    let mut escrow = state.escrow.write().await;
    let height = escrow.gateway_mut().advance(req.blocks);
    state
        .metrics
        .observe_escrow(escrow.gateway().custody(), height);
    tracing::debug!(height, mined = req.blocks, "blocks advanced");

    Ok(Json(serde_json::json!({ "block_height": height })))
}

/// `POST /faucet`: credit devnet value to an account.
async fn faucet_handler(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut escrow = state.escrow.write().await;
    let ledger: &mut Ledger = escrow.gateway_mut();
    let balance = ledger
        .mint(req.address, req.amount)
        .map_err(ApiError::Ledger)?;
    let frozen = ledger.account(&req.address).map_or(false, |a| a.frozen);

    tracing::info!(address = %req.address, amount = req.amount, "faucet payout");
    Ok(Json(AccountResponse {
        address: req.address,
        balance,
        frozen,
    }))
}

/// `GET /accounts/:address`: account balance; unknown accounts read as zero.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let address = parse_address(&address)?;
    let escrow = state.escrow.read().await;
    let ledger = escrow.gateway();

    Ok(Json(AccountResponse {
        address,
        balance: ledger.balance_of(&address),
        frozen: ledger.account(&address).map_or(false, |a| a.frozen),
    }))
}

// ---------------------------------------------------------------------------
// Handlers: loan queries
// ---------------------------------------------------------------------------

/// `GET /loans?status=Approved`: loans ordered by identifier.
async fn list_loans_handler(
    State(state): State<AppState>,
    Query(filter): Query<LoanFilter>,
) -> impl IntoResponse {
    let escrow = state.escrow.read().await;
    let height = escrow.gateway().block_height();
    let loans: Vec<LoanView> = escrow
        .loans()
        .into_iter()
        .filter(|(_, record)| filter.status.map_or(true, |s| record.status == s))
        .map(|(id, record)| LoanView::new(id, record, height))
        .collect();
    Json(loans)
}

/// `GET /loans/:id`: total lookup; never-created ids come back `Empty`.
async fn loan_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let escrow = state.escrow.read().await;
    let height = escrow.gateway().block_height();
    Ok(Json(LoanView::new(id, escrow.loan(&id), height)))
}

/// `GET /events?since=N`
async fn events_handler(
    State(state): State<AppState>,
    Query(filter): Query<EventsFilter>,
) -> impl IntoResponse {
    let escrow = state.escrow.read().await;
    let events: Vec<JournalEntry> = escrow
        .events()
        .iter()
        .filter(|entry| entry.sequence >= filter.since)
        .cloned()
        .collect();
    Json(events)
}

// ---------------------------------------------------------------------------
// Handlers: lifecycle
// ---------------------------------------------------------------------------

/// Run one escrow operation that creates a loan.
async fn create<F>(state: &AppState, origin: Address, op: F) -> Result<Response, ApiError>
where
    F: FnOnce(&mut LoanEscrow, &CallContext) -> Result<LoanId, EscrowError>,
{
    let mut escrow = state.escrow.write().await;
    let height = escrow.gateway().block_height();
    let ctx = CallContext::new(origin, height);

    let timer = state.metrics.operation_latency_seconds.start_timer();
    let outcome = op(&mut *escrow, &ctx);
    timer.observe_duration();

    let id = outcome.map_err(|e| state.rejected(e))?;
    state.metrics.loans_requested_total.inc();

    let view = LoanView::new(id, escrow.loan(&id), height);
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

/// Run one escrow operation against an existing loan.
async fn transition<F>(
    state: &AppState,
    raw_id: &str,
    origin: Address,
    value: u128,
    committed: &IntCounter,
    op: F,
) -> Result<Json<LoanView>, ApiError>
where
    F: FnOnce(&mut LoanEscrow, &CallContext, &LoanId) -> Result<(), EscrowError>,
{
    let id = parse_id(raw_id)?;
    let mut escrow = state.escrow.write().await;
    let height = escrow.gateway().block_height();
    let ctx = CallContext::new(origin, height).with_value(value);

    let timer = state.metrics.operation_latency_seconds.start_timer();
    let outcome = op(&mut *escrow, &ctx, &id);
    timer.observe_duration();

    outcome.map_err(|e| state.rejected(e))?;
    committed.inc();
    state
        .metrics
        .observe_escrow(escrow.gateway().custody(), height);

    Ok(Json(LoanView::new(id, escrow.loan(&id), height)))
}

/// `POST /loans`: `{ origin, amount, ttl }`
async fn request_loan_handler(
    State(state): State<AppState>,
    Json(body): Json<LoanRequestBody>,
) -> Result<Response, ApiError> {
    create(&state, body.origin, |escrow, ctx| {
        escrow.request_loan(ctx, body.amount, body.ttl)
    })
    .await
}

/// `POST /loans/sponsored`: `{ origin, receiver, amount, ttl, signature }`
async fn sponsored_request_handler(
    State(state): State<AppState>,
    Json(body): Json<SponsoredRequestBody>,
) -> Result<Response, ApiError> {
    let SponsoredRequestBody {
        origin,
        receiver,
        amount,
        ttl,
        signature,
    } = body;
    create(&state, origin, move |escrow, ctx| {
        escrow.sponsorship_request_loan(ctx, amount, ttl, receiver, signature.as_bytes())
    })
    .await
}

/// `POST /loans/:id/approve`: `{ origin, value }`
async fn approve_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<LoanView>, ApiError> {
    transition(
        &state,
        &id,
        body.origin,
        body.value,
        &state.metrics.loans_approved_total,
        |escrow, ctx, id| escrow.approve_loan(ctx, id),
    )
    .await
}

/// `POST /loans/:id/take`: `{ origin }`
async fn take_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<OriginBody>,
) -> Result<Json<LoanView>, ApiError> {
    transition(
        &state,
        &id,
        body.origin,
        body.value,
        &state.metrics.loans_taken_total,
        |escrow, ctx, id| escrow.take_loan(ctx, id),
    )
    .await
}

/// `POST /loans/:id/refuse`: `{ origin }`
async fn refuse_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<OriginBody>,
) -> Result<Json<LoanView>, ApiError> {
    transition(
        &state,
        &id,
        body.origin,
        body.value,
        &state.metrics.loans_refused_total,
        |escrow, ctx, id| escrow.refuse_loan(ctx, id),
    )
    .await
}

/// `POST /loans/:id/cancel`: `{ origin }`
async fn cancel_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<OriginBody>,
) -> Result<Json<LoanView>, ApiError> {
    transition(
        &state,
        &id,
        body.origin,
        body.value,
        &state.metrics.loans_canceled_total,
        |escrow, ctx, id| escrow.cancel_loan(ctx, id),
    )
    .await
}

/// `POST /loans/:id/sponsored-take`: `{ origin, receiver, signature }`
async fn sponsored_take_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SponsoredSettlementBody>,
) -> Result<Json<LoanView>, ApiError> {
    let SponsoredSettlementBody {
        origin,
        receiver,
        signature,
    } = body;
    transition(
        &state,
        &id,
        origin,
        0,
        &state.metrics.loans_taken_total,
        move |escrow, ctx, id| {
            escrow.sponsorship_take_loan(ctx, id, receiver, signature.as_bytes())
        },
    )
    .await
}

/// `POST /loans/:id/sponsored-refuse`: `{ origin, receiver, signature }`
async fn sponsored_refuse_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SponsoredSettlementBody>,
) -> Result<Json<LoanView>, ApiError> {
    let SponsoredSettlementBody {
        origin,
        receiver,
        signature,
    } = body;
    transition(
        &state,
        &id,
        origin,
        0,
        &state.metrics.loans_refused_total,
        move |escrow, ctx, id| {
            escrow.sponsorship_refuse_loan(ctx, id, receiver, signature.as_bytes())
        },
    )
    .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

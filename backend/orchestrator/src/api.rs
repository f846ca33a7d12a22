//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::bid::BidStatus;
use crate::errors::{ErrorKind, TenderError};
use crate::milestone::allowed_actions;
use crate::phase::unix_now;
use crate::refresh::{BoardState, BoardView};
use crate::role::{resolve_role, RoleInfo};
use crate::service::{TenderService, TenderSummary, TenderView};
use crate::types::{Address, Contractor};

pub struct ApiState {
    pub board: Arc<BoardState>,
    pub service: Arc<TenderService>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tenders", get(get_tenders))
        .route("/tenders/:id", get(get_tender))
        .route("/tenders/:id/refresh", post(refresh_tender))
        .route("/contractors", get(get_contractors))
        .route("/accounts/:address/role", get(get_role))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub network: u64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// Milestone actions open to the `viewer` given in the query string.
#[derive(Debug, Serialize)]
pub struct ViewerActions {
    pub viewer: Address,
    pub role: crate::role::Role,
    pub bid: BidStatus,
    pub milestones: Vec<Vec<&'static str>>,
}

#[derive(Serialize)]
pub struct ContractorsResponse {
    pub count: usize,
    pub contractors: Vec<Contractor>,
}

#[derive(Serialize)]
pub struct TenderDetail {
    #[serde(flatten)]
    pub view: TenderView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<ViewerActions>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailQuery {
    pub viewer: Option<String>,
}

pub enum ApiError {
    NotFound(String),
    Tender(TenderError),
}

impl From<TenderError> for ApiError {
    fn from(e: TenderError) -> Self {
        Self::Tender(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, error) = match self {
            Self::NotFound(what) => (StatusCode::NOT_FOUND, "not_found", what),
            Self::Tender(e) => {
                let (status, kind) = match e.kind() {
                    ErrorKind::Validation => (StatusCode::BAD_REQUEST, "validation"),
                    ErrorKind::NotPermitted => (StatusCode::FORBIDDEN, "not_permitted"),
                    ErrorKind::Transient => (StatusCode::SERVICE_UNAVAILABLE, "transient"),
                    ErrorKind::Terminal => (StatusCode::INTERNAL_SERVER_ERROR, "terminal"),
                    ErrorKind::Cancelled => (StatusCode::INTERNAL_SERVER_ERROR, "cancelled"),
                    ErrorKind::Precondition => (StatusCode::INTERNAL_SERVER_ERROR, "precondition"),
                };
                if status.is_server_error() {
                    warn!("Request failed: {e}");
                }
                (status, kind, e.to_string())
            }
        };
        (status, Json(ErrorResponse { error, kind })).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        network: state.board.network().0,
    })
}

/// `GET /tenders`
///
/// The last refreshed board; never blocks on the ledger.
pub async fn get_tenders(State(state): State<Arc<ApiState>>) -> Json<BoardView> {
    Json(state.board.view(unix_now()).await)
}

/// `GET /tenders/:id[?viewer=0x..]`
///
/// Live detail: bidders, winner and milestone states. With a viewer the
/// milestone actions open to that address are included.
pub async fn get_tender(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
    Query(query): Query<DetailQuery>,
) -> ApiResult<TenderDetail> {
    let network = state.board.network();
    let view = state
        .service
        .tender_view(network, id, unix_now())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("tender {id} not found")))?;

    let viewer = match query.viewer.as_deref() {
        Some(raw) => {
            let address = Address::parse(raw)?;
            let (info, bid) = tokio::try_join!(
                resolve_role(state.service.gateway(), network, &address),
                state.service.bid_status(network, id, &address),
            )?;
            let tender = &view.summary.tender.tender;
            let milestones = view
                .milestones
                .milestones
                .iter()
                .map(|m| allowed_actions(tender, &m.milestone, Some(&address), Some(info.role)))
                .collect();
            Some(ViewerActions {
                viewer: address,
                role: info.role,
                bid,
                milestones,
            })
        }
        None => None,
    };
    Ok(Json(TenderDetail { view, viewer }))
}

/// `POST /tenders/:id/refresh`
pub async fn refresh_tender(State(state): State<Arc<ApiState>>, Path(id): Path<u64>) -> ApiResult<TenderSummary> {
    state
        .board
        .refresh_tender(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("tender {id} not found")))
}

/// `GET /contractors`
pub async fn get_contractors(State(state): State<Arc<ApiState>>) -> ApiResult<ContractorsResponse> {
    let contractors = state.service.contractors(state.board.network()).await?;
    Ok(Json(ContractorsResponse {
        count: contractors.len(),
        contractors,
    }))
}

/// `GET /accounts/:address/role`
pub async fn get_role(State(state): State<Arc<ApiState>>, Path(address): Path<String>) -> ApiResult<RoleInfo> {
    let address = Address::parse(&address)?;
    let info = resolve_role(state.service.gateway(), state.board.network(), &address).await?;
    Ok(Json(info))
}

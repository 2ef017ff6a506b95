use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::allocation::AllocationError;
use super::distance::DistanceService;
use super::domain::{MatchId, PledgeId, RequestId};
use super::repository::ReliefRepository;
use super::service::{MatchServiceError, ReliefMatchService};
use super::shipping::{ShippingError, ShippingUpdate};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AutoMatchBody {
    pub(crate) request_id: RequestId,
    #[serde(default)]
    pub(crate) match_type_name: Option<String>,
    #[serde(default)]
    pub(crate) inventory_priority: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ManualMatchBody {
    pub(crate) request_id: RequestId,
    pub(crate) pledge_id: PledgeId,
    pub(crate) match_quantity: u32,
}

/// Router builder exposing the matching endpoints.
pub fn matching_router<R, D>(service: Arc<ReliefMatchService<R, D>>) -> Router
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    Router::new()
        .route("/api/v1/matches", post(manual_match_handler::<R, D>))
        .route("/api/v1/matches/auto", post(auto_match_handler::<R, D>))
        .route(
            "/api/v1/matches/auto-types",
            get(auto_match_types_handler::<R, D>),
        )
        .route("/api/v1/matches/:match_id", get(match_handler::<R, D>))
        .route(
            "/api/v1/matches/:match_id/shipping",
            post(shipping_handler::<R, D>),
        )
        .route(
            "/api/v1/matches/:match_id/cancel",
            post(cancel_match_handler::<R, D>),
        )
        .route(
            "/api/v1/pledges/:pledge_id/cancel",
            post(cancel_pledge_handler::<R, D>),
        )
        .route(
            "/api/v1/requests/:request_id",
            get(request_status_handler::<R, D>),
        )
        .with_state(service)
}

pub(crate) async fn auto_match_handler<R, D>(
    State(service): State<Arc<ReliefMatchService<R, D>>>,
    axum::Json(body): axum::Json<AutoMatchBody>,
) -> Response
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    let result = service
        .perform_auto_match(
            body.request_id,
            body.match_type_name.as_deref(),
            body.inventory_priority.as_deref(),
        )
        .await;

    match result {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn manual_match_handler<R, D>(
    State(service): State<Arc<ReliefMatchService<R, D>>>,
    axum::Json(body): axum::Json<ManualMatchBody>,
) -> Response
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    match service.create_manual_match(body.request_id, body.pledge_id, body.match_quantity) {
        Ok(receipt) => (StatusCode::CREATED, axum::Json(receipt)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn auto_match_types_handler<R, D>(
    State(service): State<Arc<ReliefMatchService<R, D>>>,
) -> Response
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    (StatusCode::OK, axum::Json(service.auto_match_types())).into_response()
}

pub(crate) async fn match_handler<R, D>(
    State(service): State<Arc<ReliefMatchService<R, D>>>,
    Path(match_id): Path<u64>,
) -> Response
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    match service.match_details(MatchId(match_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn shipping_handler<R, D>(
    State(service): State<Arc<ReliefMatchService<R, D>>>,
    Path(match_id): Path<u64>,
    axum::Json(update): axum::Json<ShippingUpdate>,
) -> Response
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    match service.update_shipping_status(MatchId(match_id), update) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_match_handler<R, D>(
    State(service): State<Arc<ReliefMatchService<R, D>>>,
    Path(match_id): Path<u64>,
) -> Response
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    match service.cancel_match(MatchId(match_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_pledge_handler<R, D>(
    State(service): State<Arc<ReliefMatchService<R, D>>>,
    Path(pledge_id): Path<u64>,
) -> Response
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    match service.cancel_pledge(PledgeId(pledge_id)) {
        Ok(cancellation) => (StatusCode::OK, axum::Json(cancellation)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn request_status_handler<R, D>(
    State(service): State<Arc<ReliefMatchService<R, D>>>,
    Path(request_id): Path<u64>,
) -> Response
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    match service.request_status(RequestId(request_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: MatchServiceError) -> Response {
    if let MatchServiceError::Allocation(AllocationError::NoSupply(request_id)) = &error {
        let payload = json!({
            "outcome": "no_supply",
            "request_id": request_id,
            "error": error.to_string(),
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    }

    let status = status_for(&error);
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

fn status_for(error: &MatchServiceError) -> StatusCode {
    match error {
        MatchServiceError::Allocation(error) => match error {
            AllocationError::RequestNotFound(_) | AllocationError::PledgeNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AllocationError::AlreadyFulfilled(_) => StatusCode::CONFLICT,
            AllocationError::NoSupply(_) | AllocationError::ItemMismatch { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AllocationError::InvalidPolicy(_)
            | AllocationError::InvalidInventoryPriority(_)
            | AllocationError::InvalidQuantity => StatusCode::BAD_REQUEST,
            AllocationError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        MatchServiceError::Shipping(error) => match error {
            ShippingError::MatchNotFound(_) | ShippingError::PledgeNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ShippingError::Forbidden(_) => StatusCode::FORBIDDEN,
            ShippingError::InvalidTransition { .. }
            | ShippingError::MatchCanceled(_)
            | ShippingError::AlreadyShipped(_) => StatusCode::CONFLICT,
            ShippingError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        MatchServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

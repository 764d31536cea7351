use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::batch_reservation;
use crate::{errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReserveRequest {
    #[validate(range(min = 0.000001))]
    pub qty: f64,
    /// Free-form note on what the volume is being held for
    #[validate(length(max = 200))]
    pub purpose: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationResponse {
    pub id: i64,
    pub batch_id: i64,
    pub reserved_qty: f64,
    pub purpose: Option<String>,
    pub reserved_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl From<batch_reservation::Model> for ReservationResponse {
    fn from(model: batch_reservation::Model) -> Self {
        let is_active = model.is_active();
        Self {
            id: model.id,
            batch_id: model.batch_id,
            reserved_qty: model.reserved_qty,
            purpose: model.purpose,
            reserved_at: model.reserved_at,
            released_at: model.released_at,
            is_active,
        }
    }
}

/// Reserve volume from a batch's free pool
#[utoipa::path(
    post,
    path = "/api/v1/batches/{id}/reserve",
    params(("id" = i64, Path, description = "Batch ID")),
    request_body = ReserveRequest,
    responses(
        (status = 201, description = "Reservation placed", body = ApiResponse<ReservationResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Batch deleted, expired, or free volume insufficient", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
        (status = 503, description = "Storage unavailable", body = crate::errors::ErrorResponse),
    ),
    tag = "reservations"
)]
pub async fn reserve_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReservationResponse>>), ServiceError> {
    request.validate()?;

    let reservation = state
        .services
        .reservations
        .reserve(id, request.qty, request.purpose)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(reservation.into())),
    ))
}

/// List all reservations placed against a batch
#[utoipa::path(
    get,
    path = "/api/v1/batches/{id}/reservations",
    params(("id" = i64, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Reservations returned", body = ApiResponse<Vec<ReservationResponse>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "reservations"
)]
pub async fn list_batch_reservations(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<ReservationResponse>>>, ServiceError> {
    let reservations = state.services.reservations.list_for_batch(id).await?;
    Ok(Json(ApiResponse::success(
        reservations.into_iter().map(Into::into).collect(),
    )))
}

/// Release a reservation, returning its volume to the free pool
#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/release",
    params(("id" = i64, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation released", body = ApiResponse<ReservationResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 404, description = "Reservation not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Reservation already released", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "reservations"
)]
pub async fn release_reservation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ReservationResponse>>, ServiceError> {
    let released = state.services.reservations.release(id).await?;
    Ok(Json(ApiResponse::success(released.into())))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::BatchCode;
use crate::services::batches::{BatchDetails, NewBatch};
use crate::{errors::ServiceError, ApiResponse, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBatchRequest {
    /// Business key, format SCH-YYYYMMDD-XXXX
    pub batch_code: String,
    /// Defaults to the current time when omitted
    pub received_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 30))]
    pub shelf_life_days: i32,
    #[validate(range(min = 0.000001))]
    pub volume_liters: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub fat_percent: f64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConsumeRequest {
    #[validate(range(min = 0.000001))]
    pub qty: f64,
    /// Optional order reference recorded on the consumption ledger entry
    #[validate(length(max = 100))]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchResponse {
    pub id: i64,
    pub batch_code: String,
    pub received_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub shelf_life_days: i32,
    pub volume_liters: f64,
    pub fat_percent: f64,
    pub available_liters: f64,
    pub reserved_liters: f64,
    pub free_liters: f64,
    pub is_expired: bool,
    pub is_deleted: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BatchDetails> for BatchResponse {
    fn from(details: BatchDetails) -> Self {
        let batch = &details.batch;
        Self {
            id: batch.id,
            batch_code: batch.batch_code.clone(),
            received_at: batch.received_at,
            expiry_date: batch.expiry_date,
            shelf_life_days: batch.shelf_life_days,
            volume_liters: batch.volume_liters,
            fat_percent: batch.fat_percent,
            available_liters: details.available_liters,
            reserved_liters: details.reserved_liters,
            free_liters: details.free_liters,
            is_expired: batch.is_expired(),
            is_deleted: batch.is_deleted(),
            version: batch.version,
            created_at: batch.created_at,
            updated_at: batch.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConsumeResponse {
    pub record_id: i64,
    pub batch_id: i64,
    pub qty: f64,
    pub order_id: Option<String>,
    pub consumed_at: DateTime<Utc>,
    pub available_liters: f64,
    pub version: i32,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct BatchListQuery {
    /// Number of batches to skip
    #[serde(default)]
    pub skip: u64,
    /// Page size; clamped to the configured maximum
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct GetBatchQuery {
    /// Also return the batch when it has been soft-deleted
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct NearExpiryQuery {
    /// Look-ahead horizon in days; defaults from configuration
    pub days: Option<i64>,
}

/// Register a newly received batch
#[utoipa::path(
    post,
    path = "/api/v1/batches",
    request_body = CreateBatchRequest,
    responses(
        (status = 201, description = "Batch registered", body = ApiResponse<BatchResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Batch code already exists", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
        (status = 503, description = "Storage unavailable", body = crate::errors::ErrorResponse),
    ),
    tag = "batches"
)]
pub async fn create_batch(
    State(state): State<AppState>,
    Json(request): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BatchResponse>>), ServiceError> {
    request.validate()?;
    let batch_code = BatchCode::parse(request.batch_code)?;

    let details = state
        .services
        .batches
        .create_batch(NewBatch {
            batch_code,
            received_at: request.received_at,
            shelf_life_days: request.shelf_life_days,
            volume_liters: request.volume_liters,
            fat_percent: request.fat_percent,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(details.into())),
    ))
}

/// List batches
#[utoipa::path(
    get,
    path = "/api/v1/batches",
    params(BatchListQuery),
    responses(
        (status = 200, description = "Batches returned", body = ApiResponse<PaginatedResponse<BatchResponse>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
        (status = 503, description = "Storage unavailable", body = crate::errors::ErrorResponse),
    ),
    tag = "batches"
)]
pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<BatchListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<BatchResponse>>>, ServiceError> {
    let limit = query
        .limit
        .unwrap_or(state.config.api_default_page_size)
        .clamp(1, state.config.api_max_page_size);

    let (details, total) = state.services.batches.list_batches(query.skip, limit).await?;

    let items: Vec<BatchResponse> = details.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        skip: query.skip,
        limit,
    })))
}

/// Batches approaching expiry that still hold volume
#[utoipa::path(
    get,
    path = "/api/v1/batches/near-expiry",
    params(NearExpiryQuery),
    responses(
        (status = 200, description = "Near-expiry batches returned", body = ApiResponse<Vec<BatchResponse>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid horizon", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "batches"
)]
pub async fn near_expiry(
    State(state): State<AppState>,
    Query(query): Query<NearExpiryQuery>,
) -> Result<Json<ApiResponse<Vec<BatchResponse>>>, ServiceError> {
    let days = query.days.unwrap_or(state.config.near_expiry_default_days);
    if !(1..=365).contains(&days) {
        return Err(ServiceError::ValidationError(format!(
            "days must be between 1 and 365, got {}",
            days
        )));
    }

    let details = state.services.batches.near_expiry(days).await?;
    Ok(Json(ApiResponse::success(
        details.into_iter().map(Into::into).collect(),
    )))
}

/// Fetch a single batch with derived volumes
#[utoipa::path(
    get,
    path = "/api/v1/batches/{id}",
    params(
        ("id" = i64, Path, description = "Batch ID"),
        GetBatchQuery
    ),
    responses(
        (status = 200, description = "Batch returned", body = ApiResponse<BatchResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "batches"
)]
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<GetBatchQuery>,
) -> Result<Json<ApiResponse<BatchResponse>>, ServiceError> {
    let details = state
        .services
        .batches
        .get_batch(id, query.include_deleted)
        .await?;
    Ok(Json(ApiResponse::success(details.into())))
}

/// Consume volume from a batch
#[utoipa::path(
    post,
    path = "/api/v1/batches/{id}/consume",
    params(("id" = i64, Path, description = "Batch ID")),
    request_body = ConsumeRequest,
    responses(
        (status = 200, description = "Volume consumed", body = ApiResponse<ConsumeResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Batch deleted, expired, or volume insufficient", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
        (status = 503, description = "Storage unavailable", body = crate::errors::ErrorResponse),
    ),
    tag = "batches"
)]
pub async fn consume_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ConsumeRequest>,
) -> Result<Json<ApiResponse<ConsumeResponse>>, ServiceError> {
    request.validate()?;

    let outcome = state
        .services
        .batches
        .consume(id, request.qty, request.order_id)
        .await?;

    Ok(Json(ApiResponse::success(ConsumeResponse {
        record_id: outcome.record.id,
        batch_id: outcome.batch.id,
        qty: outcome.record.qty,
        order_id: outcome.record.order_id,
        consumed_at: outcome.record.consumed_at,
        available_liters: outcome.available_liters,
        version: outcome.batch.version,
    })))
}

/// Soft-delete a batch
#[utoipa::path(
    delete,
    path = "/api/v1/batches/{id}",
    params(("id" = i64, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch deleted", body = ApiResponse<BatchResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Batch already deleted", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "batches"
)]
pub async fn delete_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<BatchResponse>>, ServiceError> {
    state.services.batches.soft_delete(id).await?;
    let details = state.services.batches.get_batch(id, true).await?;
    Ok(Json(ApiResponse::success(details.into())))
}

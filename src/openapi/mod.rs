use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Batch Inventory API",
        version = "1.0.0",
        description = r#"
# Perishable Batch Inventory API

Tracks perishable batches through their lifecycle: registration, consumption
against a ledger, provisional reservations, and soft deletion.

## Volume model

Every batch carries three derived figures, recomputed from the ledger tables
on each read:

- `available_liters`: initial volume minus all recorded consumption
- `reserved_liters`: sum of active (unreleased) reservations
- `free_liters`: available minus reserved, floored at zero

Consumption admits against available volume; reservations admit against free
volume. Both run under an exclusive batch row lock so concurrent requests
serialize and over-consumption is impossible.

## Error Handling

The API uses consistent error response formats with appropriate HTTP status
codes:

```json
{
  "error": "Conflict",
  "message": "Insufficient volume in batch 1: available=10.0L, requested=15.0L",
  "timestamp": "2025-12-04T00:00:00Z"
}
```

## Pagination

The batch list endpoint supports `skip` and `limit` query parameters.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "batches", description = "Batch lifecycle and consumption endpoints"),
        (name = "reservations", description = "Volume reservation endpoints"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Batches
        crate::handlers::batches::create_batch,
        crate::handlers::batches::list_batches,
        crate::handlers::batches::near_expiry,
        crate::handlers::batches::get_batch,
        crate::handlers::batches::consume_batch,
        crate::handlers::batches::delete_batch,

        // Reservations
        crate::handlers::reservations::reserve_batch,
        crate::handlers::reservations::list_batch_reservations,
        crate::handlers::reservations::release_reservation,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,

            // Batch types
            crate::handlers::batches::BatchResponse,
            crate::handlers::batches::CreateBatchRequest,
            crate::handlers::batches::ConsumeRequest,
            crate::handlers::batches::ConsumeResponse,

            // Reservation types
            crate::handlers::reservations::ReservationResponse,
            crate::handlers::reservations::ReserveRequest,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

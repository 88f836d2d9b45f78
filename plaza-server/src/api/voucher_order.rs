//! Flash-sale order endpoint

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use shared::error::{ApiResponse, AppError};

use crate::error::ServiceError;
use crate::state::AppState;

/// POST /api/voucher-order/seckill/{id}
///
/// The authenticated user id arrives from the auth middleware via the
/// `X-User-Id` header; a missing or malformed header is an auth failure.
pub async fn seckill(
    State(state): State<AppState>,
    Path(voucher_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<i64>>, ServiceError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| ServiceError::App(AppError::not_authenticated()))?;

    let order_id = state.seckill.reserve(voucher_id, user_id).await?;
    Ok(Json(ApiResponse::success(order_id)))
}

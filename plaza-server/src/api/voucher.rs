//! Voucher endpoints

use axum::extract::{Path, State};
use axum::Json;
use redis::AsyncCommands;
use shared::error::{ApiResponse, AppError};
use shared::models::{Voucher, VoucherWithSeckill};

use crate::cache::keys;
use crate::db;
use crate::error::ServiceError;
use crate::state::AppState;

/// POST /api/voucher: create a flash-sale voucher.
///
/// The ephemeral stock counter is pre-warmed so admission can run without
/// manual seeding; the admitted-user set starts empty by construction.
pub async fn add_seckill_voucher(
    State(state): State<AppState>,
    Json(payload): Json<Voucher>,
) -> Result<Json<ApiResponse<i64>>, ServiceError> {
    let stock = payload.stock.unwrap_or(0);
    if stock < 0 {
        return Err(AppError::validation("stock must be non-negative").into());
    }
    if payload.begin_time.zip(payload.end_time).is_none() {
        return Err(AppError::validation("beginTime and endTime are required").into());
    }

    let voucher_id = db::voucher::add_seckill_voucher(&state.pool, &payload).await?;

    let mut conn = state.redis.clone();
    let _: () = conn.set(keys::stock_key(voucher_id), stock).await?;

    Ok(Json(ApiResponse::success(voucher_id)))
}

/// GET /api/voucher/shop/{id}: active vouchers of a shop
pub async fn query_vouchers_of_shop(
    State(state): State<AppState>,
    Path(shop_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<VoucherWithSeckill>>>, ServiceError> {
    let vouchers = db::voucher::query_vouchers_of_shop(&state.pool, shop_id).await?;
    Ok(Json(ApiResponse::success(vouchers)))
}

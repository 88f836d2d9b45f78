//! Shop endpoints

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use shared::error::{ApiResponse, AppError, ErrorCode};
use shared::models::{Shop, ShopCreate, ShopUpdate};

use crate::cache::keys::DEFAULT_PAGE_SIZE;
use crate::db;
use crate::error::ServiceError;
use crate::state::AppState;

/// GET /api/shop/{id}: Bloom-guarded cached read
pub async fn get_shop(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Shop>>, ServiceError> {
    match state.shop_cache.get_by_id_with_bloom(id).await? {
        Some(shop) => Ok(Json(ApiResponse::success(shop))),
        None => Err(AppError::new(ErrorCode::ShopNotFound).into()),
    }
}

/// GET /api/shop/hot/{id}: logical-expiry read for pre-warmed hot keys
pub async fn get_shop_hot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Shop>>, ServiceError> {
    match state.shop_cache.get_by_id_logical(id).await? {
        Some(shop) => Ok(Json(ApiResponse::success(shop))),
        None => Err(AppError::new(ErrorCode::ShopNotFound).into()),
    }
}

/// POST /api/shop: create a shop and admit its id into the Bloom filter
pub async fn create_shop(
    State(state): State<AppState>,
    Json(payload): Json<ShopCreate>,
) -> Result<Json<ApiResponse<i64>>, ServiceError> {
    if payload.name.is_empty() {
        return Err(AppError::validation("shop name is required").into());
    }
    let id = db::shop::create(&state.pool, &payload).await?;
    if let Err(e) = state.shop_cache.bloom().add(id).await {
        // The filter can be rebuilt; the row is authoritative
        tracing::warn!(shop_id = id, error = %e, "Bloom add failed for new shop");
    }
    Ok(Json(ApiResponse::success(id)))
}

/// PUT /api/shop: update the row and invalidate both cache tiers
pub async fn update_shop(
    State(state): State<AppState>,
    Json(payload): Json<ShopUpdate>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.shop_cache.update(&payload).await?;
    Ok(Json(ApiResponse::ok()))
}

#[derive(Debug, Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "typeId")]
    pub type_id: i64,
    #[serde(default = "first_page")]
    pub page: i64,
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default = "first_page")]
    pub page: i64,
}

fn first_page() -> i64 {
    1
}

/// GET /api/shop/of-type: paged listing by category
pub async fn query_by_type(
    State(state): State<AppState>,
    Query(q): Query<TypeQuery>,
) -> Result<Json<ApiResponse<Vec<Shop>>>, ServiceError> {
    let shops = db::shop::query_by_type(&state.pool, q.type_id, q.page, DEFAULT_PAGE_SIZE).await?;
    Ok(Json(ApiResponse::success(shops)))
}

/// GET /api/shop/of-name: paged listing by name substring
pub async fn query_by_name(
    State(state): State<AppState>,
    Query(q): Query<NameQuery>,
) -> Result<Json<ApiResponse<Vec<Shop>>>, ServiceError> {
    let shops = db::shop::query_by_name(&state.pool, &q.name, q.page, DEFAULT_PAGE_SIZE).await?;
    Ok(Json(ApiResponse::success(shops)))
}

//! API routes for plaza-server

pub mod health;
pub mod shop;
pub mod voucher;
pub mod voucher_order;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    let shop = Router::new()
        .route("/api/shop", post(shop::create_shop).put(shop::update_shop))
        .route("/api/shop/{id}", get(shop::get_shop))
        .route("/api/shop/hot/{id}", get(shop::get_shop_hot))
        .route("/api/shop/of-type", get(shop::query_by_type))
        .route("/api/shop/of-name", get(shop::query_by_name));

    let voucher = Router::new()
        .route("/api/voucher", post(voucher::add_seckill_voucher))
        .route("/api/voucher/shop/{id}", get(voucher::query_vouchers_of_shop));

    let order = Router::new().route(
        "/api/voucher-order/seckill/{id}",
        post(voucher_order::seckill),
    );

    Router::new()
        .route("/health", get(health::health_check))
        .merge(shop)
        .merge(voucher)
        .merge(order)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

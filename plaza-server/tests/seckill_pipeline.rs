//! End-to-end flash-sale pipeline tests
//!
//! These tests need live MySQL, Redis and (for the consumer paths) Kafka;
//! each one skips itself when its services are unreachable.

mod common;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::TestCtx;
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;

use plaza_server::cache::keys;
use plaza_server::seckill::pipeline::ReservationMessage;
use plaza_server::seckill::spawn_consumers;
use plaza_server::AppState;

/// 200 concurrent distinct users against stock 100: at most 100 admissions
#[tokio::test]
async fn test_no_oversell() {
    let Some(ctx) = TestCtx::new().await else {
        return;
    };
    let voucher_id = ctx.seed_seckill_voucher(100).await;

    let success = Arc::new(AtomicI64::new(0));
    let mut handles = Vec::new();
    for i in 0..200i64 {
        let seckill = ctx.state.seckill.clone();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let user_id = 1000 + i;
            if seckill.reserve(voucher_id, user_id).await.is_ok() {
                success.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let admitted = success.load(Ordering::SeqCst);
    assert!(
        admitted <= 100,
        "oversold: {admitted} admissions for stock 100"
    );
    println!("admitted {admitted}/200 for stock 100");
}

/// 200 concurrent attempts by one user: exactly one admission
#[tokio::test]
async fn test_one_order_per_user() {
    let Some(ctx) = TestCtx::new().await else {
        return;
    };
    let voucher_id = ctx.seed_seckill_voucher(100).await;
    let user_id = 1;

    let success = Arc::new(AtomicI64::new(0));
    let mut handles = Vec::new();
    for _ in 0..200 {
        let seckill = ctx.state.seckill.clone();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            if seckill.reserve(voucher_id, user_id).await.is_ok() {
                success.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(
        success.load(Ordering::SeqCst),
        1,
        "expected exactly one admission for a single user"
    );
}

/// Admission returns an order id even when the broker is down; the
/// reservation is accepted optimistically.
#[tokio::test]
async fn test_kafka_down_still_admits() {
    let Some(ctx) = TestCtx::new().await else {
        return;
    };
    let voucher_id = ctx.seed_seckill_voucher(100).await;

    // Rebuild the state against a port nothing listens on
    let mut config = ctx.config.clone();
    config.kafka_brokers = "127.0.0.1:29093".into();
    let Ok(state) = AppState::new(&config).await else {
        eprintln!("skip: backing services unreachable");
        return;
    };

    let order_id = state
        .seckill
        .reserve(voucher_id, 2)
        .await
        .expect("admission must not depend on the broker");
    assert!(order_id > 0);
}

/// A consumer replaying a known order id neither errors, nor inserts a
/// second row, nor deducts persistent stock twice.
#[tokio::test]
async fn test_duplicate_order_id_is_idempotent() {
    let Some(ctx) = TestCtx::new().await else {
        return;
    };
    if !ctx.kafka_reachable().await {
        eprintln!("skip: kafka unreachable");
        return;
    }
    let voucher_id = ctx.seed_seckill_voucher(100).await;
    let user_id = 3;

    let shutdown = CancellationToken::new();
    let handles = spawn_consumers(
        &ctx.config,
        ctx.state.pool.clone(),
        ctx.state.redis.clone(),
        ctx.state.publisher.clone(),
        shutdown.clone(),
    )
    .expect("spawn consumers");

    // Pre-insert the order row the message will collide with
    let order_id = Utc::now().timestamp_nanos_opt().unwrap();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO tb_voucher_order (id, user_id, voucher_id, pay_type, status, create_time, update_time) \
         VALUES (?, ?, ?, 1, 1, ?, ?)",
    )
    .bind(order_id)
    .bind(user_id)
    .bind(voucher_id)
    .bind(now)
    .bind(now)
    .execute(&ctx.state.pool)
    .await
    .expect("seed order row");
    let stock_before = ctx.persistent_stock(voucher_id).await;

    let msg = ReservationMessage::new(order_id, user_id, voucher_id, now.timestamp());
    ctx.state
        .publisher
        .publish_primary(&msg)
        .await
        .expect("publish duplicate");

    // The replay commits without a second row or stock movement
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(ctx.order_count(voucher_id, user_id).await, 1);
    assert_eq!(ctx.persistent_stock(voucher_id).await, stock_before);

    shutdown.cancel();
    for h in handles {
        let _ = h.await;
    }
}

/// Three injected failures: the reservation survives three retry hops and
/// then materializes.
#[tokio::test]
async fn test_fail_count_three_retries_then_success() {
    let Some(ctx) = TestCtx::new().await else {
        return;
    };
    if !ctx.kafka_reachable().await {
        eprintln!("skip: kafka unreachable");
        return;
    }
    let voucher_id = ctx.seed_seckill_voucher(10).await;
    let user_id = 4;

    let mut config = ctx.config.clone();
    config.force_seckill_fail_count = 3;
    let shutdown = CancellationToken::new();
    let handles = spawn_consumers(
        &config,
        ctx.state.pool.clone(),
        ctx.state.redis.clone(),
        ctx.state.publisher.clone(),
        shutdown.clone(),
    )
    .expect("spawn consumers");

    ctx.state
        .seckill
        .reserve(voucher_id, user_id)
        .await
        .expect("admission");

    // Backoffs are 1s + 2s + 4s before the fourth, successful attempt
    let ok = ctx
        .wait_for_order_count(voucher_id, user_id, 1, Duration::from_secs(20))
        .await;
    assert!(ok, "order should materialize after three retries");

    shutdown.cancel();
    for h in handles {
        let _ = h.await;
    }
}

/// Four injected failures exhaust the retry budget: no order row, the
/// ephemeral stock is compensated, the reservation dead-letters.
#[tokio::test]
async fn test_fail_count_four_dead_letters() {
    let Some(ctx) = TestCtx::new().await else {
        return;
    };
    if !ctx.kafka_reachable().await {
        eprintln!("skip: kafka unreachable");
        return;
    }
    let voucher_id = ctx.seed_seckill_voucher(10).await;
    let user_id = 5;

    let mut config = ctx.config.clone();
    config.force_seckill_fail_count = 4;
    let shutdown = CancellationToken::new();
    let handles = spawn_consumers(
        &config,
        ctx.state.pool.clone(),
        ctx.state.redis.clone(),
        ctx.state.publisher.clone(),
        shutdown.clone(),
    )
    .expect("spawn consumers");

    ctx.state
        .seckill
        .reserve(voucher_id, user_id)
        .await
        .expect("admission");

    // All four attempts fail (1s + 2s + 4s backoff), then compensation
    let materialized = ctx
        .wait_for_order_count(voucher_id, user_id, 1, Duration::from_secs(15))
        .await;
    assert!(!materialized, "exhausted reservation must not materialize");

    // Compensation put the ephemeral unit back and re-allowed the user
    let mut conn = ctx.state.redis.clone();
    let stock: i64 = conn
        .get(keys::stock_key(voucher_id))
        .await
        .expect("read ephemeral stock");
    assert_eq!(stock, 10, "ephemeral stock should be compensated");

    shutdown.cancel();
    for h in handles {
        let _ = h.await;
    }
}

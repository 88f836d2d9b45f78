//! Flash-sale admission
//!
//! The precondition check reads the persistent voucher metadata; the
//! admission itself is a single server-side script execution, so stock
//! decrement and per-user dedup are atomic. No admission succeeds without
//! the script returning 0.

use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::Script;
use shared::error::{AppError, ErrorCode};
use sqlx::MySqlPool;
use std::sync::Arc;

use crate::cache::keys;
use crate::db;
use crate::error::ServiceResult;
use crate::seckill::id_worker::IdWorker;
use crate::seckill::pipeline::{self, OrderPublisher, ReservationMessage};

/// Admission script, shipped with the binary. Its text is part of the wire
/// contract: every instance must execute the same script hash.
const SECKILL_SCRIPT: &str = include_str!("seckill.lua");

/// Flash-sale reservation entrypoint
pub struct SeckillService {
    pool: MySqlPool,
    redis: ConnectionManager,
    id_worker: IdWorker,
    publisher: Arc<OrderPublisher>,
    script: Script,
}

impl SeckillService {
    pub fn new(
        pool: MySqlPool,
        redis: ConnectionManager,
        publisher: Arc<OrderPublisher>,
    ) -> Self {
        let id_worker = IdWorker::new(redis.clone());
        Self {
            pool,
            redis,
            id_worker,
            publisher,
            // Script caches the SHA1 so later calls go through EVALSHA
            script: Script::new(SECKILL_SCRIPT),
        }
    }

    /// Reserve one voucher unit for a user, returning the order id.
    ///
    /// The caller gets the id as soon as admission succeeds; the durable
    /// order row materializes asynchronously through the pipeline.
    pub async fn reserve(&self, voucher_id: i64, user_id: i64) -> ServiceResult<i64> {
        // 1. Persistent precondition check, one joined read
        let info = db::voucher::find_seckill_info(&self.pool, voucher_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::VoucherNotFound))?;
        if info.status != 1 {
            return Err(AppError::new(ErrorCode::VoucherInactive).into());
        }
        let (Some(stock), Some(begin), Some(end)) = (info.stock, info.begin_time, info.end_time)
        else {
            return Err(AppError::with_message(
                ErrorCode::VoucherNotFound,
                "Flash-sale voucher not found",
            )
            .into());
        };

        let now = Utc::now();
        if now < begin {
            return Err(AppError::new(ErrorCode::SeckillNotStarted).into());
        }
        if now > end {
            return Err(AppError::new(ErrorCode::SeckillEnded).into());
        }
        if stock <= 0 {
            return Err(AppError::new(ErrorCode::StockEmpty).into());
        }

        // 2. Atomic admission: stock decrement + user dedup in one script
        let mut conn = self.redis.clone();
        let verdict: i64 = self
            .script
            .key(keys::stock_key(voucher_id))
            .key(keys::order_set_key(voucher_id))
            .arg(user_id)
            .invoke_async(&mut conn)
            .await?;
        match verdict {
            0 => {}
            1 => return Err(AppError::new(ErrorCode::StockEmpty).into()),
            2 => return Err(AppError::new(ErrorCode::AlreadyOrdered).into()),
            other => {
                tracing::error!(voucher_id, user_id, verdict = other, "Unexpected script verdict");
                return Err(AppError::new(ErrorCode::SeckillFailed).into());
            }
        }

        // 3. Admitted: allocate the durable order id
        let order_id = match self.id_worker.next_id("order").await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(
                    voucher_id,
                    user_id,
                    error = %e,
                    "Order id allocation failed after admission, compensating"
                );
                pipeline::compensate(&self.redis, voucher_id, user_id).await;
                return Err(AppError::new(ErrorCode::SeckillFailed).into());
            }
        };

        // 4. Hand off to the durable pipeline, keyed by voucher id
        let msg = ReservationMessage::new(order_id, user_id, voucher_id, now.timestamp());
        if let Err(e) = self.publisher.publish_primary(&msg).await {
            // Accepted optimistically: admission already holds and the
            // consumers reconcile once the broker is reachable again.
            tracing::error!(
                order_id,
                voucher_id,
                user_id,
                error = %e,
                "Primary publish failed, reservation accepted optimistically"
            );
        }
        Ok(order_id)
    }
}

//! Voucher and voucher-order database operations

use chrono::{DateTime, Utc};
use shared::models::{Voucher, VoucherWithSeckill};
use sqlx::{MySql, MySqlPool, Transaction};

/// Joined voucher + flash-sale metadata used by the admission precondition
/// check. The seckill columns are nullable because regular vouchers have no
/// `tb_seckill_voucher` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SeckillInfo {
    pub id: i64,
    pub status: i32,
    pub stock: Option<i32>,
    pub begin_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Single read joining voucher metadata with flash-sale metadata
pub async fn find_seckill_info(
    pool: &MySqlPool,
    voucher_id: i64,
) -> Result<Option<SeckillInfo>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT v.id, v.status, sv.stock, sv.begin_time, sv.end_time
        FROM tb_voucher v
        LEFT JOIN tb_seckill_voucher sv ON v.id = sv.voucher_id
        WHERE v.id = ?
        "#,
    )
    .bind(voucher_id)
    .fetch_optional(pool)
    .await
}

/// Insert a voucher together with its flash-sale row in one transaction,
/// returning the generated voucher id.
pub async fn add_seckill_voucher(
    pool: &MySqlPool,
    voucher: &Voucher,
) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        r#"
        INSERT INTO tb_voucher (
            shop_id, title, sub_title, rules, pay_value, actual_value,
            type, status, create_time, update_time
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(voucher.shop_id)
    .bind(&voucher.title)
    .bind(&voucher.sub_title)
    .bind(&voucher.rules)
    .bind(voucher.pay_value)
    .bind(voucher.actual_value)
    .bind(voucher.voucher_type)
    .bind(voucher.status)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    let voucher_id = res.last_insert_id() as i64;

    sqlx::query(
        r#"
        INSERT INTO tb_seckill_voucher (
            voucher_id, stock, begin_time, end_time, create_time, update_time
        )
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(voucher_id)
    .bind(voucher.stock.unwrap_or(0))
    .bind(voucher.begin_time.unwrap_or(now))
    .bind(voucher.end_time.unwrap_or(now))
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(voucher_id)
}

/// List active vouchers of a shop with their flash-sale metadata
pub async fn query_vouchers_of_shop(
    pool: &MySqlPool,
    shop_id: i64,
) -> Result<Vec<VoucherWithSeckill>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT v.id, v.shop_id, v.title, v.sub_title, v.rules, v.pay_value,
               v.actual_value, v.type, v.status, v.create_time, v.update_time,
               sv.stock, sv.begin_time, sv.end_time
        FROM tb_voucher v
        LEFT JOIN tb_seckill_voucher sv ON v.id = sv.voucher_id
        WHERE v.shop_id = ? AND v.status = 1
        "#,
    )
    .bind(shop_id)
    .fetch_all(pool)
    .await
}

/// Insert an order row inside a caller-owned transaction.
///
/// A duplicate-primary-key error is surfaced unchanged; the pipeline maps it
/// to idempotent success via [`super::is_duplicate_key`].
pub async fn insert_order(
    tx: &mut Transaction<'_, MySql>,
    order_id: i64,
    user_id: i64,
    voucher_id: i64,
    create_time: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO tb_voucher_order (
            id, user_id, voucher_id, pay_type, status, create_time, update_time
        )
        VALUES (?, ?, ?, 1, 1, ?, ?)
        "#,
    )
    .bind(order_id)
    .bind(user_id)
    .bind(voucher_id)
    .bind(create_time)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Conditional stock decrement inside a caller-owned transaction.
///
/// Returns the number of affected rows; zero means the persistent stock is
/// exhausted and no write happened.
pub async fn decrement_stock(
    tx: &mut Transaction<'_, MySql>,
    voucher_id: i64,
) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE tb_seckill_voucher
        SET stock = stock - 1, update_time = ?
        WHERE voucher_id = ? AND stock > 0
        "#,
    )
    .bind(Utc::now())
    .bind(voucher_id)
    .execute(&mut **tx)
    .await?;
    Ok(res.rows_affected())
}

/// Reset a flash-sale window and stock (used by tests and ops tooling)
pub async fn reset_seckill_window(
    pool: &MySqlPool,
    voucher_id: i64,
    stock: i32,
    begin_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE tb_seckill_voucher
        SET stock = ?, begin_time = ?, end_time = ?, update_time = ?
        WHERE voucher_id = ?
        "#,
    )
    .bind(stock)
    .bind(begin_time)
    .bind(end_time)
    .bind(Utc::now())
    .bind(voucher_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

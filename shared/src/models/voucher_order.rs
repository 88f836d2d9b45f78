//! Voucher order model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Voucher order entity (mirrors `tb_voucher_order`)
///
/// `id` is generated by the id worker at admission time and is the
/// idempotency anchor of the order pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VoucherOrder {
    pub id: i64,
    pub user_id: i64,
    pub voucher_id: i64,
    /// 1 = balance, 2 = alipay, 3 = wechat
    pub pay_type: i32,
    /// 1 = unpaid, 2 = paid, 3 = cancelled, 4 = refunded
    pub status: i32,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

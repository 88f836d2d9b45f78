//! Voucher models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Voucher entity (mirrors `tb_voucher`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub id: i64,
    pub shop_id: i64,
    pub title: String,
    pub sub_title: String,
    pub rules: String,
    /// Amount paid, in cents
    pub pay_value: i64,
    /// Face value, in cents
    pub actual_value: i64,
    /// 0 = regular, 1 = flash-sale
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub voucher_type: i32,
    /// 1 = active, 2 = taken down, 3 = expired
    pub status: i32,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    /// Flash-sale stock, only present on creation payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    #[sqlx(skip)]
    pub stock: Option<i32>,
    /// Flash-sale window start, only present on creation payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    #[sqlx(skip)]
    pub begin_time: Option<DateTime<Utc>>,
    /// Flash-sale window end, only present on creation payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    #[sqlx(skip)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Flash-sale voucher metadata (mirrors `tb_seckill_voucher`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SeckillVoucher {
    pub voucher_id: i64,
    pub stock: i32,
    pub begin_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// Voucher joined with its flash-sale metadata, for shop listings
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VoucherWithSeckill {
    pub id: i64,
    pub shop_id: i64,
    pub title: String,
    pub sub_title: String,
    pub rules: String,
    pub pay_value: i64,
    pub actual_value: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub voucher_type: i32,
    pub status: i32,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

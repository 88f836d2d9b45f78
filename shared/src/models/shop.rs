//! Shop model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shop entity (mirrors `tb_shop`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    pub id: i64,
    pub name: String,
    /// Shop category id
    pub type_id: i64,
    /// Comma-separated image URLs
    pub images: String,
    pub area: String,
    pub address: String,
    /// Average price per person, in cents
    pub avg_price: i64,
    /// Total sales count
    pub sold: i32,
    /// Total comment count
    pub comments: i32,
    /// Rating, 1-50 (one decimal stored as integer)
    pub score: i32,
    pub open_hours: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// Shop creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopCreate {
    pub name: String,
    pub type_id: i64,
    #[serde(default)]
    pub images: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub avg_price: i64,
    #[serde(default)]
    pub open_hours: String,
}

/// Partial shop update payload
///
/// `None` fields are left untouched so read-only columns such as
/// `create_time` never get clobbered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopUpdate {
    pub id: i64,
    pub name: Option<String>,
    pub type_id: Option<i64>,
    pub images: Option<String>,
    pub area: Option<String>,
    pub address: Option<String>,
    pub avg_price: Option<i64>,
    pub sold: Option<i32>,
    pub comments: Option<i32>,
    pub score: Option<i32>,
    pub open_hours: Option<String>,
}

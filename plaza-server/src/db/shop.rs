//! Shop database operations

use chrono::Utc;
use shared::models::{Shop, ShopCreate, ShopUpdate};
use sqlx::{MySql, MySqlPool, Transaction};

const SHOP_COLUMNS: &str = "id, name, type_id, images, area, address, avg_price, \
     sold, comments, score, open_hours, create_time, update_time";

/// Fetch a shop row by id
pub async fn find_by_id(pool: &MySqlPool, id: i64) -> Result<Option<Shop>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {SHOP_COLUMNS} FROM tb_shop WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// List every shop id (Bloom filter warm-up)
pub async fn all_ids(pool: &MySqlPool) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM tb_shop ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Insert a new shop, returning its generated id
pub async fn create(pool: &MySqlPool, shop: &ShopCreate) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let res = sqlx::query(
        r#"
        INSERT INTO tb_shop (
            name, type_id, images, area, address, avg_price,
            sold, comments, score, open_hours, create_time, update_time
        )
        VALUES (?, ?, ?, ?, ?, ?, 0, 0, 0, ?, ?, ?)
        "#,
    )
    .bind(&shop.name)
    .bind(shop.type_id)
    .bind(&shop.images)
    .bind(&shop.area)
    .bind(&shop.address)
    .bind(shop.avg_price)
    .bind(&shop.open_hours)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(res.last_insert_id() as i64)
}

/// Apply a partial update inside a caller-owned transaction.
///
/// Only `Some` fields are written, so read-only columns survive.
/// Returns the number of affected rows.
pub async fn update_in_tx(
    tx: &mut Transaction<'_, MySql>,
    upd: &ShopUpdate,
) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE tb_shop SET
            name = COALESCE(?, name),
            type_id = COALESCE(?, type_id),
            images = COALESCE(?, images),
            area = COALESCE(?, area),
            address = COALESCE(?, address),
            avg_price = COALESCE(?, avg_price),
            sold = COALESCE(?, sold),
            comments = COALESCE(?, comments),
            score = COALESCE(?, score),
            open_hours = COALESCE(?, open_hours),
            update_time = ?
        WHERE id = ?
        "#,
    )
    .bind(&upd.name)
    .bind(upd.type_id)
    .bind(&upd.images)
    .bind(&upd.area)
    .bind(&upd.address)
    .bind(upd.avg_price)
    .bind(upd.sold)
    .bind(upd.comments)
    .bind(upd.score)
    .bind(&upd.open_hours)
    .bind(Utc::now())
    .bind(upd.id)
    .execute(&mut **tx)
    .await?;
    Ok(res.rows_affected())
}

/// Paged listing by shop category
pub async fn query_by_type(
    pool: &MySqlPool,
    type_id: i64,
    page: i64,
    size: i64,
) -> Result<Vec<Shop>, sqlx::Error> {
    let offset = ((page - 1) * size).max(0);
    sqlx::query_as(&format!(
        "SELECT {SHOP_COLUMNS} FROM tb_shop WHERE type_id = ? ORDER BY id ASC LIMIT ? OFFSET ?"
    ))
    .bind(type_id)
    .bind(size)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Paged listing by name substring
pub async fn query_by_name(
    pool: &MySqlPool,
    name: &str,
    page: i64,
    size: i64,
) -> Result<Vec<Shop>, sqlx::Error> {
    let offset = ((page - 1) * size).max(0);
    if name.is_empty() {
        return sqlx::query_as(&format!(
            "SELECT {SHOP_COLUMNS} FROM tb_shop ORDER BY id ASC LIMIT ? OFFSET ?"
        ))
        .bind(size)
        .bind(offset)
        .fetch_all(pool)
        .await;
    }
    sqlx::query_as(&format!(
        "SELECT {SHOP_COLUMNS} FROM tb_shop WHERE name LIKE ? ORDER BY id ASC LIMIT ? OFFSET ?"
    ))
    .bind(format!("%{name}%"))
    .bind(size)
    .bind(offset)
    .fetch_all(pool)
    .await
}

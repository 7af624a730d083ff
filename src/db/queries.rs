use sqlx::{PgPool, Row};

use crate::db::MetadataError;
use crate::models::record::{ImageRecord, Label};

/// Insert or overwrite the record for an image key (last writer wins).
pub async fn upsert_record(pool: &PgPool, record: &ImageRecord) -> Result<(), MetadataError> {
    let labels = serde_json::to_value(&record.labels)?;

    sqlx::query(
        r#"
        INSERT INTO image_records (image_key, labels, thumbnail_key, updated_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (image_key) DO UPDATE
        SET labels = EXCLUDED.labels,
            thumbnail_key = EXCLUDED.thumbnail_key,
            updated_at = NOW()
        "#,
    )
    .bind(&record.image_key)
    .bind(labels)
    .bind(&record.thumbnail_key)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the record for an image key
pub async fn get_record(
    pool: &PgPool,
    image_key: &str,
) -> Result<Option<ImageRecord>, MetadataError> {
    let row = sqlx::query(
        r#"
        SELECT image_key, labels, thumbnail_key
        FROM image_records
        WHERE image_key = $1
        "#,
    )
    .bind(image_key)
    .fetch_optional(pool)
    .await?;

    row.map(record_from_row).transpose()
}

/// List all records whose key starts with `prefix`
pub async fn list_records_with_prefix(
    pool: &PgPool,
    prefix: &str,
) -> Result<Vec<ImageRecord>, MetadataError> {
    let rows = sqlx::query(
        r#"
        SELECT image_key, labels, thumbnail_key
        FROM image_records
        WHERE image_key LIKE $1 || '%'
        ORDER BY image_key ASC
        "#,
    )
    .bind(prefix)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(record_from_row).collect()
}

/// Delete the record for an image key. A missing record is not an error.
pub async fn delete_record(pool: &PgPool, image_key: &str) -> Result<(), MetadataError> {
    sqlx::query(
        r#"
        DELETE FROM image_records
        WHERE image_key = $1
        "#,
    )
    .bind(image_key)
    .execute(pool)
    .await?;

    Ok(())
}

fn record_from_row(row: sqlx::postgres::PgRow) -> Result<ImageRecord, MetadataError> {
    let labels_value: serde_json::Value = row.try_get("labels").map_err(MetadataError::Sqlx)?;
    let labels: Vec<Label> = serde_json::from_value(labels_value)?;

    Ok(ImageRecord {
        image_key: row.try_get("image_key").map_err(MetadataError::Sqlx)?,
        labels,
        thumbnail_key: row.try_get("thumbnail_key").map_err(MetadataError::Sqlx)?,
    })
}

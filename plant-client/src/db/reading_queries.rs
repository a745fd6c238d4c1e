use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::{UnitReading, UnitReadingDraft};

const READING_COLUMNS: &str = r#"
    id,
    plant_id,
    unit_id,
    power,
    current_l1,
    current_l2,
    current_l3,
    current_avg,
    voltage_l12,
    voltage_l23,
    voltage_l13,
    voltage_avg,
    energy,
    runtime,
    ts
"#;

/// Insert one reading and return the id assigned by the database.
pub async fn insert_reading(
    pool: &PgPool,
    draft: &UnitReadingDraft,
    ts: OffsetDateTime,
) -> Result<i64, sqlx::Error> {
    let m = &draft.measurements;
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO unit_readings (
            plant_id, unit_id, power,
            current_l1, current_l2, current_l3, current_avg,
            voltage_l12, voltage_l23, voltage_l13, voltage_avg,
            energy, runtime, ts
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING id
        "#,
    )
    .bind(draft.plant_id)
    .bind(draft.unit_id)
    .bind(m.power)
    .bind(m.current_l1)
    .bind(m.current_l2)
    .bind(m.current_l3)
    .bind(m.current_avg)
    .bind(m.voltage_l12)
    .bind(m.voltage_l23)
    .bind(m.voltage_l13)
    .bind(m.voltage_avg)
    .bind(m.energy)
    .bind(m.runtime)
    .bind(ts)
    .fetch_one(pool)
    .await
}

/// Most recent reading for one unit at or after `since`.
pub async fn latest_reading(
    pool: &PgPool,
    plant_id: i32,
    unit_id: i32,
    since: OffsetDateTime,
) -> Result<Option<UnitReading>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {READING_COLUMNS}
        FROM unit_readings
        WHERE plant_id = $1
          AND unit_id = $2
          AND ts >= $3
        ORDER BY ts DESC, id DESC
        LIMIT 1
        "#
    );

    sqlx::query_as::<_, UnitReading>(&sql)
        .bind(plant_id)
        .bind(unit_id)
        .bind(since)
        .fetch_optional(pool)
        .await
}

/// Time-ordered readings of every unit of a plant at or after `since`.
pub async fn readings_since(
    pool: &PgPool,
    plant_id: i32,
    since: OffsetDateTime,
) -> Result<Vec<UnitReading>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {READING_COLUMNS}
        FROM unit_readings
        WHERE plant_id = $1
          AND ts >= $2
        ORDER BY ts, id
        "#
    );

    sqlx::query_as::<_, UnitReading>(&sql)
        .bind(plant_id)
        .bind(since)
        .fetch_all(pool)
        .await
}

/// Delete a plant's readings strictly older than `cutoff`, returning how many went.
pub async fn delete_readings_before(
    pool: &PgPool,
    plant_id: i32,
    cutoff: OffsetDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM unit_readings WHERE plant_id = $1 AND ts < $2")
        .bind(plant_id)
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

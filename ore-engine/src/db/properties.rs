//! Property and legal event persistence

use crate::db::max_lock_wait_ms;
use crate::models::{parse_timestamp, parse_uuid, LegalEvent, Property};
use crate::utils::retry_on_lock;
use ore_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Upsert a property by its identity key; returns the stored row's id
///
/// A property seen again keeps its original id. A missing owner never clears
/// an existing link.
pub async fn save_property(pool: &SqlitePool, property: &Property) -> Result<Uuid> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let identity_key = property.identity_key();
    let id = property.id.to_string();
    let owner_id = property.owner_id.map(|o| o.to_string());
    let updated_at = property.updated_at.to_rfc3339();

    let stored_id: String = retry_on_lock("save_property", max_wait_ms, || async {
        let stored: (String,) = sqlx::query_as(
            r#"
            INSERT INTO properties (
                id, identity_key, owner_id, parcel_id, address, property_type,
                beds, baths, sqft, year_built, assessed_value, estimated_value,
                last_sale_date, last_sale_price, source, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(identity_key) DO UPDATE SET
                owner_id = COALESCE(excluded.owner_id, properties.owner_id),
                parcel_id = COALESCE(excluded.parcel_id, properties.parcel_id),
                address = excluded.address,
                property_type = COALESCE(excluded.property_type, properties.property_type),
                beds = COALESCE(excluded.beds, properties.beds),
                baths = COALESCE(excluded.baths, properties.baths),
                sqft = COALESCE(excluded.sqft, properties.sqft),
                year_built = COALESCE(excluded.year_built, properties.year_built),
                assessed_value = COALESCE(excluded.assessed_value, properties.assessed_value),
                estimated_value = COALESCE(excluded.estimated_value, properties.estimated_value),
                last_sale_date = COALESCE(excluded.last_sale_date, properties.last_sale_date),
                last_sale_price = COALESCE(excluded.last_sale_price, properties.last_sale_price),
                source = excluded.source,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&id)
        .bind(&identity_key)
        .bind(&owner_id)
        .bind(&property.parcel_id)
        .bind(&property.address)
        .bind(&property.property_type)
        .bind(property.beds.map(i64::from))
        .bind(property.baths)
        .bind(property.sqft.map(i64::from))
        .bind(property.year_built.map(i64::from))
        .bind(property.assessed_value)
        .bind(property.estimated_value)
        .bind(&property.last_sale_date)
        .bind(property.last_sale_price)
        .bind(&property.source)
        .bind(&updated_at)
        .fetch_one(pool)
        .await?;
        Ok(stored.0)
    })
    .await?;

    parse_uuid("id", &stored_id)
}

fn property_from_row(row: &SqliteRow) -> Result<Property> {
    let id: String = row.get("id");
    let owner_id: Option<String> = row.get("owner_id");
    let updated_at: String = row.get("updated_at");
    let as_u32 = |column: &str| row.get::<Option<i64>, _>(column).map(|v| v.max(0) as u32);

    Ok(Property {
        id: parse_uuid("id", &id)?,
        owner_id: owner_id.map(|o| parse_uuid("owner_id", &o)).transpose()?,
        parcel_id: row.get("parcel_id"),
        address: row.get("address"),
        property_type: row.get("property_type"),
        beds: as_u32("beds"),
        baths: row.get("baths"),
        sqft: as_u32("sqft"),
        year_built: as_u32("year_built"),
        assessed_value: row.get("assessed_value"),
        estimated_value: row.get("estimated_value"),
        last_sale_date: row.get("last_sale_date"),
        last_sale_price: row.get("last_sale_price"),
        source: row.get("source"),
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

pub async fn load_properties_for_owner(pool: &SqlitePool, owner_id: Uuid) -> Result<Vec<Property>> {
    let rows = sqlx::query("SELECT * FROM properties WHERE owner_id = ? ORDER BY address")
        .bind(owner_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(property_from_row).collect()
}

/// Append a legal event; an already-recorded external reference is ignored
///
/// Returns whether a row was inserted.
pub async fn append_legal_event(pool: &SqlitePool, event: &LegalEvent) -> Result<bool> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let id = event.id.to_string();
    let owner_id = event.owner_id.map(|o| o.to_string());
    let property_id = event.property_id.map(|p| p.to_string());
    let recorded_at = event.recorded_at.to_rfc3339();

    retry_on_lock("append_legal_event", max_wait_ms, || async {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO legal_events (
                id, owner_id, property_id, kind, external_ref, filed_on,
                amount, description, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&owner_id)
        .bind(&property_id)
        .bind(&event.kind)
        .bind(&event.external_ref)
        .bind(&event.filed_on)
        .bind(event.amount)
        .bind(&event.description)
        .bind(&recorded_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    })
    .await
}

pub async fn load_legal_events_for_owner(pool: &SqlitePool, owner_id: Uuid) -> Result<Vec<LegalEvent>> {
    let rows = sqlx::query(
        "SELECT * FROM legal_events WHERE owner_id = ? ORDER BY filed_on DESC, external_ref",
    )
    .bind(owner_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.get("id");
            let owner_id: Option<String> = row.get("owner_id");
            let property_id: Option<String> = row.get("property_id");
            let recorded_at: String = row.get("recorded_at");
            Ok(LegalEvent {
                id: parse_uuid("id", &id)?,
                owner_id: owner_id.map(|o| parse_uuid("owner_id", &o)).transpose()?,
                property_id: property_id.map(|p| parse_uuid("property_id", &p)).transpose()?,
                kind: row.get("kind"),
                external_ref: row.get("external_ref"),
                filed_on: row.get("filed_on"),
                amount: row.get("amount"),
                description: row.get("description"),
                recorded_at: parse_timestamp("recorded_at", &recorded_at)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_pool;
    use crate::providers::{LegalEventRecord, PropertyRecord};

    #[tokio::test]
    async fn test_property_upsert_keeps_id_and_owner() {
        let (_dir, pool) = temp_pool().await;
        let owner = Uuid::new_v4();
        let record = PropertyRecord {
            parcel_id: Some("R-100".to_string()),
            address: "12 Main St, Austin, TX 78701".to_string(),
            assessed_value: Some(250_000),
            source: "county".to_string(),
            ..Default::default()
        };

        let first = save_property(&pool, &Property::from_record(&record, Some(owner)))
            .await
            .unwrap();
        let mut update = record.clone();
        update.assessed_value = None;
        update.estimated_value = Some(310_000);
        let second = save_property(&pool, &Property::from_record(&update, None))
            .await
            .unwrap();
        assert_eq!(first, second);

        let stored = load_properties_for_owner(&pool, owner).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].assessed_value, Some(250_000));
        assert_eq!(stored[0].estimated_value, Some(310_000));
    }

    #[tokio::test]
    async fn test_legal_events_append_only() {
        let (_dir, pool) = temp_pool().await;
        let owner = Uuid::new_v4();
        let record = LegalEventRecord {
            kind: "Lien".to_string(),
            external_ref: "TX-2024-001".to_string(),
            filed_on: Some("2024-03-01".to_string()),
            amount: Some(1200.0),
            description: None,
        };

        assert!(append_legal_event(&pool, &LegalEvent::from_record(&record, Some(owner), None))
            .await
            .unwrap());
        let mut changed = record.clone();
        changed.amount = Some(9999.0);
        assert!(!append_legal_event(&pool, &LegalEvent::from_record(&changed, Some(owner), None))
            .await
            .unwrap());

        let events = load_legal_events_for_owner(&pool, owner).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].amount, Some(1200.0));
        assert_eq!(events[0].kind, "lien");
    }
}

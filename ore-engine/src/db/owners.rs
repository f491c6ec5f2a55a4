//! Owner, contact and owner-entity link persistence

use crate::classifier::{normalize_name, person_key};
use crate::db::{from_json, max_lock_wait_ms, to_json};
use crate::models::{parse_timestamp, parse_uuid, ContactInfo, Demographics, Owner, OwnerLlcLink, OwnerType};
use crate::providers::ContactKind;
use crate::utils::retry_on_lock;
use ore_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Lookup key for finding an owner by name
pub fn owner_name_key(name: &str, owner_type: OwnerType) -> String {
    match owner_type {
        OwnerType::Individual => person_key(name),
        OwnerType::Entity => normalize_name(name).replace(',', ""),
    }
}

/// Insert or update an owner
///
/// Unless `type_verified` is set, the stored type is re-derived from the name.
/// Demographics are only kept for individuals. Returns the stored type.
pub async fn save_owner(pool: &SqlitePool, owner: &Owner) -> Result<OwnerType> {
    let owner_type = owner.effective_type();
    let id = owner.id.to_string();
    let name_key = owner_name_key(&owner.name, owner_type);
    let aka_names = to_json("aka_names", &owner.aka_names)?;
    let risk_flags = to_json("risk_flags", &owner.risk_flags)?;
    let demographics = match (owner_type, &owner.demographics) {
        (OwnerType::Individual, Some(d)) => Some(to_json("demographics", d)?),
        _ => None,
    };
    let created_at = owner.created_at.to_rfc3339();
    let updated_at = chrono::Utc::now().to_rfc3339();
    let max_wait_ms = max_lock_wait_ms(pool).await;

    retry_on_lock("save_owner", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO owners (
                id, owner_type, name, name_key, aka_names, primary_address,
                mailing_address, jurisdiction, company_domain, risk_flags,
                seller_intent_score, contact_confidence, demographics,
                type_verified, source, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                owner_type = excluded.owner_type,
                name = excluded.name,
                name_key = excluded.name_key,
                aka_names = excluded.aka_names,
                primary_address = excluded.primary_address,
                mailing_address = excluded.mailing_address,
                jurisdiction = excluded.jurisdiction,
                company_domain = excluded.company_domain,
                risk_flags = excluded.risk_flags,
                seller_intent_score = excluded.seller_intent_score,
                contact_confidence = excluded.contact_confidence,
                demographics = excluded.demographics,
                type_verified = excluded.type_verified,
                source = excluded.source,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(owner_type.as_str())
        .bind(&owner.name)
        .bind(&name_key)
        .bind(&aka_names)
        .bind(&owner.primary_address)
        .bind(&owner.mailing_address)
        .bind(&owner.jurisdiction)
        .bind(&owner.company_domain)
        .bind(&risk_flags)
        .bind(owner.seller_intent_score.map(i64::from))
        .bind(owner.contact_confidence.map(i64::from))
        .bind(&demographics)
        .bind(owner.type_verified)
        .bind(&owner.source)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await?;

    Ok(owner_type)
}

fn owner_from_row(row: &SqliteRow) -> Result<Owner> {
    let id: String = row.get("id");
    let owner_type: String = row.get("owner_type");
    let aka_names: String = row.get("aka_names");
    let risk_flags: String = row.get("risk_flags");
    let demographics: Option<String> = row.get("demographics");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Owner {
        id: parse_uuid("id", &id)?,
        owner_type: owner_type.parse().map_err(Error::Internal)?,
        name: row.get("name"),
        aka_names: from_json("aka_names", &aka_names)?,
        primary_address: row.get("primary_address"),
        mailing_address: row.get("mailing_address"),
        jurisdiction: row.get("jurisdiction"),
        company_domain: row.get("company_domain"),
        risk_flags: from_json("risk_flags", &risk_flags)?,
        seller_intent_score: row
            .get::<Option<i64>, _>("seller_intent_score")
            .map(|v| v.clamp(0, 100) as u8),
        contact_confidence: row
            .get::<Option<i64>, _>("contact_confidence")
            .map(|v| v.clamp(0, 100) as u8),
        demographics: demographics
            .map(|d| from_json::<Demographics>("demographics", &d))
            .transpose()?,
        type_verified: row.get("type_verified"),
        source: row.get("source"),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

pub async fn load_owner(pool: &SqlitePool, id: Uuid) -> Result<Option<Owner>> {
    let row = sqlx::query("SELECT * FROM owners WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(owner_from_row).transpose()
}

/// Owner with this name and type, if one was stored before
pub async fn find_owner_by_name(
    pool: &SqlitePool,
    name: &str,
    owner_type: OwnerType,
) -> Result<Option<Owner>> {
    let row = sqlx::query(
        "SELECT * FROM owners WHERE name_key = ? AND owner_type = ? ORDER BY created_at LIMIT 1",
    )
    .bind(owner_name_key(name, owner_type))
    .bind(owner_type.as_str())
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(owner_from_row).transpose()
}

/// Insert a contact or, on (owner, kind, normalized value) collision, keep the
/// higher-confidence value and source
pub async fn save_contact(pool: &SqlitePool, contact: &ContactInfo) -> Result<()> {
    if contact.normalized_value.is_empty() {
        return Ok(());
    }
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let id = contact.id.to_string();
    let owner_id = contact.owner_id.to_string();
    let updated_at = contact.updated_at.to_rfc3339();

    retry_on_lock("save_contact", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO contact_info (
                id, owner_id, kind, value, normalized_value, source, confidence, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner_id, kind, normalized_value) DO UPDATE SET
                value = CASE WHEN excluded.confidence > contact_info.confidence
                             THEN excluded.value ELSE contact_info.value END,
                source = CASE WHEN excluded.confidence > contact_info.confidence
                              THEN excluded.source ELSE contact_info.source END,
                confidence = MAX(contact_info.confidence, excluded.confidence),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&owner_id)
        .bind(contact.kind.as_str())
        .bind(&contact.value)
        .bind(&contact.normalized_value)
        .bind(&contact.source)
        .bind(i64::from(contact.confidence))
        .bind(&updated_at)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

/// Contacts of one owner, highest confidence first
pub async fn load_contacts(pool: &SqlitePool, owner_id: Uuid) -> Result<Vec<ContactInfo>> {
    let rows = sqlx::query(
        "SELECT * FROM contact_info WHERE owner_id = ? ORDER BY confidence DESC, kind, value",
    )
    .bind(owner_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.get("id");
            let owner_id: String = row.get("owner_id");
            let kind: String = row.get("kind");
            let updated_at: String = row.get("updated_at");
            Ok(ContactInfo {
                id: parse_uuid("id", &id)?,
                owner_id: parse_uuid("owner_id", &owner_id)?,
                kind: ContactKind::parse(&kind)
                    .ok_or_else(|| Error::Internal(format!("Unknown contact kind: {}", kind)))?,
                value: row.get("value"),
                normalized_value: row.get("normalized_value"),
                source: row.get("source"),
                confidence: row.get::<i64, _>("confidence").clamp(0, 100) as u8,
                updated_at: parse_timestamp("updated_at", &updated_at)?,
            })
        })
        .collect()
}

/// Upsert an individual -> entity edge
pub async fn save_owner_llc_link(pool: &SqlitePool, link: &OwnerLlcLink) -> Result<()> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let individual_id = link.individual_id.to_string();
    let entity_id = link.entity_id.to_string();
    let updated_at = link.updated_at.to_rfc3339();

    retry_on_lock("save_owner_llc_link", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO owner_llc_links (
                individual_id, entity_id, relationship, confidence, rationale, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(individual_id, entity_id) DO UPDATE SET
                relationship = excluded.relationship,
                confidence = excluded.confidence,
                rationale = excluded.rationale,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&individual_id)
        .bind(&entity_id)
        .bind(&link.relationship)
        .bind(i64::from(link.confidence))
        .bind(&link.rationale)
        .bind(&updated_at)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

/// Edges pointing at `entity_id`
pub async fn load_links_for_entity(pool: &SqlitePool, entity_id: Uuid) -> Result<Vec<OwnerLlcLink>> {
    let rows = sqlx::query(
        "SELECT * FROM owner_llc_links WHERE entity_id = ? ORDER BY confidence DESC",
    )
    .bind(entity_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let individual_id: String = row.get("individual_id");
            let entity_id: String = row.get("entity_id");
            let updated_at: String = row.get("updated_at");
            Ok(OwnerLlcLink {
                individual_id: parse_uuid("individual_id", &individual_id)?,
                entity_id: parse_uuid("entity_id", &entity_id)?,
                relationship: row.get("relationship"),
                confidence: row.get::<i64, _>("confidence").clamp(0, 100) as u8,
                rationale: row.get("rationale"),
                updated_at: parse_timestamp("updated_at", &updated_at)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_pool;

    #[tokio::test]
    async fn test_owner_type_rederived_unless_verified() {
        let (_dir, pool) = temp_pool().await;

        let mut owner = Owner::new("ACME HOLDINGS LLC", Some("test"));
        owner.owner_type = OwnerType::Individual;
        owner.demographics = Some(Demographics {
            age: Some(50),
            ..Default::default()
        });
        assert_eq!(save_owner(&pool, &owner).await.unwrap(), OwnerType::Entity);

        let loaded = load_owner(&pool, owner.id).await.unwrap().unwrap();
        assert_eq!(loaded.owner_type, OwnerType::Entity);
        assert!(loaded.demographics.is_none());

        owner.type_verified = true;
        save_owner(&pool, &owner).await.unwrap();
        let loaded = load_owner(&pool, owner.id).await.unwrap().unwrap();
        assert_eq!(loaded.owner_type, OwnerType::Individual);
        assert_eq!(loaded.demographics.and_then(|d| d.age), Some(50));
    }

    #[tokio::test]
    async fn test_find_owner_by_name_uses_person_key() {
        let (_dir, pool) = temp_pool().await;
        let owner = Owner::new("John A. Smith", None);
        save_owner(&pool, &owner).await.unwrap();

        let found = find_owner_by_name(&pool, "SMITH, JOHN A", OwnerType::Individual)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, owner.id);
        assert!(find_owner_by_name(&pool, "John A Smith", OwnerType::Entity)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_contact_dedup_keeps_higher_confidence() {
        let (_dir, pool) = temp_pool().await;
        let owner = Owner::new("JOHN SMITH", None);
        save_owner(&pool, &owner).await.unwrap();

        let low = ContactInfo::new(owner.id, ContactKind::Phone, "(555) 123-4567", "cheap", 60);
        let high = ContactInfo::new(owner.id, ContactKind::Phone, "+1 555 123 4567", "premium", 90);
        let lower = ContactInfo::new(owner.id, ContactKind::Phone, "555.123.4567", "noisy", 40);
        let email = ContactInfo::new(owner.id, ContactKind::Email, " John@Example.com ", "cheap", 70);
        for contact in [&low, &high, &lower, &email] {
            save_contact(&pool, contact).await.unwrap();
        }

        let contacts = load_contacts(&pool, owner.id).await.unwrap();
        assert_eq!(contacts.len(), 2);
        let phone = contacts.iter().find(|c| c.kind == ContactKind::Phone).unwrap();
        assert_eq!(phone.confidence, 90);
        assert_eq!(phone.source, "premium");
        assert_eq!(phone.normalized_value, "5551234567");
        let email = contacts.iter().find(|c| c.kind == ContactKind::Email).unwrap();
        assert_eq!(email.normalized_value, "john@example.com");
    }

    #[tokio::test]
    async fn test_link_upsert_by_pair() {
        let (_dir, pool) = temp_pool().await;
        let person = Uuid::new_v4();
        let entity = Uuid::new_v4();
        let mut link = OwnerLlcLink {
            individual_id: person,
            entity_id: entity,
            relationship: "manager".to_string(),
            confidence: 70,
            rationale: None,
            updated_at: chrono::Utc::now(),
        };
        save_owner_llc_link(&pool, &link).await.unwrap();
        link.relationship = "beneficial owner".to_string();
        link.confidence = 85;
        save_owner_llc_link(&pool, &link).await.unwrap();

        let links = load_links_for_entity(&pool, entity).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].relationship, "beneficial owner");
        assert_eq!(links[0].confidence, 85);
    }
}

//! # Reference Data Repository
//!
//! Local mirror of the remote authority's lookup collections: customers,
//! products, operators, and vehicle plates. Rows are written exclusively by
//! reference sync (upsert by remote id); operator actions only ever read.

use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use scalehouse_core::ReferenceKind;

/// A mirrored reference row as handed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub remote_id: String,
    pub name: String,
    /// Registered empty-vehicle weight in kg. Only meaningful for vehicles;
    /// zero for every other kind.
    pub weight_hint: i64,
}

/// Repository for mirrored reference data.
#[derive(Debug, Clone)]
pub struct ReferenceRepository {
    pool: SqlitePool,
}

impl ReferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReferenceRepository { pool }
    }

    fn table(kind: ReferenceKind) -> &'static str {
        match kind {
            ReferenceKind::Customer => "ref_customers",
            ReferenceKind::Product => "ref_products",
            ReferenceKind::Operator => "ref_operators",
            ReferenceKind::Vehicle => "ref_vehicles",
        }
    }

    /// Inserts or overwrites a mirrored row, keyed by its remote id.
    pub async fn upsert(
        &self,
        kind: ReferenceKind,
        remote_id: &str,
        name: &str,
        weight_hint: i64,
    ) -> DbResult<()> {
        let sql = if kind == ReferenceKind::Vehicle {
            format!(
                r#"
                INSERT INTO {} (remote_id, name, weight_hint) VALUES (?, ?, ?)
                ON CONFLICT (remote_id) DO UPDATE SET name = excluded.name,
                    weight_hint = excluded.weight_hint
                "#,
                Self::table(kind)
            )
        } else {
            format!(
                r#"
                INSERT INTO {} (remote_id, name) VALUES (?, ?)
                ON CONFLICT (remote_id) DO UPDATE SET name = excluded.name
                "#,
                Self::table(kind)
            )
        };

        let mut query = sqlx::query(&sql).bind(remote_id).bind(name);
        if kind == ReferenceKind::Vehicle {
            query = query.bind(weight_hint);
        }
        query.execute(&self.pool).await?;

        debug!(%kind, remote_id, "Upserted reference row");
        Ok(())
    }

    /// Lists all rows of a kind, sorted by display name.
    pub async fn list(&self, kind: ReferenceKind) -> DbResult<Vec<ReferenceEntry>> {
        let weight_col = if kind == ReferenceKind::Vehicle {
            "weight_hint"
        } else {
            "0 AS weight_hint"
        };
        let rows = sqlx::query(&format!(
            "SELECT remote_id, name, {} FROM {} ORDER BY name ASC",
            weight_col,
            Self::table(kind)
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(ReferenceEntry {
                    remote_id: r.try_get("remote_id")?,
                    name: r.try_get("name")?,
                    weight_hint: r.try_get("weight_hint")?,
                })
            })
            .collect()
    }

    /// Lists just the display names of a kind, sorted, for selection lists.
    pub async fn list_names(&self, kind: ReferenceKind) -> DbResult<Vec<String>> {
        let rows = sqlx::query(&format!(
            "SELECT name FROM {} ORDER BY name ASC",
            Self::table(kind)
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|r| Ok(r.try_get("name")?)).collect()
    }

    /// Returns the registered empty weight for a plate, if the plate is known.
    pub async fn vehicle_weight_hint(&self, plate: &str) -> DbResult<Option<i64>> {
        let row = sqlx::query("SELECT weight_hint FROM ref_vehicles WHERE name = ?")
            .bind(plate)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(r) => Some(r.try_get("weight_hint")?),
            None => None,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn upsert_overwrites_by_remote_id() {
        let db = test_db().await;
        let repo = db.references();

        repo.upsert(ReferenceKind::Customer, "c-1", "PT AGRO", 0)
            .await
            .unwrap();
        repo.upsert(ReferenceKind::Customer, "c-1", "PT AGRO LESTARI", 0)
            .await
            .unwrap();

        let names = repo.list_names(ReferenceKind::Customer).await.unwrap();
        assert_eq!(names, vec!["PT AGRO LESTARI".to_string()]);
    }

    #[tokio::test]
    async fn kinds_are_isolated() {
        let db = test_db().await;
        let repo = db.references();

        repo.upsert(ReferenceKind::Product, "p-1", "COMPOST", 0)
            .await
            .unwrap();

        assert_eq!(repo.list_names(ReferenceKind::Product).await.unwrap().len(), 1);
        assert!(repo.list_names(ReferenceKind::Customer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn vehicle_rows_keep_their_weight_hint() {
        let db = test_db().await;
        let repo = db.references();

        repo.upsert(ReferenceKind::Vehicle, "v-1", "N 1234 AB", 7500)
            .await
            .unwrap();

        assert_eq!(
            repo.vehicle_weight_hint("N 1234 AB").await.unwrap(),
            Some(7500)
        );
        assert_eq!(repo.vehicle_weight_hint("N 0 X").await.unwrap(), None);

        let entries = repo.list(ReferenceKind::Vehicle).await.unwrap();
        assert_eq!(entries[0].weight_hint, 7500);
    }
}

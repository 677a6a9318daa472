//! Read-only source of raw client visit rows.
//!
//! The pipeline only needs `(city, county, state, client_id)` rows for one
//! region with a non-null city. [`RecordSource`] is that contract;
//! [`PostgresVisitSource`] fulfils it with a single raw query.

use async_trait::async_trait;
use client_map_visit_models::VisitRecord;
use moosicbox_json_utils::database::ToValue as _;
use regex::Regex;
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// Supplies the visit rows for a region.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Returns every visit row whose state matches `region`
    /// (case-insensitive) and whose city is not null.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the source cannot be read.
    async fn fetch_visits(&self, region: &str) -> Result<Vec<VisitRecord>, DbError>;
}

/// Table and column names for the visit query.
#[derive(Debug, Clone)]
pub struct VisitTable {
    /// Table holding one row per client visit.
    pub table: String,
    /// Column holding the client identifier.
    pub client_id_column: String,
}

impl VisitTable {
    /// Validates both names as plain (optionally schema-qualified) SQL
    /// identifiers, since they are interpolated into the query text.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidIdentifier`] for the first name that is not
    /// a plain identifier.
    pub fn new(table: &str, client_id_column: &str) -> Result<Self, DbError> {
        validate_identifier(table)?;
        validate_identifier(client_id_column)?;
        Ok(Self {
            table: table.to_string(),
            client_id_column: client_id_column.to_string(),
        })
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT city, county, state, {client_id}::text AS client_id
             FROM {table}
             WHERE state ILIKE $1
               AND city IS NOT NULL",
            client_id = self.client_id_column,
            table = self.table,
        )
    }
}

fn validate_identifier(identifier: &str) -> Result<(), DbError> {
    let re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .unwrap_or_else(|_| unreachable!());
    if re.is_match(identifier) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// Escapes `ILIKE` wildcards so the region code is matched literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// [`RecordSource`] backed by a `PostgreSQL` visit table.
pub struct PostgresVisitSource {
    db: Box<dyn Database>,
    table: VisitTable,
}

impl PostgresVisitSource {
    #[must_use]
    pub fn new(db: Box<dyn Database>, table: VisitTable) -> Self {
        Self { db, table }
    }
}

#[async_trait]
impl RecordSource for PostgresVisitSource {
    async fn fetch_visits(&self, region: &str) -> Result<Vec<VisitRecord>, DbError> {
        let sql = self.table.select_sql();
        log::debug!("Visit query: {sql}");

        let rows = self
            .db
            .query_raw_params(&sql, &[DatabaseValue::String(escape_like(region))])
            .await?;

        let mut visits = Vec::with_capacity(rows.len());
        for row in &rows {
            let city: Option<String> = row.to_value("city").map_err(|e| DbError::Conversion {
                message: format!("Failed to read city: {e}"),
            })?;
            let county: Option<String> =
                row.to_value("county").map_err(|e| DbError::Conversion {
                    message: format!("Failed to read county: {e}"),
                })?;
            let state: String = row.to_value("state").map_err(|e| DbError::Conversion {
                message: format!("Failed to read state: {e}"),
            })?;
            let client_id: String =
                row.to_value("client_id").map_err(|e| DbError::Conversion {
                    message: format!("Failed to read client_id: {e}"),
                })?;

            visits.push(VisitRecord {
                city,
                county,
                state,
                client_id,
            });
        }

        Ok(visits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(VisitTable::new("client_visit", "orig_client_id").is_ok());
        assert!(VisitTable::new("public.client_visit", "client_id").is_ok());
    }

    #[test]
    fn rejects_injection_attempts() {
        for bad in ["client_visit; DROP TABLE x", "a b", "1table", "", "a.b.c"] {
            assert!(
                matches!(
                    VisitTable::new(bad, "orig_client_id"),
                    Err(DbError::InvalidIdentifier { .. })
                ),
                "accepted {bad:?}"
            );
        }
        assert!(VisitTable::new("client_visit", "id--").is_err());
    }

    #[test]
    fn select_sql_uses_configured_names() {
        let table = VisitTable::new("visits", "client").unwrap();
        let sql = table.select_sql();
        assert!(sql.contains("FROM visits"));
        assert!(sql.contains("client::text AS client_id"));
        assert!(sql.contains("state ILIKE $1"));
        assert!(sql.contains("city IS NOT NULL"));
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("NJ"), "NJ");
        assert_eq!(escape_like("N_"), "N\\_");
        assert_eq!(escape_like("%"), "\\%");
    }
}

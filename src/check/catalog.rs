use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// One column as reported by the live storage catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backend has no usable catalog interface for this lookup.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("catalog query failed: {0}")]
    Db(#[from] sea_orm::DbErr),
}

/// Read-only view onto the live storage's column catalog.
///
/// The checker talks to storage exclusively through this seam so that
/// drift scenarios can be exercised against a simulated catalog.
#[async_trait]
pub trait ColumnCatalog: Send + Sync {
    /// Lists the columns of `table` from the catalog interface.
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, CatalogError>;

    /// Proves `column` exists on `table` by projecting zero rows of it.
    async fn probe_column(&self, table: &str, column: &str) -> Result<(), CatalogError>;
}

/// Catalog backed by a live `DatabaseConnection`.
pub struct DbCatalog {
    db: Arc<DatabaseConnection>,
}

impl DbCatalog {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn information_schema_columns(
        &self,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, CatalogError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT column_name, data_type, is_nullable \
             FROM information_schema.columns WHERE table_name = $1",
            [table.into()],
        );

        let rows = self.db.query_all(stmt).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("", "column_name")?;
            let data_type: String = row.try_get("", "data_type")?;
            let nullable: String = row.try_get("", "is_nullable")?;
            columns.push(ColumnInfo {
                name,
                data_type,
                is_nullable: nullable.eq_ignore_ascii_case("yes"),
            });
        }
        Ok(columns)
    }

    async fn pragma_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, CatalogError> {
        // PRAGMA arguments cannot be bound; the table name comes from the
        // registry, not caller input.
        let stmt = Statement::from_string(
            DbBackend::Sqlite,
            format!("PRAGMA table_info(\"{table}\")"),
        );

        let rows = self.db.query_all(stmt).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("", "name")?;
            let data_type: String = row.try_get("", "type")?;
            let notnull: i32 = row.try_get("", "notnull").unwrap_or(0);
            columns.push(ColumnInfo {
                name,
                data_type,
                is_nullable: notnull == 0,
            });
        }
        Ok(columns)
    }
}

#[async_trait]
impl ColumnCatalog for DbCatalog {
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, CatalogError> {
        let backend = self.db.get_database_backend();
        debug!(?backend, table, "listing catalog columns");
        let columns = match backend {
            DbBackend::Postgres => self.information_schema_columns(table).await?,
            DbBackend::Sqlite => self.pragma_columns(table).await?,
            other => {
                return Err(CatalogError::Unavailable(format!(
                    "no catalog interface for backend {other:?}"
                )))
            }
        };
        if columns.is_empty() {
            // An absent table and an empty catalog look identical here;
            // either way the expected columns are missing.
            return Err(CatalogError::Unavailable(format!(
                "catalog lists no columns for table {table}"
            )));
        }
        Ok(columns)
    }

    async fn probe_column(&self, table: &str, column: &str) -> Result<(), CatalogError> {
        let backend = self.db.get_database_backend();
        let stmt = Statement::from_string(
            backend,
            format!("SELECT \"{column}\" FROM \"{table}\" WHERE 1 = 0"),
        );
        self.db.query_all(stmt).await?;
        Ok(())
    }
}

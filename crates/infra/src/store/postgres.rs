//! Postgres-backed inventory store.
//!
//! ## Error Mapping
//!
//! | SQLx Error                       | PostgreSQL Code | StoreError    |
//! |----------------------------------|-----------------|---------------|
//! | Database (unique violation)      | `23505`         | `Unique`      |
//! | Database (foreign key violation) | `23503`         | `ForeignKey`  |
//! | Database (other)                 | any other       | `Backend`     |
//! | PoolTimedOut / PoolClosed / Io   | N/A             | `Unavailable` |
//! | Other                            | N/A             | `Backend`     |
//!
//! ## Concurrency
//!
//! Batch registration inserts inside one transaction. Provisioning takes a row
//! lock on the product (`SELECT ... FOR UPDATE`) before reading its codes, so
//! two provisioning runs for the same product serialize instead of racing for
//! the same suffixes. Stock snapshots read under `REPEATABLE READ`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgDatabaseError, PgPoolOptions};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use serialtrack_catalog::{Category, CategoryLabel, Product, SearchTerm, Sku};
use serialtrack_core::{CategoryId, DomainError, ProductId, SerialId};
use serialtrack_serials::{
    ProvisionPlan, SerialCode, SerialHistoryEntry, SerialState, SerialUnit, TransitionSerial,
};
use serialtrack_stock::{LastActivity, StateCountRow, StockSnapshot};

use super::{InventoryStore, ProductMatch, StoreError};
use crate::config::DatabaseConfig;

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool and bring the schema up to date.
    #[instrument(skip(config), fields(max_connections = config.max_connections), err)]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
    }

    async fn begin(&self, operation: &str) -> Result<Transaction<'_, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (id, label) VALUES ($1, $2)")
            .bind(category.id.as_uuid())
            .bind(category.label.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows: Vec<CategoryRow> = sqlx::query_as("SELECT id, label FROM categories ORDER BY label")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;

        rows.into_iter().map(Category::try_from).collect()
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn category_exists(&self, id: CategoryId) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("category_exists", e))
    }

    #[instrument(
        skip(self, categories),
        fields(candidates = categories.len(), inserted = tracing::field::Empty),
        err
    )]
    async fn insert_categories_if_absent(
        &self,
        categories: &[Category],
    ) -> Result<usize, StoreError> {
        let mut tx = self.begin("seed_categories").await?;

        let mut inserted = 0;
        for category in categories {
            let result = sqlx::query(
                "INSERT INTO categories (id, label) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(category.id.as_uuid())
            .bind(category.label.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("seed_categories", e))?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("inserted", inserted);
        Ok(inserted)
    }

    #[instrument(skip(self, product), fields(product_id = %product.id, sku = %product.sku), err)]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, category_id, sku, brand, model)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category_id.as_uuid())
        .bind(product.sku.as_str())
        .bind(&product.brand)
        .bind(&product.model)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, category_id, sku, brand, model
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.map(Product::try_from).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, category_id, sku, brand, model
            FROM products
            ORDER BY name
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.into_iter().map(Product::try_from).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn count_serials_for_product(&self, id: ProductId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM serials WHERE product_id = $1")
            .bind(id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_serials_for_product", e))?;
        Ok(count as u64)
    }

    #[instrument(skip(self, term), fields(term = %term.as_str()), err)]
    async fn search_products(&self, term: &SearchTerm) -> Result<Vec<ProductMatch>, StoreError> {
        // strpos instead of ILIKE so '%' and '_' in the term match literally.
        let rows: Vec<SearchRow> = sqlx::query_as(
            r#"
            SELECT
                p.id, p.name, p.description, p.category_id, p.sku, p.brand, p.model,
                COUNT(s.id) AS total,
                COUNT(s.id) FILTER (WHERE s.state = 'IN_STOCK') AS in_stock
            FROM products p
            LEFT JOIN serials s ON s.product_id = p.id
            WHERE strpos(lower(p.name), $1) > 0
               OR strpos(lower(p.sku), $1) > 0
               OR strpos(lower(coalesce(p.brand, '')), $1) > 0
               OR strpos(lower(coalesce(p.model, '')), $1) > 0
            GROUP BY p.id
            ORDER BY p.name
            "#,
        )
        .bind(term.as_str().to_lowercase())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_products", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(ProductMatch {
                    total: row.total as u64,
                    in_stock: row.in_stock as u64,
                    product: Product::try_from(row.product)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self, codes), fields(codes = codes.len()), err)]
    async fn existing_codes(&self, codes: &[SerialCode]) -> Result<Vec<String>, StoreError> {
        let wanted: Vec<&str> = codes.iter().map(SerialCode::as_str).collect();
        sqlx::query_scalar("SELECT code FROM serials WHERE code = ANY($1) ORDER BY code")
            .bind(&wanted)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("existing_codes", e))
    }

    #[instrument(skip(self, units), fields(units = units.len()), err)]
    async fn insert_serials(&self, units: &[SerialUnit]) -> Result<(), StoreError> {
        let mut tx = self.begin("insert_serials").await?;
        for unit in units {
            insert_unit(&mut tx, unit).await?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(serial_id = %id), err)]
    async fn get_serial(&self, id: SerialId) -> Result<Option<SerialUnit>, StoreError> {
        let row: Option<SerialRow> = sqlx::query_as(
            r#"
            SELECT id, product_id, code, state, registered_at, updated_at, notes
            FROM serials
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_serial", e))?;

        row.map(SerialUnit::try_from).transpose()
    }

    #[instrument(skip(self, cmd), fields(serial_id = %cmd.serial_id, state = %cmd.state), err)]
    async fn transition_serial(&self, cmd: &TransitionSerial) -> Result<SerialUnit, StoreError> {
        let mut tx = self.begin("transition_serial").await?;

        let row: Option<SerialRow> = sqlx::query_as(
            r#"
            SELECT id, product_id, code, state, registered_at, updated_at, notes
            FROM serials
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(cmd.serial_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_serial", e))?;

        let mut unit = SerialUnit::try_from(row.ok_or(StoreError::NotFound)?)?;
        let entry = unit.apply_transition(cmd)?;

        sqlx::query("UPDATE serials SET state = $2, notes = $3, updated_at = $4 WHERE id = $1")
            .bind(unit.id.as_uuid())
            .bind(unit.state.as_str())
            .bind(&unit.notes)
            .bind(unit.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_serial", e))?;

        insert_history(&mut tx, &entry).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(unit)
    }

    #[instrument(skip(self), fields(serial_id = %id), err)]
    async fn delete_serial(&self, id: SerialId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM serials WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_serial", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn list_serials(
        &self,
        product_id: ProductId,
        state: Option<SerialState>,
    ) -> Result<Vec<SerialUnit>, StoreError> {
        let rows: Vec<SerialRow> = sqlx::query_as(
            r#"
            SELECT id, product_id, code, state, registered_at, updated_at, notes
            FROM serials
            WHERE product_id = $1 AND ($2::TEXT IS NULL OR state = $2)
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(state.map(SerialState::as_str))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_serials", e))?;

        rows.into_iter().map(SerialUnit::try_from).collect()
    }

    #[instrument(skip(self), fields(serial_id = %id), err)]
    async fn serial_history(&self, id: SerialId) -> Result<Vec<SerialHistoryEntry>, StoreError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT serial_id, from_state, to_state, notes, occurred_at
            FROM serial_history
            WHERE serial_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("serial_history", e))?;

        rows.into_iter().map(SerialHistoryEntry::try_from).collect()
    }

    #[instrument(
        skip(self, plan),
        fields(product_id = %plan.product_id, base = %plan.base, count = plan.count),
        err
    )]
    async fn provision(&self, plan: &ProvisionPlan) -> Result<Vec<SerialUnit>, StoreError> {
        let mut tx = self.begin("provision").await?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR UPDATE")
                .bind(plan.product_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock_product", e))?;
        if locked.is_none() {
            return Err(StoreError::NotFound);
        }

        let existing: Vec<String> = sqlx::query_scalar(
            "SELECT code FROM serials WHERE product_id = $1 AND starts_with(code, $2)",
        )
        .bind(plan.product_id.as_uuid())
        .bind(plan.prefix())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("existing_product_codes", e))?;

        let units = plan.plan(existing.iter().map(String::as_str));
        for unit in &units {
            insert_unit(&mut tx, unit).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(units)
    }

    #[instrument(skip(self), fields(products = tracing::field::Empty), err)]
    async fn stock_snapshot(&self) -> Result<StockSnapshot, StoreError> {
        let mut tx = self.begin("stock_snapshot").await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("stock_snapshot", e))?;

        let products: Vec<ProductRow> = sqlx::query_as(
            "SELECT id, name, description, category_id, sku, brand, model FROM products",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("snapshot_products", e))?;

        let counts: Vec<CountRow> = sqlx::query_as(
            "SELECT product_id, state, COUNT(*) AS count FROM serials GROUP BY product_id, state",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("snapshot_counts", e))?;

        let latest: Vec<ActivityRow> = sqlx::query_as(
            r#"
            SELECT DISTINCT ON (product_id) product_id, state, updated_at
            FROM serials
            ORDER BY product_id, updated_at DESC
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("snapshot_activity", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let mut snapshot = StockSnapshot {
            products: products
                .into_iter()
                .map(Product::try_from)
                .collect::<Result<_, _>>()?,
            ..StockSnapshot::default()
        };
        for row in counts {
            snapshot.counts.push(StateCountRow {
                product_id: ProductId::from_uuid(row.product_id),
                state: parse_state(&row.state)?,
                count: row.count as u64,
            });
        }
        for row in latest {
            snapshot.last_activity.insert(
                ProductId::from_uuid(row.product_id),
                LastActivity {
                    state: parse_state(&row.state)?,
                    at: row.updated_at,
                },
            );
        }

        Span::current().record("products", snapshot.products.len());
        Ok(snapshot)
    }
}

/// Insert a unit plus its registration history entry.
async fn insert_unit(tx: &mut Transaction<'_, Postgres>, unit: &SerialUnit) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO serials (id, product_id, code, state, registered_at, updated_at, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(unit.id.as_uuid())
    .bind(unit.product_id.as_uuid())
    .bind(unit.code.as_str())
    .bind(unit.state.as_str())
    .bind(unit.registered_at)
    .bind(unit.updated_at)
    .bind(&unit.notes)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_serial", e))?;

    insert_history(tx, &SerialHistoryEntry::registered(unit)).await
}

async fn insert_history(
    tx: &mut Transaction<'_, Postgres>,
    entry: &SerialHistoryEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO serial_history (serial_id, from_state, to_state, notes, occurred_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(entry.serial_id.as_uuid())
    .bind(entry.from_state.map(SerialState::as_str))
    .bind(entry.to_state.as_str())
    .bind(&entry.notes)
    .bind(entry.occurred_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_history", e))?;
    Ok(())
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Unique {
                    key: db_err
                        .try_downcast_ref::<PgDatabaseError>()
                        .and_then(PgDatabaseError::detail)
                        .and_then(key_from_detail),
                    constraint,
                },
                Some("23503") => StoreError::ForeignKey { constraint },
                _ => StoreError::Backend(format!(
                    "database error in {operation}: {}",
                    db_err.message()
                )),
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("{operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

/// Extract the value from a unique violation detail such as
/// `Key (code)=(ABC-001) already exists.`
fn key_from_detail(detail: &str) -> Option<String> {
    let start = detail.find(")=(")? + 3;
    let end = detail.rfind(") already exists")?;
    (start <= end).then(|| detail[start..end].to_string())
}

fn corrupt(err: DomainError) -> StoreError {
    StoreError::Backend(format!("stored row failed validation: {err}"))
}

fn parse_state(raw: &str) -> Result<SerialState, StoreError> {
    raw.parse().map_err(corrupt)
}

// SQLx row types

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    label: String,
}

impl TryFrom<CategoryRow> for Category {
    type Error = StoreError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Category::new(
            CategoryId::from_uuid(row.id),
            CategoryLabel::parse(&row.label).map_err(corrupt)?,
        ))
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    category_id: Uuid,
    sku: String,
    brand: Option<String>,
    model: Option<String>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            category_id: CategoryId::from_uuid(row.category_id),
            sku: Sku::parse(&row.sku).map_err(corrupt)?,
            brand: row.brand,
            model: row.model,
        })
    }
}

#[derive(Debug, FromRow)]
struct SearchRow {
    #[sqlx(flatten)]
    product: ProductRow,
    total: i64,
    in_stock: i64,
}

#[derive(Debug, FromRow)]
struct SerialRow {
    id: Uuid,
    product_id: Uuid,
    code: String,
    state: String,
    registered_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    notes: Option<String>,
}

impl TryFrom<SerialRow> for SerialUnit {
    type Error = StoreError;

    fn try_from(row: SerialRow) -> Result<Self, Self::Error> {
        Ok(SerialUnit {
            id: SerialId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            code: SerialCode::parse(&row.code).map_err(corrupt)?,
            state: parse_state(&row.state)?,
            registered_at: row.registered_at,
            updated_at: row.updated_at,
            notes: row.notes,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    serial_id: Uuid,
    from_state: Option<String>,
    to_state: String,
    notes: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for SerialHistoryEntry {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(SerialHistoryEntry {
            serial_id: SerialId::from_uuid(row.serial_id),
            from_state: row.from_state.as_deref().map(parse_state).transpose()?,
            to_state: parse_state(&row.to_state)?,
            notes: row.notes,
            occurred_at: row.occurred_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CountRow {
    product_id: Uuid,
    state: String,
    count: i64,
}

#[derive(Debug, FromRow)]
struct ActivityRow {
    product_id: Uuid,
    state: String,
    updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_detail_yields_offending_key() {
        assert_eq!(
            key_from_detail("Key (code)=(ABC-001) already exists."),
            Some("ABC-001".to_string())
        );
        assert_eq!(
            key_from_detail("Key (lower(label))=(monitor) already exists."),
            Some("monitor".to_string())
        );
        assert_eq!(key_from_detail("something else"), None);
    }

    #[test]
    fn pool_failures_are_unavailable() {
        assert!(matches!(
            map_sqlx_error("connect", sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("get_product", sqlx::Error::RowNotFound),
            StoreError::Backend(_)
        ));
    }
}

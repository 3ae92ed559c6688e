// src/db/pg_store.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, Executor, FromRow, PgPool, Postgres};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::repository::{ProductRepository, StockRepository, Store, UserRepository},
    models::{
        auth::{Role, User},
        catalog::{Product, SizeVariant},
        stock::{
            ActivityLogEntry, AdjustmentOutcome, DailyStockAggregate, DailyStockLine,
            InventoryRecord, StockAction, StockAdjustment,
        },
    },
};

// ---
// Linhas do banco (colunas TEXT/JSONB convertidas para os tipos do domínio)
// ---

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    role: String,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(anyhow::Error::msg)?;
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            role,
        })
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    sku: String,
    sizes: Json<Vec<SizeVariant>>,
    is_deleted: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            sku: row.sku,
            sizes: row.sizes.0,
            is_deleted: row.is_deleted,
        }
    }
}

#[derive(FromRow)]
struct DailyLineRow {
    stock_date: NaiveDate,
    storeroom_id: String,
    #[sqlx(flatten)]
    line: DailyStockLine,
}

#[derive(FromRow)]
struct LogRow {
    id: Uuid,
    user_id: Uuid,
    username: String,
    action: String,
    product_id: Uuid,
    product_name: String,
    size: String,
    quantity: i64,
    applied_quantity: i64,
    storeroom_id: String,
    timestamp: DateTime<Utc>,
}

impl TryFrom<LogRow> for ActivityLogEntry {
    type Error = AppError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        let action = row.action.parse::<StockAction>().map_err(anyhow::Error::msg)?;
        Ok(ActivityLogEntry {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            action,
            product_id: row.product_id,
            product_name: row.product_name,
            size: row.size,
            quantity: row.quantity,
            applied_quantity: row.applied_quantity,
            storeroom_id: row.storeroom_id,
            timestamp: row.timestamp,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, sku, sizes, is_deleted";
const LINE_COLUMNS: &str =
    "stock_date, storeroom_id, product_id, size, opening_stock, closing_stock, added, removed";

// Agrupa linhas (já ordenadas por data/depósito) em consolidados.
fn group_lines(rows: Vec<DailyLineRow>) -> Vec<DailyStockAggregate> {
    let mut days: Vec<DailyStockAggregate> = Vec::new();
    for row in rows {
        match days.last_mut() {
            Some(day) if day.date == row.stock_date && day.storeroom_id == row.storeroom_id => {
                day.records.push(row.line);
            }
            _ => {
                let mut day = DailyStockAggregate::new(row.stock_date, &row.storeroom_id);
                day.records.push(row.line);
                days.push(day);
            }
        }
    }
    days
}

fn map_unique_violation(e: sqlx::Error, on_unique: impl FnOnce() -> AppError) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return on_unique();
        }
    }
    e.into()
}

/// Backend PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!().run(&self.pool).await?;
        tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");
        Ok(())
    }

    async fn fetch_day<'e, E>(
        &self,
        executor: E,
        date: NaiveDate,
        storeroom_id: &str,
    ) -> Result<DailyStockAggregate, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, DailyLineRow>(&format!(
            "SELECT {LINE_COLUMNS} FROM daily_stock_lines \
             WHERE stock_date = $1 AND storeroom_id = $2 ORDER BY id"
        ))
        .bind(date)
        .bind(storeroom_id)
        .fetch_all(executor)
        .await?;

        Ok(group_lines(rows)
            .pop()
            .unwrap_or_else(|| DailyStockAggregate::new(date, storeroom_id)))
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, role FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, password_hash, role
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, || AppError::UsernameAlreadyExists))?;

        User::try_from(row)
    }
}

#[async_trait]
impl ProductRepository for PgStore {
    async fn list_active(&self) -> Result<Vec<Product>, AppError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_deleted = FALSE ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>, AppError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn create_product(&self, product: &Product) -> Result<Product, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (id, name, sku, sizes, is_deleted)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(Json(&product.sizes))
        .bind(product.is_deleted)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, || AppError::SkuAlreadyExists(product.sku.clone())))?;

        Ok(row.into())
    }

    async fn update_product(&self, product: &Product) -> Result<Product, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products
            SET name = $2, sku = $3, sizes = $4, is_deleted = $5, updated_at = now()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(Json(&product.sizes))
        .bind(product.is_deleted)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, || AppError::SkuAlreadyExists(product.sku.clone())))?;

        row.map(Product::from).ok_or(AppError::ProductNotFound)
    }
}

#[async_trait]
impl StockRepository for PgStore {
    async fn list_inventory(&self) -> Result<Vec<InventoryRecord>, AppError> {
        let records = sqlx::query_as::<_, InventoryRecord>(
            "SELECT id, product_id, storeroom_id, size, quantity FROM inventory \
             ORDER BY storeroom_id, product_id, size",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn apply_adjustment(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<AdjustmentOutcome, AppError> {
        let key = &adjustment.key;
        // Qualquer erro antes do commit descarta a transação inteira.
        let mut tx = self.pool.begin().await?;

        // 1. Garante a linha do saldo e trava a chave até o commit.
        // Movimentações concorrentes da mesma chave esperam aqui.
        sqlx::query(
            r#"
            INSERT INTO inventory (id, product_id, storeroom_id, size, quantity)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (product_id, storeroom_id, size) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key.product_id)
        .bind(&key.storeroom_id)
        .bind(&key.size)
        .execute(&mut *tx)
        .await?;

        let mut inventory_item = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT id, product_id, storeroom_id, size, quantity FROM inventory
            WHERE product_id = $1 AND storeroom_id = $2 AND size = $3
            FOR UPDATE
            "#,
        )
        .bind(key.product_id)
        .bind(&key.storeroom_id)
        .bind(&key.size)
        .fetch_one(&mut *tx)
        .await?;

        let movement = inventory_item.apply(adjustment.change, adjustment.kind)?;

        sqlx::query("UPDATE inventory SET quantity = $2, updated_at = now() WHERE id = $1")
            .bind(inventory_item.id)
            .bind(inventory_item.quantity)
            .execute(&mut *tx)
            .await?;

        // 2. Linha do consolidado do dia
        let existing = sqlx::query_as::<_, DailyStockLine>(
            r#"
            SELECT product_id, size, opening_stock, closing_stock, added, removed
            FROM daily_stock_lines
            WHERE stock_date = $1 AND storeroom_id = $2 AND product_id = $3 AND size = $4
            "#,
        )
        .bind(adjustment.date)
        .bind(&key.storeroom_id)
        .bind(key.product_id)
        .bind(&key.size)
        .fetch_optional(&mut *tx)
        .await?;

        let is_new_line = existing.is_none();
        let mut line = existing
            .unwrap_or_else(|| DailyStockLine::open(key.product_id, &key.size, movement.before));
        line.record(&movement)?;

        if is_new_line {
            sqlx::query(
                r#"
                INSERT INTO daily_stock_lines
                    (stock_date, storeroom_id, product_id, size, opening_stock, closing_stock, added, removed)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(adjustment.date)
            .bind(&key.storeroom_id)
            .bind(key.product_id)
            .bind(&key.size)
            .bind(line.opening_stock)
            .bind(line.closing_stock)
            .bind(line.added)
            .bind(line.removed)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE daily_stock_lines
                SET closing_stock = $5, added = $6, removed = $7
                WHERE stock_date = $1 AND storeroom_id = $2 AND product_id = $3 AND size = $4
                "#,
            )
            .bind(adjustment.date)
            .bind(&key.storeroom_id)
            .bind(key.product_id)
            .bind(&key.size)
            .bind(line.closing_stock)
            .bind(line.added)
            .bind(line.removed)
            .execute(&mut *tx)
            .await?;
        }

        // 3. Histórico
        let log = adjustment.log_entry(&movement);
        sqlx::query(
            r#"
            INSERT INTO activity_logs
                (id, user_id, username, action, product_id, product_name, size,
                 quantity, applied_quantity, storeroom_id, "timestamp")
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(&log.username)
        .bind(log.action.as_str())
        .bind(log.product_id)
        .bind(&log.product_name)
        .bind(&log.size)
        .bind(log.quantity)
        .bind(log.applied_quantity)
        .bind(&log.storeroom_id)
        .bind(log.timestamp)
        .execute(&mut *tx)
        .await?;

        let daily_record = self
            .fetch_day(&mut *tx, adjustment.date, &key.storeroom_id)
            .await?;

        tx.commit().await?;

        Ok(AdjustmentOutcome {
            daily_record,
            log,
            inventory_item,
        })
    }

    async fn daily_aggregates(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<DailyStockAggregate>, AppError> {
        let rows = match range {
            Some((start, end)) => {
                sqlx::query_as::<_, DailyLineRow>(&format!(
                    "SELECT {LINE_COLUMNS} FROM daily_stock_lines \
                     WHERE stock_date BETWEEN $1 AND $2 \
                     ORDER BY stock_date, storeroom_id, id"
                ))
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DailyLineRow>(&format!(
                    "SELECT {LINE_COLUMNS} FROM daily_stock_lines \
                     ORDER BY stock_date, storeroom_id, id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(group_lines(rows))
    }

    async fn recent_logs(&self, limit: i64) -> Result<Vec<ActivityLogEntry>, AppError> {
        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT id, user_id, username, action, product_id, product_name, size,
                   quantity, applied_quantity, storeroom_id, "timestamp"
            FROM activity_logs
            ORDER BY "timestamp" DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ActivityLogEntry::try_from).collect()
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stock::{Actor, AdjustmentType, StockKey};

    fn row(date: (i32, u32, u32), room: &str, size: &str) -> DailyLineRow {
        DailyLineRow {
            stock_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            storeroom_id: room.to_string(),
            line: DailyStockLine::open(Uuid::nil(), size, 0),
        }
    }

    #[test]
    fn lines_are_grouped_by_day_and_storeroom() {
        let days = group_lines(vec![
            row((2024, 1, 1), "room1", "1L"),
            row((2024, 1, 1), "room1", "5L"),
            row((2024, 1, 1), "room2", "1L"),
            row((2024, 1, 2), "room1", "1L"),
        ]);

        assert_eq!(days.len(), 3);
        assert_eq!(days[0].records.len(), 2);
        assert_eq!(days[1].storeroom_id, "room2");
        assert_eq!(days[2].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    // --- Testes contra um Postgres real ---
    // Só rodam com DATABASE_URL definida; cada teste usa um depósito e um
    // produto próprios, então podem compartilhar o banco.

    async fn pg() -> Option<PgStore> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL não definida; teste de Postgres ignorado");
            return None;
        };
        let store = PgStore::connect(&url, 10).await.unwrap();
        store.migrate().await.unwrap();
        Some(store)
    }

    fn fresh_key() -> StockKey {
        StockKey {
            product_id: Uuid::new_v4(),
            storeroom_id: format!("room-{}", Uuid::new_v4()),
            size: "1L".into(),
        }
    }

    fn adjustment(key: &StockKey, date: NaiveDate, change: i64, kind: AdjustmentType) -> StockAdjustment {
        StockAdjustment {
            date,
            key: key.clone(),
            change,
            kind,
            actor: Actor { user_id: Uuid::new_v4(), username: "ana".into() },
            product_name: "Milk".into(),
            timestamp: Utc::now(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    async fn logs_for(store: &PgStore, key: &StockKey) -> Vec<ActivityLogEntry> {
        store
            .recent_logs(10_000)
            .await
            .unwrap()
            .into_iter()
            .filter(|log| log.product_id == key.product_id)
            .collect()
    }

    async fn line_on(store: &PgStore, key: &StockKey, date: NaiveDate) -> DailyStockLine {
        store
            .daily_aggregates(Some((date, date)))
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.storeroom_id == key.storeroom_id)
            .and_then(|d| d.records.into_iter().find(|l| l.product_id == key.product_id))
            .unwrap()
    }

    #[tokio::test]
    async fn pg_add_then_remove_updates_all_three_records() {
        let Some(store) = pg().await else { return };
        let key = fresh_key();

        store.apply_adjustment(&adjustment(&key, day(1), 10, AdjustmentType::Add)).await.unwrap();
        let outcome = store
            .apply_adjustment(&adjustment(&key, day(1), 3, AdjustmentType::Remove))
            .await
            .unwrap();

        assert_eq!(outcome.inventory_item.quantity, 7);
        assert_eq!(outcome.daily_record.storeroom_id, key.storeroom_id);
        let line = &outcome.daily_record.records[0];
        assert_eq!((line.opening_stock, line.added, line.removed, line.closing_stock), (0, 10, 3, 7));
        assert_eq!(line_on(&store, &key, day(1)).await, *line);

        let logs = logs_for(&store, &key).await;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action, StockAction::StockRemoved);
        assert_eq!(logs[0].quantity, 3);
        assert_eq!(logs[1].action, StockAction::StockAdded);
    }

    #[tokio::test]
    async fn pg_removal_clamps_and_next_day_opens_at_close() {
        let Some(store) = pg().await else { return };
        let key = fresh_key();

        store.apply_adjustment(&adjustment(&key, day(1), 2, AdjustmentType::Add)).await.unwrap();
        let outcome = store
            .apply_adjustment(&adjustment(&key, day(1), 5, AdjustmentType::Remove))
            .await
            .unwrap();
        assert_eq!(outcome.inventory_item.quantity, 0);
        assert_eq!((outcome.log.quantity, outcome.log.applied_quantity), (5, 2));

        store.apply_adjustment(&adjustment(&key, day(2), 4, AdjustmentType::Add)).await.unwrap();

        let first = line_on(&store, &key, day(1)).await;
        assert_eq!((first.opening_stock, first.added, first.removed, first.closing_stock), (0, 2, 2, 0));
        let second = line_on(&store, &key, day(2)).await;
        assert_eq!((second.opening_stock, second.closing_stock), (0, 4));

        // sem filtro os dois dias aparecem, em ordem de data
        let dates: Vec<_> = store
            .daily_aggregates(None)
            .await
            .unwrap()
            .into_iter()
            .filter(|d| d.storeroom_id == key.storeroom_id)
            .map(|d| d.date)
            .collect();
        assert_eq!(dates, [day(1), day(2)]);
    }

    #[tokio::test]
    async fn pg_concurrent_adds_on_one_key_do_not_lose_updates() {
        let Some(store) = pg().await else { return };
        let key = fresh_key();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let adjustment = adjustment(&key, day(1), 2, AdjustmentType::Add);
            handles.push(tokio::spawn(async move { store.apply_adjustment(&adjustment).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let quantity = store
            .list_inventory()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.product_id == key.product_id)
            .map(|r| r.quantity);
        assert_eq!(quantity, Some(40));

        let line = line_on(&store, &key, day(1)).await;
        assert_eq!((line.opening_stock, line.added, line.closing_stock), (0, 40, 40));
        assert_eq!(logs_for(&store, &key).await.len(), 20);
    }

    #[tokio::test]
    async fn pg_refused_adjustment_rolls_back() {
        let Some(store) = pg().await else { return };
        let key = fresh_key();

        store.apply_adjustment(&adjustment(&key, day(1), i64::MAX, AdjustmentType::Add)).await.unwrap();
        let err = store
            .apply_adjustment(&adjustment(&key, day(1), 1, AdjustmentType::Add))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let line = line_on(&store, &key, day(1)).await;
        assert_eq!((line.added, line.closing_stock), (i64::MAX, i64::MAX));
        assert_eq!(logs_for(&store, &key).await.len(), 1);
    }
}

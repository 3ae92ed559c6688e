// src/db/memory_store.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::repository::{ProductRepository, StockRepository, Store, UserRepository},
    models::{
        auth::{Role, User},
        catalog::Product,
        stock::{
            ActivityLogEntry, AdjustmentOutcome, DailyStockAggregate, InventoryRecord,
            StockAdjustment, StockKey,
        },
    },
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, User>,
    products: Vec<Product>,
    inventory: BTreeMap<StockKey, InventoryRecord>,
    daily: BTreeMap<(NaiveDate, String), DailyStockAggregate>,
    logs: Vec<ActivityLogEntry>,
}

/// Backend em memória. Um único mutex cobre todo o estado, então cada
/// movimentação é atômica e serializada.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().await.users.get(username).cloned())
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, AppError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(username) {
            return Err(AppError::UsernameAlreadyExists);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
        };
        state.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn list_active(&self) -> Result<Vec<Product>, AppError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| !p.is_deleted)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let state = self.state.lock().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn create_product(&self, product: &Product) -> Result<Product, AppError> {
        let mut state = self.state.lock().await;
        if state.products.iter().any(|p| p.sku == product.sku) {
            return Err(AppError::SkuAlreadyExists(product.sku.clone()));
        }
        state.products.push(product.clone());
        Ok(product.clone())
    }

    async fn update_product(&self, product: &Product) -> Result<Product, AppError> {
        let mut state = self.state.lock().await;
        if state
            .products
            .iter()
            .any(|p| p.sku == product.sku && p.id != product.id)
        {
            return Err(AppError::SkuAlreadyExists(product.sku.clone()));
        }
        let slot = state
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or(AppError::ProductNotFound)?;
        *slot = product.clone();
        Ok(product.clone())
    }
}

#[async_trait]
impl StockRepository for MemoryStore {
    async fn list_inventory(&self) -> Result<Vec<InventoryRecord>, AppError> {
        Ok(self.state.lock().await.inventory.values().cloned().collect())
    }

    async fn apply_adjustment(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<AdjustmentOutcome, AppError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let key = &adjustment.key;
        let day_key = (adjustment.date, key.storeroom_id.clone());

        // Calcula tudo sobre cópias; o estado só muda se as três partes
        // forem válidas.

        // 1. Saldo
        let mut inventory_item = state
            .inventory
            .get(key)
            .cloned()
            .unwrap_or_else(|| InventoryRecord::empty(key));
        let movement = inventory_item.apply(adjustment.change, adjustment.kind)?;

        // 2. Consolidado do dia
        let mut daily_record = state
            .daily
            .get(&day_key)
            .cloned()
            .unwrap_or_else(|| DailyStockAggregate::new(adjustment.date, &key.storeroom_id));
        daily_record.record(key, &movement)?;

        // 3. Histórico
        let log = adjustment.log_entry(&movement);

        state.inventory.insert(key.clone(), inventory_item.clone());
        state.daily.insert(day_key, daily_record.clone());
        state.logs.push(log.clone());

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
        let state = self.state.lock().await;
        Ok(state
            .daily
            .values()
            .filter(|day| match range {
                Some((start, end)) => day.date >= start && day.date <= end,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn recent_logs(&self, limit: i64) -> Result<Vec<ActivityLogEntry>, AppError> {
        let state = self.state.lock().await;
        // Mais novas primeiro; empates mantêm a ordem inversa de inserção
        let mut logs: Vec<ActivityLogEntry> = state.logs.iter().rev().cloned().collect();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        catalog::CreateProductPayload,
        stock::{Actor, AdjustmentType},
    };

    fn product(sku: &str) -> Product {
        Product::new(CreateProductPayload {
            name: format!("Produto {}", sku),
            sku: sku.to_string(),
            sizes: vec![],
        })
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let store = MemoryStore::new();
        store.create_user("ana", "hash", Role::User).await.unwrap();
        let err = store.create_user("ana", "hash", Role::Admin).await.unwrap_err();
        assert!(matches!(err, AppError::UsernameAlreadyExists));
    }

    #[tokio::test]
    async fn sku_must_stay_unique_on_update() {
        let store = MemoryStore::new();
        store.create_product(&product("A-1")).await.unwrap();
        let mut b = store.create_product(&product("B-1")).await.unwrap();

        b.sku = "A-1".into();
        let err = store.update_product(&b).await.unwrap_err();
        assert!(matches!(err, AppError::SkuAlreadyExists(_)));
    }

    #[tokio::test]
    async fn update_of_unknown_product_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update_product(&product("X-9")).await.unwrap_err();
        assert!(matches!(err, AppError::ProductNotFound));
    }

    fn adjustment(change: i64, kind: AdjustmentType, key: &StockKey) -> StockAdjustment {
        StockAdjustment {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            key: key.clone(),
            change,
            kind,
            actor: Actor { user_id: Uuid::new_v4(), username: "ana".into() },
            product_name: "Milk".into(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn refused_adjustment_writes_nothing() {
        let store = MemoryStore::new();
        let key = StockKey {
            product_id: Uuid::new_v4(),
            storeroom_id: "room1".into(),
            size: "1L".into(),
        };

        store.apply_adjustment(&adjustment(i64::MAX, AdjustmentType::Add, &key)).await.unwrap();
        store.apply_adjustment(&adjustment(i64::MAX, AdjustmentType::Remove, &key)).await.unwrap();

        // o total de entradas do dia estouraria
        let err = store
            .apply_adjustment(&adjustment(i64::MAX, AdjustmentType::Add, &key))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let inventory = store.list_inventory().await.unwrap();
        assert_eq!(inventory[0].quantity, 0);
        assert_eq!(store.recent_logs(100).await.unwrap().len(), 2);
        let days = store.daily_aggregates(None).await.unwrap();
        let line = &days[0].records[0];
        assert_eq!((line.added, line.removed, line.closing_stock), (i64::MAX, i64::MAX, 0));

        // saldo no teto: nova entrada é recusada em vez de sumir
        let full = StockKey { size: "5L".into(), ..key.clone() };
        store.apply_adjustment(&adjustment(i64::MAX, AdjustmentType::Add, &full)).await.unwrap();
        let err = store
            .apply_adjustment(&adjustment(1, AdjustmentType::Add, &full))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(store.recent_logs(100).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn soft_deleted_products_are_hidden() {
        let store = MemoryStore::new();
        let mut p = store.create_product(&product("A-1")).await.unwrap();
        p.is_deleted = true;
        store.update_product(&p).await.unwrap();

        assert!(store.list_active().await.unwrap().is_empty());
        assert!(store.find_by_id(p.id).await.unwrap().is_some());
    }
}

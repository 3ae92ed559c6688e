// src/services/ledger_service.rs

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    common::{
        dates::{parse_day, today},
        error::AppError,
    },
    db::StockRepository,
    models::{
        catalog::ProductSummary,
        stock::{
            ActivityLogEntry, Actor, AdjustmentOutcome, CalendarDay, CalendarLine, CalendarQuery,
            InventoryRecord, StockAdjustment, StockAdjustmentPayload, StockKey,
        },
    },
    services::catalog_service::CatalogService,
};

/// Quantas entradas do histórico a auditoria devolve.
pub const RECENT_LOGS_LIMIT: i64 = 100;

pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

#[derive(Clone)]
pub struct LedgerService {
    stock_repo: Arc<dyn StockRepository>,
    catalog: CatalogService,
}

impl LedgerService {
    pub fn new(stock_repo: Arc<dyn StockRepository>, catalog: CatalogService) -> Self {
        Self { stock_repo, catalog }
    }

    // --- MOVIMENTAÇÃO (entrada ou saída) ---
    pub async fn record_adjustment(
        &self,
        payload: StockAdjustmentPayload,
        actor: Actor,
    ) -> Result<AdjustmentOutcome, AppError> {
        let date = match payload.date.as_deref() {
            Some(raw) => parse_day(raw)?,
            None => today(),
        };

        // Produto desconhecido não impede a movimentação.
        let product_name = self
            .catalog
            .product_name(payload.product_id)
            .await?
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());

        let adjustment = StockAdjustment {
            date,
            key: StockKey {
                product_id: payload.product_id,
                storeroom_id: payload.storeroom_id,
                size: payload.size,
            },
            change: payload.change,
            kind: payload.kind,
            actor,
            product_name,
            timestamp: Utc::now(),
        };

        let outcome = self.stock_repo.apply_adjustment(&adjustment).await?;

        tracing::info!(
            user = %adjustment.actor.username,
            product = %adjustment.product_name,
            storeroom = %adjustment.key.storeroom_id,
            size = %adjustment.key.size,
            requested = adjustment.change,
            applied = outcome.log.applied_quantity,
            quantity = outcome.inventory_item.quantity,
            "📝 {}",
            outcome.log.action
        );

        Ok(outcome)
    }

    pub async fn list_inventory(&self) -> Result<Vec<InventoryRecord>, AppError> {
        self.stock_repo.list_inventory().await
    }

    /// Consolidados diários com os produtos resolvidos. O filtro só vale
    /// quando `start` e `end` vêm juntos.
    pub async fn calendar(&self, query: CalendarQuery) -> Result<Vec<CalendarDay>, AppError> {
        let range = match (query.start.as_deref(), query.end.as_deref()) {
            (Some(start), Some(end)) => Some((parse_day(start)?, parse_day(end)?)),
            _ => None,
        };

        let days = self.stock_repo.daily_aggregates(range).await?;

        let mut ids: Vec<_> = days
            .iter()
            .flat_map(|day| day.records.iter().map(|line| line.product_id))
            .collect();
        ids.sort();
        ids.dedup();

        let products: HashMap<_, _> = self
            .catalog
            .find_many(&ids)
            .await?
            .iter()
            .map(|p| (p.id, ProductSummary::from(p)))
            .collect();

        Ok(days
            .into_iter()
            .map(|day| CalendarDay {
                date: day.date,
                storeroom_id: day.storeroom_id,
                records: day
                    .records
                    .into_iter()
                    .map(|line| CalendarLine {
                        product: products.get(&line.product_id).cloned(),
                        product_id: line.product_id,
                        size: line.size,
                        opening_stock: line.opening_stock,
                        closing_stock: line.closing_stock,
                        added: line.added,
                        removed: line.removed,
                    })
                    .collect(),
            })
            .collect())
    }

    pub async fn recent_logs(&self) -> Result<Vec<ActivityLogEntry>, AppError> {
        self.stock_repo.recent_logs(RECENT_LOGS_LIMIT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryStore,
        models::{
            catalog::{CreateProductPayload, SizeVariant},
            stock::{AdjustmentType, StockAction},
        },
    };
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    struct Fixture {
        ledger: LedgerService,
        catalog: CatalogService,
        actor: Actor,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let catalog = CatalogService::new(store.clone());
        Fixture {
            ledger: LedgerService::new(store, catalog.clone()),
            catalog,
            actor: Actor { user_id: Uuid::new_v4(), username: "operador".into() },
        }
    }

    async fn milk(catalog: &CatalogService) -> Uuid {
        catalog
            .create_product(CreateProductPayload {
                name: "Milk".into(),
                sku: "MILK-001".into(),
                sizes: vec![SizeVariant { size: "1L".into(), price: Decimal::new(60, 0) }],
            })
            .await
            .unwrap()
            .id
    }

    fn adjust(product_id: Uuid, change: i64, kind: AdjustmentType, date: Option<&str>) -> StockAdjustmentPayload {
        StockAdjustmentPayload {
            date: date.map(str::to_string),
            storeroom_id: "room1".into(),
            product_id,
            size: "1L".into(),
            change,
            kind,
        }
    }

    #[tokio::test]
    async fn add_then_remove_updates_all_three_records() {
        let f = fixture();
        let product_id = milk(&f.catalog).await;

        f.ledger
            .record_adjustment(adjust(product_id, 10, AdjustmentType::Add, Some("2024-06-01")), f.actor.clone())
            .await
            .unwrap();
        let outcome = f
            .ledger
            .record_adjustment(adjust(product_id, 3, AdjustmentType::Remove, Some("2024-06-01")), f.actor.clone())
            .await
            .unwrap();

        assert_eq!(outcome.inventory_item.quantity, 7);
        assert_eq!(outcome.daily_record.records.len(), 1);
        let line = &outcome.daily_record.records[0];
        assert_eq!((line.opening_stock, line.added, line.removed, line.closing_stock), (0, 10, 3, 7));

        assert_eq!(outcome.log.action, StockAction::StockRemoved);
        assert_eq!(outcome.log.product_name, "Milk");
        assert_eq!(outcome.log.username, "operador");
        assert_eq!(outcome.log.quantity, 3);
    }

    #[tokio::test]
    async fn removing_more_than_on_hand_clamps_to_zero() {
        let f = fixture();
        let product_id = milk(&f.catalog).await;

        f.ledger
            .record_adjustment(adjust(product_id, 2, AdjustmentType::Add, None), f.actor.clone())
            .await
            .unwrap();
        let outcome = f
            .ledger
            .record_adjustment(adjust(product_id, 5, AdjustmentType::Remove, None), f.actor.clone())
            .await
            .unwrap();

        assert_eq!(outcome.inventory_item.quantity, 0);
        assert_eq!(outcome.log.quantity, 5);
        assert_eq!(outcome.log.applied_quantity, 2);
        assert_eq!(outcome.daily_record.date, today());
    }

    #[tokio::test]
    async fn next_day_opens_where_previous_day_closed() {
        let f = fixture();
        let product_id = milk(&f.catalog).await;

        f.ledger
            .record_adjustment(adjust(product_id, 2, AdjustmentType::Add, Some("2024-06-01")), f.actor.clone())
            .await
            .unwrap();
        // saída grampeada no zero
        f.ledger
            .record_adjustment(adjust(product_id, 5, AdjustmentType::Remove, Some("2024-06-01")), f.actor.clone())
            .await
            .unwrap();
        let outcome = f
            .ledger
            .record_adjustment(adjust(product_id, 4, AdjustmentType::Add, Some("2024-06-02T08:00:00Z")), f.actor.clone())
            .await
            .unwrap();

        let day2 = &outcome.daily_record.records[0];
        assert_eq!(outcome.daily_record.date, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert_eq!(day2.opening_stock, 0);
        assert_eq!(day2.closing_stock, 4);

        let calendar = f
            .ledger
            .calendar(CalendarQuery { start: Some("2024-06-01".into()), end: Some("2024-06-01".into()) })
            .await
            .unwrap();
        assert_eq!(calendar.len(), 1);
        let day1 = &calendar[0].records[0];
        assert_eq!((day1.opening_stock, day1.added, day1.removed, day1.closing_stock), (0, 2, 2, 0));
        assert_eq!(day1.product.as_ref().map(|p| p.sku.as_str()), Some("MILK-001"));
    }

    #[tokio::test]
    async fn unknown_product_is_logged_by_placeholder_name() {
        let f = fixture();
        let outcome = f
            .ledger
            .record_adjustment(adjust(Uuid::new_v4(), 1, AdjustmentType::Add, None), f.actor.clone())
            .await
            .unwrap();
        assert_eq!(outcome.log.product_name, UNKNOWN_PRODUCT);

        let calendar = f.ledger.calendar(CalendarQuery::default()).await.unwrap();
        assert!(calendar[0].records[0].product.is_none());
    }

    #[tokio::test]
    async fn invalid_date_is_rejected_before_any_write() {
        let f = fixture();
        let product_id = milk(&f.catalog).await;
        let err = f
            .ledger
            .record_adjustment(adjust(product_id, 1, AdjustmentType::Add, Some("31/12/2024")), f.actor.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(f.ledger.list_inventory().await.unwrap().is_empty());
        assert!(f.ledger.recent_logs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_logs_are_capped_and_newest_first() {
        let f = fixture();
        let product_id = milk(&f.catalog).await;
        for _ in 0..105 {
            f.ledger
                .record_adjustment(adjust(product_id, 1, AdjustmentType::Add, None), f.actor.clone())
                .await
                .unwrap();
        }

        let logs = f.ledger.recent_logs().await.unwrap();
        assert_eq!(logs.len(), 100);
        assert!(logs.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[tokio::test]
    async fn concurrent_adjustments_on_one_key_do_not_lose_updates() {
        let f = fixture();
        let product_id = milk(&f.catalog).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ledger = f.ledger.clone();
            let actor = f.actor.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .record_adjustment(adjust(product_id, 2, AdjustmentType::Add, Some("2024-06-01")), actor)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let inventory = f.ledger.list_inventory().await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].quantity, 100);

        let calendar = f.ledger.calendar(CalendarQuery::default()).await.unwrap();
        let line = &calendar[0].records[0];
        assert_eq!((line.opening_stock, line.added, line.closing_stock), (0, 100, 100));
    }
}

// src/db/repository.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{Role, User},
        catalog::Product,
        stock::{ActivityLogEntry, AdjustmentOutcome, DailyStockAggregate, InventoryRecord, StockAdjustment},
    },
};

// Capacidades de armazenamento. Cada serviço recebe só o repositório que usa;
// o backend (Postgres ou memória) é escolhido na inicialização.

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Falha com `UsernameAlreadyExists` se o nome já estiver em uso.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, AppError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Produtos com `is_deleted = false`, ordenados por nome.
    async fn list_active(&self) -> Result<Vec<Product>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>, AppError>;

    /// Falha com `SkuAlreadyExists` se o SKU já estiver em uso.
    async fn create_product(&self, product: &Product) -> Result<Product, AppError>;

    /// Grava o produto inteiro. `ProductNotFound` se o id não existir.
    async fn update_product(&self, product: &Product) -> Result<Product, AppError>;
}

#[async_trait]
pub trait StockRepository: Send + Sync {
    async fn list_inventory(&self) -> Result<Vec<InventoryRecord>, AppError>;

    /// Aplica a movimentação como uma unidade atômica: saldo, consolidado do
    /// dia e histórico. Movimentações da mesma chave são serializadas.
    async fn apply_adjustment(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<AdjustmentOutcome, AppError>;

    /// Consolidados por (data, depósito), em ordem de data. `range` inclusivo.
    async fn daily_aggregates(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<DailyStockAggregate>, AppError>;

    /// As `limit` entradas mais recentes, da mais nova para a mais antiga.
    async fn recent_logs(&self, limit: i64) -> Result<Vec<ActivityLogEntry>, AppError>;
}

#[async_trait]
pub trait Store: UserRepository + ProductRepository + StockRepository {
    fn backend(&self) -> &'static str;

    async fn close(&self);
}

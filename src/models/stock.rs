// src/models/stock.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{common::error::AppError, models::catalog::ProductSummary};

// --- 1. Tipo de movimentação pedido pelo cliente ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentType {
    Add,
    Remove,
}

// --- 2. Ação gravada no histórico ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum StockAction {
    #[serde(rename = "Stock Added")]
    StockAdded,
    #[serde(rename = "Stock Removed")]
    StockRemoved,
}

impl StockAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockAction::StockAdded => "Stock Added",
            StockAction::StockRemoved => "Stock Removed",
        }
    }
}

impl fmt::Display for StockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Stock Added" => Ok(StockAction::StockAdded),
            "Stock Removed" => Ok(StockAction::StockRemoved),
            other => Err(format!("ação desconhecida: {}", other)),
        }
    }
}

impl From<AdjustmentType> for StockAction {
    fn from(kind: AdjustmentType) -> Self {
        match kind {
            AdjustmentType::Add => StockAction::StockAdded,
            AdjustmentType::Remove => StockAction::StockRemoved,
        }
    }
}

// Chave do saldo: (produto, depósito, tamanho)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StockKey {
    pub product_id: Uuid,
    pub storeroom_id: String,
    pub size: String,
}

fn overflow(what: &str) -> AppError {
    AppError::InvalidInput(format!("A movimentação excede o limite do {}.", what))
}

/// Resultado de aplicar uma movimentação a um saldo.
/// `applied` é o quanto o saldo realmente andou (menor que o pedido quando a
/// saída bate no zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Movement {
    pub kind: AdjustmentType,
    pub before: i64,
    pub after: i64,
    pub applied: i64,
}

// --- 3. Saldo atual (InventoryRecord) ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub storeroom_id: String,
    pub size: String,
    pub quantity: i64,
}

impl InventoryRecord {
    /// Saldo criado na primeira movimentação da chave.
    pub fn empty(key: &StockKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id: key.product_id,
            storeroom_id: key.storeroom_id.clone(),
            size: key.size.clone(),
            quantity: 0,
        }
    }

    /// Entradas somam; saídas nunca deixam o saldo negativo. Uma entrada que
    /// estouraria o saldo é recusada e o registro fica como estava.
    pub fn apply(&mut self, change: i64, kind: AdjustmentType) -> Result<Movement, AppError> {
        let before = self.quantity;
        let after = match kind {
            AdjustmentType::Add => before
                .checked_add(change)
                .ok_or_else(|| overflow("saldo"))?,
            AdjustmentType::Remove => before.saturating_sub(change).max(0),
        };
        self.quantity = after;
        Ok(Movement {
            kind,
            before,
            after,
            applied: after.abs_diff(before) as i64,
        })
    }
}

// --- 4. Consolidado diário ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyStockLine {
    pub product_id: Uuid,
    pub size: String,
    pub opening_stock: i64,
    pub closing_stock: i64,
    pub added: i64,
    pub removed: i64,
}

impl DailyStockLine {
    /// Primeira movimentação do dia: a abertura é o saldo real antes dela.
    pub fn open(product_id: Uuid, size: &str, opening_stock: i64) -> Self {
        Self {
            product_id,
            size: size.to_string(),
            opening_stock,
            closing_stock: opening_stock,
            added: 0,
            removed: 0,
        }
    }

    pub fn record(&mut self, movement: &Movement) -> Result<(), AppError> {
        match movement.kind {
            AdjustmentType::Add => {
                self.added = self
                    .added
                    .checked_add(movement.applied)
                    .ok_or_else(|| overflow("total de entradas do dia"))?;
            }
            AdjustmentType::Remove => {
                self.removed = self
                    .removed
                    .checked_add(movement.applied)
                    .ok_or_else(|| overflow("total de saídas do dia"))?;
            }
        }
        self.closing_stock = movement.after;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyStockAggregate {
    pub date: NaiveDate,
    pub storeroom_id: String,
    pub records: Vec<DailyStockLine>,
}

impl DailyStockAggregate {
    pub fn new(date: NaiveDate, storeroom_id: &str) -> Self {
        Self {
            date,
            storeroom_id: storeroom_id.to_string(),
            records: Vec::new(),
        }
    }

    /// Atualiza (ou abre) a linha do produto/tamanho com a movimentação.
    /// Em caso de erro o consolidado não muda.
    pub fn record(
        &mut self,
        key: &StockKey,
        movement: &Movement,
    ) -> Result<&DailyStockLine, AppError> {
        let position = self
            .records
            .iter()
            .position(|r| r.product_id == key.product_id && r.size == key.size);

        let mut line = match position {
            Some(idx) => self.records[idx].clone(),
            None => DailyStockLine::open(key.product_id, &key.size, movement.before),
        };
        line.record(movement)?;

        let idx = match position {
            Some(idx) => {
                self.records[idx] = line;
                idx
            }
            None => {
                self.records.push(line);
                self.records.len() - 1
            }
        };
        Ok(&self.records[idx])
    }
}

// --- 5. Histórico (ActivityLog) ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub action: StockAction,
    pub product_id: Uuid,
    pub product_name: String,
    pub size: String,
    // Quantidade pedida
    pub quantity: i64,
    // Quantidade que de fato moveu o saldo
    pub applied_quantity: i64,
    pub storeroom_id: String,
    pub timestamp: DateTime<Utc>,
}

// Quem fez a movimentação
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub user_id: Uuid,
    pub username: String,
}

/// Movimentação já validada e resolvida, pronta para o repositório.
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub date: NaiveDate,
    pub key: StockKey,
    pub change: i64,
    pub kind: AdjustmentType,
    pub actor: Actor,
    pub product_name: String,
    pub timestamp: DateTime<Utc>,
}

impl StockAdjustment {
    pub fn log_entry(&self, movement: &Movement) -> ActivityLogEntry {
        ActivityLogEntry {
            id: Uuid::new_v4(),
            user_id: self.actor.user_id,
            username: self.actor.username.clone(),
            action: self.kind.into(),
            product_id: self.key.product_id,
            product_name: self.product_name.clone(),
            size: self.key.size.clone(),
            quantity: self.change,
            applied_quantity: movement.applied,
            storeroom_id: self.key.storeroom_id.clone(),
            timestamp: self.timestamp,
        }
    }
}

// Resposta de POST /stock/log
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentOutcome {
    pub daily_record: DailyStockAggregate,
    pub log: ActivityLogEntry,
    pub inventory_item: InventoryRecord,
}

// --- DTOs ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustmentPayload {
    // `YYYY-MM-DD` ou timestamp RFC 3339; ausente = hoje
    pub date: Option<String>,

    #[validate(length(min = 1, message = "O campo 'storeroomId' é obrigatório."))]
    pub storeroom_id: String,

    pub product_id: Uuid,

    #[validate(length(min = 1, message = "O campo 'size' é obrigatório."))]
    pub size: String,

    #[validate(range(
        min = 1,
        max = 1_000_000_000,
        message = "A quantidade deve ser um inteiro entre 1 e 1000000000."
    ))]
    pub change: i64,

    #[serde(rename = "type")]
    pub kind: AdjustmentType,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CalendarQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

// Linha do calendário com o produto resolvido
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarLine {
    pub product_id: Uuid,
    pub product: Option<ProductSummary>,
    pub size: String,
    pub opening_stock: i64,
    pub closing_stock: i64,
    pub added: i64,
    pub removed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub storeroom_id: String,
    pub records: Vec<CalendarLine>,
}

// src/handlers/stock.rs

use axum::{extract::State, Json};

use crate::{
    common::{
        error::AppError,
        extract::{ApiQuery, ValidatedJson},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{AdminOnly, RequireRole},
    },
    models::stock::{
        ActivityLogEntry, AdjustmentOutcome, CalendarDay, CalendarQuery, InventoryRecord,
        StockAdjustmentPayload,
    },
};

// Saldo atual de todas as chaves
#[utoipa::path(
    get,
    path = "/api/stock",
    tag = "Stock",
    responses(
        (status = 200, description = "Saldos atuais", body = [InventoryRecord])
    ),
    security(("api_jwt" = []))
)]
pub async fn get_inventory(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<InventoryRecord>>, AppError> {
    let inventory = app_state.ledger_service.list_inventory().await?;
    Ok(Json(inventory))
}

// Calendário (consolidados diários) para o admin
#[utoipa::path(
    get,
    path = "/api/stock/calendar",
    tag = "Stock",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Consolidados diários", body = [CalendarDay]),
        (status = 403, description = "Apenas administradores")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_stock_calendar(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    ApiQuery(query): ApiQuery<CalendarQuery>,
) -> Result<Json<Vec<CalendarDay>>, AppError> {
    let days = app_state.ledger_service.calendar(query).await?;
    Ok(Json(days))
}

// Histórico recente (auditoria)
#[utoipa::path(
    get,
    path = "/api/stock/logs",
    tag = "Stock",
    responses(
        (status = 200, description = "Até 100 movimentações, mais novas primeiro", body = [ActivityLogEntry]),
        (status = 403, description = "Apenas administradores")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_activity_logs(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
) -> Result<Json<Vec<ActivityLogEntry>>, AppError> {
    let logs = app_state.ledger_service.recent_logs().await?;
    Ok(Json(logs))
}

// Entrada/saída de estoque. Qualquer usuário autenticado pode movimentar.
#[utoipa::path(
    post,
    path = "/api/stock/log",
    tag = "Stock",
    request_body = StockAdjustmentPayload,
    responses(
        (status = 200, description = "Movimentação registrada", body = AdjustmentOutcome),
        (status = 400, description = "Payload ou data inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn log_stock_change(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<StockAdjustmentPayload>,
) -> Result<Json<AdjustmentOutcome>, AppError> {
    let outcome = app_state
        .ledger_service
        .record_adjustment(payload, user.actor())
        .await?;

    Ok(Json(outcome))
}

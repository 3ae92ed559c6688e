// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::get_me,

        // --- Products ---
        handlers::products::list_products,
        handlers::products::create_product,
        handlers::products::update_product,

        // --- Stock ---
        handlers::stock::get_inventory,
        handlers::stock::get_stock_calendar,
        handlers::stock::get_activity_logs,
        handlers::stock::log_stock_change,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::PublicUser,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Catalog ---
            models::catalog::SizeVariant,
            models::catalog::Product,
            models::catalog::ProductSummary,
            models::catalog::CreateProductPayload,
            models::catalog::UpdateProductPayload,

            // --- Stock ---
            models::stock::AdjustmentType,
            models::stock::StockAction,
            models::stock::InventoryRecord,
            models::stock::DailyStockLine,
            models::stock::DailyStockAggregate,
            models::stock::ActivityLogEntry,
            models::stock::AdjustmentOutcome,
            models::stock::StockAdjustmentPayload,
            models::stock::CalendarLine,
            models::stock::CalendarDay,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Products", description = "Catálogo de Produtos"),
        (name = "Stock", description = "Saldos, Movimentações e Auditoria")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

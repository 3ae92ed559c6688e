// src/handlers/products.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        extract::{ApiPath, ValidatedJson},
    },
    config::AppState,
    middleware::rbac::{AdminOnly, RequireRole},
    models::catalog::{CreateProductPayload, Product, UpdateProductPayload},
};

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Products",
    responses(
        (status = 200, description = "Produtos ativos", body = [Product])
    ),
    security(("api_jwt" = []))
)]
pub async fn list_products(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = app_state.catalog_service.list_active().await?;
    Ok(Json(products))
}

#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Products",
    request_body = CreateProductPayload,
    responses(
        (status = 201, description = "Produto criado", body = Product),
        (status = 400, description = "SKU já existe ou payload inválido"),
        (status = 403, description = "Apenas administradores")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    ValidatedJson(payload): ValidatedJson<CreateProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    let product = app_state.catalog_service.create_product(payload).await?;

    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    tag = "Products",
    request_body = UpdateProductPayload,
    params(
        ("id" = Uuid, Path, description = "ID do Produto")
    ),
    responses(
        (status = 200, description = "Produto atualizado", body = Product),
        (status = 400, description = "ID ou payload inválido"),
        (status = 403, description = "Apenas administradores"),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_product(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateProductPayload>,
) -> Result<Json<Product>, AppError> {
    let product = app_state.catalog_service.update_product(id, payload).await?;

    Ok(Json(product))
}

// src/services/seed.rs

use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    config::AppState,
    models::{
        auth::Role,
        catalog::{CreateProductPayload, SizeVariant},
    },
};

pub const DEMO_ADMIN_USERNAME: &str = "admin";
pub const DEMO_ADMIN_PASSWORD: &str = "Admin";

fn sizes(list: &[(&str, i64)]) -> Vec<SizeVariant> {
    list.iter()
        .map(|(size, price)| SizeVariant {
            size: size.to_string(),
            price: Decimal::from(*price),
        })
        .collect()
}

fn demo_products() -> Vec<CreateProductPayload> {
    vec![
        CreateProductPayload {
            name: "Milk".into(),
            sku: "MILK-001".into(),
            sizes: sizes(&[("500ml", 30), ("1 Ltr", 60), ("5 Ltr", 280)]),
        },
        CreateProductPayload {
            name: "Curd".into(),
            sku: "CURD-001".into(),
            sizes: sizes(&[("200g", 20), ("500g", 45), ("1 kg", 85)]),
        },
        CreateProductPayload {
            name: "Paneer".into(),
            sku: "PAN-001".into(),
            sizes: sizes(&[("200g", 90), ("500g", 210), ("1 kg", 400)]),
        },
    ]
}

/// Cria o admin de demonstração e o catálogo de exemplo. Pode rodar a cada
/// inicialização: o que já existe é mantido.
pub async fn seed_demo_data(state: &AppState) -> Result<(), AppError> {
    match state
        .auth_service
        .register_user(DEMO_ADMIN_USERNAME, DEMO_ADMIN_PASSWORD, Role::Admin)
        .await
    {
        Ok(_) => tracing::info!("🌱 Usuário admin criado: {} / {}", DEMO_ADMIN_USERNAME, DEMO_ADMIN_PASSWORD),
        Err(AppError::UsernameAlreadyExists) => {
            tracing::info!("🌱 Usuário admin já existe, mantido")
        }
        Err(e) => return Err(e),
    }

    let mut created = 0;
    for product in demo_products() {
        match state.catalog_service.create_product(product).await {
            Ok(_) => created += 1,
            Err(AppError::SkuAlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }
    }
    tracing::info!("🌱 {} produtos de exemplo criados", created);
    Ok(())
}

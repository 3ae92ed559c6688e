// src/models/catalog.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

// --- Variante de tamanho (ex: "1 Ltr") ---
// Cada tamanho tem o seu preço e o seu próprio saldo no estoque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct SizeVariant {
    #[validate(length(min = 1, message = "O tamanho é obrigatório."))]
    pub size: String,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    #[schema(value_type = f64)]
    pub price: Decimal,
}

// --- Produto (catálogo) ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub sizes: Vec<SizeVariant>,
    // Exclusão é só uma marca; o registro nunca some pela API.
    pub is_deleted: bool,
}

impl Product {
    pub fn new(payload: CreateProductPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: payload.name,
            sku: payload.sku,
            sizes: payload.sizes,
            is_deleted: false,
        }
    }

    /// Mescla os campos informados no produto existente.
    pub fn apply(&mut self, changes: UpdateProductPayload) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(sku) = changes.sku {
            self.sku = sku;
        }
        if let Some(sizes) = changes.sizes {
            self.sizes = sizes;
        }
        if let Some(is_deleted) = changes.is_deleted {
            self.is_deleted = is_deleted;
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProductPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,

    #[validate(length(min = 1, message = "O SKU é obrigatório."))]
    pub sku: String,

    #[validate(nested)]
    #[serde(default)]
    pub sizes: Vec<SizeVariant>,
}

// Atualização parcial: só os campos presentes são alterados.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductPayload {
    #[validate(length(min = 1, message = "O nome não pode ser vazio."))]
    pub name: Option<String>,

    #[validate(length(min = 1, message = "O SKU não pode ser vazio."))]
    pub sku: Option<String>,

    #[validate(nested)]
    pub sizes: Option<Vec<SizeVariant>>,

    pub is_deleted: Option<bool>,
}

// Resumo do produto usado no calendário de estoque
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
}

impl From<&Product> for ProductSummary {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            sku: product.sku.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milk() -> Product {
        Product::new(CreateProductPayload {
            name: "Milk".into(),
            sku: "MILK-001".into(),
            sizes: vec![SizeVariant { size: "1 Ltr".into(), price: Decimal::new(60, 0) }],
        })
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut product = milk();
        product.apply(UpdateProductPayload {
            name: Some("Toned Milk".into()),
            ..Default::default()
        });
        assert_eq!(product.name, "Toned Milk");
        assert_eq!(product.sku, "MILK-001");
        assert_eq!(product.sizes.len(), 1);
        assert!(!product.is_deleted);
    }

    #[test]
    fn negative_price_is_rejected() {
        let payload = CreateProductPayload {
            name: "Curd".into(),
            sku: "CURD-001".into(),
            sizes: vec![SizeVariant { size: "200g".into(), price: Decimal::new(-1, 0) }],
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn sizes_keep_their_order_in_json() {
        let json = serde_json::json!({
            "name": "Paneer",
            "sku": "PAN-001",
            "sizes": [{"size": "200g", "price": 90}, {"size": "1 kg", "price": 400}]
        });
        let payload: CreateProductPayload = serde_json::from_value(json).unwrap();
        let labels: Vec<_> = payload.sizes.iter().map(|s| s.size.as_str()).collect();
        assert_eq!(labels, ["200g", "1 kg"]);
    }
}

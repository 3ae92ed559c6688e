// src/services/catalog_service.rs

use std::sync::Arc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ProductRepository,
    models::catalog::{CreateProductPayload, Product, UpdateProductPayload},
};

#[derive(Clone)]
pub struct CatalogService {
    product_repo: Arc<dyn ProductRepository>,
}

impl CatalogService {
    pub fn new(product_repo: Arc<dyn ProductRepository>) -> Self {
        Self { product_repo }
    }

    pub async fn list_active(&self) -> Result<Vec<Product>, AppError> {
        self.product_repo.list_active().await
    }

    pub async fn create_product(&self, payload: CreateProductPayload) -> Result<Product, AppError> {
        let product = self.product_repo.create_product(&Product::new(payload)).await?;
        tracing::info!("📦 Produto '{}' ({}) criado", product.name, product.sku);
        Ok(product)
    }

    /// Mescla os campos informados no produto. Um SKU novo não pode
    /// pertencer a outro produto.
    pub async fn update_product(
        &self,
        id: Uuid,
        changes: UpdateProductPayload,
    ) -> Result<Product, AppError> {
        let mut product = self
            .product_repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::ProductNotFound)?;

        product.apply(changes);
        self.product_repo.update_product(&product).await
    }

    pub async fn product_name(&self, id: Uuid) -> Result<Option<String>, AppError> {
        Ok(self.product_repo.find_by_id(id).await?.map(|p| p.name))
    }

    pub async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Product>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.product_repo.find_by_ids(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::MemoryStore, models::catalog::SizeVariant};
    use rust_decimal::Decimal;

    fn payload(name: &str, sku: &str) -> CreateProductPayload {
        CreateProductPayload {
            name: name.into(),
            sku: sku.into(),
            sizes: vec![
                SizeVariant { size: "500ml".into(), price: Decimal::new(30, 0) },
                SizeVariant { size: "1 Ltr".into(), price: Decimal::new(60, 0) },
            ],
        }
    }

    #[tokio::test]
    async fn duplicate_sku_conflicts() {
        let catalog = CatalogService::new(Arc::new(MemoryStore::new()));
        catalog.create_product(payload("Milk", "MILK-001")).await.unwrap();
        let err = catalog.create_product(payload("Leite", "MILK-001")).await.unwrap_err();
        assert!(matches!(err, AppError::SkuAlreadyExists(sku) if sku == "MILK-001"));
    }

    #[tokio::test]
    async fn update_merges_and_soft_delete_hides() {
        let catalog = CatalogService::new(Arc::new(MemoryStore::new()));
        let milk = catalog.create_product(payload("Milk", "MILK-001")).await.unwrap();
        catalog.create_product(payload("Curd", "CURD-001")).await.unwrap();

        let renamed = catalog
            .update_product(
                milk.id,
                UpdateProductPayload { name: Some("Full Cream Milk".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Full Cream Milk");
        assert_eq!(renamed.sizes, milk.sizes);

        catalog
            .update_product(milk.id, UpdateProductPayload { is_deleted: Some(true), ..Default::default() })
            .await
            .unwrap();
        let names: Vec<_> = catalog.list_active().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["Curd"]);
    }

    #[tokio::test]
    async fn updating_missing_product_is_not_found() {
        let catalog = CatalogService::new(Arc::new(MemoryStore::new()));
        let err = catalog
            .update_product(Uuid::new_v4(), UpdateProductPayload::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProductNotFound));
    }
}

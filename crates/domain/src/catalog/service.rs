//! Catalog service providing a simplified API for product operations.

use chrono::Utc;
use common::AggregateId;
use document_store::DocumentStore;

use crate::error::DomainError;
use crate::repository::Repository;
use crate::value_objects::{Money, ProductId};

use super::{CatalogError, NewProduct, Product, Quote};

/// A product line to take out of stock.
#[derive(Debug, Clone, PartialEq)]
pub struct StockLine<'a> {
    pub product_id: ProductId,
    pub variant_id: Option<&'a str>,
    pub quantity: u32,
}

/// Service for managing the product catalog.
pub struct CatalogService<S: DocumentStore> {
    products: Repository<S, Product>,
}

impl<S: DocumentStore> CatalogService<S> {
    /// Creates a new catalog service with the given document store.
    pub fn new(store: S) -> Self {
        Self {
            products: Repository::new(store),
        }
    }

    /// Returns a reference to the product repository.
    pub fn repository(&self) -> &Repository<S, Product> {
        &self.products
    }

    /// Adds a product to the catalog.
    #[tracing::instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create_product(&self, new: NewProduct) -> Result<Product, DomainError> {
        let product = Product::create(ProductId::new(), new, Utc::now())?;
        let product = self.products.insert(product).await?;

        metrics::counter!("catalog_products_created_total").increment(1);
        tracing::info!(product_id = %product.product_id(), "Product created");

        Ok(product)
    }

    /// Gets a product by id.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, DomainError> {
        self.products.load(Self::aggregate_id(id)).await
    }

    /// Lists products, newest first.
    pub async fn list_products(
        &self,
        active_only: bool,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Product>, DomainError> {
        let mut query = self.products.query().limit(limit).offset(offset);
        if active_only {
            query = query.field("isActive", true);
        }
        self.products.find(query).await
    }

    /// Changes a product's base price.
    #[tracing::instrument(skip(self))]
    pub async fn update_price(&self, id: ProductId, price: Money) -> Result<Product, DomainError> {
        let product = self.load_product(id).await?;
        let result = self
            .products
            .execute(product, |p| p.update_price(price, Utc::now()))
            .await?;
        Ok(result.aggregate)
    }

    /// Takes a product off sale. It stays readable but can no longer be
    /// added to carts or ordered.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate_product(&self, id: ProductId) -> Result<Product, DomainError> {
        let product = self.load_product(id).await?;
        let result = self
            .products
            .execute(product, |p| {
                p.deactivate(Utc::now());
                Ok::<_, CatalogError>(())
            })
            .await?;
        tracing::info!(product_id = %id, "Product deactivated");
        Ok(result.aggregate)
    }

    /// Returns the current line data for a purchase.
    pub async fn quote(
        &self,
        product_id: ProductId,
        variant_id: Option<&str>,
        quantity: u32,
    ) -> Result<Quote, DomainError> {
        let product = self.load_product(product_id).await?;
        Ok(product.quote(variant_id, quantity)?)
    }

    /// Takes sold units out of stock.
    ///
    /// Best effort: the sale has already happened, so a line that cannot be
    /// decremented is logged and skipped rather than failing the caller.
    pub async fn decrement_stock(&self, lines: &[StockLine<'_>]) {
        for line in lines {
            if let Err(e) = self.decrement_line(line).await {
                metrics::counter!("catalog_stock_decrement_failures_total").increment(1);
                tracing::warn!(
                    product_id = %line.product_id,
                    variant_id = ?line.variant_id,
                    quantity = line.quantity,
                    error = %e,
                    "Failed to decrement stock"
                );
            }
        }
    }

    async fn decrement_line(&self, line: &StockLine<'_>) -> Result<(), DomainError> {
        let product = self.load_product(line.product_id).await?;
        self.products
            .execute(product, |p| {
                p.decrement_stock(line.variant_id, line.quantity, Utc::now())
            })
            .await?;
        Ok(())
    }

    async fn load_product(&self, id: ProductId) -> Result<Product, DomainError> {
        self.products
            .load(Self::aggregate_id(id))
            .await?
            .ok_or_else(|| CatalogError::ProductNotFound(id).into())
    }

    fn aggregate_id(id: ProductId) -> AggregateId {
        AggregateId::from_uuid(id.as_uuid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use document_store::InMemoryDocumentStore;

    fn new_product(name: &str, cents: i64, stock: u32) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            price: Money::from_cents(cents),
            stock,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get_product() {
        let service = CatalogService::new(InMemoryDocumentStore::new());

        let product = service.create_product(new_product("Lamp", 4500, 3)).await.unwrap();
        let loaded = service.get_product(product.product_id()).await.unwrap().unwrap();

        assert_eq!(loaded.name(), "Lamp");
        assert_eq!(loaded.price(), Money::from_cents(4500));
    }

    #[tokio::test]
    async fn test_quote_missing_product() {
        let service = CatalogService::new(InMemoryDocumentStore::new());

        let result = service.quote(ProductId::new(), None, 1).await;

        assert!(matches!(
            result,
            Err(DomainError::Catalog(CatalogError::ProductNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_price_persists_history() {
        let service = CatalogService::new(InMemoryDocumentStore::new());
        let product = service.create_product(new_product("Lamp", 4500, 3)).await.unwrap();

        service
            .update_price(product.product_id(), Money::from_cents(3999))
            .await
            .unwrap();

        let loaded = service.get_product(product.product_id()).await.unwrap().unwrap();
        assert_eq!(loaded.price(), Money::from_cents(3999));
        assert_eq!(loaded.price_history().len(), 1);
    }

    #[tokio::test]
    async fn test_deactivated_product_cannot_be_quoted() {
        let service = CatalogService::new(InMemoryDocumentStore::new());
        let lamp = service.create_product(new_product("Lamp", 4500, 3)).await.unwrap();

        let product = service.deactivate_product(lamp.product_id()).await.unwrap();
        assert!(!product.is_active());

        let result = service.quote(lamp.product_id(), None, 1).await;
        assert!(matches!(
            result,
            Err(DomainError::Catalog(CatalogError::ProductUnavailable(_)))
        ));
        let active = service.list_products(true, 10, 0).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_decrement_stock_is_best_effort() {
        let service = CatalogService::new(InMemoryDocumentStore::new());
        let lamp = service.create_product(new_product("Lamp", 4500, 3)).await.unwrap();
        let desk = service.create_product(new_product("Desk", 19900, 1)).await.unwrap();

        service
            .decrement_stock(&[
                StockLine {
                    product_id: lamp.product_id(),
                    variant_id: None,
                    quantity: 2,
                },
                StockLine {
                    product_id: desk.product_id(),
                    variant_id: None,
                    quantity: 5,
                },
                StockLine {
                    product_id: ProductId::new(),
                    variant_id: None,
                    quantity: 1,
                },
            ])
            .await;

        let lamp = service.get_product(lamp.product_id()).await.unwrap().unwrap();
        let desk = service.get_product(desk.product_id()).await.unwrap().unwrap();
        assert_eq!(lamp.stock(), 1);
        assert_eq!(desk.stock(), 1);
    }

    #[tokio::test]
    async fn test_list_products_filters_inactive() {
        let store = InMemoryDocumentStore::new();
        let service = CatalogService::new(store);
        service.create_product(new_product("Lamp", 4500, 3)).await.unwrap();
        let desk = service.create_product(new_product("Desk", 19900, 1)).await.unwrap();

        let repo = service.repository();
        let desk = repo.load_existing(desk.id()).await.unwrap();
        repo.execute(desk, |p| {
            p.deactivate(Utc::now());
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(service.list_products(true, 10, 0).await.unwrap().len(), 1);
        assert_eq!(service.list_products(false, 10, 0).await.unwrap().len(), 2);
    }
}

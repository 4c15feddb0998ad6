//! Product aggregate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::AggregateId;
use document_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::value_objects::{Money, ProductId, VariantSelection};

use super::CatalogError;

/// Highest price a product or variant may carry ($1,000,000.00).
pub const MAX_PRICE: Money = Money::from_cents(100_000_000);

fn validate_price(price: Money) -> Result<(), CatalogError> {
    if !price.is_positive() || price > MAX_PRICE {
        return Err(CatalogError::InvalidPrice(price));
    }
    Ok(())
}

/// A purchasable variant of a product (e.g. a size/color combination).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    pub attributes: BTreeMap<String, String>,
    /// Overrides the product price when set.
    pub price: Option<Money>,
    pub stock: u32,
    pub image: Option<String>,
}

impl Variant {
    pub fn selection(&self) -> VariantSelection {
        VariantSelection {
            id: self.id.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

/// A recorded price change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub previous_price: Money,
    pub price: Money,
    pub changed_at: DateTime<Utc>,
}

/// Variant data supplied when creating a product.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVariant {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub image: Option<String>,
}

/// Product data supplied when creating a product.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub variants: Vec<NewVariant>,
}

/// Authoritative line data for a purchase: the catalog's current name, price
/// and image for a product or one of its variants.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub image: Option<String>,
    pub variant: Option<VariantSelection>,
}

/// Product aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: ProductId,

    #[serde(skip)]
    version: Version,

    name: String,
    description: Option<String>,
    price: Money,
    thumbnail: Option<String>,
    images: Vec<String>,

    /// Stock of the base product; variants track their own.
    stock: u32,
    variants: Vec<Variant>,
    is_active: bool,
    price_history: Vec<PriceChange>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Aggregate for Product {
    type Error = CatalogError;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn collection() -> &'static str {
        "products"
    }

    fn id(&self) -> AggregateId {
        AggregateId::from_uuid(self.id.as_uuid())
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

// Query methods
impl Product {
    pub fn product_id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn price_history(&self) -> &[PriceChange] {
        &self.price_history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// First image to show for the product.
    pub fn primary_image(&self) -> Option<&str> {
        self.thumbnail
            .as_deref()
            .or_else(|| self.images.first().map(String::as_str))
    }
}

// Command methods
impl Product {
    /// Validates and builds a new active product.
    pub fn create(
        id: ProductId,
        new: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::InvalidProduct("name is required".to_string()));
        }
        validate_price(new.price)?;

        let mut variants: Vec<Variant> = Vec::with_capacity(new.variants.len());
        for v in new.variants {
            if let Some(price) = v.price {
                validate_price(price)?;
            }
            let id = v
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            if variants
                .iter()
                .any(|existing| existing.id == id || existing.attributes == v.attributes)
            {
                return Err(CatalogError::InvalidProduct(format!(
                    "duplicate variant {id}"
                )));
            }
            variants.push(Variant {
                id,
                attributes: v.attributes,
                price: v.price,
                stock: v.stock,
                image: v.image,
            });
        }

        Ok(Self {
            id,
            version: Version::initial(),
            name,
            description: new.description,
            price: new.price,
            thumbnail: new.thumbnail,
            images: new.images,
            stock: new.stock,
            variants,
            is_active: true,
            price_history: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Quotes `quantity` units of the product or one of its variants.
    pub fn quote(&self, variant_id: Option<&str>, quantity: u32) -> Result<Quote, CatalogError> {
        if !self.is_active {
            return Err(CatalogError::ProductUnavailable(self.id));
        }

        let (unit_price, available, image, variant) = match variant_id {
            Some(variant_id) => {
                let variant = self.variant(variant_id).ok_or_else(|| {
                    CatalogError::VariantNotFound {
                        product_id: self.id,
                        variant_id: variant_id.to_string(),
                    }
                })?;
                (
                    variant.price.unwrap_or(self.price),
                    variant.stock,
                    variant
                        .image
                        .clone()
                        .or_else(|| self.primary_image().map(str::to_string)),
                    Some(variant.selection()),
                )
            }
            None => (
                self.price,
                self.stock,
                self.primary_image().map(str::to_string),
                None,
            ),
        };

        if quantity > available {
            return Err(CatalogError::InsufficientStock {
                product_id: self.id,
                requested: quantity,
                available,
            });
        }

        Ok(Quote {
            product_id: self.id,
            name: self.name.clone(),
            unit_price,
            image,
            variant,
        })
    }

    /// Changes the base price, recording the previous one.
    pub fn update_price(&mut self, price: Money, now: DateTime<Utc>) -> Result<(), CatalogError> {
        validate_price(price)?;
        if price == self.price {
            return Ok(());
        }

        self.price_history.push(PriceChange {
            previous_price: self.price,
            price,
            changed_at: now,
        });
        self.price = price;
        self.updated_at = now;
        Ok(())
    }

    /// Removes sold units from stock.
    pub fn decrement_stock(
        &mut self,
        variant_id: Option<&str>,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), CatalogError> {
        let product_id = self.id;
        let stock = match variant_id {
            Some(variant_id) => {
                &mut self
                    .variants
                    .iter_mut()
                    .find(|v| v.id == variant_id)
                    .ok_or_else(|| CatalogError::VariantNotFound {
                        product_id,
                        variant_id: variant_id.to_string(),
                    })?
                    .stock
            }
            None => &mut self.stock,
        };

        if quantity > *stock {
            return Err(CatalogError::InsufficientStock {
                product_id,
                requested: quantity,
                available: *stock,
            });
        }
        *stock -= quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Takes the product off sale.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }
}

//! # Data Transfer Objects
//!
//! Wire shapes exchanged with controllers, and their mapping to entities.
//!
//! ```text
//! CreateCategoryDto ──into_entity()──► Category ──(stage + save)──►
//! CategoryWithProducts ──From──► CategoryDto { product_count }
//!
//! UpdateProductDto ──apply_to(&mut Product)──► (stage + save) ──►
//! ProductWithCategory ──From──► ProductDto { category_name }
//! ```
//!
//! TypeScript definitions are exported with `ts-rs` so a frontend can
//! consume the same shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Category, CategoryWithProducts, Product, ProductWithCategory};

// =============================================================================
// Category DTOs
// =============================================================================

/// Category as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDto {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of non-deleted products in the category.
    pub product_count: usize,
}

/// Payload for creating a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryDto {
    pub name: String,
    pub description: String,
}

/// Payload for updating a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryDto {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl From<&CategoryWithProducts> for CategoryDto {
    fn from(view: &CategoryWithProducts) -> Self {
        let category = &view.category;
        CategoryDto {
            id: category.id,
            name: category.name.clone(),
            description: category.description.clone(),
            created_at: category.created_at,
            updated_at: category.updated_at,
            product_count: view.product_count(),
        }
    }
}

impl CreateCategoryDto {
    /// Builds a transient category from the payload.
    pub fn into_entity(self) -> Category {
        Category::new(self.name, self.description)
    }
}

impl UpdateCategoryDto {
    /// Copies the mutable fields onto an existing category.
    ///
    /// Identity, timestamps and the soft-delete flag are left alone.
    pub fn apply_to(&self, category: &mut Category) {
        category.name = self.name.clone();
        category.description = self.description.clone();
    }
}

// =============================================================================
// Product DTOs
// =============================================================================

/// Product as returned to callers, flattened with its category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i64,
    pub category_id: i64,
    pub category_name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductDto {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i64,
    pub category_id: i64,
}

/// Payload for updating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductDto {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i64,
    pub category_id: i64,
}

impl From<&ProductWithCategory> for ProductDto {
    fn from(view: &ProductWithCategory) -> Self {
        let product = &view.product;
        ProductDto {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price_cents: product.price_cents,
            stock: product.stock,
            category_id: product.category_id,
            category_name: view.category.name.clone(),
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

impl CreateProductDto {
    /// Builds a transient product from the payload.
    pub fn into_entity(self) -> Product {
        Product::new(
            self.name,
            self.description,
            Money::from_cents(self.price_cents),
            self.stock,
            self.category_id,
        )
    }
}

impl UpdateProductDto {
    /// Copies the mutable fields onto an existing product.
    pub fn apply_to(&self, product: &mut Product) {
        product.name = self.name.clone();
        product.description = self.description.clone();
        product.price_cents = self.price_cents;
        product.stock = self.stock;
        product.category_id = self.category_id;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn beverages() -> Category {
        let mut category = Category::new("Beverages", "Drinks");
        category.id = 1;
        category
    }

    #[test]
    fn test_category_dto_counts_products() {
        let mut cola = Product::new("Cola", "Fizzy", Money::from_cents(150), 10, 1);
        cola.id = 1;
        let view = CategoryWithProducts {
            category: beverages(),
            products: vec![cola],
        };

        let dto = CategoryDto::from(&view);
        assert_eq!(dto.id, 1);
        assert_eq!(dto.name, "Beverages");
        assert_eq!(dto.product_count, 1);
    }

    #[test]
    fn test_product_dto_flattens_category_name() {
        let mut cola = Product::new("Cola", "Fizzy", Money::from_cents(150), 10, 1);
        cola.id = 7;
        let view = ProductWithCategory {
            product: cola,
            category: beverages(),
        };

        let dto = ProductDto::from(&view);
        assert_eq!(dto.id, 7);
        assert_eq!(dto.category_name, "Beverages");
        assert_eq!(dto.price_cents, 150);
    }

    #[test]
    fn test_update_dto_preserves_identity_and_timestamps() {
        let mut category = beverages();
        let created_at = category.created_at;
        let dto = UpdateCategoryDto {
            id: 1,
            name: "Drinks".to_string(),
            description: "Cold and hot".to_string(),
        };

        dto.apply_to(&mut category);
        assert_eq!(category.id, 1);
        assert_eq!(category.name, "Drinks");
        assert_eq!(category.created_at, created_at);
        assert!(category.updated_at.is_none());
    }

    #[test]
    fn test_create_product_dto_builds_transient_entity() {
        let dto = CreateProductDto {
            name: "Cola".to_string(),
            description: "Fizzy".to_string(),
            price_cents: 150,
            stock: 10,
            category_id: 1,
        };
        let product = dto.into_entity();
        assert!(product.is_transient());
        assert_eq!(product.price(), Money::from_cents(150));
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let json = serde_json::to_value(CreateProductDto {
            name: "Cola".to_string(),
            description: "Fizzy".to_string(),
            price_cents: 150,
            stock: 10,
            category_id: 1,
        })
        .unwrap();

        assert_eq!(json["priceCents"], 150);
        assert_eq!(json["categoryId"], 1);
    }
}

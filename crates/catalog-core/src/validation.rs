//! # Validation Module
//!
//! Input validation for catalog writes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Controller (external)                                        │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Service (Rust)                                               │
//! │  └── THIS MODULE: field rules on DTOs                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── Partial UNIQUE index on active category names                     │
//! │  └── Foreign key products.category_id → categories.id (RESTRICT)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lengths are counted in characters, not bytes.
//!
//! ## Usage
//! ```rust
//! use catalog_core::validation::{validate_name, validate_stock};
//!
//! validate_name("Beverages").unwrap();
//! assert!(validate_stock(-1).is_err());
//! ```

use crate::dto::{CreateCategoryDto, CreateProductDto, UpdateCategoryDto, UpdateProductDto};
use crate::error::ValidationError;
use crate::{MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a category or product name.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most 100 characters
pub fn validate_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, MAX_NAME_LENGTH)
}

/// Validates a category or product description.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most 500 characters
pub fn validate_description(description: &str) -> ValidationResult<()> {
    validate_text("description", description, MAX_DESCRIPTION_LENGTH)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an entity id supplied by a caller.
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a price in cents. Zero is allowed.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Validates a stock level. Zero is allowed.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::Negative {
            field: "stock".to_string(),
        });
    }
    Ok(())
}

/// Checks that the id in a request path matches the id in its body.
pub fn validate_matching_id(expected: i64, actual: i64) -> ValidationResult<()> {
    if expected != actual {
        return Err(ValidationError::Mismatch {
            field: "id".to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

// =============================================================================
// DTO Validators
// =============================================================================

impl CreateCategoryDto {
    /// Applies the category field rules.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        validate_description(&self.description)
    }
}

impl UpdateCategoryDto {
    /// Applies the category field rules plus a positive id.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_id("id", self.id)?;
        validate_name(&self.name)?;
        validate_description(&self.description)
    }
}

impl CreateProductDto {
    /// Applies the product field rules.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        validate_description(&self.description)?;
        validate_price_cents(self.price_cents)?;
        validate_stock(self.stock)?;
        validate_id("category_id", self.category_id)
    }
}

impl UpdateProductDto {
    /// Applies the product field rules plus a positive id.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_id("id", self.id)?;
        validate_name(&self.name)?;
        validate_description(&self.description)?;
        validate_price_cents(self.price_cents)?;
        validate_stock(self.stock)?;
        validate_id("category_id", self.category_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Beverages").is_ok());
        assert!(validate_name(&"a".repeat(100)).is_ok());

        assert!(matches!(
            validate_name("   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_name(&"a".repeat(101)),
            Err(ValidationError::TooLong { max: 100, .. })
        ));
    }

    #[test]
    fn test_lengths_count_characters_not_bytes() {
        // 100 two-byte characters is still within the limit
        assert!(validate_name(&"é".repeat(100)).is_ok());
        assert!(validate_description(&"ü".repeat(500)).is_ok());
        assert!(validate_description(&"ü".repeat(501)).is_err());
    }

    #[test]
    fn test_numeric_rules() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(-5).is_err());
        assert!(validate_id("id", 1).is_ok());
        assert!(validate_id("id", 0).is_err());
    }

    #[test]
    fn test_matching_id() {
        assert!(validate_matching_id(3, 3).is_ok());
        assert_eq!(
            validate_matching_id(3, 4).unwrap_err().to_string(),
            "id mismatch: expected 3, got 4"
        );
    }

    #[test]
    fn test_update_category_requires_positive_id() {
        let dto = UpdateCategoryDto {
            id: 0,
            name: "Beverages".to_string(),
            description: "Drinks".to_string(),
        };
        assert!(matches!(
            dto.validate(),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_create_product_reports_first_failure() {
        let dto = CreateProductDto {
            name: "Cola".to_string(),
            description: "Fizzy".to_string(),
            price_cents: -10,
            stock: -1,
            category_id: 1,
        };
        assert_eq!(dto.validate().unwrap_err().to_string(), "price cannot be negative");
    }
}

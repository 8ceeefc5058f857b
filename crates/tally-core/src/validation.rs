//! # Validation Module
//!
//! Record validation run before anything reaches the Local Store.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI layer (collaborator, out of scope)                        │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Record-level rules before save_and_queue                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store (SQLite)                                               │
//! │  └── NOT NULL / PRIMARY KEY constraints                                │
//! │                                                                         │
//! │  Defense in depth: a record rejected here never costs a sync cycle     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{Product, Supplier, SystemUser, Transaction};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length for display names.
pub const MAX_NAME_LEN: usize = 200;

/// Maximum length for free-text notes and descriptions.
pub const MAX_TEXT_LEN: usize = 2000;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a record id (UUID v4 string).
pub fn validate_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates an owning-business id. Any non-empty identifier is accepted;
/// the remote system owns the business registry.
pub fn validate_business_id(business_id: &str) -> ValidationResult<()> {
    if business_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "business_id".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (products, users, suppliers).
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a price or cost in cents. Zero is allowed (free items).
pub fn validate_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates an email address. Intentionally shallow: presence and shape
/// only, deliverability is the remote system's problem.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    let looks_valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
    });

    if !looks_valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates a product before it is written and queued.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_id(&product.id)?;
    validate_business_id(&product.business_id)?;
    validate_name(&product.name)?;
    validate_cents("price", product.price_cents)?;

    if let Some(cost) = product.cost_cents {
        validate_cents("cost", cost)?;
    }

    if product.sku.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if let Some(ref description) = product.description {
        if description.len() > MAX_TEXT_LEN {
            return Err(ValidationError::TooLong {
                field: "description".to_string(),
                max: MAX_TEXT_LEN,
            });
        }
    }

    Ok(())
}

/// Validates a transaction before it is written and queued.
pub fn validate_transaction(tx: &Transaction) -> ValidationResult<()> {
    validate_id(&tx.id)?;
    validate_business_id(&tx.business_id)?;
    validate_cents("unit_price", tx.unit_price_cents)?;
    validate_cents("total", tx.total_cents)?;

    if tx.quantity == 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a system user before it is written and queued.
pub fn validate_user(user: &SystemUser) -> ValidationResult<()> {
    validate_id(&user.id)?;
    validate_business_id(&user.business_id)?;
    validate_name(&user.name)?;
    validate_email(&user.email)?;

    Ok(())
}

/// Validates a supplier before it is written and queued.
pub fn validate_supplier(supplier: &Supplier) -> ValidationResult<()> {
    validate_id(&supplier.id)?;
    validate_business_id(&supplier.business_id)?;
    validate_name(&supplier.name)?;

    if let Some(ref email) = supplier.email {
        validate_email(email)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionKind;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("owner@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("name@nodot").is_err());
    }

    #[test]
    fn test_validate_product() {
        let mut product = Product::new("biz-1", "COKE-330", "Coca-Cola 330ml", 199);
        assert!(validate_product(&product).is_ok());

        product.price_cents = -1;
        assert!(validate_product(&product).is_err());

        product.price_cents = 199;
        product.sku = "  ".to_string();
        assert!(validate_product(&product).is_err());
    }

    #[test]
    fn test_validate_transaction_rejects_zero_quantity() {
        let product = Product::new("biz-1", "COKE-330", "Coca-Cola 330ml", 199);
        let mut tx = Transaction::new("biz-1", &product, TransactionKind::Sale, -2);
        assert!(validate_transaction(&tx).is_ok());

        tx.quantity = 0;
        assert!(validate_transaction(&tx).is_err());
    }

    #[test]
    fn test_validate_user() {
        let mut user = SystemUser::new("biz-1", "Ada", "ada@example.com", crate::types::UserRole::Owner);
        assert!(validate_user(&user).is_ok());

        user.email = "bad".to_string();
        assert!(validate_user(&user).is_err());
    }
}

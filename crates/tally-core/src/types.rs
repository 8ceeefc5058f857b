//! # Domain Types
//!
//! Record types persisted by the Local Store and replicated to the remote
//! system of record.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  Transaction    │   │  SystemUser     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  business_id    │   │  business_id    │   │  business_id    │       │
//! │  │  sku / name     │   │  date (indexed) │   │  role           │       │
//! │  │  price_cents    │   │  total_cents    │   │  email          │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │    Supplier     │   │   Collection    │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  id (UUID)      │   │  Products       │                             │
//! │  │  business_id    │   │  Transactions   │                             │
//! │  │  contact info   │   │  Users          │                             │
//! │  └─────────────────┘   │  Suppliers      │                             │
//! │                        └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity Pattern
//! Every record has:
//! - `id`: UUID v4 - globally unique, assigned at creation, never reused
//! - `business_id`: the owning business, for multi-tenant isolation

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

// =============================================================================
// Collection
// =============================================================================

/// The named record collections held by the Local Store.
///
/// Each collection maps to one durable table; the variant names double as
/// the wire-level collection names exchanged with the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Sellable products and their inventory levels.
    Products,
    /// Sales, restocks, and stock adjustments. Indexed by date.
    Transactions,
    /// System users (owner, managers, cashiers).
    Users,
    /// Suppliers for restocking.
    Suppliers,
}

impl Collection {
    /// All business collections, in sync-pull order.
    pub const ALL: [Collection; 4] = [
        Collection::Products,
        Collection::Transactions,
        Collection::Users,
        Collection::Suppliers,
    ];

    /// The durable table backing this collection.
    pub const fn table(&self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Transactions => "transactions",
            Collection::Users => "users",
            Collection::Suppliers => "suppliers",
        }
    }

    /// Whether this collection carries a secondary date index.
    pub const fn has_date_index(&self) -> bool {
        matches!(self, Collection::Transactions)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

impl std::str::FromStr for Collection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "products" => Ok(Collection::Products),
            "transactions" => Ok(Collection::Transactions),
            "users" => Ok(Collection::Users),
            "suppliers" => Ok(Collection::Suppliers),
            other => Err(CoreError::UnknownCollection(other.to_string())),
        }
    }
}

// =============================================================================
// Record Trait
// =============================================================================

/// A persisted entity belonging to one [`Collection`].
///
/// The store persists records as JSON payloads with the identity and
/// owning-business columns extracted for indexing, so every record type
/// only needs to expose those fields plus serde support.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// The collection this record type lives in.
    const COLLECTION: Collection;

    /// Globally unique record id (UUID v4 string).
    fn id(&self) -> &str;

    /// The owning business id (multi-tenant isolation).
    fn business_id(&self) -> &str;

    /// Value for the collection's secondary date index, if it has one.
    fn indexed_date(&self) -> Option<DateTime<Utc>> {
        None
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business this product belongs to.
    pub business_id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown at the register and on receipts.
    pub name: String,

    /// Category for grouping ("beverages", "dairy", ...).
    pub category: Option<String>,

    /// Optional description (may be AI-enhanced by the app layer).
    pub description: Option<String>,

    /// Price in cents (smallest currency unit - never floats).
    pub price_cents: i64,

    /// Cost in cents (for margin reporting).
    pub cost_cents: Option<i64>,

    /// Current stock level.
    pub stock: i64,

    /// Reorder threshold for low-stock alerts.
    pub min_stock: Option<i64>,

    /// Whether the product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new product with a generated id and fresh timestamps.
    pub fn new(business_id: impl Into<String>, sku: impl Into<String>, name: impl Into<String>, price_cents: i64) -> Self {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.into(),
            sku: sku.into(),
            name: name.into(),
            category: None,
            description: None,
            price_cents,
            cost_cents: None,
            stock: 0,
            min_stock: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether stock has fallen to or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        match self.min_stock {
            Some(min) => self.stock <= min,
            None => false,
        }
    }
}

impl Record for Product {
    const COLLECTION: Collection = Collection::Products;

    fn id(&self) -> &str {
        &self.id
    }

    fn business_id(&self) -> &str {
        &self.business_id
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// The kind of inventory movement a transaction represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Stock left the store through a sale.
    Sale,
    /// Stock arrived from a supplier.
    Restock,
    /// Manual correction (shrinkage, stocktake, damage).
    Adjustment,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Sale => write!(f, "sale"),
            TransactionKind::Restock => write!(f, "restock"),
            TransactionKind::Adjustment => write!(f, "adjustment"),
        }
    }
}

/// An inventory transaction (sale, restock, or adjustment).
///
/// Product name and price are snapshotted at transaction time so later
/// product edits never rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub business_id: String,
    /// Product this transaction moves stock for.
    pub product_id: String,
    /// Product name at transaction time (frozen).
    pub product_name: String,
    pub kind: TransactionKind,
    /// Signed quantity: negative for sales, positive for restocks.
    pub quantity: i64,
    /// Unit price in cents at transaction time (frozen).
    pub unit_price_cents: i64,
    /// Total value in cents (unit price × |quantity|).
    pub total_cents: i64,
    /// User who recorded the transaction.
    pub user_id: Option<String>,
    pub note: Option<String>,
    /// Business date of the transaction. Secondary index.
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a new transaction dated now.
    pub fn new(
        business_id: impl Into<String>,
        product: &Product,
        kind: TransactionKind,
        quantity: i64,
    ) -> Self {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.into(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            kind,
            quantity,
            unit_price_cents: product.price_cents,
            total_cents: product.price_cents * quantity.abs(),
            user_id: None,
            note: None,
            date: now,
            created_at: now,
        }
    }
}

impl Record for Transaction {
    const COLLECTION: Collection = Collection::Transactions;

    fn id(&self) -> &str {
        &self.id
    }

    fn business_id(&self) -> &str {
        &self.business_id
    }

    fn indexed_date(&self) -> Option<DateTime<Utc>> {
        Some(self.date)
    }
}

// =============================================================================
// System User
// =============================================================================

/// Role of a system user within the owning business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full control, including business settings.
    Owner,
    /// Inventory and reporting access.
    Manager,
    /// Register operations only.
    Cashier,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Owner => write!(f, "owner"),
            UserRole::Manager => write!(f, "manager"),
            UserRole::Cashier => write!(f, "cashier"),
        }
    }
}

/// A user of the system. Authentication lives outside this layer; this is
/// the persisted profile the UI reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemUser {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SystemUser {
    /// Creates a new user with a generated id and fresh timestamps.
    pub fn new(
        business_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        role: UserRole,
    ) -> Self {
        let now = Utc::now();
        SystemUser {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.into(),
            name: name.into(),
            email: email.into(),
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for SystemUser {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &str {
        &self.id
    }

    fn business_id(&self) -> &str {
        &self.business_id
    }
}

// =============================================================================
// Supplier
// =============================================================================

/// A supplier the business restocks from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Supplier {
    /// Creates a new supplier with a generated id and fresh timestamps.
    pub fn new(business_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Supplier {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.into(),
            name: name.into(),
            contact_name: None,
            phone: None,
            email: None,
            address: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Supplier {
    const COLLECTION: Collection = Collection::Suppliers;

    fn id(&self) -> &str {
        &self.id
    }

    fn business_id(&self) -> &str {
        &self.business_id
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_table_names() {
        assert_eq!(Collection::Products.table(), "products");
        assert_eq!(Collection::Transactions.table(), "transactions");
        assert_eq!(Collection::Users.table(), "users");
        assert_eq!(Collection::Suppliers.table(), "suppliers");
    }

    #[test]
    fn test_collection_round_trip() {
        for c in Collection::ALL {
            let parsed: Collection = c.table().parse().unwrap();
            assert_eq!(parsed, c);
        }
        assert!("carts".parse::<Collection>().is_err());
    }

    #[test]
    fn test_only_transactions_have_date_index() {
        assert!(Collection::Transactions.has_date_index());
        assert!(!Collection::Products.has_date_index());
        assert!(!Collection::Users.has_date_index());
        assert!(!Collection::Suppliers.has_date_index());
    }

    #[test]
    fn test_product_low_stock() {
        let mut product = Product::new("biz-1", "COKE-330", "Coca-Cola 330ml", 199);
        assert!(!product.is_low_stock()); // No threshold set

        product.min_stock = Some(5);
        product.stock = 3;
        assert!(product.is_low_stock());

        product.stock = 10;
        assert!(!product.is_low_stock());
    }

    #[test]
    fn test_transaction_snapshots_product() {
        let mut product = Product::new("biz-1", "COKE-330", "Coca-Cola 330ml", 199);
        product.stock = 10;

        let tx = Transaction::new("biz-1", &product, TransactionKind::Sale, -2);
        assert_eq!(tx.product_name, "Coca-Cola 330ml");
        assert_eq!(tx.unit_price_cents, 199);
        assert_eq!(tx.total_cents, 398);
        assert_eq!(tx.indexed_date(), Some(tx.date));
    }

    #[test]
    fn test_record_identity() {
        let supplier = Supplier::new("biz-1", "Acme Wholesale");
        assert_eq!(Record::id(&supplier), supplier.id.as_str());
        assert_eq!(supplier.business_id(), "biz-1");
        assert_eq!(Supplier::COLLECTION, Collection::Suppliers);
    }
}

//! # Seed Data Generator
//!
//! Populates a local store with development data.
//!
//! ## Usage
//! ```bash
//! # Generate 500 products (default)
//! cargo run -p tally-store --bin seed
//!
//! # Generate custom amount
//! cargo run -p tally-store --bin seed -- --count 2000
//!
//! # Specify database path
//! cargo run -p tally-store --bin seed -- --db ./data/tally.db
//! ```
//!
//! Seeded data goes through `put_many`, the no-enqueue path, so a dev
//! store starts with an empty offline queue.

use std::env;

use tally_core::{Collection, Product, Supplier, SystemUser, UserRole};
use tally_store::{Store, StoreConfig};

/// Business id used for all seeded records.
const SEED_BUSINESS_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Product categories with name stems for realistic test data.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "beverages",
        &[
            "Coca-Cola", "Pepsi", "Sprite", "Fanta", "Red Bull", "Orange Juice", "Iced Tea",
            "Sparkling Water", "Lemonade", "Cold Brew",
        ],
    ),
    (
        "snacks",
        &[
            "Potato Chips", "Tortilla Chips", "Chocolate Bar", "Gummy Bears", "Pretzels",
            "Trail Mix", "Granola Bar", "Popcorn", "Cookies", "Crackers",
        ],
    ),
    (
        "dairy",
        &[
            "Whole Milk", "Skim Milk", "Oat Milk", "Cheddar", "Mozzarella", "Greek Yogurt",
            "Butter", "Cream Cheese", "Sour Cream", "Eggs Dozen",
        ],
    ),
    (
        "grocery",
        &[
            "Pasta", "Rice", "Canned Tomatoes", "Olive Oil", "Flour", "Sugar", "Coffee Beans",
            "Black Tea", "Peanut Butter", "Honey",
        ],
    ),
];

const SIZES: &[(&str, i64)] = &[("Small", 0), ("Regular", 50), ("Large", 120)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut count: usize = 500;
    let mut db_path = "./tally_dev.db".to_string();

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(count);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 500)");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let store = Store::open(StoreConfig::new(&db_path)).await?;
    println!("✓ Store opened, migrations applied");

    let existing = store.records().count(Collection::Products).await?;
    if existing > 0 {
        println!("⚠ Store already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating records...");
    let start = std::time::Instant::now();

    let mut products = Vec::with_capacity(count);
    'outer: for (category_idx, (category, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if products.len() >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + name_idx * 10 + size_idx;
                products.push(generate_product(category, name, size, *price_addon, seed));
            }
        }
    }

    // Batch upsert: single transaction, no queue entries
    store.records().put_many(&products).await?;
    println!("✓ {} products in {:?}", products.len(), start.elapsed());

    let suppliers = vec![
        Supplier::new(SEED_BUSINESS_ID, "Acme Wholesale"),
        Supplier::new(SEED_BUSINESS_ID, "Fresh Farms Distribution"),
        Supplier::new(SEED_BUSINESS_ID, "Metro Beverage Co"),
    ];
    store.records().put_many(&suppliers).await?;
    println!("✓ {} suppliers", suppliers.len());

    let users = vec![
        SystemUser::new(SEED_BUSINESS_ID, "Dev Owner", "owner@example.com", UserRole::Owner),
        SystemUser::new(SEED_BUSINESS_ID, "Dev Cashier", "cashier@example.com", UserRole::Cashier),
    ];
    store.records().put_many(&users).await?;
    println!("✓ {} users", users.len());

    let pending = store.outbox().count_pending().await?;
    println!();
    println!("✓ Seed complete ({} queue entries - seed data never syncs)", pending);

    Ok(())
}

/// Generates a single product with deterministic pseudo-realistic data.
fn generate_product(category: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> Product {
    // Base $0.99 - $8.99 plus size addon
    let price_cents = 99 + ((seed * 17) % 800) as i64 + price_addon;

    let mut product = Product::new(
        SEED_BUSINESS_ID,
        format!("{}-{:04}", &category[..3].to_uppercase(), seed),
        format!("{} {}", name, size),
        price_cents,
    );
    product.category = Some(category.to_string());
    product.cost_cents = Some(price_cents * (60 + (seed % 20) as i64) / 100);
    product.stock = (seed % 101) as i64;
    product.min_stock = Some(5);
    product
}

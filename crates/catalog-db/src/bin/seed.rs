//! # Seed Data Generator
//!
//! Populates the catalog with categories and products for development.
//!
//! ## Usage
//! ```bash
//! # Seed every category with 10 products (default)
//! cargo run -p catalog-db --bin seed
//!
//! # Fewer products per category
//! cargo run -p catalog-db --bin seed -- --per-category 3
//!
//! # Specify database path (otherwise CATALOG_DB_PATH, then ./catalog_dev.db)
//! cargo run -p catalog-db --bin seed -- --db ./data/catalog.db
//! ```
//!
//! Everything is written in one transaction: either the whole catalog
//! appears or nothing does.

use std::env;
use std::time::Instant;

use catalog_core::{Category, Money, Product};
use catalog_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Categories with their description and product names.
const CATALOG: &[(&str, &str, &[&str])] = &[
    (
        "Beverages",
        "Soft drinks, water, juice and hot drinks",
        &[
            "Cola", "Lemonade", "Sparkling Water", "Still Water", "Orange Juice",
            "Apple Juice", "Iced Tea", "Ginger Ale", "Coffee", "Hot Chocolate",
        ],
    ),
    (
        "Snacks",
        "Chips, sweets and biscuits",
        &[
            "Salted Chips", "Pretzels", "Popcorn", "Chocolate Bar", "Gummy Bears",
            "Oat Biscuits", "Trail Mix", "Rice Crackers", "Peanuts", "Cookies",
        ],
    ),
    (
        "Dairy",
        "Milk, cheese and yogurt",
        &[
            "Whole Milk", "Skim Milk", "Oat Milk", "Cheddar", "Mozzarella",
            "Greek Yogurt", "Butter", "Cream Cheese", "Sour Cream", "Eggs",
        ],
    ),
    (
        "Frozen",
        "Ice cream and frozen meals",
        &[
            "Vanilla Ice Cream", "Chocolate Ice Cream", "Frozen Pizza", "Fish Fingers",
            "Frozen Peas", "Waffles", "Ice Pops", "Frozen Berries", "Dumplings", "Sorbet",
        ],
    ),
    (
        "Pantry",
        "Canned goods, pasta and rice",
        &[
            "Spaghetti", "Basmati Rice", "Tomato Sauce", "Baked Beans", "Tuna",
            "Olive Oil", "Flour", "Sugar", "Honey", "Peanut Butter",
        ],
    ),
];

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,catalog=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut per_category: usize = 10;
    let mut db_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--per-category" | "-n" => {
                if i + 1 < args.len() {
                    per_category = args[i + 1].parse()?;
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Catalog Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --per-category <N>  Products per category (default: 10)");
                println!("  -d, --db <PATH>         Database file path (default: $CATALOG_DB_PATH or ./catalog_dev.db)");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = DbConfig::from_env()?;
    if let Some(path) = db_path {
        config.database_path = path.into();
    } else if env::var("CATALOG_DB_PATH").is_err() {
        config.database_path = "./catalog_dev.db".into();
    }

    info!(
        path = %config.database_path.display(),
        per_category,
        "Seeding catalog"
    );

    let db = Database::new(config).await?;
    let mut uow = db.unit_of_work().await?;

    let existing = uow.categories().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has categories, skipping seed");
        uow.close().await?;
        return Ok(());
    }

    let start = Instant::now();
    uow.begin_transaction().await?;

    let tickets: Vec<_> = CATALOG
        .iter()
        .map(|(name, description, _)| uow.categories().add(Category::new(*name, *description)))
        .collect();
    uow.save().await?;

    let mut generated = 0usize;
    for ((category_name, _, products), ticket) in CATALOG.iter().zip(tickets) {
        let Some(category_id) = uow.assigned_id(ticket) else {
            return Err(format!("no id assigned to category {category_name}").into());
        };

        for (index, product_name) in products.iter().take(per_category).enumerate() {
            uow.products().add(generate_product(product_name, category_id, generated + index));
        }
        generated += products.len().min(per_category);
    }

    let rows = uow.save().await?;
    uow.commit_transaction().await?;
    uow.close().await?;

    info!(
        categories = CATALOG.len(),
        products = generated,
        rows,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}

/// Builds one product with deterministic price and stock.
fn generate_product(name: &str, category_id: i64, seed: usize) -> Product {
    // 0.99 .. 9.98
    let price = Money::from_cents(99 + ((seed * 37) % 900) as i64);
    let stock = ((seed * 13) % 101) as i64;

    Product::new(name, format!("{name} from the seed catalog"), price, stock, category_id)
}

//! # Demo Shop Seeder
//!
//! Provisions a demo bookshop and walks it through the engine once.
//!
//! ## Usage
//! ```bash
//! # Use engine.toml from the platform config dir (or defaults)
//! cargo run -p quire-engine --bin quire-seed
//!
//! # Explicit config file and shop name
//! cargo run -p quire-engine --bin quire-seed -- --config ./engine.toml --name "Harbour Books"
//! ```
//!
//! ## What It Creates
//! - one tenant with an admin user (`admin@<shop>.example`)
//! - one edition per title below, each with opening stock
//! - one pending purchase order restocking the two slowest titles

use std::env;
use std::path::PathBuf;

use quire_core::purchasing::{NewPurchaseOrder, PurchaseOrderLine};
use quire_core::{Money, NewTenant, NewUser, Rate, StockIntake};
use quire_engine::{telemetry, Engine, EngineConfig};

/// (title, author, isbn, opening stock, cost in cents)
const TITLES: &[(&str, &str, &str, i64, i64)] = &[
    ("Dune", "Frank Herbert", "978-0441013593", 12, 850),
    ("The Left Hand of Darkness", "Ursula K. Le Guin", "978-0441478125", 6, 780),
    ("Piranesi", "Susanna Clarke", "978-1635575637", 9, 1100),
    ("Kindred", "Octavia E. Butler", "978-0807083697", 4, 920),
    ("The Remains of the Day", "Kazuo Ishiguro", "978-0679731726", 3, 890),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut shop_name = String::from("Riverside Books");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--name" | "-n" => {
                if i + 1 < args.len() {
                    shop_name = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Quire demo shop seeder");
                println!();
                println!("Usage: quire-seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Engine config file (default: platform config dir)");
                println!("  -n, --name <NAME>    Shop name (default: Riverside Books)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    telemetry::init_tracing();

    let config = EngineConfig::load(config_path)?;
    println!("🌱 Quire demo shop seeder");
    println!("=========================");
    println!("Database: {}", config.database.path.display());
    println!("Shop:     {}", shop_name);
    println!();

    let (engine, db) = Engine::open(&config).await?;
    println!("✓ Connected to database, migrations applied");

    if !engine.provisioning.is_name_available(&shop_name).await? {
        println!("⚠ A shop named {:?} already exists", shop_name);
        println!("  Pick another name with --name or delete the database file.");
        return Ok(());
    }

    let slug: String = shop_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let shop = engine
        .provisioning
        .provision_tenant(
            &NewTenant {
                name: shop_name.clone(),
                contact_email: format!("hello@{}.example", slug),
                ..NewTenant::default()
            },
            &NewUser {
                email: format!("admin@{}.example", slug),
                full_name: "Demo Admin".to_string(),
            },
        )
        .await?;
    let tenant_id = shop.tenant.id.as_str();
    println!("✓ Provisioned tenant {} (admin {})", tenant_id, shop.admin.email);

    let mut stocked = 0;
    for (title, author, isbn, quantity, cost) in TITLES {
        // ISBNs are global; a second shop on the same database reuses them
        let isbn = format!("{}-{}", isbn, slug);
        let edition = db.catalog().create_edition(title, author, &isbn, "paperback").await?;

        let intake = StockIntake::new(*quantity, Money::from_cents(*cost))
            .with_profit(Rate::from_bps(3000))
            .with_reorder_level(5);
        let record = engine.ledger.create_or_top_up(tenant_id, &edition.id, &intake).await?;
        println!(
            "  {:<28} on hand {:>3}  sells at {}",
            title,
            record.quantity_on_hand,
            record.sale_price()
        );
        stocked += 1;
    }
    println!("✓ Stocked {} editions", stocked);

    let low = engine.ledger.low_stock(tenant_id).await?;
    let lines: Vec<PurchaseOrderLine> = low
        .iter()
        .map(|r| PurchaseOrderLine::new(r.edition_id.as_str(), 10, r.cost_price()))
        .collect();
    if lines.is_empty() {
        println!("✓ Nothing below reorder level, no purchase order needed");
    } else {
        let po = engine
            .purchasing
            .create_purchase_order(tenant_id, &NewPurchaseOrder::new("demo-distributor", lines))
            .await?;
        println!(
            "✓ Purchase order {} for {} titles, total {}",
            po.order.order_number,
            po.items.len(),
            po.order.total_amount()
        );
    }

    println!();
    println!("✓ Seed complete!");
    Ok(())
}

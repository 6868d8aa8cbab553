//! # Seed Data Generator
//!
//! Populates a database with a demo company for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p caja-db --bin seed
//!
//! # Specify database path
//! cargo run -p caja-db --bin seed -- --db ./data/caja.db
//! ```
//!
//! ## Generated Data
//! - Two plans: "Emprende" (1 branch) and "Pyme" (3 branches)
//! - One company on "Emprende", monthly, with one branch
//! - Folio ranges: boletas 1..=500, facturas 1..=200
//! - Two customers, one of them with a RUT that fails its check digit
//! - A small catalog of almacén products

use caja_core::{
    BillingPeriod, Branch, Company, DocumentType, Money, Product, SubscriptionPlan, TaxId,
};
use caja_db::{CustomerInput, Database, DbConfig};
use chrono::Utc;
use std::env;
use uuid::Uuid;

const DEMO_COMPANY_ID: &str = "demo-company";
const DEMO_BRANCH_ID: &str = "demo-branch";

/// (category, [(name, price, cost, stock)])
const CATALOG: &[(&str, &[(&str, i64, i64, Option<i64>)])] = &[
    (
        "Panadería",
        &[
            ("Marraqueta (kg)", 2_290, 1_100, None),
            ("Hallulla (kg)", 2_390, 1_150, None),
            ("Empanada de pino", 2_500, 1_300, Some(24)),
            ("Kuchen de manzana", 9_990, 5_200, Some(4)),
        ],
    ),
    (
        "Bebidas",
        &[
            ("Bebida 1,5 L", 1_890, 1_050, Some(36)),
            ("Agua mineral 600 ml", 890, 420, Some(48)),
            ("Jugo néctar 1 L", 1_290, 700, Some(20)),
        ],
    ),
    (
        "Abarrotes",
        &[
            ("Arroz grado 1 (1 kg)", 1_490, 900, Some(30)),
            ("Aceite maravilla 1 L", 2_990, 2_100, Some(18)),
            ("Azúcar (1 kg)", 1_190, 780, Some(25)),
            ("Té 100 bolsitas", 3_490, 2_050, Some(12)),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./caja_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Caja POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./caja_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Caja POS Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.companies().get_by_id(DEMO_COMPANY_ID).await?.is_some() {
        println!("⚠ Demo company already present");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Plans
    let companies = db.companies();
    for plan in plans() {
        companies.insert_plan(&plan).await?;
    }
    println!("✓ Plans created");

    // Company + branch
    companies
        .insert(&Company {
            id: DEMO_COMPANY_ID.to_string(),
            tax_id: TaxId::parse("76.086.428-5")?,
            business_name: "Almacén Don Pancho SpA".to_string(),
            giro: "Venta al por menor en almacenes".to_string(),
            address: "Av. Irarrázaval 3150".to_string(),
            commune: "Ñuñoa".to_string(),
            credential_ref: Some("demo-cert".to_string()),
            plan_id: Some("plan-emprende".to_string()),
            billing_period: BillingPeriod::Monthly,
        })
        .await?;
    companies
        .create_branch(&Branch {
            id: DEMO_BRANCH_ID.to_string(),
            company_id: DEMO_COMPANY_ID.to_string(),
            name: "Casa Matriz".to_string(),
            address: Some("Av. Irarrázaval 3150".to_string()),
            created_at: Utc::now(),
        })
        .await?;
    println!("✓ Company and branch created");

    // Folio ranges
    db.folios()
        .register_pool(DEMO_COMPANY_ID, DocumentType::Boleta, 1, 500)
        .await?;
    db.folios()
        .register_pool(DEMO_COMPANY_ID, DocumentType::Factura, 1, 200)
        .await?;
    println!("✓ Folio ranges registered (boleta 1-500, factura 1-200)");

    // Customers
    let customers = db.customers();
    customers
        .insert(
            DEMO_COMPANY_ID,
            &CustomerInput {
                rut: Some("12.345.678-5".to_string()),
                name: "Ferretería El Tornillo Ltda.".to_string(),
                giro: Some("Ferretería".to_string()),
                address: Some("Los Leones 1450".to_string()),
                commune: Some("Providencia".to_string()),
            },
        )
        .await?;
    customers
        .insert(
            DEMO_COMPANY_ID,
            &CustomerInput {
                rut: Some("12.345.678-9".to_string()),
                name: "Cliente RUT Inválido".to_string(),
                ..CustomerInput::default()
            },
        )
        .await?;
    println!("✓ Customers created");

    // Catalog
    let mut generated = 0;
    for (category_name, products) in CATALOG {
        let category = db
            .categories()
            .get_or_create(DEMO_COMPANY_ID, category_name)
            .await?;

        for (name, price, cost, stock) in products.iter() {
            let product = Product {
                id: Uuid::new_v4().to_string(),
                company_id: DEMO_COMPANY_ID.to_string(),
                category_id: Some(category.id.clone()),
                name: name.to_string(),
                price: Money::from_pesos(*price),
                cost: Some(Money::from_pesos(*cost)),
                stock: *stock,
                is_custom: false,
                created_at: Utc::now(),
            };

            if let Err(e) = db.products().insert(&product).await {
                eprintln!("Failed to insert {}: {}", product.name, e);
                continue;
            }
            generated += 1;
        }
    }
    println!("✓ {} products created", generated);

    println!();
    println!("✓ Seed complete!");
    println!("  company_id = {}", DEMO_COMPANY_ID);
    println!("  branch_id  = {}", DEMO_BRANCH_ID);

    Ok(())
}

fn plans() -> Vec<SubscriptionPlan> {
    vec![
        SubscriptionPlan {
            id: "plan-emprende".to_string(),
            name: "Emprende".to_string(),
            tier_group: "emprende".to_string(),
            monthly_price: Money::from_pesos(15_990),
            yearly_price: Money::from_pesos(159_900),
            max_branches: Some(1),
        },
        SubscriptionPlan {
            id: "plan-pyme".to_string(),
            name: "Pyme".to_string(),
            tier_group: "pyme".to_string(),
            monthly_price: Money::from_pesos(20_990),
            yearly_price: Money::from_pesos(209_900),
            max_branches: Some(3),
        },
    ]
}

//! # Caja Terminal Status
//!
//! Starts a terminal from its configuration and prints what a cashier sees
//! before selling: folio stock and the state of the caja.
//!
//! ## Usage
//! ```bash
//! cargo run -p caja-pos
//!
//! # Specific config file
//! cargo run -p caja-pos -- --config ./caja.toml
//! ```

use caja_pos::{init_tracing, PosApp};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: caja-pos [--config <path>]");
                println!();
                println!("Options:");
                println!("  --config, -c <path>  Config file (default: platform config dir)");
                return ExitCode::SUCCESS;
            }
            _ => {}
        }
        i += 1;
    }

    let app = match PosApp::start(config_path).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("🧾 {} ({})", app.config.terminal.name, app.config.terminal.branch_id);

    match app.checkout.folio_status().await {
        Ok(status) => {
            for s in status {
                let flag = if s.low { "⚠️ " } else { "" };
                println!("   {}{}: {} folios", flag, s.document_type, s.remaining);
            }
        }
        Err(e) => eprintln!("❌ {}", e),
    }

    match app.till.current().await {
        Ok(Some(session)) => match app.till.summary().await {
            Ok(summary) => println!(
                "   Caja abierta desde {} · saldo {}",
                session.opened_at.format("%d-%m-%Y %H:%M"),
                summary.balance
            ),
            Err(e) => eprintln!("❌ {}", e),
        },
        Ok(None) => println!("   Caja cerrada"),
        Err(e) => eprintln!("❌ {}", e),
    }

    app.db.close().await;
    ExitCode::SUCCESS
}

//! # caja-pos: Checkout Orchestration for Caja POS
//!
//! Everything a terminal UI needs to sell: the cart, the caja, checkout
//! against the document-emission service, and the plan governor.
//!
//! ## Module Organization
//! ```text
//! caja_pos/
//! ├── lib.rs          ◄─── You are here (tracing + PosApp bootstrap)
//! ├── config.rs       ◄─── caja.toml + CAJA_* overrides
//! ├── auth.rs         ◄─── Session handed over by the auth provider
//! ├── state/
//! │   └── cart.rs     ◄─── Arc<Mutex<Cart>> per terminal
//! ├── emission/
//! │   ├── envelope.rs ◄─── JSON document sent for emission
//! │   ├── client.rs   ◄─── DocumentEmitter + HttpEmitter
//! │   ├── archive.rs  ◄─── ArtifactArchive + HttpArchive
//! │   └── upload.rs   ◄─── MediaUploader + HttpUploader
//! ├── services/
//! │   ├── checkout.rs ◄─── The checkout flow
//! │   ├── till.rs     ◄─── Open / move / close the caja
//! │   ├── catalog.rs  ◄─── Products into the cart, images
//! │   └── governor.rs ◄─── Branch ceiling and plan proration
//! └── error.rs        ◄─── ApiError returned by every service
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()          RUST_LOG or "info,caja=debug,sqlx=warn"     │
//! │  2. PosConfig::load()       defaults → caja.toml → CAJA_* → validate    │
//! │  3. Database::new()         WAL, foreign keys, migrations               │
//! │  4. HTTP collaborators      emitter (required), archive + upload (opt.) │
//! │  5. Shared state            CartState, AuthState                        │
//! │  6. Services                checkout, till, catalog, governor           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod emission;
pub mod error;
pub mod services;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use auth::AuthState;
use caja_db::{Database, DbConfig};
use config::PosConfig;
use emission::{HttpArchive, HttpEmitter, HttpUploader};
use error::ApiResult;
use services::{CatalogService, CheckoutService, PlanGovernor, TillService};
use state::CartState;

pub use error::{ApiError, ErrorCode};

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins when set. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caja=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

/// A fully wired terminal.
#[derive(Clone)]
pub struct PosApp {
    pub config: PosConfig,
    pub db: Database,
    pub cart: CartState,
    pub auth: AuthState,
    pub checkout: CheckoutService,
    pub till: TillService,
    pub catalog: CatalogService,
    pub governor: PlanGovernor,
}

impl PosApp {
    /// Loads configuration and connects everything.
    pub async fn start(config_path: Option<PathBuf>) -> ApiResult<Self> {
        let config = PosConfig::load(config_path)?;
        Self::with_config(config).await
    }

    /// Connects everything for an already loaded configuration.
    pub async fn with_config(config: PosConfig) -> ApiResult<Self> {
        let db_path = config.database_path()?;
        info!(
            terminal = %config.terminal.name,
            company_id = %config.terminal.company_id,
            branch_id = %config.terminal.branch_id,
            db_path = %db_path.display(),
            "Starting terminal"
        );

        let db = Database::new(
            DbConfig::new(db_path).max_connections(config.database.max_connections),
        )
        .await?;

        let timeout = config.emission.timeout();
        let emitter = Arc::new(HttpEmitter::from_config(&config.emission)?);

        let cart = CartState::new();
        let auth = AuthState::new();
        let terminal = config.terminal.clone();

        let mut checkout = CheckoutService::new(
            db.clone(),
            cart.clone(),
            auth.clone(),
            emitter,
            terminal.clone(),
        )
        .with_low_folio_threshold(config.folios.low_stock_threshold);
        if let Some(ref endpoint) = config.archive.endpoint {
            let archive = Arc::new(HttpArchive::new(endpoint, timeout)?);
            checkout = checkout.with_archive(archive, &config.archive.root_folder);
        }

        let mut catalog = CatalogService::new(db.clone(), cart.clone(), terminal.clone());
        if let Some(ref endpoint) = config.upload.endpoint {
            catalog = catalog.with_uploader(Arc::new(HttpUploader::new(endpoint, timeout)?));
        }

        let till = TillService::new(db.clone(), auth.clone(), terminal.clone());
        let governor = PlanGovernor::new(db.clone(), terminal);

        info!("Terminal ready");

        Ok(PosApp {
            config,
            db,
            cart,
            auth,
            checkout,
            till,
            catalog,
            governor,
        })
    }
}

//! # Catalog Service
//!
//! Product lookup at the register, ad-hoc products typed by the cashier,
//! and product images.
//!
//! ```text
//! scan / search ──► add_to_cart(product_id) ──► CartState
//!
//! "Otro producto: Bolsa, $100"
//!      │
//!      ▼
//! add_custom_product ──► products (category "General", stock 0, custom)
//!                    └─► CartState (own line, not merged by name)
//! ```

use caja_core::{CartProduct, CartTotals, Customer, Money, Product};
use caja_db::Database;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::TerminalConfig;
use crate::emission::MediaUploader;
use crate::error::{ApiError, ApiResult};
use crate::state::CartState;

/// Maximum results returned by searches.
const SEARCH_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct CatalogService {
    db: Database,
    cart: CartState,
    uploader: Option<Arc<dyn MediaUploader>>,
    terminal: TerminalConfig,
}

impl CatalogService {
    pub fn new(db: Database, cart: CartState, terminal: TerminalConfig) -> Self {
        CatalogService {
            db,
            cart,
            uploader: None,
            terminal,
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn MediaUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub async fn search_products(&self, query: &str) -> ApiResult<Vec<Product>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(self
                .db
                .products()
                .list(&self.terminal.company_id, SEARCH_LIMIT, 0)
                .await?);
        }
        Ok(self
            .db
            .products()
            .search(&self.terminal.company_id, query, SEARCH_LIMIT)
            .await?)
    }

    pub async fn search_customers(&self, query: &str) -> ApiResult<Vec<Customer>> {
        Ok(self
            .db
            .customers()
            .search(&self.terminal.company_id, query.trim(), SEARCH_LIMIT)
            .await?)
    }

    /// Adds one unit of a catalog product at its current price.
    pub async fn add_to_cart(&self, product_id: &str) -> ApiResult<CartTotals> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .filter(|p| p.company_id == self.terminal.company_id)
            .ok_or_else(|| ApiError::not_found("Product", product_id))?;

        debug!(product_id = %product.id, price = %product.price, "Adding product to cart");
        Ok(self.cart.add_line(CartProduct::from(&product))?)
    }

    /// Persists a product typed at the register and puts it in the cart.
    ///
    /// Every call creates a new product, so typing "Bolsa" twice gives two
    /// lines.
    ///
    /// ## Errors
    /// * `VALIDATION_ERROR` - Blank name or negative price
    pub async fn add_custom_product(&self, name: &str, price: Money) -> ApiResult<CartTotals> {
        let product = self
            .db
            .products()
            .create_custom(&self.terminal.company_id, name, price)
            .await?;

        info!(product_id = %product.id, name = %product.name, "Custom product created");
        Ok(self
            .cart
            .add_line(CartProduct::custom(&product.id, &product.name, product.price))?)
    }

    /// Uploads a product image and returns its public URL.
    pub async fn upload_image(&self, file_name: &str, content_type: &str, bytes: Vec<u8>) -> ApiResult<String> {
        let uploader = self
            .uploader
            .as_ref()
            .ok_or_else(|| ApiError::validation("Media upload is not configured"))?;

        uploader
            .upload(file_name, content_type, bytes)
            .await
            .map_err(ApiError::upload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emission::{EmissionError, EmissionResult};
    use crate::error::ErrorCode;
    use crate::services::testing::{self, COMPANY_ID};
    use async_trait::async_trait;
    use caja_core::ErrorKind;
    use chrono::Utc;

    struct FixedUploader(Option<&'static str>);

    #[async_trait]
    impl MediaUploader for FixedUploader {
        async fn upload(&self, _file_name: &str, _content_type: &str, _bytes: Vec<u8>) -> EmissionResult<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| EmissionError::InvalidResponse("no URL".to_string()))
        }
    }

    async fn service() -> (CatalogService, CartState) {
        let db = testing::database().await;
        db.products()
            .insert(&Product {
                id: "p-pan".to_string(),
                company_id: COMPANY_ID.to_string(),
                category_id: None,
                name: "Marraqueta".to_string(),
                price: Money::from_pesos(1_990),
                cost: None,
                stock: Some(40),
                is_custom: false,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let cart = CartState::new();
        (CatalogService::new(db, cart.clone(), testing::terminal()), cart)
    }

    #[tokio::test]
    async fn test_add_to_cart_merges() {
        let (catalog, cart) = service().await;

        catalog.add_to_cart("p-pan").await.unwrap();
        let totals = catalog.add_to_cart("p-pan").await.unwrap();

        assert_eq!(totals.line_count, 1);
        assert_eq!(totals.total.pesos(), 3_980);
        assert_eq!(cart.with_cart(|c| c.lines()[0].product_ref.clone()), Some("p-pan".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (catalog, _) = service().await;
        let err = catalog.add_to_cart("p-nada").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_custom_products_are_distinct_lines() {
        let (catalog, cart) = service().await;

        catalog.add_custom_product("Bolsa", Money::from_pesos(100)).await.unwrap();
        let totals = catalog.add_custom_product("Bolsa", Money::from_pesos(100)).await.unwrap();

        assert_eq!(totals.line_count, 2);
        cart.with_cart(|c| {
            assert!(c.lines().iter().all(|l| l.is_custom && l.product_ref.is_none()));
        });

        let found = catalog.search_products("Bolsa").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.is_custom && p.stock == Some(0)));
    }

    #[tokio::test]
    async fn test_blank_custom_product() {
        let (catalog, cart) = service().await;
        let err = catalog.add_custom_product("   ", Money::from_pesos(100)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(cart.with_cart(|c| c.is_empty()));
    }

    #[tokio::test]
    async fn test_upload_image() {
        let (catalog, _) = service().await;
        let err = catalog.upload_image("a.png", "image/png", vec![1]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let ok = catalog
            .clone()
            .with_uploader(Arc::new(FixedUploader(Some("https://cdn.example/a.png"))));
        assert_eq!(
            ok.upload_image("a.png", "image/png", vec![1]).await.unwrap(),
            "https://cdn.example/a.png"
        );

        let failing = catalog.with_uploader(Arc::new(FixedUploader(None)));
        let err = failing.upload_image("a.png", "image/png", vec![1]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UploadFailed);
        assert_eq!(err.kind, ErrorKind::ExternalFailure);
    }
}

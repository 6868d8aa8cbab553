//! # Checkout Service
//!
//! Turns the terminal's cart into an emitted tax document and a recorded
//! sale.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         checkout(request)                               │
//! │                                                                         │
//! │  0. signed-in user ─────────────────────────► SESSION_EXPIRED           │
//! │  1. till open for branch ───────────────────► TILL_CLOSED               │
//! │  2. payment method + non-empty cart ────────► INVALID_SALE              │
//! │  3. receiver with complete RUT ─────────────► INCOMPLETE_CUSTOMER       │
//! │  4. signing credential (boleta / factura) ──► MISSING_CREDENTIAL        │
//! │  5. folio (boleta / factura only) ──────────► EXHAUSTED                 │
//! │        │                                                                │
//! │        ▼  nothing has been written before this point                    │
//! │  6. emit envelope ──────────────────────────► EMISSION_FAILED           │
//! │        │  (folio stays consumed, cart untouched)                        │
//! │        ▼                                                                │
//! │  7. order + items + till ingress   (one transaction)                    │
//! │  8. stock decrement                (best effort)                        │
//! │  9. archive artifact               (best effort)                        │
//! │ 10. take the sold lines out of the cart, return receipt                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines added to the cart while the document is being emitted are not part
//! of the sale and stay in the cart.
//!
//! A checkout is never retried here. Pressing "Emitir" again runs the whole
//! flow and takes a new folio.

use caja_core::{
    Cart, CoreError, Customer, DocumentType, Money, Order, PaymentMethod, Receiver,
};
use caja_db::Database;
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::auth::AuthState;
use crate::config::TerminalConfig;
use crate::emission::{ArchiveEntry, ArtifactArchive, DocumentEmitter, DocumentEnvelope};
use crate::error::{ApiError, ApiResult};
use crate::state::CartState;

// =============================================================================
// DTOs
// =============================================================================

/// What the cashier chose on the payment screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub document_type: DocumentType,
    /// `None` until the cashier picks one.
    pub payment_method: Option<PaymentMethod>,
    pub customer_id: Option<String>,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub order_id: String,
    pub document_type: DocumentType,
    pub folio: Option<i64>,
    pub total: Money,
    pub net: Money,
    pub tax: Money,
    pub artifact_url: String,
    /// False when the till closed while the document was being emitted.
    pub ingress_recorded: bool,
    /// Text the terminal shows next to the receipt when the cashier has to
    /// act on it.
    pub notice: Option<String>,
}

/// Unused folios for one document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FolioStatus {
    pub document_type: DocumentType,
    pub remaining: i64,
    pub low: bool,
}

// =============================================================================
// Service
// =============================================================================

/// Runs checkouts for one terminal.
#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
    cart: CartState,
    auth: AuthState,
    emitter: Arc<dyn DocumentEmitter>,
    archive: Option<Arc<dyn ArtifactArchive>>,
    terminal: TerminalConfig,
    archive_root: String,
    low_folio_threshold: i64,
}

impl CheckoutService {
    pub fn new(
        db: Database,
        cart: CartState,
        auth: AuthState,
        emitter: Arc<dyn DocumentEmitter>,
        terminal: TerminalConfig,
    ) -> Self {
        CheckoutService {
            db,
            cart,
            auth,
            emitter,
            archive: None,
            terminal,
            archive_root: "Documentos".to_string(),
            low_folio_threshold: 0,
        }
    }

    /// Files every emitted artifact under `root_folder` in `archive`.
    pub fn with_archive(mut self, archive: Arc<dyn ArtifactArchive>, root_folder: &str) -> Self {
        self.archive = Some(archive);
        self.archive_root = root_folder.to_string();
        self
    }

    /// Warn at checkout when fewer than `threshold` folios remain.
    pub fn with_low_folio_threshold(mut self, threshold: i64) -> Self {
        self.low_folio_threshold = threshold;
        self
    }

    /// Emits the cart as `request.document_type` and records the sale.
    ///
    /// ## Errors
    /// * `SESSION_EXPIRED` - Nobody is signed in
    /// * `TILL_CLOSED` - The branch has no open session
    /// * `INVALID_SALE` - No payment method or empty cart
    /// * `INCOMPLETE_CUSTOMER` - Receiver without a valid RUT, or factura
    ///   without a customer
    /// * `MISSING_CREDENTIAL` - Boleta or factura for a company without a
    ///   signing credential
    /// * `EXHAUSTED` - No folio left for the document type
    /// * `EMISSION_FAILED` - The emission service did not accept the document
    pub async fn checkout(&self, request: CheckoutRequest) -> ApiResult<Receipt> {
        let user_id = self.auth.current_user_id()?;
        let document_type = request.document_type;
        let company_id = &self.terminal.company_id;
        let branch_id = &self.terminal.branch_id;

        debug!(%document_type, branch_id = %branch_id, "Checkout started");

        // ===== Preconditions, in order =====

        self.db.till().require_open(branch_id).await?;

        let payment_method = request
            .payment_method
            .ok_or_else(|| CoreError::InvalidSale("select a payment method".to_string()))?;

        let cart = self.cart.snapshot();
        if cart.is_empty() {
            return Err(CoreError::InvalidSale("cart is empty".to_string()).into());
        }

        let customer = self.load_customer(request.customer_id.as_deref()).await?;
        let receiver = Receiver::resolve(document_type, customer.as_ref())?;

        let company = self.db.companies().require(company_id).await?;
        let has_credential = company
            .credential_ref
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if document_type.requires_folio() && !has_credential {
            return Err(CoreError::MissingCredential {
                company_id: company_id.clone(),
            }
            .into());
        }

        let folio = if document_type.requires_folio() {
            let folio = self.db.folios().allocate(company_id, document_type).await?;
            self.warn_if_low(document_type).await;
            Some(folio)
        } else {
            None
        };

        // ===== Emission =====

        let envelope = DocumentEnvelope::build(
            document_type,
            folio,
            &company,
            receiver,
            &cart,
            payment_method,
            Local::now().date_naive(),
        );

        let emitted = self.emitter.emit(&envelope).await.map_err(|e| {
            warn!(%document_type, ?folio, error = %e, "Emission failed, folio stays consumed");
            ApiError::from(e)
        })?;

        // ===== Persistence =====

        let order = build_order(
            &cart,
            company_id,
            branch_id,
            document_type,
            folio,
            payment_method,
            customer.map(|c| c.id),
            &emitted.artifact_url,
            &user_id,
        );
        let items = cart.to_order_items(&order.id);

        let recorded = self.db.orders().record_sale(&order, &items).await.map_err(|e| {
            error!(
                order_id = %order.id,
                ?folio,
                artifact_url = %emitted.artifact_url,
                error = %e,
                "Document emitted but sale not recorded"
            );
            ApiError::from(e)
        })?;

        self.decrement_stock(&cart).await;
        self.archive_artifact(document_type, &emitted.artifact_url).await;

        self.cart.remove_sold(cart.lines());

        let ingress_recorded = recorded.ingress.is_some();
        let notice = if !ingress_recorded && order.amount.is_positive() {
            warn!(order_id = %order.id, amount = %order.amount, "Sale emitted without till ingress");
            Some(format!(
                "La caja se cerró durante la emisión. Registre un ingreso manual de {} en la próxima apertura.",
                order.amount
            ))
        } else {
            None
        };

        info!(
            order_id = %order.id,
            %document_type,
            ?folio,
            total = %order.amount,
            "Checkout completed"
        );

        Ok(Receipt {
            order_id: recorded.order_id,
            document_type,
            folio,
            total: order.amount,
            net: order.net,
            tax: order.tax,
            artifact_url: emitted.artifact_url,
            ingress_recorded,
            notice,
        })
    }

    /// Remaining folios per numbered document type.
    pub async fn folio_status(&self) -> ApiResult<Vec<FolioStatus>> {
        let mut status = Vec::new();
        for document_type in [DocumentType::Boleta, DocumentType::Factura] {
            let remaining = self
                .db
                .folios()
                .remaining(&self.terminal.company_id, document_type)
                .await?;
            status.push(FolioStatus {
                document_type,
                remaining,
                low: remaining < self.low_folio_threshold,
            });
        }
        Ok(status)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load_customer(&self, customer_id: Option<&str>) -> ApiResult<Option<Customer>> {
        match customer_id {
            Some(id) => Ok(Some(self.db.customers().require(id).await?)),
            None => Ok(None),
        }
    }

    async fn warn_if_low(&self, document_type: DocumentType) {
        match self
            .db
            .folios()
            .remaining(&self.terminal.company_id, document_type)
            .await
        {
            Ok(remaining) if remaining < self.low_folio_threshold => {
                warn!(%document_type, remaining, "Folios running low, load a new CAF");
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Could not count remaining folios"),
        }
    }

    async fn decrement_stock(&self, cart: &Cart) {
        let products = self.db.products();
        for line in cart.lines() {
            let Some(ref product_id) = line.product_ref else {
                continue;
            };
            if let Err(e) = products.decrement_stock(product_id, line.quantity).await {
                warn!(product_id = %product_id, error = %e, "Stock decrement failed");
            }
        }
    }

    async fn archive_artifact(&self, document_type: DocumentType, artifact_url: &str) {
        let Some(ref archive) = self.archive else {
            return;
        };

        let entry = ArchiveEntry::for_document(
            &self.archive_root,
            document_type,
            artifact_url,
            Local::now().date_naive(),
        );
        if let Err(e) = archive.file(&entry).await {
            warn!(folder = %entry.folder_name, error = %e, "Archiving failed, document was emitted");
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_order(
    cart: &Cart,
    company_id: &str,
    branch_id: &str,
    document_type: DocumentType,
    folio: Option<i64>,
    payment_method: PaymentMethod,
    customer_id: Option<String>,
    artifact_url: &str,
    user_id: &str,
) -> Order {
    let totals = cart.totals();
    Order {
        id: Uuid::new_v4().to_string(),
        company_id: company_id.to_string(),
        branch_id: branch_id.to_string(),
        document_type,
        folio,
        amount: totals.total,
        net: totals.net,
        tax: totals.tax,
        quantity: totals.total_quantity,
        payment_method,
        customer_id,
        document_artifact_url: artifact_url.to_string(),
        user_id: user_id.to_string(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::config::TerminalConfig;
    use crate::emission::{EmissionResult, EmittedDocument};
    use crate::services::testing::{self, FakeArchive, FakeEmitter, BRANCH_ID, COMPANY_ID, USER_ID};
    use async_trait::async_trait;
    use caja_core::{BillingPeriod, Branch, CartProduct, Company, ErrorKind, Product, TaxId};
    use caja_db::CustomerInput;

    struct Fixture {
        db: Database,
        cart: CartState,
        emitter: Arc<FakeEmitter>,
        archive: Arc<FakeArchive>,
        service: CheckoutService,
    }

    async fn fixture_with(emitter: FakeEmitter, archive: FakeArchive) -> Fixture {
        let db = testing::database().await;
        let cart = CartState::new();
        let emitter = Arc::new(emitter);
        let archive = Arc::new(archive);
        let service = CheckoutService::new(
            db.clone(),
            cart.clone(),
            testing::signed_in(),
            emitter.clone(),
            testing::terminal(),
        )
        .with_archive(archive.clone(), "Documentos")
        .with_low_folio_threshold(5);

        Fixture {
            db,
            cart,
            emitter,
            archive,
            service,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(FakeEmitter::default(), FakeArchive::default()).await
    }

    async fn empanada(db: &Database, stock: Option<i64>) -> Product {
        let product = Product {
            id: "p-empanada".to_string(),
            company_id: COMPANY_ID.to_string(),
            category_id: None,
            name: "Empanada de pino".to_string(),
            price: Money::from_pesos(10_000),
            cost: Some(Money::from_pesos(4_000)),
            stock,
            is_custom: false,
            created_at: Utc::now(),
        };
        db.products().insert(&product).await.unwrap();
        product
    }

    fn boleta_cash() -> CheckoutRequest {
        CheckoutRequest {
            document_type: DocumentType::Boleta,
            payment_method: Some(PaymentMethod::Cash),
            customer_id: None,
        }
    }

    async fn open_till(db: &Database, float: i64) -> String {
        db.till()
            .open(COMPANY_ID, BRANCH_ID, Money::from_pesos(float), USER_ID)
            .await
            .unwrap()
            .id
    }

    async fn fill_cart(f: &Fixture, units: usize) {
        let product = empanada(&f.db, Some(10)).await;
        for _ in 0..units {
            f.cart.add_line(CartProduct::from(&product)).unwrap();
        }
    }

    #[tokio::test]
    async fn test_happy_path_boleta() {
        let f = fixture().await;
        let session_id = open_till(&f.db, 50_000).await;
        let pool = f
            .db
            .folios()
            .register_pool(COMPANY_ID, DocumentType::Boleta, 100, 200)
            .await
            .unwrap();
        fill_cart(&f, 2).await;

        let receipt = f.service.checkout(boleta_cash()).await.unwrap();

        assert_eq!(receipt.folio, Some(100));
        assert_eq!(receipt.total.pesos(), 20_000);
        assert_eq!(receipt.net.pesos() + receipt.tax.pesos(), 20_000);
        assert_eq!(receipt.artifact_url, "https://docs.example/boleta-100.pdf");
        assert!(receipt.ingress_recorded);
        assert_eq!(receipt.notice, None);

        // Pool advanced by exactly one
        assert_eq!(f.db.folios().get(&pool.id).await.unwrap().next_folio, 101);

        // Order and ingress written
        let order = f.db.orders().require(&receipt.order_id).await.unwrap();
        assert_eq!(order.amount.pesos(), 20_000);
        assert_eq!(order.quantity, 2);
        assert_eq!(order.user_id, USER_ID);
        assert_eq!(f.db.orders().items(&order.id).await.unwrap().len(), 1);

        let movements = f.db.till().movements(&session_id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].ingress, Some(Money::from_pesos(20_000)));
        assert_eq!(movements[0].document_type, Some(DocumentType::Boleta));
        assert_eq!(f.db.till().balance(&session_id).await.unwrap().pesos(), 70_000);

        // Stock decremented, archive filed, cart cleared
        let product = f.db.products().get_by_id("p-empanada").await.unwrap().unwrap();
        assert_eq!(product.stock, Some(8));
        let entries = f.archive.entries.lock().unwrap().clone();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].folder_name, "Documentos/boleta");
        assert!(f.cart.with_cart(Cart::is_empty));

        // Envelope carried the tax fields
        let sent = f.emitter.sent();
        assert_eq!(sent[0].sii_code, Some(39));
        assert_eq!(sent[0].credential_ref.as_deref(), Some("cert-demo"));
    }

    #[tokio::test]
    async fn test_exhausted_pool() {
        let f = fixture().await;
        open_till(&f.db, 0).await;
        let pool = f
            .db
            .folios()
            .register_pool(COMPANY_ID, DocumentType::Boleta, 1, 1)
            .await
            .unwrap();
        fill_cart(&f, 1).await;

        f.service.checkout(boleta_cash()).await.unwrap();
        fill_cart_again(&f).await;

        let err = f.service.checkout(boleta_cash()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Exhausted);
        assert_eq!(err.kind, ErrorKind::ResourceExhausted);

        assert_eq!(f.db.folios().get(&pool.id).await.unwrap().next_folio, 2);
        assert_eq!(f.emitter.sent().len(), 1);
        assert_eq!(f.cart.totals().line_count, 1);
    }

    async fn fill_cart_again(f: &Fixture) {
        let product = f.db.products().get_by_id("p-empanada").await.unwrap().unwrap();
        f.cart.add_line(CartProduct::from(&product)).unwrap();
    }

    #[tokio::test]
    async fn test_till_closed_blocks_sale() {
        let f = fixture().await;
        let pool = f
            .db
            .folios()
            .register_pool(COMPANY_ID, DocumentType::Boleta, 1, 10)
            .await
            .unwrap();
        fill_cart(&f, 1).await;

        let err = f.service.checkout(boleta_cash()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TillClosed);
        assert_eq!(err.kind, ErrorKind::PreconditionFailed);

        assert_eq!(f.db.folios().get(&pool.id).await.unwrap().next_folio, 1);
        assert!(f.emitter.sent().is_empty());
        assert_eq!(f.cart.totals().line_count, 1);
    }

    #[tokio::test]
    async fn test_emission_failure_keeps_folio_consumed_and_cart_intact() {
        let f = fixture_with(FakeEmitter::failing("CAF vencido"), FakeArchive::default()).await;
        let session_id = open_till(&f.db, 10_000).await;
        let pool = f
            .db
            .folios()
            .register_pool(COMPANY_ID, DocumentType::Boleta, 1, 10)
            .await
            .unwrap();
        fill_cart(&f, 2).await;

        let err = f.service.checkout(boleta_cash()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::EmissionFailed);
        assert_eq!(err.kind, ErrorKind::ExternalFailure);

        assert_eq!(f.db.folios().get(&pool.id).await.unwrap().next_folio, 2);
        assert_eq!(f.cart.totals().total.pesos(), 20_000);
        assert!(f.db.till().movements(&session_id).await.unwrap().is_empty());
        assert!(f.db.orders().list_for_branch(BRANCH_ID, 10).await.unwrap().is_empty());
        assert!(f.archive.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_precondition_order() {
        let f = fixture().await;

        // Empty cart and no payment method, but the closed till wins
        let request = CheckoutRequest {
            document_type: DocumentType::Factura,
            payment_method: None,
            customer_id: None,
        };
        let err = f.service.checkout(request.clone()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TillClosed);

        open_till(&f.db, 0).await;
        let err = f.service.checkout(request.clone()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSale);

        let with_payment = CheckoutRequest {
            payment_method: Some(PaymentMethod::Debit),
            ..request
        };
        let err = f.service.checkout(with_payment.clone()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSale);

        // Cart filled, factura without customer; no pool exists either
        fill_cart(&f, 1).await;
        let err = f.service.checkout(with_payment).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::IncompleteCustomer);
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_factura_with_customer_without_valid_rut() {
        let f = fixture().await;
        open_till(&f.db, 0).await;
        f.db.folios()
            .register_pool(COMPANY_ID, DocumentType::Factura, 1, 10)
            .await
            .unwrap();
        let customer = f
            .db
            .customers()
            .insert(
                COMPANY_ID,
                &CustomerInput {
                    rut: Some("12.345.678-9".to_string()),
                    name: "Ferretería Sur".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        fill_cart(&f, 1).await;

        let err = f
            .service
            .checkout(CheckoutRequest {
                document_type: DocumentType::Factura,
                payment_method: Some(PaymentMethod::Transfer),
                customer_id: Some(customer.id),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::IncompleteCustomer);
        assert_eq!(f.db.folios().remaining(COMPANY_ID, DocumentType::Factura).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_factura_with_customer() {
        let f = fixture().await;
        open_till(&f.db, 0).await;
        f.db.folios()
            .register_pool(COMPANY_ID, DocumentType::Factura, 33, 40)
            .await
            .unwrap();
        let customer = f
            .db
            .customers()
            .insert(
                COMPANY_ID,
                &CustomerInput {
                    rut: Some("12.345.678-5".to_string()),
                    name: "Ferretería Sur".to_string(),
                    giro: Some("Ferretería".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        fill_cart(&f, 1).await;

        let receipt = f
            .service
            .checkout(CheckoutRequest {
                document_type: DocumentType::Factura,
                payment_method: Some(PaymentMethod::Transfer),
                customer_id: Some(customer.id.clone()),
            })
            .await
            .unwrap();

        assert_eq!(receipt.folio, Some(33));
        let sent = f.emitter.sent();
        assert_eq!(sent[0].sii_code, Some(33));
        assert_eq!(sent[0].receiver.name, "Ferretería Sur");

        let order = f.db.orders().require(&receipt.order_id).await.unwrap();
        assert_eq!(order.customer_id, Some(customer.id));
    }

    #[tokio::test]
    async fn test_vale_needs_no_folio() {
        let f = fixture().await;
        let session_id = open_till(&f.db, 0).await;
        fill_cart(&f, 3).await;

        let receipt = f
            .service
            .checkout(CheckoutRequest {
                document_type: DocumentType::ValeDeVenta,
                payment_method: Some(PaymentMethod::Cash),
                customer_id: None,
            })
            .await
            .unwrap();

        assert_eq!(receipt.folio, None);
        assert_eq!(receipt.total.pesos(), 30_000);
        assert_eq!(f.emitter.sent()[0].sii_code, None);
        assert_eq!(f.db.till().balance(&session_id).await.unwrap().pesos(), 30_000);
    }

    #[tokio::test]
    async fn test_archive_failure_does_not_fail_checkout() {
        let f = fixture_with(
            FakeEmitter::default(),
            FakeArchive {
                fail: true,
                ..Default::default()
            },
        )
        .await;
        open_till(&f.db, 0).await;
        f.db.folios()
            .register_pool(COMPANY_ID, DocumentType::Boleta, 1, 10)
            .await
            .unwrap();
        fill_cart(&f, 1).await;

        let receipt = f.service.checkout(boleta_cash()).await.unwrap();
        assert_eq!(receipt.folio, Some(1));
        assert_eq!(f.archive.entries.lock().unwrap().len(), 1);
        assert!(f.cart.with_cart(Cart::is_empty));
    }

    #[tokio::test]
    async fn test_expired_session_is_refused() {
        let f = fixture().await;
        open_till(&f.db, 0).await;
        fill_cart(&f, 1).await;

        let service = CheckoutService::new(
            f.db.clone(),
            f.cart.clone(),
            AuthState::new(),
            f.emitter.clone(),
            testing::terminal(),
        );

        let err = service.checkout(boleta_cash()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionExpired);
        assert_eq!(err.kind, ErrorKind::PreconditionFailed);
    }

    #[tokio::test]
    async fn test_tax_document_needs_signing_credential() {
        let f = fixture().await;
        let companies = f.db.companies();
        companies
            .insert_plan(&testing::plan("pyme", "basic", 20_990, 209_900, None))
            .await
            .unwrap();
        companies
            .insert(&Company {
                id: "c-2".to_string(),
                tax_id: TaxId::parse("12.345.678-5").unwrap(),
                business_name: "Botillería Sin Firma Ltda".to_string(),
                giro: "Botillería".to_string(),
                address: "Gran Avenida 5000".to_string(),
                commune: "San Miguel".to_string(),
                credential_ref: None,
                plan_id: Some("pyme".to_string()),
                billing_period: BillingPeriod::Monthly,
            })
            .await
            .unwrap();
        companies
            .create_branch(&Branch {
                id: "b-2".to_string(),
                company_id: "c-2".to_string(),
                name: "Casa matriz".to_string(),
                address: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        f.db.till()
            .open("c-2", "b-2", Money::zero(), USER_ID)
            .await
            .unwrap();
        let pool = f
            .db
            .folios()
            .register_pool("c-2", DocumentType::Boleta, 1, 10)
            .await
            .unwrap();

        let service = CheckoutService::new(
            f.db.clone(),
            f.cart.clone(),
            testing::signed_in(),
            f.emitter.clone(),
            TerminalConfig {
                company_id: "c-2".to_string(),
                branch_id: "b-2".to_string(),
                name: "Caja 1".to_string(),
            },
        );
        f.cart
            .add_line(CartProduct::catalog("p-pisco", "Pisco 35°", Money::from_pesos(6_990), None))
            .unwrap();

        let err = service.checkout(boleta_cash()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingCredential);
        assert_eq!(err.kind, ErrorKind::PreconditionFailed);

        // No folio burned, nothing sent, cart kept
        assert_eq!(f.db.folios().get(&pool.id).await.unwrap().next_folio, 1);
        assert!(f.emitter.sent().is_empty());
        assert_eq!(f.cart.totals().line_count, 1);

        // A vale carries no signature and goes through
        let receipt = service
            .checkout(CheckoutRequest {
                document_type: DocumentType::ValeDeVenta,
                payment_method: Some(PaymentMethod::Cash),
                customer_id: None,
            })
            .await
            .unwrap();
        assert_eq!(receipt.folio, None);
        assert_eq!(f.emitter.sent()[0].credential_ref, None);
    }

    /// Emitter during which the cashier keeps scanning products.
    struct ScanningEmitter {
        cart: CartState,
        inner: FakeEmitter,
    }

    #[async_trait]
    impl DocumentEmitter for ScanningEmitter {
        async fn emit(&self, envelope: &DocumentEnvelope) -> EmissionResult<EmittedDocument> {
            self.cart
                .add_line(CartProduct::catalog("p-empanada", "Empanada de pino", Money::from_pesos(10_000), None))
                .unwrap();
            self.cart
                .add_line(CartProduct::catalog("p-bebida", "Bebida 1,5 L", Money::from_pesos(1_990), None))
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.inner.emit(envelope).await
        }
    }

    #[tokio::test]
    async fn test_lines_added_during_emission_stay_in_cart() {
        let f = fixture().await;
        let session_id = open_till(&f.db, 0).await;
        f.db.folios()
            .register_pool(COMPANY_ID, DocumentType::Boleta, 1, 10)
            .await
            .unwrap();
        fill_cart(&f, 2).await;

        let service = CheckoutService::new(
            f.db.clone(),
            f.cart.clone(),
            testing::signed_in(),
            Arc::new(ScanningEmitter {
                cart: f.cart.clone(),
                inner: FakeEmitter::default(),
            }),
            testing::terminal(),
        );

        let receipt = service.checkout(boleta_cash()).await.unwrap();
        assert_eq!(receipt.total.pesos(), 20_000);
        assert_eq!(f.db.till().balance(&session_id).await.unwrap().pesos(), 20_000);

        // Only what was sold left the cart
        let lines = f.cart.with_cart(|c| c.lines().to_vec());
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0].identity.as_str(), lines[0].quantity), ("p-empanada", 1));
        assert_eq!((lines[1].identity.as_str(), lines[1].quantity), ("p-bebida", 1));
        assert_eq!(f.cart.totals().total.pesos(), 11_990);
    }

    /// Emitter during which another terminal closes the caja.
    struct ClosingEmitter {
        db: Database,
        session_id: String,
        inner: FakeEmitter,
    }

    #[async_trait]
    impl DocumentEmitter for ClosingEmitter {
        async fn emit(&self, envelope: &DocumentEnvelope) -> EmissionResult<EmittedDocument> {
            self.db
                .till()
                .close(&self.session_id, Money::from_pesos(5_000))
                .await
                .unwrap();
            self.inner.emit(envelope).await
        }
    }

    #[tokio::test]
    async fn test_till_closed_during_emission_is_reported() {
        let f = fixture().await;
        let session_id = open_till(&f.db, 5_000).await;
        f.db.folios()
            .register_pool(COMPANY_ID, DocumentType::Boleta, 1, 10)
            .await
            .unwrap();
        fill_cart(&f, 1).await;

        let service = CheckoutService::new(
            f.db.clone(),
            f.cart.clone(),
            testing::signed_in(),
            Arc::new(ClosingEmitter {
                db: f.db.clone(),
                session_id: session_id.clone(),
                inner: FakeEmitter::default(),
            }),
            testing::terminal(),
        );

        let receipt = service.checkout(boleta_cash()).await.unwrap();
        assert_eq!(receipt.folio, Some(1));
        assert!(!receipt.ingress_recorded);
        let notice = receipt.notice.unwrap();
        assert!(notice.contains("$10.000"), "{notice}");

        // The order exists, the closed session was not touched
        f.db.orders().require(&receipt.order_id).await.unwrap();
        assert!(f.db.till().movements(&session_id).await.unwrap().is_empty());
        assert!(f.cart.with_cart(Cart::is_empty));
    }

    #[tokio::test]
    async fn test_folio_status() {
        let f = fixture().await;
        f.db.folios()
            .register_pool(COMPANY_ID, DocumentType::Boleta, 1, 3)
            .await
            .unwrap();
        f.db.folios()
            .register_pool(COMPANY_ID, DocumentType::Factura, 1, 100)
            .await
            .unwrap();

        let status = f.service.folio_status().await.unwrap();
        assert_eq!(
            status,
            vec![
                FolioStatus {
                    document_type: DocumentType::Boleta,
                    remaining: 3,
                    low: true,
                },
                FolioStatus {
                    document_type: DocumentType::Factura,
                    remaining: 100,
                    low: false,
                },
            ]
        );
    }
}

//! The register - One till's session state.
//!
//! A [`Register`] owns the database handle, the settings, the running cart and the catalog and
//! transaction lists loaded from the stores. Everything that used to be shared global state
//! lives here and is passed around explicitly.
//!
//! Store failures while loading never abort the session: the register keeps whatever it had,
//! records a notice for the operator and carries on. Validation failures (empty cart,
//! insufficient cash) are returned to the caller as errors.

use crate::{
    config::Settings,
    core::{
        analysis::{
            self, AnalysisOptions, AnalysisRequest, CategoryRequest, CategorySuggestion,
            InventoryAdvice, InventoryRequest, SalesAnalysis, SalesAnalyst,
        },
        cart::{Cart, PaymentMethod},
        catalog, export,
        report::{self, Period, SalesReport},
        transaction::{self, Transaction},
    },
    entities::{category, product},
    errors::{Error, Result},
};
use chrono::{DateTime, Local, TimeZone};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Session state for one till.
#[derive(Debug)]
pub struct Register {
    db: DatabaseConnection,
    settings: Settings,
    cart: Cart,
    products: Vec<product::Model>,
    categories: Vec<category::Model>,
    transactions: Vec<Transaction>,
    notice: Option<String>,
}

impl Register {
    /// Opens a register and loads the catalog and transaction history.
    ///
    /// Loading failures are reported through [`Register::notice`], not as errors.
    ///
    /// # Errors
    /// Returns an error if the settings do not describe a valid cart policy.
    #[instrument(skip_all, fields(store = %settings.store.name))]
    pub async fn open(db: DatabaseConnection, settings: Settings) -> Result<Self> {
        let cart = Cart::new(settings.cart_policy()?);
        let mut register = Self {
            db,
            settings,
            cart,
            products: Vec::new(),
            categories: Vec::new(),
            transactions: Vec::new(),
            notice: None,
        };

        register.refresh_catalog().await;
        register.refresh_transactions().await;
        info!(
            products = register.products.len(),
            transactions = register.transactions.len(),
            "Register open"
        );
        Ok(register)
    }

    /// The running cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// The running cart, for quantity, discount and payment edits.
    pub const fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    /// Active products as last loaded.
    #[must_use]
    pub fn products(&self) -> &[product::Model] {
        &self.products
    }

    /// Categories as last loaded.
    #[must_use]
    pub fn categories(&self) -> &[category::Model] {
        &self.categories
    }

    /// Transactions as last loaded, newest first.
    #[must_use]
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Settings the register was opened with.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The latest notice for the operator, if any.
    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Returns and clears the latest notice.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Reloads products and categories. On failure the old lists are kept, a notice is set
    /// and `false` is returned.
    #[instrument(skip(self))]
    pub async fn refresh_catalog(&mut self) -> bool {
        let loaded = async {
            let products = catalog::get_all_active_products(&self.db).await?;
            let categories = catalog::list_categories(&self.db).await?;
            Ok::<_, Error>((products, categories))
        }
        .await;

        match loaded {
            Ok((products, categories)) => {
                self.products = products;
                self.categories = categories;
                true
            }
            Err(e) => {
                self.fail("Could not load the catalog", &e);
                false
            }
        }
    }

    /// Reloads the transaction history. On failure the old list is kept, a notice is set
    /// and `false` is returned.
    #[instrument(skip(self))]
    pub async fn refresh_transactions(&mut self) -> bool {
        match transaction::list_transactions(&self.db).await {
            Ok(transactions) => {
                self.transactions = transactions;
                true
            }
            Err(e) => {
                self.fail("Could not load transactions", &e);
                false
            }
        }
    }

    /// Adds a loaded product to the cart and returns the units actually added.
    ///
    /// # Errors
    /// Returns `ProductNotFound` if the product is not in the loaded catalog, or any error
    /// from [`Cart::add_item`].
    pub fn add_to_cart(&mut self, product_id: i64, quantity: u32) -> Result<u32> {
        let product = self
            .products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| Error::ProductNotFound {
                id: product_id.to_string(),
            })?;
        self.cart.add_item(product, quantity)
    }

    /// Checks out the cart, stores the sale and puts it at the head of the history.
    ///
    /// # Errors
    /// Returns validation errors from the cart unchanged. A store failure also sets a
    /// notice; in both cases the cart is kept.
    #[instrument(skip(self))]
    pub async fn checkout(
        &mut self,
        method: PaymentMethod,
        cash_received: Option<Decimal>,
    ) -> Result<Transaction> {
        let result =
            transaction::checkout_and_record(&self.db, &mut self.cart, method, cash_received)
                .await;

        match result {
            Ok(sale) => {
                self.transactions.insert(0, sale.clone());
                Ok(sale)
            }
            Err(e) => {
                if !e.is_validation() {
                    self.fail("Could not record the sale", &e);
                }
                Err(e)
            }
        }
    }

    /// Looks up a sale by id, first in the loaded history and then in the store.
    ///
    /// # Errors
    /// Returns `TransactionNotFound` if no such sale exists, or a database error.
    pub async fn find_transaction(&self, id: &str) -> Result<Transaction> {
        if let Some(sale) = self.transactions.iter().find(|t| t.id == id) {
            return Ok(sale.clone());
        }
        transaction::get_transaction_by_id(&self.db, id)
            .await?
            .ok_or_else(|| Error::TransactionNotFound { id: id.to_string() })
    }

    /// Report for `period`, measured against the local clock.
    #[must_use]
    pub fn report(&self, period: &Period) -> SalesReport {
        self.report_at(period, &Local::now())
    }

    /// Report for `period`, measured against `now`.
    #[must_use]
    pub fn report_at<Tz: TimeZone>(&self, period: &Period, now: &DateTime<Tz>) -> SalesReport {
        report::summarize(&self.transactions, period, now)
    }

    /// Transactions matching a search term, newest first.
    #[must_use]
    pub fn search_transactions(&self, term: &str) -> Vec<Transaction> {
        report::search(&self.transactions, term)
    }

    /// Loaded products below the configured low-stock threshold.
    #[must_use]
    pub fn low_stock(&self) -> Vec<&product::Model> {
        let threshold = self.settings.store.low_stock_threshold;
        self.products.iter().filter(|p| p.stock < threshold).collect()
    }

    /// Asks `analyst` about the sales in `period`. Never fails; see
    /// [`analysis::analyze_or_fallback`].
    ///
    /// A blank language in `options` is replaced by the configured one.
    pub async fn analyze(
        &self,
        analyst: &dyn SalesAnalyst,
        period: &Period,
        options: AnalysisOptions,
    ) -> SalesAnalysis {
        self.analyze_at(analyst, period, &Local::now(), options).await
    }

    /// Like [`Register::analyze`], with `period` measured against `now`.
    #[instrument(skip(self, analyst, now))]
    pub async fn analyze_at<Tz: TimeZone>(
        &self,
        analyst: &dyn SalesAnalyst,
        period: &Period,
        now: &DateTime<Tz>,
        mut options: AnalysisOptions,
    ) -> SalesAnalysis {
        if options.language.trim().is_empty() {
            options.language.clone_from(&self.settings.analysis.language);
        }

        let in_period = report::filter_by_period(&self.transactions, period, now);
        let request = AnalysisRequest::new(
            &in_period,
            &self.products,
            self.settings.analysis.max_transactions,
            self.settings.analysis.max_products,
            options,
        );
        analysis::analyze_or_fallback(analyst, &request).await
    }

    /// Asks `analyst` for stock advice on the loaded catalog. Never fails; see
    /// [`analysis::optimize_or_fallback`].
    #[instrument(skip(self, analyst))]
    pub async fn optimize_inventory(&self, analyst: &dyn SalesAnalyst) -> InventoryAdvice {
        let request = InventoryRequest::new(
            &self.products,
            &self.transactions,
            self.settings.analysis.max_transactions,
            self.settings.store.low_stock_threshold,
        );
        analysis::optimize_or_fallback(analyst, &request).await
    }

    /// Asks `analyst` for categories for a product, given the sales so far. Never fails.
    #[instrument(skip(self, analyst))]
    pub async fn suggest_categories(
        &self,
        analyst: &dyn SalesAnalyst,
        product_name: &str,
        product_description: &str,
    ) -> CategorySuggestion {
        let request = CategoryRequest {
            product_name: product_name.to_string(),
            product_description: product_description.to_string(),
            recent_sales: report::top_products(&self.transactions, report::DEFAULT_TOP_PRODUCTS),
            existing_categories: self.categories.iter().map(|c| c.name.clone()).collect(),
        };
        analysis::suggest_or_fallback(analyst, &request).await
    }

    /// Exports the transactions in `period` to a CSV file and returns the row count.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written; a notice is set as well.
    pub fn export<P: AsRef<Path>>(&mut self, period: &Period, path: P) -> Result<usize> {
        self.export_at(period, &Local::now(), path)
    }

    /// Like [`Register::export`], with `period` measured against `now`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written; a notice is set as well.
    #[instrument(skip(self, now, path), fields(path = %path.as_ref().display()))]
    pub fn export_at<Tz: TimeZone, P: AsRef<Path>>(
        &mut self,
        period: &Period,
        now: &DateTime<Tz>,
        path: P,
    ) -> Result<usize> {
        let in_period = report::filter_by_period(&self.transactions, period, now);
        export::export_to_path(path, &in_period).inspect_err(|e| {
            warn!("Export failed: {e}");
            self.notice = Some(format!("Could not export transactions: {e}"));
        })
    }

    fn fail(&mut self, context: &str, error: &Error) {
        warn!("{context}: {error}");
        self.notice = Some(format!("{context}: {error}"));
    }
}

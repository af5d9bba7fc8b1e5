//! Cart ledger - The in-progress sale and its derived totals.
//!
//! The cart owns read-only copies of catalog products, one line per product. Totals are never
//! stored: [`Cart::totals`] recomputes them from the current lines on every call, so they always
//! reconcile with what is in the cart. All arithmetic uses `Decimal` and is exact.
//!
//! Discounts are clamped to the line's gross amount, so no line (and no cart) can go negative.
//! Quantities are clamped to available stock when the policy asks for it.

use crate::{
    core::transaction::{LineSnapshot, Transaction},
    entities::product,
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A tax rate expressed as a fraction between 0 and 1 (0.10 = 10%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// Creates a tax rate, rejecting values outside `0..=1`.
    pub fn new(rate: Decimal) -> Result<Self> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(Error::Validation {
                message: format!("Tax rate must be between 0 and 1, got {rate}"),
            });
        }
        Ok(Self(rate))
    }

    /// The rate as a fraction.
    #[must_use]
    pub const fn as_decimal(self) -> Decimal {
        self.0
    }

    /// Tax owed on `amount`.
    #[must_use]
    pub fn apply(self, amount: Decimal) -> Decimal {
        amount * self.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self(Decimal::new(10, 2))
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash, with change given back
    #[default]
    Cash,
    /// Debit or credit card
    Card,
    /// Electronic wallet / QR payment
    #[serde(rename = "ewallet")]
    EWallet,
}

impl PaymentMethod {
    /// All methods, in display order.
    pub const ALL: [Self; 3] = [Self::Cash, Self::Card, Self::EWallet];

    /// Storage key (`"cash"`, `"card"`, `"ewallet"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::EWallet => "ewallet",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::Card => "Card",
            Self::EWallet => "E-Wallet",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "ewallet" | "e-wallet" => Ok(Self::EWallet),
            other => Err(Error::Validation {
                message: format!("Unknown payment method: {other}"),
            }),
        }
    }
}

/// Rules the cart enforces, taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartPolicy {
    /// The single tax rate applied to the subtotal
    pub tax_rate: TaxRate,
    /// Clamp quantities to the product's stock and refuse out-of-stock products
    pub clamp_to_stock: bool,
}

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    /// Read-only copy of the product as it was when first added
    pub product: product::Model,
    /// Units, always at least 1
    pub quantity: u32,
    /// Discount on the whole line, between 0 and the line's gross amount
    pub discount: Decimal,
}

impl CartLine {
    /// Unit price times quantity, before discount.
    #[must_use]
    pub fn gross(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }

    /// Gross minus discount.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.gross() - self.discount
    }

    fn clamp_discount(&mut self) {
        self.discount = self.discount.min(self.gross());
    }
}

/// Totals derived from the cart lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CartTotals {
    /// Σ(unit price × quantity − discount)
    pub subtotal: Decimal,
    /// subtotal × tax rate
    pub tax: Decimal,
    /// Σ discount
    pub discount: Decimal,
    /// subtotal + tax
    pub grand_total: Decimal,
}

/// The running sale.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    policy: CartPolicy,
    lines: Vec<CartLine>,
    payment_method: PaymentMethod,
    cash_received: Option<Decimal>,
    customer_id: Option<i64>,
    cashier_name: Option<String>,
}

impl Cart {
    /// Creates an empty cart.
    #[must_use]
    pub fn new(policy: CartPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// The policy the cart was created with.
    #[must_use]
    pub const fn policy(&self) -> CartPolicy {
        self.policy
    }

    /// Lines in the order they were first added.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Looks up the line for a product.
    #[must_use]
    pub fn line(&self, product_id: i64) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product.id == product_id)
    }

    /// True when the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Adds `quantity` units of `product`, merging into an existing line if there is one.
    ///
    /// Returns the number of units actually added, which is less than `quantity` when stock
    /// clamping capped the line.
    ///
    /// # Errors
    /// - `InvalidQuantity` when `quantity` is zero
    /// - `OutOfStock` when stock clamping is on and the product has no stock
    pub fn add_item(&mut self, product: &product::Model, quantity: u32) -> Result<u32> {
        if quantity == 0 {
            return Err(Error::InvalidQuantity { quantity: 0 });
        }

        let limit = self.stock_limit(product)?;

        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product.id == product.id)
        {
            let before = line.quantity;
            line.quantity = clamp_quantity(before.saturating_add(quantity), limit).max(before);
            line.clamp_discount();
            return Ok(line.quantity - before);
        }

        let added = clamp_quantity(quantity, limit);
        self.lines.push(CartLine {
            product: product.clone(),
            quantity: added,
            discount: Decimal::ZERO,
        });
        Ok(added)
    }

    /// Sets the quantity of a line. Zero or less removes the line.
    ///
    /// # Errors
    /// - `ProductNotFound` when the product is not in the cart
    /// - `InvalidQuantity` when `quantity` does not fit in a `u32`
    pub fn set_quantity(&mut self, product_id: i64, quantity: i64) -> Result<()> {
        let index = self.index_of(product_id)?;

        if quantity <= 0 {
            self.lines.remove(index);
            return Ok(());
        }

        let requested = u32::try_from(quantity).map_err(|_| Error::InvalidQuantity { quantity })?;
        let clamp = self.policy.clamp_to_stock;
        let Some(line) = self.lines.get_mut(index) else {
            return Err(not_in_cart(product_id));
        };

        let applied = if clamp {
            requested.min(available_stock(&line.product))
        } else {
            requested
        };

        if applied == 0 {
            self.lines.remove(index);
        } else {
            line.quantity = applied;
            line.clamp_discount();
        }

        Ok(())
    }

    /// Sets the discount for a line and returns the discount actually applied.
    ///
    /// Amounts above the line's gross are clamped to the gross.
    ///
    /// # Errors
    /// - `InvalidAmount` for a negative amount
    /// - `ProductNotFound` when the product is not in the cart
    pub fn set_discount(&mut self, product_id: i64, amount: Decimal) -> Result<Decimal> {
        if amount < Decimal::ZERO {
            return Err(Error::InvalidAmount { amount });
        }

        let line = self
            .lines
            .iter_mut()
            .find(|line| line.product.id == product_id)
            .ok_or_else(|| not_in_cart(product_id))?;

        line.discount = amount;
        line.clamp_discount();
        Ok(line.discount)
    }

    /// Removes a line. Returns whether the product was in the cart.
    pub fn remove_item(&mut self, product_id: i64) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.product.id != product_id);
        self.lines.len() != before
    }

    /// Empties the cart and resets the payment selection and customer.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.payment_method = PaymentMethod::default();
        self.cash_received = None;
        self.customer_id = None;
    }

    /// Recomputes the totals from the current lines.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        let subtotal: Decimal = self.lines.iter().map(CartLine::total).sum();
        let discount: Decimal = self.lines.iter().map(|line| line.discount).sum();
        let tax = self.policy.tax_rate.apply(subtotal);

        CartTotals {
            subtotal,
            tax,
            discount,
            grand_total: subtotal + tax,
        }
    }

    /// Records the payment method and cash amount the cashier has entered so far.
    pub fn select_payment(&mut self, method: PaymentMethod, cash_received: Option<Decimal>) {
        self.payment_method = method;
        self.cash_received = cash_received;
    }

    /// The currently selected payment method.
    #[must_use]
    pub const fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    /// Cash entered for the current sale, if any.
    #[must_use]
    pub const fn cash_received(&self) -> Option<Decimal> {
        self.cash_received
    }

    /// Attaches (or detaches) a customer to the sale.
    pub fn set_customer(&mut self, customer_id: Option<i64>) {
        self.customer_id = customer_id;
    }

    /// Sets the cashier recorded on every sale from this cart.
    pub fn set_cashier(&mut self, cashier_name: Option<String>) {
        self.cashier_name = cashier_name;
    }

    /// Change due for the selected payment: `max(0, cash − grand total)` for cash, else zero.
    #[must_use]
    pub fn change(&self) -> Decimal {
        match (self.payment_method, self.cash_received) {
            (PaymentMethod::Cash, Some(cash)) => {
                (cash - self.totals().grand_total).max(Decimal::ZERO)
            }
            _ => Decimal::ZERO,
        }
    }

    /// Whether the selected payment would be accepted by [`Cart::checkout`].
    #[must_use]
    pub fn can_checkout(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        match self.payment_method {
            PaymentMethod::Cash => self
                .cash_received
                .is_some_and(|cash| cash >= self.totals().grand_total),
            PaymentMethod::Card | PaymentMethod::EWallet => true,
        }
    }

    /// Builds the transaction for the current cart without clearing it.
    ///
    /// # Errors
    /// - `EmptyCart` when there are no lines
    /// - `InvalidAmount` for negative cash
    /// - `InsufficientCash` when a cash payment does not cover the grand total
    pub fn snapshot_at(
        &self,
        method: PaymentMethod,
        cash_received: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        if self.is_empty() {
            return Err(Error::EmptyCart);
        }

        let totals = self.totals();
        let (cash_received, change) = match method {
            PaymentMethod::Cash => {
                let received = cash_received.unwrap_or(Decimal::ZERO);
                if received < Decimal::ZERO {
                    return Err(Error::InvalidAmount { amount: received });
                }
                if received < totals.grand_total {
                    return Err(Error::InsufficientCash {
                        received,
                        due: totals.grand_total,
                    });
                }
                (Some(received), Some(received - totals.grand_total))
            }
            PaymentMethod::Card | PaymentMethod::EWallet => (None, None),
        };

        Ok(Transaction {
            id: Transaction::new_id(),
            created_at: Some(now),
            items: self.lines.iter().map(LineSnapshot::from).collect(),
            subtotal: totals.subtotal,
            tax: totals.tax,
            discount: totals.discount,
            grand_total: totals.grand_total,
            payment_method: method,
            cash_received,
            change,
            customer_id: self.customer_id,
            cashier_name: self.cashier_name.clone(),
        })
    }

    /// Checks out at an explicit time: builds the transaction and clears the cart.
    ///
    /// On error the cart is left exactly as it was.
    pub fn checkout_at(
        &mut self,
        method: PaymentMethod,
        cash_received: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        let transaction = self.snapshot_at(method, cash_received, now)?;
        self.clear();
        Ok(transaction)
    }

    /// Checks out now. See [`Cart::checkout_at`].
    pub fn checkout(
        &mut self,
        method: PaymentMethod,
        cash_received: Option<Decimal>,
    ) -> Result<Transaction> {
        self.checkout_at(method, cash_received, Utc::now())
    }

    fn index_of(&self, product_id: i64) -> Result<usize> {
        self.lines
            .iter()
            .position(|line| line.product.id == product_id)
            .ok_or_else(|| not_in_cart(product_id))
    }

    fn stock_limit(&self, product: &product::Model) -> Result<Option<u32>> {
        if !self.policy.clamp_to_stock {
            return Ok(None);
        }
        match available_stock(product) {
            0 => Err(Error::OutOfStock {
                name: product.name.clone(),
            }),
            stock => Ok(Some(stock)),
        }
    }
}

fn available_stock(product: &product::Model) -> u32 {
    u32::try_from(product.stock).unwrap_or(0)
}

fn clamp_quantity(quantity: u32, limit: Option<u32>) -> u32 {
    limit.map_or(quantity, |limit| quantity.min(limit))
}

fn not_in_cart(product_id: i64) -> Error {
    Error::ProductNotFound {
        id: product_id.to_string(),
    }
}

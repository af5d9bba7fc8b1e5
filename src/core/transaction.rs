//! Transaction records - Frozen sales and the store they are appended to.
//!
//! A [`Transaction`] is built by the cart at checkout and is never modified afterwards. The store
//! only offers append and read: there is no update or delete path. Header and line items are
//! written inside one database transaction so a sale is either fully recorded or not at all.
//! Rows that cannot be turned back into a `Transaction` (unknown payment method, negative
//! quantity) are skipped with a warning rather than failing the whole listing.

use crate::{
    core::{
        cart::{Cart, CartLine, PaymentMethod},
        timestamp,
    },
    entities::{self, transaction, transaction_item},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{debug, info, warn};

/// One sold line, copied from the cart at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineSnapshot {
    /// Product the line was sold from
    pub product_id: i64,
    /// Product name at the time of sale
    pub name: String,
    /// Category label at the time of sale
    pub category: String,
    /// Unit price at the time of sale
    pub unit_price: Decimal,
    /// Units sold
    pub quantity: u32,
    /// Discount on the whole line
    pub discount: Decimal,
}

impl LineSnapshot {
    /// Unit price times quantity, before discount.
    #[must_use]
    pub fn gross(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl From<&CartLine> for LineSnapshot {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product.id,
            name: line.product.name.clone(),
            category: line.product.category.clone(),
            unit_price: line.product.price,
            quantity: line.quantity,
            discount: line.discount,
        }
    }
}

/// A completed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    /// Unique id, `TXN-` followed by a UUID
    pub id: String,
    /// When the sale happened; `None` if the stored value could not be parsed
    pub created_at: Option<DateTime<Utc>>,
    /// Frozen line items in cart order
    pub items: Vec<LineSnapshot>,
    /// Σ(unit price × quantity − discount)
    pub subtotal: Decimal,
    /// Tax on the subtotal
    pub tax: Decimal,
    /// Σ line discounts
    pub discount: Decimal,
    /// subtotal + tax
    pub grand_total: Decimal,
    /// How the sale was paid
    pub payment_method: PaymentMethod,
    /// Cash handed over (cash only)
    pub cash_received: Option<Decimal>,
    /// Change given back (cash only)
    pub change: Option<Decimal>,
    /// Customer the sale was attached to
    pub customer_id: Option<i64>,
    /// Cashier who rang up the sale
    pub cashier_name: Option<String>,
}

impl Transaction {
    /// Generates a fresh transaction id.
    #[must_use]
    pub fn new_id() -> String {
        format!("TXN-{}", uuid::Uuid::new_v4().simple())
    }

    /// Total units sold.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// `dd/MM/yyyy HH:mm` in local time, or `"-"` when the timestamp is unknown.
    #[must_use]
    pub fn date_label(&self) -> String {
        self.created_at
            .map_or_else(|| "-".to_string(), timestamp::format_label)
    }

    /// Items as a single string, e.g. `"Coffee x2, Yoga Mat x1"`.
    #[must_use]
    pub fn items_summary(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("{} x{}", item.name, item.quantity))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn from_models(
        header: transaction::Model,
        mut items: Vec<transaction_item::Model>,
    ) -> Result<Self> {
        let payment_method = header.payment_method.parse::<PaymentMethod>()?;
        items.sort_by_key(|item| item.position);

        let items = items
            .into_iter()
            .map(|item| {
                let quantity = u32::try_from(item.quantity).map_err(|_| Error::InvalidQuantity {
                    quantity: i64::from(item.quantity),
                })?;
                Ok(LineSnapshot {
                    product_id: item.product_id,
                    name: item.name,
                    category: item.category,
                    unit_price: item.unit_price,
                    quantity,
                    discount: item.discount,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            created_at: timestamp::parse(&header.created_at),
            id: header.id,
            items,
            subtotal: header.subtotal,
            tax: header.tax,
            discount: header.discount,
            grand_total: header.grand_total,
            payment_method,
            cash_received: header.cash_received,
            change: header.change,
            customer_id: header.customer_id,
            cashier_name: header.cashier_name,
        })
    }
}

/// Appends a transaction and its line items, returning the transaction id.
///
/// # Errors
/// Returns an error if the transaction has no items, a quantity does not fit the
/// storage column, or the database write fails. Nothing is written on error.
pub async fn append_transaction(db: &DatabaseConnection, record: &Transaction) -> Result<String> {
    if record.items.is_empty() {
        return Err(Error::EmptyCart);
    }

    let txn = db.begin().await?;

    transaction::ActiveModel {
        id: Set(record.id.clone()),
        created_at: Set(record
            .created_at
            .map_or_else(String::new, timestamp::format_storage)),
        subtotal: Set(record.subtotal),
        tax: Set(record.tax),
        discount: Set(record.discount),
        grand_total: Set(record.grand_total),
        payment_method: Set(record.payment_method.as_str().to_string()),
        cash_received: Set(record.cash_received),
        change: Set(record.change),
        customer_id: Set(record.customer_id),
        cashier_name: Set(record.cashier_name.clone()),
    }
    .insert(&txn)
    .await?;

    for (position, item) in record.items.iter().enumerate() {
        let quantity = i32::try_from(item.quantity).map_err(|_| Error::InvalidQuantity {
            quantity: i64::from(item.quantity),
        })?;
        let position = i32::try_from(position).map_err(|_| Error::Validation {
            message: "Too many line items in one transaction".to_string(),
        })?;

        transaction_item::ActiveModel {
            transaction_id: Set(record.id.clone()),
            position: Set(position),
            product_id: Set(item.product_id),
            name: Set(item.name.clone()),
            category: Set(item.category.clone()),
            unit_price: Set(item.unit_price),
            quantity: Set(quantity),
            discount: Set(item.discount),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;

    info!(
        id = %record.id,
        total = %record.grand_total,
        method = %record.payment_method,
        "Recorded transaction"
    );
    Ok(record.id.clone())
}

/// Retrieves all transactions, newest first. Sales with an unknown timestamp come last.
pub async fn list_transactions(db: &DatabaseConnection) -> Result<Vec<Transaction>> {
    let rows = entities::Transaction::find()
        .order_by_desc(transaction::Column::CreatedAt)
        .find_with_related(entities::TransactionItem)
        .all(db)
        .await?;

    let mut transactions: Vec<Transaction> = rows
        .into_iter()
        .filter_map(|(header, items)| {
            let id = header.id.clone();
            Transaction::from_models(header, items)
                .inspect_err(|e| warn!(%id, "Skipping unreadable transaction: {e}"))
                .ok()
        })
        .collect();

    // Option orders None first, so a descending sort puts unknown timestamps last
    transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    debug!("Loaded {} transactions", transactions.len());
    Ok(transactions)
}

/// Retrieves one transaction by id.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: &str,
) -> Result<Option<Transaction>> {
    let Some(header) = entities::Transaction::find_by_id(transaction_id.to_string())
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let items = header
        .find_related(entities::TransactionItem)
        .all(db)
        .await?;

    Transaction::from_models(header, items).map(Some)
}

/// Checks out the cart and records the sale.
///
/// The cart is cleared only after the transaction is stored, so a failed write leaves the
/// sale in the cart for another attempt.
pub async fn checkout_and_record(
    db: &DatabaseConnection,
    cart: &mut Cart,
    method: PaymentMethod,
    cash_received: Option<Decimal>,
) -> Result<Transaction> {
    let record = cart.snapshot_at(method, cash_received, Utc::now())?;
    append_transaction(db, &record).await?;
    cart.clear();
    Ok(record)
}

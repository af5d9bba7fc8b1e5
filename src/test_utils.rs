//! Shared test utilities for `PosBuddy`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        cart::{PaymentMethod, TaxRate},
        catalog::{self, NewProduct},
        transaction::{LineSnapshot, Transaction},
    },
    entities,
    errors::Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Builds a product model without touching a database.
///
/// # Defaults
/// * `category`: "General"
/// * `description`: empty
pub fn sample_product(id: i64, name: &str, price: Decimal, stock: i32) -> entities::ProductModel {
    let now = Utc::now().naive_utc();
    entities::ProductModel {
        id,
        name: name.to_string(),
        price,
        stock,
        category: "General".to_string(),
        description: String::new(),
        image: None,
        barcode: None,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    }
}

/// Fields for a new product in the "General" category.
pub fn new_product(name: &str, price: Decimal, stock: i32) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        price,
        stock,
        category: "General".to_string(),
        ..NewProduct::default()
    }
}

/// Creates a test product with custom price and stock.
pub async fn create_custom_product(
    db: &DatabaseConnection,
    name: &str,
    price: Decimal,
    stock: i32,
) -> Result<entities::ProductModel> {
    catalog::create_product(db, new_product(name, price, stock)).await
}

/// Builds a transaction at `at` from `(name, unit price, quantity)` lines.
///
/// Totals use the default 10% tax and no discounts. Cash sales are paid exactly.
pub fn sample_transaction(
    at: DateTime<Utc>,
    method: PaymentMethod,
    lines: &[(&str, Decimal, u32)],
) -> Transaction {
    let items: Vec<LineSnapshot> = lines
        .iter()
        .zip(1..)
        .map(|(&(name, unit_price, quantity), product_id)| LineSnapshot {
            product_id,
            name: name.to_string(),
            category: "General".to_string(),
            unit_price,
            quantity,
            discount: Decimal::ZERO,
        })
        .collect();

    let subtotal: Decimal = items.iter().map(LineSnapshot::gross).sum();
    let tax = TaxRate::default().apply(subtotal);
    let grand_total = subtotal + tax;
    let (cash_received, change) = match method {
        PaymentMethod::Cash => (Some(grand_total), Some(Decimal::ZERO)),
        PaymentMethod::Card | PaymentMethod::EWallet => (None, None),
    };

    Transaction {
        id: Transaction::new_id(),
        created_at: Some(at),
        items,
        subtotal,
        tax,
        discount: Decimal::ZERO,
        grand_total,
        payment_method: method,
        cash_received,
        change,
        customer_id: None,
        cashier_name: None,
    }
}

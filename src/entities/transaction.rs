//! Transaction entity - Header row of a completed sale.
//!
//! Rows are written once at checkout and never updated. `created_at` is kept as text and
//! parsed on read so a malformed value degrades one sale instead of failing the whole query.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier (`TXN-` followed by a UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Creation timestamp, RFC 3339 UTC with millisecond precision
    pub created_at: String,
    /// Sum of line totals after line discounts
    pub subtotal: Decimal,
    /// Tax charged on the subtotal
    pub tax: Decimal,
    /// Sum of line discounts
    pub discount: Decimal,
    /// Amount due: subtotal plus tax
    pub grand_total: Decimal,
    /// Payment method: `"cash"`, `"card"` or `"ewallet"`
    pub payment_method: String,
    /// Cash handed over (cash payments only)
    pub cash_received: Option<Decimal>,
    /// Change returned (cash payments only)
    pub change: Option<Decimal>,
    /// Optional customer reference
    pub customer_id: Option<i64>,
    /// Optional name of the cashier who rang up the sale
    pub cashier_name: Option<String>,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One transaction has many frozen line items
    #[sea_orm(has_many = "super::transaction_item::Entity")]
    Items,
}

impl Related<super::transaction_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

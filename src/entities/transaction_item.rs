//! Transaction item entity - Frozen copy of one cart line at checkout.
//!
//! Name, category and unit price are copied from the product so later catalog edits never
//! rewrite sales history.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_items")]
pub struct Model {
    /// Unique identifier for the row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning transaction
    pub transaction_id: String,
    /// Position of the line within the sale, starting at 0
    pub position: i32,
    /// Product the line was sold from
    pub product_id: i64,
    /// Product name at the time of sale
    pub name: String,
    /// Category label at the time of sale
    pub category: String,
    /// Unit price at the time of sale
    pub unit_price: Decimal,
    /// Units sold
    pub quantity: i32,
    /// Discount applied to the whole line
    pub discount: Decimal,
}

/// Defines relationships between `TransactionItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each item belongs to one transaction
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id"
    )]
    Transaction,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

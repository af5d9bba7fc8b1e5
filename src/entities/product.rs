//! Product entity - Represents the sellable items in the catalog.
//!
//! Each product has a name, unit price, available stock, and a category label.
//! The cart ledger only ever holds read-only copies of these models; stock is owned by the catalog.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Organic Coffee Beans")
    pub name: String,
    /// Unit price, never negative
    pub price: Decimal,
    /// Units available for sale
    pub stock: i32,
    /// Category label used for grouping and search
    pub category: String,
    /// Free-text description
    pub description: String,
    /// Optional image reference (URL or path)
    pub image: Option<String>,
    /// Optional barcode
    pub barcode: Option<String>,
    /// Soft delete flag - if true, product is hidden but sales history still names it
    pub is_deleted: bool,
    /// When the product was created
    pub created_at: DateTime,
    /// When the product was last modified
    pub updated_at: DateTime,
}

/// Products have no enforced relations; sale lines keep their own snapshot of name and price
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

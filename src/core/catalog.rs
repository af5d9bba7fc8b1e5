//! Catalog business logic - Products and the categories they are filed under.
//!
//! Products are soft deleted so that past transactions, which copy the product name and price
//! at checkout, never point at a row that disappeared. Categories are plain labels: a product
//! stores its category name, not a foreign key, so renaming or deleting a category never
//! rewrites product rows.

use crate::{
    config::Settings,
    entities::{Category, Product, category, product},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};
use tracing::{debug, info};

/// Fields for a new product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProduct {
    /// Display name, must not be blank
    pub name: String,
    /// Unit price, must not be negative
    pub price: Decimal,
    /// Units available, must not be negative
    pub stock: i32,
    /// Category label
    pub category: String,
    /// Free-form description
    pub description: String,
    /// Image reference
    pub image: Option<String>,
    /// Barcode
    pub barcode: Option<String>,
}

/// Partial update for a product. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    /// New name
    pub name: Option<String>,
    /// New unit price
    pub price: Option<Decimal>,
    /// New stock level
    pub stock: Option<i32>,
    /// New category label
    pub category: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New image reference
    pub image: Option<String>,
    /// New barcode
    pub barcode: Option<String>,
}

/// Retrieves all active (non-deleted) products, ordered alphabetically by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_active_products(db: &DatabaseConnection) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds an active product by its exact name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_product_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<product::Model>> {
    Product::find()
        .filter(product::Column::Name.eq(name))
        .filter(product::Column::IsDeleted.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a product by id. Soft-deleted products are returned too, so history can still
/// resolve them.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_product_by_id(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a product after validating its fields.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - The price is negative
/// - The stock is negative
/// - The database insert fails
pub async fn create_product(db: &DatabaseConnection, new: NewProduct) -> Result<product::Model> {
    validate_name(&new.name, "Product")?;
    validate_price(new.price)?;
    validate_stock(new.stock)?;

    let now = chrono::Utc::now().naive_utc();

    let product = product::ActiveModel {
        name: Set(new.name.trim().to_string()),
        price: Set(new.price),
        stock: Set(new.stock),
        category: Set(new.category.trim().to_string()),
        description: Set(new.description),
        image: Set(new.image),
        barcode: Set(new.barcode),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(id = product.id, name = %product.name, "Created product");
    Ok(product)
}

/// Applies a partial update to an active product.
///
/// # Errors
/// Returns an error if:
/// - A supplied field fails the same validation as [`create_product`]
/// - The product does not exist or is deleted
/// - The database update fails
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: i64,
    changes: ProductUpdate,
) -> Result<product::Model> {
    if let Some(name) = &changes.name {
        validate_name(name, "Product")?;
    }
    if let Some(price) = changes.price {
        validate_price(price)?;
    }
    if let Some(stock) = changes.stock {
        validate_stock(stock)?;
    }

    let mut product: product::ActiveModel = find_active(db, product_id).await?.into();

    if let Some(name) = changes.name {
        product.name = Set(name.trim().to_string());
    }
    if let Some(price) = changes.price {
        product.price = Set(price);
    }
    if let Some(stock) = changes.stock {
        product.stock = Set(stock);
    }
    if let Some(category) = changes.category {
        product.category = Set(category.trim().to_string());
    }
    if let Some(description) = changes.description {
        product.description = Set(description);
    }
    if let Some(image) = changes.image {
        product.image = Set(Some(image));
    }
    if let Some(barcode) = changes.barcode {
        product.barcode = Set(Some(barcode));
    }
    product.updated_at = Set(chrono::Utc::now().naive_utc());

    product.update(db).await.map_err(Into::into)
}

/// Soft deletes a product by marking it as deleted.
///
/// # Errors
/// Returns an error if the product does not exist or is already deleted, or if the
/// database update fails.
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<product::Model> {
    let mut product: product::ActiveModel = find_active(db, product_id).await?.into();

    product.is_deleted = Set(true);
    product.updated_at = Set(chrono::Utc::now().naive_utc());

    let deleted = product.update(db).await?;
    info!(id = deleted.id, name = %deleted.name, "Deleted product");
    Ok(deleted)
}

/// Active products whose name or category contains `term`, ignoring case.
/// An empty term returns every active product.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn search_products(db: &DatabaseConnection, term: &str) -> Result<Vec<product::Model>> {
    let needle = term.trim().to_lowercase();
    let products = get_all_active_products(db).await?;

    if needle.is_empty() {
        return Ok(products);
    }

    Ok(products
        .into_iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&needle) || p.category.to_lowercase().contains(&needle)
        })
        .collect())
}

/// Active products with stock strictly below `threshold`, lowest stock first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn low_stock_products(
    db: &DatabaseConnection,
    threshold: i32,
) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .filter(product::Column::Stock.lt(threshold))
        .order_by_asc(product::Column::Stock)
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all categories, ordered by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_categories(db: &DatabaseConnection) -> Result<Vec<category::Model>> {
    Category::find()
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a category. Names are unique.
///
/// # Errors
/// Returns an error if the name is blank or already taken, or if the insert fails.
pub async fn create_category(
    db: &DatabaseConnection,
    name: &str,
    description: Option<String>,
) -> Result<category::Model> {
    validate_name(name, "Category")?;
    let name = name.trim();
    ensure_category_name_free(db, name, None).await?;

    let category = category::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(id = category.id, name = %category.name, "Created category");
    Ok(category)
}

/// Renames a category and replaces its description.
///
/// # Errors
/// Returns an error if the category does not exist, the new name is blank or taken by
/// another category, or the update fails.
pub async fn update_category(
    db: &DatabaseConnection,
    category_id: i64,
    name: &str,
    description: Option<String>,
) -> Result<category::Model> {
    validate_name(name, "Category")?;
    let name = name.trim();

    let mut category: category::ActiveModel = Category::find_by_id(category_id)
        .one(db)
        .await?
        .ok_or(Error::CategoryNotFound { id: category_id })?
        .into();

    ensure_category_name_free(db, name, Some(category_id)).await?;

    category.name = Set(name.to_string());
    category.description = Set(description);
    category.update(db).await.map_err(Into::into)
}

/// Deletes a category. Products keep their category label.
///
/// # Errors
/// Returns an error if the category does not exist or the delete fails.
pub async fn delete_category(db: &DatabaseConnection, category_id: i64) -> Result<()> {
    let result = Category::delete_by_id(category_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::CategoryNotFound { id: category_id });
    }
    info!(id = category_id, "Deleted category");
    Ok(())
}

/// Inserts the configured categories and products when the catalog is empty.
///
/// Categories and products are seeded independently: an existing category table does not
/// stop products from being seeded into an empty product table. Returns the number of
/// products inserted.
///
/// # Errors
/// Returns an error if a seed entry fails validation or a database call fails.
pub async fn seed_catalog(db: &DatabaseConnection, settings: &Settings) -> Result<usize> {
    if Category::find().count(db).await? == 0 {
        for seed in &settings.categories {
            create_category(db, &seed.name, seed.description.clone()).await?;
        }
    } else {
        debug!("Categories already present, skipping category seed");
    }

    if Product::find().count(db).await? > 0 {
        debug!("Products already present, skipping product seed");
        return Ok(0);
    }

    for seed in &settings.products {
        create_product(
            db,
            NewProduct {
                name: seed.name.clone(),
                price: seed.price,
                stock: seed.stock,
                category: seed.category.clone(),
                description: seed.description.clone(),
                image: seed.image.clone(),
                barcode: None,
            },
        )
        .await?;
    }

    info!("Seeded {} products", settings.products.len());
    Ok(settings.products.len())
}

async fn find_active(db: &DatabaseConnection, product_id: i64) -> Result<product::Model> {
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .filter(|product| !product.is_deleted)
        .ok_or_else(|| Error::ProductNotFound {
            id: product_id.to_string(),
        })
}

async fn ensure_category_name_free(
    db: &DatabaseConnection,
    name: &str,
    except_id: Option<i64>,
) -> Result<()> {
    let existing = Category::find()
        .filter(category::Column::Name.eq(name))
        .one(db)
        .await?;

    match existing {
        Some(other) if Some(other.id) != except_id => Err(Error::Validation {
            message: format!("Category '{name}' already exists"),
        }),
        _ => Ok(()),
    }
}

fn validate_name(name: &str, what: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation {
            message: format!("{what} name cannot be empty"),
        });
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<()> {
    if price < Decimal::ZERO {
        return Err(Error::InvalidAmount { amount: price });
    }
    Ok(())
}

fn validate_stock(stock: i32) -> Result<()> {
    if stock < 0 {
        return Err(Error::InvalidQuantity {
            quantity: i64::from(stock),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::settings::{CategorySeed, ProductSeed};
    use crate::test_utils::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_product_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_product(&db, new_product("   ", dec!(10), 1)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_product(&db, new_product("Coffee", dec!(-10), 1)).await;
        assert!(matches!(
            result,
            Err(Error::InvalidAmount { amount }) if amount == dec!(-10)
        ));

        let result = create_product(&db, new_product("Coffee", dec!(10), -1)).await;
        assert!(matches!(result, Err(Error::InvalidQuantity { quantity: -1 })));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_and_get_product() -> Result<()> {
        let db = setup_test_db().await?;

        let created = create_product(&db, new_product("  Organic Coffee Beans ", dec!(24.50), 50))
            .await?;
        assert_eq!(created.name, "Organic Coffee Beans");
        assert_eq!(created.price, dec!(24.50));
        assert_eq!(created.stock, 50);
        assert!(!created.is_deleted);

        let by_id = get_product_by_id(&db, created.id).await?.unwrap();
        assert_eq!(by_id.id, created.id);

        let by_name = get_product_by_name(&db, "Organic Coffee Beans").await?.unwrap();
        assert_eq!(by_name.id, created.id);

        assert!(get_product_by_name(&db, "Tea").await?.is_none());
        assert!(get_product_by_id(&db, 999).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_active_products_are_sorted_and_exclude_deleted() -> Result<()> {
        let db = setup_test_db().await?;
        let wallet = create_custom_product(&db, "Wallet", dec!(75), 40).await?;
        let blender = create_custom_product(&db, "Blender", dec!(89.5), 20).await?;
        let doomed = create_custom_product(&db, "Discontinued", dec!(1), 1).await?;

        let deleted = delete_product(&db, doomed.id).await?;
        assert!(deleted.is_deleted);

        let active = get_all_active_products(&db).await?;
        let names: Vec<&str> = active.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Blender", "Wallet"]);
        assert_eq!(active[0].id, blender.id);
        assert_eq!(active[1].id, wallet.id);

        // Deleted products stay reachable by id for history
        assert!(get_product_by_id(&db, doomed.id).await?.unwrap().is_deleted);
        assert!(get_product_by_name(&db, "Discontinued").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_update_product() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_custom_product(&db, "Original", dec!(10), 5).await?;

        let updated = update_product(
            &db,
            product.id,
            ProductUpdate {
                name: Some("Renamed".to_string()),
                price: Some(dec!(12.5)),
                stock: Some(8),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.price, dec!(12.5));
        assert_eq!(updated.stock, 8);
        assert_eq!(updated.category, product.category);

        let stored = Product::find_by_id(product.id).one(&db).await?.unwrap();
        assert_eq!(stored.name, "Renamed");

        Ok(())
    }

    #[tokio::test]
    async fn test_update_product_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = update_product(
            &db,
            1,
            ProductUpdate {
                name: Some(String::new()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = update_product(
            &db,
            1,
            ProductUpdate {
                price: Some(dec!(-0.01)),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_product() -> Result<()> {
        let db = setup_test_db().await?;

        let result = update_product(&db, 999, ProductUpdate::default()).await;
        assert!(matches!(result, Err(Error::ProductNotFound { .. })));

        let result = delete_product(&db, 999).await;
        assert!(matches!(result, Err(Error::ProductNotFound { .. })));

        let product = create_custom_product(&db, "Once", dec!(1), 1).await?;
        delete_product(&db, product.id).await?;
        let result = delete_product(&db, product.id).await;
        assert!(matches!(result, Err(Error::ProductNotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_search_products() -> Result<()> {
        let db = setup_test_db().await?;
        create_product(
            &db,
            NewProduct {
                category: "Groceries".to_string(),
                ..new_product("Organic Coffee Beans", dec!(24.5), 50)
            },
        )
        .await?;
        create_product(
            &db,
            NewProduct {
                category: "Sports".to_string(),
                ..new_product("Yoga Mat", dec!(39.5), 100)
            },
        )
        .await?;

        let hits = search_products(&db, "coffee").await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Organic Coffee Beans");

        let hits = search_products(&db, "SPORT").await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Yoga Mat");

        assert_eq!(search_products(&db, "").await?.len(), 2);
        assert!(search_products(&db, "laptop").await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_low_stock_products() -> Result<()> {
        let db = setup_test_db().await?;
        create_custom_product(&db, "Plenty", dec!(1), 50).await?;
        create_custom_product(&db, "Few", dec!(1), 3).await?;
        create_custom_product(&db, "Boundary", dec!(1), 10).await?;
        create_custom_product(&db, "None", dec!(1), 0).await?;

        let low = low_stock_products(&db, 10).await?;
        let names: Vec<&str> = low.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["None", "Few"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_category_crud() -> Result<()> {
        let db = setup_test_db().await?;

        let groceries = create_category(&db, "Groceries", None).await?;
        let sports = create_category(&db, "Sports", Some("Gear".to_string())).await?;

        let result = create_category(&db, " Groceries ", None).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_category(&db, "", None).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let renamed = update_category(&db, sports.id, "Fitness", None).await?;
        assert_eq!(renamed.name, "Fitness");
        assert_eq!(renamed.description, None);

        // Keeping its own name is not a conflict
        update_category(&db, groceries.id, "Groceries", Some("Food".to_string())).await?;

        let result = update_category(&db, groceries.id, "Fitness", None).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let names: Vec<String> = list_categories(&db)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Fitness", "Groceries"]);

        delete_category(&db, groceries.id).await?;
        assert_eq!(list_categories(&db).await?.len(), 1);

        let result = delete_category(&db, groceries.id).await;
        assert!(matches!(result, Err(Error::CategoryNotFound { .. })));

        let result = update_category(&db, 999, "Ghost", None).await;
        assert!(matches!(result, Err(Error::CategoryNotFound { id: 999 })));

        Ok(())
    }

    #[tokio::test]
    async fn test_seed_catalog_only_when_empty() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = Settings {
            categories: vec![CategorySeed {
                name: "Groceries".to_string(),
                description: None,
            }],
            products: vec![ProductSeed {
                name: "Organic Coffee Beans".to_string(),
                price: dec!(24.50),
                stock: 50,
                category: "Groceries".to_string(),
                description: "Fair trade".to_string(),
                image: None,
            }],
            ..Settings::default()
        };

        assert_eq!(seed_catalog(&db, &settings).await?, 1);
        assert_eq!(seed_catalog(&db, &settings).await?, 0);

        assert_eq!(get_all_active_products(&db).await?.len(), 1);
        assert_eq!(list_categories(&db).await?.len(), 1);

        Ok(())
    }
}

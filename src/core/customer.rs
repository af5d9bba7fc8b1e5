//! Customer records that a sale can be attached to.

use crate::{
    entities::{Customer, customer},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Fields for creating or replacing a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerDetails {
    /// Full name, must not be blank
    pub name: String,
    /// Email address
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Postal address
    pub address: Option<String>,
}

impl CustomerDetails {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation {
                message: "Customer name cannot be empty".to_string(),
            });
        }
        if let Some(email) = self.email.as_deref().filter(|email| !email.contains('@')) {
            return Err(Error::Validation {
                message: format!("Invalid email address: {email}"),
            });
        }
        Ok(())
    }
}

/// Retrieves all customers, ordered by name.
pub async fn list_customers(db: &DatabaseConnection) -> Result<Vec<customer::Model>> {
    Customer::find()
        .order_by_asc(customer::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a customer by id.
pub async fn get_customer_by_id(
    db: &DatabaseConnection,
    customer_id: i64,
) -> Result<Option<customer::Model>> {
    Customer::find_by_id(customer_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a customer.
///
/// # Errors
/// Returns an error if the name is blank, the email has no `@`, or the insert fails.
pub async fn create_customer(
    db: &DatabaseConnection,
    details: CustomerDetails,
) -> Result<customer::Model> {
    details.validate()?;

    let customer = customer::ActiveModel {
        name: Set(details.name.trim().to_string()),
        email: Set(details.email),
        phone: Set(details.phone),
        address: Set(details.address),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(id = customer.id, name = %customer.name, "Created customer");
    Ok(customer)
}

/// Replaces a customer's details.
///
/// # Errors
/// Returns an error if validation fails, the customer does not exist, or the update fails.
pub async fn update_customer(
    db: &DatabaseConnection,
    customer_id: i64,
    details: CustomerDetails,
) -> Result<customer::Model> {
    details.validate()?;

    let mut customer: customer::ActiveModel = Customer::find_by_id(customer_id)
        .one(db)
        .await?
        .ok_or(Error::CustomerNotFound { id: customer_id })?
        .into();

    customer.name = Set(details.name.trim().to_string());
    customer.email = Set(details.email);
    customer.phone = Set(details.phone);
    customer.address = Set(details.address);

    customer.update(db).await.map_err(Into::into)
}

/// Deletes a customer. Past transactions keep the customer id they were recorded with.
///
/// # Errors
/// Returns an error if the customer does not exist or the delete fails.
pub async fn delete_customer(db: &DatabaseConnection, customer_id: i64) -> Result<()> {
    let result = Customer::delete_by_id(customer_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::CustomerNotFound { id: customer_id });
    }
    info!(id = customer_id, "Deleted customer");
    Ok(())
}

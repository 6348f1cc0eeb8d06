//! Product business logic - catalog creation, seeding and lookups.
//!
//! Products are created by admins (or seeded from config.toml at start-up) and never
//! updated afterwards. The `coins_assigned` incentive is read when a delivery is
//! confirmed.

use crate::{
    config::settings::ProductConfig,
    entities::{Product, Role, product},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument, warn};

fn validate_product(name: &str, price: f64, serial_number: &str, coins_assigned: i64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("Product name cannot be empty"));
    }
    if serial_number.trim().is_empty() {
        return Err(Error::validation("Product serial number cannot be empty"));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(Error::validation(format!(
            "Product price must be a non-negative number, got {price}"
        )));
    }
    if coins_assigned < 0 {
        return Err(Error::validation(format!(
            "Product coins cannot be negative, got {coins_assigned}"
        )));
    }
    Ok(())
}

async fn insert_product<C>(
    db: &C,
    name: &str,
    price: f64,
    serial_number: &str,
    coins_assigned: i64,
) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    let product = product::ActiveModel {
        name: Set(name.trim().to_string()),
        price: Set(price),
        serial_number: Set(serial_number.trim().to_string()),
        coins_assigned: Set(coins_assigned),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    product.insert(db).await.map_err(Into::into)
}

/// Finds a product by serial number.
pub async fn get_product_by_serial<C>(db: &C, serial_number: &str) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find()
        .filter(product::Column::SerialNumber.eq(serial_number.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a catalog product on behalf of an admin.
///
/// # Errors
/// * `Validation` - empty name or serial, negative or non-finite price, negative coins,
///   or a serial number already in the catalog
/// * `Unauthorized` - the requester is not an admin
#[instrument(skip(db))]
pub async fn create_product(
    db: &DatabaseConnection,
    admin_id: &str,
    name: &str,
    price: f64,
    serial_number: &str,
    coins_assigned: i64,
) -> Result<product::Model> {
    validate_product(name, price, serial_number, coins_assigned)?;

    let admin = crate::core::profile::resolve_requester(db, admin_id).await?;
    if admin.role != Role::Admin {
        return Err(Error::unauthorized(format!(
            "'{admin_id}' is not an admin"
        )));
    }

    if get_product_by_serial(db, serial_number).await?.is_some() {
        return Err(Error::validation(format!(
            "A product with serial number '{}' already exists",
            serial_number.trim()
        )));
    }

    let product = insert_product(db, name, price, serial_number, coins_assigned).await?;
    info!(
        "Created product {} '{}' ({} coins)",
        product.id, product.name, product.coins_assigned
    );
    Ok(product)
}

/// Seeds the catalog from configuration, skipping serial numbers already present.
///
/// Returns the number of products inserted.
#[instrument(skip(db, products))]
pub async fn seed_products(db: &DatabaseConnection, products: &[ProductConfig]) -> Result<usize> {
    let mut inserted = 0;
    for config in products {
        validate_product(
            &config.name,
            config.price,
            &config.serial_number,
            config.coins_assigned,
        )?;

        if get_product_by_serial(db, &config.serial_number).await?.is_some() {
            warn!(
                "Product with serial '{}' already exists. Skipping.",
                config.serial_number
            );
            continue;
        }

        insert_product(
            db,
            &config.name,
            config.price,
            &config.serial_number,
            config.coins_assigned,
        )
        .await?;
        inserted += 1;
    }
    info!("Seeded {} of {} configured products", inserted, products.len());
    Ok(inserted)
}

/// Retrieves a specific product by its unique ID.
pub async fn get_product_by_id<C>(db: &C, product_id: i64) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a product, failing with `NotFound` when absent.
pub async fn require_product<C>(db: &C, product_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    get_product_by_id(db, product_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            entity: "product",
            id: product_id.to_string(),
        })
}

/// Retrieves the whole catalog ordered alphabetically by name.
pub async fn list_products(db: &DatabaseConnection) -> Result<Vec<product::Model>> {
    Product::find()
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

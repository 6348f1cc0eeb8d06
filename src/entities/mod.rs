//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod appointment;
pub mod order;
pub mod product;
pub mod profile;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use appointment::{
    AppointmentStatus, Column as AppointmentColumn, Entity as Appointment,
    Model as AppointmentModel,
};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel, OrderStatus};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use profile::{Column as ProfileColumn, Entity as Profile, Model as ProfileModel, Role};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionKind,
};

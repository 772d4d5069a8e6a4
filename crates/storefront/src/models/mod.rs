//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod order;
pub mod session;
pub mod user;

pub use order::{NewOrder, NewOrderItem, OrderItem, OrderListing, PlacedOrder, ShippingAddress};
pub use session::{CurrentUser, keys};
pub use user::User;

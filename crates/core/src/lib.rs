//! Sdach Core - Shared domain types and the cart model.
//!
//! This crate provides the types used across all Sdach components:
//! - `storefront` - Public-facing shop, cart and checkout
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types, pure functions and traits - no I/O, no
//! database access, no HTTP clients. The cart rules live here so they can be
//! exercised without a session store or a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses
//! - [`cart`] - Cart line items, merge/update rules, and the stored cart codec

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{Cart, CartItem, MAX_LINE_QUANTITY, ProductSnapshot};
pub use types::*;

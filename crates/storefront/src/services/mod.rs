//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Customer registration and password login
//! - `cart` - Cart Store over the session-backed cart entry
//! - `checkout` - Checkout orchestration (order + payment handoff)
//! - `email` - Order confirmation email
//! - `payments` - Payment provider seam and the Stripe client

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod email;
pub mod payments;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartStore, SessionCartStorage};
pub use checkout::{CheckoutError, CheckoutForm, CheckoutService, FieldErrors};
pub use email::{EmailService, OrderMailer};
pub use payments::{PaymentError, StripeClient};

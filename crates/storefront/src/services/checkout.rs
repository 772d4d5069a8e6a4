//! Checkout orchestration: cart to persisted order to payment handoff.
//!
//! One pass, no resumability:
//!
//! 1. the cart must not be empty
//! 2. the shipping/payment form must validate
//! 3. a customer must be logged in
//! 4. cart lines become provider line items (minor units)
//! 5. order, address and items are written in one transaction
//! 6. card payments get a hosted payment session, cash on delivery does not
//! 7. the cart is cleared and the confirmation is sent
//!
//! A payment-provider failure after step 5 leaves the order `pending` and the
//! cart intact so the customer can try again.

use std::collections::BTreeMap;
use std::future::Future;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use sdach_core::{CurrencyCode, Email, PaymentMethod};

use super::cart::{CartError, CartStorage, CartStore, ProductCatalog};
use super::email::EmailError;
use super::payments::{
    CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentGateway, build_line_items,
};
use crate::db::RepositoryError;
use crate::models::order::DEFAULT_SHIPPING_METHOD;
use crate::models::{CurrentUser, NewOrder, NewOrderItem, PlacedOrder, ShippingAddress};

/// Placeholder Stripe substitutes with the real session id on redirect.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Transactional order persistence.
pub trait OrderStore: Send + Sync {
    /// Write an order with its address and items atomically.
    fn create_order(
        &self,
        order: NewOrder,
    ) -> impl Future<Output = Result<PlacedOrder, RepositoryError>> + Send;
}

/// Order confirmation delivery. Failures never fail a checkout.
pub trait OrderNotifier: Send + Sync {
    fn order_placed(
        &self,
        order: &PlacedOrder,
        to: &Email,
    ) -> impl Future<Output = Result<(), EmailError>> + Send;
}

/// Per-field validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(field, msg)| (*field, msg.as_str()))
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().copied().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// Shipping and payment input posted by the checkout form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckoutForm {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub payment_method: String,
}

/// Checkout input after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCheckout {
    pub address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

fn required(errors: &mut FieldErrors, field: &'static str, label: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, format!("The {label} field is required."));
    }
    value.to_string()
}

impl CheckoutForm {
    /// Trim and check every field.
    ///
    /// # Errors
    ///
    /// Returns every failing field with its message.
    pub fn validate(&self) -> Result<ValidCheckout, FieldErrors> {
        let mut errors = FieldErrors::default();

        let address = ShippingAddress {
            first_name: required(&mut errors, "first_name", "first name", &self.first_name),
            last_name: required(&mut errors, "last_name", "last name", &self.last_name),
            phone: required(&mut errors, "phone", "phone", &self.phone),
            street_address: required(
                &mut errors,
                "street_address",
                "street address",
                &self.street_address,
            ),
            city: required(&mut errors, "city", "city", &self.city),
            state: required(&mut errors, "state", "state", &self.state),
            zip_code: required(&mut errors, "zip_code", "zip code", &self.zip_code),
        };

        let method = required(
            &mut errors,
            "payment_method",
            "payment method",
            &self.payment_method,
        );
        let payment_method = match method.parse::<PaymentMethod>() {
            Ok(method) => Some(method),
            Err(_) => {
                errors.add("payment_method", "The selected payment method is invalid.");
                None
            }
        };

        match payment_method {
            Some(payment_method) if errors.is_empty() => Ok(ValidCheckout {
                address,
                payment_method,
            }),
            _ => Err(errors),
        }
    }
}

/// Why a checkout did not complete.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Form input failed validation; nothing was written.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// No logged-in customer; nothing was written.
    #[error("authentication required")]
    AuthRequired,

    /// The cart has no lines; nothing was written.
    #[error("cart is empty")]
    EmptyCart,

    /// The order transaction failed and was rolled back.
    #[error("failed to persist order: {0}")]
    Persistence(#[from] RepositoryError),

    /// The payment provider could not create a session.
    #[error("payment gateway failure: {0}")]
    PaymentGateway(#[from] PaymentError),

    /// The cart could not be cleared after the order was placed.
    #[error("cart error: {0}")]
    Cart(#[from] CartError),
}

/// A completed checkout.
#[derive(Debug)]
pub struct CheckoutOutcome {
    pub order: PlacedOrder,
    /// Hosted payment session, for card payments.
    pub payment_session: Option<CheckoutSession>,
    /// Where to send the customer next.
    pub redirect_url: String,
}

/// Runs a checkout against its collaborators.
pub struct CheckoutService<'a, O, G, N> {
    orders: &'a O,
    gateway: Option<&'a G>,
    notifier: &'a N,
    currency: CurrencyCode,
    base_url: &'a str,
}

impl<'a, O, G, N> CheckoutService<'a, O, G, N>
where
    O: OrderStore,
    G: PaymentGateway,
    N: OrderNotifier,
{
    /// `gateway` is `None` when card payments are not configured.
    pub const fn new(
        orders: &'a O,
        gateway: Option<&'a G>,
        notifier: &'a N,
        currency: CurrencyCode,
        base_url: &'a str,
    ) -> Self {
        Self {
            orders,
            gateway,
            notifier,
            currency,
            base_url,
        }
    }

    fn success_url(&self) -> String {
        format!("{}/checkout/success", self.base_url)
    }

    fn cancel_url(&self) -> String {
        format!("{}/checkout/cancel", self.base_url)
    }

    /// Convert the cart into an order and start payment.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`]. Only `PaymentGateway` and `Cart` can occur after
    /// the order has been written.
    #[tracing::instrument(skip_all, fields(user_id = tracing::field::Empty))]
    pub async fn place_order<S, C>(
        &self,
        cart_store: &CartStore<S, C>,
        user: Option<&CurrentUser>,
        form: &CheckoutForm,
    ) -> Result<CheckoutOutcome, CheckoutError>
    where
        S: CartStorage,
        C: ProductCatalog,
    {
        let cart = cart_store.read().await;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let checkout = form.validate().map_err(CheckoutError::Validation)?;

        let user = user.ok_or(CheckoutError::AuthRequired)?;
        tracing::Span::current().record("user_id", user.id.as_i32());

        let line_items = build_line_items(cart.items(), self.currency)?;

        let items: Vec<NewOrderItem> = cart.items().iter().map(NewOrderItem::from).collect();
        let order = self
            .orders
            .create_order(NewOrder {
                user_id: user.id,
                grand_total: cart.grand_total(),
                currency: self.currency,
                payment_method: checkout.payment_method,
                shipping_amount: Decimal::ZERO,
                shipping_method: DEFAULT_SHIPPING_METHOD.to_string(),
                notes: format!("Order placed by {}", user.name),
                address: checkout.address,
                items,
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            grand_total = %order.grand_total,
            payment_method = %order.payment_method,
            "Order created"
        );

        let (payment_session, redirect_url) = if checkout.payment_method.uses_gateway() {
            let request = CheckoutSessionRequest {
                customer_email: user.email.clone(),
                line_items,
                success_url: format!("{}?session_id={SESSION_ID_PLACEHOLDER}", self.success_url()),
                cancel_url: self.cancel_url(),
                idempotency_key: CheckoutSessionRequest::idempotency_key_for(order.id),
            };

            let session = match self.gateway {
                Some(gateway) => gateway.create_checkout_session(&request).await,
                None => Err(PaymentError::NotConfigured),
            }
            .inspect_err(|e| {
                tracing::error!(order_id = %order.id, error = %e, "Payment session failed");
            })?;

            let url = session.url.clone();
            (Some(session), url)
        } else {
            (None, self.success_url())
        };

        cart_store.clear().await?;

        if let Err(e) = self.notifier.order_placed(&order, &user.email).await {
            tracing::warn!(order_id = %order.id, error = %e, "Order notification failed");
        }

        Ok(CheckoutOutcome {
            order,
            payment_session,
            redirect_url,
        })
    }
}

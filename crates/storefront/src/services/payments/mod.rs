//! Payment provider seam.
//!
//! Checkout hands the customer to a provider-hosted payment page. The
//! provider is reached through [`PaymentGateway`]; [`stripe::StripeClient`]
//! is the production implementation.

pub mod stripe;

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use sdach_core::{CartItem, CurrencyCode, Email, OrderId, ProductId, to_minor_units};

pub use stripe::StripeClient;

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A line amount does not fit the provider's integer minor units.
    #[error("amount out of range for product {0}")]
    AmountOutOfRange(ProductId),

    /// Card payments were requested but no provider is configured.
    #[error("payment provider is not configured")]
    NotConfigured,
}

/// Name shown on the provider's payment page for a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductData {
    pub name: String,
}

/// Price of one unit in the provider's minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceData {
    pub currency: CurrencyCode,
    pub unit_amount: i64,
    pub product_data: ProductData,
}

/// One provider line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub price_data: PriceData,
    pub quantity: u32,
}

/// Build provider line items from cart lines.
///
/// Unit amounts are converted to minor units (`amount × 100`).
///
/// # Errors
///
/// Returns `PaymentError::AmountOutOfRange` if a unit amount overflows.
pub fn build_line_items(
    items: &[CartItem],
    currency: CurrencyCode,
) -> Result<Vec<LineItem>, PaymentError> {
    items
        .iter()
        .map(|item| {
            let unit_amount = to_minor_units(item.unit_amount)
                .ok_or(PaymentError::AmountOutOfRange(item.product_id))?;
            Ok(LineItem {
                price_data: PriceData {
                    currency,
                    unit_amount,
                    product_data: ProductData {
                        name: item.name.clone(),
                    },
                },
                quantity: item.quantity,
            })
        })
        .collect()
}

/// Request for a hosted, card-only, one-off payment session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub customer_email: Email,
    pub line_items: Vec<LineItem>,
    pub success_url: String,
    pub cancel_url: String,
    /// Sent as `Idempotency-Key`; repeated requests for one order reuse it.
    pub idempotency_key: String,
}

impl CheckoutSessionRequest {
    /// Idempotency key for the payment session of an order.
    #[must_use]
    pub fn idempotency_key_for(order_id: OrderId) -> String {
        format!("sdach-order-{order_id}-checkout")
    }

    /// Encode as bracketed form parameters (`line_items[0][quantity]=2`).
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("mode".to_string(), "payment".to_string()),
            (
                "customer_email".to_string(),
                self.customer_email.to_string(),
            ),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            params.push((
                format!("{prefix}[price_data][currency]"),
                item.price_data.currency.as_lowercase().to_string(),
            ));
            params.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.price_data.unit_amount.to_string(),
            ));
            params.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.price_data.product_data.name.clone(),
            ));
            params.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        }

        params
    }
}

/// A created payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page to redirect the customer to.
    pub url: String,
}

/// External payment provider.
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted payment session.
    fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> impl Future<Output = Result<CheckoutSession, PaymentError>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn line(id: i32, name: &str, qty: u32, unit: Decimal) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            name: name.to_string(),
            image: None,
            quantity: qty,
            unit_amount: unit,
            total_amount: unit * Decimal::from(qty),
        }
    }

    #[test]
    fn test_line_items_use_minor_units() {
        let items = vec![
            line(1, "Kampot Pepper", 2, Decimal::new(1000, 0)),
            line(2, "Palm Sugar", 1, Decimal::new(5000, 0)),
        ];

        let line_items = build_line_items(&items, CurrencyCode::KHR).unwrap();
        assert_eq!(line_items.len(), 2);
        assert_eq!(line_items[0].price_data.unit_amount, 100_000);
        assert_eq!(line_items[0].quantity, 2);
        assert_eq!(line_items[0].price_data.currency, CurrencyCode::KHR);
        assert_eq!(line_items[1].price_data.unit_amount, 500_000);
        assert_eq!(line_items[1].price_data.product_data.name, "Palm Sugar");
    }

    #[test]
    fn test_line_items_reject_overflow() {
        let items = vec![line(7, "Gold", 1, Decimal::MAX)];
        assert!(matches!(
            build_line_items(&items, CurrencyCode::USD),
            Err(PaymentError::AmountOutOfRange(id)) if id == ProductId::new(7)
        ));
    }

    #[test]
    fn test_form_encoding_uses_bracketed_keys() {
        let request = CheckoutSessionRequest {
            customer_email: Email::parse("dara@example.kh").unwrap(),
            line_items: build_line_items(
                &[line(1, "នំបញ្ចុក", 3, Decimal::new(1250, 2))],
                CurrencyCode::USD,
            )
            .unwrap(),
            success_url: "http://shop/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "http://shop/checkout/cancel".to_string(),
            idempotency_key: CheckoutSessionRequest::idempotency_key_for(OrderId::new(42)),
        };

        let form = request.to_form();
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("payment_method_types[0]"), Some("card"));
        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("customer_email"), Some("dara@example.kh"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1250"));
        assert_eq!(
            get("line_items[0][price_data][product_data][name]"),
            Some("នំបញ្ចុក")
        );
        assert_eq!(get("line_items[0][quantity]"), Some("3"));
        assert!(get("success_url").unwrap().ends_with("{CHECKOUT_SESSION_ID}"));
        assert_eq!(request.idempotency_key, "sdach-order-42-checkout");
    }
}

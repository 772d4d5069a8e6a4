//! Order domain types.
//!
//! An order is written once, at checkout, together with its shipping address
//! and one item per cart line. Item prices are snapshots and never change
//! afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use sdach_core::{
    CartItem, CurrencyCode, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus,
    ProductId, UserId,
};

/// Shipping method recorded on orders placed through the storefront.
pub const DEFAULT_SHIPPING_METHOD: &str = "none";

/// Shipping address attached to exactly one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl ShippingAddress {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One order line to be written, snapshotted from a cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_amount: Decimal,
    pub total_amount: Decimal,
}

impl From<&CartItem> for NewOrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.name.clone(),
            quantity: item.quantity,
            unit_amount: item.unit_amount,
            total_amount: item.total_amount,
        }
    }
}

/// Everything needed to persist an order in one transaction.
///
/// Payment and fulfilment status are not part of the input: new orders are
/// always `pending` / `new`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub grand_total: Decimal,
    pub currency: CurrencyCode,
    pub payment_method: PaymentMethod,
    pub shipping_amount: Decimal,
    pub shipping_method: String,
    pub notes: String,
    pub address: ShippingAddress,
    pub items: Vec<NewOrderItem>,
}

/// A persisted order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_amount: Decimal,
    pub total_amount: Decimal,
}

/// A persisted order with its address and items.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub grand_total: Decimal,
    pub currency: CurrencyCode,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub shipping_amount: Decimal,
    pub shipping_method: String,
    pub notes: String,
    pub address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

/// Order row shown in a customer's order history.
#[derive(Debug, Clone)]
pub struct OrderListing {
    pub id: OrderId,
    pub grand_total: Decimal,
    pub currency: CurrencyCode,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl PlacedOrder {
    /// Total number of units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

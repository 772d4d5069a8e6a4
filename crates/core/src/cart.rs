//! Cart model: line items, merge/update rules, and the stored cart codec.
//!
//! A cart is an ordered list of [`CartItem`]s keyed by product id. It is
//! anonymous and lives entirely in client-scoped storage; every mutation
//! rewrites the whole list. Reading is lenient: anything that does not decode
//! to a well-formed list is an empty cart.
//!
//! The rules here are pure. Looking up products and reading/writing the stored
//! value is the storefront's job.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ProductId;

/// Product data captured into the cart when an item is first added.
///
/// Later price changes do not affect lines already in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    /// First product image, if any.
    pub image: Option<String>,
}

/// One product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_amount: Decimal,
    pub total_amount: Decimal,
}

impl CartItem {
    fn apply_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.total_amount = line_total(quantity, self.unit_amount);
    }
}

/// Largest quantity a single cart line may carry.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Total for a line: `quantity × unit_amount`.
///
/// This is also the recomputation any form calls when quantity or unit price
/// changes. Saturates at `Decimal::MAX` instead of panicking.
#[must_use]
pub fn line_total(quantity: u32, unit_amount: Decimal) -> Decimal {
    unit_amount.saturating_mul(Decimal::from(quantity))
}

/// Sum of `total_amount` over `items`.
#[must_use]
pub fn grand_total(items: &[CartItem]) -> Decimal {
    items.iter().map(|item| item.total_amount).sum()
}

/// Clamp a caller-supplied quantity to `1..=MAX_LINE_QUANTITY`.
fn clamp_quantity(qty: i64) -> u32 {
    u32::try_from(qty.clamp(1, i64::from(MAX_LINE_QUANTITY))).unwrap_or(MAX_LINE_QUANTITY)
}

/// Why a stored cart payload was rejected.
#[derive(Debug, Error)]
pub enum CartDecodeError {
    /// Not JSON, or not an array of cart items.
    #[error("invalid cart payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Two lines for the same product.
    #[error("duplicate cart line for product {0}")]
    DuplicateProduct(ProductId),

    /// A line with quantity 0.
    #[error("cart line for product {0} has zero quantity")]
    ZeroQuantity(ProductId),

    /// A line above [`MAX_LINE_QUANTITY`].
    #[error("cart line for product {0} exceeds the quantity limit")]
    QuantityTooLarge(ProductId),

    /// A line with a negative unit price.
    #[error("cart line for product {0} has a negative unit amount")]
    NegativeAmount(ProductId),
}

/// An anonymous shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from already-decoded items, enforcing the cart invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CartDecodeError`] on duplicate products, zero or oversized
    /// quantities, or negative unit amounts.
    pub fn from_items(items: Vec<CartItem>) -> Result<Self, CartDecodeError> {
        for (idx, item) in items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(CartDecodeError::ZeroQuantity(item.product_id));
            }
            if item.quantity > MAX_LINE_QUANTITY {
                return Err(CartDecodeError::QuantityTooLarge(item.product_id));
            }
            if item.unit_amount < Decimal::ZERO {
                return Err(CartDecodeError::NegativeAmount(item.product_id));
            }
            if items
                .iter()
                .skip(idx + 1)
                .any(|other| other.product_id == item.product_id)
            {
                return Err(CartDecodeError::DuplicateProduct(item.product_id));
            }
        }
        Ok(Self { items })
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.get(product_id).is_some()
    }

    #[must_use]
    pub fn grand_total(&self) -> Decimal {
        grand_total(&self.items)
    }

    fn get_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
    }

    /// Append a new line with quantity 1.
    ///
    /// Returns `false` (and changes nothing) if the product is already in the
    /// cart.
    pub fn insert(&mut self, product: &ProductSnapshot) -> bool {
        if self.contains(product.id) {
            return false;
        }
        self.items.push(CartItem {
            product_id: product.id,
            name: product.name.clone(),
            image: product.image.clone(),
            quantity: 1,
            unit_amount: product.price,
            total_amount: product.price,
        });
        true
    }

    /// Append a new line with a caller-chosen quantity.
    ///
    /// `qty` is first capped at [`MAX_LINE_QUANTITY`]. The stored quantity is
    /// `max(1, qty)`, but `total_amount` is `price × qty` using the capped
    /// `qty`. For `qty >= 1` the two agree; for `qty <= 0` the line carries
    /// quantity 1 with a total of `price × qty`. The product page's quantity
    /// picker never posts less than 1.
    ///
    /// Returns `false` (and changes nothing) if the product is already in the
    /// cart or the total does not fit in a `Decimal`.
    pub fn insert_with_quantity(&mut self, product: &ProductSnapshot, qty: i64) -> bool {
        if self.contains(product.id) {
            return false;
        }
        let qty = qty.min(i64::from(MAX_LINE_QUANTITY));
        let Some(total_amount) = product.price.checked_mul(Decimal::from(qty)) else {
            return false;
        };
        self.items.push(CartItem {
            product_id: product.id,
            name: product.name.clone(),
            image: product.image.clone(),
            quantity: clamp_quantity(qty),
            unit_amount: product.price,
            total_amount,
        });
        true
    }

    /// Add one to a line's quantity, never above [`MAX_LINE_QUANTITY`].
    ///
    /// Returns `true` only if the quantity changed.
    pub fn increment(&mut self, product_id: ProductId) -> bool {
        let Some(item) = self.get_mut(product_id) else {
            return false;
        };
        if item.quantity >= MAX_LINE_QUANTITY {
            return false;
        }
        let quantity = item.quantity + 1;
        item.apply_quantity(quantity);
        true
    }

    /// Subtract one from a line's quantity, never going below 1.
    ///
    /// Returns `true` only if the quantity changed.
    pub fn decrement(&mut self, product_id: ProductId) -> bool {
        let Some(item) = self.get_mut(product_id) else {
            return false;
        };
        if item.quantity <= 1 {
            return false;
        }
        let quantity = item.quantity - 1;
        item.apply_quantity(quantity);
        true
    }

    /// Overwrite a line's quantity with `qty` clamped to
    /// `1..=MAX_LINE_QUANTITY` and recompute its total.
    ///
    /// Returns `false` if the product is absent.
    pub fn set_quantity(&mut self, product_id: ProductId, qty: i64) -> bool {
        let Some(item) = self.get_mut(product_id) else {
            return false;
        };
        item.apply_quantity(clamp_quantity(qty));
        true
    }

    /// Drop a line. Returns `false` if the product is absent.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        self.items.len() != before
    }

    /// Serialize the whole cart as a JSON array.
    ///
    /// Non-ASCII product names are written as-is, not `\u` escaped.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.items)
    }

    /// Strictly decode a stored payload.
    ///
    /// # Errors
    ///
    /// Returns [`CartDecodeError`] if the payload is not a well-formed cart.
    pub fn try_decode(payload: &str) -> Result<Self, CartDecodeError> {
        let items: Vec<CartItem> = serde_json::from_str(payload)?;
        Self::from_items(items)
    }

    /// Leniently decode a stored payload: anything malformed is an empty cart.
    #[must_use]
    pub fn decode(payload: &str) -> Self {
        Self::try_decode(payload).unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn product(id: i32, price: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Decimal::new(price, 0),
            image: Some(format!("products/{id}.jpg")),
        }
    }

    fn assert_line_totals_consistent(cart: &Cart) {
        for item in cart.items() {
            assert_eq!(
                item.total_amount,
                line_total(item.quantity, item.unit_amount),
                "line for {} is inconsistent",
                item.product_id
            );
        }
    }

    #[test]
    fn test_insert_snapshots_product() {
        let mut cart = Cart::new();
        assert!(cart.insert(&product(1, 1000)));

        let item = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(item.name, "Product 1");
        assert_eq!(item.image.as_deref(), Some("products/1.jpg"));
        assert_eq!(item.quantity, 1);
        assert_eq!(item.unit_amount, Decimal::new(1000, 0));
        assert_eq!(item.total_amount, Decimal::new(1000, 0));
    }

    #[test]
    fn test_insert_existing_product_is_rejected() {
        let mut cart = Cart::new();
        cart.insert(&product(1, 1000));
        assert!(!cart.insert(&product(1, 999)));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].unit_amount, Decimal::new(1000, 0));
    }

    #[test]
    fn test_increment_recomputes_total() {
        let mut cart = Cart::new();
        cart.insert(&product(1, 250));
        assert!(cart.increment(ProductId::new(1)));
        assert!(cart.increment(ProductId::new(1)));

        let item = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(item.total_amount, Decimal::new(750, 0));
    }

    #[test]
    fn test_decrement_floors_at_one() {
        let mut cart = Cart::new();
        cart.insert(&product(1, 1000));

        assert!(!cart.decrement(ProductId::new(1)));
        let item = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.total_amount, Decimal::new(1000, 0));

        cart.increment(ProductId::new(1));
        assert!(cart.decrement(ProductId::new(1)));
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 1);
    }

    #[test]
    fn test_unknown_product_mutations_are_noops() {
        let mut cart = Cart::new();
        cart.insert(&product(1, 1000));
        let before = cart.clone();

        assert!(!cart.increment(ProductId::new(9)));
        assert!(!cart.decrement(ProductId::new(9)));
        assert!(!cart.set_quantity(ProductId::new(9), 4));
        assert!(!cart.remove(ProductId::new(9)));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_set_quantity_overwrites_and_floors() {
        let mut cart = Cart::new();
        cart.insert(&product(1, 300));
        cart.increment(ProductId::new(1));

        assert!(cart.set_quantity(ProductId::new(1), 5));
        let item = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(item.quantity, 5);
        assert_eq!(item.total_amount, Decimal::new(1500, 0));

        assert!(cart.set_quantity(ProductId::new(1), -3));
        let item = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.total_amount, Decimal::new(300, 0));
    }

    #[test]
    fn test_insert_with_quantity_uses_raw_qty_for_total() {
        let mut cart = Cart::new();
        cart.insert_with_quantity(&product(1, 1000), 3);
        let item = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(item.unit_amount, Decimal::new(1000, 0));
        assert_eq!(item.total_amount, Decimal::new(3000, 0));

        // Quantity is floored to 1 but the total keeps the raw multiplier.
        cart.insert_with_quantity(&product(2, 500), 0);
        let item = cart.get(ProductId::new(2)).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.unit_amount, Decimal::new(500, 0));
        assert_eq!(item.total_amount, Decimal::ZERO);
    }

    #[test]
    fn test_insert_with_quantity_caps_large_quantities() {
        let mut cart = Cart::new();
        assert!(cart.insert_with_quantity(&product(1, 1000), 5_000_000_000));
        let item = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(item.quantity, MAX_LINE_QUANTITY);
        assert_eq!(item.total_amount, line_total(item.quantity, item.unit_amount));

        let pricey = ProductSnapshot {
            price: Decimal::MAX,
            ..product(2, 0)
        };
        assert!(!cart.insert_with_quantity(&pricey, i64::MAX));
        assert!(!cart.contains(ProductId::new(2)));
    }

    #[test]
    fn test_quantity_never_exceeds_limit() {
        let mut cart = Cart::new();
        cart.insert(&product(1, 10));

        assert!(cart.set_quantity(ProductId::new(1), i64::MAX));
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, MAX_LINE_QUANTITY);

        assert!(!cart.increment(ProductId::new(1)));
        let item = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(item.quantity, MAX_LINE_QUANTITY);
        assert_eq!(item.total_amount, Decimal::new(990, 0));
    }

    #[test]
    fn test_line_total_saturates() {
        assert_eq!(line_total(2, Decimal::MAX), Decimal::MAX);
    }

    #[test]
    fn test_remove_keeps_order_of_remaining_lines() {
        let mut cart = Cart::new();
        cart.insert(&product(1, 1));
        cart.insert(&product(2, 2));
        cart.insert(&product(3, 3));

        assert!(cart.remove(ProductId::new(2)));
        let ids: Vec<i32> = cart.items().iter().map(|i| i.product_id.as_i32()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_grand_total_sums_line_totals() {
        let mut cart = Cart::new();
        cart.insert(&product(1, 1000));
        cart.increment(ProductId::new(1));
        cart.insert(&product(2, 5000));

        assert_eq!(cart.grand_total(), Decimal::new(7000, 0));
        assert_eq!(grand_total(cart.items()), Decimal::new(7000, 0));
        assert_eq!(grand_total(&[]), Decimal::ZERO);
        assert_eq!(cart.total_quantity(), 3);
    }

    #[test]
    fn test_operation_sequence_keeps_products_unique_and_totals_consistent() {
        let mut cart = Cart::new();
        // Deterministic pseudo-random walk over the mutating operations.
        let mut seed: u32 = 17;
        for _ in 0..500 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let id = i32::try_from((seed >> 8) % 5).unwrap() + 1;
            let pid = ProductId::new(id);
            match (seed >> 16) % 5 {
                0 => {
                    if !cart.increment(pid) {
                        cart.insert(&product(id, i64::from(id) * 100));
                    }
                }
                1 => {
                    cart.increment(pid);
                }
                2 => {
                    cart.decrement(pid);
                }
                3 => {
                    cart.remove(pid);
                }
                _ => {
                    cart.set_quantity(pid, i64::from(seed % 7) - 2);
                }
            }

            let mut ids: Vec<ProductId> = cart.items().iter().map(|i| i.product_id).collect();
            let len = ids.len();
            ids.sort_by_key(ProductId::as_i32);
            ids.dedup();
            assert_eq!(ids.len(), len, "duplicate product ids in cart");
            assert!(cart.items().iter().all(|i| i.quantity >= 1));
            assert_line_totals_consistent(&cart);
            assert_eq!(cart.grand_total(), grand_total(cart.items()));
        }
    }

    #[test]
    fn test_encode_preserves_unicode() {
        let mut cart = Cart::new();
        cart.insert(&ProductSnapshot {
            id: ProductId::new(1),
            name: "នំបញ្ចុក".to_string(),
            price: Decimal::new(1000, 0),
            image: None,
        });

        let json = cart.encode().unwrap();
        assert!(json.contains("នំបញ្ចុក"));
        assert_eq!(Cart::decode(&json), cart);
    }

    #[test]
    fn test_decode_accepts_stored_shape() {
        let json = r#"[{"product_id":1,"name":"Tea","image":null,"quantity":2,
                       "unit_amount":"1000","total_amount":"2000"}]"#;
        let cart = Cart::try_decode(json).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.grand_total(), Decimal::new(2000, 0));
    }

    #[test]
    fn test_decode_malformed_payloads_as_empty() {
        assert!(Cart::decode("").is_empty());
        assert!(Cart::decode("not json").is_empty());
        assert!(Cart::decode("{\"product_id\":1}").is_empty());
        assert!(Cart::decode("42").is_empty());
        assert!(Cart::decode("[{\"product_id\":\"x\"}]").is_empty());
    }

    #[test]
    fn test_decode_rejects_broken_invariants() {
        let line = |id: i32, qty: u32, unit: &str| {
            format!(
                r#"{{"product_id":{id},"name":"P","image":null,"quantity":{qty},"unit_amount":"{unit}","total_amount":"0"}}"#
            )
        };

        let dup = format!("[{},{}]", line(1, 1, "10"), line(1, 2, "10"));
        assert!(matches!(
            Cart::try_decode(&dup),
            Err(CartDecodeError::DuplicateProduct(_))
        ));

        let zero = format!("[{}]", line(1, 0, "10"));
        assert!(matches!(
            Cart::try_decode(&zero),
            Err(CartDecodeError::ZeroQuantity(_))
        ));

        let oversized = format!("[{}]", line(1, MAX_LINE_QUANTITY + 1, "10"));
        assert!(matches!(
            Cart::try_decode(&oversized),
            Err(CartDecodeError::QuantityTooLarge(_))
        ));

        let negative = format!("[{}]", line(1, 1, "-10"));
        assert!(matches!(
            Cart::try_decode(&negative),
            Err(CartDecodeError::NegativeAmount(_))
        ));
        assert!(Cart::decode(&negative).is_empty());
    }
}

//! Order repository.
//!
//! Orders are written exactly once, together with their address and items,
//! inside a single transaction. A failure anywhere rolls the whole order back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use sdach_core::{
    CurrencyCode, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    UserId,
};

use super::RepositoryError;
use crate::models::{NewOrder, OrderItem, OrderListing, PlacedOrder, ShippingAddress};
use crate::services::checkout::OrderStore;

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    grand_total: Decimal,
    currency: String,
    payment_method: String,
    payment_status: PaymentStatus,
    status: OrderStatus,
    shipping_amount: Decimal,
    shipping_method: String,
    notes: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    first_name: String,
    last_name: String,
    phone: String,
    street_address: String,
    city: String,
    state: String,
    zip_code: String,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    product_id: i32,
    product_name: String,
    quantity: i32,
    unit_amount: Decimal,
    total_amount: Decimal,
}

impl From<AddressRow> for ShippingAddress {
    fn from(row: AddressRow) -> Self {
        Self {
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            street_address: row.street_address,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
        }
    }
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative quantity on order item {}",
                row.id
            ))
        })?;

        Ok(Self {
            id: OrderItemId::new(row.id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            quantity,
            unit_amount: row.unit_amount,
            total_amount: row.total_amount,
        })
    }
}

fn parse_currency(raw: &str) -> Result<CurrencyCode, RepositoryError> {
    raw.parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid currency in database: {e}")))
}

fn parse_payment_method(raw: &str) -> Result<PaymentMethod, RepositoryError> {
    raw.parse().map_err(|e: String| {
        RepositoryError::DataCorruption(format!("invalid payment method in database: {e}"))
    })
}

fn quantity_to_db(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::Conflict(format!("quantity {quantity} out of range")))
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist an order, its address and its items in one transaction.
    ///
    /// The order is created with `payment_status = pending` and `status = new`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails; nothing is
    /// committed in that case.
    pub async fn create(&self, order: NewOrder) -> Result<PlacedOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (order_id, created_at): (i32, DateTime<Utc>) = sqlx::query_as(
            r"
            INSERT INTO orders (
                user_id, grand_total, payment_method, payment_status, status,
                currency, shipping_amount, shipping_method, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, created_at
            ",
        )
        .bind(order.user_id.as_i32())
        .bind(order.grand_total)
        .bind(order.payment_method.code())
        .bind(PaymentStatus::Pending)
        .bind(OrderStatus::New)
        .bind(order.currency.as_str())
        .bind(order.shipping_amount)
        .bind(&order.shipping_method)
        .bind(&order.notes)
        .fetch_one(&mut *tx)
        .await?;

        let address = &order.address;
        sqlx::query(
            r"
            INSERT INTO addresses (
                order_id, first_name, last_name, phone, street_address, city, state, zip_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(order_id)
        .bind(&address.first_name)
        .bind(&address.last_name)
        .bind(&address.phone)
        .bind(&address.street_address)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip_code)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let (item_id,): (i32,) = sqlx::query_as(
                r"
                INSERT INTO order_items (
                    order_id, product_id, product_name, quantity, unit_amount, total_amount
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                ",
            )
            .bind(order_id)
            .bind(item.product_id.as_i32())
            .bind(&item.product_name)
            .bind(quantity_to_db(item.quantity)?)
            .bind(item.unit_amount)
            .bind(item.total_amount)
            .fetch_one(&mut *tx)
            .await?;

            items.push(OrderItem {
                id: OrderItemId::new(item_id),
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_amount: item.unit_amount,
                total_amount: item.total_amount,
            });
        }

        tx.commit().await?;

        Ok(PlacedOrder {
            id: OrderId::new(order_id),
            user_id: order.user_id,
            grand_total: order.grand_total,
            currency: order.currency,
            payment_method: order.payment_method,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::New,
            shipping_amount: order.shipping_amount,
            shipping_method: order.shipping_method,
            notes: order.notes,
            address: order.address,
            items,
            created_at,
        })
    }

    /// Get one of a user's orders with its address and items.
    ///
    /// Orders belonging to other users are reported as missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if stored values are invalid
    /// or the order has no address.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<PlacedOrder>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, grand_total, currency, payment_method, payment_status,
                   status, shipping_amount, shipping_method, notes, created_at
            FROM orders
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id.as_i32())
        .bind(user_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let address = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT first_name, last_name, phone, street_address, city, state, zip_code
            FROM addresses
            WHERE order_id = $1
            ",
        )
        .bind(row.id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!("order {} has no address", row.id))
        })?;

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, product_id, product_name, quantity, unit_amount, total_amount
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(row.id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(OrderItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(PlacedOrder {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            grand_total: row.grand_total,
            currency: parse_currency(&row.currency)?,
            payment_method: parse_payment_method(&row.payment_method)?,
            payment_status: row.payment_status,
            status: row.status,
            shipping_amount: row.shipping_amount,
            shipping_method: row.shipping_method,
            notes: row.notes,
            address: address.into(),
            items,
            created_at: row.created_at,
        }))
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderListing>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, grand_total, currency, payment_method, payment_status,
                   status, shipping_amount, shipping_method, notes, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderListing {
                    id: OrderId::new(row.id),
                    grand_total: row.grand_total,
                    currency: parse_currency(&row.currency)?,
                    payment_method: parse_payment_method(&row.payment_method)?,
                    payment_status: row.payment_status,
                    status: row.status,
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}

impl OrderStore for OrderRepository<'_> {
    async fn create_order(&self, order: NewOrder) -> Result<PlacedOrder, RepositoryError> {
        self.create(order).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_codes_round_trip() {
        assert_eq!(parse_currency("KHR").ok(), Some(CurrencyCode::KHR));
        assert_eq!(
            parse_payment_method("cod").ok(),
            Some(PaymentMethod::CashOnDelivery)
        );
        assert!(matches!(
            parse_payment_method("bitcoin"),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_negative_item_quantity_is_corruption() {
        let row = OrderItemRow {
            id: 1,
            product_id: 1,
            product_name: "Tea".to_string(),
            quantity: -1,
            unit_amount: Decimal::ONE,
            total_amount: Decimal::ONE,
        };
        assert!(matches!(
            OrderItem::try_from(row),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_quantity_to_db_bounds() {
        assert_eq!(quantity_to_db(3).ok(), Some(3));
        assert!(quantity_to_db(u32::MAX).is_err());
    }
}

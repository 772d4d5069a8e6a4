//! Integration tests for order persistence.
//!
//! These tests require a migrated `PostgreSQL` database (`sdach-cli migrate`).
//! They talk to the database directly; the storefront does not need to run.
//!
//! Run with: cargo test -p sdach-integration-tests -- --ignored

use rust_decimal::Decimal;
use sdach_core::{CurrencyCode, PaymentMethod, ProductId, UserId};
use sdach_integration_tests::{create_product, create_user, pool};
use sdach_storefront::db::{OrderRepository, RepositoryError};
use sdach_storefront::models::order::DEFAULT_SHIPPING_METHOD;
use sdach_storefront::models::{NewOrder, NewOrderItem, ShippingAddress};
use sqlx::PgPool;
use uuid::Uuid;

fn new_order(user_id: i32, street: &str, items: Vec<NewOrderItem>) -> NewOrder {
    NewOrder {
        user_id: UserId::new(user_id),
        grand_total: items.iter().map(|item| item.total_amount).sum(),
        currency: CurrencyCode::KHR,
        payment_method: PaymentMethod::CashOnDelivery,
        shipping_amount: Decimal::ZERO,
        shipping_method: DEFAULT_SHIPPING_METHOD.to_string(),
        notes: "Order placed by Dara Sok".to_string(),
        address: ShippingAddress {
            first_name: "Dara".to_string(),
            last_name: "Sok".to_string(),
            phone: "012345678".to_string(),
            street_address: street.to_string(),
            city: "Phnom Penh".to_string(),
            state: "Phnom Penh".to_string(),
            zip_code: "12000".to_string(),
        },
        items,
    }
}

fn item(product_id: i32, quantity: u32, unit: i64) -> NewOrderItem {
    NewOrderItem {
        product_id: ProductId::new(product_id),
        product_name: format!("Product {product_id}"),
        quantity,
        unit_amount: Decimal::new(unit, 0),
        total_amount: Decimal::new(unit * i64::from(quantity), 0),
    }
}

async fn order_rows(pool: &PgPool, user_id: i32) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count orders");
    count
}

async fn address_rows(pool: &PgPool, street: &str) -> i64 {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM addresses WHERE street_address = $1")
            .bind(street)
            .fetch_one(pool)
            .await
            .expect("Failed to count addresses");
    count
}

async fn missing_product_id(pool: &PgPool) -> i32 {
    let (id,): (i32,) = sqlx::query_as("SELECT COALESCE(MAX(id), 0) + 1000 FROM products")
        .fetch_one(pool)
        .await
        .expect("Failed to pick a missing product id");
    id
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_create_writes_order_address_and_items() {
    let pool = pool().await;
    let user_id = create_user(&pool, "Dara Sok").await;
    let product_id = create_product(&pool, "Kampot Pepper", Decimal::new(1000, 0)).await;
    let street = format!("street-{}", Uuid::new_v4());

    let placed = OrderRepository::new(&pool)
        .create(new_order(user_id, &street, vec![item(product_id, 2, 1000)]))
        .await
        .expect("Failed to create order");

    assert_eq!(placed.grand_total, Decimal::new(2000, 0));
    assert_eq!(placed.items.len(), 1);
    assert_eq!(order_rows(&pool, user_id).await, 1);
    assert_eq!(address_rows(&pool, &street).await, 1);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_failed_item_insert_leaves_no_order_or_address() {
    let pool = pool().await;
    let user_id = create_user(&pool, "Dara Sok").await;
    let product_id = create_product(&pool, "Palm Sugar", Decimal::new(5000, 0)).await;
    let missing = missing_product_id(&pool).await;
    let street = format!("street-{}", Uuid::new_v4());

    // The second item violates the product foreign key after the order,
    // address and first item have been inserted.
    let order = new_order(
        user_id,
        &street,
        vec![item(product_id, 1, 5000), item(missing, 1, 1000)],
    );
    let result = OrderRepository::new(&pool).create(order).await;

    assert!(
        matches!(result, Err(RepositoryError::Database(_))),
        "expected a database error, got {result:?}"
    );
    assert_eq!(order_rows(&pool, user_id).await, 0);
    assert_eq!(address_rows(&pool, &street).await, 0);

    let (items,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM order_items WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_one(&pool)
    .await
    .expect("Failed to count order items");
    assert_eq!(items, 0);
}

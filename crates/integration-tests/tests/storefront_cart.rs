//! Integration tests for the session cart.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`sdach-cli migrate`)
//! - The storefront running (cargo run -p sdach-storefront)
//!
//! Run with: cargo test -p sdach-integration-tests -- --ignored

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use sdach_integration_tests::{client, create_product, pool, storefront_base_url};

async fn post_form(client: &Client, path: &str, form: &[(&str, String)]) -> reqwest::Response {
    client
        .post(format!("{}{path}", storefront_base_url()))
        .form(form)
        .send()
        .await
        .expect("Request failed")
}

async fn cart_count(client: &Client) -> String {
    client
        .get(format!("{}/cart/count", storefront_base_url()))
        .send()
        .await
        .expect("Failed to get cart count")
        .text()
        .await
        .expect("Failed to read response")
        .trim()
        .to_string()
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_health_endpoints() {
    let client = client();
    let base_url = storefront_base_url();

    let resp = client.get(format!("{base_url}/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_add_same_product_twice_keeps_one_line() {
    let pool = pool().await;
    let product_id = create_product(&pool, "Kampot Pepper", Decimal::new(1000, 0)).await;
    let client = client();

    let resp = post_form(&client, "/cart/add", &[("product_id", product_id.to_string())]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("hx-trigger").and_then(|v| v.to_str().ok()),
        Some("cart-updated")
    );
    assert_eq!(resp.text().await.unwrap().trim(), "1");

    let resp = post_form(&client, "/cart/add", &[("product_id", product_id.to_string())]).await;
    assert_eq!(resp.text().await.unwrap().trim(), "1");

    let page = client
        .get(format!("{}/cart", storefront_base_url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Kampot Pepper"));
    assert!(page.contains("2000.00"));
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_unknown_product_is_ignored() {
    let client = client();

    let resp = post_form(&client, "/cart/add", &[("product_id", i32::MAX.to_string())]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap().trim(), "0");
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_add_with_quantity_sets_quantity() {
    let pool = pool().await;
    let product_id = create_product(&pool, "Palm Sugar", Decimal::new(5000, 0)).await;
    let client = client();

    let form = [
        ("product_id", product_id.to_string()),
        ("quantity", "3".to_string()),
    ];
    post_form(&client, "/cart/add", &form).await;
    let form = [
        ("product_id", product_id.to_string()),
        ("quantity", "2".to_string()),
    ];
    post_form(&client, "/cart/add", &form).await;

    let page = client
        .get(format!("{}/cart", storefront_base_url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("10000.00"));
    assert!(!page.contains("15000.00"));
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_out_of_range_quantity_is_rejected() {
    let pool = pool().await;
    let product_id = create_product(&pool, "Mondulkiri Honey", Decimal::new(28_000, 0)).await;
    let client = client();

    for quantity in ["0", "100", "5000000000", "-1"] {
        let form = [
            ("product_id", product_id.to_string()),
            ("quantity", quantity.to_string()),
        ];
        let resp = post_form(&client, "/cart/add", &form).await;
        assert_eq!(
            resp.status(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "quantity {quantity}"
        );
    }
    assert_eq!(cart_count(&client).await, "0");

    let form = [
        ("product_id", product_id.to_string()),
        ("quantity", "99".to_string()),
    ];
    let resp = post_form(&client, "/cart/add", &form).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(cart_count(&client).await, "1");
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_product_page_by_slug() {
    let pool = pool().await;
    let product_id = create_product(&pool, "Kampot Pepper", Decimal::new(12_000, 0)).await;
    let (slug,): (String,) = sqlx::query_as("SELECT slug FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    let client = client();

    let resp = client
        .get(format!("{}/products/{slug}", storefront_base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let page = resp.text().await.unwrap();
    assert!(page.contains("Kampot Pepper"));
    assert!(page.contains("name=\"quantity\""));
    assert!(page.contains(&format!("value=\"{product_id}\"")));

    sqlx::query("UPDATE products SET is_active = FALSE WHERE id = $1")
        .bind(product_id)
        .execute(&pool)
        .await
        .unwrap();
    let resp = client
        .get(format!("{}/products/{slug}", storefront_base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_decrement_stops_at_one_and_remove_drops_line() {
    let pool = pool().await;
    let product_id = create_product(&pool, "Kep Sea Salt", Decimal::new(500, 0)).await;
    let client = client();
    let line = [("product_id", product_id.to_string())];

    post_form(&client, "/cart/add", &line).await;
    post_form(&client, "/cart/increment", &line).await;

    let fragment = post_form(&client, "/cart/decrement", &line)
        .await
        .text()
        .await
        .unwrap();
    assert!(fragment.contains("500.00"));

    let fragment = post_form(&client, "/cart/decrement", &line)
        .await
        .text()
        .await
        .unwrap();
    assert!(fragment.contains("Kep Sea Salt"));
    assert_eq!(cart_count(&client).await, "1");

    let fragment = post_form(&client, "/cart/remove", &line)
        .await
        .text()
        .await
        .unwrap();
    assert!(fragment.contains("Your cart is empty"));
    assert_eq!(cart_count(&client).await, "0");
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_clear_empties_cart() {
    let pool = pool().await;
    let product_id = create_product(&pool, "Mondulkiri Honey", Decimal::new(2800, 0)).await;
    let client = client();

    post_form(&client, "/cart/add", &[("product_id", product_id.to_string())]).await;
    assert_eq!(cart_count(&client).await, "1");

    let resp = post_form(&client, "/cart/clear", &[]).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers().get("location").and_then(|v| v.to_str().ok()),
        Some("/cart")
    );
    assert_eq!(cart_count(&client).await, "0");
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_carts_are_per_session() {
    let pool = pool().await;
    let product_id = create_product(&pool, "Kampot Pepper", Decimal::new(1000, 0)).await;
    let alice = client();
    let bob = client();

    post_form(&alice, "/cart/add", &[("product_id", product_id.to_string())]).await;

    assert_eq!(cart_count(&alice).await, "1");
    assert_eq!(cart_count(&bob).await, "0");
}

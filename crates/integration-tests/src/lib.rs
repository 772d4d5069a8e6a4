//! Integration tests for the Sdach storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and start the storefront against a scratch database
//! cargo run -p sdach-cli -- migrate
//! cargo run -p sdach-storefront
//!
//! # Run the ignored integration tests
//! cargo test -p sdach-integration-tests -- --ignored
//! ```
//!
//! Every test creates its own products and customer with unique slugs and
//! emails, so tests can share one database.

use reqwest::{Client, redirect};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use uuid::Uuid;

/// Base URL for the storefront (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client with its own cookie jar, so its own session and cart.
///
/// Redirects are not followed so tests can assert on them.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Connect to the storefront database.
///
/// # Panics
///
/// Panics if no database URL is configured or the connection fails.
pub async fn pool() -> PgPool {
    dotenvy::dotenv().ok();
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .expect("STOREFRONT_DATABASE_URL not set");

    PgPool::connect(url.expose_secret())
        .await
        .expect("Failed to connect to storefront database")
}

/// Insert an active product with a unique slug and return its id.
///
/// # Panics
///
/// Panics if the insert fails.
pub async fn create_product(pool: &PgPool, name: &str, price: Decimal) -> i32 {
    let slug = format!("test-{}", Uuid::new_v4());
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO products (name, slug, price) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(slug)
    .bind(price)
    .fetch_one(pool)
    .await
    .expect("Failed to create test product");
    id
}

/// Insert a customer with a unique email and return their id.
///
/// The password hash is a placeholder; this customer cannot log in.
///
/// # Panics
///
/// Panics if the insert fails.
pub async fn create_user(pool: &PgPool, name: &str) -> i32 {
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, 'x') RETURNING id",
    )
    .bind(name)
    .bind(unique_email())
    .fetch_one(pool)
    .await
    .expect("Failed to create test user");
    id
}

/// A unique email address for a test customer.
#[must_use]
pub fn unique_email() -> String {
    format!("test-{}@example.com", Uuid::new_v4())
}

//! Cart Store: the read-modify-write cycle around the stored cart.
//!
//! The cart lives in one session entry under [`keys::CART_ITEMS`]. Every
//! mutation reads the whole cart, applies one rule from [`sdach_core::Cart`],
//! and rewrites the whole entry with a fresh 30 day expiry. Concurrent writers
//! sharing a session race; the last write wins.
//!
//! Reads never fail: a missing, expired or undecodable entry is an empty cart.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tower_sessions::Session;

use sdach_core::{Cart, MAX_LINE_QUANTITY, ProductId, ProductSnapshot};

pub use sdach_core::cart::grand_total;

use crate::db::RepositoryError;
use crate::models::keys;

/// Lifetime of the stored cart, counted from the last write.
pub const CART_TTL_DAYS: i64 = 30;

/// Errors from cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Reading or writing the session failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Product lookup failed (not the same as "product not found").
    #[error("catalog error: {0}")]
    Catalog(#[from] RepositoryError),

    /// The cart could not be serialized.
    #[error("failed to encode cart: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The stored cart entry: the encoded cart plus its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCart {
    /// JSON array of cart items.
    pub payload: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredCart {
    /// Encode `cart` with an expiry of [`CART_TTL_DAYS`] from `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be serialized.
    pub fn new(cart: &Cart, now: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        Ok(Self {
            payload: cart.encode()?,
            expires_at: now + Duration::days(CART_TTL_DAYS),
        })
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Backend holding the single stored cart entry for one client.
pub trait CartStorage: Send + Sync {
    /// Load the raw entry, if any.
    fn load(&self) -> impl Future<Output = Result<Option<StoredCart>, CartError>> + Send;

    /// Replace the entry.
    fn store(&self, entry: StoredCart) -> impl Future<Output = Result<(), CartError>> + Send;

    /// Delete the entry.
    fn forget(&self) -> impl Future<Output = Result<(), CartError>> + Send;
}

/// Product lookup used when a product is first added to the cart.
pub trait ProductCatalog: Send + Sync {
    /// Find an orderable product. `Ok(None)` means it does not exist.
    fn find_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<ProductSnapshot>, RepositoryError>> + Send;
}

/// Cart storage in the server-side session.
#[derive(Clone)]
pub struct SessionCartStorage {
    session: Session,
}

impl SessionCartStorage {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl CartStorage for SessionCartStorage {
    async fn load(&self) -> Result<Option<StoredCart>, CartError> {
        Ok(self.session.get::<StoredCart>(keys::CART_ITEMS).await?)
    }

    async fn store(&self, entry: StoredCart) -> Result<(), CartError> {
        self.session.insert(keys::CART_ITEMS, entry).await?;
        Ok(())
    }

    async fn forget(&self) -> Result<(), CartError> {
        self.session.remove::<StoredCart>(keys::CART_ITEMS).await?;
        Ok(())
    }
}

/// In-memory cart storage, for tests and tooling.
#[derive(Clone, Default)]
pub struct MemoryCartStorage {
    entry: Arc<Mutex<Option<StoredCart>>>,
}

impl MemoryCartStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw entry.
    pub async fn entry(&self) -> Option<StoredCart> {
        self.entry.lock().await.clone()
    }

    /// Overwrite the raw entry, bypassing the cart codec.
    pub async fn put(&self, entry: Option<StoredCart>) {
        *self.entry.lock().await = entry;
    }
}

impl CartStorage for MemoryCartStorage {
    async fn load(&self) -> Result<Option<StoredCart>, CartError> {
        Ok(self.entry.lock().await.clone())
    }

    async fn store(&self, entry: StoredCart) -> Result<(), CartError> {
        *self.entry.lock().await = Some(entry);
        Ok(())
    }

    async fn forget(&self) -> Result<(), CartError> {
        *self.entry.lock().await = None;
        Ok(())
    }
}

/// Cart operations for one client.
pub struct CartStore<S, C> {
    storage: S,
    catalog: C,
}

impl<S: CartStorage, C: ProductCatalog> CartStore<S, C> {
    pub const fn new(storage: S, catalog: C) -> Self {
        Self { storage, catalog }
    }

    /// Read the current cart. Any storage or decode problem reads as empty.
    pub async fn read(&self) -> Cart {
        match self.storage.load().await {
            Ok(Some(entry)) if !entry.is_expired(Utc::now()) => Cart::decode(&entry.payload),
            Ok(_) => Cart::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load cart, treating as empty");
                Cart::new()
            }
        }
    }

    /// Number of distinct lines in the cart.
    pub async fn count(&self) -> usize {
        self.read().await.len()
    }

    /// Add one unit of a product.
    ///
    /// An existing line is incremented; otherwise the product is looked up and
    /// appended with quantity 1. Unknown products, and lines already at
    /// [`MAX_LINE_QUANTITY`], are ignored and nothing is written. Returns the
    /// number of distinct lines.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the catalog lookup or the write fails.
    pub async fn add(&self, product_id: ProductId) -> Result<usize, CartError> {
        let mut cart = self.read().await;

        if cart.contains(product_id) {
            if !cart.increment(product_id) {
                return Ok(cart.len());
            }
        } else {
            let Some(product) = self.catalog.find_product(product_id).await? else {
                tracing::debug!(%product_id, "Ignoring add of unknown product");
                return Ok(cart.len());
            };
            cart.insert(&product);
        }

        self.write(&cart).await?;
        Ok(cart.len())
    }

    /// Add a product with an explicit quantity.
    ///
    /// `qty` is capped at [`MAX_LINE_QUANTITY`]. An existing line has its
    /// quantity set (not incremented) to `max(1, qty)`. A new line stores
    /// `max(1, qty)` as its quantity and `price × qty` as its total. Unknown
    /// products are ignored. Returns the number of distinct lines.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the catalog lookup or the write fails.
    pub async fn add_with_quantity(
        &self,
        product_id: ProductId,
        qty: i64,
    ) -> Result<usize, CartError> {
        let mut cart = self.read().await;

        if !cart.set_quantity(product_id, qty) {
            let Some(product) = self.catalog.find_product(product_id).await? else {
                tracing::debug!(%product_id, "Ignoring add of unknown product");
                return Ok(cart.len());
            };
            if !cart.insert_with_quantity(&product, qty) {
                return Ok(cart.len());
            }
        }

        self.write(&cart).await?;
        Ok(cart.len())
    }

    /// Add one to a line's quantity, up to the line limit. Unknown products
    /// are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the write fails.
    pub async fn increment(&self, product_id: ProductId) -> Result<Cart, CartError> {
        let mut cart = self.read().await;
        if cart.increment(product_id) {
            self.write(&cart).await?;
        }
        Ok(cart)
    }

    /// Subtract one from a line's quantity, never below 1.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the write fails.
    pub async fn decrement(&self, product_id: ProductId) -> Result<Cart, CartError> {
        let mut cart = self.read().await;
        if cart.decrement(product_id) {
            self.write(&cart).await?;
        }
        Ok(cart)
    }

    /// Drop a line and write the remainder back.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the write fails.
    pub async fn remove(&self, product_id: ProductId) -> Result<Cart, CartError> {
        let mut cart = self.read().await;
        if cart.remove(product_id) {
            self.write(&cart).await?;
        }
        Ok(cart)
    }

    /// Delete the stored cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the session cannot be updated.
    pub async fn clear(&self) -> Result<(), CartError> {
        self.storage.forget().await
    }

    async fn write(&self, cart: &Cart) -> Result<(), CartError> {
        let entry = StoredCart::new(cart, Utc::now())?;
        self.storage.store(entry).await
    }
}

//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::email::{EmailService, OrderMailer};
use crate::services::payments::{PaymentError, StripeClient};

/// Error building application state from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("stripe client: {0}")]
    Stripe(#[from] PaymentError),
    #[error("smtp transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    stripe: Option<StripeClient>,
    mailer: OrderMailer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Card payments and order emails are enabled only when their
    /// configuration is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the Stripe client or SMTP transport cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let stripe = config.stripe.as_ref().map(StripeClient::new).transpose()?;
        if stripe.is_none() {
            tracing::warn!("STRIPE_SECRET_KEY not set, card payments are disabled");
        }

        let email = config.email.as_ref().map(EmailService::new).transpose()?;
        if email.is_none() {
            tracing::warn!("SMTP_HOST not set, order confirmation emails are disabled");
        }
        let mailer = OrderMailer::new(email, config.base_url.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                mailer,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Stripe client, if card payments are configured.
    #[must_use]
    pub fn stripe(&self) -> Option<&StripeClient> {
        self.inner.stripe.as_ref()
    }

    /// Order confirmation mailer.
    #[must_use]
    pub fn mailer(&self) -> &OrderMailer {
        &self.inner.mailer
    }
}

//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. The session
//! holds the login and the cart entry.

use sqlx::PgPool;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;
use crate::models::keys;
use crate::services::cart::CART_TTL_DAYS;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "sdach_session";

/// Session expiry time in seconds, matching the cart lifetime.
const SESSION_EXPIRY_SECONDS: i64 = CART_TTL_DAYS * 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// The sessions table is created by `sdach-cli migrate`.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Store a one-shot error message for the next page.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_flash_error(
    session: &Session,
    message: &str,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::FLASH_ERROR, message).await
}

/// Take (and remove) the pending flash error, if any.
pub async fn take_flash_error(session: &Session) -> Option<String> {
    session
        .remove::<String>(keys::FLASH_ERROR)
        .await
        .ok()
        .flatten()
}

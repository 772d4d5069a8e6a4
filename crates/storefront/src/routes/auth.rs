//! Authentication route handlers.
//!
//! Handles password login, registration and logout. Errors are passed back
//! to the form pages as short codes in the query string.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::routes::cart::cart_store;
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub error: Option<&'static str>,
}

/// Message shown for an error code. Unknown codes get a generic message.
fn error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Invalid email or password.",
        "invalid_email" => "Please enter a valid email address.",
        "invalid_name" => "Please enter your name.",
        "weak_password" => "Password must be at least 8 characters.",
        "password_mismatch" => "Passwords do not match.",
        "email_taken" => "An account with this email already exists.",
        "session" => "We couldn't sign you in. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
}

fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "logged_out" => Some("You have been logged out."),
        _ => None,
    }
}

/// Error code for a failed registration.
const fn register_error_code(err: &AuthError) -> &'static str {
    match err {
        AuthError::InvalidEmail(_) => "invalid_email",
        AuthError::InvalidName(_) => "invalid_name",
        AuthError::WeakPassword(_) => "weak_password",
        AuthError::UserAlreadyExists => "email_taken",
        AuthError::InvalidCredentials | AuthError::Repository(_) | AuthError::PasswordHash => {
            "failed"
        }
    }
}

/// Put the user in the session and pick where to go next.
///
/// Customers who log in with items in the cart continue to checkout.
async fn start_session(state: &AppState, session: Session, user: &User) -> Response {
    if let Err(e) = set_current_user(&session, &CurrentUser::from(user)).await {
        tracing::error!("Failed to set session: {}", e);
        return Redirect::to("/auth/login?error=session").into_response();
    }
    set_sentry_user(&user.id, Some(user.email.as_str()));

    if cart_store(state, session).count().await > 0 {
        Redirect::to("/checkout").into_response()
    } else {
        Redirect::to("/").into_response()
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        error: query.error.as_deref().map(error_message),
        success: query.success.as_deref().and_then(success_message),
    }
}

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match AuthService::new(state.pool())
        .login_with_password(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "User logged in");
            start_session(&state, session, &user).await
        }
        Err(e @ (AuthError::Repository(_) | AuthError::PasswordHash)) => {
            tracing::error!("Login failed: {}", e);
            Redirect::to("/auth/login?error=failed").into_response()
        }
        Err(e) => {
            tracing::warn!("Login failed: {}", e);
            Redirect::to("/auth/login?error=credentials").into_response()
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    RegisterTemplate {
        error: query.error.as_deref().map(error_message),
    }
}

/// Handle registration form submission. A new account is logged in at once.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    if form.password != form.password_confirm {
        return Redirect::to("/auth/register?error=password_mismatch").into_response();
    }

    match AuthService::new(state.pool())
        .register_with_password(&form.name, &form.email, &form.password)
        .await
    {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "User registered");
            start_session(&state, session, &user).await
        }
        Err(e) => {
            tracing::warn!("Registration failed: {}", e);
            let redirect_url = format!("/auth/register?error={}", register_error_code(&e));
            Redirect::to(&redirect_url).into_response()
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Log out. The cart stays in the session.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {}", e);
    }
    clear_sentry_user();

    Redirect::to("/auth/login?success=logged_out").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_for_known_and_unknown_codes() {
        assert_eq!(error_message("credentials"), "Invalid email or password.");
        assert_eq!(
            error_message("email_taken"),
            "An account with this email already exists."
        );
        assert_eq!(
            error_message("<script>"),
            "Something went wrong. Please try again."
        );
    }

    #[test]
    fn test_register_error_codes() {
        assert_eq!(register_error_code(&AuthError::UserAlreadyExists), "email_taken");
        assert_eq!(
            register_error_code(&AuthError::WeakPassword("short".to_string())),
            "weak_password"
        );
        assert_eq!(register_error_code(&AuthError::PasswordHash), "failed");
    }

    #[test]
    fn test_success_message_ignores_unknown_codes() {
        assert!(success_message("logged_out").is_some());
        assert!(success_message("anything").is_none());
    }
}

//! Checkout route handlers.
//!
//! The form posts back to `/checkout`. Validation failures re-render the form
//! with per-field messages; a successful checkout redirects either to the
//! payment provider's hosted page or straight to the success page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, set_flash_error};
use crate::models::CurrentUser;
use crate::routes::cart::{CartView, cart_store};
use crate::services::checkout::{CheckoutError, CheckoutForm, CheckoutService, FieldErrors};
use crate::state::AppState;

const EMPTY_CART_MESSAGE: &str = "Your cart is empty.";

/// Checkout form template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub cart: CartView,
    pub form: CheckoutForm,
    pub errors: FieldErrors,
    /// Banner shown above the form (payment provider failures).
    pub error: Option<String>,
    pub stripe_enabled: bool,
    pub user: Option<CurrentUser>,
}

/// Checkout success page.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct CheckoutSuccessTemplate {
    /// Set when the customer returns from the hosted payment page.
    pub session_id: Option<String>,
}

/// Checkout cancelled page.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/cancel.html")]
pub struct CheckoutCancelTemplate;

/// Query parameters on the success redirect.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// Display the checkout form. An empty cart goes back to the cart page.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Response, AppError> {
    let cart = cart_store(&state, session.clone()).read().await;
    if cart.is_empty() {
        set_flash_error(&session, EMPTY_CART_MESSAGE).await?;
        return Ok(Redirect::to("/cart").into_response());
    }

    let stripe_enabled = state.stripe().is_some();
    let form = CheckoutForm {
        payment_method: if stripe_enabled { "stripe" } else { "cod" }.to_string(),
        ..CheckoutForm::default()
    };

    Ok(CheckoutTemplate {
        cart: CartView::new(&cart, state.config().currency),
        form,
        errors: FieldErrors::default(),
        error: None,
        stripe_enabled,
        user,
    }
    .into_response())
}

/// Place the order.
#[instrument(skip(state, session, user, form))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Response, AppError> {
    let config = state.config();
    let store = cart_store(&state, session.clone());
    let orders = OrderRepository::new(state.pool());
    let service = CheckoutService::new(
        &orders,
        state.stripe(),
        state.mailer(),
        config.currency,
        &config.base_url,
    );

    let error = match service.place_order(&store, user.as_ref(), &form).await {
        Ok(outcome) => {
            let order_id = outcome.order.id.to_string();
            add_breadcrumb(
                "checkout",
                "Order placed",
                Some(&[
                    ("order_id", order_id.as_str()),
                    ("payment_method", outcome.order.payment_method.code()),
                ]),
            );
            return Ok(Redirect::to(&outcome.redirect_url).into_response());
        }
        Err(e) => e,
    };

    match error {
        CheckoutError::EmptyCart => {
            set_flash_error(&session, EMPTY_CART_MESSAGE).await?;
            Ok(Redirect::to("/cart").into_response())
        }
        CheckoutError::AuthRequired => Ok(Redirect::to("/auth/login").into_response()),
        CheckoutError::Validation(errors) => {
            let page = render_form(&state, &session, form, errors, None, user).await;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        CheckoutError::PaymentGateway(e) => {
            tracing::warn!("Payment handoff failed: {e}");
            let message = "We couldn't start the card payment. Your cart has been kept, please try again.";
            let page = render_form(
                &state,
                &session,
                form,
                FieldErrors::default(),
                Some(message.to_string()),
                user,
            )
            .await;
            Ok((StatusCode::BAD_GATEWAY, page).into_response())
        }
        other => Err(other.into()),
    }
}

async fn render_form(
    state: &AppState,
    session: &Session,
    form: CheckoutForm,
    errors: FieldErrors,
    error: Option<String>,
    user: Option<CurrentUser>,
) -> CheckoutTemplate {
    let cart = cart_store(state, session.clone()).read().await;
    CheckoutTemplate {
        cart: CartView::new(&cart, state.config().currency),
        form,
        errors,
        error,
        stripe_enabled: state.stripe().is_some(),
        user,
    }
}

/// Display the success page.
pub async fn success(Query(query): Query<SuccessQuery>) -> impl IntoResponse {
    CheckoutSuccessTemplate {
        session_id: query.session_id.filter(|id| !id.is_empty()),
    }
}

/// Display the cancelled-payment page.
pub async fn cancel() -> impl IntoResponse {
    CheckoutCancelTemplate
}

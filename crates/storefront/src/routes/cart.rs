//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! The cart itself lives in the session; see [`crate::services::cart`].

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
};
use sdach_core::{Cart, CartItem, CurrencyCode, MAX_LINE_QUANTITY, ProductId};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::ProductRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::take_flash_error;
use crate::services::cart::{CartStore, SessionCartStorage};
use crate::state::AppState;

/// Cart item display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: i32,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub grand_total: String,
    /// Total units across all lines.
    pub item_count: u64,
}

impl CartView {
    #[must_use]
    pub fn new(cart: &Cart, currency: CurrencyCode) -> Self {
        Self {
            items: cart
                .items()
                .iter()
                .map(|item| CartItemView::new(item, currency))
                .collect(),
            grand_total: currency.format(cart.grand_total()),
            item_count: cart.total_quantity(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CartItemView {
    fn new(item: &CartItem, currency: CurrencyCode) -> Self {
        Self {
            product_id: item.product_id.as_i32(),
            name: item.name.clone(),
            image: item.image.clone(),
            quantity: item.quantity,
            price: currency.format(item.unit_amount),
            line_price: currency.format(item.total_amount),
        }
    }
}

/// Cart Store bound to this request's session and the product table.
pub(crate) fn cart_store(
    state: &AppState,
    session: Session,
) -> CartStore<SessionCartStorage, ProductRepository<'_>> {
    CartStore::new(
        SessionCartStorage::new(session),
        ProductRepository::new(state.pool()),
    )
}

/// Add to cart form data.
///
/// Without `quantity` the line is incremented by one; with it the line
/// quantity is set.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i32,
    pub quantity: Option<u32>,
}

impl AddToCartForm {
    /// The requested quantity, if one was posted and it is in
    /// `1..=MAX_LINE_QUANTITY`.
    ///
    /// # Errors
    ///
    /// Returns the rejected value when it is out of range.
    pub fn checked_quantity(&self) -> std::result::Result<Option<i64>, u32> {
        match self.quantity {
            None => Ok(None),
            Some(qty) if (1..=MAX_LINE_QUANTITY).contains(&qty) => Ok(Some(i64::from(qty))),
            Some(qty) => Err(qty),
        }
    }
}

/// Form data naming a single cart line.
#[derive(Debug, Deserialize)]
pub struct CartLineForm {
    pub product_id: i32,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
    pub flash: Option<String>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    /// Number of distinct lines.
    pub count: usize,
}

/// Display cart page.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let flash = take_flash_error(&session).await;
    let cart = cart_store(&state, session).read().await;

    CartShowTemplate {
        cart: CartView::new(&cart, state.config().currency),
        flash,
    }
}

/// Add item to cart (HTMX).
///
/// Returns the count badge with an HTMX trigger so other cart widgets refresh.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let quantity = match form.checked_quantity() {
        Ok(quantity) => quantity,
        Err(qty) => {
            tracing::warn!(quantity = qty, "Rejected add to cart quantity");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(format!(
                    "<span class=\"text-red-500\">Quantity must be between 1 and {MAX_LINE_QUANTITY}</span>"
                )),
            )
                .into_response();
        }
    };

    let store = cart_store(&state, session);
    let product_id = ProductId::new(form.product_id);

    let result = match quantity {
        Some(qty) => store.add_with_quantity(product_id, qty).await,
        None => store.add(product_id).await,
    };

    match result {
        Ok(count) => (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartCountTemplate { count },
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to add item to cart: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<span class=\"text-red-500\">Error adding to cart</span>"),
            )
                .into_response()
        }
    }
}

fn items_fragment(cart: &Cart, currency: CurrencyCode) -> Response {
    (
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate {
            cart: CartView::new(cart, currency),
        },
    )
        .into_response()
}

/// Increase a line's quantity by one (HTMX).
#[instrument(skip(state, session))]
pub async fn increment(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CartLineForm>,
) -> Result<Response> {
    let cart = cart_store(&state, session)
        .increment(ProductId::new(form.product_id))
        .await?;
    Ok(items_fragment(&cart, state.config().currency))
}

/// Decrease a line's quantity by one, never below one (HTMX).
#[instrument(skip(state, session))]
pub async fn decrement(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CartLineForm>,
) -> Result<Response> {
    let cart = cart_store(&state, session)
        .decrement(ProductId::new(form.product_id))
        .await?;
    Ok(items_fragment(&cart, state.config().currency))
}

/// Remove a line from the cart (HTMX).
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CartLineForm>,
) -> Result<Response> {
    let cart = cart_store(&state, session)
        .remove(ProductId::new(form.product_id))
        .await?;
    Ok(items_fragment(&cart, state.config().currency))
}

/// Empty the cart and go back to the cart page.
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    cart_store(&state, session).clear().await?;
    Ok(Redirect::to("/cart"))
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    CartCountTemplate {
        count: cart_store(&state, session).count().await,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use sdach_core::ProductSnapshot;

    use super::*;

    #[test]
    fn test_cart_view_formats_money() {
        let mut cart = Cart::new();
        cart.insert_with_quantity(
            &ProductSnapshot {
                id: ProductId::new(1),
                name: "Kampot Pepper".to_string(),
                price: Decimal::new(1000, 0),
                image: None,
            },
            3,
        );
        cart.insert(&ProductSnapshot {
            id: ProductId::new(2),
            name: "Palm Sugar".to_string(),
            price: Decimal::new(5000, 0),
            image: Some("/static/palm-sugar.jpg".to_string()),
        });

        let view = CartView::new(&cart, CurrencyCode::KHR);

        assert_eq!(view.items.len(), 2);
        assert_eq!(view.item_count, 4);
        assert_eq!(view.grand_total, "៛8000.00");
        assert_eq!(view.items[0].price, "៛1000.00");
        assert_eq!(view.items[0].line_price, "៛3000.00");
        assert_eq!(view.items[1].image.as_deref(), Some("/static/palm-sugar.jpg"));
    }

    #[test]
    fn test_add_form_quantity_bounds() {
        let form = |quantity| AddToCartForm {
            product_id: 1,
            quantity,
        };

        assert_eq!(form(None).checked_quantity(), Ok(None));
        assert_eq!(form(Some(1)).checked_quantity(), Ok(Some(1)));
        assert_eq!(
            form(Some(MAX_LINE_QUANTITY)).checked_quantity(),
            Ok(Some(i64::from(MAX_LINE_QUANTITY)))
        );
        assert_eq!(form(Some(0)).checked_quantity(), Err(0));
        assert_eq!(
            form(Some(MAX_LINE_QUANTITY + 1)).checked_quantity(),
            Err(MAX_LINE_QUANTITY + 1)
        );
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::new(&Cart::new(), CurrencyCode::USD);
        assert!(view.is_empty());
        assert_eq!(view.grand_total, "$0.00");
        assert_eq!(view.item_count, 0);
    }
}

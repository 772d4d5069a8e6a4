//! Order history route handlers (requires auth).

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use sdach_core::OrderId;
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{OrderListing, PlacedOrder};
use crate::state::AppState;

/// Order row display data.
pub struct OrderSummaryView {
    pub id: i32,
    pub placed_on: String,
    pub grand_total: String,
    pub payment_method: &'static str,
    pub payment_status: &'static str,
    pub status: &'static str,
}

impl From<&OrderListing> for OrderSummaryView {
    fn from(order: &OrderListing) -> Self {
        Self {
            id: order.id.as_i32(),
            placed_on: order.created_at.format("%Y-%m-%d").to_string(),
            grand_total: order.currency.format(order.grand_total),
            payment_method: order.payment_method.label(),
            payment_status: order.payment_status.as_str(),
            status: order.status.as_str(),
        }
    }
}

/// Order line display data.
pub struct OrderLineView {
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Order detail display data.
pub struct OrderDetailView {
    pub summary: OrderSummaryView,
    pub ship_to: String,
    pub phone: String,
    pub street_address: String,
    pub locality: String,
    pub items: Vec<OrderLineView>,
    pub item_count: u64,
}

impl From<&PlacedOrder> for OrderDetailView {
    fn from(order: &PlacedOrder) -> Self {
        let currency = order.currency;
        let address = &order.address;
        Self {
            summary: OrderSummaryView {
                id: order.id.as_i32(),
                placed_on: order.created_at.format("%Y-%m-%d").to_string(),
                grand_total: currency.format(order.grand_total),
                payment_method: order.payment_method.label(),
                payment_status: order.payment_status.as_str(),
                status: order.status.as_str(),
            },
            ship_to: address.full_name(),
            phone: address.phone.clone(),
            street_address: address.street_address.clone(),
            locality: format!("{}, {} {}", address.city, address.state, address.zip_code),
            items: order
                .items
                .iter()
                .map(|item| OrderLineView {
                    name: item.product_name.clone(),
                    quantity: item.quantity,
                    price: currency.format(item.unit_amount),
                    line_price: currency.format(item.total_amount),
                })
                .collect(),
            item_count: order.total_quantity(),
        }
    }
}

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub orders: Vec<OrderSummaryView>,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub order: OrderDetailView,
}

/// List the customer's orders, newest first.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<OrdersIndexTemplate> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;

    Ok(OrdersIndexTemplate {
        orders: orders.iter().map(OrderSummaryView::from).collect(),
    })
}

/// Show one of the customer's orders. Other customers' orders are not found.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<OrderShowTemplate> {
    let order = OrderRepository::new(state.pool())
        .get_for_user(OrderId::new(id), user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    Ok(OrderShowTemplate {
        order: OrderDetailView::from(&order),
    })
}

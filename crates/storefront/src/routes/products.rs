//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use sdach_core::{CurrencyCode, MAX_LINE_QUANTITY};
use tracing::instrument;

use crate::db::ProductRepository;
use crate::db::products::Product;
use crate::error::{AppError, Result};
use crate::filters;
use crate::state::AppState;

/// Product detail display data for templates.
#[derive(Clone)]
pub struct ProductDetailView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: String,
    pub featured_image: Option<String>,
    pub images: Vec<String>,
    pub on_sale: bool,
}

impl ProductDetailView {
    fn new(product: &Product, currency: CurrencyCode) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            slug: product.slug.clone(),
            description: product.description.clone(),
            price: currency.format(product.price),
            featured_image: product.images.first().cloned(),
            images: product.images.iter().skip(1).cloned().collect(),
            on_sale: product.on_sale,
        }
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub product: ProductDetailView,
    /// Upper bound for the quantity picker.
    pub max_quantity: u32,
}

/// Display product detail page. Inactive and unknown slugs are not found.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<ProductShowTemplate> {
    let product = ProductRepository::new(state.pool())
        .get_active_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

    Ok(ProductShowTemplate {
        product: ProductDetailView::new(&product, state.config().currency),
        max_quantity: MAX_LINE_QUANTITY,
    })
}

//! Home page route handler: the filtered, paginated product listing.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use sdach_core::CurrencyCode;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::ProductRepository;
use crate::db::products::{Product, ProductFilter, ProductPage, ProductSort};
use crate::filters;
use crate::middleware::take_flash_error;
use crate::state::AppState;

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub price: String,
    pub image: Option<String>,
    pub is_featured: bool,
    pub on_sale: bool,
}

impl ProductView {
    pub(crate) fn new(product: &Product, currency: CurrencyCode) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            slug: product.slug.clone(),
            price: currency.format(product.price),
            image: product.images.first().cloned(),
            is_featured: product.is_featured,
            on_sale: product.on_sale,
        }
    }
}

/// Listing query parameters.
///
/// Everything is read leniently: bad values are ignored rather than
/// rejected, so a hand-edited URL still shows products.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub page: Option<String>,
    pub sort: Option<String>,
    pub featured: Option<String>,
    pub on_sale: Option<String>,
    /// Maximum price, inclusive.
    pub price_range: Option<String>,
}

fn is_checked(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "on" | "true"))
}

impl ListingQuery {
    /// 1-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|page| page.parse().ok())
            .filter(|page| *page >= 1)
            .unwrap_or(1)
    }

    #[must_use]
    pub fn filter(&self) -> ProductFilter {
        ProductFilter {
            featured: is_checked(self.featured.as_deref()),
            on_sale: is_checked(self.on_sale.as_deref()),
            max_price: self
                .price_range
                .as_deref()
                .and_then(|value| Decimal::from_str(value.trim()).ok())
                .filter(|price| !price.is_sign_negative()),
            sort: ProductSort::from_query(self.sort.as_deref()),
        }
    }
}

/// Link to a listing page that keeps the current filters.
fn page_link(filter: &ProductFilter, page: u32) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if filter.featured {
        query.append_pair("featured", "1");
    }
    if filter.on_sale {
        query.append_pair("on_sale", "1");
    }
    if let Some(max_price) = filter.max_price {
        query.append_pair("price_range", &max_price.to_string());
    }
    if filter.sort != ProductSort::default() {
        query.append_pair("sort", filter.sort.as_str());
    }
    query.append_pair("page", &page.to_string());
    format!("/?{}", query.finish())
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub products: Vec<ProductView>,
    pub flash: Option<String>,
    pub featured: bool,
    pub on_sale: bool,
    pub price_range: String,
    pub sort: &'static str,
    pub current_page: u32,
    pub total_pages: u32,
    pub prev_link: Option<String>,
    pub next_link: Option<String>,
}

impl HomeTemplate {
    fn new(
        filter: &ProductFilter,
        page: &ProductPage,
        current_page: u32,
        currency: CurrencyCode,
        flash: Option<String>,
    ) -> Self {
        let total_pages = page.total_pages();
        Self {
            products: page
                .products
                .iter()
                .map(|product| ProductView::new(product, currency))
                .collect(),
            flash,
            featured: filter.featured,
            on_sale: filter.on_sale,
            price_range: filter
                .max_price
                .map(|price| price.to_string())
                .unwrap_or_default(),
            sort: filter.sort.as_str(),
            current_page,
            total_pages,
            prev_link: (current_page > 1).then(|| page_link(filter, current_page - 1)),
            next_link: (current_page < total_pages).then(|| page_link(filter, current_page + 1)),
        }
    }
}

/// Display the home page with the active product listing.
#[instrument(skip(state, session))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListingQuery>,
) -> impl IntoResponse {
    let filter = query.filter();
    let current_page = query.page();

    let page = ProductRepository::new(state.pool())
        .list_page(&filter, current_page)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to list products: {e}");
            ProductPage {
                products: Vec::new(),
                total: 0,
            }
        });

    HomeTemplate::new(
        &filter,
        &page,
        current_page,
        state.config().currency,
        take_flash_error(&session).await,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn listing(pairs: &[(&str, &str)]) -> ListingQuery {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        let uri: axum::http::Uri = format!("/?{encoded}").parse().unwrap();
        Query::<ListingQuery>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_empty_query_lists_everything_latest_first() {
        let query = listing(&[]);
        assert_eq!(query.page(), 1);
        assert_eq!(query.filter(), ProductFilter::default());
    }

    #[test]
    fn test_query_builds_filter() {
        let query = listing(&[
            ("featured", "1"),
            ("on_sale", "on"),
            ("price_range", "20000"),
            ("sort", "price"),
            ("page", "2"),
        ]);
        assert_eq!(query.page(), 2);
        assert_eq!(
            query.filter(),
            ProductFilter {
                featured: true,
                on_sale: true,
                max_price: Some(Decimal::new(20_000, 0)),
                sort: ProductSort::Price,
            }
        );
    }

    #[test]
    fn test_bad_values_are_ignored() {
        let query = listing(&[
            ("featured", "no"),
            ("price_range", "cheap"),
            ("sort", "random"),
            ("page", "0"),
        ]);
        assert_eq!(query.page(), 1);
        assert_eq!(query.filter(), ProductFilter::default());

        let negative = listing(&[("price_range", "-5")]);
        assert!(negative.filter().max_price.is_none());
    }

    #[test]
    fn test_page_link_keeps_filters() {
        let filter = ProductFilter {
            featured: true,
            on_sale: false,
            max_price: Some(Decimal::new(1500, 2)),
            sort: ProductSort::Price,
        };
        assert_eq!(
            page_link(&filter, 3),
            "/?featured=1&price_range=15.00&sort=price&page=3"
        );
        assert_eq!(page_link(&ProductFilter::default(), 2), "/?page=2");
    }

    #[test]
    fn test_template_pagination_links() {
        let filter = ProductFilter::default();
        let page = ProductPage {
            products: Vec::new(),
            total: 20,
        };

        let first = HomeTemplate::new(&filter, &page, 1, CurrencyCode::KHR, None);
        assert_eq!(first.total_pages, 3);
        assert!(first.prev_link.is_none());
        assert_eq!(first.next_link.as_deref(), Some("/?page=2"));

        let last = HomeTemplate::new(&filter, &page, 3, CurrencyCode::KHR, None);
        assert_eq!(last.prev_link.as_deref(), Some("/?page=2"));
        assert!(last.next_link.is_none());
    }
}

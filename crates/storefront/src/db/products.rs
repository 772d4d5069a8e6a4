//! Product catalog queries.
//!
//! The storefront never writes products; the CLI seeds them.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use sdach_core::{ProductId, ProductSnapshot};

use super::RepositoryError;
use crate::services::cart::ProductCatalog;

/// Products per listing page.
pub const PRODUCTS_PER_PAGE: i64 = 9;

/// A catalog product as listed on the storefront.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub images: Vec<String>,
    pub is_featured: bool,
    pub on_sale: bool,
}

impl Product {
    /// Snapshot taken into the cart: name, price and the first image.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            image: self.images.first().cloned(),
        }
    }
}

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    /// Newest first.
    #[default]
    Latest,
    /// Cheapest first.
    Price,
}

impl ProductSort {
    /// Parse the `sort` query value. Unknown values fall back to `Latest`.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("price") => Self::Price,
            _ => Self::Latest,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Price => "price",
        }
    }

    const fn order_by(self) -> &'static str {
        match self {
            Self::Latest => " ORDER BY created_at DESC, id DESC",
            Self::Price => " ORDER BY price ASC, id ASC",
        }
    }
}

/// Filters for the active product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub featured: bool,
    pub on_sale: bool,
    /// Upper bound on price, inclusive.
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
}

impl ProductFilter {
    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE is_active");
        if self.featured {
            query.push(" AND is_featured");
        }
        if self.on_sale {
            query.push(" AND on_sale");
        }
        if let Some(max_price) = self.max_price {
            query.push(" AND price BETWEEN 0 AND ");
            query.push_bind(max_price);
        }
    }

    fn page_query(&self, page: u32) -> QueryBuilder<'static, Postgres> {
        let mut query = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        self.push_conditions(&mut query);
        query.push(self.sort.order_by());
        query.push(" LIMIT ");
        query.push_bind(PRODUCTS_PER_PAGE);
        query.push(" OFFSET ");
        query.push_bind(page_offset(page));
        query
    }

    fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM products");
        self.push_conditions(&mut query);
        query
    }
}

/// Row offset for a 1-based page number. Page 0 is treated as page 1.
fn page_offset(page: u32) -> i64 {
    i64::from(page.max(1) - 1) * PRODUCTS_PER_PAGE
}

/// One page of the listing plus the number of matching products.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
}

impl ProductPage {
    /// Number of pages, at least 1.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        let pages = (self.total + PRODUCTS_PER_PAGE - 1) / PRODUCTS_PER_PAGE;
        u32::try_from(pages.max(1)).unwrap_or(u32::MAX)
    }
}

const PRODUCT_COLUMNS: &str = "id, name, slug, description, price, images, is_featured, on_sale";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    images: Vec<String>,
    is_featured: bool,
    on_sale: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            images: row.images,
            is_featured: row.is_featured,
            on_sale: row.on_sale,
        }
    }
}

/// Repository for product reads.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an active product by ID. Inactive products are treated as missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, slug, description, price, images, is_featured, on_sale
            FROM products
            WHERE id = $1 AND is_active
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Get an active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, slug, description, price, images, is_featured, on_sale
            FROM products
            WHERE slug = $1 AND is_active
            ",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// One page of active products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either query fails.
    pub async fn list_page(
        &self,
        filter: &ProductFilter,
        page: u32,
    ) -> Result<ProductPage, RepositoryError> {
        let rows: Vec<ProductRow> = filter
            .page_query(page)
            .build_query_as()
            .fetch_all(self.pool)
            .await?;

        let (total,): (i64,) = filter
            .count_query()
            .build_query_as()
            .fetch_one(self.pool)
            .await?;

        Ok(ProductPage {
            products: rows.into_iter().map(Product::from).collect(),
            total,
        })
    }
}

impl ProductCatalog for ProductRepository<'_> {
    async fn find_product(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductSnapshot>, RepositoryError> {
        Ok(self.get_active(id).await?.as_ref().map(Product::snapshot))
    }
}

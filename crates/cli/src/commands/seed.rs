//! Seed the catalog from a YAML file.
//!
//! Products are matched by slug: new slugs are inserted, existing ones are
//! updated in place so order items keep pointing at the same product id.
//!
//! ```yaml
//! products:
//!   - name: Kampot Pepper
//!     slug: kampot-pepper
//!     description: Black pepper from Kampot province.
//!     price: "12.50"
//!     featured: true
//!     images:
//!       - /static/images/kampot-pepper.jpg
//!   - name: Palm Sugar
//!     slug: palm-sugar
//!     price: "4.00"
//!     on_sale: true
//!     active: false
//! ```

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{debug, error, info};

use sdach_core::ProductId;
use sdach_storefront::db;

/// Top-level seed file.
#[derive(Debug, Deserialize)]
pub struct ProductsFile {
    pub products: Vec<ProductSeed>,
}

/// One product entry.
#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    /// Decimal string, e.g. `"12.50"`.
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub on_sale: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// Outcome of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub updated: usize,
}

fn valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Check every entry, returning one message per problem.
#[must_use]
pub fn validate(file: &ProductsFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, product) in file.products.iter().enumerate() {
        let label = format!("products[{index}] ({})", product.slug);

        if product.name.trim().is_empty() {
            errors.push(format!("{label}: name is empty"));
        }
        if !valid_slug(&product.slug) {
            errors.push(format!(
                "{label}: slug must be lowercase letters, digits and inner hyphens"
            ));
        }
        if product.price.is_sign_negative() {
            errors.push(format!("{label}: price must not be negative"));
        }
        if product.price.scale() > 2 {
            errors.push(format!("{label}: price has more than two decimal places"));
        }
        if !seen.insert(product.slug.as_str()) {
            errors.push(format!("{label}: duplicate slug"));
        }
    }

    errors
}

/// Insert or update one product by slug.
///
/// Returns the product id and `true` when the row was new.
async fn upsert(pool: &PgPool, product: &ProductSeed) -> Result<(ProductId, bool), sqlx::Error> {
    let (id, inserted): (ProductId, bool) = sqlx::query_as(
        r"
        INSERT INTO products (name, slug, description, price, images, is_featured, on_sale, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (slug) DO UPDATE SET
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            price = EXCLUDED.price,
            images = EXCLUDED.images,
            is_featured = EXCLUDED.is_featured,
            on_sale = EXCLUDED.on_sale,
            is_active = EXCLUDED.is_active,
            updated_at = NOW()
        RETURNING id, (xmax = 0) AS inserted
        ",
    )
    .bind(product.name.trim())
    .bind(&product.slug)
    .bind(product.description.trim())
    .bind(product.price)
    .bind(&product.images)
    .bind(product.featured)
    .bind(product.on_sale)
    .bind(product.active)
    .fetch_one(pool)
    .await?;

    Ok((id, inserted))
}

/// Seed products from a YAML file.
///
/// The whole file is validated before connecting to the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or a database operation fails.
pub async fn products(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");

    let content = tokio::fs::read_to_string(path).await?;
    let file: ProductsFile = serde_yaml::from_str(&content)?;

    info!(products = file.products.len(), "Parsed product file");

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Product file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    if dry_run {
        info!("Dry run: product file is valid, nothing written");
        return Ok(());
    }

    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let mut summary = SeedSummary::default();
    for product in &file.products {
        let (product_id, inserted) = upsert(&pool, product).await?;
        debug!(%product_id, slug = %product.slug, inserted, "Seeded product");
        if inserted {
            summary.inserted += 1;
        } else {
            summary.updated += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Products inserted: {}", summary.inserted);
    info!("  Products updated: {}", summary.updated);

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
products:
  - name: Kampot Pepper
    slug: kampot-pepper
    description: Black pepper from Kampot province.
    price: "12.50"
    featured: true
    images:
      - /static/images/kampot-pepper.jpg
  - name: Palm Sugar
    slug: palm-sugar
    price: "4.00"
    on_sale: true
    active: false
"#;

    #[test]
    fn test_parse_sample_file() {
        let file: ProductsFile = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(file.products.len(), 2);
        assert_eq!(file.products[0].price, Decimal::new(1250, 2));
        assert!(file.products[0].active);
        assert!(file.products[0].featured);
        assert!(!file.products[0].on_sale);
        assert!(!file.products[1].active);
        assert!(file.products[1].on_sale);
        assert!(file.products[1].description.is_empty());
        assert!(file.products[1].images.is_empty());
        assert!(validate(&file).is_empty());
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let file = ProductsFile {
            products: vec![
                ProductSeed {
                    name: " ".to_string(),
                    slug: "Bad Slug".to_string(),
                    price: Decimal::new(-100, 2),
                    description: String::new(),
                    images: vec![],
                    featured: false,
                    on_sale: false,
                    active: true,
                },
                ProductSeed {
                    name: "Rice".to_string(),
                    slug: "rice".to_string(),
                    price: Decimal::new(12345, 3),
                    description: String::new(),
                    images: vec![],
                    featured: false,
                    on_sale: false,
                    active: true,
                },
                ProductSeed {
                    name: "Rice again".to_string(),
                    slug: "rice".to_string(),
                    price: Decimal::new(100, 2),
                    description: String::new(),
                    images: vec![],
                    featured: false,
                    on_sale: false,
                    active: true,
                },
            ],
        };

        let errors = validate(&file);
        assert_eq!(errors.len(), 5);
        assert!(errors[0].contains("name is empty"));
        assert!(errors.iter().any(|e| e.contains("slug must be")));
        assert!(errors.iter().any(|e| e.contains("negative")));
        assert!(errors.iter().any(|e| e.contains("two decimal places")));
        assert!(errors.iter().any(|e| e.contains("duplicate slug")));
    }

    #[test]
    fn test_valid_slug() {
        assert!(valid_slug("kampot-pepper-500g"));
        assert!(!valid_slug(""));
        assert!(!valid_slug("-pepper"));
        assert!(!valid_slug("pepper_500g"));
    }
}

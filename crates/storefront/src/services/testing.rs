//! In-memory collaborators for service tests.

use std::collections::HashMap;

use rust_decimal::Decimal;

use sdach_core::{ProductId, ProductSnapshot};

use super::cart::ProductCatalog;
use crate::db::RepositoryError;

/// Catalog backed by a fixed product list.
pub struct FakeCatalog {
    products: HashMap<ProductId, ProductSnapshot>,
}

impl FakeCatalog {
    /// Products as `(id, name, price)`.
    pub fn with(products: &[(i32, &str, i64)]) -> Self {
        let products = products
            .iter()
            .map(|&(id, name, price)| {
                let id = ProductId::new(id);
                (
                    id,
                    ProductSnapshot {
                        id,
                        name: name.to_string(),
                        price: Decimal::new(price, 0),
                        image: Some(format!("products/{id}.jpg")),
                    },
                )
            })
            .collect();
        Self { products }
    }

    /// Kampot Pepper (1000) and Palm Sugar (5000).
    pub fn standard() -> Self {
        Self::with(&[(1, "Kampot Pepper", 1000), (2, "Palm Sugar", 5000)])
    }
}

impl ProductCatalog for FakeCatalog {
    async fn find_product(&self, id: ProductId) -> Result<Option<ProductSnapshot>, RepositoryError> {
        Ok(self.products.get(&id).cloned())
    }
}

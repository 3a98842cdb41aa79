//! Product catalog reference data.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub key_ingredients: Vec<String>,
    #[serde(default)]
    pub suitable_for: Vec<String>,
    pub image_url: String,
    pub variant_id: String,
    pub price: String,
    pub original_price: String,
}

/// Immutable product catalog with unique ids.
///
/// `Catalog::default()` is the "no catalog configured" value: analysis and
/// chat work without one, routine generation refuses to run.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<CatalogProduct>,
}

impl Catalog {
    pub fn new(products: Vec<CatalogProduct>) -> Result<Self, AppError> {
        if products.is_empty() {
            return Err(AppError::Configuration("product catalog is empty".into()));
        }
        let mut seen = HashSet::new();
        for product in &products {
            if product.id.trim().is_empty() {
                return Err(AppError::Configuration(format!(
                    "catalog product '{}' has an empty id",
                    product.name
                )));
            }
            if !seen.insert(product.id.as_str()) {
                return Err(AppError::Configuration(format!(
                    "duplicate catalog product id '{}'",
                    product.id
                )));
            }
        }
        Ok(Self { products })
    }

    /// Load a JSON array of products.
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let products: Vec<CatalogProduct> = serde_json::from_str(json)
            .map_err(|e| AppError::Configuration(format!("invalid product catalog: {e}")))?;
        Self::new(products)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("cannot read catalog {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), products = catalog.len(), "Product catalog loaded");
        Ok(catalog)
    }

    pub fn products(&self) -> &[CatalogProduct] {
        &self.products
    }

    pub fn get(&self, id: &str) -> Option<&CatalogProduct> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Pretty JSON snapshot embedded in routine prompts.
    pub fn snapshot(&self) -> String {
        serde_json::to_string_pretty(&self.products).unwrap_or_else(|_| "[]".to_string())
    }
}

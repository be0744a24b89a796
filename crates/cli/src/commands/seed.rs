//! Seed the catalog from a YAML file.
//!
//! The file is parsed and validated in full before connecting to the
//! database. Categories and products are upserted by slug, so re-running a
//! seed updates rows in place.
//!
//! ```yaml
//! categories:
//!   - name: Mugs
//!     description: Stoneware, made to order
//! products:
//!   - name: Blue Mug
//!     category: mugs        # category slug, optional
//!     price: "12.50"
//!     stock: 20
//!     featured: true
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use shopfront_commerce::db::{CategoryRepository, ProductRepository, RepositoryError};
use shopfront_commerce::models::{CategoryInput, ProductInput};
use shopfront_commerce::validation::rules;
use shopfront_core::{CategoryId, Slug};

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Cannot read {0}: {1}")]
    Io(String, std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Catalog file contents.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCategory {
    pub name: String,
    /// Derived from the name when absent.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    /// Slug of a category in the same file.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Quoted decimal, e.g. `"12.50"`.
    pub price: String,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "published_default")]
    pub published: bool,
    #[serde(default)]
    pub featured: bool,
}

const fn published_default() -> bool {
    true
}

/// A product ready to upsert once its category has an ID.
#[derive(Debug)]
pub struct ProductSeed {
    pub category: Option<Slug>,
    pub input: ProductInput,
}

/// A fully validated catalog.
#[derive(Debug, Default)]
pub struct ValidCatalog {
    pub categories: Vec<CategoryInput>,
    pub products: Vec<ProductSeed>,
}

fn slug_for(name: &str, slug: Option<&str>) -> Option<Slug> {
    match slug {
        Some(slug) => Slug::parse(slug.trim()).ok(),
        None => Slug::from_title(name).ok(),
    }
}

/// Validate a parsed catalog, collecting every problem.
///
/// # Errors
///
/// Returns one message per problem found.
pub fn validate_catalog(seed: &CatalogSeed) -> Result<ValidCatalog, Vec<String>> {
    let mut errors = Vec::new();
    let mut catalog = ValidCatalog::default();

    let mut category_slugs = HashSet::new();
    for (i, category) in seed.categories.iter().enumerate() {
        if category.name.trim().is_empty() {
            errors.push(format!("Category #{}: name is empty", i + 1));
            continue;
        }
        let Some(slug) = slug_for(&category.name, category.slug.as_deref()) else {
            errors.push(format!("Category '{}': invalid slug", category.name));
            continue;
        };
        if !category_slugs.insert(slug.to_string()) {
            errors.push(format!("Category '{}': duplicate slug '{slug}'", category.name));
            continue;
        }
        catalog.categories.push(CategoryInput {
            name: category.name.trim().to_string(),
            slug,
            description: category.description.trim().to_string(),
        });
    }

    let mut product_slugs = HashSet::new();
    for (i, product) in seed.products.iter().enumerate() {
        let label = product.name.trim();
        if label.is_empty() {
            errors.push(format!("Product #{}: name is empty", i + 1));
            continue;
        }

        let slug = slug_for(label, product.slug.as_deref());
        match &slug {
            None => errors.push(format!("Product '{label}': invalid slug")),
            Some(slug) if !product_slugs.insert(slug.to_string()) => {
                errors.push(format!("Product '{label}': duplicate slug '{slug}'"));
            }
            Some(_) => {}
        }

        let category = match product.category.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(c) if category_slugs.contains(c) => Slug::parse(c).map(Some).map_err(|_| ()),
            Some(_) => Err(()),
        };
        if category.is_err() {
            errors.push(format!(
                "Product '{label}': unknown category '{}'",
                product.category.as_deref().unwrap_or_default()
            ));
        }

        let price = rules::money(&product.price)
            .ok()
            .and_then(|()| product.price.trim().parse::<Decimal>().ok());
        if price.is_none() {
            errors.push(format!("Product '{label}': invalid price '{}'", product.price));
        }
        if product.stock < 0 {
            errors.push(format!("Product '{label}': stock cannot be negative"));
        }

        if let (Some(slug), Ok(category), Some(price)) = (slug, category, price) {
            catalog.products.push(ProductSeed {
                category,
                input: ProductInput {
                    category_id: None,
                    name: label.to_string(),
                    slug,
                    description: product.description.trim().to_string(),
                    price,
                    stock: product.stock.max(0),
                    is_published: product.published,
                    is_featured: product.featured,
                },
            });
        }
    }

    if errors.is_empty() { Ok(catalog) } else { Err(errors) }
}

/// Upsert categories and products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is invalid, or if a
/// database operation fails.
pub async fn catalog(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SeedError::Io(file_path.to_string(), e))?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;

    let catalog = match validate_catalog(&seed) {
        Ok(catalog) => catalog,
        Err(errors) => {
            error!("Catalog validation failed:");
            for err in &errors {
                error!("  - {err}");
            }
            return Err(SeedError::Invalid(errors.len()));
        }
    };
    info!(
        categories = catalog.categories.len(),
        products = catalog.products.len(),
        "Catalog validated successfully"
    );

    let pool = connect().await?;

    let categories = CategoryRepository::new(&pool);
    let mut category_ids: HashMap<String, CategoryId> = HashMap::new();
    for input in &catalog.categories {
        let category = categories.upsert_by_slug(input).await?;
        category_ids.insert(category.slug.to_string(), category.id);
    }

    let products = ProductRepository::new(&pool);
    let product_count = catalog.products.len();
    for product in catalog.products {
        let mut input = product.input;
        input.category_id = product
            .category
            .and_then(|slug| category_ids.get(slug.as_str()).copied());
        products.upsert_by_slug(&input).await?;
    }

    info!("Seeding complete!");
    info!("  Categories upserted: {}", category_ids.len());
    info!("  Products upserted: {product_count}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> CatalogSeed {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_and_validate_catalog() {
        let seed = parse(
            r#"
categories:
  - name: Mugs
  - name: Tea Towels
    slug: towels
    description: Linen
products:
  - name: Blue Mug
    category: mugs
    price: "12.50"
    stock: 20
    featured: true
  - name: Plain Towel
    category: towels
    price: "8"
    published: false
"#,
        );

        let catalog = validate_catalog(&seed).unwrap();
        assert_eq!(catalog.categories.len(), 2);
        assert_eq!(catalog.categories[1].slug.as_str(), "towels");

        let mug = &catalog.products[0];
        assert_eq!(mug.input.slug.as_str(), "blue-mug");
        assert_eq!(mug.category.as_ref().map(Slug::as_str), Some("mugs"));
        assert_eq!(mug.input.price, Decimal::new(1250, 2));
        assert!(mug.input.is_published);
        assert!(mug.input.is_featured);

        let towel = &catalog.products[1];
        assert_eq!(towel.input.stock, 0);
        assert!(!towel.input.is_published);
    }

    #[test]
    fn test_validation_collects_every_error() {
        let seed = parse(
            r#"
categories:
  - name: Mugs
  - name: mugs
products:
  - name: Mug
    category: plates
    price: "-1"
    stock: -2
  - name: ""
    price: "1"
"#,
        );

        let errors = validate_catalog(&seed).unwrap_err();
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("duplicate slug 'mugs'")));
        assert!(errors.iter().any(|e| e.contains("unknown category 'plates'")));
        assert!(errors.iter().any(|e| e.contains("invalid price")));
        assert!(errors.iter().any(|e| e.contains("stock cannot be negative")));
        assert!(errors.iter().any(|e| e.contains("Product #2: name is empty")));
    }

    #[test]
    fn test_duplicate_product_slugs_are_rejected() {
        let seed = parse(
            r#"
products:
  - name: Blue Mug
    price: "1.00"
  - name: Other
    slug: blue-mug
    price: "2.00"
"#,
        );
        let errors = validate_catalog(&seed).unwrap_err();
        assert_eq!(errors, vec!["Product 'Other': duplicate slug 'blue-mug'"]);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<CatalogSeed, _> =
            serde_yaml::from_str("products:\n  - name: A\n    price: \"1\"\n    colour: red\n");
        assert!(result.is_err());
    }
}

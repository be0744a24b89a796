//! Catalog domain types: categories and products.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{CategoryId, PageRequest, ProductId, Slug};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A category with the number of products in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    /// Products in the category (published only, unless counted for admin).
    pub product_count: i64,
}

/// Fields for creating or updating a category.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Slug,
    pub description: String,
}

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    /// Category name, joined for display.
    pub category_name: Option<String>,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    /// Unit price in the shop currency.
    pub price: Decimal,
    /// Units available to sell.
    pub stock: i32,
    /// Public URL of the product image.
    pub image_url: Option<String>,
    /// Object storage path of the image, used to delete it on replacement.
    pub image_path: Option<String>,
    pub is_published: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether at least one unit can be sold.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Whether `quantity` units can be sold.
    #[must_use]
    pub fn can_fulfill(&self, quantity: u32) -> bool {
        i64::from(self.stock) >= i64::from(quantity)
    }
}

/// Fields for creating or updating a product.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub is_published: bool,
    pub is_featured: bool,
}

/// Sort orders for the public product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    /// All sort orders, for rendering a select box.
    pub const ALL: [Self; 4] = [Self::Newest, Self::PriceAsc, Self::PriceDesc, Self::Name];

    /// The query-string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Name => "name",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::Name => "Name",
        }
    }

    /// SQL `ORDER BY` clause. Only ever built from this enum.
    pub(crate) const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Name => "p.name ASC, p.id ASC",
        }
    }
}

impl fmt::Display for ProductSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sort| sort.as_str() == s)
            .ok_or_else(|| format!("invalid sort: {s}"))
    }
}

/// Filters for the public product listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    /// Free-text search over name and description.
    pub query: Option<String>,
    /// Restrict to a category.
    pub category: Option<CategoryId>,
    pub sort: ProductSort,
    pub page: PageRequest,
}

impl ProductFilter {
    /// The search text as an `ILIKE` pattern, with wildcards escaped.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()).map(like_pattern)
    }
}

/// Build a `%term%` pattern for `ILIKE ... ESCAPE '\'`.
#[must_use]
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_round_trip() {
        for sort in ProductSort::ALL {
            assert_eq!(sort.as_str().parse::<ProductSort>().unwrap(), sort);
        }
        assert!("cheapest".parse::<ProductSort>().is_err());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("mug"), "%mug%");
        assert_eq!(like_pattern(" 50%_off "), "%50\\%\\_off%");
    }

    #[test]
    fn test_search_pattern_ignores_blank() {
        let filter = ProductFilter {
            query: Some("   ".to_string()),
            ..ProductFilter::default()
        };
        assert_eq!(filter.search_pattern(), None);
    }
}

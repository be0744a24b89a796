//! Data table component types.
//!
//! These types configure the list pages in the admin panel: the column
//! headers, the filter form above the table and the empty state. Rows are
//! rendered by each page's template.

use serde::Serialize;

use shopfront_core::OrderStatus;

/// Column definition for a data table.
#[derive(Debug, Clone, Serialize)]
pub struct TableColumn {
    /// Unique key for the column.
    pub key: String,
    /// Display label for the column header.
    pub label: String,
    /// Right-align the column (amounts and counts).
    pub numeric: bool,
}

impl TableColumn {
    /// Create a new text column.
    #[must_use]
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            numeric: false,
        }
    }

    /// Create a new right-aligned column.
    #[must_use]
    pub fn numeric(key: &str, label: &str) -> Self {
        Self {
            numeric: true,
            ..Self::new(key, label)
        }
    }
}

/// Filter type for data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Text input filter.
    Text,
    /// Single-select dropdown.
    Select,
}

/// Option for select filters.
#[derive(Debug, Clone, Serialize)]
pub struct FilterOption {
    /// Option value.
    pub value: String,
    /// Display label.
    pub label: String,
    /// Whether the option is the current filter value.
    pub selected: bool,
}

impl FilterOption {
    /// Create a new filter option.
    #[must_use]
    pub fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            selected: false,
        }
    }
}

/// Filter definition for a data table.
#[derive(Debug, Clone, Serialize)]
pub struct TableFilter {
    /// Filter parameter key.
    pub key: String,
    /// Display label.
    pub label: String,
    /// Filter type.
    pub filter_type: FilterType,
    /// Placeholder text (for text inputs).
    pub placeholder: String,
    /// Available options (for selects). The first option is "any".
    pub options: Vec<FilterOption>,
    /// Current value from the query string.
    pub value: String,
}

impl TableFilter {
    /// Create a text filter.
    #[must_use]
    pub fn text(key: &str, label: &str, placeholder: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            filter_type: FilterType::Text,
            placeholder: placeholder.to_string(),
            options: vec![],
            value: String::new(),
        }
    }

    /// Create a select filter with a leading "All" option.
    #[must_use]
    pub fn select(key: &str, label: &str, options: Vec<FilterOption>) -> Self {
        let mut all = vec![FilterOption::new("", "All")];
        all.extend(options);
        Self {
            key: key.to_string(),
            label: label.to_string(),
            filter_type: FilterType::Select,
            placeholder: String::new(),
            options: all,
            value: String::new(),
        }
    }

    /// Set the current value, selecting the matching option.
    #[must_use]
    pub fn with_value(mut self, value: &str) -> Self {
        for option in &mut self.options {
            option.selected = option.value == value;
        }
        self.value = value.to_string();
        self
    }

    #[must_use]
    pub fn is_select(&self) -> bool {
        self.filter_type == FilterType::Select
    }
}

/// Configuration for a data table.
#[derive(Debug, Clone, Serialize)]
pub struct DataTableConfig {
    /// Unique table identifier.
    pub table_id: String,
    /// Column definitions.
    pub columns: Vec<TableColumn>,
    /// Filter definitions.
    pub filters: Vec<TableFilter>,
    /// Title for empty state.
    pub empty_title: String,
    /// Description for empty state.
    pub empty_description: Option<String>,
}

impl DataTableConfig {
    /// Create a new data table configuration.
    #[must_use]
    pub fn new(table_id: &str) -> Self {
        Self {
            table_id: table_id.to_string(),
            columns: vec![],
            filters: vec![],
            empty_title: "No items found".to_string(),
            empty_description: None,
        }
    }

    /// Add a column.
    #[must_use]
    pub fn column(mut self, column: TableColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a filter.
    #[must_use]
    pub fn filter(mut self, filter: TableFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set empty state configuration.
    #[must_use]
    pub fn empty_state(mut self, title: &str, description: Option<&str>) -> Self {
        self.empty_title = title.to_string();
        self.empty_description = description.map(ToString::to_string);
        self
    }

    /// Whether the filter form is shown.
    #[must_use]
    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Whether any filter currently has a value.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        self.filters.iter().any(|f| !f.value.is_empty())
    }
}

/// Build the products table configuration.
#[must_use]
pub fn products_table_config(search: &str) -> DataTableConfig {
    DataTableConfig::new("products")
        .column(TableColumn::new("name", "Product"))
        .column(TableColumn::new("category", "Category"))
        .column(TableColumn::numeric("price", "Price"))
        .column(TableColumn::numeric("stock", "Stock"))
        .column(TableColumn::new("status", "Status"))
        .filter(TableFilter::text("q", "Search", "Name or slug").with_value(search))
        .empty_state("No products found", Some("Try a different search, or add a product."))
}

/// Build the categories table configuration.
#[must_use]
pub fn categories_table_config() -> DataTableConfig {
    DataTableConfig::new("categories")
        .column(TableColumn::new("name", "Category"))
        .column(TableColumn::new("slug", "Slug"))
        .column(TableColumn::numeric("products", "Products"))
        .empty_state("No categories yet", None)
}

/// Build the orders table configuration.
#[must_use]
pub fn orders_table_config(search: &str, status: &str) -> DataTableConfig {
    let statuses = OrderStatus::ALL
        .into_iter()
        .map(|s| FilterOption::new(s.as_str(), s.label()))
        .collect();

    DataTableConfig::new("orders")
        .column(TableColumn::new("number", "Order"))
        .column(TableColumn::new("customer", "Customer"))
        .column(TableColumn::new("status", "Status"))
        .column(TableColumn::numeric("total", "Total"))
        .column(TableColumn::new("placed", "Placed"))
        .filter(TableFilter::text("q", "Search", "Order number or email").with_value(search))
        .filter(TableFilter::select("status", "Status", statuses).with_value(status))
        .empty_state("No orders found", Some("Try adjusting your search or filters."))
}

/// Build the users table configuration.
#[must_use]
pub fn users_table_config(search: &str) -> DataTableConfig {
    DataTableConfig::new("users")
        .column(TableColumn::new("name", "Name"))
        .column(TableColumn::new("email", "Email"))
        .column(TableColumn::new("role", "Role"))
        .column(TableColumn::new("joined", "Joined"))
        .filter(TableFilter::text("q", "Search", "Name or email").with_value(search))
        .empty_state("No users found", Some("Try a different search."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_filter_marks_current_value() {
        let config = orders_table_config("", "shipped");
        let status = config
            .filters
            .iter()
            .find(|f| f.key == "status")
            .map(|f| f.options.iter().filter(|o| o.selected).collect::<Vec<_>>());

        let selected = status.unwrap_or_default();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected.first().map(|o| o.value.as_str()), Some("shipped"));
        assert!(config.is_filtered());
    }

    #[test]
    fn test_select_filter_defaults_to_all() {
        let config = orders_table_config("", "");
        let options = &config.filters[1].options;
        assert_eq!(options.len(), OrderStatus::ALL.len() + 1);
        assert!(options[0].selected);
        assert!(!config.is_filtered());
    }

    #[test]
    fn test_columns_and_filters() {
        let config = products_table_config("mug");
        assert_eq!(config.columns.len(), 5);
        assert!(config.columns.iter().any(|c| c.key == "price" && c.numeric));
        assert!(config.has_filters());
        assert_eq!(config.filters[0].value, "mug");
        assert!(!categories_table_config().has_filters());
    }
}

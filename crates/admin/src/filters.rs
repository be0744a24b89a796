//! Custom Askama template filters.

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Badge CSS class for an order status or role value.
///
/// Usage in templates: `<span class="badge {{ order.status|badge_class }}">`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn badge_class(value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(badge_for(&value.to_string()))
}

fn badge_for(value: &str) -> &'static str {
    match value {
        "pending" => "badge-warning",
        "processing" | "admin" => "badge-info",
        "shipped" => "badge-primary",
        "delivered" => "badge-success",
        "cancelled" => "badge-danger",
        _ => "badge-muted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_for_statuses() {
        assert_eq!(badge_for("delivered"), "badge-success");
        assert_eq!(badge_for("cancelled"), "badge-danger");
        assert_eq!(badge_for("customer"), "badge-muted");
    }
}

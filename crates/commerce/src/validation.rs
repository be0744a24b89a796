//! Form validation on top of the `validator` crate.
//!
//! Handlers validate a form with [`validate_form`] and, on failure, render
//! the form again with its submitted values and the [`FieldErrors`] next to
//! each input.

use std::collections::BTreeMap;

use serde::Serialize;
use validator::{Validate, ValidationErrors};

/// The first error message for each invalid field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// No errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for `field`, keeping any earlier one.
    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    /// The error for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether `field` has an error.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the errors when there is at least one.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<&ValidationErrors> for FieldErrors {
    fn from(errors: &ValidationErrors) -> Self {
        let mut fields = Self::new();
        for (field, errors) in errors.field_errors() {
            if let Some(error) = errors.first() {
                let message = error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), ToString::to_string);
                fields.insert(&field, message);
            }
        }
        fields
    }
}

/// Run the form's `validator` rules.
///
/// # Errors
///
/// Returns the per-field errors when any rule fails.
pub fn validate_form<T: Validate>(form: &T) -> Result<(), FieldErrors> {
    form.validate().map_err(|e| FieldErrors::from(&e))
}

/// Custom rules used by storefront and admin forms.
///
/// Optional fields arrive from HTML forms as empty strings, so each rule for
/// an optional value accepts blank input.
pub mod rules {
    use std::borrow::Cow;

    use validator::ValidationError;

    fn error(code: &'static str, message: &'static str) -> ValidationError {
        ValidationError::new(code).with_message(Cow::Borrowed(message))
    }

    /// Non-empty after trimming.
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(error("not_blank", "This field is required"));
        }
        Ok(())
    }

    /// Blank, or 7 to 20 digits, spaces and `+-()`.
    pub fn optional_phone(value: &str) -> Result<(), ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }
        let allowed = value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
        let len = value.chars().count();
        if !allowed || !(7..=20).contains(&len) {
            return Err(error("phone", "Enter a valid phone number"));
        }
        Ok(())
    }

    /// 2 to 12 letters, digits, spaces and hyphens.
    pub fn postal_code(value: &str) -> Result<(), ValidationError> {
        let value = value.trim();
        let allowed = value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-'));
        let len = value.chars().count();
        if !allowed || !(2..=12).contains(&len) {
            return Err(error("postal_code", "Enter a valid postal code"));
        }
        Ok(())
    }

    /// Two ASCII letters (ISO 3166-1 alpha-2), any case.
    pub fn country_code(value: &str) -> Result<(), ValidationError> {
        let value = value.trim();
        if value.len() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(error("country", "Use a two-letter country code"));
        }
        Ok(())
    }

    /// A non-negative decimal amount with at most two decimals.
    pub fn money(value: &str) -> Result<(), ValidationError> {
        let invalid = || error("money", "Enter an amount like 19.99");
        let amount: rust_decimal::Decimal = value.trim().parse().map_err(|_| invalid())?;
        if amount.is_sign_negative() || amount.scale() > 2 {
            return Err(invalid());
        }
        Ok(())
    }

    /// A whole number of at least zero.
    pub fn non_negative_integer(value: &str) -> Result<(), ValidationError> {
        match value.trim().parse::<i32>() {
            Ok(n) if n >= 0 => Ok(()),
            _ => Err(error("non_negative", "Enter a whole number of 0 or more")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;

    use super::rules::*;
    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    struct SampleForm {
        #[validate(custom(function = "not_blank"))]
        name: String,
        #[validate(email(message = "Enter a valid email address"))]
        email: String,
        #[validate(custom(function = "optional_phone"))]
        phone: String,
    }

    #[test]
    fn test_phone_rule() {
        assert!(optional_phone("").is_ok());
        assert!(optional_phone("+1 (555) 010-2030").is_ok());
        assert!(optional_phone("12345").is_err());
        assert!(optional_phone("call me maybe").is_err());
        assert!(optional_phone("123456789012345678901").is_err());
    }

    #[test]
    fn test_postal_code_rule() {
        assert!(postal_code("SW1A 1AA").is_ok());
        assert!(postal_code("10115").is_ok());
        assert!(postal_code("1").is_err());
        assert!(postal_code("12345_678").is_err());
        assert!(postal_code("1234567890123").is_err());
    }

    #[test]
    fn test_country_rule() {
        assert!(country_code("us").is_ok());
        assert!(country_code("DE").is_ok());
        assert!(country_code("USA").is_err());
        assert!(country_code("1A").is_err());
    }

    #[test]
    fn test_money_rule() {
        assert!(money("0").is_ok());
        assert!(money("19.99").is_ok());
        assert!(money("-1").is_err());
        assert!(money("1.999").is_err());
        assert!(money("ten").is_err());
    }

    #[test]
    fn test_non_negative_integer_rule() {
        assert!(non_negative_integer("0").is_ok());
        assert!(non_negative_integer(" 12 ").is_ok());
        assert!(non_negative_integer("-3").is_err());
        assert!(non_negative_integer("2.5").is_err());
    }

    #[test]
    fn test_validate_form_collects_messages_per_field() {
        let form = SampleForm {
            name: "  ".to_string(),
            email: "nope".to_string(),
            phone: String::new(),
        };
        let errors = validate_form(&form).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("name"), Some("This field is required"));
        assert_eq!(errors.get("email"), Some("Enter a valid email address"));
        assert!(!errors.has("phone"));
    }

    #[test]
    fn test_insert_keeps_first_message() {
        let mut errors = FieldErrors::new();
        errors.insert("email", "first");
        errors.insert("email", "second");
        assert_eq!(errors.get("email"), Some("first"));
        assert!(errors.into_result().is_err());
        assert!(FieldErrors::new().into_result().is_ok());
    }
}

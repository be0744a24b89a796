//! Core domain types.

mod email;
mod id;
mod pagination;
mod price;
mod slug;
mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use pagination::{Page, PageRequest};
pub use price::{CurrencyCode, Price, PriceError};
pub use slug::{MAX_SLUG_LEN, Slug, SlugError};
pub use status::{OrderStatus, ParseStatusError, PaymentMethod, UserRole};

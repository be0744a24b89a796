//! Domain models shared by the storefront and admin.
//!
//! These types represent validated domain objects separate from database row
//! types. Catalog types are `Serialize + Deserialize` so they can be cached.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod user;

pub use cart::CartLine;
pub use catalog::{
    Category, CategoryInput, CategorySummary, Product, ProductFilter, ProductInput, ProductSort,
};
pub use order::{
    DashboardStats, NewOrder, NewOrderLine, Order, OrderDetail, OrderItem, ShippingAddress,
    StatusCount,
};
pub use user::User;

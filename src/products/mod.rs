//! The products resource: types, cache keys, validation and the cached store.

mod keys;
mod store;
mod types;
mod validation;

pub use keys::ProductQueryKey;
pub use store::{ProductError, ProductStore};
pub use types::{CreateProduct, Product, UpdateProduct};
pub use validation::{validate_name, ValidationError, NAME_MAX_LENGTH, NAME_MIN_LENGTH};

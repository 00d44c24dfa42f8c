use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::Resource;
use crate::mutation::CORRELATION_PREFIX;

/// A product as returned by the API.
///
/// Fields beyond `id` and `name` are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  pub id: String,
  pub name: String,
  #[serde(flatten, default)]
  pub extra: Map<String, Value>,
}

impl Product {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      extra: Map::new(),
    }
  }

  /// Whether this is an optimistic placeholder not yet confirmed by the server
  pub fn is_pending(&self) -> bool {
    self.id.starts_with(CORRELATION_PREFIX)
  }
}

/// Request body for creating a product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateProduct {
  pub name: String,
}

impl CreateProduct {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }
}

/// Request body for updating a product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateProduct {
  pub id: String,
  pub name: String,
}

impl UpdateProduct {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
    }
  }
}

impl Resource for Product {
  type Draft = CreateProduct;
  type Patch = UpdateProduct;

  fn id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "products"
  }

  fn placeholder(token: &str, draft: &CreateProduct) -> Self {
    Product::new(token, draft.name.clone())
  }

  fn patch_target(patch: &UpdateProduct) -> &str {
    &patch.id
  }

  fn apply_patch(&mut self, patch: &UpdateProduct) {
    self.name = patch.name.clone();
  }
}

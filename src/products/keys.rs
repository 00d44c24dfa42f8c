//! Cache keys for product queries.

use crate::cache::{QueryKey, Resource};

use super::types::Product;

/// Query key types for product list reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProductQueryKey {
  /// The full product list
  List,
  /// Products whose name contains a term
  Search { term: String },
}

impl ProductQueryKey {
  /// Key for a search term; a blank term means the full list.
  pub fn search(term: &str) -> Self {
    let term = normalize_term(term);
    if term.is_empty() {
      Self::List
    } else {
      Self::Search { term }
    }
  }

  /// Cache key prefix shared by every search key.
  pub fn search_prefix() -> String {
    format!("{}?q=", Product::entity_type())
  }

  /// Query string to send to the server, if any.
  pub fn term(&self) -> Option<&str> {
    match self {
      Self::List => None,
      Self::Search { term } => Some(term),
    }
  }
}

impl QueryKey for ProductQueryKey {
  fn cache_key(&self) -> String {
    match self {
      Self::List => Product::entity_type().to_string(),
      Self::Search { term } => format!("{}{}", Self::search_prefix(), term),
    }
  }

  fn description(&self) -> String {
    match self {
      Self::List => "all products".to_string(),
      Self::Search { term } => format!("products matching '{}'", term),
    }
  }
}

/// Normalize a search term for consistent keys.
/// The server matches case-insensitively, so keys do too.
fn normalize_term(term: &str) -> String {
  term.trim().to_lowercase()
}

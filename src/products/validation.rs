//! Client-side checks run before a product mutation is dispatched.

pub const NAME_MIN_LENGTH: usize = 3;
pub const NAME_MAX_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
  #[error("name must be at least {min} characters")]
  NameTooShort { min: usize },

  #[error("name must be at most {max} characters")]
  NameTooLong { max: usize },
}

/// Validate and normalize a product name.
///
/// Surrounding whitespace is trimmed; length is counted in characters.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
  let name = name.trim();
  let len = name.chars().count();

  if len < NAME_MIN_LENGTH {
    return Err(ValidationError::NameTooShort {
      min: NAME_MIN_LENGTH,
    });
  }
  if len > NAME_MAX_LENGTH {
    return Err(ValidationError::NameTooLong {
      max: NAME_MAX_LENGTH,
    });
  }

  Ok(name.to_string())
}

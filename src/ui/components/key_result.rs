/// Generic result type for component key handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Key was consumed, no event for parent to handle
  Handled,
  /// Key was consumed, here's an event for parent to process
  Event(T),
  /// Key was not consumed, parent should try next handler
  NotHandled,
}

impl<T> KeyResult<T> {
  pub fn map_event<U>(self, f: impl FnOnce(T) -> U) -> KeyResult<U> {
    match self {
      Self::Handled => KeyResult::Handled,
      Self::Event(event) => KeyResult::Event(f(event)),
      Self::NotHandled => KeyResult::NotHandled,
    }
  }
}

use ratatui::widgets::ListState;

/// Truncate a string to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Keep the selection inside a list of `len` items
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    None => state.select(Some(0)),
    Some(i) if i >= len => state.select(Some(len - 1)),
    Some(_) => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_counts_characters() {
    assert_eq!(truncate("ääääää", 5), "ää...");
  }

  #[test]
  fn test_selection_clamped_after_shrink() {
    let mut state = ListState::default();
    state.select(Some(4));
    ensure_valid_selection(&mut state, 2);
    assert_eq!(state.selected(), Some(1));

    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);

    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(0));
  }
}

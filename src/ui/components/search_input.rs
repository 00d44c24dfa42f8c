use super::prompt::{Prompt, PromptEvent};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use std::time::{Duration, Instant};

/// Delay between the last keystroke and the search being applied
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Search overlay that applies its term after typing pauses
#[derive(Debug, Clone)]
pub struct SearchInput {
  prompt: Prompt,
  /// Term waiting for the debounce to elapse
  pending: Option<(String, Instant)>,
  /// Term currently in effect
  applied: String,
}

impl SearchInput {
  pub fn new() -> Self {
    Self {
      prompt: Prompt::new("/", Color::Yellow),
      pending: None,
      applied: String::new(),
    }
  }

  pub fn is_active(&self) -> bool {
    self.prompt.is_active()
  }

  /// Term currently in effect
  pub fn applied(&self) -> &str {
    &self.applied
  }

  /// Handle a key event. Call this regardless of active state; `/` opens it.
  ///
  /// Emits the new term when it takes effect immediately (Enter or Esc).
  pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> KeyResult<String> {
    if !self.prompt.is_active() {
      if key.code == KeyCode::Char('/') {
        let current = self.applied.clone();
        self.prompt.open("Search", &current);
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Changed(term)) => {
        self.pending = Some((term, now));
        KeyResult::Handled
      }
      KeyResult::Event(PromptEvent::Submitted(term)) => self.apply(term),
      KeyResult::Event(PromptEvent::Cancelled) => self.apply(String::new()),
      other => other.map_event(|_| String::new()),
    }
  }

  /// Return the pending term once the debounce has elapsed
  pub fn poll(&mut self, now: Instant) -> Option<String> {
    match &self.pending {
      Some((_, at)) if now.duration_since(*at) >= SEARCH_DEBOUNCE => {
        let (term, _) = self.pending.take()?;
        match self.apply(term) {
          KeyResult::Event(term) => Some(term),
          _ => None,
        }
      }
      _ => None,
    }
  }

  fn apply(&mut self, term: String) -> KeyResult<String> {
    self.pending = None;
    if term == self.applied {
      return KeyResult::Handled;
    }
    self.applied = term.clone();
    KeyResult::Event(term)
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    self.prompt.render_overlay(frame, area);
  }
}

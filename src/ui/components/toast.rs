use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// How long a toast stays on screen
pub const TOAST_DURATION: Duration = Duration::from_secs(3);

const MAX_VISIBLE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
  Success,
  Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
  pub message: String,
  pub level: ToastLevel,
  shown_at: Instant,
}

/// Stack of transient notifications drawn in the top-right corner
#[derive(Debug, Default)]
pub struct Toasts {
  items: VecDeque<Toast>,
}

impl Toasts {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, level: ToastLevel, message: impl Into<String>, now: Instant) {
    self.items.push_back(Toast {
      message: message.into(),
      level,
      shown_at: now,
    });
    while self.items.len() > MAX_VISIBLE {
      self.items.pop_front();
    }
  }

  /// Drop toasts older than `TOAST_DURATION`. Returns whether any were dropped.
  pub fn expire(&mut self, now: Instant) -> bool {
    let before = self.items.len();
    self
      .items
      .retain(|toast| now.duration_since(toast.shown_at) < TOAST_DURATION);
    self.items.len() != before
  }

  pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Toast> {
    self.items.iter()
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let width = area.width.min(40);
    let mut y = area.y + 1;

    for toast in self.iter().rev() {
      let height = 3;
      if y + height > area.y + area.height {
        break;
      }
      let toast_area = Rect::new(area.x + area.width - width, y, width, height);
      let color = match toast.level {
        ToastLevel::Success => Color::Green,
        ToastLevel::Error => Color::Red,
      };

      frame.render_widget(Clear, toast_area);
      let paragraph = Paragraph::new(toast.message.as_str())
        .wrap(Wrap { trim: true })
        .block(
          Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color)),
        );
      frame.render_widget(paragraph, toast_area);
      y += height;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_toasts_expire_after_duration() {
    let start = Instant::now();
    let mut toasts = Toasts::new();
    toasts.push(ToastLevel::Success, "Product created", start);

    assert!(!toasts.expire(start + Duration::from_secs(2)));
    assert_eq!(toasts.iter().count(), 1);
    assert!(toasts.expire(start + TOAST_DURATION));
    assert_eq!(toasts.iter().count(), 0);
  }

  #[test]
  fn test_oldest_toast_dropped_when_full() {
    let now = Instant::now();
    let mut toasts = Toasts::new();
    for i in 0..4 {
      toasts.push(ToastLevel::Error, format!("error {}", i), now);
    }

    let messages: Vec<_> = toasts.iter().map(|t| t.message.as_str()).collect();
    assert_eq!(messages, vec!["error 1", "error 2", "error 3"]);
  }

  #[test]
  fn test_newest_toast_drawn_first() {
    let now = Instant::now();
    let mut toasts = Toasts::new();
    toasts.push(ToastLevel::Success, "Product created", now);
    toasts.push(ToastLevel::Error, "Not found", now);

    let newest = toasts.iter().rev().next().map(|t| t.message.as_str());
    assert_eq!(newest, Some("Not found"));
  }
}

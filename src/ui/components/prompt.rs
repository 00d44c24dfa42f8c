use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by an active prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
  /// Text changed (emitted on each edit)
  Changed(String),
  /// Enter pressed; the prompt closes
  Submitted(String),
  /// Escape pressed; the prompt closes and its text is discarded
  Cancelled,
}

/// One-line input shown as an overlay at the top of the content area
#[derive(Debug, Clone)]
pub struct Prompt {
  input: TextInput,
  title: String,
  prefix: &'static str,
  color: Color,
  active: bool,
}

impl Prompt {
  pub fn new(prefix: &'static str, color: Color) -> Self {
    Self {
      input: TextInput::new(),
      title: String::new(),
      prefix,
      color,
      active: false,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open the prompt with a title and initial text
  pub fn open(&mut self, title: impl Into<String>, initial: &str) {
    self.title = title.into();
    self.input.set_value(initial);
    self.active = true;
  }

  pub fn close(&mut self) {
    self.active = false;
    self.input.clear();
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(value) => {
        self.close();
        KeyResult::Event(PromptEvent::Submitted(value))
      }
      InputResult::Cancelled => {
        self.close();
        KeyResult::Event(PromptEvent::Cancelled)
      }
      InputResult::Consumed => KeyResult::Event(PromptEvent::Changed(self.input.value())),
      // Swallow everything else while open
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, 3).intersection(area);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(self.color))
      .title(format!(" {} ", self.title));

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let (before, after) = self.input.split_at_cursor();
    let line = Line::from(vec![
      Span::styled(self.prefix, Style::default().fg(self.color)),
      Span::raw(before),
      Span::styled("_", Style::default().fg(self.color)),
      Span::raw(after),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::{KeyCode, KeyModifiers};

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_inactive_prompt_ignores_keys() {
    let mut prompt = Prompt::new("> ", Color::Green);
    assert_eq!(
      prompt.handle_key(key(KeyCode::Char('a'))),
      KeyResult::NotHandled
    );
  }

  #[test]
  fn test_submit_closes_with_value() {
    let mut prompt = Prompt::new("> ", Color::Green);
    prompt.open("Rename", "Lamp");
    prompt.handle_key(key(KeyCode::Char('s')));

    assert_eq!(
      prompt.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(PromptEvent::Submitted("Lamps".into()))
    );
    assert!(!prompt.is_active());

    prompt.open("Rename", "");
    assert_eq!(
      prompt.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(PromptEvent::Submitted(String::new()))
    );
  }

  #[test]
  fn test_cancel_discards_text() {
    let mut prompt = Prompt::new("> ", Color::Green);
    prompt.open("Add", "");
    prompt.handle_key(key(KeyCode::Char('x')));

    assert_eq!(
      prompt.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(PromptEvent::Cancelled)
    );
    assert!(!prompt.is_active());
  }

  #[test]
  fn test_open_prompt_swallows_unhandled_keys() {
    let mut prompt = Prompt::new("> ", Color::Green);
    prompt.open("Add", "");
    assert_eq!(prompt.handle_key(key(KeyCode::F(5))), KeyResult::Handled);
  }
}

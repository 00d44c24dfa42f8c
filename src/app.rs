use crate::event::{Event, EventHandler, MutationOutcome};
use crate::ui;
use crate::ui::components::{ToastLevel, Toasts};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::ProductListView;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use prodq::config::Config;
use prodq::mutation::MutationKind;
use prodq::products::{ProductError, ProductStore};
use prodq::remote::ClientError;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::{Duration, Instant};
use tracing::info;

/// Main application state
pub struct App {
  config: Config,
  events: EventHandler,
  view: Box<dyn View>,
  toasts: Toasts,
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, search: Option<&str>) -> Result<Self> {
    let store = ProductStore::from_config(&config)?;
    let events = EventHandler::new(Duration::from_millis(100));
    let view = ProductListView::new(store, events.sender(), search);

    Ok(Self {
      config,
      events,
      view: Box::new(view),
      toasts: Toasts::new(),
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    info!(api = %self.config.api.base_url, "starting");

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Restore the terminal even if the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match self.events.next().await {
        Some(event) => self.handle_event(event, Instant::now()),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event, now: Instant) {
    match event {
      Event::Key(key) => self.handle_key(key, now),
      Event::Tick => {
        self.toasts.expire(now);
        self.view.tick(now);
      }
      Event::Cache(event) => self.view.on_cache_event(&event),
      Event::Mutated(outcome) => {
        if let Some((level, message)) = outcome_toast(&outcome) {
          self.toasts.push(level, message, now);
        }
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent, now: Instant) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    match self.view.handle_key(key, now) {
      ViewAction::None => {}
      ViewAction::Notify(level, message) => self.toasts.push(level, message, now),
      ViewAction::Quit => self.should_quit = true,
    }
  }

  // Accessors for UI rendering
  pub fn view_mut(&mut self) -> &mut dyn View {
    self.view.as_mut()
  }

  pub fn toasts(&self) -> &Toasts {
    &self.toasts
  }

  pub fn api_url(&self) -> &str {
    &self.config.api.base_url
  }
}

/// Toast for a settled mutation, if it warrants one.
///
/// Server messages are shown as-is; other failures get a generic prefix.
fn outcome_toast(outcome: &MutationOutcome) -> Option<(ToastLevel, String)> {
  match &outcome.result {
    Ok(()) => match outcome.kind {
      MutationKind::Create => Some((ToastLevel::Success, "Product created".to_string())),
      MutationKind::Update => Some((ToastLevel::Success, "Product updated".to_string())),
      MutationKind::Delete => None,
    },
    Err(ProductError::Validation(e)) => Some((ToastLevel::Error, format!("Invalid name: {}", e))),
    Err(ProductError::Client(ClientError::Remote { message, .. })) => {
      Some((ToastLevel::Error, message.clone()))
    }
    Err(ProductError::Client(e)) => Some((
      ToastLevel::Error,
      format!("Failed to {} product: {}", outcome.kind, e),
    )),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use prodq::products::ValidationError;

  fn outcome(kind: MutationKind, result: Result<(), ProductError>) -> MutationOutcome {
    MutationOutcome { kind, result }
  }

  #[test]
  fn test_success_toasts() {
    assert_eq!(
      outcome_toast(&outcome(MutationKind::Create, Ok(()))),
      Some((ToastLevel::Success, "Product created".to_string()))
    );
    assert_eq!(outcome_toast(&outcome(MutationKind::Delete, Ok(()))), None);
  }

  #[test]
  fn test_server_message_is_shown() {
    let err = ProductError::Client(ClientError::Remote {
      status: 404,
      message: "Not found".into(),
    });
    assert_eq!(
      outcome_toast(&outcome(MutationKind::Delete, Err(err))),
      Some((ToastLevel::Error, "Not found".to_string()))
    );
  }

  #[test]
  fn test_transport_failure_names_the_operation() {
    let err = ProductError::Client(ClientError::Network {
      message: "connection refused".into(),
    });
    let (level, message) = outcome_toast(&outcome(MutationKind::Update, Err(err))).unwrap();
    assert_eq!(level, ToastLevel::Error);
    assert_eq!(
      message,
      "Failed to update product: network error: connection refused"
    );
  }

  #[test]
  fn test_validation_failure() {
    let err = ProductError::Validation(ValidationError::NameTooShort { min: 3 });
    assert_eq!(
      outcome_toast(&outcome(MutationKind::Create, Err(err))),
      Some((
        ToastLevel::Error,
        "Invalid name: name must be at least 3 characters".to_string()
      ))
    );
  }
}

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use prodq::cache::CacheEvent;
use prodq::mutation::MutationKind;
use prodq::products::ProductError;
use std::time::Duration;
use tokio::sync::mpsc;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for debounce and toast expiry
  Tick,
  /// Forwarded from a cache subscription
  Cache(CacheEvent),
  /// A mutation started from the UI has settled
  Mutated(MutationOutcome),
}

/// What the UI needs to know about a settled mutation.
#[derive(Debug)]
pub struct MutationOutcome {
  pub kind: MutationKind,
  pub result: Result<(), ProductError>,
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let input_tx = tx.clone();

    // crossterm polling blocks, so keep it off the async workers
    tokio::task::spawn_blocking(move || loop {
      if event::poll(tick_rate).unwrap_or(false) {
        if let Ok(CrosstermEvent::Key(key)) = event::read() {
          if input_tx.send(Event::Key(key)).is_err() {
            break;
          }
        }
      } else if input_tx.send(Event::Tick).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Sender for async tasks and cache listeners
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

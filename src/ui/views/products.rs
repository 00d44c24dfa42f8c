use crossterm::event::{KeyCode, KeyEvent};
use prodq::cache::{CacheEntry, CacheEvent, CacheEventKind, FetchStatus, QueryKey, Subscription};
use prodq::mutation::MutationKind;
use prodq::products::{Product, ProductError, ProductQueryKey, ProductStore};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use std::future::Future;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;

use crate::event::{Event, MutationOutcome};
use crate::ui::components::{KeyResult, Prompt, PromptEvent, SearchInput, ToastLevel};
use crate::ui::renderfns::{ensure_valid_selection, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// Shown in place of the list when the first load fails
pub const LOAD_FAILED_MESSAGE: &str = "Failed to fetch products. Press 'r' to retry.";

/// What the open prompt will do on submit
#[derive(Debug, Clone, PartialEq, Eq)]
enum Edit {
  Add,
  Rename { id: String },
}

/// Product list with search and inline add/rename/delete
pub struct ProductListView {
  store: ProductStore,
  tx: mpsc::UnboundedSender<Event>,
  key: ProductQueryKey,
  /// Last cache snapshot for `key`
  entry: Option<CacheEntry<Product>>,
  subscription: Option<Subscription>,
  list_state: ListState,
  search: SearchInput,
  prompt: Prompt,
  edit: Option<Edit>,
}

impl ProductListView {
  pub fn new(store: ProductStore, tx: mpsc::UnboundedSender<Event>, search: Option<&str>) -> Self {
    let mut view = Self {
      store,
      tx,
      key: ProductQueryKey::List,
      entry: None,
      subscription: None,
      list_state: ListState::default(),
      search: SearchInput::new(),
      prompt: Prompt::new("> ", Color::Green),
      edit: None,
    };
    view.switch_to(ProductQueryKey::search(search.unwrap_or_default()));
    view
  }

  /// Point the view at another query, dropping interest in the old one.
  fn switch_to(&mut self, key: ProductQueryKey) {
    if self.subscription.is_some() && key == self.key {
      return;
    }
    if self.subscription.take().is_some() {
      self.store.cache().cancel(&self.key.cache_key());
    }
    debug!(query = %key.description(), "switching product query");

    let tx = self.tx.clone();
    self.subscription = Some(self.store.subscribe(&key, move |event| {
      let _ = tx.send(Event::Cache(event.clone()));
    }));
    self.key = key;
    self.list_state.select(Some(0));
    self.sync();
    self.load();
  }

  fn sync(&mut self) {
    self.entry = self.store.entry(&self.key);
  }

  /// Read the current key in the background; failures land on the entry.
  fn load(&self) {
    let store = self.store.clone();
    let key = self.key.clone();
    tokio::spawn(async move {
      if let Err(e) = store.fetch(&key).await {
        debug!(query = %key.description(), error = %e, "product fetch did not complete");
      }
    });
  }

  fn refresh(&self) {
    let store = self.store.clone();
    let key = self.key.clone();
    tokio::spawn(async move {
      if let Err(e) = store.refresh(&key).await {
        debug!(query = %key.description(), error = %e, "product refresh did not complete");
      }
    });
  }

  fn spawn_mutation<F, Fut, T>(&self, kind: MutationKind, op: F)
  where
    F: FnOnce(ProductStore) -> Fut,
    Fut: Future<Output = Result<T, ProductError>> + Send + 'static,
  {
    let tx = self.tx.clone();
    let pending = op(self.store.clone());
    tokio::spawn(async move {
      let result = pending.await.map(|_| ());
      let _ = tx.send(Event::Mutated(MutationOutcome { kind, result }));
    });
  }

  fn items(&self) -> &[Product] {
    self.entry.as_ref().map(|e| e.items()).unwrap_or(&[])
  }

  fn selected(&self) -> Option<&Product> {
    self.list_state.selected().and_then(|i| self.items().get(i))
  }

  /// The selected product, unless it is still waiting for the server.
  fn selected_confirmed(&self) -> Result<&Product, ViewAction> {
    match self.selected() {
      Some(product) if product.is_pending() => Err(ViewAction::Notify(
        ToastLevel::Error,
        "Product is still being saved".to_string(),
      )),
      Some(product) => Ok(product),
      None => Err(ViewAction::None),
    }
  }

  fn is_loading(&self) -> bool {
    match &self.entry {
      None => true,
      Some(entry) => entry.value.is_none() && entry.status != FetchStatus::Error,
    }
  }

  fn first_load_failed(&self) -> bool {
    self
      .entry
      .as_ref()
      .map(|e| e.value.is_none() && e.status == FetchStatus::Error)
      .unwrap_or(false)
  }

  fn submit(&mut self, value: String) {
    match self.edit.take() {
      Some(Edit::Add) => {
        self.spawn_mutation(MutationKind::Create, move |store| async move {
          store.create(&value).await
        });
      }
      Some(Edit::Rename { id }) => {
        self.spawn_mutation(MutationKind::Update, move |store| async move {
          store.rename(&id, &value).await
        });
      }
      None => {}
    }
  }

  fn handle_normal_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('a') => {
        self.edit = Some(Edit::Add);
        self.prompt.open("New product", "");
      }
      KeyCode::Char('e') => match self.selected_confirmed() {
        Ok(product) => {
          let (id, name) = (product.id.clone(), product.name.clone());
          self.edit = Some(Edit::Rename { id });
          self.prompt.open("Rename product", &name);
        }
        Err(action) => return action,
      },
      KeyCode::Char('d') => match self.selected_confirmed() {
        Ok(product) => {
          let id = product.id.clone();
          self.spawn_mutation(MutationKind::Delete, move |store| async move {
            store.delete(&id).await
          });
        }
        Err(action) => return action,
      },
      KeyCode::Char('q') => return ViewAction::Quit,
      _ => {}
    }
    ViewAction::None
  }

  fn title_line(&self) -> String {
    let label = match &self.key {
      ProductQueryKey::List => "Products".to_string(),
      ProductQueryKey::Search { term } => format!("Products /{}", term),
    };
    let Some(entry) = &self.entry else {
      return format!(" {} (loading...) ", label);
    };
    match (entry.status, &entry.value) {
      (FetchStatus::Error, Some(_)) => format!(" {} (refresh failed) ", label),
      (FetchStatus::Fetching, Some(items)) => format!(" {} ({}, refreshing...) ", label, items.len()),
      (_, None) if entry.status != FetchStatus::Error => format!(" {} (loading...) ", label),
      _ => format!(" {} ({}) ", label, self.items().len()),
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.items().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = Block::default()
      .title(self.title_line())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if self.items().is_empty() {
      let content = if self.is_loading() {
        "Loading products..."
      } else if self.first_load_failed() {
        LOAD_FAILED_MESSAGE
      } else if self.key.term().is_some() {
        "No products match this search."
      } else {
        "No products yet. Press 'a' to add one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let name_width = area.width.saturating_sub(20) as usize;
    let items: Vec<ListItem> = self
      .items()
      .iter()
      .map(|product| {
        let id = if product.is_pending() {
          Span::styled(
            format!("{:<10}", "saving"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
          )
        } else {
          Span::styled(
            format!("{:<10}", truncate(&product.id, 10)),
            Style::default().fg(Color::Cyan),
          )
        };
        ListItem::new(Line::from(vec![
          id,
          Span::raw(" "),
          Span::raw(truncate(&product.name, name_width.max(10))),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for ProductListView {
  fn handle_key(&mut self, key: KeyEvent, now: Instant) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(value)) => {
        self.submit(value);
        return ViewAction::None;
      }
      KeyResult::Event(PromptEvent::Cancelled) => {
        self.edit = None;
        return ViewAction::None;
      }
      KeyResult::Event(PromptEvent::Changed(_)) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match self.search.handle_key(key, now) {
      KeyResult::Event(term) => {
        self.switch_to(ProductQueryKey::search(&term));
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    self.handle_normal_key(key)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.search.render_overlay(frame, area);
    self.prompt.render_overlay(frame, area);
  }

  fn title(&self) -> String {
    self.key.description()
  }

  fn status(&self) -> String {
    let saving = self
      .store
      .entry(&ProductQueryKey::List)
      .map(|e| e.in_flight_mutations.len())
      .unwrap_or(0);
    match (self.items().len(), saving) {
      (n, 0) => format!("{} products", n),
      (n, saving) => format!("{} products, {} saving", n, saving),
    }
  }

  fn on_cache_event(&mut self, event: &CacheEvent) {
    // Events queued before a query switch may still arrive
    if event.key != self.key.cache_key() {
      return;
    }
    self.sync();
    if event.kind == CacheEventKind::Invalidated {
      self.load();
    }
  }

  fn tick(&mut self, now: Instant) {
    if let Some(term) = self.search.poll(now) {
      self.switch_to(ProductQueryKey::search(&term));
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new("a", "add").with_priority(10),
      ShortcutInfo::new("e", "rename").with_priority(20),
      ShortcutInfo::new("d", "delete").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("/", "search").with_priority(50),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ];
    shortcuts.sort_by_key(|s| s.priority);
    shortcuts
  }
}

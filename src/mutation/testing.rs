//! In-process remote whose mutation calls wait for the test to answer them.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

pub(crate) use super::state::Settled;
use crate::products::{CreateProduct, Product, UpdateProduct};
use crate::remote::{ClientError, ClientResult, Deleted, RemoteResource};

/// A mutation call parked until `respond` is called.
pub(crate) struct PendingCall {
  pub operation: &'static str,
  reply: oneshot::Sender<ClientResult<Settled<Product>>>,
}

impl PendingCall {
  pub fn respond(self, result: ClientResult<Settled<Product>>) {
    let _ = self.reply.send(result);
  }
}

pub(crate) struct FakeRemote {
  calls_tx: mpsc::UnboundedSender<PendingCall>,
  calls_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PendingCall>>,
  list_items: Mutex<Vec<Product>>,
  list_calls: AtomicUsize,
}

impl FakeRemote {
  pub fn new() -> Self {
    let (calls_tx, calls_rx) = mpsc::unbounded_channel();
    Self {
      calls_tx,
      calls_rx: tokio::sync::Mutex::new(calls_rx),
      list_items: Mutex::new(Vec::new()),
      list_calls: AtomicUsize::new(0),
    }
  }

  pub fn with_items(items: Vec<Product>) -> Self {
    let remote = Self::new();
    *remote.list_items.lock().unwrap() = items;
    remote
  }

  pub fn set_items(&self, items: Vec<Product>) {
    *self.list_items.lock().unwrap() = items;
  }

  pub fn list_calls(&self) -> usize {
    self.list_calls.load(Ordering::SeqCst)
  }

  /// Wait for the next mutation call to arrive.
  pub async fn next_call(&self) -> PendingCall {
    self
      .calls_rx
      .lock()
      .await
      .recv()
      .await
      .expect("fake remote channel closed")
  }

  async fn park(&self, operation: &'static str) -> ClientResult<Settled<Product>> {
    let (reply, rx) = oneshot::channel();
    self
      .calls_tx
      .send(PendingCall { operation, reply })
      .expect("fake remote channel closed");
    rx.await.unwrap_or(Err(ClientError::Cancelled))
  }
}

fn wrong_reply(operation: &str) -> ClientError {
  ClientError::Decode {
    message: format!("test answered {} with the wrong kind of result", operation),
  }
}

#[async_trait]
impl RemoteResource<Product> for FakeRemote {
  async fn list(&self, query: Option<&str>) -> ClientResult<Vec<Product>> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let items = self.list_items.lock().unwrap().clone();
    Ok(match query {
      Some(q) => {
        let q = q.to_lowercase();
        items
          .into_iter()
          .filter(|p| p.name.to_lowercase().contains(&q))
          .collect()
      }
      None => items,
    })
  }

  async fn get(&self, id: &str) -> ClientResult<Product> {
    self
      .list_items
      .lock()
      .unwrap()
      .iter()
      .find(|p| p.id == id)
      .cloned()
      .ok_or(ClientError::Remote {
        status: 404,
        message: "Not found".into(),
      })
  }

  async fn create(&self, _draft: &CreateProduct) -> ClientResult<Product> {
    match self.park("create").await? {
      Settled::Item(item) => Ok(item),
      Settled::Deleted { .. } => Err(wrong_reply("create")),
    }
  }

  async fn update(&self, _patch: &UpdateProduct) -> ClientResult<Product> {
    match self.park("update").await? {
      Settled::Item(item) => Ok(item),
      Settled::Deleted { .. } => Err(wrong_reply("update")),
    }
  }

  async fn delete(&self, _id: &str) -> ClientResult<Deleted> {
    match self.park("delete").await? {
      Settled::Deleted { id } => Ok(Deleted { id }),
      Settled::Item(_) => Err(wrong_reply("delete")),
    }
  }
}

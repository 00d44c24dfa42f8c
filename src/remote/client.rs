use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::{ClientError, ClientResult};
use crate::cache::Resource;

/// Body returned by a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
  pub id: String,
}

/// Error body sent by the server with non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
  message: String,
}

/// CRUD transport for one resource type.
///
/// Implementations never cache and never retry; every failure is returned to
/// the caller.
#[async_trait]
pub trait RemoteResource<T: Resource>: Send + Sync + 'static {
  /// List all items, or those whose name matches `query`.
  async fn list(&self, query: Option<&str>) -> ClientResult<Vec<T>>;

  /// Get a single item by id.
  async fn get(&self, id: &str) -> ClientResult<T>;

  async fn create(&self, draft: &T::Draft) -> ClientResult<T>;

  async fn update(&self, patch: &T::Patch) -> ClientResult<T>;

  async fn delete(&self, id: &str) -> ClientResult<Deleted>;
}

/// REST client for a resource collection at `{base_url}/{entity_type}`.
pub struct HttpResourceClient<T> {
  client: reqwest::Client,
  base_url: Url,
  timeout: Duration,
  _resource: PhantomData<fn() -> T>,
}

impl<T: Resource> HttpResourceClient<T> {
  pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
    let base_url = Url::parse(base_url).map_err(|e| ClientError::Config {
      message: format!("invalid base URL {}: {}", base_url, e),
    })?;
    if base_url.cannot_be_a_base() {
      return Err(ClientError::Config {
        message: format!("base URL cannot hold paths: {}", base_url),
      });
    }

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("prodq/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| ClientError::Config {
        message: format!("failed to build HTTP client: {}", e),
      })?;

    Ok(Self {
      client,
      base_url,
      timeout,
      _resource: PhantomData,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn url(&self, id: Option<&str>) -> Url {
    let mut url = self.base_url.clone();
    // cannot_be_a_base was rejected in new()
    if let Ok(mut segments) = url.path_segments_mut() {
      segments.pop_if_empty().push(T::entity_type());
      if let Some(id) = id {
        segments.push(id);
      }
    }
    url
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    debug!(%method, %url, "sending request");
    self.client.request(method, url)
  }

  async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<R> {
    let response = request
      .send()
      .await
      .map_err(|e| ClientError::from_transport(e, self.timeout))?;

    let status = response.status();
    debug!(status = status.as_u16(), "received response");

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(remote_error(status, &body));
    }

    response
      .json::<R>()
      .await
      .map_err(|e| ClientError::from_transport(e, self.timeout))
  }
}

/// Build a `Remote` error from a non-2xx response, preferring the server's
/// `{message}` body.
fn remote_error(status: StatusCode, body: &str) -> ClientError {
  let message = serde_json::from_str::<ErrorBody>(body)
    .map(|b| b.message)
    .ok()
    .or_else(|| {
      let trimmed = body.trim();
      (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
    .unwrap_or_else(|| {
      status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
    });

  ClientError::Remote {
    status: status.as_u16(),
    message,
  }
}

#[async_trait]
impl<T: Resource> RemoteResource<T> for HttpResourceClient<T> {
  async fn list(&self, query: Option<&str>) -> ClientResult<Vec<T>> {
    let mut url = self.url(None);
    if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
      url.query_pairs_mut().append_pair("q", q);
    }
    self.send(self.request(Method::GET, url)).await
  }

  async fn get(&self, id: &str) -> ClientResult<T> {
    self.send(self.request(Method::GET, self.url(Some(id)))).await
  }

  async fn create(&self, draft: &T::Draft) -> ClientResult<T> {
    let request = self.request(Method::POST, self.url(None)).json(draft);
    self.send(request).await
  }

  async fn update(&self, patch: &T::Patch) -> ClientResult<T> {
    let url = self.url(Some(T::patch_target(patch)));
    let request = self.request(Method::PUT, url).json(patch);
    self.send(request).await
  }

  async fn delete(&self, id: &str) -> ClientResult<Deleted> {
    self.send(self.request(Method::DELETE, self.url(Some(id)))).await
  }
}

impl<T> Clone for HttpResourceClient<T> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      base_url: self.base_url.clone(),
      timeout: self.timeout,
      _resource: PhantomData,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::products::{CreateProduct, Product, UpdateProduct};
  use serde_json::json;
  use wiremock::matchers::{body_json, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn create_test_client(mock_server: &MockServer) -> HttpResourceClient<Product> {
    HttpResourceClient::new(
      &format!("{}/api", mock_server.uri()),
      Duration::from_secs(5),
    )
    .expect("failed to create client")
  }

  #[test]
  fn test_url_building() {
    let client: HttpResourceClient<Product> =
      HttpResourceClient::new("http://localhost:3000/api/", Duration::from_secs(1)).unwrap();
    assert_eq!(
      client.url(None).as_str(),
      "http://localhost:3000/api/products"
    );
    assert_eq!(
      client.url(Some("a b")).as_str(),
      "http://localhost:3000/api/products/a%20b"
    );
  }

  #[test]
  fn test_invalid_base_url() {
    let result = HttpResourceClient::<Product>::new("not a url", Duration::from_secs(1));
    assert!(matches!(result, Err(ClientError::Config { .. })));
  }

  #[test]
  fn test_remote_error_message_fallbacks() {
    let err = remote_error(StatusCode::NOT_FOUND, r#"{"message":"Not found"}"#);
    assert_eq!(
      err,
      ClientError::Remote {
        status: 404,
        message: "Not found".into()
      }
    );

    let err = remote_error(StatusCode::BAD_GATEWAY, "upstream down");
    assert_eq!(err.to_string(), "server returned 502: upstream down");

    let err = remote_error(StatusCode::SERVICE_UNAVAILABLE, "");
    assert_eq!(err.to_string(), "server returned 503: Service Unavailable");
  }

  #[tokio::test]
  async fn test_list_products() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/api/products"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        {"id": "1", "name": "Sample Product A"},
        {"id": "2", "name": "Sample Product B"}
      ])))
      .expect(1)
      .mount(&mock_server)
      .await;

    let client = create_test_client(&mock_server);
    let products = client.list(None).await.expect("list failed");

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].id, "1");
    assert_eq!(products[1].name, "Sample Product B");
  }

  #[tokio::test]
  async fn test_search_sends_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/api/products"))
      .and(query_param("q", "widget"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!([{"id": "3", "name": "Blue Widget"}])),
      )
      .mount(&mock_server)
      .await;

    let client = create_test_client(&mock_server);
    let products = client.list(Some("  widget ")).await.expect("search failed");

    assert_eq!(products, vec![Product::new("3", "Blue Widget")]);
  }

  #[tokio::test]
  async fn test_create_posts_draft() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/api/products"))
      .and(body_json(json!({"name": "Lamp"})))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "7", "name": "Lamp"})))
      .mount(&mock_server)
      .await;

    let client = create_test_client(&mock_server);
    let created = client
      .create(&CreateProduct::new("Lamp"))
      .await
      .expect("create failed");

    assert_eq!(created, Product::new("7", "Lamp"));
  }

  #[tokio::test]
  async fn test_update_puts_to_item_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
      .and(path("/api/products/2"))
      .and(body_json(json!({"id": "2", "name": "Renamed"})))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(json!({"id": "2", "name": "Renamed", "price": 12})),
      )
      .mount(&mock_server)
      .await;

    let client = create_test_client(&mock_server);
    let updated = client
      .update(&UpdateProduct::new("2", "Renamed"))
      .await
      .expect("update failed");

    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.extra.get("price"), Some(&json!(12)));
  }

  #[tokio::test]
  async fn test_get_not_found_surfaces_remote_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/api/products/404"))
      .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found"})))
      .mount(&mock_server)
      .await;

    let client = create_test_client(&mock_server);
    let result = client.get("404").await;

    assert_eq!(
      result,
      Err(ClientError::Remote {
        status: 404,
        message: "Not found".into()
      })
    );
  }

  #[tokio::test]
  async fn test_delete_returns_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
      .and(path("/api/products/1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
      .mount(&mock_server)
      .await;

    let client = create_test_client(&mock_server);
    let deleted = client.delete("1").await.expect("delete failed");

    assert_eq!(deleted.id, "1");
  }

  #[tokio::test]
  async fn test_server_error_is_not_coerced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/api/products"))
      .respond_with(
        ResponseTemplate::new(500).set_body_json(json!({"message": "Internal server error"})),
      )
      .mount(&mock_server)
      .await;

    let client = create_test_client(&mock_server);
    let result = client.create(&CreateProduct::new("Lamp")).await;

    assert!(matches!(
      result,
      Err(ClientError::Remote { status: 500, ref message }) if message == "Internal server error"
    ));
  }

  #[tokio::test]
  async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/api/products"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(json!([]))
          .set_delay(Duration::from_millis(500)),
      )
      .mount(&mock_server)
      .await;

    let client: HttpResourceClient<Product> = HttpResourceClient::new(
      &format!("{}/api", mock_server.uri()),
      Duration::from_millis(50),
    )
    .unwrap();
    let result = client.list(None).await;

    assert!(matches!(result, Err(ClientError::Timeout { .. })));
  }

  #[tokio::test]
  async fn test_connection_refused_is_network_error() {
    // Nothing listens on port 9 on test hosts.
    let client: HttpResourceClient<Product> =
      HttpResourceClient::new("http://127.0.0.1:9/api", Duration::from_secs(2)).unwrap();
    let result = client.list(None).await;

    assert!(matches!(result, Err(ClientError::Network { .. })));
  }
}

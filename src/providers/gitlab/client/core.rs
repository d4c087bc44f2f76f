use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::Token;
use crate::error::{CidashError, Result};

const MAX_CONCURRENT_REQUESTS: usize = 32;
pub(super) const PAGE_SIZE: usize = 100;

/// GitLab REST v4 client.
///
/// Failed requests are not retried here: the dashboard polls again on the
/// next refresh tick.
pub struct GitLabClient {
    client: Client,
    api_url: Url,
    token: Option<Token>,
    semaphore: Arc<Semaphore>,
}

/// One page of a list endpoint.
struct Page<T> {
    items: T,
    next_page: Option<u32>,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cidash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CidashError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Without a trailing slash `join` would replace the last path segment
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        let api_url = Url::parse(&base)
            .map_err(|e| CidashError::Config(format!("Invalid base URL: {e}")))?
            .join("api/v4/")
            .map_err(|e| CidashError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
        })
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| CidashError::Config(format!("Invalid API path {path}: {e}")))
    }

    /// Sends a GET request and decodes the body.
    ///
    /// Returns `None` on 404 so callers can model optional resources.
    async fn request<T>(&self, path: &str, query: &[(&str, String)]) -> Result<Option<Page<T>>>
    where
        T: DeserializeOwned,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| CidashError::Config(format!("Request limiter closed: {e}")))?;

        let url = self.endpoint(path)?;
        debug!("GET {url}");

        let response = self
            .auth_request(self.client.get(url).query(query))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(CidashError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let next_page = response
            .headers()
            .get("x-next-page")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());

        let items = response.json().await?;

        Ok(Some(Page { items, next_page }))
    }

    /// GET a resource that must exist.
    pub(super) async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request(path, query)
            .await?
            .map(|page| page.items)
            .ok_or_else(|| CidashError::Api {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("{path} not found"),
            })
    }

    /// GET a resource that may be missing.
    pub(super) async fn get_optional_json<T>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        Ok(self.request(path, query).await?.map(|page| page.items))
    }

    /// GET every page of a list endpoint, following `x-next-page`.
    pub(super) async fn get_all<T>(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let mut paged_query = query.to_vec();
            paged_query.push(("per_page", PAGE_SIZE.to_string()));
            paged_query.push(("page", page.to_string()));

            let Some(result) = self.request::<Vec<T>>(path, &paged_query).await? else {
                return Err(CidashError::Api {
                    status: StatusCode::NOT_FOUND.as_u16(),
                    message: format!("{path} not found"),
                });
            };

            all.extend(result.items);

            match result.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_api_url_keeps_base_path() {
        let client = GitLabClient::new("https://example.com/gitlab", None).unwrap();
        assert_eq!(client.api_url.as_str(), "https://example.com/gitlab/api/v4/");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(GitLabClient::new("not a url", None).is_err());
    }

    #[tokio::test]
    async fn test_get_all_follows_next_page() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/api/v4/items")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_header("content-type", "application/json")
            .with_header("x-next-page", "2")
            .with_body("[1, 2]")
            .create_async()
            .await;
        let second = server
            .mock("GET", "/api/v4/items")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_header("content-type", "application/json")
            .with_header("x-next-page", "")
            .with_body("[3]")
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), None).unwrap();
        let items: Vec<u32> = client.get_all("items", &[]).await.unwrap();

        assert_eq!(items, vec![1, 2, 3]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_resource_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v4/missing")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), None).unwrap();
        let item: Option<u32> = client.get_optional_json("missing", &[]).await.unwrap();
        assert!(item.is_none());
        assert!(client.get_json::<u32>("missing", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v4/broken")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), None).unwrap();
        let err = client.get_json::<u32>("broken", &[]).await.unwrap_err();
        assert!(matches!(err, CidashError::Api { status: 500, ref message } if message == "boom"));
    }

    #[tokio::test]
    async fn test_token_is_sent_as_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v4/secure")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer glpat-test")
            .with_header("content-type", "application/json")
            .with_body("7")
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), Some(Token::from("glpat-test"))).unwrap();
        let value: u32 = client.get_json("secure", &[]).await.unwrap();
        assert_eq!(value, 7);
        mock.assert_async().await;
    }
}

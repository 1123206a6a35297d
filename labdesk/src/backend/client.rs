use super::error::BackendError;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw backend answer relayed by the console's data proxy.
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// HTTP client for the lab REST backend.
///
/// Every call takes the session's bearer token so one client can serve
/// all signed-in users.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(builder: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        match bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET `path` with `params` as the query string.
    pub async fn query<T, P>(&self, path: &str, params: &P, bearer: Option<&str>) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let builder = self.http.get(self.url(path)).query(params);
        self.execute(path, Self::authorized(builder, bearer)).await
    }

    /// Send `payload` as JSON with the given verb.
    pub async fn mutate<T, B>(
        &self,
        method: Method,
        path: &str,
        payload: &B,
        bearer: Option<&str>,
    ) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let builder = self.http.request(method, self.url(path)).json(payload);
        self.execute(path, Self::authorized(builder, bearer)).await
    }

    async fn execute<T: DeserializeOwned>(&self, endpoint: &str, builder: RequestBuilder) -> Result<T, BackendError> {
        let response = builder.send().await.map_err(|source| BackendError::Http {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let status = response.status();
        debug!("backend {} -> {}", endpoint, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("backend {} returned {}", endpoint, status);
            return Err(BackendError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|source| BackendError::Http {
            endpoint: endpoint.to_string(),
            source,
        })?;

        // Empty 2xx bodies decode as JSON null
        let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };

        serde_json::from_slice(body).map_err(|source| BackendError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// Relay a request verbatim and hand back whatever the backend said.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        content_type: Option<&str>,
        body: Vec<u8>,
        bearer: Option<&str>,
    ) -> Result<ForwardedResponse, BackendError> {
        let mut builder = self.http.request(method, self.url(path_and_query));
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = Self::authorized(builder, bearer)
            .send()
            .await
            .map_err(|source| BackendError::Http {
                endpoint: path_and_query.to_string(),
                source,
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|source| BackendError::Http {
                endpoint: path_and_query.to_string(),
                source,
            })?
            .to_vec();

        Ok(ForwardedResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://backend.local/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://backend.local/api");
        assert_eq!(client.url("/bookings"), "http://backend.local/api/bookings");
        assert_eq!(client.url("bookings?page=2"), "http://backend.local/api/bookings?page=2");
    }
}

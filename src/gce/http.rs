//! Request and response plumbing shared by the Compute Engine calls.

use reqwest::header::CONTENT_LENGTH;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::model::ListPage;

use super::{ComputeError, GceClient};

/// Google API error envelope: `{"error": {"code": 404, "message": "..."}}`.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl GceClient {
    /// Issues a single request and decodes the JSON response.
    pub(super) async fn call<T, B>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<T, ComputeError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        debug!(%method, url, "compute API request");
        let bodiless_post = body.is_none() && method == Method::POST;
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.access_token);
        if let Some(payload) = body {
            request = request.json(payload);
        }
        if bodiless_post {
            // Compute Engine answers 411 to a POST without a length.
            request = request.header(CONTENT_LENGTH, 0);
        }
        self.execute(request, url).await
    }

    /// Fetches every page of a list endpoint, following `nextPageToken`.
    pub(super) async fn list_all<T>(&self, url: &str) -> Result<Vec<T>, ComputeError>
    where
        T: DeserializeOwned + Send,
    {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            debug!(url, page_token = page_token.as_deref(), "compute API list");
            let mut request = self.http.get(url).bearer_auth(&self.access_token);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let page: ListPage<T> = self.execute(request, url).await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(items),
            }
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, ComputeError> {
        let response = request
            .send()
            .await
            .map_err(|err| ComputeError::Transport {
                url: url.to_owned(),
                message: err.to_string(),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ComputeError::Transport {
                url: url.to_owned(),
                message: err.to_string(),
            })?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|err| ComputeError::Decode {
                url: url.to_owned(),
                message: err.to_string(),
            });
        }

        Err(ComputeError::Api {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

/// Extracts the provider message from an error body, falling back to the raw
/// text.
pub(super) fn error_message(body: &[u8]) -> String {
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body)
        && !envelope.error.message.is_empty()
    {
        return envelope.error.message;
    }

    let raw = String::from_utf8_lossy(body).trim().to_owned();
    if raw.is_empty() {
        String::from("empty response body")
    } else {
        raw
    }
}

use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::{AccessToken, SessionHandle};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RequestError {
    #[snafu(display("RequestError: No authenticated session to take an access token from"))]
    NotAuthenticated,

    #[snafu(display("RequestError: Could not send request"))]
    Send { source: reqwest::Error },

    #[snafu(display("RequestError: Could not serialize request body"))]
    Serialize { source: serde_json::Error },

    #[snafu(display("RequestError: Could not decode payload"))]
    Decode { source: reqwest::Error },

    #[snafu(display("RequestError: The request was rejected as unauthorized"))]
    Unauthorized,

    #[snafu(display("RequestError: Received an error response with status {status}"))]
    Status { status: StatusCode, body: String },
}

impl RequestError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RequestError::Unauthorized)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            RequestError::Status { status, .. } => Some(*status),
            RequestError::NotAuthenticated
            | RequestError::Send { .. }
            | RequestError::Serialize { .. }
            | RequestError::Decode { .. } => None,
        }
    }
}

/// HTTP client with automatic access token injection and token refresh on 401 responses.
///
/// 1. **Token injection**: Every request carries the access token of the session *at the
///    moment the request is built* in its `Authorization` header, together with a JSON
///    `Content-Type`. Tokens renewed in the background are picked up by the next request.
///
/// 2. **Retry on 401**: When a request receives a 401 Unauthorized response, the client
///    forces a token renewal and retries the request once. This covers tokens revoked or
///    rotated on the Keycloak side, which our periodic refreshes cannot notice.
///
/// 3. **Status inspection**: `get`, `post`, `put` and `delete` decode the JSON body of
///    successful responses only. A 401 surviving the retry becomes
///    `RequestError::Unauthorized`, any other non-success status `RequestError::Status`.
///
/// Create an instance using [`SessionHandle::client()`] or [`SessionHandle::client_from()`].
///
/// # Example
/// ```no_run
/// # use leptos_keycloak_session::use_session;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = use_session().client();
/// let me: serde_json::Value = client.get("https://api.example.com/me").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    client: reqwest::Client,
    session: SessionHandle,
}

impl AuthenticatedClient {
    pub(crate) fn new(client: reqwest::Client, session: SessionHandle) -> Self {
        Self { client, session }
    }

    fn create_request(
        &self,
        method: reqwest::Method,
        url: impl reqwest::IntoUrl,
        with: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    ) -> Result<(reqwest::Request, AccessToken), RequestError> {
        // Read at call time. Never reuse a token from an earlier request.
        let access_token = self
            .session
            .access_token()
            .context(NotAuthenticatedSnafu)?;

        let mut req_builder = self
            .client
            .request(method, url)
            .header(http::header::CONTENT_TYPE, "application/json");

        // Let the user build the request.
        req_builder = with(req_builder);

        // Add the access token in an `AUTHORIZATION` header.
        req_builder = req_builder.bearer_auth(&access_token);

        let req = req_builder.build().context(SendSnafu)?;
        Ok((req, access_token))
    }

    /// Perform a GET request and decode the JSON response body.
    ///
    /// # Errors
    /// See [`AuthenticatedClient`] for how statuses are mapped to errors.
    pub async fn get<T: DeserializeOwned>(
        &self,
        url: impl reqwest::IntoUrl + Clone,
    ) -> Result<T, RequestError> {
        let resp = self
            .request(reqwest::Method::GET, url, |builder| builder)
            .await?;
        Self::decode(resp).await
    }

    /// Perform a POST request with `body` serialized as JSON and decode the JSON response body.
    ///
    /// # Errors
    /// See [`AuthenticatedClient`] for how statuses are mapped to errors.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: impl reqwest::IntoUrl + Clone,
        body: &B,
    ) -> Result<T, RequestError> {
        let body = serde_json::to_vec(body).context(SerializeSnafu)?;
        let resp = self
            .request(reqwest::Method::POST, url, move |builder| {
                builder.body(body.clone())
            })
            .await?;
        Self::decode(resp).await
    }

    /// Perform a PUT request with `body` serialized as JSON and decode the JSON response body.
    ///
    /// # Errors
    /// See [`AuthenticatedClient`] for how statuses are mapped to errors.
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: impl reqwest::IntoUrl + Clone,
        body: &B,
    ) -> Result<T, RequestError> {
        let body = serde_json::to_vec(body).context(SerializeSnafu)?;
        let resp = self
            .request(reqwest::Method::PUT, url, move |builder| {
                builder.body(body.clone())
            })
            .await?;
        Self::decode(resp).await
    }

    /// Perform a DELETE request and decode the JSON response body.
    ///
    /// # Errors
    /// See [`AuthenticatedClient`] for how statuses are mapped to errors.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        url: impl reqwest::IntoUrl + Clone,
    ) -> Result<T, RequestError> {
        let resp = self
            .request(reqwest::Method::DELETE, url, |builder| builder)
            .await?;
        Self::decode(resp).await
    }

    /// Performs a request while automatically setting the current access token as an
    /// AUTHORIZATION header. The raw response is returned without inspecting its status.
    ///
    /// Handles responses failing with a 401 status code (UNAUTHORIZED) by forcing a token
    /// renewal and retrying the request once.
    ///
    /// # Errors
    /// Returns an error if there is no authenticated session or the request could not be sent.
    pub async fn request(
        &self,
        method: reqwest::Method,
        url: impl reqwest::IntoUrl + Clone,
        with: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Clone,
    ) -> Result<reqwest::Response, RequestError> {
        let (req, used_token) = self.create_request(method.clone(), url.clone(), with.clone())?;
        let resp = self.client.execute(req).await.context(SendSnafu)?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        // The token may have been renewed while this request was on its way.
        if self
            .session
            .access_token()
            .is_some_and(|current| current != used_token)
        {
            tracing::trace!("Retrying request with access token renewed in the meantime.");
            return self.retry(method, url, with).await;
        }

        // When a 401 occurs despite having a non-expired token, it could mean that:
        // - the token was revoked on Keycloak side (admin action, password change).
        // - the users session was terminated server-side.
        // We directly renew the token and retry the request once.
        match self.session.force_refresh().await {
            Ok(true) => {
                tracing::trace!("Retrying request with renewed access token.");
                self.retry(method, url, with).await
            }
            Ok(false) => {
                tracing::debug!("Request was unauthorized and the token could not be renewed.");
                Ok(resp)
            }
            Err(err) => {
                tracing::warn!(?err, "Token renewal after 401 failed.");
                Ok(resp)
            }
        }
    }

    async fn retry(
        &self,
        method: reqwest::Method,
        url: impl reqwest::IntoUrl,
        with: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RequestError> {
        let (req, _) = self.create_request(method, url, with)?;
        self.client.execute(req).await.context(SendSnafu)
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, RequestError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return UnauthorizedSnafu.fail();
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return StatusSnafu { status, body }.fail();
        }
        resp.json::<T>().await.context(DecodeSnafu)
    }
}

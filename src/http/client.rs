// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::CookieJar;
use crate::common::Error;
use crate::retry::{retry, RetryPolicy};
use hyper::{Method, StatusCode};
use reqwest::redirect::Policy;
use reqwest::{Client, IntoUrl, Request, RequestBuilder, Response};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Status codes that are retried and, once retries run out, surface as `Error::Reqwest`.
pub const RETRYABLE_STATUS_CODES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

/// HTTP client that retries transient failures, keeps cookies in a [`CookieJar`] and
/// classifies error statuses.
#[derive(Clone, Debug)]
pub struct RetryClient {
    client: Client,
    cookie_jar: Arc<CookieJar>,
    retry_policy: RetryPolicy,
    pass_through: Vec<StatusCode>,
}

impl RetryClient {
    /// Creates a client builder.
    pub fn builder() -> RetryClientBuilder {
        RetryClientBuilder {
            timeout: Duration::from_secs(20),
            retry_policy: RetryPolicy::default(),
            pass_through: RETRYABLE_STATUS_CODES
                .iter()
                .filter_map(|code| StatusCode::from_u16(*code).ok())
                .collect(),
            cookie_jar: None,
            user_agent: None,
        }
    }

    /// Cookies shared by every request this client makes.
    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.cookie_jar
    }

    /// Retry policy applied by [`RetryClient::execute`].
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Start a request, to be finished with [`RetryClient::send`].
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// GET `url`.
    pub async fn get<U: IntoUrl>(&self, url: U) -> Result<Response, Error> {
        self.send(self.client.get(url)).await
    }

    /// POST `body` as JSON to `url`.
    pub async fn post_json<U: IntoUrl, T: Serialize + ?Sized>(
        &self,
        url: U,
        body: &T,
    ) -> Result<Response, Error> {
        self.send(self.client.post(url).json(body)).await
    }

    /// POST `form` URL encoded to `url`.
    pub async fn post_form<U: IntoUrl, T: Serialize + ?Sized>(
        &self,
        url: U,
        form: &T,
    ) -> Result<Response, Error> {
        self.send(self.client.post(url).form(form)).await
    }

    /// Build and execute `builder`.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, Error> {
        let request = builder
            .build()
            .map_err(|e| Error::Reqwest(e, "build request".to_string()))?;
        self.execute(request).await
    }

    /// Execute `request`, retrying transport failures and pass-through statuses.
    ///
    /// A request whose body cannot be cloned (a stream) is attempted only once.
    pub async fn execute(&self, request: Request) -> Result<Response, Error> {
        let context = format!("{} {}", request.method(), request.url());
        if request.try_clone().is_none() {
            return self.execute_once(request, &context).await;
        }
        retry(&self.retry_policy, is_retryable, || {
            let attempt = request
                .try_clone()
                .ok_or_else(|| Error::String(format!("{context}: cannot clone request")));
            let context = &context;
            async move { self.execute_once(attempt?, context).await }
        })
        .await
    }

    async fn execute_once(&self, request: Request, context: &str) -> Result<Response, Error> {
        debug!(">> {context}");
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| Error::Reqwest(e, context.to_string()))?;
        debug!(status = response.status().as_u16(), "<< {context}");
        check_status(response, &self.pass_through).await
    }

    /// Serialize the current cookies, see [`CookieJar::to_b64`].
    pub fn b64_encoded_cookies(&self) -> Result<String, Error> {
        self.cookie_jar.to_b64()
    }

    /// Replace the current cookies with serialized ones, see [`CookieJar::load_b64`].
    pub fn b64_decode_and_set_cookies(&self, data: &[u8]) -> Result<(), Error> {
        self.cookie_jar.load_b64(data)
    }
}

/// Builder for [`RetryClient`].
pub struct RetryClientBuilder {
    timeout: Duration,
    retry_policy: RetryPolicy,
    pass_through: Vec<StatusCode>,
    cookie_jar: Option<Arc<CookieJar>>,
    user_agent: Option<String>,
}

impl RetryClientBuilder {
    /// Total timeout of each attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the default retry policy.
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Replaces the set of retryable, pass-through statuses.
    pub fn pass_through(mut self, pass_through: impl IntoIterator<Item = StatusCode>) -> Self {
        self.pass_through = pass_through.into_iter().collect();
        self
    }

    /// Shares an existing cookie jar instead of starting with an empty one.
    pub fn cookie_jar(mut self, cookie_jar: Arc<CookieJar>) -> Self {
        self.cookie_jar = Some(cookie_jar);
        self
    }

    /// Sets the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Creates the client.
    pub fn build(self) -> Result<RetryClient, Error> {
        let cookie_jar = self.cookie_jar.unwrap_or_default();
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .redirect(Policy::limited(10))
            .cookie_provider(Arc::clone(&cookie_jar));
        if let Some(user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Reqwest(e, "build HTTP client".to_string()))?;
        Ok(RetryClient {
            client,
            cookie_jar,
            retry_policy: self.retry_policy,
            pass_through: self.pass_through,
        })
    }
}

/// Transport failures and pass-through statuses are worth another attempt.
pub fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Reqwest(e, _) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_status(),
        _ => false,
    }
}

/// Classify the status of `response`.
///
/// Success and redirect statuses return the response. Statuses in `pass_through` become
/// the `reqwest` status error, 401 becomes `Error::NotAuthorized` and any other error
/// status becomes `Error::Http`, each with the URL and body.
pub async fn check_status(
    response: Response,
    pass_through: &[StatusCode],
) -> Result<Response, Error> {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return Ok(response);
    }
    let url = response.url().to_string();
    if pass_through.contains(&status) {
        return response
            .error_for_status()
            .map_err(|e| Error::Reqwest(e, url));
    }
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => e.to_string(),
    };
    if status == StatusCode::UNAUTHORIZED {
        Err(Error::NotAuthorized(format!("{url}: {body}")))
    } else {
        Err(Error::Http(status, format!("{url}: {body}")))
    }
}

//! Client construction and shared HTTP plumbing.

use std::time::Duration;

use crate::constants::{
    APP_BASE_URL, BACKEND_BASE_URL, CALLBACK_ENDPOINT, DEFAULT_TIMEOUT, LOGIN_BASE_URL, USER_AGENT,
};
use crate::models::AccountData;
use crate::Result;

/// Base URLs of the three hosts the client talks to.
///
/// Defaults to the production hosts; tests point every base at a mock
/// server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Identity-provider host serving the login flow and token exchange.
    pub login_base_url: String,
    /// Application host receiving the OAuth callback.
    pub app_base_url: String,
    /// Data-backend host for account, consumption and alert calls.
    pub backend_base_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login_base_url: LOGIN_BASE_URL.to_string(),
            app_base_url: APP_BASE_URL.to_string(),
            backend_base_url: BACKEND_BASE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Redirect URI registered for the authorization-code grant.
    pub(crate) fn callback_url(&self) -> String {
        format!("{}{}", self.app_base_url.trim_end_matches('/'), CALLBACK_ENDPOINT)
    }
}

/// Client for one residential Veolia account.
///
/// Owns the whole session state: one login flow at a time, one set of
/// account identifiers, the last fetched payloads. Dropping the client
/// releases the underlying connection pool.
pub struct VeoliaClient {
    pub(crate) http: reqwest::Client,
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) endpoints: Endpoints,
    /// Session state accumulated by the flow and the data calls.
    pub account_data: AccountData,
}

impl VeoliaClient {
    /// Create a client against the production hosts.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        Self::with_endpoints(username, password, Endpoints::default())
    }

    /// Create a client against explicit hosts.
    pub fn with_endpoints(
        username: impl Into<String>,
        password: impl Into<String>,
        endpoints: Endpoints,
    ) -> Result<Self> {
        // Redirects carry the flow's state machine in their Location
        // headers, so the transport must surface raw 3xx responses. The
        // cookie store holds the identity provider's session cookies
        // between hops.
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(true)
            .build()?;

        Ok(Self {
            http,
            username: username.into(),
            password: password.into(),
            endpoints,
            account_data: AccountData::default(),
        })
    }

    /// Base URL of the data backend without a trailing slash.
    pub(crate) fn backend_base(&self) -> &str {
        self.endpoints.backend_base_url.trim_end_matches('/')
    }
}

//! Constants for the Veolia client.

use std::time::Duration;

/// Identity-provider host serving the login flow.
pub const LOGIN_BASE_URL: &str = "https://login.eau.veolia.fr";

/// Application host receiving the OAuth callback.
pub const APP_BASE_URL: &str = "https://www.eau.veolia.fr";

/// Data-backend host for account, consumption and alert calls.
pub const BACKEND_BASE_URL: &str = "https://prd-ael-sirius-backend.istefr.fr";

/// OAuth client ID registered for the web front-end.
pub const CLIENT_ID: &str = "3kghade1fg54739kj8pkbova8j";

/// Scopes requested on the authorize step.
pub const SCOPES: &str = "openid profile email offline_access";

/// PKCE challenge method. Only S256 is accepted upstream.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Client-metadata descriptor sent base64url-encoded as `auth0Client`.
pub const CLIENT_METADATA: &str = r#"{"name": "auth0-react", "version": "1.11.0"}"#;

/// Endpoint paths of the login flow.
pub const AUTHORIZE_ENDPOINT: &str = "/authorize";
pub const LOGIN_IDENTIFIER_ENDPOINT: &str = "/u/login/identifier";
pub const LOGIN_PASSWORD_ENDPOINT: &str = "/u/login/password";
pub const CALLBACK_ENDPOINT: &str = "/callback";
pub const OAUTH_TOKEN_ENDPOINT: &str = "/oauth/token";

/// Front-end identifier the backend expects on account and alert calls.
pub const TYPE_FRONT: &str = "WEB_ORDINATEUR";

/// Timeout applied to every HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// User-Agent string for HTTP requests.
pub const USER_AGENT: &str = concat!("veolia-client/", env!("CARGO_PKG_VERSION"));

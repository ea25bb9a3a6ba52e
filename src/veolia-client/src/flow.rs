//! The login flow state machine.
//!
//! The provider's login is an authorization-code sequence spread over
//! redirect hops: authorize, identifier submission, password submission,
//! then the callback carrying the authorization code. Each hop's `Location`
//! header names the next step and may rotate the correlation `state`; the
//! engine walks the table until the callback answers 200.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::{header, Method, StatusCode};
use tracing::{debug, info};
use url::Url;

use crate::client::VeoliaClient;
use crate::constants::{
    AUTHORIZE_ENDPOINT, CALLBACK_ENDPOINT, CLIENT_ID, CLIENT_METADATA, CODE_CHALLENGE_METHOD,
    LOGIN_IDENTIFIER_ENDPOINT, LOGIN_PASSWORD_ENDPOINT, SCOPES,
};
use crate::models::AccountData;
use crate::pkce;
use crate::{Result, VeoliaError};

/// One step of the login sequence. Each variant carries its endpoint path,
/// HTTP method and expected success status through the methods below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlowStep {
    Authorize,
    LoginIdentifier,
    LoginPassword,
    Callback,
}

impl FlowStep {
    pub(crate) fn path(self) -> &'static str {
        match self {
            FlowStep::Authorize => AUTHORIZE_ENDPOINT,
            FlowStep::LoginIdentifier => LOGIN_IDENTIFIER_ENDPOINT,
            FlowStep::LoginPassword => LOGIN_PASSWORD_ENDPOINT,
            FlowStep::Callback => CALLBACK_ENDPOINT,
        }
    }

    /// Resolve a redirect path to the step it names.
    pub(crate) fn from_path(path: &str) -> Option<Self> {
        match path {
            AUTHORIZE_ENDPOINT => Some(FlowStep::Authorize),
            LOGIN_IDENTIFIER_ENDPOINT => Some(FlowStep::LoginIdentifier),
            LOGIN_PASSWORD_ENDPOINT => Some(FlowStep::LoginPassword),
            CALLBACK_ENDPOINT => Some(FlowStep::Callback),
            _ => None,
        }
    }

    pub(crate) fn method(self) -> Method {
        match self {
            FlowStep::Authorize | FlowStep::Callback => Method::GET,
            FlowStep::LoginIdentifier | FlowStep::LoginPassword => Method::POST,
        }
    }

    /// Status the step must answer; every step but the callback redirects.
    pub(crate) fn success_status(self) -> StatusCode {
        match self {
            FlowStep::Callback => StatusCode::OK,
            _ => StatusCode::FOUND,
        }
    }
}

impl VeoliaClient {
    /// Drive the login sequence from the authorize step until the callback
    /// answers 200. On success the account data holds the PKCE verifier and
    /// the authorization code for the token exchange.
    pub(crate) async fn execute_flow(&mut self) -> Result<()> {
        let mut step = Some(FlowStep::Authorize);
        let mut state: Option<String> = None;

        while let Some(current) = step {
            let params = self.step_params(current, state.as_deref())?;
            let response = self.send_flow_request(current, state.as_deref(), &params).await?;

            let request_url = response.url().clone();
            let status = response.status();
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);

            (step, state) = interpret_response(
                current,
                status,
                location.as_deref(),
                &request_url,
                state,
                &mut self.account_data,
            )?;
        }

        Ok(())
    }

    /// Issue one flow request with redirect-following disabled. A known
    /// correlation state rides on the URL itself, in addition to whatever
    /// the step's parameters carry.
    async fn send_flow_request(
        &self,
        step: FlowStep,
        state: Option<&str>,
        params: &[(&'static str, String)],
    ) -> Result<reqwest::Response> {
        let url = self.flow_url(step);
        let method = step.method();
        debug!(%method, %url, params = ?redact(params), "sending flow step request");

        let mut request = if method == Method::GET {
            self.http.get(&url)
        } else if method == Method::POST {
            self.http
                .post(&url)
                .header(header::CACHE_CONTROL, "no-cache")
                .form(params)
        } else {
            return Err(VeoliaError::UnsupportedMethod(method));
        };

        if let Some(state) = state {
            request = request.query(&[("state", state)]);
        }
        if method == Method::GET {
            request = request.query(params);
        }

        let response = request.send().await?;
        debug!(status = %response.status(), "flow step response received");
        Ok(response)
    }

    /// Full URL for a step: the callback lives on the application host,
    /// everything else on the identity provider.
    fn flow_url(&self, step: FlowStep) -> String {
        let base = match step {
            FlowStep::Callback => &self.endpoints.app_base_url,
            _ => &self.endpoints.login_base_url,
        };
        format!("{}{}", base.trim_end_matches('/'), step.path())
    }

    /// Build the parameter set for a step.
    fn step_params(
        &mut self,
        step: FlowStep,
        state: Option<&str>,
    ) -> Result<Vec<(&'static str, String)>> {
        let mut params = Vec::new();
        match step {
            FlowStep::Authorize => return Ok(self.authorize_params()),
            FlowStep::LoginIdentifier => {
                if let Some(state) = state {
                    params.push(("state", state.to_string()));
                }
                params.push(("username", self.username.clone()));
            }
            FlowStep::LoginPassword => {
                if let Some(state) = state {
                    params.push(("state", state.to_string()));
                }
                params.push(("username", self.username.clone()));
                params.push(("password", self.password.clone()));
            }
            FlowStep::Callback => {
                if let Some(state) = state {
                    params.push(("state", state.to_string()));
                }
                let code = self
                    .account_data
                    .authorization_code
                    .clone()
                    .ok_or(VeoliaError::MissingField("code"))?;
                params.push(("code", code));
            }
        }
        Ok(params)
    }

    /// Parameters for the authorize step. Always mints fresh state, nonce
    /// and verifier; a correlation state carried in from a previous hop is
    /// deliberately not reused here.
    fn authorize_params(&mut self) -> Vec<(&'static str, String)> {
        let state = pkce::random_token();
        let nonce = pkce::random_token();
        let verifier = pkce::random_token();
        let challenge = pkce::code_challenge(&verifier);
        self.account_data.pkce_verifier = Some(verifier);

        vec![
            ("audience", self.endpoints.backend_base_url.clone()),
            ("redirect_uri", self.endpoints.callback_url()),
            ("client_id", CLIENT_ID.to_string()),
            ("scope", SCOPES.to_string()),
            ("response_type", "code".to_string()),
            ("state", state),
            ("nonce", nonce),
            ("response_mode", "query".to_string()),
            ("code_challenge", challenge),
            ("code_challenge_method", CODE_CHALLENGE_METHOD.to_string()),
            ("auth0Client", URL_SAFE_NO_PAD.encode(CLIENT_METADATA)),
        ]
    }
}

/// Interpret one flow response: decide the next step, rotate the correlation
/// state, and capture the authorization code on the hop into the callback.
pub(crate) fn interpret_response(
    current: FlowStep,
    status: StatusCode,
    location: Option<&str>,
    request_url: &Url,
    state: Option<String>,
    account: &mut AccountData,
) -> Result<(Option<FlowStep>, Option<String>)> {
    if status == StatusCode::BAD_REQUEST && current == FlowStep::LoginPassword {
        return Err(VeoliaError::InvalidCredentials);
    }
    if status != current.success_status() {
        return Err(VeoliaError::FlowStepFailed {
            url: request_url.to_string(),
            status,
        });
    }

    if status == StatusCode::FOUND {
        let location = location.ok_or(VeoliaError::MissingField("Location"))?;
        // Location may be absolute or relative; resolving against the
        // request URL handles both.
        let redirect = request_url
            .join(location)
            .map_err(|_| VeoliaError::InvalidRedirect(location.to_string()))?;

        let next = FlowStep::from_path(redirect.path())
            .ok_or_else(|| VeoliaError::UnknownFlowStep(redirect.path().to_string()))?;

        let mut state = state;
        if let Some((_, value)) = redirect.query_pairs().find(|(key, _)| key == "state") {
            state = Some(value.into_owned());
        }

        if next == FlowStep::Callback {
            let code = redirect
                .query_pairs()
                .find(|(key, _)| key == "code")
                .map(|(_, value)| value.into_owned())
                .filter(|code| !code.is_empty())
                .ok_or(VeoliaError::MissingField("code"))?;
            account.authorization_code = Some(code);
            info!("authorization code received");
        }

        return Ok((Some(next), state));
    }

    if status == StatusCode::OK && current == FlowStep::Callback {
        return Ok((None, state));
    }

    // The step table expects every non-terminal step to redirect; a 2xx
    // anywhere else means the table no longer matches the provider.
    Err(VeoliaError::FlowStepFailed {
        url: request_url.to_string(),
        status,
    })
}

/// Copy of the parameter list with the password value masked, for logging.
fn redact<'a>(params: &'a [(&'static str, String)]) -> Vec<(&'static str, &'a str)> {
    params
        .iter()
        .map(|(key, value)| {
            if *key == "password" {
                (*key, "******")
            } else {
                (*key, value.as_str())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_url(path: &str) -> Url {
        Url::parse(&format!("https://login.example{path}")).expect("parse test url")
    }

    #[test]
    fn test_step_table() {
        assert_eq!(FlowStep::Authorize.method(), Method::GET);
        assert_eq!(FlowStep::LoginIdentifier.method(), Method::POST);
        assert_eq!(FlowStep::LoginPassword.method(), Method::POST);
        assert_eq!(FlowStep::Callback.method(), Method::GET);

        assert_eq!(FlowStep::Authorize.success_status(), StatusCode::FOUND);
        assert_eq!(FlowStep::Callback.success_status(), StatusCode::OK);

        assert_eq!(FlowStep::from_path("/u/login/password"), Some(FlowStep::LoginPassword));
        assert_eq!(FlowStep::from_path("/elsewhere"), None);
    }

    #[test]
    fn test_redirect_advances_and_rotates_state() {
        let mut account = AccountData::default();
        let (next, state) = interpret_response(
            FlowStep::Authorize,
            StatusCode::FOUND,
            Some("/u/login/identifier?state=S1"),
            &request_url("/authorize"),
            None,
            &mut account,
        )
        .expect("interpret authorize response");

        assert_eq!(next, Some(FlowStep::LoginIdentifier));
        assert_eq!(state.as_deref(), Some("S1"));
    }

    #[test]
    fn test_redirect_without_state_keeps_previous() {
        let mut account = AccountData::default();
        let (next, state) = interpret_response(
            FlowStep::LoginIdentifier,
            StatusCode::FOUND,
            Some("https://login.example/u/login/password"),
            &request_url("/u/login/identifier"),
            Some("S1".to_string()),
            &mut account,
        )
        .expect("interpret identifier response");

        assert_eq!(next, Some(FlowStep::LoginPassword));
        assert_eq!(state.as_deref(), Some("S1"));
    }

    #[test]
    fn test_redirect_to_callback_captures_code() {
        let mut account = AccountData::default();
        let (next, _) = interpret_response(
            FlowStep::LoginPassword,
            StatusCode::FOUND,
            Some("https://www.example/callback?code=C123&state=S2"),
            &request_url("/u/login/password"),
            Some("S2".to_string()),
            &mut account,
        )
        .expect("interpret password response");

        assert_eq!(next, Some(FlowStep::Callback));
        assert_eq!(account.authorization_code.as_deref(), Some("C123"));
    }

    #[test]
    fn test_redirect_to_callback_without_code_fails() {
        let mut account = AccountData::default();
        let err = interpret_response(
            FlowStep::LoginPassword,
            StatusCode::FOUND,
            Some("/callback?state=S2"),
            &request_url("/u/login/password"),
            Some("S2".to_string()),
            &mut account,
        )
        .expect_err("callback redirect without code");

        assert!(matches!(err, VeoliaError::MissingField("code")));
        assert!(account.authorization_code.is_none());
    }

    #[test]
    fn test_bad_request_on_password_step_is_credential_error() {
        let mut account = AccountData::default();
        let err = interpret_response(
            FlowStep::LoginPassword,
            StatusCode::BAD_REQUEST,
            None,
            &request_url("/u/login/password"),
            Some("S2".to_string()),
            &mut account,
        )
        .expect_err("password step 400");

        assert!(matches!(err, VeoliaError::InvalidCredentials));
    }

    #[test]
    fn test_bad_request_elsewhere_is_step_failure() {
        let mut account = AccountData::default();
        let err = interpret_response(
            FlowStep::LoginIdentifier,
            StatusCode::BAD_REQUEST,
            None,
            &request_url("/u/login/identifier"),
            None,
            &mut account,
        )
        .expect_err("identifier step 400");

        assert!(matches!(
            err,
            VeoliaError::FlowStepFailed { status, .. } if status == StatusCode::BAD_REQUEST
        ));
    }

    #[test]
    fn test_ok_on_callback_terminates_flow() {
        let mut account = AccountData::default();
        let (next, state) = interpret_response(
            FlowStep::Callback,
            StatusCode::OK,
            None,
            &request_url("/callback"),
            Some("S2".to_string()),
            &mut account,
        )
        .expect("interpret callback response");

        assert_eq!(next, None);
        assert_eq!(state.as_deref(), Some("S2"));
    }

    #[test]
    fn test_redirect_to_unknown_path_fails() {
        let mut account = AccountData::default();
        let err = interpret_response(
            FlowStep::Authorize,
            StatusCode::FOUND,
            Some("/somewhere/else?state=S1"),
            &request_url("/authorize"),
            None,
            &mut account,
        )
        .expect_err("unknown redirect target");

        assert!(matches!(err, VeoliaError::UnknownFlowStep(path) if path == "/somewhere/else"));
    }
}

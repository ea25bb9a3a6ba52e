//! Token lifecycle: code exchange, expiry tracking, account resolution.

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::client::VeoliaClient;
use crate::constants::{CLIENT_ID, OAUTH_TOKEN_ENDPOINT, TYPE_FRONT};
use crate::models::TokenResponse;
use crate::{Result, VeoliaError};

impl VeoliaClient {
    /// Log in: run the redirect flow, exchange the authorization code for a
    /// bearer token, then resolve the account identifiers the data calls
    /// need.
    ///
    /// Returns `Ok(true)` only when every required field ended up
    /// populated; an incomplete account record is `Ok(false)`, distinct
    /// from the hard failures inside the flow itself.
    pub async fn login(&mut self) -> Result<bool> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(VeoliaError::InvalidCredentials);
        }

        info!("starting login");
        self.execute_flow().await?;
        self.exchange_code_for_token().await?;
        self.resolve_account_identifiers().await?;

        let complete = self.account_data.login_complete();
        if complete {
            info!("login successful");
        } else {
            warn!("login finished with an incomplete account record");
        }
        Ok(complete)
    }

    /// Re-run the full login when the access token is missing or at/past
    /// its expiry. Every data call goes through here, which makes token
    /// expiry invisible to callers.
    pub async fn ensure_valid_token(&mut self) -> Result<()> {
        if self.account_data.has_valid_token() {
            return Ok(());
        }
        warn!("access token missing or expired, logging in again");
        self.login().await?;
        Ok(())
    }

    /// Exchange the authorization code for an access token. The code is
    /// consumed here; a second exchange needs a fresh flow run.
    pub(crate) async fn exchange_code_for_token(&mut self) -> Result<()> {
        let verifier = self
            .account_data
            .pkce_verifier
            .clone()
            .ok_or(VeoliaError::MissingField("code_verifier"))?;
        let code = self
            .account_data
            .authorization_code
            .take()
            .ok_or(VeoliaError::MissingField("code"))?;

        let url = format!(
            "{}{}",
            self.endpoints.login_base_url.trim_end_matches('/'),
            OAUTH_TOKEN_ENDPOINT
        );
        info!("requesting access token");

        // Unlike the flow steps this is a JSON body, not a form.
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "client_id": CLIENT_ID,
                "grant_type": "authorization_code",
                "code_verifier": verifier,
                "code": code,
                "redirect_uri": self.endpoints.callback_url(),
            }))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(VeoliaError::ApiCallFailed {
                endpoint: "oauth/token",
                status: response.status(),
            });
        }

        let token: TokenResponse = response.json().await?;
        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(VeoliaError::MissingField("access_token"))?;

        let expires_in = token.expires_in.unwrap_or(0);
        self.account_data.access_token = Some(access_token);
        self.account_data.token_expiration = chrono::Utc::now().timestamp() + expires_in;
        info!(expires_in, "access token received");
        Ok(())
    }

    /// Resolve the account identifiers from the backend: the subscription
    /// record first, then the billing record it points at.
    pub(crate) async fn resolve_account_identifiers(&mut self) -> Result<()> {
        let token = self
            .account_data
            .access_token
            .clone()
            .ok_or(VeoliaError::MissingField("access_token"))?;

        let url = format!("{}/espace-client", self.backend_base());
        let response = self
            .http
            .get(&url)
            .query(&[("type-front", TYPE_FRONT)])
            .bearer_auth(&token)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(VeoliaError::ApiCallFailed {
                endpoint: "espace-client",
                status: response.status(),
            });
        }

        // The record of interest is the first contact's first tiers' first
        // subscription; residential accounts have exactly one of each.
        let account: serde_json::Value = response.json().await?;
        self.account_data.subscription_id = account
            .pointer("/contacts/0/tiers/0/abonnements/0/id_abonnement")
            .and_then(string_value);
        self.account_data.customer_id =
            account.pointer("/contacts/0/tiers/0/id").and_then(string_value);
        self.account_data.contact_id =
            account.pointer("/contacts/0/id_contact").and_then(string_value);
        self.account_data.meter_number = account
            .pointer("/contacts/0/tiers/0/abonnements/0/numero_compteur")
            .and_then(string_value);

        let subscription_id = self
            .account_data
            .subscription_id
            .clone()
            .ok_or(VeoliaError::MissingField("id_abonnement"))?;
        if self.account_data.customer_id.is_none() {
            return Err(VeoliaError::MissingField("tiers_id"));
        }
        if self.account_data.contact_id.is_none() {
            return Err(VeoliaError::MissingField("id_contact"));
        }
        if self.account_data.meter_number.is_none() {
            return Err(VeoliaError::MissingField("numero_compteur"));
        }

        let url = format!("{}/abonnements/{}/facturation", self.backend_base(), subscription_id);
        let response = self.http.get(&url).bearer_auth(&token).send().await?;
        if response.status() != StatusCode::OK {
            return Err(VeoliaError::ApiCallFailed {
                endpoint: "facturation",
                status: response.status(),
            });
        }

        let billing: serde_json::Value = response.json().await?;
        self.account_data.metering_point_id = billing.get("numero_pds").and_then(string_value);
        self.account_data.subscription_start_date =
            billing.get("date_debut_abonnement").and_then(string_value);

        if self.account_data.metering_point_id.is_none() {
            return Err(VeoliaError::MissingField("numero_pds"));
        }
        if self.account_data.subscription_start_date.is_none() {
            return Err(VeoliaError::MissingField("date_debut_abonnement"));
        }

        info!(
            subscription_id = %subscription_id,
            "account identifiers resolved"
        );
        Ok(())
    }
}

/// Identifier fields arrive as strings or bare numbers depending on the
/// endpoint; normalize both to a non-empty string.
fn string_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

//! Session and wire types for the Veolia client.

use serde::{Deserialize, Serialize};

/// Granularity of a consumption query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumptionKind {
    /// Daily readings within one month (`journalieres`).
    Daily,
    /// Monthly readings across one year (`mensuelles`).
    Monthly,
}

impl ConsumptionKind {
    pub(crate) fn endpoint(self) -> &'static str {
        match self {
            ConsumptionKind::Daily => "journalieres",
            ConsumptionKind::Monthly => "mensuelles",
        }
    }
}

/// Everything one client instance accumulates across the login flow and the
/// data calls. Created empty at construction, dropped with the client; no
/// persistence across process lifetimes.
#[derive(Debug, Default)]
pub struct AccountData {
    /// Bearer token for the data backend.
    pub access_token: Option<String>,
    /// Token expiry as epoch seconds; 0 means "expired".
    pub token_expiration: i64,
    /// Authorization code from the final redirect, consumed once by the
    /// token exchange.
    pub authorization_code: Option<String>,
    /// PKCE verifier minted on the authorize step.
    pub pkce_verifier: Option<String>,
    /// Subscription id (`id_abonnement`).
    pub subscription_id: Option<String>,
    /// Metering-point id (`numero_pds`), distinct from the subscription id.
    pub metering_point_id: Option<String>,
    /// Contact id (`id_contact`).
    pub contact_id: Option<String>,
    /// Customer record id (`tiers.id`).
    pub customer_id: Option<String>,
    /// Physical meter number (`numero_compteur`).
    pub meter_number: Option<String>,
    /// Subscription start date (`date_debut_abonnement`).
    pub subscription_start_date: Option<String>,
    /// Last fetched monthly consumption payload, overwritten on each fetch.
    pub monthly_consumption: Option<serde_json::Value>,
    /// Last fetched daily consumption payload, overwritten on each fetch.
    pub daily_consumption: Option<serde_json::Value>,
    /// Last fetched alert settings.
    pub alert_settings: Option<AlertSettings>,
}

impl AccountData {
    /// Whether an access token is present and strictly before its expiry.
    pub fn has_valid_token(&self) -> bool {
        self.access_token.is_some() && chrono::Utc::now().timestamp() < self.token_expiration
    }

    /// True once the token and every account identifier are populated.
    pub fn login_complete(&self) -> bool {
        fn filled(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|s| !s.is_empty())
        }

        filled(&self.access_token)
            && filled(&self.subscription_id)
            && filled(&self.metering_point_id)
            && filled(&self.contact_id)
            && filled(&self.customer_id)
            && filled(&self.meter_number)
            && filled(&self.subscription_start_date)
    }
}

/// Consumption alert configuration, one threshold per period.
///
/// `daily_threshold` is in litres (upstream minimum 100), `monthly_threshold`
/// in cubic metres (upstream minimum 1). The email flags are modeled for
/// symmetry but the provider never lets email notification be disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertSettings {
    pub daily_enabled: bool,
    pub daily_threshold: Option<u32>,
    pub daily_notif_email: Option<bool>,
    pub daily_notif_sms: Option<bool>,
    pub monthly_enabled: bool,
    pub monthly_threshold: Option<u32>,
    pub monthly_notif_email: Option<bool>,
    pub monthly_notif_sms: Option<bool>,
}

/// Token endpoint response.
///
/// Both fields are checked by hand rather than required here: an absent
/// `access_token` must surface as a missing-field error, and an absent
/// `expires_in` leaves the token immediately expired.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Alerts endpoint response: `{"seuils": {"journalier": {...}, "mensuel": {...}}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct AlertsResponse {
    #[serde(default)]
    pub seuils: Thresholds,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Thresholds {
    pub journalier: Option<Threshold>,
    pub mensuel: Option<Threshold>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Threshold {
    pub valeur: Option<u32>,
    #[serde(default)]
    pub moyen_contact: ContactMeans,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ContactMeans {
    pub souscrit_par_email: Option<bool>,
    pub souscrit_par_mobile: Option<bool>,
}

impl From<AlertsResponse> for AlertSettings {
    fn from(response: AlertsResponse) -> Self {
        let daily = response.seuils.journalier;
        let monthly = response.seuils.mensuel;
        Self {
            daily_enabled: daily.is_some(),
            daily_threshold: daily.as_ref().and_then(|t| t.valeur),
            daily_notif_email: daily.as_ref().and_then(|t| t.moyen_contact.souscrit_par_email),
            daily_notif_sms: daily.as_ref().and_then(|t| t.moyen_contact.souscrit_par_mobile),
            monthly_enabled: monthly.is_some(),
            monthly_threshold: monthly.as_ref().and_then(|t| t.valeur),
            monthly_notif_email: monthly
                .as_ref()
                .and_then(|t| t.moyen_contact.souscrit_par_email),
            monthly_notif_sms: monthly
                .as_ref()
                .and_then(|t| t.moyen_contact.souscrit_par_mobile),
        }
    }
}

/// Payload for the alerts POST. A period that is not enabled is omitted from
/// the payload entirely, not sent as disabled.
#[derive(Debug, Serialize)]
pub(crate) struct AlertsPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerte_journaliere: Option<AlertSubscription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerte_mensuelle: Option<AlertSubscription>,
    pub contact_id: String,
    pub numero_compteur: String,
    pub tiers_id: String,
    pub abo_id: String,
    pub type_front: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AlertSubscription {
    pub seuil: Option<u32>,
    pub unite: &'static str,
    pub souscrite: bool,
    pub contact_channel: ContactChannel,
}

#[derive(Debug, Serialize)]
pub(crate) struct ContactChannel {
    pub subscribed_by_email: Option<bool>,
    pub subscribed_by_mobile: Option<bool>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_alerts_response_with_missing_daily_threshold() {
        let response: AlertsResponse = serde_json::from_value(serde_json::json!({
            "seuils": {
                "mensuel": {
                    "valeur": 5,
                    "unite": "M3",
                    "moyen_contact": {
                        "souscrit_par_email": true,
                        "souscrit_par_mobile": false
                    }
                }
            }
        }))
        .expect("parse alerts response");

        let settings = AlertSettings::from(response);
        assert_eq!(
            settings,
            AlertSettings {
                daily_enabled: false,
                daily_threshold: None,
                daily_notif_email: None,
                daily_notif_sms: None,
                monthly_enabled: true,
                monthly_threshold: Some(5),
                monthly_notif_email: Some(true),
                monthly_notif_sms: Some(false),
            }
        );
    }

    #[test]
    fn test_alerts_payload_omits_disabled_period() {
        let payload = AlertsPayload {
            alerte_journaliere: None,
            alerte_mensuelle: Some(AlertSubscription {
                seuil: Some(3),
                unite: "M3",
                souscrite: true,
                contact_channel: ContactChannel {
                    subscribed_by_email: Some(true),
                    subscribed_by_mobile: Some(true),
                },
            }),
            contact_id: "contact-1".to_string(),
            numero_compteur: "meter-1".to_string(),
            tiers_id: "tiers-1".to_string(),
            abo_id: "abo-1".to_string(),
            type_front: "WEB_ORDINATEUR",
        };

        let value = serde_json::to_value(&payload).expect("serialize payload");
        assert!(value.get("alerte_journaliere").is_none());
        assert_eq!(value["alerte_mensuelle"]["seuil"], 3);
        assert_eq!(value["alerte_mensuelle"]["souscrite"], true);
        assert_eq!(value["abo_id"], "abo-1");
    }

    #[test]
    fn test_token_validity_window() {
        let mut account = AccountData::default();
        assert!(!account.has_valid_token());

        account.access_token = Some("token".to_string());
        // Default expiration of 0 is already in the past.
        assert!(!account.has_valid_token());

        account.token_expiration = chrono::Utc::now().timestamp() + 3600;
        assert!(account.has_valid_token());

        account.token_expiration = chrono::Utc::now().timestamp();
        assert!(!account.has_valid_token());
    }

    #[test]
    fn test_login_complete_requires_every_identifier() {
        let mut account = AccountData {
            access_token: Some("token".to_string()),
            subscription_id: Some("abo-1".to_string()),
            metering_point_id: Some("pds-1".to_string()),
            contact_id: Some("contact-1".to_string()),
            customer_id: Some("tiers-1".to_string()),
            meter_number: Some("meter-1".to_string()),
            subscription_start_date: Some("2020-01-01".to_string()),
            ..AccountData::default()
        };
        assert!(account.login_complete());

        account.meter_number = Some(String::new());
        assert!(!account.login_complete());

        account.meter_number = None;
        assert!(!account.login_complete());
    }
}

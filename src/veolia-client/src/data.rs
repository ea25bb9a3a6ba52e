//! Data-access calls: consumption, alerts. Every call goes through
//! [`VeoliaClient::ensure_valid_token`] first, so an expired token re-runs
//! the login instead of surfacing an error.

use reqwest::StatusCode;
use tracing::{debug, info};

use crate::client::VeoliaClient;
use crate::constants::TYPE_FRONT;
use crate::models::{
    AlertSettings, AlertSubscription, AlertsPayload, AlertsResponse, ConsumptionKind,
    ContactChannel,
};
use crate::{Result, VeoliaError};

impl VeoliaClient {
    /// Fetch consumption readings: monthly readings across `year`, or daily
    /// readings within `month` of `year` for [`ConsumptionKind::Daily`].
    /// The payload is returned as-is.
    pub async fn get_consumption(
        &mut self,
        kind: ConsumptionKind,
        year: i32,
        month: Option<u32>,
    ) -> Result<serde_json::Value> {
        self.ensure_valid_token().await?;

        let subscription_id = self
            .account_data
            .subscription_id
            .clone()
            .ok_or(VeoliaError::MissingField("id_abonnement"))?;
        let metering_point_id = self
            .account_data
            .metering_point_id
            .clone()
            .ok_or(VeoliaError::MissingField("numero_pds"))?;
        let start_date = self
            .account_data
            .subscription_start_date
            .clone()
            .ok_or(VeoliaError::MissingField("date_debut_abonnement"))?;
        let token = self
            .account_data
            .access_token
            .clone()
            .ok_or(VeoliaError::MissingField("access_token"))?;

        let mut query: Vec<(&str, String)> = vec![
            ("annee", year.to_string()),
            ("numero-pds", metering_point_id),
            ("date-debut-abonnement", start_date),
        ];
        if kind == ConsumptionKind::Daily {
            let month = month.ok_or(VeoliaError::MissingField("mois"))?;
            query.push(("mois", month.to_string()));
        }

        let url = format!(
            "{}/consommations/{}/{}",
            self.backend_base(),
            subscription_id,
            kind.endpoint()
        );
        debug!(?kind, year, ?month, "fetching consumption data");

        let response = self.http.get(&url).query(&query).bearer_auth(&token).send().await?;
        if response.status() != StatusCode::OK {
            return Err(VeoliaError::ApiCallFailed {
                endpoint: "consommations",
                status: response.status(),
            });
        }
        Ok(response.json().await?)
    }

    /// Fetch the consumption alert configuration. A period with no
    /// threshold configured upstream comes back disabled with empty fields.
    pub async fn get_alerts(&mut self) -> Result<AlertSettings> {
        self.ensure_valid_token().await?;

        let metering_point_id = self
            .account_data
            .metering_point_id
            .clone()
            .ok_or(VeoliaError::MissingField("numero_pds"))?;
        let subscription_id = self
            .account_data
            .subscription_id
            .clone()
            .ok_or(VeoliaError::MissingField("id_abonnement"))?;
        let token = self
            .account_data
            .access_token
            .clone()
            .ok_or(VeoliaError::MissingField("access_token"))?;

        let url = format!("{}/alertes/{}", self.backend_base(), metering_point_id);
        let response = self
            .http
            .get(&url)
            .query(&[("abo_id", subscription_id)])
            .bearer_auth(&token)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(VeoliaError::ApiCallFailed {
                endpoint: "alertes",
                status: response.status(),
            });
        }

        let alerts: AlertsResponse = response.json().await?;
        Ok(AlertSettings::from(alerts))
    }

    /// Update the consumption alert configuration. A period that is not
    /// enabled is left out of the payload entirely. Returns whether the
    /// backend acknowledged with 204.
    pub async fn set_alerts(&mut self, settings: &AlertSettings) -> Result<bool> {
        self.ensure_valid_token().await?;

        let contact_id = self
            .account_data
            .contact_id
            .clone()
            .ok_or(VeoliaError::MissingField("id_contact"))?;
        let meter_number = self
            .account_data
            .meter_number
            .clone()
            .ok_or(VeoliaError::MissingField("numero_compteur"))?;
        let customer_id = self
            .account_data
            .customer_id
            .clone()
            .ok_or(VeoliaError::MissingField("tiers_id"))?;
        let subscription_id = self
            .account_data
            .subscription_id
            .clone()
            .ok_or(VeoliaError::MissingField("id_abonnement"))?;
        let metering_point_id = self
            .account_data
            .metering_point_id
            .clone()
            .ok_or(VeoliaError::MissingField("numero_pds"))?;
        let token = self
            .account_data
            .access_token
            .clone()
            .ok_or(VeoliaError::MissingField("access_token"))?;

        let payload = AlertsPayload {
            alerte_journaliere: settings.daily_enabled.then(|| AlertSubscription {
                seuil: settings.daily_threshold,
                unite: "L",
                souscrite: true,
                contact_channel: ContactChannel {
                    subscribed_by_email: settings.daily_notif_email,
                    subscribed_by_mobile: settings.daily_notif_sms,
                },
            }),
            alerte_mensuelle: settings.monthly_enabled.then(|| AlertSubscription {
                seuil: settings.monthly_threshold,
                unite: "M3",
                souscrite: true,
                contact_channel: ContactChannel {
                    subscribed_by_email: settings.monthly_notif_email,
                    subscribed_by_mobile: settings.monthly_notif_sms,
                },
            }),
            contact_id,
            numero_compteur: meter_number,
            tiers_id: customer_id,
            abo_id: subscription_id,
            type_front: TYPE_FRONT,
        };

        let url = format!("{}/alertes/{}", self.backend_base(), metering_point_id);
        let response = self.http.post(&url).bearer_auth(&token).json(&payload).send().await?;
        debug!(status = %response.status(), "alert update response received");
        Ok(response.status() == StatusCode::NO_CONTENT)
    }

    /// Fetch the whole account snapshot into [`AccountData`]: monthly
    /// consumption for `year`, daily consumption for `month` of `year`, and
    /// the alert settings.
    ///
    /// [`AccountData`]: crate::AccountData
    pub async fn fetch_all_data(&mut self, year: i32, month: u32) -> Result<()> {
        let monthly = self.get_consumption(ConsumptionKind::Monthly, year, None).await?;
        self.account_data.monthly_consumption = Some(monthly);

        let daily = self.get_consumption(ConsumptionKind::Daily, year, Some(month)).await?;
        self.account_data.daily_consumption = Some(daily);

        let alerts = self.get_alerts().await?;
        self.account_data.alert_settings = Some(alerts);

        info!(year, month, "account data refreshed");
        Ok(())
    }
}

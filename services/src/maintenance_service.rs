//! Background upkeep: service settings refresh and webhook registration.

use crate::engine::Engine;
use crate::error::SubmissionError;
use crate::lifecycle;
use crate::client::WebhookRequest;
use crate::webhook_service::EventType;
use chrono::{DateTime, Utc};
use db::models::service_setting::{
    self, ENABLED_FEATURES, LATEST_EULA_URL, LATEST_EULA_VERSION, REQUIRE_EULA,
    SETTINGS_REFRESHED_AT, WEBHOOK_ID,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsSnapshot {
    pub eula_version: String,
    pub eula_url: Option<String>,
    pub require_eula: bool,
    /// Whether the published EULA version differs from the stored one.
    pub eula_changed: bool,
}

#[derive(Clone)]
pub struct MaintenanceService {
    engine: Engine,
}

impl MaintenanceService {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Pulls the latest EULA version and tenant features into local settings.
    pub async fn refresh_service_settings(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SettingsSnapshot, SubmissionError> {
        let db = &self.engine.db;
        let config = &self.engine.config;

        let eula = lifecycle::call(config, "latest_eula", self.engine.client.latest_eula()).await?;
        let features =
            lifecycle::call(config, "enabled_features", self.engine.client.enabled_features())
                .await?;

        let previous = service_setting::Entity::get(db, LATEST_EULA_VERSION).await?;
        let eula_changed = previous.as_deref() != Some(eula.version.as_str());

        service_setting::Entity::set(db, LATEST_EULA_VERSION, &eula.version).await?;
        if let Some(url) = &eula.url {
            service_setting::Entity::set(db, LATEST_EULA_URL, url).await?;
        }
        service_setting::Entity::set(db, ENABLED_FEATURES, &features.raw.to_string()).await?;
        service_setting::Entity::set(
            db,
            REQUIRE_EULA,
            if features.require_eula { "true" } else { "false" },
        )
        .await?;
        service_setting::Entity::set(db, SETTINGS_REFRESHED_AT, &now.to_rfc3339()).await?;

        if eula_changed {
            tracing::info!(
                previous = previous.as_deref().unwrap_or("none"),
                current = %eula.version,
                "published EULA version changed"
            );
        }

        Ok(SettingsSnapshot {
            eula_version: eula.version,
            eula_url: eula.url,
            require_eula: features.require_eula,
            eula_changed,
        })
    }

    /// Registers the callback URL once. Returns the webhook id, or `None`
    /// when no callback URL is configured.
    pub async fn ensure_webhook(&self) -> Result<Option<String>, SubmissionError> {
        let db = &self.engine.db;
        let config = &self.engine.config;

        let Some(url) = config.webhook_url.clone() else {
            tracing::debug!("no webhook url configured, relying on polling");
            return Ok(None);
        };
        if let Some(existing) = service_setting::Entity::get(db, WEBHOOK_ID).await? {
            return Ok(Some(existing));
        }

        let request = WebhookRequest {
            url,
            signing_secret: config.webhook_secret.clone(),
            event_types: EventType::ALL.iter().map(|e| e.as_str().to_string()).collect(),
        };
        let registration = lifecycle::call(
            config,
            "register_webhook",
            self.engine.client.register_webhook(&request),
        )
        .await?;

        service_setting::Entity::set(db, WEBHOOK_ID, &registration.id).await?;
        tracing::info!(webhook_id = %registration.id, url = %request.url, "webhook registered");
        Ok(Some(registration.id))
    }
}

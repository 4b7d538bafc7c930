//! Background loops that drive the engine's idempotent entry points.

use crate::state::AppState;
use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Runs a dispatch batch every `every`. A slow batch delays the next tick
/// instead of stacking runs.
pub fn spawn_dispatch_loop(app_state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let dispatcher = app_state.dispatcher();

        loop {
            ticker.tick().await;
            if let Err(e) = dispatcher.run_batch(Utc::now()).await {
                tracing::error!(error = %e, "dispatch batch failed");
            }
        }
    })
}

/// Registers the webhook once, then refreshes the published EULA version and
/// tenant features every `every`. Failures keep the previous settings.
pub fn spawn_settings_loop(app_state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let maintenance = app_state.maintenance();
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut webhook_registered = false;

        loop {
            ticker.tick().await;

            if !webhook_registered {
                match maintenance.ensure_webhook().await {
                    Ok(_) => webhook_registered = true,
                    Err(e) => tracing::warn!(error = %e, "webhook registration failed, will retry"),
                }
            }

            match maintenance.refresh_service_settings(Utc::now()).await {
                Ok(snapshot) => tracing::debug!(
                    eula_version = %snapshot.eula_version,
                    require_eula = snapshot.require_eula,
                    "service settings refreshed"
                ),
                Err(e) => tracing::warn!(error = %e, "service settings refresh failed"),
            }
        }
    })
}

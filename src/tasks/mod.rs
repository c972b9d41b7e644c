//! Background scheduled tasks for the application.
//!
//! The expiration notifiers run once a day at `notifier.run_at_hour` (UTC). Deployments
//! that trigger them through the `/cron` endpoints instead leave `notifier.enabled` off.
//! Call `spawn_all` once during startup to launch them.

use crate::config::NotifierConfig;
use crate::services::NotifierService;
use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Spawn all background tasks.
///
/// Notes
/// - Each run is idempotent per day as implemented in `NotifierService`.
/// - This function detaches tasks via `tokio::spawn`; it does not block.
pub fn spawn_all(notifier_service: NotifierService, config: NotifierConfig) {
    if !config.enabled {
        log::info!("In-process notifier schedule disabled");
        return;
    }

    // 每日到期提醒: 资源 + 广告
    tokio::spawn(async move {
        loop {
            let wait = duration_until_next_run(Utc::now(), config.run_at_hour);
            log::debug!("Next notifier run in {}s", wait.as_secs());
            tokio::time::sleep(wait).await;

            match notifier_service.send_expiration_notifications().await {
                Ok(summary) => log::info!(
                    "Resource notifications finished: sent={} errors={}",
                    summary.sent,
                    summary.errors
                ),
                Err(e) => log::error!("Resource notification run failed: {e:?}"),
            }
            match notifier_service.send_ad_expiration_notifications().await {
                Ok(summary) => log::info!(
                    "Ad notifications finished: sent={} errors={}",
                    summary.sent,
                    summary.errors
                ),
                Err(e) => log::error!("Ad notification run failed: {e:?}"),
            }
        }
    });
}

/// Time left until the next `hour`:00 UTC strictly after `now`.
pub fn duration_until_next_run(now: DateTime<Utc>, hour: u32) -> std::time::Duration {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let mut next = now.date_naive().and_time(at).and_utc();
    if next <= now {
        next += Duration::days(1);
    }
    (next - now).to_std().unwrap_or_default()
}

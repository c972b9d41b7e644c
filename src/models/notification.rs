use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    SevenDayWarning,
    ThreeDayWarning,
    GracePeriodStarted,
    Downgraded,
    AdFourteenDayWarning,
    AdSevenDayWarning,
    Renewal,
    PurchaseConfirmation,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationType::SevenDayWarning => "seven_day_warning",
            NotificationType::ThreeDayWarning => "three_day_warning",
            NotificationType::GracePeriodStarted => "grace_period_started",
            NotificationType::Downgraded => "downgraded",
            NotificationType::AdFourteenDayWarning => "ad_fourteen_day_warning",
            NotificationType::AdSevenDayWarning => "ad_seven_day_warning",
            NotificationType::Renewal => "renewal",
            NotificationType::PurchaseConfirmation => "purchase_confirmation",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationDetail {
    pub entity_id: i64,
    pub entity_name: String,
    pub notification_type: NotificationType,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of one notifier run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NotificationSummary {
    pub sent: u32,
    pub errors: u32,
    pub details: Vec<NotificationDetail>,
}

impl NotificationSummary {
    pub fn record_success(&mut self, entity_id: i64, entity_name: &str, kind: NotificationType) {
        self.sent += 1;
        self.details.push(NotificationDetail {
            entity_id,
            entity_name: entity_name.to_string(),
            notification_type: kind,
            success: true,
            error: None,
        });
    }

    pub fn record_failure(
        &mut self,
        entity_id: i64,
        entity_name: &str,
        kind: NotificationType,
        error: String,
    ) {
        self.errors += 1;
        self.details.push(NotificationDetail {
            entity_id,
            entity_name: entity_name.to_string(),
            notification_type: kind,
            success: false,
            error: Some(error),
        });
    }
}

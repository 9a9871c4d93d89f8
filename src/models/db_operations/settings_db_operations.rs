use crate::models::db_operations::baas_client::{BaasClient, BaasError};
use crate::models::settings::UserSettings;
use crate::models::UserSettingsRow;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

pub async fn fetch_settings_row(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
) -> Result<Option<UserSettingsRow>, BaasError> {
    client
        .table("user_settings", Some(token))
        .select("*")
        .eq("user_id", user_id)
        .fetch_optional()
        .await
}

/// One row per user, keyed on `user_id`.
pub async fn upsert_settings(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
    settings: &UserSettings,
) -> Result<(), BaasError> {
    client
        .table("user_settings", Some(token))
        .upsert(
            &json!({
                "user_id": user_id,
                "language": settings.language.code(),
                "theme": settings.theme.as_str(),
                "updated_at": Utc::now().to_rfc3339(),
            }),
            "user_id",
        )
        .await
}

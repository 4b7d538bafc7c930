//! Key/value settings fetched from the similarity service by the refresh task.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, DatabaseConnection, DbErr, IntoActiveModel};

pub const LATEST_EULA_VERSION: &str = "latest_eula_version";
pub const LATEST_EULA_URL: &str = "latest_eula_url";
pub const ENABLED_FEATURES: &str = "enabled_features";
pub const REQUIRE_EULA: &str = "require_eula";
pub const WEBHOOK_ID: &str = "webhook_id";
pub const SETTINGS_REFRESHED_AT: &str = "settings_refreshed_at";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "service_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    #[sea_orm(column_type = "Text")]
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    pub async fn get(db: &DatabaseConnection, key: &str) -> Result<Option<String>, DbErr> {
        Ok(Entity::find_by_id(key.to_string())
            .one(db)
            .await?
            .map(|m| m.value))
    }

    pub async fn set(db: &DatabaseConnection, key: &str, value: &str) -> Result<(), DbErr> {
        let now = Utc::now();
        match Entity::find_by_id(key.to_string()).one(db).await? {
            Some(existing) => {
                let mut am = existing.into_active_model();
                am.value = Set(value.to_string());
                am.updated_at = Set(now);
                am.update(db).await?;
            }
            None => {
                ActiveModel {
                    key: Set(key.to_string()),
                    value: Set(value.to_string()),
                    updated_at: Set(now),
                }
                .insert(db)
                .await?;
            }
        }
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, DatabaseConnection, DbErr, IntoActiveModel};
use serde::Serialize;

/// The latest EULA version a user accepted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "user_eula_acceptances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    pub accepted_version: String,
    pub accepted_at: DateTime<Utc>,
    pub locale: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    pub async fn find_for_user(
        db: &DatabaseConnection,
        user_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(user_id).one(db).await
    }

    /// Stores an acceptance, replacing any earlier one for the user.
    pub async fn upsert_acceptance(
        db: &DatabaseConnection,
        user_id: i64,
        version: &str,
        locale: &str,
        accepted_at: DateTime<Utc>,
    ) -> Result<Model, DbErr> {
        match Entity::find_by_id(user_id).one(db).await? {
            Some(existing) => {
                let mut am = existing.into_active_model();
                am.accepted_version = Set(version.to_string());
                am.accepted_at = Set(accepted_at);
                am.locale = Set(locale.to_string());
                am.update(db).await
            }
            None => {
                ActiveModel {
                    user_id: Set(user_id),
                    accepted_version: Set(version.to_string()),
                    accepted_at: Set(accepted_at),
                    locale: Set(locale.to_string()),
                }
                .insert(db)
                .await
            }
        }
    }
}

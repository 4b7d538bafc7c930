//! Lookups memoised for the lifetime of one batch or request.
//!
//! A `BatchCache` is created by whoever starts the unit of work and dropped
//! with it; nothing is shared between batches.

use crate::eula_service::{ConsentRequirement, EulaService};
use db::models::{course_module, user_eula};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use std::collections::HashMap;
use tokio::sync::{Mutex, OnceCell};

#[derive(Default)]
pub struct BatchCache {
    modules: Mutex<HashMap<i64, Option<course_module::Model>>>,
    consents: Mutex<HashMap<i64, Option<user_eula::Model>>>,
    requirement: OnceCell<ConsentRequirement>,
}

impl BatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn module(
        &self,
        db: &DatabaseConnection,
        id: i64,
    ) -> Result<Option<course_module::Model>, DbErr> {
        let mut modules = self.modules.lock().await;
        if let Some(hit) = modules.get(&id) {
            return Ok(hit.clone());
        }
        let loaded = course_module::Entity::find_by_id(id).one(db).await?;
        modules.insert(id, loaded.clone());
        Ok(loaded)
    }

    pub async fn consent(
        &self,
        db: &DatabaseConnection,
        user_id: i64,
    ) -> Result<Option<user_eula::Model>, DbErr> {
        let mut consents = self.consents.lock().await;
        if let Some(hit) = consents.get(&user_id) {
            return Ok(hit.clone());
        }
        let loaded = user_eula::Entity::find_for_user(db, user_id).await?;
        consents.insert(user_id, loaded.clone());
        Ok(loaded)
    }

    pub async fn requirement(&self, db: &DatabaseConnection) -> Result<ConsentRequirement, DbErr> {
        self.requirement
            .get_or_try_init(|| EulaService::published_requirement(db))
            .await
            .cloned()
    }
}

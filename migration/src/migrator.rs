use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202601050001_create_course_modules::Migration),
            Box::new(migrations::m202601050002_create_similarity_submissions::Migration),
            Box::new(migrations::m202601050003_create_user_eula_acceptances::Migration),
            Box::new(migrations::m202601050004_create_service_settings::Migration),
        ]
    }
}

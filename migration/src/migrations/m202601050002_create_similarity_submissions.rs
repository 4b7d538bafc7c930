use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202601050002_create_similarity_submissions"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("similarity_submissions"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("external_id")).string().null())
                    .col(ColumnDef::new(Alias::new("kind")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("course_module_id"))
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("item_id")).big_integer().null())
                    .col(ColumnDef::new(Alias::new("author_id")).big_integer().not_null())
                    .col(
                        ColumnDef::new(Alias::new("submitter_id"))
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("group_id")).big_integer().null())
                    .col(ColumnDef::new(Alias::new("identifier")).string().not_null())
                    .col(ColumnDef::new(Alias::new("filename")).string().null())
                    .col(ColumnDef::new(Alias::new("content_path")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("content_size"))
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .string()
                            .not_null()
                            .default("NOT_SENT"),
                    )
                    .col(ColumnDef::new(Alias::new("error_code")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("attempts"))
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Alias::new("next_retry_at")).timestamp().null())
                    .col(ColumnDef::new(Alias::new("submitted_at")).timestamp().null())
                    .col(ColumnDef::new(Alias::new("processed_at")).timestamp().null())
                    .col(
                        ColumnDef::new(Alias::new("to_generate"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Alias::new("generation_time")).timestamp().null())
                    .col(ColumnDef::new(Alias::new("requested_at")).timestamp().null())
                    .col(ColumnDef::new(Alias::new("overall_score")).integer().null())
                    .col(
                        ColumnDef::new(Alias::new("version"))
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Alias::new("lease_until")).timestamp().null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        ColumnDef::new(Alias::new("updated_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_similarity_submissions_course_module")
                            .from(
                                Alias::new("similarity_submissions"),
                                Alias::new("course_module_id"),
                            )
                            .to(Alias::new("course_modules"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_similarity_submissions_same_work")
                    .table(Alias::new("similarity_submissions"))
                    .col(Alias::new("identifier"))
                    .col(Alias::new("author_id"))
                    .col(Alias::new("course_module_id"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_similarity_submissions_external_id")
                    .table(Alias::new("similarity_submissions"))
                    .col(Alias::new("external_id"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_similarity_submissions_dispatch")
                    .table(Alias::new("similarity_submissions"))
                    .col(Alias::new("status"))
                    .col(Alias::new("next_retry_at"))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("similarity_submissions"))
                    .to_owned(),
            )
            .await
    }
}

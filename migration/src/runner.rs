use colored::*;
use futures::FutureExt;
use migration::Migrator;
use sea_orm_migration::prelude::*;
use std::io::{self, Write};
use std::time::Instant;

const STATUS_COLUMN: usize = 80;

/// Applies every pending migration, printing one status line per migration.
///
/// Uses the migrator's bookkeeping table, so re-running is a no-op for
/// migrations that already ran.
pub async fn run_all_migrations(url: &str) -> Result<(), DbErr> {
    let db = sea_orm::Database::connect(url).await?;

    println!("Running migrations...");
    let pending = Migrator::get_pending_migrations(&db).await?;
    if pending.is_empty() {
        println!("{}", "Nothing to apply".dimmed());
        return Ok(());
    }

    for migration in pending {
        let name_str = format!("Applying {}", migration.name().bold());
        let dots = ".".repeat(STATUS_COLUMN.saturating_sub(name_str.len()));
        print!("{}{} ", name_str, dots);
        io::stdout().flush().ok();

        let start = Instant::now();
        // Run through the migrator so the applied version is recorded.
        let result = std::panic::AssertUnwindSafe(Migrator::up(&db, Some(1)))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(())) => {
                let time_str = format!("({:.2?})", start.elapsed()).dimmed();
                println!("{} {}", "done".green(), time_str);
            }
            Ok(Err(err)) => {
                println!("{}", "failed".red());
                return Err(err);
            }
            Err(_) => {
                println!("{}", "panicked".red());
                return Err(DbErr::Custom(format!(
                    "migration {} panicked",
                    migration.name()
                )));
            }
        }
    }
    Ok(())
}

use std::{fs, path::Path, process::ExitCode};
use util::config::AppConfig;

mod runner;

#[tokio::main]
async fn main() -> ExitCode {
    let config = AppConfig::from_env();
    let db_path = config.database_path.clone();
    let url = format!("sqlite://{}?mode=rwc", db_path);
    let args: Vec<String> = std::env::args().collect();

    let result = match args.get(1).map(|s| s.as_str()) {
        Some("clean") => {
            remove_db_file(&db_path);
            remove_storage(&config.storage_root);
            Ok(())
        }
        Some("fresh") => {
            remove_db_file(&db_path);
            remove_storage(&config.storage_root);
            create_db_dir(&db_path);
            runner::run_all_migrations(&url).await
        }
        _ => {
            create_db_dir(&db_path);
            runner::run_all_migrations(&url).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Migration failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn remove_db_file(path: &str) {
    let db_path = Path::new(path);
    if db_path.exists() {
        match fs::remove_file(db_path) {
            Ok(()) => println!("Deleted DB: {}", db_path.display()),
            Err(err) => eprintln!("Failed to delete DB {}: {err}", db_path.display()),
        }
    } else {
        println!("DB file does not exist: {}", db_path.display());
    }
}

fn remove_storage(root: &str) {
    let storage_path = Path::new(root);
    if storage_path.exists() {
        match fs::remove_dir_all(storage_path) {
            Ok(()) => println!("Deleted stored submissions: {}", storage_path.display()),
            Err(err) => eprintln!("Failed to delete {}: {err}", storage_path.display()),
        }
    } else {
        println!("Submission storage does not exist: {}", storage_path.display());
    }
}

fn create_db_dir(path: &str) {
    if let Some(parent) = Path::new(path).parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            eprintln!("Failed to create DB directory {}: {err}", parent.display());
        }
    }
}

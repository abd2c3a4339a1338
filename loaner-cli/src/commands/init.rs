//! Init command implementation.
//!
//! Creates the data directory, the database and optionally a default
//! configuration file.

use crate::error::CliError;
use crate::utils::{resolve_data_dir, shorten_path, GlobalOptions};
use clap::Args;
use loaner::config::{Config, ConfigLoader, CONFIG_FILE_NAME};
use loaner::database::database_path;
use loaner::{Database, DatabaseConfig};

/// Initialize the loaner data directory and database.
#[derive(Args)]
pub struct InitCommand {
    /// Create a default configuration file
    #[arg(long)]
    pub with_config: bool,
}

impl InitCommand {
    /// Execute the init command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let data_dir = resolve_data_dir(global)?;
        let data_dir_created = !data_dir.exists();
        std::fs::create_dir_all(&data_dir)?;

        let db_path = database_path(&data_dir);
        let database_created = !db_path.exists();
        let mut db_config = DatabaseConfig::new(&db_path);
        if let Some(timeout_ms) = global.busy_timeout {
            db_config = db_config.with_busy_timeout(std::time::Duration::from_millis(timeout_ms));
        }
        // Opening creates the schema, or checks an existing one
        Database::open(db_config)?;

        let config_path = data_dir.join(CONFIG_FILE_NAME);
        let config_created = self.with_config && !config_path.exists();
        if config_created {
            ConfigLoader::write_file(&config_path, &Config::with_defaults())?;
        }

        if !global.quiet {
            println!("Initialized loaner in: {}", shorten_path(&data_dir));
            if data_dir_created {
                println!("  - Created data directory");
            }
            if database_created {
                println!("  - Created database");
            } else {
                println!("  - Database already exists");
            }
            if config_created {
                println!("  - Created default configuration file");
            } else if self.with_config {
                println!("  - Configuration file already exists (not overwritten)");
            }
        }

        Ok(())
    }
}

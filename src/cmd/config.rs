//! Configuration view and validation commands: `crm-kanban config`.

use anyhow::Result;

use super::super::ConfigCommands;
use crm_kanban::kanban_config::{CONFIG_FILE, ENV_BACKEND_URL, ENV_REQUEST_TIMEOUT, KanbanConfig, KanbanToml};

fn print_sections(toml: &KanbanToml) {
    println!("[backend]");
    println!("  base_url = \"{}\"", toml.backend.base_url);
    println!("  request_timeout_secs = {}", toml.backend.request_timeout_secs);
    println!();
    println!("[board]");
    println!("  unknown_stage = \"{}\"", toml.board.unknown_stage.as_str());
    println!("  activation_distance = {}", toml.board.activation_distance);
    println!();
    println!("[server]");
    println!("  port = {}", toml.server.port);
    println!("  dev_mode = {}", toml.server.dev_mode);
    println!();
    println!("[logging]");
    println!("  format = \"{}\"", toml.logging.format);
    println!();
}

pub fn cmd_config(config: &KanbanConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("CRM Kanban Configuration");
            println!("========================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No {} found at {}", CONFIG_FILE, config_path.display());
                println!("Using default configuration:");
            }
            println!();
            print_sections(&config.toml);

            println!("Effective values (with env/CLI overrides):");
            println!("  backend_url = \"{}\"", config.backend_url());
            println!("  request_timeout = {}s", config.request_timeout().as_secs());
            println!();
            if !config_path.exists() {
                println!("Run 'crm-kanban config init' to create a {} file.", CONFIG_FILE);
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                if config_path.exists() {
                    println!("Configuration is valid.");
                } else {
                    println!("No {} found. Using defaults (valid).", CONFIG_FILE);
                }
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists at {}", CONFIG_FILE, config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !config.config_dir.exists() {
                std::fs::create_dir_all(&config.config_dir)?;
            }

            KanbanToml::default().save(&config_path)?;

            println!("Created {} at {}", CONFIG_FILE, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [backend] base_url, request_timeout_secs");
            println!("  - [board] unknown_stage, activation_distance");
            println!("  - [server] port, dev_mode");
            println!();
            println!("{} and {} override the file.", ENV_BACKEND_URL, ENV_REQUEST_TIMEOUT);
            println!();
        }
    }

    Ok(())
}

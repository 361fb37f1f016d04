//! `taskloom config`: saved configuration management.

use anyhow::Context;
use clap::Subcommand;
use taskloom_config::{AppConfig, ConfigStore, FileConfigStore, Settings};
use taskloom_controller::Mode;

use super::apply_assignments;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Save `--set` assignments as a named configuration for a mode
    Save {
        mode: String,
        id: String,
        /// Setting to store, as key=value (repeatable)
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Print a saved configuration
    Load { mode: String, id: String },

    /// List saved configurations (all modes when none is given)
    List { mode: Option<String> },

    /// Delete a saved configuration
    Delete { mode: String, id: String },

    /// Print the effective application config (API key redacted)
    Show,

    /// Print the path of the config file
    Path,
}

pub fn run(command: ConfigCommand) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let store = FileConfigStore::new(config.store_dir());

    match command {
        ConfigCommand::Save { mode, id, set } => {
            let mode = Mode::resolve(&mode);
            let settings = apply_assignments(Settings::new(), &set)?;
            store.save(mode.name(), &id, &settings)?;
            println!("Saved {} setting(s) as {mode}/{id}", settings.len());
        }
        ConfigCommand::Load { mode, id } => {
            let settings = store
                .load(&mode, &id)?
                .with_context(|| format!("No saved configuration {mode}/{id}"))?;
            print!("{}", toml::to_string_pretty(&settings)?);
        }
        ConfigCommand::List { mode } => {
            let modes: Vec<String> = match mode {
                Some(mode) => vec![mode],
                None => Mode::ALL.iter().map(|m| m.name().to_string()).collect(),
            };
            for mode in modes {
                for id in store.list(&mode)? {
                    println!("{mode}/{id}");
                }
            }
        }
        ConfigCommand::Delete { mode, id } => {
            if store.delete(&mode, &id)? {
                println!("Deleted {mode}/{id}");
            } else {
                println!("No saved configuration {mode}/{id}");
            }
        }
        ConfigCommand::Show => {
            let mut shown = config.clone();
            if shown.api_key.is_some() {
                shown.api_key = Some("[REDACTED]".into());
            }
            print!("{}", toml::to_string_pretty(&shown)?);
        }
        ConfigCommand::Path => {
            println!("{}", AppConfig::config_dir().join("config.toml").display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = taskloom_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().ends_with("config.toml"));
    }
}

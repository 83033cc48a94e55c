use crate::errors::RunError;
use crate::logger;
use crate::GlobalOpts;
use clap::Subcommand;
use colored::*;
use terraprep_config::settings::SETTINGS_KEYS;
use terraprep_config::Settings;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the stored settings
    Show,
    /// Change a setting (fetcher, fetcher-path, no-clobber, data-dir)
    Set { key: String, value: String },
    /// Get or set the path to the settings file.
    /// If `new_path` is provided, later runs read settings from that file.
    /// If omitted, the current settings file path is printed.
    Path {
        /// Optional new settings path to set
        new_path: Option<String>,
    },
}

pub fn handle_config(action: ConfigAction, opts: &GlobalOpts) -> Result<(), RunError> {
    match action {
        ConfigAction::Show => {
            let settings = Settings::load()?;
            println!("{}", "Configuration:".bold().green());
            if settings.is_empty() {
                if opts.verbosity_level() > 0 {
                    println!("  {}", "(empty)".yellow());
                }
            } else {
                for (key, value) in settings.values_iter() {
                    println!("  {}: {}", key.cyan(), value);
                }
            }
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            if !SETTINGS_KEYS.contains(&key.as_str()) {
                return Err(RunError::InvalidArgs(format!(
                    "Unknown config key: {}. Supported keys: {}",
                    key,
                    SETTINGS_KEYS.join(", ")
                )));
            }
            let mut settings = Settings::load()?;
            settings.set(&key, &value)?;
            settings.save()?;
            logger::success(&format!("Set {} = {}", key, value));
            Ok(())
        }
        ConfigAction::Path { new_path } => {
            let settings_path = Settings::path();
            logger::debug(&format!(
                "Reading settings from: {}",
                settings_path.display()
            ));
            let pointer_path = Settings::pointer_path();

            match new_path {
                Some(p) => {
                    if let Some(parent) = pointer_path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&pointer_path, p.as_bytes())?;
                    logger::success(&format!("Config path set to {}", p));
                }
                None => {
                    println!("{}", settings_path.display());

                    if let Ok(contents) = std::fs::read_to_string(&pointer_path) {
                        let trimmed = contents.trim();
                        if !trimmed.is_empty() {
                            println!("{} {}", "overridden-by".cyan(), trimmed);
                        }
                    }
                }
            }
            Ok(())
        }
    }
}

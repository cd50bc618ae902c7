//! Management commands: config

use anyhow::{bail, Context, Result};
use devauto_config::GlobalConfig;

/// Show or edit the global configuration
pub fn config(edit: bool) -> Result<()> {
    let config_path = GlobalConfig::config_path()?;

    if edit {
        // Create config file with defaults if it doesn't exist
        let config = if config_path.exists() {
            GlobalConfig::load_from(&config_path)?
        } else {
            let config = GlobalConfig::default();
            config.save_to(&config_path)?;
            println!("Created default config at {:?}", config_path);
            config
        };

        let editor = config
            .defaults
            .editor
            .clone()
            .or_else(|| std::env::var("EDITOR").ok())
            .unwrap_or_else(|| "vi".to_string());
        let mut parts = shell_words::split(&editor)
            .with_context(|| format!("Invalid editor command: {}", editor))?;
        if parts.is_empty() {
            bail!("Editor command is empty");
        }
        let program = parts.remove(0);

        let status = std::process::Command::new(&program)
            .args(&parts)
            .arg(&config_path)
            .status()
            .with_context(|| format!("Failed to open editor: {}", editor))?;
        if !status.success() {
            bail!("Editor exited with {}", status);
        }

        // Catch mistakes right away rather than on the next run
        GlobalConfig::load_from(&config_path)?;
    } else if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("# Config file: {:?}\n", config_path);
        println!("{}", content);
    } else {
        println!("# Config file: {:?} (not created yet)\n", config_path);
        println!("# Default configuration:");
        let content = toml::to_string_pretty(&GlobalConfig::default())?;
        println!("{}", content);
        println!("\n# Run 'devauto config --edit' to create and edit the config file.");
    }

    Ok(())
}

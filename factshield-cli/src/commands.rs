//! CLI subcommand handlers.

use crate::ConfigAction;
use factshield_core::FactShieldConfig;
use factshield_core::config::write_workspace_config;
use std::path::Path;

pub fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace.join(".factshield").join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let path = write_workspace_config(workspace, &FactShieldConfig::default())?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = factshield_core::load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", config.to_toml()?);
            if !factshield_core::config_exists(Some(workspace)) {
                println!("# (built-in defaults; run `factshield config init` to customize)");
            }
            Ok(())
        }
    }
}

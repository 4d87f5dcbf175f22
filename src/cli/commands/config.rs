//! Config command implementation.

use super::GlobalOptions;
use crate::core::config::Config;
use anyhow::Result;
use clap::{Args, Subcommand};

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration.
    Validate,
    /// Print the effective configuration with defaults filled in.
    Show,
    /// Print a configuration template.
    Generate,
}

/// Run the config command.
pub fn run_config(global: &GlobalOptions, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Validate => {
            let config = global.load_config()?;
            println!("✓ Configuration is valid");
            println!("  server:   {}", config.connection.address());
            println!("  protocol: RESP{}", config.connection.protocol);
            if config.cluster.enabled {
                println!("  cluster:  {} seed(s)", config.cluster.seeds.len());
            }
            Ok(())
        }
        ConfigCommand::Show => {
            let config = global.load_config()?;
            print!("{}", config.redacted().to_toml()?);
            Ok(())
        }
        ConfigCommand::Generate => {
            print!("{}", template());
            Ok(())
        }
    }
}

fn template() -> String {
    let mut out = String::from("# Tether configuration\n\n");
    out.push_str(&Config::default().to_toml().unwrap_or_default());
    out.push_str(
        r#"
# Per-command wait budgets in milliseconds.
# [timeouts.commands]
# BLPOP = 30000
# KEYS = 10000
"#,
    );
    out
}

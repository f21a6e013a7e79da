use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "idx-issuer")]
#[command(about = "Issues IRMA credentials from iDEAL and iDIN bank transactions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Print the configuration and check that upstream services are reachable
    Config,
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!(
        "  Static Dir: {}",
        config.static_dir.as_deref().unwrap_or("(none)")
    );
    println!("  IRMA Server URL: {}", config.irma_server_url);
    println!("  IRMA Server Token: {}", mask_token(&config.irma_server_token));

    match &config.ideal {
        Some(ideal) => {
            println!("  iDEAL:");
            println!("    Gateway URL: {}", ideal.gateway_url);
            println!("    Path Prefix: {}", ideal.path_prefix);
            println!("    Credential: {}", ideal.credential_id);
            println!("    Amounts: {}", ideal.payment_amounts.join(", "));
            if let Some(redirect) = &ideal.redirect_url {
                println!("    Redirect URL: {}", redirect);
            }
        }
        None => println!("  iDEAL: disabled"),
    }

    match &config.idin {
        Some(idin) => {
            println!("  iDIN:");
            println!("    Gateway URL: {}", idin.gateway_url);
            println!("    Path Prefix: {}", idin.path_prefix);
            println!("    Credential: {}", idin.credential_id);
        }
        None => println!("  iDIN: disabled"),
    }

    if config.ideal.is_none() && config.idin.is_none() {
        anyhow::bail!("Neither iDEAL nor iDIN is enabled");
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_token(token: &str) -> String {
    match token.chars().count() {
        0 => "(none)".to_string(),
        n if n <= 4 => "****".to_string(),
        _ => {
            let head: String = token.chars().take(4).collect();
            format!("{}****", head)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token(""), "(none)");
        assert_eq!(mask_token("abc"), "****");
        assert_eq!(mask_token("secret-token"), "secr****");
    }

    #[test]
    fn test_cli_defaults_to_no_command() {
        let cli = Cli::parse_from(["idx-issuer"]);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["idx-issuer", "config"]);
        assert!(matches!(cli.command, Some(Commands::Config)));
    }
}

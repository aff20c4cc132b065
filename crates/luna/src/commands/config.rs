//! Config command - configuration management.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use luna_config::{ChainSecretStore, LunaConfig, secret_env_var};

use super::{Context, print_json};

const REDACTED: &str = "<redacted>";

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved workspace and experiment settings (secrets redacted)
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Store the service principal secret in the system keyring
    SetSecret {
        /// Secret name, as referenced by workspace.secret_name
        name: String,
    },

    /// Remove a secret from the system keyring
    DeleteSecret {
        /// Secret name
        name: String,
    },

    /// Show the user config file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::SetSecret { name } => cmd_set_secret(&name),
        ConfigCommand::DeleteSecret { name } => cmd_delete_secret(&name),
        ConfigCommand::Path => cmd_path(),
    }
}

/// Config as displayed: plaintext secret values replaced.
fn redacted(config: &LunaConfig) -> serde_json::Value {
    let secrets: serde_json::Map<String, serde_json::Value> = config
        .secrets
        .keys()
        .map(|k| (k.clone(), serde_json::Value::from(REDACTED)))
        .collect();
    serde_json::json!({
        "workspace": config.workspace,
        "experiment": config.experiment(),
        "http": config.http(),
        "secrets": secrets,
    })
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;

    if ctx.json_output {
        return print_json(&redacted(config));
    }

    let dim = Style::new().dim();
    println!("{}\n", style("# Luna Configuration").bold());

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    match &config.workspace {
        Some(ws) => {
            println!("Workspace:");
            println!("  resource_id:    {}", ws.resource_id);
            println!("  tenant_id:      {}", ws.tenant_id);
            println!("  application_id: {}", ws.application_id);
            println!("  secret_name:    {}", ws.secret_name);
            match ws.api_base_url() {
                Ok(url) => println!("  api:            {}", url),
                Err(e) => println!("  api:            {}", dim.apply_to(e.to_string())),
            }
            if let Some(host) = &ws.authority_host {
                println!("  authority:      {}", host);
            }
            let secret_status = match ChainSecretStore::with_config_secrets(config.secrets.clone())
                .resolve(&ws.secret_name)
            {
                Some(secret) => format!("✓ {}", secret.source),
                None => format!("✗ not found (set {})", secret_env_var(&ws.secret_name)),
            };
            println!("  secret:         {}", secret_status);
        }
        None => println!("{}", dim.apply_to("No workspace configured")),
    }
    println!();

    let experiment = config.experiment();
    println!("Experiment:");
    println!("  name:     {}", experiment.name);
    println!("  run_type: {}", experiment.run_type);
    println!();

    println!("HTTP:");
    println!("  timeout: {}s", config.http().timeout_secs);
    println!();

    if !config.secrets.is_empty() {
        println!("Secrets:");
        for name in config.secrets.keys() {
            println!("  {} = {}", name, REDACTED);
        }
        println!();
    }

    if !loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &loaded.warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    if ctx.json_output {
        let sources: Vec<_> = loaded
            .sources
            .iter()
            .map(|s| serde_json::json!({ "path": s.path, "loaded": s.loaded }))
            .collect();
        return print_json(&sources);
    }

    println!("Config file search order (later overrides earlier):\n");
    for source in &loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }
    println!();
    println!("{} config file(s) loaded.", loaded.loaded_from().len());

    Ok(())
}

fn cmd_set_secret(name: &str) -> Result<()> {
    println!("Enter the value for secret '{}':", name);

    let mut value = String::new();
    std::io::stdin().read_line(&mut value)?;
    let value = value.trim();

    if value.is_empty() {
        println!("No value provided, aborting.");
        return Ok(());
    }

    match luna_config::secrets::store_in_keyring(name, value) {
        Ok(()) => println!("✓ Secret '{}' stored in system keyring", name),
        Err(e) => {
            eprintln!("Failed to store in keyring: {}", e);
            eprintln!(
                "Fallback: set the {} environment variable instead.",
                secret_env_var(name)
            );
        }
    }
    Ok(())
}

fn cmd_delete_secret(name: &str) -> Result<()> {
    match luna_config::secrets::delete_from_keyring(name) {
        Ok(()) => println!("✓ Secret '{}' removed from keyring", name),
        Err(e) => eprintln!("Failed to delete from keyring: {}", e),
    }
    Ok(())
}

fn cmd_path() -> Result<()> {
    let path = luna_config::user_config_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    println!("{}", path.display());
    Ok(())
}

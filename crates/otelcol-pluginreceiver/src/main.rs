//! plugin-render - Check and render plugins outside a collector
//!
//! # Usage
//!
//! ```bash
//! # Check parameter values against a plugin
//! plugin-render -p nginx.yaml --param start_at=beginning validate
//!
//! # Print the collector config a `plugin/nginx` receiver would run
//! plugin-render -p nginx.yaml --id plugin/nginx --param file_path='[/var/log/a.log]' render
//!
//! # Show the parameters a plugin accepts
//! plugin-render -p nginx.yaml describe
//! ```
//!
//! Parameter values are parsed as YAML, so `--param n=3` supplies an int and
//! `--param paths='[a, b]'` a string list.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use otelcol_core::ComponentId;
use otelcol_pluginreceiver::{ParameterMap, Plugin, Stage};
use serde_yaml::Value;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "plugin-render")]
#[command(version, about = "Validate and render collector plugins")]
struct Cli {
    /// Path to the plugin file
    #[arg(short, long)]
    plugin: PathBuf,

    /// Parameter value as key=value, repeatable
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, Value)>,

    /// Id of the receiver the plugin is rendered for
    #[arg(long, default_value = "plugin")]
    id: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check parameter values against the plugin
    Validate,
    /// Print the rendered collector config
    Render,
    /// List the plugin's parameters
    Describe,
}

fn parse_param(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got {:?}", raw))?;
    if key.is_empty() {
        return Err(anyhow!("empty parameter name in {:?}", raw));
    }
    let value = match serde_yaml::from_str(value)? {
        Value::Null => Value::String(value.to_string()),
        value => value,
    };
    Ok((key.to_string(), value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let plugin = Plugin::load(&cli.plugin)
        .map_err(|e| e.in_stage(Stage::Load))
        .with_context(|| format!("Failed to load plugin from {}", cli.plugin.display()))?;
    debug!(plugin = %plugin.title, plugin_version = %plugin.version, "Loaded plugin");

    let values: ParameterMap = cli.params.into_iter().collect();

    match cli.command {
        Commands::Validate => {
            plugin
                .check_parameters(&values)
                .map_err(|e| e.in_stage(Stage::Validate))?;
            info!(plugin = %plugin.title, "Parameters are valid");
            Ok(())
        }
        Commands::Render => {
            let id: ComponentId = cli.id.parse()?;
            plugin
                .check_parameters(&values)
                .map_err(|e| e.in_stage(Stage::Validate))?;
            let rendered = plugin
                .render(&values, &id)
                .map_err(|e| e.in_stage(Stage::Render))?;
            print!("{}", rendered.to_yaml()?);
            Ok(())
        }
        Commands::Describe => {
            describe(&plugin);
            Ok(())
        }
    }
}

fn describe(plugin: &Plugin) {
    println!("{} {}", plugin.title, plugin.version);
    if !plugin.description.is_empty() {
        println!("{}", plugin.description);
    }
    println!();
    println!("{:<24} {:<12} {:<9} DEFAULT", "NAME", "TYPE", "REQUIRED");
    for parameter in &plugin.parameters {
        let parameter_type = parameter
            .parameter_type
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let default = parameter
            .default
            .as_ref()
            .and_then(|d| serde_yaml::to_string(d).ok())
            .map(|d| d.trim_end().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<12} {:<9} {}",
            parameter.name, parameter_type, parameter.required, default
        );
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

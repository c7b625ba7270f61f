//! `execmind` - operate the ExecMind dispatch layer from the shell.
//!
//! ```text
//! execmind route --role suggestion --quiet
//! execmind guard --role suggestion "Follow up with Dana today."
//! execmind dispatch --role planning --prompt "Plan my week" --var goal=launch --telemetry
//! ```
//!
//! Without a `providers` list in the config, the four standard backends are
//! served by offline echo providers.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

use execmind_core::OutputGuard;
use execmind_runtime::{
    Budget, Depth, Dispatcher, EchoProvider, IntentFlags, ProviderRegistry, Role, RuntimeConfig,
};

#[derive(Parser)]
#[command(name = "execmind")]
#[command(about = "Resilient multi-provider model dispatch")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the routing decision for a request as JSON
    Route {
        #[command(flatten)]
        intent: IntentArgs,
    },

    /// Check text against a role's output policy
    Guard {
        /// Role whose policy applies
        #[arg(long)]
        role: Role,

        /// Text to check
        text: String,
    },

    /// Run one dispatch through the configured providers
    Dispatch {
        #[command(flatten)]
        intent: IntentArgs,

        /// Rendered prompt text
        #[arg(long)]
        prompt: String,

        /// Prompt template version, part of the cache key
        #[arg(long, default_value = "v1")]
        prompt_version: String,

        /// Prompt variable as key=value; values parse as JSON when they can
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, JsonValue)>,

        /// Print the telemetry snapshot after the result
        #[arg(long)]
        telemetry: bool,
    },
}

#[derive(Args)]
struct IntentArgs {
    /// Request role (planning, suggestion)
    #[arg(long)]
    role: Role,

    /// Requested depth
    #[arg(long, value_enum)]
    depth: Option<DepthArg>,

    /// Budget hint
    #[arg(long, value_enum)]
    budget: Option<BudgetArg>,

    /// Prefer terse, low-cost output
    #[arg(long)]
    quiet: bool,
}

impl IntentArgs {
    fn flags(&self) -> IntentFlags {
        let mut flags = IntentFlags::default();
        if let Some(depth) = self.depth {
            flags = flags.with_depth(depth.into());
        }
        if let Some(budget) = self.budget {
            flags = flags.with_budget(budget.into());
        }
        if self.quiet {
            flags = flags.quiet();
        }
        flags
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DepthArg {
    Low,
    Medium,
    High,
}

impl From<DepthArg> for Depth {
    fn from(arg: DepthArg) -> Self {
        match arg {
            DepthArg::Low => Depth::Low,
            DepthArg::Medium => Depth::Medium,
            DepthArg::High => Depth::High,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum BudgetArg {
    Low,
    Standard,
    High,
}

impl From<BudgetArg> for Budget {
    fn from(arg: BudgetArg) -> Self {
        match arg {
            BudgetArg::Low => Budget::Low,
            BudgetArg::Standard => Budget::Standard,
            BudgetArg::High => Budget::High,
        }
    }
}

fn parse_var(raw: &str) -> Result<(String, JsonValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn load_config(path: Option<&PathBuf>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    Ok(config.apply_env())
}

fn build_dispatcher(config: RuntimeConfig) -> Result<Dispatcher> {
    if config.providers.is_empty() {
        tracing::info!("No providers configured, using offline echo providers");
        return Dispatcher::builder()
            .config(config)
            .providers(EchoProvider::standard_set().into_iter().collect())
            .build()
            .context("building dispatcher");
    }

    Dispatcher::from_config(config, &ProviderRegistry::with_defaults())
        .context("building dispatcher from configured providers")
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Route { intent } => {
            let dispatcher = build_dispatcher(config)?;
            let decision = dispatcher.route(intent.role, &intent.flags());
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }

        Command::Guard { role, text } => {
            let guard = OutputGuard::new(&config.guard).context("compiling guard policy")?;
            match guard.enforce(role, &text) {
                Ok(guarded) => println!("{guarded}"),
                Err(violation) => bail!(violation),
            }
        }

        Command::Dispatch {
            intent,
            prompt,
            prompt_version,
            vars,
            telemetry,
        } => {
            let dispatcher = build_dispatcher(config)?;
            let variables: HashMap<String, JsonValue> = vars.into_iter().collect();

            let text = dispatcher
                .dispatch(
                    intent.role,
                    &prompt,
                    &intent.flags(),
                    &prompt_version,
                    &variables,
                )
                .await
                .context("dispatch failed")?;
            println!("{text}");

            if telemetry {
                println!("{}", serde_json::to_string_pretty(&dispatcher.telemetry())?);
            }
        }
    }

    Ok(())
}

//! CLI entrypoint for crosscheck.
//!
//! Loads the runtime configuration, wires the four backends and runs one
//! verification, printing progress to stderr and the verdict to stdout.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crosscheck_core::report::{render_markdown, summary_line};
use crosscheck_runtime::{
    ProviderRegistry, RuntimeConfig, VerificationEvent, VerificationOrchestrator,
    VerificationRequest,
};

#[derive(Parser, Debug)]
#[command(name = "crosscheck", version, about = "Cross-check an answer with two models and two judges")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// YAML configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify one question
    Ask {
        question: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },

    /// List configured backends and whether they look usable
    Backends,

    /// Load and validate the configuration
    CheckConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Ask { question, format } => ask(&config, question, format).await,
        Command::Backends => backends(&config).await,
        Command::CheckConfig => check_config(&config, &ProviderRegistry::with_defaults()),
    }
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => {
            let config = RuntimeConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn check_config(config: &RuntimeConfig, registry: &ProviderRegistry) -> Result<()> {
    let problems = config.provider_problems(registry);

    for (slot, backend) in config.backends() {
        println!(
            "  {:<11} {} ({} / {})",
            slot, backend.name, backend.provider, backend.model
        );
    }
    println!(
        "  timeouts    answer {}, judge {}",
        humantime::format_duration(config.answer_timeout),
        humantime::format_duration(config.judge_timeout)
    );

    if !problems.is_empty() {
        bail!("Configuration has {} problem(s):\n  {}", problems.len(), problems.join("\n  "));
    }

    println!("Configuration OK");
    Ok(())
}

async fn ask(config: &RuntimeConfig, question: String, format: OutputFormat) -> Result<()> {
    let orchestrator = VerificationOrchestrator::from_config(config, &ProviderRegistry::with_defaults())?;
    info!(?orchestrator, "Starting verification");

    // The CLI user is always authorized; quotas belong to hosting layers.
    let mut events = orchestrator.run_verification(VerificationRequest::new(question, true));

    while let Some(event) = events.next().await {
        match event {
            VerificationEvent::Progress(update) => {
                eprintln!("[{}/4] {}", update.phase_index, update.message);
            }
            VerificationEvent::Verdict(payload) => {
                info!(summary = %summary_line(&payload), "Verdict ready");
                match format {
                    OutputFormat::Markdown => print!("{}", render_markdown(&payload)),
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&payload)?),
                }
                return Ok(());
            }
            VerificationEvent::Failed(e) => bail!(e),
        }
    }

    bail!("verification ended without a verdict")
}

async fn backends(config: &RuntimeConfig) -> Result<()> {
    let registry = ProviderRegistry::with_defaults();
    let orchestrator = VerificationOrchestrator::from_config(config, &registry)?;

    for ((slot, adapter), (_, backend)) in orchestrator.backends().into_iter().zip(config.backends()) {
        let status = if adapter.health_check().await { "ok" } else { "unavailable" };
        println!(
            "{:<11} {:<16} {:<18} {:<14} {}",
            slot, adapter.name(), backend.provider, backend.model, status
        );
    }

    println!();
    println!("Registered provider types:");
    for (provider_type, description) in registry.descriptions() {
        println!("  {:<18} {}", provider_type, description);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_ask() {
        let cli = Cli::try_parse_from(["crosscheck", "-vv", "ask", "What is 12 * 8?", "--format", "json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Ask { question, format } => {
                assert_eq!(question, "What is 12 * 8?");
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("expected ask, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_global_config_flag() {
        let cli = Cli::try_parse_from(["crosscheck", "check-config", "--config", "c.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.yaml")));
        assert!(matches!(cli.command, Command::CheckConfig));
    }

    #[test]
    fn test_default_config_loads() {
        assert!(load_config(None).is_ok());
    }

    #[test]
    fn test_check_config_rejects_unknown_provider() {
        let config = RuntimeConfig::from_yaml_str(
            "answerers:\n  a:\n    name: Qwen\n    provider: zhipu-native\n    model: qwen-turbo\n",
        )
        .unwrap();

        let err = check_config(&config, &ProviderRegistry::with_defaults()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("answerer a (Qwen)"), "{message}");
        assert!(message.contains("Unknown provider type: 'zhipu-native'"), "{message}");
    }

    #[test]
    fn test_check_config_passes_with_inline_keys() {
        let mut config = RuntimeConfig::default();
        config.answerers.a.options["api_key"] = "k".into();
        config.answerers.b.options["api_key"] = "k".into();
        config.judges.first.options["api_key"] = "k".into();
        config.judges.second.options["api_key"] = "k".into();

        assert!(check_config(&config, &ProviderRegistry::with_defaults()).is_ok());
    }
}

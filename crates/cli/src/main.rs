//! ReconBridge CLI - run wrapped recon tools against a single target

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

use reconbridge_core::application::tools::option_descriptors;
use reconbridge_core::application::{build_adapters, ToolAdapter, TOOL_MODULES};
use reconbridge_core::domain::target::{is_ip, is_ip_network};
use reconbridge_core::domain::{Event, EventType, Outcome, EXTERNAL_SOURCE};
use reconbridge_core::port::ProcessRunner;
use reconbridge_infra_system::{Settings, SubprocessRunner};

#[derive(Parser)]
#[command(name = "reconbridge")]
#[command(about = "ReconBridge recon tool adapters", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML)
    #[arg(long, global = true, env = "RECONBRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tools against one target
    Scan {
        /// Target: IP address, CIDR netblock or hostname
        target: String,

        /// Tool module to run (repeatable, default: every tool watching the event type)
        #[arg(short, long = "tool")]
        tools: Vec<String>,

        /// Event type of the target (default: guessed from its shape)
        #[arg(short, long)]
        event_type: Option<EventType>,

        /// Option override, `module.key=value` or `key=value` with one --tool
        #[arg(short = 'o', long = "opt")]
        opts: Vec<String>,

        /// Print emitted events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List known tools and whether their binaries are present
    Tools,

    /// List options per tool
    Options {
        /// Only this tool module
        #[arg(short, long = "tool")]
        tool: Option<String>,
    },
}

#[derive(Tabled)]
struct ToolRow {
    module: String,
    name: String,
    summary: String,
    watches: String,
    produces: String,
    executable: String,
    available: String,
}

#[derive(Tabled)]
struct OptionRow {
    module: String,
    key: String,
    default: String,
    description: String,
}

fn guess_event_type(target: &str) -> EventType {
    if is_ip_network(target) {
        EventType::NetblockOwner
    } else if is_ip(target) {
        EventType::IpAddress
    } else {
        EventType::InternetName
    }
}

fn load_settings(config: Option<&PathBuf>) -> Result<Settings> {
    Settings::load(config.map(PathBuf::as_path)).map_err(|e| anyhow!("{}", e))
}

fn runner_for(settings: &Settings) -> Arc<dyn ProcessRunner> {
    match settings.env_allowlist.clone() {
        Some(allowlist) => Arc::new(SubprocessRunner::new().with_env_allowlist(allowlist)),
        None => Arc::new(SubprocessRunner::new()),
    }
}

async fn scan(
    settings: &mut Settings,
    target: String,
    tools: Vec<String>,
    event_type: Option<EventType>,
    opts: Vec<String>,
    json: bool,
) -> Result<()> {
    let default_module = match tools.as_slice() {
        [only] => Some(only.as_str()),
        _ => None,
    };
    for opt in &opts {
        settings
            .apply_override_spec(opt, default_module)
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("Invalid --opt '{}'", opt))?;
    }

    let event_type = event_type.unwrap_or_else(|| guess_event_type(&target));
    let modules = if tools.is_empty() {
        settings.modules.clone()
    } else {
        tools
    };

    let adapters = build_adapters(&modules, &settings.tool_options, runner_for(settings))
        .map_err(|e| anyhow!(e))?;
    let event = Event::new(event_type, target.clone(), EXTERNAL_SOURCE);

    if !json {
        println!(
            "{}",
            format!("Scanning {} ({})", target, event_type).cyan().bold()
        );
        println!();
    }

    let mut failed = 0;
    for adapter in adapters.iter().filter(|a| a.watches(event_type)) {
        let module = adapter.module_name();
        match adapter.process(&event).await {
            Outcome::Emitted(events) => {
                for produced in &events {
                    if json {
                        println!("{}", serde_json::to_string(produced)?);
                    } else {
                        println!("{} {} {}", "✓".green(), module.bold(), produced.event_type);
                        println!("{}", produced.data);
                        println!();
                    }
                }
            }
            Outcome::Skipped(reason) => {
                if !json {
                    println!("{} {} skipped: {}", "○".yellow(), module.bold(), reason);
                }
            }
            Outcome::Failed(err) => {
                failed += 1;
                if !json {
                    println!("{} {} failed: {}", "✗".red(), module.bold(), err);
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} tool(s) failed", failed);
    }
    Ok(())
}

fn event_list(types: &[EventType]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn tool_rows(adapters: &[Arc<ToolAdapter>]) -> Vec<ToolRow> {
    adapters
        .iter()
        .map(|adapter| {
            let profile = adapter.profile();
            let executable = adapter.executable();
            let available = executable.as_deref().map(|p| p.is_file()).unwrap_or(false);
            ToolRow {
                module: adapter.module_name().to_string(),
                name: profile.meta().name.to_string(),
                summary: profile.meta().summary.to_string(),
                watches: event_list(profile.watched_events()),
                produces: event_list(profile.produced_events()),
                executable: executable
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
                available: if available {
                    "yes".green().to_string()
                } else {
                    "no".red().to_string()
                },
            }
        })
        .collect()
}

fn list_tools(settings: &Settings) -> Result<()> {
    let adapters = build_adapters(&[], &settings.tool_options, runner_for(settings))
        .map_err(|e| anyhow!(e))?;

    println!("{}", Table::new(tool_rows(&adapters)));
    Ok(())
}

fn list_options(tool: Option<String>) -> Result<()> {
    let modules: Vec<&str> = match tool.as_deref() {
        Some(module) => vec![module],
        None => TOOL_MODULES.to_vec(),
    };

    let mut rows = Vec::new();
    for module in modules {
        let descriptors =
            option_descriptors(module).ok_or_else(|| anyhow!("unknown tool module: {}", module))?;
        rows.extend(descriptors.iter().map(|d| OptionRow {
            module: module.to_string(),
            key: d.key.to_string(),
            default: d.default.to_string(),
            description: d.description.to_string(),
        }));
    }

    println!("{}", Table::new(rows));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("reconbridge=warn"))
        .map_err(|e| anyhow!("Failed to create env filter: {}", e))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            target,
            tools,
            event_type,
            opts,
            json,
        } => {
            let mut settings = load_settings(cli.config.as_ref())?;
            scan(&mut settings, target, tools, event_type, opts, json).await?;
        }

        Commands::Tools => {
            let settings = load_settings(cli.config.as_ref())?;
            list_tools(&settings)?;
        }

        Commands::Options { tool } => list_options(tool)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_event_type() {
        assert_eq!(guess_event_type("10.0.0.0/24"), EventType::NetblockOwner);
        assert_eq!(guess_event_type("10.0.0.1"), EventType::IpAddress);
        assert_eq!(guess_event_type("::1"), EventType::IpAddress);
        assert_eq!(guess_event_type("www.example.com"), EventType::InternetName);
    }

    #[test]
    fn test_cli_parses_scan() {
        let cli = Cli::try_parse_from([
            "reconbridge",
            "scan",
            "--tool",
            "tool_whatweb",
            "-o",
            "aggression=3",
            "--event-type",
            "internet_name",
            "www.example.com",
        ])
        .unwrap();

        match cli.command {
            Commands::Scan {
                target,
                tools,
                event_type,
                opts,
                json,
            } => {
                assert_eq!(target, "www.example.com");
                assert_eq!(tools, vec!["tool_whatweb"]);
                assert_eq!(event_type, Some(EventType::InternetName));
                assert_eq!(opts, vec!["aggression=3"]);
                assert!(!json);
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_tool_rows_describe_every_tool() {
        use reconbridge_core::port::process_runner::mocks::MockProcessRunner;
        use std::collections::HashMap;

        let runner = Arc::new(MockProcessRunner::new_output(""));
        let adapters = build_adapters(&[], &HashMap::new(), runner).unwrap();

        let rows = tool_rows(&adapters);

        assert_eq!(rows.len(), TOOL_MODULES.len());
        let os = rows.iter().find(|r| r.module == "tool_nmap").unwrap();
        assert_eq!(os.watches, "IP_ADDRESS, NETBLOCK_OWNER");
        assert_eq!(os.produces, "OPERATING_SYSTEM, IP_ADDRESS");
        assert!(!os.summary.is_empty());
        let whatweb = rows.iter().find(|r| r.module == "tool_whatweb").unwrap();
        assert_eq!(whatweb.produces, "RAW_RESULT");
    }
}

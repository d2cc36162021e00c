//! melt - firewall intent compiler
//!
//! # Usage
//!
//! ```bash
//! melt list                              # List stored profiles
//! melt compile gw                        # Full ruleset of stored profile "gw"
//! melt compile ./www.json -o rules.v4    # Compile a document into a file
//! melt compile gw --policy pass          # Override the filter chain policy
//! melt rules gw                          # Rule lines only
//! melt -vv compile gw                    # With debug logging on stderr
//! ```

use clap::{Args, Parser, Subcommand};
use melt::config::{Config, load_config};
use melt::core::factory::RuleFactory;
use melt::core::firewall::{Action, Ruleset};
use melt::core::netfilter::{Formatter, Netfilter};
use melt::core::profiles::{list_profiles, resolve_profile};
use melt::core::services::ServiceTable;
use melt::utils::write_atomic;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, debug};

#[derive(Parser)]
#[command(name = "melt", version)]
#[command(about = "Compiles firewall intents into iptables-restore rulesets", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the complete ruleset of a host policy
    Compile(CompileArgs),
    /// Print only the rule lines of a host policy
    Rules(CompileArgs),
    /// List stored profiles
    List,
}

#[derive(Args)]
struct CompileArgs {
    /// Name of a stored profile, or path to a host policy document
    profile: String,
    /// Default policy of the filter chains (pass or block)
    #[arg(long)]
    policy: Option<Action>,
    /// services(5) database used for port names
    #[arg(long, value_name = "PATH")]
    services: Option<PathBuf>,
    /// Configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "OUT")]
    output: Option<PathBuf>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> melt::Result<()> {
    match command {
        Commands::List => {
            for name in list_profiles()? {
                println!("{name}");
            }
        }
        Commands::Compile(args) => {
            let ruleset = compile(&args)?;
            let text = Netfilter::new().emit_ruleset(&ruleset.rules, ruleset.default_policy);
            output(&args, &text)?;
        }
        Commands::Rules(args) => {
            let ruleset = compile(&args)?;
            let formatter = Netfilter::new();
            let text: String = ruleset
                .rules
                .iter()
                .map(|rule| formatter.emit_rule(rule) + "\n")
                .collect();
            output(&args, &text)?;
        }
    }
    Ok(())
}

fn compile(args: &CompileArgs) -> melt::Result<Ruleset> {
    let config: Config = load_config(args.config.as_deref())?;
    let services = match args.services {
        Some(ref path) => ServiceTable::load(path)?,
        None => config.services()?,
    };
    debug!("{} service name(s) available", services.len());

    let factory = RuleFactory::new(config.resolver(), services);
    let policy = resolve_profile(&args.profile)?;

    let mut ruleset = policy.compile(&factory, config.default_policy)?;
    if let Some(policy) = args.policy {
        ruleset.default_policy = policy;
    }
    Ok(ruleset)
}

fn output(args: &CompileArgs, text: &str) -> melt::Result<()> {
    match args.output {
        Some(ref path) => {
            write_atomic(path, text)?;
            debug!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

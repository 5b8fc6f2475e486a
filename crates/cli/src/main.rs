//! gridscriptc - GridScript compiler driver
//!
//! Loads `gridscript.conf` (or `--config`), builds the capability registry
//! once and runs one subcommand over the given scripts.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gridscript_compiler::CompileOptions;
use gridscript_config::CompilerConfig;
use gridscript_core::{Dialect, Dialects};
use gridscript_registry::{providers, Registry, Visibility};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// GridScript compiler
#[derive(Parser, Debug)]
#[command(name = "gridscriptc")]
#[command(version, about = "Compile and check GridScript sources", long_about = None)]
struct Cli {
    /// Configuration file (default: ./gridscript.conf when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable an extra dialect (lsl, ossl, xmr)
    #[arg(long = "dialect", global = true, value_name = "NAME")]
    dialects: Vec<String>,

    /// Enable an extension group
    #[arg(long = "extension", global = true, value_name = "GROUP")]
    extensions: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and check scripts without generating code
    Check {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile scripts and report what was produced
    Compile {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Print the bytecode listing of every body
        #[arg(long)]
        disassemble: bool,

        /// Print registry call sites as JSON
        #[arg(long)]
        call_sites: bool,

        /// Run each script's default state_entry in the simulation VM
        #[arg(long)]
        run: bool,
    },

    /// Export the capability manifest as JSON
    Manifest {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
}

/// Everything a subcommand needs, built once at startup
pub struct Session {
    pub registry: Registry,
    pub options: CompileOptions,
}

fn load_config(cli: &Cli) -> Result<CompilerConfig> {
    let mut config = match &cli.config {
        Some(path) => CompilerConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CompilerConfig::load_default().context("failed to load gridscript.conf")?,
    };

    for name in &cli.dialects {
        let dialect = Dialect::from_name(name).with_context(|| format!("unknown dialect '{}'", name))?;
        if !config.dialects.contains(&dialect) {
            config.dialects.push(dialect);
        }
    }
    config.extensions.extend(cli.extensions.iter().cloned());
    Ok(config)
}

fn build_session(config: &CompilerConfig) -> Session {
    let mut builder = Registry::builder().allow_long_integers(config.long_integers);
    for provider in providers::standard_providers() {
        builder.install(provider.as_ref());
    }
    let registry = builder.build();

    let dialects: Dialects = config.dialects.iter().copied().collect();
    let visibility = config
        .extensions
        .iter()
        .fold(Visibility::new(dialects), |vis, group| vis.with_group(group.as_str()));

    Session {
        registry,
        options: CompileOptions {
            visibility,
            max_errors: config.max_errors,
            continue_after_error: config.continue_after_error,
        },
    }
}

fn run(cli: Cli) -> Result<bool> {
    let config = load_config(&cli)?;

    // Initialize tracing; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    config.display();
    let session = build_session(&config);
    info!(
        functions = session.registry.functions().len(),
        rejected = session.registry.rejections().len(),
        "registry ready"
    );

    match cli.command {
        Command::Check { files, json } => commands::check(&session, &files, json),
        Command::Compile {
            files,
            disassemble,
            call_sites,
            run,
        } => commands::compile(&session, &files, disassemble, call_sites, run),
        Command::Manifest { pretty } => {
            debug!(pretty, "exporting manifest");
            commands::manifest(&session, pretty)?;
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

//! siteconf CLI - Command-line interface for environment-aware site configuration
//!
//! Usage:
//!   siteconf resolve config/ --env production
//!   siteconf validate site.yaml --all-errors
//!   siteconf environments config/
//!   siteconf check config/site.yaml config/site.pages.yaml

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::LevelFilter;
use siteconf_core::environment::{DEFAULT_ENVIRONMENT, SITE_ENV};
use siteconf_core::{
    ConfigResolver, ConfigSources, EnvironmentId, Error, UnknownEnvironmentPolicy,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// siteconf - Resolve a site's configuration for a deployment environment
#[derive(Parser)]
#[command(name = "siteconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the configuration for one environment
    Resolve {
        /// Configuration directory or single-document file
        #[arg(default_value = ".")]
        source: PathBuf,

        /// Environment to resolve
        #[arg(short, long, env = SITE_ENV, default_value = DEFAULT_ENVIRONMENT)]
        env: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = DumpFormat::Yaml)]
        format: DumpFormat,

        /// Use the base configuration for environments without an overlay
        #[arg(long)]
        fallback: bool,

        /// Show which layer provided each value instead of the values
        #[arg(long)]
        sources: bool,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration for one or every environment
    Validate {
        /// Configuration directory or single-document file
        #[arg(default_value = ".")]
        source: PathBuf,

        /// Environment to validate (defaults to every environment)
        #[arg(short, long)]
        env: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,

        /// Only output errors (quiet mode)
        #[arg(short, long)]
        quiet: bool,

        /// Report every problem instead of stopping at the first
        #[arg(long)]
        all_errors: bool,
    },

    /// List the environments that have an overlay
    Environments {
        /// Configuration directory or single-document file
        #[arg(default_value = ".")]
        source: PathBuf,
    },

    /// Quick syntax check without merging or validation
    Check {
        /// Configuration file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DumpFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Resolve {
            source,
            env,
            format,
            fallback,
            sources,
            output,
        } => cmd_resolve(&source, &env, format, fallback, sources, output),

        Commands::Validate {
            source,
            env,
            format,
            quiet,
            all_errors,
        } => cmd_validate(&source, env.as_deref(), format, quiet, all_errors),

        Commands::Environments { source } => cmd_environments(&source),

        Commands::Check { files } => cmd_check(files),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG still wins when set
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn load_resolver(source: &Path, fallback: bool) -> Result<ConfigResolver, String> {
    let sources = ConfigSources::load(source)
        .map_err(|e| format!("Failed to load {}: {}", source.display(), e))?;
    let resolver = ConfigResolver::new(sources).map_err(|e| e.to_string())?;
    Ok(if fallback {
        resolver.with_unknown_environment(UnknownEnvironmentPolicy::FallbackToBase)
    } else {
        resolver
    })
}

fn parse_environment(name: &str) -> Result<EnvironmentId, String> {
    EnvironmentId::new(name).map_err(|e| format!("Invalid environment '{}': {}", name, e))
}

fn write_output(content: &str, output: Option<PathBuf>) -> ExitCode {
    if let Some(output_path) = output {
        if let Err(e) = std::fs::write(&output_path, content) {
            eprintln!("{}: {}", "Error writing file".red(), e);
            return ExitCode::from(2);
        }
        eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
    } else {
        print!("{}", content);
    }
    ExitCode::SUCCESS
}

fn cmd_resolve(
    source: &Path,
    env: &str,
    format: DumpFormat,
    fallback: bool,
    sources: bool,
    output: Option<PathBuf>,
) -> ExitCode {
    let resolver = match load_resolver(source, fallback) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };
    let environment = match parse_environment(env) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    // --sources: output the layer behind each path instead of values
    if sources {
        let merged = match resolver.merged_value(&environment) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                return ExitCode::from(1);
            }
        };
        let content = match format {
            DumpFormat::Json => match serde_json::to_string_pretty(&merged.sources) {
                Ok(json) => json + "\n",
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    return ExitCode::from(1);
                }
            },
            DumpFormat::Yaml => merged
                .sources
                .iter()
                .map(|(path, layer)| format!("{}: {}\n", path, layer))
                .collect(),
        };
        return write_output(&content, output);
    }

    let result = resolver.resolve(&environment).and_then(|site| match format {
        DumpFormat::Json => site.to_json().map(|json| json + "\n"),
        DumpFormat::Yaml => site.to_yaml(),
    });

    match result {
        Ok(content) => write_output(&content, output),
        Err(e) => {
            eprintln!("{} Failed to resolve '{}'\n", "✗".red(), environment);
            eprintln!("{}", e);
            ExitCode::from(1)
        }
    }
}

fn cmd_validate(
    source: &Path,
    env: Option<&str>,
    format: ReportFormat,
    quiet: bool,
    all_errors: bool,
) -> ExitCode {
    let resolver = match load_resolver(source, false) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let errors: Vec<Error> = match env {
        Some(name) => {
            let environment = match parse_environment(name) {
                Ok(env) => env,
                Err(e) => {
                    eprintln!("{}", e.red());
                    return ExitCode::from(2);
                }
            };
            if all_errors {
                resolver.validate(&environment)
            } else {
                resolver.resolve(&environment).err().into_iter().collect()
            }
        }
        None if all_errors => resolver.validate_all(),
        None => resolver.resolve_all().err().into_iter().collect(),
    };

    let target = env.map_or_else(|| "all environments".to_string(), |e| format!("'{}'", e));

    if errors.is_empty() {
        if !quiet {
            match format {
                ReportFormat::Json => println!("{{\"valid\": true}}"),
                ReportFormat::Text => {
                    println!("{} {} is valid for {}", "✓".green(), source.display(), target)
                }
            }
        }
        return ExitCode::SUCCESS;
    }

    match format {
        ReportFormat::Json => {
            let json = serde_json::json!({
                "valid": false,
                "errors": errors
                    .iter()
                    .map(|e| serde_json::json!({
                        "environment": e.environment,
                        "path": e.path,
                        "message": e.to_string(),
                    }))
                    .collect::<Vec<_>>(),
            });
            match serde_json::to_string_pretty(&json) {
                Ok(s) => println!("{}", s),
                Err(e) => eprintln!("{}: {}", "Error".red(), e),
            }
        }
        ReportFormat::Text => {
            eprintln!("{} Validation failed for {}\n", "✗".red(), target);
            for error in &errors {
                eprintln!("{}\n", error);
            }
        }
    }
    ExitCode::from(1)
}

fn cmd_environments(source: &Path) -> ExitCode {
    let resolver = match load_resolver(source, false) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    for env in resolver.environments() {
        println!("{}", env);
    }
    ExitCode::SUCCESS
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        let content = match std::fs::read_to_string(&file) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
                continue;
            }
        };

        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");
        let parse_result = if ext == "json" {
            serde_json::from_str::<serde_json::Value>(&content)
                .map(|_| ())
                .map_err(|e| format!("Invalid JSON: {}", e))
        } else {
            serde_yaml::from_str::<serde_yaml::Value>(&content)
                .map(|_| ())
                .map_err(|e| format!("Invalid YAML: {}", e))
        };

        match parse_result {
            Ok(()) => {
                println!(
                    "{} {}: valid {}",
                    "✓".green(),
                    file.display(),
                    if ext == "json" { "JSON" } else { "YAML" }
                );
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

//! cog — cognitive module CLI
//!
//! Usage:
//!   cog list                     → modules visible across the search paths
//!   cog run <module> <input>     → execute a module over a JSON input file
//!   cog validate <module>        → structural validation
//!   cog install <source>         → install into the user-global store
//!   cog uninstall <name>         → remove from the user-global store
//!   cog info <module>            → descriptor details
//!   cog search <query>           → search the public registry
//!   cog doctor                   → environment diagnosis

use clap::{Parser, Subcommand};
use cogmod::{
    install_validated, load_module, resolve_module, run_module, validate_module, RunOptions,
};
use cogmod_core::Config;
use cogmod_llm::provider_from_config;
use cogmod_store::{Installer, RegistryClient, Resolver};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "cog",
    about = "Schema-gated cognitive modules for LLM work",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every module visible across the search paths
    List,
    /// Run a module over a JSON input document
    Run {
        /// Module name or path to a module directory
        module: String,
        /// Path to the JSON input file
        input: PathBuf,
        /// Write the output document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pretty-print the output document
        #[arg(long)]
        pretty: bool,
        /// Skip input and output schema gates
        #[arg(long)]
        no_validate: bool,
        /// Model override for this run
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Structurally validate a module
    Validate {
        /// Module name or path to a module directory
        module: String,
    },
    /// Install a module into the user-global store
    Install {
        /// Source URI: local:<path>, registry:<name>, github:org/repo[/path],
        /// git+<url>[#subdir=<path>], a GitHub https URL, or a bare path/name
        source: String,
        /// Install under this name instead of the source directory name
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove a module from the user-global store
    Uninstall { name: String },
    /// Show a module's descriptor details
    Info {
        /// Module name or path to a module directory
        module: String,
    },
    /// Search the public registry
    Search { query: String },
    /// Diagnose the environment: stores, provider, registry, git
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env();
    let resolver = Resolver::new(config.resolver());

    match cli.command {
        Commands::List => list(&resolver),
        Commands::Run { module, input, output, pretty, no_validate, model } => {
            run(&config, &resolver, &module, &input, output, pretty, no_validate, model).await?
        }
        Commands::Validate { module } => validate(&resolver, &module)?,
        Commands::Install { source, name } => install(&config, &source, name.as_deref()).await?,
        Commands::Uninstall { name } => uninstall(&config, &name)?,
        Commands::Info { module } => info(&resolver, &module)?,
        Commands::Search { query } => search(&config, &query).await,
        Commands::Doctor => doctor(&config, &resolver).await,
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cogmod=info,cog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn list(resolver: &Resolver) {
    let modules = resolver.list_all();
    if modules.is_empty() {
        println!("no modules found");
        return;
    }
    for module in modules {
        println!(
            "{:<24} {:<4} {:<8} {}",
            module.name,
            module.format,
            module.location,
            module.path.display()
        );
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    config: &Config,
    resolver: &Resolver,
    module_ref: &str,
    input_path: &std::path::Path,
    output_path: Option<PathBuf>,
    pretty: bool,
    no_validate: bool,
    model: Option<String>,
) -> anyhow::Result<()> {
    let descriptor = load_module(resolver, module_ref)?;

    let input_text = std::fs::read_to_string(input_path)?;
    let input: serde_json::Value = serde_json::from_str(&input_text)?;

    let provider = provider_from_config(config, resolver_roots(resolver))?;
    let options = RunOptions {
        validate_input: !no_validate,
        validate_output: !no_validate,
        model: model.or_else(|| config.model.clone()),
    };

    let report = run_module(&descriptor, &input, provider.as_ref(), &options).await?;
    if let Some(confidence) = report.confidence {
        eprintln!(
            "confidence: {confidence:.2} (minimum viable {:.2})",
            report.threshold
        );
        if report.low_confidence {
            eprintln!("warning: confidence is below the module's minimum viable threshold");
        }
    }

    let rendered = if pretty {
        serde_json::to_string_pretty(&report.output)?
    } else {
        serde_json::to_string(&report.output)?
    };
    match output_path {
        Some(path) => std::fs::write(path, rendered + "\n")?,
        None => println!("{rendered}"),
    }
    Ok(())
}

fn validate(resolver: &Resolver, module_ref: &str) -> anyhow::Result<()> {
    let dir = resolve_module(resolver, module_ref)?;
    let report = validate_module(&dir);
    print_validation(&report);
    if !report.is_valid() {
        anyhow::bail!("module at {} is invalid", dir.display());
    }
    println!("ok: {}", dir.display());
    Ok(())
}

fn print_validation(report: &cogmod::ValidationReport) {
    for error in &report.errors {
        println!("error: {error}");
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
}

/// Install, then validate what landed; an invalid install is rolled back so
/// the store never accumulates broken modules.
async fn install(config: &Config, source: &str, name: Option<&str>) -> anyhow::Result<()> {
    let installer = Installer::new(RegistryClient::new(config.registry_url.clone()));
    let outcome = install_validated(&installer, source, name).await?;
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    println!("installed: {}", outcome.path.display());
    Ok(())
}

fn uninstall(config: &Config, name: &str) -> anyhow::Result<()> {
    let installer = Installer::new(RegistryClient::new(config.registry_url.clone()));
    if installer.uninstall(name)? {
        println!("uninstalled: {name}");
    } else {
        println!("not installed: {name}");
    }
    Ok(())
}

fn info(resolver: &Resolver, module_ref: &str) -> anyhow::Result<()> {
    let descriptor = load_module(resolver, module_ref)?;

    println!("name:           {}", descriptor.name);
    println!("version:        {}", descriptor.meta.version);
    println!("format:         {}", descriptor.format);
    println!("path:           {}", descriptor.path.display());
    println!("responsibility: {}", descriptor.meta.responsibility);
    if let Some(description) = &descriptor.meta.description {
        println!("description:    {description}");
    }
    if !descriptor.meta.excludes.is_empty() {
        println!("excludes:");
        for item in &descriptor.meta.excludes {
            println!("  - {item}");
        }
    }
    println!("min confidence: {}", descriptor.min_viable_confidence());
    Ok(())
}

async fn search(config: &Config, query: &str) {
    let client = RegistryClient::new(config.registry_url.clone());
    let hits = client.search(query).await;
    if hits.is_empty() {
        println!("no registry modules match '{query}'");
        return;
    }
    for hit in hits {
        println!("{:<24} {:<8} {}", hit.name, hit.version, hit.description);
        println!("{:<33} source: {}", "", hit.source);
    }
}

async fn doctor(config: &Config, resolver: &Resolver) {
    println!("search paths:");
    for location in resolver.search_paths() {
        let status = if location.path.is_dir() { "present" } else { "absent" };
        println!(
            "  [{status:<7}] {:<8} {}",
            location.class,
            location.path.display()
        );
    }
    println!("modules visible: {}", resolver.list_all().len());

    println!("provider: {}", config.provider);
    let credential = match config.provider {
        cogmod_core::ProviderKind::Anthropic => {
            Some(("ANTHROPIC_API_KEY", config.anthropic_api_key.is_some()))
        }
        cogmod_core::ProviderKind::OpenAi => {
            Some(("OPENAI_API_KEY", config.openai_api_key.is_some()))
        }
        cogmod_core::ProviderKind::Ollama | cogmod_core::ProviderKind::Stub => None,
    };
    if let Some((var, present)) = credential {
        println!("  {var}: {}", if present { "set" } else { "NOT SET" });
    }

    let git_ok = tokio::process::Command::new("git")
        .arg("--version")
        .output()
        .await
        .map(|out| out.status.success())
        .unwrap_or(false);
    println!("git: {}", if git_ok { "available" } else { "NOT FOUND" });

    let index = RegistryClient::new(config.registry_url.clone())
        .fetch(true)
        .await;
    match index.error {
        Some(e) => println!("registry: unavailable ({e})"),
        None => println!("registry: {} modules indexed", index.modules.len()),
    }
}

fn resolver_roots(resolver: &Resolver) -> Vec<PathBuf> {
    resolver
        .search_paths()
        .iter()
        .map(|l| l.path.clone())
        .collect()
}

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use root_mcp::{McpServer, RootToolRegistry, ToolRegistry};
use root_mcp_config::{ConfigLoader, LogLevel, RootMcpConfig};
use root_mcp_execution::{CodeExecutor, RootExecutor};
use root_mcp_logging::init_logging_from_config;

#[derive(Parser)]
#[command(name = "root-mcp")]
#[command(about = "Model Context Protocol (MCP) server running Python and C++ in CERN ROOT")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Python interpreter hosting PyROOT
    #[arg(long, global = true)]
    python: Option<String>,

    /// Keep ROOT's graphics event loop running (canvases open on screen)
    #[arg(long, global = true)]
    graphics: bool,

    /// Per-call execution timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server on stdio (default)
    Serve,

    /// List available tools
    Tools,

    /// Start the interpreter and report Python and ROOT versions
    Check,

    /// Validate configuration file
    ValidateConfig,

    /// Print a sample configuration file
    SampleConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.as_ref().unwrap_or(&Commands::Serve);

    if let Commands::SampleConfig = command {
        print!("{}", RootMcpConfig::generate_sample()?);
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_logging_from_config(&config.logging)?;

    match command {
        Commands::Serve => serve_command(config).await,
        Commands::Tools => tools_command(config).await,
        Commands::Check => check_command(config).await,
        Commands::ValidateConfig => validate_config_command(&cli, &config),
        Commands::SampleConfig => Ok(()),
    }
}

/// Load the file (or defaults) with environment overrides, then apply flags
fn load_config(cli: &Cli) -> Result<RootMcpConfig> {
    let mut config = ConfigLoader::new()
        .load(cli.config.as_ref())
        .with_context(|| match &cli.config {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration from the environment".to_string(),
        })?;

    if let Some(python) = &cli.python {
        config.execution.python = python.clone();
    }
    if cli.graphics {
        config.execution.graphics = true;
    }
    if let Some(seconds) = cli.timeout {
        config.execution.timeout = Duration::from_secs(seconds);
    }
    if cli.verbose {
        config.logging.level = LogLevel::Debug;
    }

    config
        .validate_all()
        .context("Invalid configuration after applying command line flags")?;
    Ok(config)
}

async fn serve_command(config: RootMcpConfig) -> Result<()> {
    // stdout carries the protocol, so the banner goes to stderr
    eprintln!(
        "root-mcp {} serving MCP on stdio (python: {}, timeout: {}s, graphics: {})",
        env!("CARGO_PKG_VERSION"),
        config.execution.python,
        config.execution.timeout.as_secs(),
        if config.execution.graphics { "on" } else { "off" }
    );

    let executor = Arc::new(RootExecutor::new(config.execution.clone()));
    let registry = Arc::new(RootToolRegistry::new(
        executor.clone(),
        config.logging.echo_code,
    ));
    let server = McpServer::new(config.mcp, registry).with_executor(executor.clone());

    // Importing ROOT takes seconds; do it while the client is still handshaking
    let warm = executor.clone();
    tokio::spawn(async move {
        match warm.warm_up().await {
            Ok(()) => tracing::info!("ROOT worker ready"),
            Err(e) => tracing::warn!("ROOT worker failed to start: {}", e),
        }
    });

    server.run_stdio().await?;
    tracing::info!("MCP server stopped");
    Ok(())
}

async fn tools_command(config: RootMcpConfig) -> Result<()> {
    let executor = Arc::new(RootExecutor::new(config.execution));
    let registry = RootToolRegistry::new(executor, false);

    println!("Available MCP Tools:");
    println!();
    for tool in registry.list_tools().await? {
        let aliases = registry
            .get_tool(&tool.name)
            .await?
            .map(|t| t.aliases)
            .unwrap_or_default();
        println!("  {:<12} {}", tool.name, tool.description);
        if !aliases.is_empty() {
            println!("  {:<12} (also accepted as: {})", "", aliases.join(", "));
        }
    }
    Ok(())
}

async fn check_command(config: RootMcpConfig) -> Result<()> {
    println!("Starting interpreter with {}...", config.execution.python);
    let executor = RootExecutor::new(config.execution);

    let outcome = check_worker(&executor).await;
    if let Err(e) = executor.shutdown().await {
        tracing::warn!("Failed to stop the interpreter cleanly: {}", e);
    }
    outcome
}

async fn check_worker(executor: &RootExecutor) -> Result<()> {
    executor
        .warm_up()
        .await
        .context("The interpreter could not be started")?;
    let health = executor.health_check().await?;

    println!("✓ Worker {} (pid {})", health.worker_id, health.pid);
    println!("  Python: {}", health.python_version);
    match &health.root_version {
        Some(version) => {
            println!("  ROOT:   {}", version);
            let result = executor
                .run_python("print(ROOT.gROOT.GetVersion())")
                .await?;
            if result.ok {
                println!("✓ PyROOT answered: {}", result.stdout.trim());
            } else {
                println!(
                    "❌ PyROOT call failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        None => {
            println!("  ROOT:   not available (root_cpp will report RootUnavailableError)");
        }
    }
    Ok(())
}

fn validate_config_command(cli: &Cli, config: &RootMcpConfig) -> Result<()> {
    match &cli.config {
        Some(path) => println!("✓ Configuration file {} is valid", path.display()),
        None => println!("✓ Default configuration (with environment overrides) is valid"),
    }
    println!("  python:      {}", config.execution.python);
    println!("  timeout:     {}s", config.execution.timeout.as_secs());
    println!("  cpp_mode:    {}", config.execution.cpp_mode);
    println!("  graphics:    {}", config.execution.graphics);
    println!("  log level:   {}", config.logging.level.as_str());
    Ok(())
}

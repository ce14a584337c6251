use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use varsync::export::{default_output_file, run_export};
use varsync::github::PUBLIC_API_URL;
use varsync::sync::run_sync;
use varsync::{Config, GitHubClient, ProxyConfig, RetryPolicy, RetrySettings};

#[derive(Parser)]
#[command(name = "varsync")]
#[command(about = "Migrate GitHub Actions variables between organizations via CSV")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// HTTP proxy (can also use HTTP_PROXY env var)
    #[arg(long, global = true, env = "HTTP_PROXY")]
    http_proxy: Option<String>,

    /// HTTPS proxy (can also use HTTPS_PROXY env var)
    #[arg(long, global = true, env = "HTTPS_PROXY")]
    https_proxy: Option<String>,

    /// Comma-separated hosts to reach directly (can also use NO_PROXY env var)
    #[arg(long, global = true, env = "NO_PROXY")]
    no_proxy: Option<String>,

    /// Maximum retry attempts
    #[arg(long, global = true, env = "RETRY_MAX", default_value_t = 3)]
    retry_max: i64,

    /// Base delay between retries, e.g. 1s or 500ms
    #[arg(long, global = true, env = "RETRY_DELAY", default_value = "1s")]
    retry_delay: String,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Export organization and repository variables to CSV
    Export {
        /// GitHub Enterprise Server hostname (optional) Ex. github.example.com
        #[arg(short = 'n', long, env = "VARSYNC_SOURCE_HOSTNAME")]
        source_hostname: Option<String>,

        /// Organization to export (required)
        #[arg(short = 'o', long, env = "VARSYNC_SOURCE_ORGANIZATION")]
        source_organization: String,

        /// GitHub token (required)
        #[arg(short = 't', long, env = "VARSYNC_SOURCE_TOKEN", hide_env_values = true)]
        source_token: String,
    },

    /// Sync organization and repository variables from CSV
    Sync {
        /// CSV file containing variables to synchronize
        #[arg(short, long, env = "VARSYNC_FILE")]
        file: PathBuf,

        /// GitHub Enterprise Server hostname (optional) Ex. github.example.com
        #[arg(short = 'n', long, env = "VARSYNC_TARGET_HOSTNAME")]
        target_hostname: Option<String>,

        /// Organization to sync (required)
        #[arg(short = 'o', long, env = "VARSYNC_TARGET_ORGANIZATION")]
        target_organization: String,

        /// GitHub token (required)
        #[arg(short = 't', long, env = "VARSYNC_TARGET_TOKEN", hide_env_values = true)]
        target_token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Allow a .env file next to the invocation to supply any VARSYNC_* or
    // proxy/retry environment values
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    info!("Starting varsync v{}", env!("CARGO_PKG_VERSION"));

    let proxy = ProxyConfig {
        http_proxy: cli.http_proxy.clone(),
        https_proxy: cli.https_proxy.clone(),
        no_proxy: cli.no_proxy.clone(),
    };
    let retry_settings = RetrySettings::from_values(cli.retry_max, &cli.retry_delay);

    let cancel = CancellationToken::new();
    spawn_shutdown_watcher(cancel.clone());

    match cli.command {
        Commands::Export {
            source_hostname,
            source_organization,
            source_token,
        } => {
            let config = Config {
                token: source_token,
                organization: source_organization,
                hostname: source_hostname,
                proxy,
                retry: retry_settings,
            };
            cmd_export(&config, &cancel).await
        }
        Commands::Sync {
            file,
            target_hostname,
            target_organization,
            target_token,
        } => {
            let config = Config {
                token: target_token,
                organization: target_organization,
                hostname: target_hostname,
                proxy,
                retry: retry_settings,
            };
            cmd_sync(&config, &file, &cancel).await
        }
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

/// Cancel the run on Ctrl+C so backoff waits and in-flight requests abort
/// instead of finishing out
fn spawn_shutdown_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nShutdown requested, aborting current operation...");
            cancel.cancel();
        }
    });
}

/// Export variables from the source organization to CSV
async fn cmd_export(config: &Config, cancel: &CancellationToken) -> Result<()> {
    let client = GitHubClient::new(config)?;
    print_connection_status(&client, &config.proxy);

    let retry = RetryPolicy::new(&config.retry);
    let output = default_output_file(&config.organization);

    println!("Exporting variables...\n");
    let summary = run_export(&client, &retry, &config.organization, &output, cancel).await?;

    println!("\n📊 Export Summary:");
    println!("Total repositories found: {}", summary.repositories_found);
    println!(
        "✅ Successfully processed: {} repositories",
        summary.repositories_succeeded
    );
    println!(
        "❌ Failed to process: {} repositories",
        summary.repositories_failed
    );
    println!("📝 Total variables exported: {}", summary.variables_exported);
    if let Some(file) = &summary.output_file {
        println!("📁 Output file: {}", file.display());
    }
    println!("🕐 Total time: {:.2}s", summary.duration.as_secs_f64());

    if summary.has_failures() {
        println!(
            "\n🛑 Export completed with {} failed repositories. Some variables may not have been exported.",
            summary.repositories_failed
        );
        std::process::exit(1);
    }

    println!("\n✅ Export completed successfully!");
    Ok(())
}

/// Sync variables from CSV into the target organization
async fn cmd_sync(config: &Config, file: &std::path::Path, cancel: &CancellationToken) -> Result<()> {
    let client = GitHubClient::new(config)?;
    print_connection_status(&client, &config.proxy);

    let retry = RetryPolicy::new(&config.retry);

    println!("Syncing variables...\n");
    let summary = run_sync(&client, &retry, &config.organization, file, cancel).await?;

    println!("\n📊 Sync Summary:");
    println!("Total variables processed: {}", summary.total);
    println!("✅ Successfully created: {}", summary.succeeded);
    println!("❌ Failed: {}", summary.failed);
    println!("🚧 Skipped: {}", summary.skipped);
    println!("🕐 Total time: {:.2}s", summary.duration.as_secs_f64());

    if summary.has_failures() {
        println!("\n🛑 Sync completed with {} failed variables", summary.failed);
        std::process::exit(1);
    }

    println!("\n✅ Sync completed successfully!");
    Ok(())
}

/// Show which instance and proxy setup the run is talking to
fn print_connection_status(client: &GitHubClient, proxy: &ProxyConfig) {
    if client.base_url() == PUBLIC_API_URL {
        println!("\n📡 Using: GitHub.com");
    } else {
        println!(
            "\n🔗 Using: GitHub Enterprise Server: {}",
            client.base_url()
        );
    }

    if proxy.is_configured() {
        println!("🔄 Proxy: ✅ Configured\n");
    } else {
        println!("🔄 Proxy: ❌ Not configured\n");
    }
}

use clap::Parser;
use studybridge::{config, server};

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// StudyBridge - a REST extraction layer for clinical study databases
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// HTTP server host address
    #[arg(long, default_value = "0.0.0.0")]
    http_host: String,

    /// HTTP server port
    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    /// Directory holding studies.yml and per-study table definitions
    #[arg(long, default_value = "catalog")]
    catalog_dir: String,

    /// Default row limit applied when a request does not specify one
    #[arg(long, default_value_t = 1000)]
    default_row_limit: u32,

    /// Administrative ceiling on the per-request row limit
    #[arg(long, default_value_t = 10_000)]
    max_row_limit: u32,

    /// Whole-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Run server in daemon mode (background process)
    #[arg(long)]
    daemon: bool,
}

impl From<Cli> for config::CliConfig {
    fn from(cli: Cli) -> Self {
        config::CliConfig {
            http_host: cli.http_host,
            http_port: cli.http_port,
            catalog_dir: cli.catalog_dir,
            default_row_limit: cli.default_row_limit,
            max_row_limit: cli.max_row_limit,
            request_timeout_secs: cli.request_timeout_secs,
            daemon: cli.daemon,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    println!("\nStudyBridge v{}\n", env!("CARGO_PKG_VERSION"));

    let cli_config: config::CliConfig = cli.into();
    let config = match config::ServerConfig::from_cli(cli_config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    server::run_with_config(config).await;
}

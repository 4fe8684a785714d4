use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use mailgate::configuration::config::Config;
use mailgate::network::whitelist::WhitelistMatcher;
use mailgate::persistence::{self, MemoryTransport, QueueTransport};
use mailgate::storage::{ClientRegistry, DatabaseStorage, SessionStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mailgate")]
#[command(version)]
#[command(
    about = "Session persistence core of a milter-based mail gateway (in-process transport only)"
)]
struct Args {
    /// Path to the TOML configuration file
    config_file: PathBuf,

    /// Overrides `instance_id` from the configuration file
    #[arg(long, env = "MAILGATE_INSTANCE_ID")]
    instance_id: Option<u64>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let args = Args::parse();

    info!("Importing configuration");
    let mut config = match Config::from_file(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration from file: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(instance_id) = args.instance_id {
        config.instance_id = instance_id;
    }

    let whitelist = match WhitelistMatcher::build(&config.whitelist) {
        Ok(whitelist) => whitelist,
        Err(e) => {
            error!("Invalid whitelist: {}", e);
            std::process::exit(1);
        }
    };
    info!("Whitelist loaded with {} range(s)", whitelist.ranges().len());

    let storage: Arc<dyn SessionStore> = match DatabaseStorage::from_config(&config.database).await
    {
        Ok(storage) => Arc::new(storage) as Arc<dyn SessionStore>,
        Err(e) => {
            error!("Unable to open the session database: {}", e);
            std::process::exit(1);
        }
    };

    let transport = Arc::new(MemoryTransport::new());
    warn!(
        "Using the in-process transport; no networked queue is wired in, so only \
         producers inside this process reach the consumer"
    );
    let registry = Arc::new(ClientRegistry::new(Arc::clone(&storage)));
    let (_pipeline, handle) = persistence::start(
        &config,
        Arc::clone(&transport) as Arc<dyn QueueTransport>,
        storage,
        registry,
    );

    info!(
        "Instance {} ready, persisting sessions via {}",
        config.instance_id,
        config.persist_channel()
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            transport.close();
        }
        result = handle.dispatcher => {
            match result {
                Ok(Ok(())) => info!("Session persistence consumer stopped"),
                Ok(Err(e)) => {
                    error!("Session persistence failed: {}", e);
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("Error joining the session persistence consumer: {:?}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

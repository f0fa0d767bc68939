use serde::Serialize;
use statlas_discovery::{DiscoveryOrchestrator, load_config, load_default_config};

fn print_help() {
    eprintln!(
        r#"statlas - statistical dataset discovery

USAGE:
    statlas [OPTIONS] <COMMAND>

COMMANDS:
    refresh                     Refresh the catalog from every source and print the report
    list                        Refresh, then print every catalog entry
    search <QUERY> [--tag T]... Refresh, then print entries matching QUERY and all tags
    get <ID>                    Refresh, then print one entry

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    STATLAS_CACHE_TTL_SECS          Response cache lifetime
    STATLAS_CONNECTOR_TIMEOUT_SECS  Per-source refresh timeout
    STATLAS_PERSISTENCE_ENABLED     Persist the catalog (true/false)
    STATLAS_PERSISTENCE_URL         memory://, file://<path>.json or sqlite://<path>
    STATLAS_RATE_LIMIT_<SOURCE>     Requests per window for one source
    RUST_LOG                        Log level filter

EXAMPLES:
    # Search with the embedded defaults
    statlas search precios --tag inflation

    # Refresh and persist to SQLite
    STATLAS_PERSISTENCE_ENABLED=true STATLAS_PERSISTENCE_URL=sqlite://statlas.db statlas refresh
"#
    );
}

enum Command {
    Refresh,
    List,
    Search { query: String, tags: Vec<String> },
    Get { id: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();
    let mut tags: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            "--tag" | "-t" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --tag requires a value");
                    std::process::exit(1);
                }
                tags.push(args[i].clone());
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let command = match positional.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["refresh"] => Command::Refresh,
        ["list"] => Command::List,
        ["search", query] => Command::Search {
            query: query.to_string(),
            tags,
        },
        ["get", id] => Command::Get { id: id.to_string() },
        _ => {
            print_help();
            std::process::exit(1);
        }
    };

    let mut config = match config_path {
        Some(path) => {
            log::info!("Loading configuration from: {}", path);
            load_config(&path)?
        }
        None => load_default_config()?,
    };
    config.apply_env_overrides()?;
    config.validate()?;
    log::info!("Sources: {}", config.enabled_sources().len());
    log::info!(
        "Persistence: {}",
        if config.persistence.enabled {
            config.persistence.connection.as_deref().unwrap_or("-")
        } else {
            "disabled"
        }
    );

    let mut orchestrator = DiscoveryOrchestrator::from_config(&config)?;
    let mut discovery = orchestrator.activate();

    if config.persistence.enabled {
        let loaded = discovery.load_persisted().await?;
        log::info!("Warm start: {} persisted datasets", loaded);
    }

    let report = discovery.refresh_catalog().await?;
    for status in &report.statuses {
        log::info!("{}: {} datasets ({:?})", status.source, status.datasets, status.health);
    }

    match command {
        Command::Refresh => print_json(&report)?,
        Command::List => print_json(&discovery.list()?)?,
        Command::Search { query, tags } => print_json(&discovery.search(&query, &tags)?)?,
        Command::Get { id } => print_json(discovery.get(&id)?)?,
    }

    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use godns_forwarder::cache::memory::{MemoryNegativeCache, MemoryPositiveCache};
use godns_forwarder::cache::redis::{RedisNegativeCache, RedisPositiveCache};
use godns_forwarder::cache::{NegativeCache, PositiveCache};
use godns_forwarder::config::{CacheBackend, Config};
use godns_forwarder::handler::Handler;
use godns_forwarder::hosts::{self, HostsManager, HostsTable};
use godns_forwarder::logging::{self, LogSink};
use godns_forwarder::resolver::{self, Resolver, ResolverSettings};
use godns_forwarder::suffix::SuffixTree;

/// A caching DNS forwarder: hosts table, positive/negative cache, and a
/// staggered-start race across upstream nameservers.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short = 'c', long = "config", default_value = "./etc/godns.toml")]
    config: PathBuf,

    /// Force stdout logging at debug level, overriding the config file.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config).await {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config {}: {}", cli.config.display(), err);
            std::process::exit(1);
        }
    };

    init_logging(&config, cli.verbose);

    log::info!("godns starting with config {}", cli.config.display());

    let resolver = Arc::new(build_resolver(&config).await);
    let (positive_cache, negative_cache) = build_caches(&config).await;
    let hosts_manager = Arc::new(build_hosts_manager(&config).await);

    if config.hosts.enable && config.hosts.refresh_interval > 0 {
        spawn_hosts_refresh(config.clone(), hosts_manager.clone());
    }

    let handler = Handler {
        hosts: hosts_manager,
        hosts_enabled: config.hosts.enable,
        hosts_ttl: config.hosts.ttl,
        positive_cache,
        negative_cache,
        resolver,
        positive_ttl: Duration::from_secs(config.cache.expire),
        negative_ttl: Duration::from_secs(config.cache.expire / 2),
    };

    let addr = config.server.addr().unwrap_or_else(|err| {
        eprintln!("invalid server address: {}", err);
        std::process::exit(1);
    });

    tokio::select! {
        result = godns_forwarder::listener::serve(addr, handler) => {
            if let Err(err) = result {
                log::error!("listener exited with error: {}", err);
                return Err(err);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("received shutdown signal, exiting");
        }
    }

    Ok(())
}

fn init_logging(config: &Config, verbose: bool) {
    let mut sinks = Vec::new();
    if config.log.stdout || verbose {
        sinks.push(LogSink::Console);
    }
    if let Some(path) = &config.log.file {
        sinks.push(LogSink::File(PathBuf::from(path)));
    }
    if sinks.is_empty() {
        sinks.push(LogSink::Console);
    }

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        logging::parse_level(&config.log.level)
    };

    if let Err(err) = logging::init(sinks, level) {
        eprintln!("failed to initialize logger: {}", err);
    }
}

async fn build_resolver(config: &Config) -> Resolver {
    let mut routes: SuffixTree<Vec<std::net::SocketAddr>> = SuffixTree::new();
    let mut defaults = Vec::new();

    if let Some(list) = &config.resolv.server_list_file {
        for path in list.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            match tokio::fs::read_to_string(path).await {
                Ok(text) => resolver::merge_server_list(&text, &mut routes, &mut defaults),
                Err(err) => log::warn!("failed to read server-list file {}: {}", path, err),
            }
        }
    }

    if let Some(path) = &config.resolv.resolv_file {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => defaults.extend(resolver::parse_resolv_conf(&text)),
            Err(err) => log::warn!("failed to read resolv file {}: {}", path, err),
        }
    }

    Resolver::new(
        ResolverSettings {
            timeout: Duration::from_secs(config.resolv.timeout),
            interval: Duration::from_millis(config.resolv.interval),
            set_edns0: config.resolv.set_edns0,
            default_nameservers: defaults,
        },
        routes,
    )
}

async fn build_caches(
    config: &Config,
) -> (Arc<dyn PositiveCache>, Arc<dyn NegativeCache>) {
    match config.cache.backend {
        CacheBackend::Memory => (
            Arc::new(MemoryPositiveCache::new(config.cache.max_count)),
            Arc::new(MemoryNegativeCache::new()),
        ),
        CacheBackend::Redis => {
            let url = config
                .redis
                .url()
                .expect("validated at config load: redis.host is set when cache.backend = redis");
            let positive = RedisPositiveCache::connect(&url, "godns", config.cache.max_count)
                .await
                .unwrap_or_else(|err| {
                    eprintln!("failed to connect to redis for cache: {}", err);
                    std::process::exit(1);
                });
            let negative = RedisNegativeCache::connect(&url, "godns")
                .await
                .unwrap_or_else(|err| {
                    eprintln!("failed to connect to redis for cache: {}", err);
                    std::process::exit(1);
                });
            (Arc::new(positive), Arc::new(negative))
        }
    }
}

async fn load_hosts_snapshot(config: &Config) -> HostsTable {
    let mut table = HostsTable::default();

    if let Some(path) = config.host_file_path() {
        match hosts::load_hosts_file(&path).await {
            Ok(parsed) => table = parsed,
            Err(err) => log::warn!("failed to load hosts file: {}", err),
        }
    }

    if config.hosts.redis_enable {
        if let (Some(url), Some(key)) = (config.redis.url(), &config.hosts.redis_key) {
            match redis::Client::open(url.as_str()) {
                Ok(client) => match client.get_connection_manager().await {
                    Ok(mut conn) => match hosts::load_hosts_redis(&mut conn, key).await {
                        Ok(remote) => table = table.merge_under(remote),
                        Err(err) => log::warn!("failed to load redis hosts: {}", err),
                    },
                    Err(err) => log::warn!("failed to connect to redis for hosts: {}", err),
                },
                Err(err) => log::warn!("invalid redis url for hosts: {}", err),
            }
        }
    }

    table
}

async fn build_hosts_manager(config: &Config) -> HostsManager {
    HostsManager::new(load_hosts_snapshot(config).await)
}

fn spawn_hosts_refresh(config: Config, manager: Arc<HostsManager>) {
    let interval = Duration::from_secs(config.hosts.refresh_interval);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // consume the immediate first tick; refresh on the configured cadence
        loop {
            ticker.tick().await;
            let snapshot = load_hosts_snapshot(&config).await;
            manager.swap(snapshot).await;
            log::debug!("hosts table refreshed");
        }
    });
}

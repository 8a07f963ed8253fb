use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use sub_forge::{
    link::{split_bug_hosts, BugMode, GenerationRequest, ProtocolSelection},
    proxy::{LivenessChecker, ListFetcher, ProxyParser, ProxyRecord},
    render::header_now,
    server,
    server::handlers::build_subscription,
    tui::LinkBuilderApp,
    Config, SubscriptionFormat,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Proxy subscription generator: share links, Clash YAML and sing-box JSON
#[derive(Parser)]
#[command(name = "sub-forge", version)]
#[command(about = "Generate proxy share links and subscriptions from a remote proxy list")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Proxy list URL
    #[arg(long, global = true, env = "SUBFORGE_LIST_URL")]
    list_url: Option<String>,

    /// Liveness-check service base URL
    #[arg(long, global = true, env = "SUBFORGE_CHECK_URL")]
    check_url: Option<String>,

    /// UUID / password used in generated nodes
    #[arg(long, global = true, env = "SUBFORGE_UUID")]
    uuid: Option<String>,

    /// Server domains, comma-separated
    #[arg(long, global = true, env = "SUBFORGE_DOMAINS")]
    domains: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive link builder (default)
    Link,
    /// Serve subscriptions over HTTP
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "SUBFORGE_LISTEN", default_value = "0.0.0.0:8080")]
        listen: SocketAddr,
        /// Host that unmatched requests are forwarded to
        #[arg(long, env = "SUBFORGE_REVERSE_TARGET", default_value = "example.com")]
        reverse_target: String,
    },
    /// Generate one subscription document
    Generate {
        /// Output format (clash, v2ray, v2rayng, nekobox, singbox, surfboard, husi)
        #[arg(default_value = "v2ray")]
        format: String,
        /// Protocol (mix, vmess, vless, trojan, shadowsocks)
        #[arg(short = 't', long = "type", default_value = "mix")]
        protocol: String,
        /// Disable TLS (port 80)
        #[arg(long)]
        no_tls: bool,
        /// Bug host(s), comma-separated
        #[arg(short, long)]
        bug: Option<String>,
        /// Use bug hosts as subdomains of the main domain
        #[arg(short, long)]
        wildcard: bool,
        /// Country code or name filter
        #[arg(short, long)]
        cc: Option<String>,
        /// Number of proxies (1-50)
        #[arg(short, long)]
        limit: Option<i64>,
        /// Main domain (defaults to the first server domain)
        #[arg(short, long)]
        domain: Option<String>,
        /// Read the proxy list from a local file instead of fetching it
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse a proxy list file and print its records
    Parse {
        /// Input file containing the proxy list
        input: PathBuf,
        /// Only show records whose provider or country contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Check proxy liveness
    Check {
        /// Input file; the remote list is used when omitted
        input: Option<PathBuf>,
        /// Only check records matching this provider or country
        #[arg(short, long)]
        search: Option<String>,
        /// Number of concurrent checks
        #[arg(short = 'n', long, default_value = "10")]
        concurrency: usize,
        /// Timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },
}

fn init_tracing(verbose: bool, interactive: bool) {
    let default_level = if verbose {
        "debug"
    } else if interactive {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> Config {
    let mut config = Config::new();
    if let Some(url) = &cli.list_url {
        config = config.with_proxy_list_url(url.clone());
    }
    if let Some(url) = &cli.check_url {
        config = config.with_check_api_url(url.clone());
    }
    if let Some(uuid) = &cli.uuid {
        config = config.with_identity(uuid.clone());
    }
    if let Some(domains) = &cli.domains {
        config = config.with_server_domains(split_bug_hosts(domains));
    }
    config
}

async fn load_records(config: &Config, input: Option<&PathBuf>) -> Result<Vec<ProxyRecord>> {
    match input {
        Some(path) => ProxyParser::parse_file(path),
        None => {
            let fetcher = ListFetcher::with_config(config.fetcher_config())?;
            let text = fetcher
                .fetch_text(&config.proxy_list_url)
                .await
                .with_context(|| format!("Failed to fetch {}", config.proxy_list_url))?;
            Ok(ProxyParser::parse(&text))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, None | Some(Commands::Link));
    init_tracing(cli.verbose, interactive);

    let config = build_config(&cli);

    match cli.command {
        Some(Commands::Link) | None => {
            // Default to TUI mode
            let mut app = LinkBuilderApp::new(config)?;
            app.run().await?;
            if let Some(link) = app.last_link() {
                println!("{}", link);
            }
        }
        Some(Commands::Serve {
            listen,
            reverse_target,
        }) => {
            let config = config
                .with_listen_addr(listen)
                .with_reverse_proxy_target(reverse_target);
            server::serve(config).await?;
        }
        Some(Commands::Generate {
            format,
            protocol,
            no_tls,
            bug,
            wildcard,
            cc,
            limit,
            domain,
            input,
            output,
        }) => {
            let format: SubscriptionFormat = format.parse()?;
            let protocol: ProtocolSelection = protocol.parse()?;
            let bugs = bug.as_deref().map(split_bug_hosts).unwrap_or_default();
            let bug_mode = if bugs.is_empty() {
                BugMode::None
            } else if wildcard {
                BugMode::Wildcard
            } else {
                BugMode::Plain
            };
            let main_domain = domain.unwrap_or_else(|| config.primary_domain().to_string());

            let request = GenerationRequest::new(&main_domain, &config.identity)
                .with_protocol(protocol)
                .with_tls(!no_tls)
                .with_bugs(bugs, bug_mode)
                .with_country(cc.as_deref().unwrap_or(""))
                .with_limit(limit)
                .with_path_template(&config.path_template);

            let list_text = match &input {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let fetcher = ListFetcher::with_config(config.fetcher_config())?;
                    fetcher
                        .fetch_text(&config.proxy_list_url)
                        .await
                        .with_context(|| format!("Failed to fetch {}", config.proxy_list_url))?
                }
            };

            let document = build_subscription(
                format,
                &request,
                &list_text,
                &config.sampler(),
                &mut rand::thread_rng(),
                header_now(),
            )?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &document)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Wrote {} subscription to {:?}", format, path);
                }
                None => println!("{}", document),
            }
        }
        Some(Commands::Parse { input, search }) => {
            let records = ProxyParser::parse_file(&input)?;
            let records = ProxyParser::search(&records, search.as_deref().unwrap_or(""));

            println!("Parsed {} proxies from {:?}", records.len(), input);
            for record in &records {
                println!("{}\t{}", record.key(), record.label());
            }
        }
        Some(Commands::Check {
            input,
            search,
            concurrency,
            timeout,
        }) => {
            let records = load_records(&config, input.as_ref()).await?;
            let records = ProxyParser::search(&records, search.as_deref().unwrap_or(""));

            println!("Loaded {} proxies", records.len());
            println!("Checking with {} concurrent requests, timeout: {}s", concurrency, timeout);
            println!();

            let checker_config = config
                .checker_config()
                .with_concurrency(concurrency)
                .with_timeout(Duration::from_secs(timeout));
            let checker = LivenessChecker::with_config(checker_config)?;
            let mut results = checker.check_all(records).await;
            results.sort_by_key(|r| r.record.key());

            let active = results.iter().filter(|r| r.is_active()).count();
            println!(
                "Results: {} active, {} not active",
                active,
                results.len() - active
            );
            for result in &results {
                println!("  {:<21} {:<14} {}", result.record.key(), result.status, result.record.label());
            }
        }
    }

    Ok(())
}

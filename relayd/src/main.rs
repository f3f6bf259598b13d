use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use common::AllowList;
use http::HeaderValue;
use relayd::{
    config::{self, parse_resolve},
    tls, webserver, Relay, RelayConfig,
};
use tracing::info;

/// Audio streaming relay daemon
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// bind address
    #[arg(short = 'a', long, default_value_t = SocketAddr::from(([0, 0, 0, 0], 8080)))]
    addr: SocketAddr,

    /// public certificate chain (pem format), enables tls together with --private-key
    #[arg(short = 'c', long, requires = "private_key")]
    certs: Option<PathBuf>,

    /// private key (pem format)
    #[arg(short = 'k', long, requires = "certs")]
    private_key: Option<PathBuf>,

    /// path served by the relay
    #[arg(short = 'r', long, default_value = config::DEFAULT_ROUTE)]
    route: String,

    /// upstream hostname the relay may contact, repeat for more
    #[arg(short = 'H', long = "allowed-host", default_values_t = config::DEFAULT_ALLOWED_HOSTS.map(String::from))]
    allowed_hosts: Vec<String>,

    /// upstream connect and response timeout in seconds
    #[arg(short = 't', long, default_value_t = config::DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// user agent sent upstream when the client has none
    #[arg(short = 'u', long, default_value = config::DEFAULT_USER_AGENT)]
    user_agent: HeaderValue,

    /// dns override for an upstream host, as host=ip:port (port 0 keeps the url port)
    #[arg(long, value_parser = parse_resolve)]
    resolve: Vec<(String, SocketAddr)>,

    /// body chunks buffered between upstream and client
    #[arg(long, default_value_t = config::DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let certs = args
        .certs
        .zip(args.private_key)
        .map(|(certs, key)| tls::load_certs(&certs, &key))
        .transpose()?;

    let config = RelayConfig {
        route: args.route,
        allow_list: AllowList::new(&args.allowed_hosts),
        timeout: Duration::from_secs(args.timeout),
        user_agent: args.user_agent,
        resolve: args.resolve,
        channel_capacity: args.channel_capacity,
    };
    info!(
        hosts = ?config.allow_list.iter().collect::<Vec<_>>(),
        timeout = ?config.timeout,
        "starting relay"
    );

    webserver::run(args.addr, certs, Relay::new(config)?).await
}

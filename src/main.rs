//! OPC XML-DA command-line client.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI flags + optional TOML file
//!          │
//!          ▼
//!   ClientConfig ──▶ validation ──▶ logging
//!          │
//!          ▼
//!   SoapClient ──▶ [ObservedLayer] ──▶ HttpExchanger ──▶ server
//!          │
//!          ├── status mode: GetStatus ──▶ write_status ──▶ stdout
//!          ├── read mode:   Read      ──▶ write_read   ──▶ stdout
//!          └── browse mode: Traversal ──▶ write_tree   ──▶ stdout
//! ```
//!
//! Errors are printed on stderr and the process exits with status 1.

use std::error::Error;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use http::{Request, Response, Uri};
use http_body::Body;
use http_body_util::Full;
use tower::{Layer, Service};

use opc_xmlda::browse::{write_tree, NodeKey, Traversal, TraversalOptions};
use opc_xmlda::config::{read_config, validate_config, ClientConfig, ConfigError, Mode};
use opc_xmlda::lifecycle::{CancelSource, CancelToken};
use opc_xmlda::net::{BoxError, HttpExchanger, TransportError};
use opc_xmlda::observability::{init_logging, ObservedLayer, TracingSink};
use opc_xmlda::soap::{write_read, write_status, ReadRequest, RpcError, SoapClient};

/// Calls an OPC XML-DA endpoint and prints GetStatus, reads one item, or browses its namespace.
#[derive(Parser, Debug)]
#[command(name = "opc-xmlda", version)]
struct Cli {
    /// TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// OPC XML-DA endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Browse path (maps to ItemName)
    #[arg(long)]
    browse_path: Option<String>,

    /// Browse item path (maps to ItemPath)
    #[arg(long)]
    browse_item_path: Option<String>,

    /// Item to read (maps to ItemName)
    #[arg(long)]
    read_item: Option<String>,

    /// Item path to read (maps to ItemPath)
    #[arg(long)]
    read_item_path: Option<String>,

    /// Max browse depth (1 = direct children only)
    #[arg(long)]
    browse_depth: Option<i64>,

    /// Log every HTTP exchange with connection phases
    #[arg(long)]
    net_debug: bool,

    /// Log level (trace, debug, info, warn or warning, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Locale ID
    #[arg(long)]
    locale: Option<String>,

    /// Client request handle
    #[arg(long)]
    client_handle: Option<String>,

    /// Connect timeout in seconds (DNS, TCP and TLS)
    #[arg(long, value_name = "SECS")]
    http_timeout: Option<u64>,

    /// End-to-end timeout in seconds; 0 disables it
    #[arg(long, value_name = "SECS")]
    request_timeout: Option<u64>,

    /// Basic auth username
    #[arg(long)]
    username: Option<String>,

    /// Basic auth password
    #[arg(long)]
    password: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut ClientConfig) {
        let set = |target: &mut String, value: Option<String>| {
            if let Some(value) = value {
                *target = value;
            }
        };
        set(&mut config.endpoint, self.endpoint);
        set(&mut config.browse.item_name, self.browse_path);
        set(&mut config.browse.item_path, self.browse_item_path);
        set(&mut config.read.item_name, self.read_item);
        set(&mut config.read.item_path, self.read_item_path);
        set(&mut config.browse.locale, self.locale);
        set(&mut config.browse.client_handle, self.client_handle);
        set(&mut config.observability.log_level, self.log_level);
        set(&mut config.auth.username, self.username);
        set(&mut config.auth.password, self.password);
        if let Some(depth) = self.browse_depth {
            config.browse.max_depth = depth;
        }
        if let Some(secs) = self.http_timeout {
            config.timeouts.connect_secs = secs;
        }
        if let Some(secs) = self.request_timeout {
            config.timeouts.request_secs = secs;
        }
        if self.net_debug {
            config.net_debug.enabled = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ClientConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability);

    let endpoint: Uri = config.endpoint.parse()?;
    let mode = config.mode();
    tracing::info!(mode = ?mode, endpoint = %endpoint, "opc xml-da client start");
    tracing::debug!(
        connect_timeout = ?config.timeouts.connect(),
        request_timeout = ?config.timeouts.request(),
        "timeouts configured"
    );

    let source = CancelSource::new();
    let cancel = source.token().with_timeout(config.timeouts.request());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            source.trigger();
        }
    });

    let exchanger = HttpExchanger::new(config.timeouts.connect())?;
    if config.net_debug.enabled {
        tracing::info!(max_body_bytes = config.net_debug.max_body_bytes, "network debug enabled");
        let layer = ObservedLayer::with_sink(config.net_debug.max_body_bytes, Arc::new(TracingSink));
        execute(&config, client(&config, endpoint, layer.layer(exchanger))?, cancel).await
    } else {
        execute(&config, client(&config, endpoint, exchanger)?, cancel).await
    }
}

fn client<S>(config: &ClientConfig, endpoint: Uri, transport: S) -> Result<SoapClient<S>, Box<dyn Error>> {
    let client = SoapClient::new(endpoint, transport).with_request_timeout(config.timeouts.request());
    if config.auth.is_set() {
        return Ok(client.with_basic_auth(&config.auth.username, &config.auth.password)?);
    }
    Ok(client)
}

async fn execute<S, RB>(config: &ClientConfig, client: SoapClient<S>, cancel: CancelToken) -> Result<(), Box<dyn Error>>
where
    S: Service<Request<Full<Bytes>>, Response = Response<RB>, Error = TransportError>
        + Clone
        + Send
        + Sync,
    S::Future: Send,
    RB: Body<Data = Bytes> + Send,
    RB::Error: Into<BoxError>,
{
    let mut stdout = std::io::stdout();
    let locale = &config.browse.locale;
    let client_handle = &config.browse.client_handle;

    match config.mode() {
        Mode::Browse => {
            let browse = &config.browse;
            tracing::info!(
                item_path = %browse.item_path,
                item_name = %browse.item_name,
                max_depth = browse.max_depth,
                "browse requested"
            );
            let options = TraversalOptions {
                locale: locale.clone(),
                client_handle: client_handle.clone(),
                max_depth: browse.max_depth,
            };
            let root = NodeKey::new(&browse.item_path, &browse.item_name);
            write_tree(Traversal::new(&client, root, options, cancel), &mut stdout).await?;
        }
        Mode::Read => {
            let request = ReadRequest {
                locale: locale.clone(),
                client_handle: client_handle.clone(),
                item_path: config.read.item_path.clone(),
                item_name: config.read.item_name.clone(),
            };
            tracing::info!(item_path = %request.item_path, item_name = %request.item_name, "read requested");
            let reply = until_cancelled("read", &cancel, client.read(&request)).await?;
            write_read(&reply, &mut stdout)?;
        }
        Mode::Status => {
            tracing::info!("get status requested");
            let reply = until_cancelled("get status", &cancel, client.get_status(locale, client_handle)).await?;
            write_status(&reply, &mut stdout)?;
        }
    }
    Ok(())
}

/// Run one call, giving up when the token fires. Errors are prefixed with `operation`.
async fn until_cancelled<T>(
    operation: &str,
    cancel: &CancelToken,
    call: impl Future<Output = Result<T, RpcError>>,
) -> Result<T, Box<dyn Error>> {
    tokio::select! {
        reply = call => reply.map_err(|e| -> Box<dyn Error> { format!("{operation}: {e}").into() }),
        reason = cancel.cancelled() => Err(format!("{operation}: {reason}").into()),
    }
}

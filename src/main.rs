//! Brightness control for external monitors, Apple displays and laptop panels
//!
//! Run `daemon` once per session; the other subcommands talk to it over a
//! Unix socket, or do the work in-process when no daemon is listening.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::facade::ACTIVE;
use crate::monitor::DrmTopology;
use crate::process::TokioProcessRunner;
use crate::service::{BrightnessService, Request, Response};

#[macro_use]
extern crate tracing;

mod config;
mod error;
mod expression;
mod facade;
mod hotplug;
mod ipc;
mod monitor;
mod process;
mod protocols;
mod service;
mod window_manager;

/// Adjust monitor brightness. Values are fractions in [0, 1] (`0.4`) or
/// percentages (`40%`); `+0.1`, `0.1-`, `+5%` and `5%-` are relative to the
/// current brightness.
#[derive(Parser)]
#[clap(version)]
struct Cli {
    /// Config file to read instead of the default location
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Do the work in this process instead of asking the daemon
    #[clap(short, long, global = true)]
    standalone: bool,

    #[clap(subcommand)]
    cmd: SubCmd,
}

#[derive(Clone, Debug, Subcommand)]
enum SubCmd {
    /// Keep track of displays and serve requests on the socket
    Daemon,
    /// Print the brightness of the focused monitor
    Get,
    /// Print the brightness of the monitor matching a query
    GetFor {
        /// `active`, `model:<text>`, `serial:<text>`, `id:<n>` or a connector name
        query: String,
    },
    /// Set the brightness of the focused monitor
    Set {
        #[clap(allow_hyphen_values = true)]
        value: String,
    },
    /// Set the brightness of the monitor matching a query
    SetFor {
        query: String,
        #[clap(allow_hyphen_values = true)]
        value: String,
    },
    /// List every known monitor
    List,
}

impl SubCmd {
    fn request(self) -> Option<Request> {
        match self {
            SubCmd::Daemon => None,
            SubCmd::Get => Some(Request::Get {
                query: ACTIVE.to_string(),
            }),
            SubCmd::GetFor { query } => Some(Request::Get { query }),
            SubCmd::Set { value } => Some(Request::Set {
                query: ACTIVE.to_string(),
                expression: value,
            }),
            SubCmd::SetFor { query, value } => Some(Request::Set {
                query,
                expression: value,
            }),
            SubCmd::List => Some(Request::List),
        }
    }
}

fn setup_logs() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new(format!(
        "warn,{}=warn",
        env!("CARGO_CRATE_NAME")
    )));

    if let Ok(journal_layer) = tracing_journald::layer() {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(journal_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    }
}

fn new_service(config: &Config) -> BrightnessService {
    let runner = Arc::new(TokioProcessRunner);
    let window_manager = window_manager::from_config(config.window_manager, runner.clone());
    BrightnessService::new(config, runner, window_manager, Arc::new(DrmTopology::new()))
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    let service = new_service(&config);
    let handle = service.handle();
    tokio::spawn(service.run());

    if config.hotplug {
        hotplug::spawn_hotplug_watcher(handle.clone());
    }

    let socket = config.socket_path();
    tokio::select! {
        result = ipc::serve(&socket, handle) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    let _ = std::fs::remove_file(&socket);
    Ok(())
}

/// Answer `request` without a daemon, waiting for any debounced write
async fn run_standalone(config: &Config, request: Request) -> Response {
    let mut service = new_service(config);
    service.settle().await;
    let response = service.handle_request(request).await;
    service.drain().await;
    response
}

fn print_response(response: &Response) {
    match response {
        Response::Brightness(value) => println!("{}", value),
        Response::Status(status) => println!("{}", status),
        Response::Monitors(monitors) => {
            for m in monitors {
                println!(
                    "{}\t{}\t{}\t{}\t{:.2}",
                    m.name, m.backend, m.model, m.serial, m.brightness
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logs();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    let Some(request) = cli.cmd.request() else {
        return match run_daemon(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Daemon failed: {:#}", e);
                ExitCode::FAILURE
            }
        };
    };

    let response = if cli.standalone {
        run_standalone(&config, request).await
    } else {
        match ipc::send(&config.socket_path(), &request).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Falling back to standalone mode: {:#}", e);
                run_standalone(&config, request).await
            }
        }
    };

    print_response(&response);
    ExitCode::SUCCESS
}

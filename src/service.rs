// SPDX-License-Identifier: GPL-3.0-only
//! Brightness service event loop
//!
//! One task owns the directory, the DDC registry and the Apple presence flag.
//! Everything else talks to it through events: detection reports, topology
//! snapshots, probe results, debounce expiries and client requests. Helper
//! commands run in spawned tasks and post their output back here, so state
//! is only ever touched from this loop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::facade::{ACTIVE, CommandFacade, MonitorSummary};
use crate::monitor::{
    BrightnessDirectory, ControllerContext, ControllerEvent, DdcRegistry, DebounceState, Display,
    TopologySource, needs_window_manager,
};
use crate::process::ProcessRunner;
use crate::protocols::{apple, ddc_ci};
use crate::window_manager::{OutputSnapshot, WindowManager};

/// A client command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Request {
    Get { query: String },
    Set { query: String, expression: String },
    List,
}

impl Request {
    fn query(&self) -> Option<&str> {
        match self {
            Request::Get { query } | Request::Set { query, .. } => Some(query.as_str()),
            Request::List => None,
        }
    }
}

/// Answer to a [`Request`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Response {
    Brightness(f64),
    Status(String),
    Monitors(Vec<MonitorSummary>),
}

#[derive(Debug)]
enum ServiceEvent {
    /// Re-run detection and enumeration
    TopologyChanged,
    Displays(Vec<Display>),
    DdcReport(String),
    AppleProbe(String),
    Request(Request, oneshot::Sender<Response>),
    Resolved(Request, OutputSnapshot, oneshot::Sender<Response>),
}

/// Cheap, cloneable way to reach a running service
#[derive(Clone)]
pub struct ServiceHandle {
    events: mpsc::UnboundedSender<ServiceEvent>,
}

impl ServiceHandle {
    /// Ask the service to re-detect displays and backends
    pub fn topology_changed(&self) {
        let _ = self.events.send(ServiceEvent::TopologyChanged);
    }

    /// Send a request; `None` if the service is gone
    pub async fn request(&self, request: Request) -> Option<Response> {
        let (tx, rx) = oneshot::channel();
        self.events.send(ServiceEvent::Request(request, tx)).ok()?;
        rx.await.ok()
    }
}

pub struct BrightnessService {
    directory: BrightnessDirectory,
    registry: DdcRegistry,
    apple_present: bool,
    /// Detection and enumeration results still outstanding
    pending: usize,
    ctx: ControllerContext,
    runner: Arc<dyn ProcessRunner>,
    window_manager: Arc<dyn WindowManager>,
    topology: Arc<dyn TopologySource>,
    events_tx: mpsc::UnboundedSender<ServiceEvent>,
    events_rx: mpsc::UnboundedReceiver<ServiceEvent>,
    controller_rx: mpsc::UnboundedReceiver<ControllerEvent>,
}

impl BrightnessService {
    pub fn new(
        config: &Config,
        runner: Arc<dyn ProcessRunner>,
        window_manager: Arc<dyn WindowManager>,
        topology: Arc<dyn TopologySource>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (controller_tx, controller_rx) = mpsc::unbounded_channel();

        let ctx = ControllerContext {
            runner: Arc::clone(&runner),
            helpers: Arc::new(config.helpers.clone()),
            events: controller_tx,
            debounce: config.debounce(),
            ddc_default_max: config.ddc_default_max,
        };

        Self {
            directory: BrightnessDirectory::new(),
            registry: DdcRegistry::default(),
            apple_present: false,
            pending: 0,
            ctx,
            runner,
            window_manager,
            topology,
            events_tx,
            events_rx,
            controller_rx,
        }
    }

    pub fn handle(&self) -> ServiceHandle {
        ServiceHandle {
            events: self.events_tx.clone(),
        }
    }

    #[cfg(test)]
    pub fn directory(&self) -> &BrightnessDirectory {
        &self.directory
    }

    /// No detection, enumeration or probe is outstanding
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.directory.iter().all(|m| !m.is_probing())
    }

    /// No debounce window is open
    pub fn is_idle(&self) -> bool {
        self.directory
            .iter()
            .all(|m| m.state() == DebounceState::Idle)
    }

    /// Start DDC detection, Apple probing and display enumeration
    fn start_detection(&mut self) {
        info!("Detecting displays and backends");
        self.pending += 3;

        let events = self.events_tx.clone();
        let command = ddc_ci::detect_command(&self.ctx.helpers);
        let report = self.runner.run(&command);
        tokio::spawn(async move {
            let _ = events.send(ServiceEvent::DdcReport(report.await));
        });

        let events = self.events_tx.clone();
        let command = apple::presence_command(&self.ctx.helpers);
        let output = self.runner.run(&command);
        tokio::spawn(async move {
            let _ = events.send(ServiceEvent::AppleProbe(output.await));
        });

        let events = self.events_tx.clone();
        let displays = self.topology.displays();
        tokio::spawn(async move {
            let _ = events.send(ServiceEvent::Displays(displays.await));
        });
    }

    fn on_event(&mut self, event: ServiceEvent) {
        match event {
            ServiceEvent::TopologyChanged => self.start_detection(),
            ServiceEvent::Displays(displays) => {
                self.pending = self.pending.saturating_sub(1);
                self.directory
                    .rebuild(displays, &self.registry, self.apple_present, &self.ctx);
            }
            ServiceEvent::DdcReport(report) => {
                self.pending = self.pending.saturating_sub(1);
                self.registry.refresh(&report);
                self.directory.reclassify(&self.registry, self.apple_present);
            }
            ServiceEvent::AppleProbe(output) => {
                self.pending = self.pending.saturating_sub(1);
                self.apple_present = apple::is_present(&output);
                debug!(present = self.apple_present, "Apple display helper probed");
                self.directory.reclassify(&self.registry, self.apple_present);
            }
            ServiceEvent::Request(request, reply) => {
                let needs_wm = request.query().is_some_and(needs_window_manager);
                if needs_wm {
                    let snapshot = self.window_manager.snapshot();
                    let events = self.events_tx.clone();
                    tokio::spawn(async move {
                        let snapshot = snapshot.await;
                        let _ = events.send(ServiceEvent::Resolved(request, snapshot, reply));
                    });
                } else {
                    let _ = reply.send(self.respond(request, &OutputSnapshot::default()));
                }
            }
            ServiceEvent::Resolved(request, snapshot, reply) => {
                let _ = reply.send(self.respond(request, &snapshot));
            }
        }
    }

    fn respond(&mut self, request: Request, snapshot: &OutputSnapshot) -> Response {
        let mut facade = CommandFacade::new(&mut self.directory, snapshot);
        match request {
            Request::Get { query } => Response::Brightness(match query.as_str() {
                ACTIVE => facade.get(),
                query => facade.get_for(query),
            }),
            Request::Set { query, expression } => {
                let result = match query.as_str() {
                    ACTIVE => facade.set(&expression),
                    query => facade.set_for(query, &expression),
                };
                match result {
                    Ok(confirmation) => {
                        trace!(outcome = ?confirmation.outcome, "Set request handled");
                        Response::Status(confirmation.to_string())
                    }
                    Err(e) => {
                        info!("Brightness command rejected: {}", e);
                        Response::Status(e.to_string())
                    }
                }
            }
            Request::List => Response::Monitors(facade.list()),
        }
    }

    /// Handle one request inline, for one-shot use without a daemon
    pub async fn handle_request(&mut self, request: Request) -> Response {
        let snapshot = if request.query().is_some_and(needs_window_manager) {
            self.window_manager.snapshot().await
        } else {
            OutputSnapshot::default()
        };
        self.respond(request, &snapshot)
    }

    /// Process one event from either queue; `false` once both are closed
    async fn step(&mut self) -> bool {
        tokio::select! {
            Some(event) = self.controller_rx.recv() => {
                self.directory.dispatch(event);
                true
            }
            Some(event) = self.events_rx.recv() => {
                self.on_event(event);
                true
            }
            else => false,
        }
    }

    /// Detect everything and wait until every display has been read
    pub async fn settle(&mut self) {
        self.start_detection();
        while !self.is_settled() {
            if !self.step().await {
                break;
            }
        }
        info!("Settled with {} display(s)", self.directory.len());
    }

    /// Wait for open debounce windows to close and their queued writes to go out
    pub async fn drain(&mut self) {
        while !self.is_idle() {
            if !self.step().await {
                break;
            }
        }
    }

    /// Run forever, starting with a full detection
    pub async fn run(mut self) {
        self.start_detection();
        while self.step().await {}
        warn!("Brightness service stopped");
    }
}

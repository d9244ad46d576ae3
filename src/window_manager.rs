// SPDX-License-Identifier: GPL-3.0-only
//! Window manager queries
//!
//! Only two questions are ever asked: which output currently has focus, and
//! what numeric id the compositor gives each output. Answers come as a
//! snapshot taken just before a command is resolved.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;

use crate::config::WindowManagerKind;
use crate::monitor::Display;
use crate::process::{CommandLine, ProcessRunner};

/// Focus and id lookups for displays
pub trait WindowManagerQuery {
    fn is_focused(&self, display: &Display) -> bool;
    fn id_for(&self, display: &Display) -> Option<i64>;
}

/// Source of [`OutputSnapshot`]s
pub trait WindowManager: Send + Sync {
    fn snapshot(&self) -> BoxFuture<'static, OutputSnapshot>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputState {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub focused: bool,
}

/// Compositor view of all outputs at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSnapshot {
    pub outputs: Vec<OutputState>,
}

impl OutputSnapshot {
    fn output_for(&self, display: &Display) -> Option<&OutputState> {
        self.outputs.iter().find(|o| o.name == display.name)
    }
}

impl WindowManagerQuery for OutputSnapshot {
    fn is_focused(&self, display: &Display) -> bool {
        self.output_for(display).is_some_and(|o| o.focused)
    }

    fn id_for(&self, display: &Display) -> Option<i64> {
        self.output_for(display).map(|o| o.id)
    }
}

/// Hyprland, queried through `hyprctl monitors -j`
pub struct Hyprland {
    runner: Arc<dyn ProcessRunner>,
}

impl Hyprland {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    pub fn parse_monitors(json: &str) -> OutputSnapshot {
        match serde_json::from_str::<Vec<OutputState>>(json) {
            Ok(outputs) => OutputSnapshot { outputs },
            Err(e) => {
                debug!("Can't parse hyprctl monitors output: {}", e);
                OutputSnapshot::default()
            }
        }
    }
}

impl WindowManager for Hyprland {
    fn snapshot(&self) -> BoxFuture<'static, OutputSnapshot> {
        let command = CommandLine::new("hyprctl").arg("monitors").arg("-j");
        let output = self.runner.run(&command);
        Box::pin(async move { Self::parse_monitors(&output.await) })
    }
}

/// No compositor integration: nothing is focused and nothing has an id
pub struct NoWindowManager;

impl WindowManager for NoWindowManager {
    fn snapshot(&self) -> BoxFuture<'static, OutputSnapshot> {
        Box::pin(async { OutputSnapshot::default() })
    }
}

pub fn from_config(kind: WindowManagerKind, runner: Arc<dyn ProcessRunner>) -> Arc<dyn WindowManager> {
    match kind {
        WindowManagerKind::Hyprland => Arc::new(Hyprland::new(runner)),
        WindowManagerKind::None => Arc::new(NoWindowManager),
    }
}

// SPDX-License-Identifier: GPL-3.0-only
//! Command surface used by shortcuts and the socket interface
//!
//! `get` answers `-1` for an unknown target. `set` returns a typed result
//! whose text is the status line shown to the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::expression;
use crate::monitor::{BrightnessDirectory, SetOutcome};
use crate::window_manager::WindowManagerQuery;

/// Query used by the unqualified commands
pub const ACTIVE: &str = "active";

/// Brightness reported for an unknown target
pub const UNKNOWN_BRIGHTNESS: f64 = -1.0;

/// Successful `set`
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub display: String,
    pub brightness: f64,
    pub outcome: SetOutcome,
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Set {} brightness to {:.2}", self.display, self.brightness)
    }
}

/// One line of `list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSummary {
    pub name: String,
    pub model: String,
    pub serial: String,
    pub backend: String,
    pub brightness: f64,
}

pub struct CommandFacade<'a> {
    directory: &'a mut BrightnessDirectory,
    window_manager: &'a dyn WindowManagerQuery,
}

impl<'a> CommandFacade<'a> {
    pub fn new(
        directory: &'a mut BrightnessDirectory,
        window_manager: &'a dyn WindowManagerQuery,
    ) -> Self {
        Self {
            directory,
            window_manager,
        }
    }

    pub fn get(&self) -> f64 {
        self.get_for(ACTIVE)
    }

    pub fn get_for(&self, query: &str) -> f64 {
        self.directory
            .resolve(query, self.window_manager)
            .map(|m| m.brightness())
            .unwrap_or(UNKNOWN_BRIGHTNESS)
    }

    pub fn set(&mut self, expression: &str) -> Result<Confirmation, CommandError> {
        self.set_for(ACTIVE, expression)
    }

    pub fn set_for(&mut self, query: &str, expression: &str) -> Result<Confirmation, CommandError> {
        let monitor = self
            .directory
            .resolve_mut(query, self.window_manager)
            .ok_or_else(|| CommandError::UnknownMonitor(query.to_string()))?;

        let target = expression::evaluate(monitor.brightness(), expression)?.clamp(0.0, 1.0);
        let outcome = monitor.set_brightness(target);

        info!(
            display = %monitor.display().name,
            expression,
            target,
            ?outcome,
            "Brightness command"
        );

        Ok(Confirmation {
            display: monitor.display().name.clone(),
            brightness: target,
            outcome,
        })
    }

    pub fn list(&self) -> Vec<MonitorSummary> {
        self.directory
            .iter()
            .map(|m| MonitorSummary {
                name: m.display().name.clone(),
                model: m.display().model.clone(),
                serial: m.display().serial.clone(),
                backend: m.backend().kind().to_string(),
                brightness: m.brightness(),
            })
            .collect()
    }
}

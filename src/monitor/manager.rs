// SPDX-License-Identifier: GPL-3.0-only
//! Directory of brightness controllers
//!
//! Holds one [`MonitorController`] per connected display. The directory is
//! rebuilt from scratch whenever the set of displays changes; controllers
//! for displays that are still present are recreated and read again.
//!
//! # Queries
//!
//! Displays are looked up with a short query string:
//! - `active` - the output the window manager reports as focused
//! - `model:<X>`, `serial:<X>` - EDID model or serial
//! - `id:<N>` - the window manager's numeric output id
//! - anything else - the connector name, e.g. `DP-2`

use crate::window_manager::WindowManagerQuery;

use super::backend::{Display, classify};
use super::controller::{ControllerContext, ControllerEvent, ControllerId, MonitorController};
use super::ddc_registry::DdcRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Query<'a> {
    Active,
    Model(&'a str),
    Serial(&'a str),
    Id(&'a str),
    Name(&'a str),
}

impl<'a> Query<'a> {
    fn parse(query: &'a str) -> Self {
        if query == "active" {
            Query::Active
        } else if let Some(model) = query.strip_prefix("model:") {
            Query::Model(model)
        } else if let Some(serial) = query.strip_prefix("serial:") {
            Query::Serial(serial)
        } else if let Some(id) = query.strip_prefix("id:") {
            Query::Id(id)
        } else {
            Query::Name(query)
        }
    }
}

/// Whether resolving `query` needs a window manager snapshot
pub fn needs_window_manager(query: &str) -> bool {
    matches!(Query::parse(query), Query::Active | Query::Id(_))
}

#[derive(Default)]
pub struct BrightnessDirectory {
    monitors: Vec<MonitorController>,
    next_id: u64,
}

impl BrightnessDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every controller with fresh ones for `displays`
    pub fn rebuild(
        &mut self,
        displays: Vec<Display>,
        registry: &DdcRegistry,
        apple_present: bool,
        ctx: &ControllerContext,
    ) {
        self.monitors.clear();

        for candidate in displays {
            if self.monitors.iter().any(|m| m.display().name == candidate.name) {
                warn!("Duplicate display {} ignored", candidate.name);
                continue;
            }

            self.next_id += 1;
            let backend = classify(&candidate, registry, apple_present);
            info!(
                display = %candidate.name,
                model = %candidate.model,
                backend = backend.kind(),
                "Display added to directory"
            );
            self.monitors.push(MonitorController::new(
                ControllerId(self.next_id),
                candidate,
                backend,
                ctx.clone(),
            ));
        }
    }

    /// Re-run backend classification after the probe data changed
    pub fn reclassify(&mut self, registry: &DdcRegistry, apple_present: bool) {
        for monitor in &mut self.monitors {
            let backend = classify(monitor.display(), registry, apple_present);
            monitor.assign_backend(backend);
        }
    }

    /// Route a probe result or timer expiry to its controller
    pub fn dispatch(&mut self, event: ControllerEvent) {
        let Some(monitor) = self.get_mut(event.controller()) else {
            trace!("Dropping event for a retired controller: {:?}", event);
            return;
        };

        match event {
            ControllerEvent::Probed {
                generation, output, ..
            } => monitor.apply_probe(generation, &output),
            ControllerEvent::DebounceElapsed { epoch, .. } => monitor.on_debounce_elapsed(epoch),
        }
    }

    pub fn get_mut(&mut self, id: ControllerId) -> Option<&mut MonitorController> {
        self.monitors.iter_mut().find(|m| m.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonitorController> {
        self.monitors.iter()
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    fn position(&self, query: &str, wm: &dyn WindowManagerQuery) -> Option<usize> {
        let matches = |display: &Display| match Query::parse(query) {
            Query::Active => wm.is_focused(display),
            Query::Model(model) => display.model == model,
            Query::Serial(serial) => display.serial == serial,
            Query::Id(id) => id
                .trim()
                .parse::<i64>()
                .ok()
                .is_some_and(|id| wm.id_for(display) == Some(id)),
            Query::Name(name) => display.name == name,
        };

        self.monitors.iter().position(|m| matches(m.display()))
    }

    pub fn resolve(&self, query: &str, wm: &dyn WindowManagerQuery) -> Option<&MonitorController> {
        self.position(query, wm).map(|i| &self.monitors[i])
    }

    pub fn resolve_mut(
        &mut self,
        query: &str,
        wm: &dyn WindowManagerQuery,
    ) -> Option<&mut MonitorController> {
        self.position(query, wm).map(|i| &mut self.monitors[i])
    }
}

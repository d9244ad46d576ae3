// SPDX-License-Identifier: GPL-3.0-only
//! Per-display brightness state machine
//!
//! A controller owns the last known brightness of one display, reads it back
//! from the assigned backend, and writes new values. DDC/CI writes are slow
//! and get flaky when hammered, so after each DDC write a debounce window
//! opens; requests arriving inside it overwrite a single queued value that is
//! applied when the window closes. Other backends write straight through.
//!
//! Controllers never block. Probes and timers run as spawned tasks and report
//! back through [`ControllerEvent`]s, which the owner feeds into
//! [`MonitorController::apply_probe`] and
//! [`MonitorController::on_debounce_elapsed`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::config::HelperConfig;
use crate::process::ProcessRunner;
use crate::protocols::to_percent;

use super::backend::{Display, DisplayBackend};

/// Identity of one controller instance
///
/// Never reused, so events addressed to a controller that has since been
/// replaced by a topology change are recognizably stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerId(pub u64);

#[derive(Debug)]
pub enum ControllerEvent {
    /// A probe finished with the given stdout
    Probed {
        id: ControllerId,
        generation: u64,
        output: String,
    },
    /// A debounce window ran out
    DebounceElapsed { id: ControllerId, epoch: u64 },
}

impl ControllerEvent {
    pub fn controller(&self) -> ControllerId {
        match self {
            ControllerEvent::Probed { id, .. } => *id,
            ControllerEvent::DebounceElapsed { id, .. } => *id,
        }
    }
}

/// Everything a controller needs from its surroundings
#[derive(Clone)]
pub struct ControllerContext {
    pub runner: Arc<dyn ProcessRunner>,
    pub helpers: Arc<HelperConfig>,
    pub events: UnboundedSender<ControllerEvent>,
    pub debounce: Duration,
    pub ddc_default_max: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    DebounceWindowOpen,
}

/// What `set_brightness` did with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Same whole percentage as the current value
    Unchanged,
    /// Held until the open debounce window closes
    Queued,
    /// Written to the backend
    Dispatched,
}

pub struct MonitorController {
    id: ControllerId,
    display: Display,
    backend: DisplayBackend,
    brightness: f64,
    vcp_max: u32,
    queued_brightness: Option<f64>,
    state: DebounceState,
    timer: Option<JoinHandle<()>>,
    timer_epoch: u64,
    probe_generation: u64,
    probe_pending: bool,
    ctx: ControllerContext,
}

impl MonitorController {
    /// Create a controller and start reading its brightness
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        id: ControllerId,
        display: Display,
        backend: DisplayBackend,
        ctx: ControllerContext,
    ) -> Self {
        let vcp_max = backend.default_max(ctx.ddc_default_max);
        let mut controller = Self {
            id,
            display,
            backend,
            brightness: 0.0,
            vcp_max,
            queued_brightness: None,
            state: DebounceState::Idle,
            timer: None,
            timer_epoch: 0,
            probe_generation: 0,
            probe_pending: false,
            ctx,
        };
        controller.start_probe();
        controller
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn backend(&self) -> &DisplayBackend {
        &self.backend
    }

    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    #[cfg(test)]
    pub fn vcp_max(&self) -> u32 {
        self.vcp_max
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    #[cfg(test)]
    pub fn queued_brightness(&self) -> Option<f64> {
        self.queued_brightness
    }

    pub fn is_probing(&self) -> bool {
        self.probe_pending
    }

    /// Switch to `backend`, re-reading brightness if it differs
    ///
    /// A DDC display moving to another bus counts as a different backend.
    pub fn assign_backend(&mut self, backend: DisplayBackend) {
        if backend == self.backend {
            return;
        }

        info!(
            display = %self.display.name,
            from = self.backend.kind(),
            to = backend.kind(),
            "Backend reassigned"
        );

        self.close_debounce_window();
        self.queued_brightness = None;
        self.vcp_max = backend.default_max(self.ctx.ddc_default_max);
        self.backend = backend;
        self.start_probe();
    }

    fn start_probe(&mut self) {
        self.probe_generation += 1;
        self.probe_pending = true;

        let command = self.backend.probe_command(&self.ctx.helpers);
        let runner = Arc::clone(&self.ctx.runner);
        let events = self.ctx.events.clone();
        let id = self.id;
        let generation = self.probe_generation;

        debug!(display = %self.display.name, command = %command, "Probing brightness");

        tokio::spawn(async move {
            let output = runner.run(&command).await;
            let _ = events.send(ControllerEvent::Probed {
                id,
                generation,
                output,
            });
        });
    }

    /// Take in a finished probe; results of superseded probes are dropped
    pub fn apply_probe(&mut self, generation: u64, output: &str) {
        if generation != self.probe_generation {
            debug!(display = %self.display.name, "Ignoring stale probe result");
            return;
        }
        self.probe_pending = false;

        let default_max = self.backend.default_max(self.ctx.ddc_default_max);
        let reading = self.backend.parse_probe(output, default_max);
        self.brightness = reading.brightness.clamp(0.0, 1.0);
        self.vcp_max = reading.max;

        debug!(
            display = %self.display.name,
            backend = self.backend.kind(),
            brightness = self.brightness,
            max = self.vcp_max,
            "Brightness read"
        );
    }

    /// Request a new brightness (0.0-1.0, clamped)
    pub fn set_brightness(&mut self, value: f64) -> SetOutcome {
        let value = value.clamp(0.0, 1.0);

        if to_percent(value) == to_percent(self.brightness) {
            return SetOutcome::Unchanged;
        }

        if self.backend.is_ddc() && self.state == DebounceState::DebounceWindowOpen {
            trace!(display = %self.display.name, value, "Coalescing DDC write");
            self.queued_brightness = Some(value);
            return SetOutcome::Queued;
        }

        self.brightness = value;

        let command = self
            .backend
            .write_command(&self.ctx.helpers, value, self.vcp_max);
        debug!(display = %self.display.name, command = %command, "Writing brightness");
        self.ctx.runner.exec_detached(&command);

        if self.backend.is_ddc() {
            self.open_debounce_window();
        }

        SetOutcome::Dispatched
    }

    /// Close the window opened at `epoch` and apply whatever got queued
    pub fn on_debounce_elapsed(&mut self, epoch: u64) {
        if epoch != self.timer_epoch || self.state != DebounceState::DebounceWindowOpen {
            return;
        }

        self.timer = None;
        self.state = DebounceState::Idle;

        if let Some(value) = self.queued_brightness.take() {
            self.set_brightness(value);
        }
    }

    fn open_debounce_window(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        self.timer_epoch += 1;
        self.state = DebounceState::DebounceWindowOpen;

        let events = self.ctx.events.clone();
        let delay = self.ctx.debounce;
        let id = self.id;
        let epoch = self.timer_epoch;

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ControllerEvent::DebounceElapsed { id, epoch });
        }));
    }

    fn close_debounce_window(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        // Invalidate an expiry that may already be in flight
        self.timer_epoch += 1;
        self.state = DebounceState::Idle;
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl std::fmt::Debug for MonitorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorController")
            .field("id", &self.id)
            .field("display", &self.display.name)
            .field("backend", &self.backend)
            .field("brightness", &self.brightness)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;
    use crate::process::testing::RecordingRunner;
    use crate::protocols::apple::AppleDisplay;
    use crate::protocols::backlight::BacklightDisplay;
    use crate::protocols::ddc_ci::DdcCiDisplay;

    fn setup(
        backend: DisplayBackend,
        probe_output: &str,
    ) -> (
        MonitorController,
        Arc<RecordingRunner>,
        UnboundedReceiver<ControllerEvent>,
    ) {
        let runner = Arc::new(RecordingRunner::new());
        let helpers = HelperConfig::default();
        runner.set_output(&backend.probe_command(&helpers).to_string(), probe_output);

        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = ControllerContext {
            runner: runner.clone(),
            helpers: Arc::new(helpers),
            events: tx,
            debounce: Duration::from_millis(500),
            ddc_default_max: 250,
        };
        let display = Display {
            name: "DP-2".to_string(),
            model: "DELL U2720Q".to_string(),
            serial: "ABC123".to_string(),
        };

        let controller = MonitorController::new(ControllerId(1), display, backend, ctx);
        (controller, runner, rx)
    }

    async fn settle_probe(
        controller: &mut MonitorController,
        rx: &mut UnboundedReceiver<ControllerEvent>,
    ) {
        match rx.recv().await {
            Some(ControllerEvent::Probed {
                generation, output, ..
            }) => controller.apply_probe(generation, &output),
            other => panic!("expected probe result, got {other:?}"),
        }
    }

    fn ddc() -> DisplayBackend {
        DisplayBackend::DdcCi(DdcCiDisplay::new("3"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_read_ddc() {
        let (mut controller, runner, mut rx) = setup(ddc(), "VCP 10 C 30 100\n");
        assert!(controller.is_probing());
        settle_probe(&mut controller, &mut rx).await;

        assert!(!controller.is_probing());
        assert_eq!(controller.brightness(), 0.3);
        assert_eq!(controller.vcp_max(), 100);
        assert_eq!(runner.probes(), vec!["ddcutil -b 3 getvcp 10 --brief"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_brightness_rounds_consistently() {
        let (mut controller, _runner, mut rx) =
            setup(DisplayBackend::Backlight(BacklightDisplay), "0\n100\n");
        settle_probe(&mut controller, &mut rx).await;

        for value in [0.0, 0.123, 0.5, 0.876, 1.0] {
            controller.set_brightness(value);
            let shown = (controller.brightness() * 100.0).round() / 100.0;
            assert_eq!(shown, (value * 100.0_f64).round() / 100.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_percent_is_noop() {
        let (mut controller, runner, mut rx) =
            setup(DisplayBackend::Apple(AppleDisplay), "0");
        settle_probe(&mut controller, &mut rx).await;

        assert_eq!(controller.set_brightness(0.501), SetOutcome::Dispatched);
        assert_eq!(controller.set_brightness(0.499), SetOutcome::Unchanged);
        assert_eq!(runner.writes(), vec!["asdbctl set 50"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clamps_out_of_range() {
        let (mut controller, runner, mut rx) =
            setup(DisplayBackend::Backlight(BacklightDisplay), "50\n100\n");
        settle_probe(&mut controller, &mut rx).await;

        controller.set_brightness(1.7);
        assert_eq!(controller.brightness(), 1.0);
        controller.set_brightness(-3.0);
        assert_eq!(controller.brightness(), 0.0);
        assert_eq!(
            runner.writes(),
            vec!["brightnessctl s 100% --quiet", "brightnessctl s 0% --quiet"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_ddc_writes_are_not_debounced() {
        let (mut controller, runner, mut rx) =
            setup(DisplayBackend::Backlight(BacklightDisplay), "0\n100\n");
        settle_probe(&mut controller, &mut rx).await;

        controller.set_brightness(0.2);
        controller.set_brightness(0.3);
        controller.set_brightness(0.4);

        assert_eq!(controller.state(), DebounceState::Idle);
        assert_eq!(runner.writes().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ddc_writes_coalesce_within_window() {
        let (mut controller, runner, mut rx) = setup(ddc(), "VCP 10 C 0 100\n");
        settle_probe(&mut controller, &mut rx).await;

        assert_eq!(controller.set_brightness(0.2), SetOutcome::Dispatched);
        assert_eq!(controller.state(), DebounceState::DebounceWindowOpen);
        assert_eq!(controller.set_brightness(0.3), SetOutcome::Queued);
        assert_eq!(controller.set_brightness(0.4), SetOutcome::Queued);

        // Optimistic value only covers what was dispatched
        assert_eq!(controller.brightness(), 0.2);
        assert_eq!(controller.queued_brightness(), Some(0.4));
        assert_eq!(runner.writes(), vec!["ddcutil -b 3 setvcp 10 20"]);

        let start = tokio::time::Instant::now();
        match rx.recv().await {
            Some(ControllerEvent::DebounceElapsed { epoch, .. }) => {
                assert!(start.elapsed() >= Duration::from_millis(500));
                controller.on_debounce_elapsed(epoch);
            }
            other => panic!("expected debounce expiry, got {other:?}"),
        }

        assert_eq!(
            runner.writes(),
            vec!["ddcutil -b 3 setvcp 10 20", "ddcutil -b 3 setvcp 10 40"]
        );
        assert_eq!(controller.brightness(), 0.4);
        assert_eq!(controller.queued_brightness(), None);
        // The queued write opened a fresh window
        assert_eq!(controller.state(), DebounceState::DebounceWindowOpen);

        match rx.recv().await {
            Some(ControllerEvent::DebounceElapsed { epoch, .. }) => {
                controller.on_debounce_elapsed(epoch)
            }
            other => panic!("expected debounce expiry, got {other:?}"),
        }
        assert_eq!(controller.state(), DebounceState::Idle);
        assert_eq!(runner.writes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_percent_inside_window_keeps_queued_write() {
        let (mut controller, runner, mut rx) = setup(ddc(), "VCP 10 C 0 100\n");
        settle_probe(&mut controller, &mut rx).await;

        assert_eq!(controller.set_brightness(0.2), SetOutcome::Dispatched);
        assert_eq!(controller.set_brightness(0.6), SetOutcome::Queued);
        assert_eq!(controller.set_brightness(0.2), SetOutcome::Unchanged);
        assert_eq!(controller.queued_brightness(), Some(0.6));

        match rx.recv().await {
            Some(ControllerEvent::DebounceElapsed { epoch, .. }) => {
                controller.on_debounce_elapsed(epoch)
            }
            other => panic!("expected debounce expiry, got {other:?}"),
        }

        assert_eq!(
            runner.writes(),
            vec!["ddcutil -b 3 setvcp 10 20", "ddcutil -b 3 setvcp 10 60"]
        );
        assert_eq!(controller.brightness(), 0.6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ddc_write_uses_vcp_max() {
        let (mut controller, runner, mut rx) = setup(ddc(), "garbage");
        settle_probe(&mut controller, &mut rx).await;
        assert_eq!(controller.vcp_max(), 250);

        controller.set_brightness(0.5);
        assert_eq!(runner.writes(), vec!["ddcutil -b 3 setvcp 10 125"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reassignment_reprobes_and_ignores_stale_result() {
        let (mut controller, runner, mut rx) = setup(ddc(), "VCP 10 C 30 100\n");
        let helpers = HelperConfig::default();
        let moved = DisplayBackend::DdcCi(DdcCiDisplay::new("9"));
        runner.set_output(&moved.probe_command(&helpers).to_string(), "VCP 10 C 80 100\n");

        controller.assign_backend(moved.clone());
        // Same backend again is not a reassignment
        controller.assign_backend(moved);

        settle_probe(&mut controller, &mut rx).await;
        assert!(controller.is_probing(), "first result belongs to the old bus");
        settle_probe(&mut controller, &mut rx).await;

        assert_eq!(controller.brightness(), 0.8);
        assert_eq!(runner.probes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reassignment_drops_queued_write() {
        let (mut controller, runner, mut rx) = setup(ddc(), "VCP 10 C 0 100\n");
        settle_probe(&mut controller, &mut rx).await;

        controller.set_brightness(0.2);
        controller.set_brightness(0.6);
        controller.assign_backend(DisplayBackend::Backlight(BacklightDisplay));

        assert_eq!(controller.state(), DebounceState::Idle);
        assert_eq!(controller.queued_brightness(), None);

        tokio::time::sleep(Duration::from_secs(1)).await;
        while let Ok(event) = rx.try_recv() {
            if let ControllerEvent::DebounceElapsed { epoch, .. } = event {
                controller.on_debounce_elapsed(epoch);
            }
        }
        assert_eq!(runner.writes(), vec!["ddcutil -b 3 setvcp 10 20"]);
    }
}

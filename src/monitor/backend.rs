use serde::Serialize;

use crate::config::HelperConfig;
use crate::process::CommandLine;
use crate::protocols::apple::{AppleDisplay, STUDIO_DISPLAY_MODEL};
use crate::protocols::backlight::BacklightDisplay;
use crate::protocols::ddc_ci::DdcCiDisplay;
use crate::protocols::{DisplayProtocol, Reading};

use super::ddc_registry::DdcRegistry;

/// A display as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Display {
    /// Connector name, e.g. `DP-2` or `eDP-1`
    pub name: String,
    pub model: String,
    pub serial: String,
}

/// Backend type for display control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBackend {
    /// Apple displays via the `asdbctl` helper
    Apple(AppleDisplay),
    /// DDC/CI protocol (standard external monitors via I2C)
    DdcCi(DdcCiDisplay),
    /// Internal panel backlight
    Backlight(BacklightDisplay),
}

impl DisplayBackend {
    fn protocol(&self) -> &dyn DisplayProtocol {
        match self {
            DisplayBackend::Apple(display) => display,
            DisplayBackend::DdcCi(display) => display,
            DisplayBackend::Backlight(display) => display,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DisplayBackend::Apple(_) => "apple",
            DisplayBackend::DdcCi(_) => "ddc",
            DisplayBackend::Backlight(_) => "backlight",
        }
    }

    pub fn is_ddc(&self) -> bool {
        matches!(self, DisplayBackend::DdcCi(_))
    }

    /// Native maximum assumed before the first read
    pub fn default_max(&self, ddc_default_max: u32) -> u32 {
        match self {
            DisplayBackend::DdcCi(_) => ddc_default_max,
            _ => 100,
        }
    }

    pub fn probe_command(&self, helpers: &HelperConfig) -> CommandLine {
        self.protocol().probe_command(helpers)
    }

    pub fn parse_probe(&self, output: &str, default_max: u32) -> Reading {
        self.protocol().parse_probe(output, default_max)
    }

    pub fn write_command(&self, helpers: &HelperConfig, value: f64, max: u32) -> CommandLine {
        self.protocol().write_command(helpers, value, max)
    }
}

/// Pick the backend for `display`; first match wins
///
/// 1. Apple helper answered and the model is a Studio Display
/// 2. The connector shows up in the DDC detection report
/// 3. Backlight
pub fn classify(display: &Display, registry: &DdcRegistry, apple_present: bool) -> DisplayBackend {
    if apple_present && display.model.starts_with(STUDIO_DISPLAY_MODEL) {
        return DisplayBackend::Apple(AppleDisplay);
    }

    if let Some(bus) = registry.bus_for(&display.name) {
        return DisplayBackend::DdcCi(DdcCiDisplay::new(bus));
    }

    DisplayBackend::Backlight(BacklightDisplay)
}

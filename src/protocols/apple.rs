// SPDX-License-Identifier: GPL-3.0-only
//! Apple displays driven through the `asdbctl` helper
//!
//! The helper talks USB HID to the Apple Studio Display and reports or sets
//! brightness as a percentage.

use crate::config::HelperConfig;
use crate::process::CommandLine;

use super::{DisplayProtocol, Reading, extract_integers, to_percent};

/// Model prefix reported by Apple Studio Display EDIDs
pub const STUDIO_DISPLAY_MODEL: &str = "StudioDisplay";

/// Native maximum for Apple writes (percent)
const MAX: u32 = 100;

/// Reads divide by 101 rather than 100. Existing setups were calibrated
/// against this value, so it stays.
const READ_DIVISOR: f64 = 101.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppleDisplay;

/// Command whose non-empty output means an Apple display is attached
pub fn presence_command(helpers: &HelperConfig) -> CommandLine {
    CommandLine::new(&helpers.apple).arg("get")
}

pub fn is_present(output: &str) -> bool {
    !output.trim().is_empty()
}

impl DisplayProtocol for AppleDisplay {
    fn probe_command(&self, helpers: &HelperConfig) -> CommandLine {
        CommandLine::new(&helpers.apple).arg("get")
    }

    fn parse_probe(&self, output: &str, _default_max: u32) -> Reading {
        let brightness = extract_integers(output)
            .last()
            .map(|last| (*last as f64 / READ_DIVISOR).clamp(0.0, 1.0))
            .unwrap_or(0.0);

        Reading {
            brightness,
            max: MAX,
        }
    }

    fn write_command(&self, helpers: &HelperConfig, value: f64, _max: u32) -> CommandLine {
        CommandLine::new(&helpers.apple)
            .arg("set")
            .arg(to_percent(value).to_string())
    }
}

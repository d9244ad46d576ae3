// SPDX-License-Identifier: GPL-3.0-only
//! Display brightness control protocols
//!
//! Each protocol knows which helper command reads the current brightness,
//! how to make sense of that command's output, and which command writes a
//! new value. Running the commands is left to the caller.

pub mod apple;
pub mod backlight;
pub mod ddc_ci;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::HelperConfig;
use crate::process::CommandLine;

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Brightness read back from a probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Normalized brightness, 0.0-1.0
    pub brightness: f64,
    /// Native maximum used to scale writes
    pub max: u32,
}

/// Common trait for all display control protocols
pub trait DisplayProtocol: std::fmt::Debug {
    /// Command that reports the current brightness
    fn probe_command(&self, helpers: &HelperConfig) -> CommandLine;

    /// Interpret the probe's stdout
    ///
    /// Never fails: unexpected output yields a zero reading.
    fn parse_probe(&self, output: &str, default_max: u32) -> Reading;

    /// Command that sets the normalized `value` (0.0-1.0)
    fn write_command(&self, helpers: &HelperConfig, value: f64, max: u32) -> CommandLine;
}

/// All unsigned integers in `text`, in order of appearance
///
/// Helper output often carries labels or echo markers around the values, so
/// probes pick numbers out rather than parsing fixed layouts.
pub fn extract_integers(text: &str) -> Vec<u64> {
    INTEGER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// `value` (0.0-1.0) as a whole percentage
pub fn to_percent(value: f64) -> u32 {
    (value * 100.0).round() as u32
}

/// Normalized ratio that tolerates a zero maximum
pub(crate) fn ratio(current: u64, max: u64) -> f64 {
    if max > 0 {
        (current as f64 / max as f64).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

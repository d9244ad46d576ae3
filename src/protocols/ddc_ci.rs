// SPDX-License-Identifier: GPL-3.0-only
//! DDC/CI (Display Data Channel Command Interface) protocol implementation
//!
//! DDC/CI is a standard protocol for controlling monitors over I2C bus.
//! It's supported by most modern external monitors via the video cable.
//! All traffic goes through `ddcutil`, addressed by I2C bus number.

use crate::config::HelperConfig;
use crate::process::CommandLine;

use super::{DisplayProtocol, Reading, ratio};

/// VCP (Virtual Control Panel) code for brightness
const BRIGHTNESS_CODE: &str = "10";

/// DDC/CI display on a given I2C bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdcCiDisplay {
    pub bus: String,
}

impl DdcCiDisplay {
    pub fn new(bus: impl Into<String>) -> Self {
        Self { bus: bus.into() }
    }
}

/// Command listing every DDC-capable display
pub fn detect_command(helpers: &HelperConfig) -> CommandLine {
    CommandLine::new(&helpers.ddcutil)
        .arg("detect")
        .arg("--sleep-multiplier=0.5")
}

impl DisplayProtocol for DdcCiDisplay {
    fn probe_command(&self, helpers: &HelperConfig) -> CommandLine {
        CommandLine::new(&helpers.ddcutil)
            .arg("-b")
            .arg(&self.bus)
            .arg("getvcp")
            .arg(BRIGHTNESS_CODE)
            .arg("--brief")
    }

    /// `--brief` prints `VCP 10 C <current> <max>`
    fn parse_probe(&self, output: &str, default_max: u32) -> Reading {
        let tokens: Vec<&str> = output.split_whitespace().collect();
        let current = tokens.get(3).and_then(|t| t.parse::<u64>().ok());
        let max = tokens.get(4).and_then(|t| t.parse::<u32>().ok());

        match (current, max) {
            (Some(current), Some(max)) => Reading {
                brightness: ratio(current, max.into()),
                max: if max > 0 { max } else { default_max },
            },
            _ => Reading {
                brightness: 0.0,
                max: default_max,
            },
        }
    }

    fn write_command(&self, helpers: &HelperConfig, value: f64, max: u32) -> CommandLine {
        let raw = (value * max as f64).round() as u32;
        CommandLine::new(&helpers.ddcutil)
            .arg("-b")
            .arg(&self.bus)
            .arg("setvcp")
            .arg(BRIGHTNESS_CODE)
            .arg(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brief_probe() {
        let display = DdcCiDisplay::new("3");
        let reading = display.parse_probe("VCP 10 C 60 120\n", 250);
        assert_eq!(reading.brightness, 0.5);
        assert_eq!(reading.max, 120);
    }

    #[test]
    fn test_unparseable_probe_keeps_default_max() {
        let display = DdcCiDisplay::new("3");
        let reading = display.parse_probe("Display not found", 250);
        assert_eq!(reading.brightness, 0.0);
        assert_eq!(reading.max, 250);
    }

    #[test]
    fn test_write_scales_to_vcp_max() {
        let helpers = HelperConfig::default();
        let display = DdcCiDisplay::new("7");
        assert_eq!(
            display.write_command(&helpers, 0.5, 250).to_string(),
            "ddcutil -b 7 setvcp 10 125"
        );
        assert_eq!(
            display.probe_command(&helpers).to_string(),
            "ddcutil -b 7 getvcp 10 --brief"
        );
    }
}

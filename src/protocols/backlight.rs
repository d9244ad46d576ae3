// SPDX-License-Identifier: GPL-3.0-only
//! Internal panels driven through `brightnessctl`

use crate::config::HelperConfig;
use crate::process::CommandLine;

use super::{DisplayProtocol, Reading, extract_integers, ratio, to_percent};

/// Writes are percentages
const MAX: u32 = 100;

const PROBE_SCRIPT: &str = r#""$0" g; "$0" m"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacklightDisplay;

impl DisplayProtocol for BacklightDisplay {
    /// Prints the current value followed by the maximum
    ///
    /// The program is handed to the shell as `$0`, never spliced into the script.
    fn probe_command(&self, helpers: &HelperConfig) -> CommandLine {
        CommandLine::new("sh")
            .arg("-c")
            .arg(PROBE_SCRIPT)
            .arg(&helpers.backlight)
    }

    fn parse_probe(&self, output: &str, _default_max: u32) -> Reading {
        let values = extract_integers(output);
        let brightness = match values.as_slice() {
            [.., current, max] => ratio(*current, *max),
            _ => 0.0,
        };

        Reading {
            brightness,
            max: MAX,
        }
    }

    fn write_command(&self, helpers: &HelperConfig, value: f64, _max: u32) -> CommandLine {
        CommandLine::new(&helpers.backlight)
            .arg("s")
            .arg(format!("{}%", to_percent(value)))
            .arg("--quiet")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_takes_last_two_integers() {
        let reading = BacklightDisplay.parse_probe("marker 7\n19200\n24000\n", 250);
        assert_eq!(reading.brightness, 0.8);
        assert_eq!(reading.max, 100);
    }

    #[test]
    fn test_probe_zero_max() {
        let reading = BacklightDisplay.parse_probe("0\n0\n", 250);
        assert_eq!(reading.brightness, 0.0);
    }

    #[test]
    fn test_probe_missing_values() {
        assert_eq!(BacklightDisplay.parse_probe("42", 250).brightness, 0.0);
    }

    #[test]
    fn test_probe_passes_program_as_argument() {
        let helpers = HelperConfig {
            backlight: "/opt/my tools/brightnessctl; rm".to_string(),
            ..HelperConfig::default()
        };
        let command = BacklightDisplay.probe_command(&helpers);
        assert_eq!(command.program, "sh");
        assert_eq!(
            command.args,
            vec![
                "-c".to_string(),
                r#""$0" g; "$0" m"#.to_string(),
                "/opt/my tools/brightnessctl; rm".to_string(),
            ]
        );
    }

    #[test]
    fn test_write_is_percent_string() {
        let helpers = HelperConfig::default();
        assert_eq!(
            BacklightDisplay.write_command(&helpers, 0.333, 100).to_string(),
            "brightnessctl s 33% --quiet"
        );
    }
}

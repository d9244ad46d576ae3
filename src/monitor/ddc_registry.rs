// SPDX-License-Identifier: GPL-3.0-only
//! Displays reachable over DDC/CI
//!
//! Built from the text report of `ddcutil detect`. The report is a series of
//! blank-line separated blocks; each `Display N` block names the I2C bus and
//! the DRM connector the monitor hangs off.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static I2C_BUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)I2C bus:\s*/dev/i2c-(\d+)").unwrap());
static DRM_CONNECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)DRM[ _]connector:[ \t]*(.*?)[ \t]*$").unwrap());
static CARD_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^card\d+-").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DdcEntry {
    pub bus_number: String,
    pub connector_name: String,
}

#[derive(Debug, Default, Clone)]
pub struct DdcRegistry {
    entries: BTreeSet<DdcEntry>,
}

impl DdcRegistry {
    /// Replace the registry with the displays found in `report`
    pub fn refresh(&mut self, report: &str) -> &BTreeSet<DdcEntry> {
        self.entries = parse_report(report);
        debug!("DDC registry refreshed with {} display(s)", self.entries.len());
        &self.entries
    }

    #[cfg(test)]
    pub fn entries(&self) -> &BTreeSet<DdcEntry> {
        &self.entries
    }

    /// I2C bus of the display attached to `connector`
    pub fn bus_for(&self, connector: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.connector_name == connector)
            .map(|e| e.bus_number.as_str())
    }
}

pub fn parse_report(report: &str) -> BTreeSet<DdcEntry> {
    blocks(report)
        .into_iter()
        .filter(|block| block.trim_start().starts_with("Display "))
        .filter_map(|block| parse_block(&block))
        .collect()
}

fn blocks(report: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    for line in report.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn parse_block(block: &str) -> Option<DdcEntry> {
    let bus_number = I2C_BUS.captures(block)?.get(1)?.as_str().to_string();
    let connector = DRM_CONNECTOR.captures(block)?.get(1)?.as_str();
    let connector_name = CARD_PREFIX.replace(connector, "").into_owned();

    if connector_name.is_empty() {
        return None;
    }

    Some(DdcEntry {
        bus_number,
        connector_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Display 1
   I2C bus:  /dev/i2c-3
   DRM connector:           card1-DP-2
   EDID synopsis:
      Mfg id:               DEL - Dell Inc.
      Model:                DELL U2720Q
   VCP version:         2.1

Invalid display
   I2C bus:  /dev/i2c-5
   DRM connector:           card1-eDP-1
   DDC communication failed

Display 2
   I2C bus:  /dev/i2c-8
   DRM_connector:           card0-HDMI-A-1
   VCP version:         2.2
";

    fn entry(bus: &str, connector: &str) -> DdcEntry {
        DdcEntry {
            bus_number: bus.to_string(),
            connector_name: connector.to_string(),
        }
    }

    #[test]
    fn test_single_display() {
        let entries = parse_report(
            "Display 1\n   I2C bus:  /dev/i2c-3\n   DRM connector: card1-DP-2\n",
        );
        assert_eq!(entries.into_iter().collect::<Vec<_>>(), vec![entry("3", "DP-2")]);
    }

    #[test]
    fn test_full_report_skips_invalid_blocks() {
        let entries = parse_report(REPORT);
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&entry("3", "DP-2")));
        assert!(entries.contains(&entry("8", "HDMI-A-1")));
    }

    #[test]
    fn test_case_insensitive_fields() {
        let entries = parse_report("Display 3\ni2c BUS: /dev/i2c-11\ndrm connector: card2-DP-5\n");
        assert!(entries.contains(&entry("11", "DP-5")));
    }

    #[test]
    fn test_block_missing_field_is_dropped() {
        assert!(parse_report("Display 1\n   I2C bus:  /dev/i2c-3\n").is_empty());
        assert!(parse_report("Display 1\n   DRM connector: card1-DP-2\n").is_empty());
    }

    #[test]
    fn test_empty_or_garbage_report() {
        assert!(parse_report("").is_empty());
        assert!(parse_report("No displays found.\nis ddcutil installed?").is_empty());
    }

    #[test]
    fn test_refresh_replaces_entries() {
        let mut registry = DdcRegistry::default();
        registry.refresh(REPORT);
        assert_eq!(registry.bus_for("HDMI-A-1"), Some("8"));

        registry.refresh("");
        assert!(registry.entries().is_empty());
        assert_eq!(registry.bus_for("HDMI-A-1"), None);
    }
}

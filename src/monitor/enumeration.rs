// SPDX-License-Identifier: GPL-3.0-only
//! Display enumeration from DRM connectors
//!
//! Every `/sys/class/drm/card<N>-<connector>` entry whose `status` reads
//! `connected` becomes a [`Display`]. The connector name loses its `card<N>-`
//! prefix so it matches what compositors and `ddcutil` call the output.
//! Model and serial come from the connector's EDID.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;

use super::backend::Display;

static CONNECTOR_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^card\d+-(.+)$").unwrap());

const EDID_HEADER: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
const DESCRIPTOR_OFFSETS: [usize; 4] = [54, 72, 90, 108];
const TAG_SERIAL: u8 = 0xFF;
const TAG_MODEL: u8 = 0xFC;

/// Source of the current set of displays
pub trait TopologySource: Send + Sync {
    fn displays(&self) -> BoxFuture<'static, Vec<Display>>;
}

/// Connected DRM connectors under a sysfs root
pub struct DrmTopology {
    root: PathBuf,
}

impl DrmTopology {
    pub fn new() -> Self {
        Self::with_root("/sys/class/drm")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for DrmTopology {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologySource for DrmTopology {
    fn displays(&self) -> BoxFuture<'static, Vec<Display>> {
        let root = self.root.clone();
        Box::pin(async move {
            // sysfs reads block
            match tokio::task::spawn_blocking(move || enumerate_connectors(&root)).await {
                Ok(Ok(displays)) => displays,
                Ok(Err(e)) => {
                    error!("Failed to enumerate displays: {:#}", e);
                    Vec::new()
                }
                Err(e) => {
                    error!("Task join error: {e}");
                    Vec::new()
                }
            }
        })
    }
}

pub fn enumerate_connectors(root: &Path) -> Result<Vec<Display>> {
    let entries =
        fs::read_dir(root).with_context(|| format!("can't read {}", root.display()))?;

    let mut displays = Vec::new();
    for entry in entries.flatten() {
        let dir_name = entry.file_name();
        let Some(name) = dir_name
            .to_str()
            .and_then(|n| CONNECTOR_DIR.captures(n))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            continue;
        };

        let path = entry.path();
        let status = fs::read_to_string(path.join("status")).unwrap_or_default();
        if status.trim() != "connected" {
            trace!("Skipping {} ({})", name, status.trim());
            continue;
        }

        let edid = fs::read(path.join("edid")).unwrap_or_default();
        let info = EdidInfo::parse(&edid).unwrap_or_default();
        debug!(
            connector = %name,
            model = %info.model,
            serial = %info.serial,
            "Found connected output"
        );

        displays.push(Display {
            name,
            model: info.model,
            serial: info.serial,
        });
    }

    displays.sort_by(|a, b| a.name.cmp(&b.name));
    info!("Found {} connected display(s)", displays.len());
    Ok(displays)
}

/// Identity fields from an EDID base block
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EdidInfo {
    pub model: String,
    pub serial: String,
}

impl EdidInfo {
    /// `None` if `edid` is not a valid base block
    pub fn parse(edid: &[u8]) -> Option<Self> {
        if edid.len() < 128 || edid[..8] != EDID_HEADER {
            return None;
        }

        let mut info = EdidInfo::default();
        for offset in DESCRIPTOR_OFFSETS {
            let descriptor = &edid[offset..offset + 18];
            // Display descriptors start with a zero pixel clock
            if descriptor[0] != 0 || descriptor[1] != 0 {
                continue;
            }
            match descriptor[3] {
                TAG_MODEL => info.model = descriptor_text(&descriptor[5..]),
                TAG_SERIAL => info.serial = descriptor_text(&descriptor[5..]),
                _ => {}
            }
        }

        if info.serial.is_empty() {
            let numeric = u32::from_le_bytes([edid[12], edid[13], edid[14], edid[15]]);
            if numeric != 0 {
                info.serial = numeric.to_string();
            }
        }

        Some(info)
    }
}

fn descriptor_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0x0A).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

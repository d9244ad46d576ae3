//! Display hotplug detection using udev
//!
//! Monitors udev for DRM device changes and asks the brightness service to
//! re-detect displays once a burst of events has settled.

mod subscription;
mod udev_monitor;

pub use subscription::spawn_hotplug_watcher;

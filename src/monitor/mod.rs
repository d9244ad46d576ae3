mod backend;
mod controller;
mod ddc_registry;
mod enumeration;
mod manager;

pub use backend::Display;
pub use controller::{ControllerContext, ControllerEvent, DebounceState, SetOutcome};
pub use ddc_registry::DdcRegistry;
pub use enumeration::{DrmTopology, TopologySource};
pub use manager::{BrightnessDirectory, needs_window_manager};

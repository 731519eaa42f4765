//! Saving and loading container trees and plotter configuration

use std::path::Path;

use crate::container::Container;
use crate::error::{MetricError, Result};
use crate::plot::PlotterConfig;
use crate::state::{NodeState, StateRegistry};

/// Write the state of a container tree as pretty JSON.
///
/// Parent directories are created when missing.
pub fn save_to<P: AsRef<Path>>(path: P, container: &Container) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(&container.state_dict()?)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| MetricError::io(parent, e))?;
    }
    std::fs::write(path, json).map_err(|e| MetricError::io(path, e))?;
    tracing::debug!(path = %path.display(), "saved container state");
    Ok(())
}

/// Rebuild a container tree saved with [`save_to`].
pub fn load_container<P: AsRef<Path>>(path: P) -> Result<Container> {
    load_container_with(path, &StateRegistry::default())
}

/// Rebuild a container tree, resolving variant tags through `registry`.
pub fn load_container_with<P: AsRef<Path>>(path: P, registry: &StateRegistry) -> Result<Container> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| MetricError::io(path, e))?;
    let state: NodeState = serde_json::from_str(&content)?;

    let mut container = Container::new();
    container.load_state_dict_with(&state, registry)?;
    tracing::debug!(path = %path.display(), children = container.len(), "loaded container state");
    Ok(container)
}

/// Read a [`PlotterConfig`] from a YAML file.
pub fn load_plotter_config<P: AsRef<Path>>(path: P) -> Result<PlotterConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| MetricError::io(path, e))?;
    PlotterConfig::from_yaml_str(&content)
}

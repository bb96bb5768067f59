// src/planner/loader.rs
// Single-slot roadmap cache in front of the device. Only ever used under the planner lock.

use std::collections::BTreeMap;

use log::{error, info};

use crate::device::{DeviceFault, RapidPlanDevice, RoadmapHandle};
use crate::roadmap::RoadmapSpecification;

/// The roadmap currently resident on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRoadmapState {
    /// Roadmap name
    pub name: String,
    /// Device slot and size
    pub handle: RoadmapHandle,
}

/// Everything the planner lock protects: the device and what it holds
pub(crate) struct DeviceSlot<D> {
    pub(crate) device: D,
    loaded: Option<LoadedRoadmapState>,
    // every roadmap written to the device, by board index
    board: BTreeMap<u16, String>,
}

impl<D: RapidPlanDevice> DeviceSlot<D> {
    pub(crate) fn new(device: D) -> Self {
        DeviceSlot {
            device,
            loaded: None,
            board: BTreeMap::new(),
        }
    }

    pub(crate) fn loaded(&self) -> Option<&LoadedRoadmapState> {
        self.loaded.as_ref()
    }

    pub(crate) fn board_index_of(&self, name: &str) -> Option<u16> {
        self.board
            .iter()
            .find(|(_, roadmap)| roadmap.as_str() == name)
            .map(|(index, _)| *index)
    }

    /// Make `spec` the resident roadmap, loading it only if another one is resident.
    /// A failed load keeps the previously loaded roadmap.
    pub(crate) fn ensure_loaded(
        &mut self,
        spec: &RoadmapSpecification,
    ) -> Result<RoadmapHandle, DeviceFault> {
        if let Some(loaded) = &self.loaded {
            if loaded.name == spec.name {
                return Ok(loaded.handle);
            }
        }

        let previous = self.loaded.as_ref().map(|l| l.name.as_str()).unwrap_or("<none>");
        info!("Swapping roadmap {} -> {}", previous, spec.name);

        let handle = match self.device.load_roadmap(&spec.file) {
            Ok(handle) => handle,
            Err(fault) => {
                error!(
                    "Device failed to load roadmap {} from {}: {}",
                    spec.name,
                    spec.file.display(),
                    fault
                );
                return Err(fault);
            }
        };

        // a board index now holds this roadmap, whatever it held before
        self.board.retain(|_, name| *name != spec.name);
        self.board.insert(handle.index, spec.name.clone());
        self.loaded = Some(LoadedRoadmapState {
            name: spec.name.clone(),
            handle,
        });
        info!(
            "Loaded roadmap {} at board index {} ({} states, {} edges)",
            spec.name, handle.index, handle.state_count, handle.edge_count
        );
        Ok(handle)
    }
}

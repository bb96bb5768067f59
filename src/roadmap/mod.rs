//! Roadmap identities
//!
//! A roadmap specification names a precomputed roadmap file and the load-time
//! metadata needed to plan with it. Specifications are registered once at
//! startup and never change afterwards.

mod registry;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use registry::RoadmapRegistry;

/// Identity of a roadmap: name, file, kinematic group and load metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapSpecification {
    /// Unique roadmap name
    pub name: String,
    /// Kinematic group the roadmap was generated for
    pub group: String,
    /// Roadmap file handed to the device
    pub file: PathBuf,
    /// Reference frame of the roadmap's tool poses and occupancy volume
    #[serde(default = "default_frame_id")]
    pub frame_id: String,
    /// Scale applied when the roadmap was generated
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Workspace volume covered by occupancy data for this roadmap
    #[serde(default)]
    pub volume: OccupancyVolume,
}

/// Axis-aligned workspace box that occupancy voxels are indexed in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyVolume {
    /// Box center in the roadmap frame (meters)
    pub center: [f64; 3],
    /// Box edge lengths (meters)
    pub dimensions: [f64; 3],
    /// Voxel edge length (meters)
    pub voxel_size: f64,
}

impl Default for OccupancyVolume {
    fn default() -> Self {
        OccupancyVolume {
            center: [0.0, 0.0, 0.0],
            dimensions: [1.0, 1.0, 1.0],
            voxel_size: 0.05,
        }
    }
}

impl OccupancyVolume {
    /// Number of voxels along each axis
    pub fn voxel_counts(&self) -> [u16; 3] {
        let mut counts = [0u16; 3];
        if self.voxel_size.is_nan() || self.voxel_size <= 0.0 {
            return counts;
        }
        for (count, dimension) in counts.iter_mut().zip(self.dimensions) {
            let cells = (dimension / self.voxel_size).ceil();
            *count = cells.clamp(0.0, u16::MAX as f64) as u16;
        }
        counts
    }

    /// Minimum corner of the box
    pub fn min_corner(&self) -> [f64; 3] {
        [
            self.center[0] - self.dimensions[0] / 2.0,
            self.center[1] - self.dimensions[1] / 2.0,
            self.center[2] - self.dimensions[2] / 2.0,
        ]
    }
}

impl RoadmapSpecification {
    /// Create a specification with default frame, scale and volume
    pub fn new(name: &str, group: &str, file: impl Into<PathBuf>) -> Self {
        RoadmapSpecification {
            name: name.to_string(),
            group: group.to_string(),
            file: file.into(),
            frame_id: default_frame_id(),
            scale: default_scale(),
            volume: OccupancyVolume::default(),
        }
    }
}

fn default_frame_id() -> String {
    "world".to_string()
}

fn default_scale() -> f64 {
    1.0
}

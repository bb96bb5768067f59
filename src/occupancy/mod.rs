//! Occupancy data for collision pruning
//!
//! Occupancy arrives as a set of voxel indices inside a roadmap's
//! [`OccupancyVolume`](crate::roadmap::OccupancyVolume). Producing it from
//! sensor data is the job of an [`OccupancyEncoder`]; the planner only passes
//! the encoded buffer through to the device for a single solve.

mod voxel;

use std::collections::HashSet;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::roadmap::OccupancyVolume;

pub use voxel::VoxelGridEncoder;

/// Index of one occupied voxel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Voxel {
    /// X index
    pub x: u16,
    /// Y index
    pub y: u16,
    /// Z index
    pub z: u16,
}

impl Voxel {
    /// Create a voxel index
    pub fn new(x: u16, y: u16, z: u16) -> Self {
        Voxel { x, y, z }
    }
}

/// Encoded obstacles for one solve call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyData {
    voxels: Vec<Voxel>,
}

impl OccupancyData {
    /// No obstacles
    pub fn empty() -> Self {
        OccupancyData { voxels: Vec::new() }
    }

    /// Occupancy from voxel indices; duplicates are dropped
    pub fn from_voxels(mut voxels: Vec<Voxel>) -> Self {
        voxels.sort_unstable();
        voxels.dedup();
        OccupancyData { voxels }
    }

    /// Occupied voxels, sorted
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Number of occupied voxels
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    /// Whether there are no obstacles
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Whether the voxel is occupied
    pub fn contains(&self, voxel: &Voxel) -> bool {
        self.voxels.binary_search(voxel).is_ok()
    }

    /// Voxel set for repeated membership checks
    pub fn to_set(&self) -> HashSet<Voxel> {
        self.voxels.iter().copied().collect()
    }
}

/// Converts a 3D obstacle point set into device occupancy data
pub trait OccupancyEncoder {
    /// Encode `points` (roadmap frame, meters) against `volume`
    fn encode(&self, volume: &OccupancyVolume, points: &[Point3<f64>]) -> OccupancyData;
}

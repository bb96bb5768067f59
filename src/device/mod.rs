//! Planning device boundary
//!
//! The device is a single stateful accelerator that stores roadmaps and runs
//! collision-aware graph searches against occupancy data. The planner only
//! talks to it through [`RapidPlanDevice`]; every call is blocking and the
//! caller guarantees that no two calls overlap.

pub mod software;

use std::path::Path;
use std::time::Duration;

use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::occupancy::OccupancyData;
use crate::planner::PoseTarget;

/// Joint-space configuration of a roadmap state
pub type Config = Vec<f32>;

/// Roadmap edge between two state indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// First state index
    pub source: usize,
    /// Second state index
    pub target: usize,
}

impl Edge {
    /// Create an edge
    pub fn new(source: usize, target: usize) -> Self {
        Edge { source, target }
    }

    /// Whether the edge joins states `a` and `b` in either direction
    pub fn connects(&self, a: usize, b: usize) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

/// Tool (end-effector) transform as translation plus roll/pitch/yaw.
///
/// The same layout is used for a target pose, a per-axis tolerance and
/// per-axis ranking weights.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolPose {
    /// X translation (meters)
    pub x: f32,
    /// Y translation (meters)
    pub y: f32,
    /// Z translation (meters)
    pub z: f32,
    /// Rotation about X (radians)
    pub roll: f32,
    /// Rotation about Y (radians)
    pub pitch: f32,
    /// Rotation about Z (radians)
    pub yaw: f32,
}

impl ToolPose {
    /// Create a tool pose from its six components
    pub fn new(x: f32, y: f32, z: f32, roll: f32, pitch: f32, yaw: f32) -> Self {
        ToolPose { x, y, z, roll, pitch, yaw }
    }

    /// Same value on every axis, handy for tolerances and weights
    pub fn uniform(value: f32) -> Self {
        ToolPose::new(value, value, value, value, value, value)
    }

    /// Components in x, y, z, roll, pitch, yaw order
    pub fn components(&self) -> [f32; 6] {
        [self.x, self.y, self.z, self.roll, self.pitch, self.yaw]
    }

    /// Whether every component is finite
    pub fn is_finite(&self) -> bool {
        self.components().iter().all(|c| c.is_finite())
    }

    /// Convert to a rigid transform
    pub fn to_isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(
            Translation3::new(self.x, self.y, self.z),
            UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw),
        )
    }

    /// Build from a rigid transform
    pub fn from_isometry(iso: &Isometry3<f32>) -> Self {
        let (roll, pitch, yaw) = iso.rotation.euler_angles();
        let t = iso.translation.vector;
        ToolPose::new(t.x, t.y, t.z, roll, pitch, yaw)
    }

    /// Per-axis absolute difference to `other`, angles wrapped to [0, pi]
    pub fn abs_delta(&self, other: &ToolPose) -> [f32; 6] {
        let a = self.components();
        let b = other.components();
        let mut delta = [0.0f32; 6];
        for i in 0..6 {
            let d = a[i] - b[i];
            delta[i] = if i < 3 { d.abs() } else { wrap_angle(d).abs() };
        }
        delta
    }
}

fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::PI;
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// What the device reports after loading a roadmap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoadmapHandle {
    /// Device-assigned roadmap slot index
    pub index: u16,
    /// Number of states in the roadmap
    pub state_count: usize,
    /// Number of edges in the roadmap
    pub edge_count: usize,
}

/// Raw result of a device path search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A path was found
    Found {
        /// State indices from start to goal
        waypoints: Vec<usize>,
        /// Edge indices joining consecutive waypoints
        edges: Vec<usize>,
    },
    /// Search finished without reaching a goal
    Exhausted,
    /// Search hit its time budget
    TimedOut,
}

/// Device-level failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFault {
    /// The call failed but the device remains usable
    Transient(String),
    /// The device is in an unrecoverable state
    Fatal(String),
}

impl DeviceFault {
    /// Whether the device must be considered unusable after this fault
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeviceFault::Fatal(_))
    }
}

impl std::fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DeviceFault::Transient(msg) => write!(f, "{}", msg),
            DeviceFault::Fatal(msg) => write!(f, "fatal: {}", msg),
        }
    }
}

impl std::error::Error for DeviceFault {}

/// Blocking interface to a roadmap planning device
#[cfg_attr(test, mockall::automock)]
pub trait RapidPlanDevice {
    /// One-time device initialization
    fn initialize(&mut self) -> Result<(), DeviceFault>;

    /// Load a roadmap file and return its slot and size
    fn load_roadmap(&mut self, file: &Path) -> Result<RoadmapHandle, DeviceFault>;

    /// Search from `start` to any of the `goals` states
    fn find_path_to_states(
        &mut self,
        roadmap: u16,
        start: usize,
        goals: &[usize],
        occupancy: &OccupancyData,
        timeout: Duration,
    ) -> Result<SearchOutcome, DeviceFault>;

    /// Search from `start` to the best-ranked state whose tool pose matches `target`
    fn find_path_to_pose(
        &mut self,
        roadmap: u16,
        start: usize,
        target: &PoseTarget,
        occupancy: &OccupancyData,
        timeout: Duration,
    ) -> Result<SearchOutcome, DeviceFault>;

    /// Interpolated configurations along a found path, start to goal
    fn interpolate_path(
        &mut self,
        roadmap: u16,
        waypoints: &[usize],
        edges: &[usize],
    ) -> Result<Vec<Config>, DeviceFault>;

    /// All state configurations of a loaded roadmap
    fn read_configs(&mut self, roadmap: u16) -> Result<Vec<Config>, DeviceFault>;

    /// All edges of a loaded roadmap
    fn read_edges(&mut self, roadmap: u16) -> Result<Vec<Edge>, DeviceFault>;

    /// Tool transform of every state of a loaded roadmap
    fn read_transforms(&mut self, roadmap: u16) -> Result<Vec<ToolPose>, DeviceFault>;
}

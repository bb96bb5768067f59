//! RapidPlan core - roadmap motion planning on a shared accelerator
//!
//! This library plans collision-free paths over precomputed roadmaps. A roadmap
//! is loaded onto a single stateful planning device, searched against the
//! current occupancy, and the result is returned either as a dense joint-space
//! path or as sparse waypoint/edge indices.
//!
//! All device access goes through [`PlannerInterface`], which serializes every
//! load, search and read behind one lock.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod context;
pub mod device;
pub mod occupancy;
pub mod planner;
pub mod roadmap;

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

// Re-export commonly used items for easier access
pub use context::{GoalConstraint, MotionPlanErrorCode, MotionPlanRequest, PlanningContext};
pub use device::{
    Config, DeviceFault, Edge, RapidPlanDevice, RoadmapHandle, SearchOutcome, ToolPose,
};
pub use device::software::{SoftwareDevice, SoftwareRoadmap};
pub use occupancy::{OccupancyData, OccupancyEncoder, Voxel, VoxelGridEncoder};
pub use planner::{DensePath, PlannerInterface, PoseTarget, RapidPlanGoal, SparsePath};
pub use roadmap::{OccupancyVolume, RoadmapRegistry, RoadmapSpecification};

/// Planner configuration, usually read from a YAML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Roadmaps available to the planner
    pub roadmaps: Vec<RoadmapSpecification>,
    /// Search budget in seconds used when a caller does not provide one
    pub default_timeout: f64,
    /// Log per-solve diagnostics at info level
    pub debug: bool,
    /// Intermediate configurations per edge produced by the software device
    pub interpolation_steps: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            roadmaps: Vec::new(),
            default_timeout: 1.0,
            debug: false,
            interpolation_steps: 10,
        }
    }
}

impl PlannerConfig {
    /// Load a configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config: PlannerConfig = serde_yaml::from_reader(file)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        log::info!(
            "Loaded planner config from {} ({} roadmaps)",
            path.display(),
            config.roadmaps.len()
        );
        Ok(config)
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Configuration loading errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The file could not be opened or read
    Io(String),
    /// The file is not valid configuration YAML
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Planner error types
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerError {
    /// Device has not been initialized or hit an unrecoverable fault
    DeviceNotReady,
    /// No roadmap is registered under this name
    UnknownRoadmap(String),
    /// A different roadmap is already registered under this name
    DuplicateNameConflict(String),
    /// Start state index is outside the loaded roadmap
    InvalidStartState {
        /// Requested start index
        state: usize,
        /// Number of states in the loaded roadmap
        state_count: usize,
    },
    /// Goal is empty, malformed or references unknown states
    InvalidGoalSpecification(String),
    /// Timeout is not a positive, finite number of seconds
    InvalidTimeout(f64),
    /// Device refused to load the roadmap file
    DeviceLoadError {
        /// Roadmap name
        roadmap: String,
        /// Device reason
        reason: String,
    },
    /// Device failed during a search
    DeviceError(String),
    /// Device failed to return roadmap or path data
    DeviceReadError(String),
    /// Search finished without reaching any goal
    NoSolutionFound,
    /// Search exceeded its time budget
    PlanningTimeout,
}

impl PlannerError {
    /// Whether this is an ordinary negative planning result rather than a fault
    pub fn is_negative_result(&self) -> bool {
        matches!(self, PlannerError::NoSolutionFound | PlannerError::PlanningTimeout)
    }
}

impl std::fmt::Display for PlannerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PlannerError::DeviceNotReady => write!(f, "Planning device not ready"),
            PlannerError::UnknownRoadmap(name) => write!(f, "Unknown roadmap: {}", name),
            PlannerError::DuplicateNameConflict(name) => {
                write!(f, "Conflicting roadmap already registered as {}", name)
            }
            PlannerError::InvalidStartState { state, state_count } => write!(
                f,
                "Invalid start state {} (roadmap has {} states)",
                state, state_count
            ),
            PlannerError::InvalidGoalSpecification(msg) => write!(f, "Invalid goal: {}", msg),
            PlannerError::InvalidTimeout(timeout) => write!(f, "Invalid timeout: {}", timeout),
            PlannerError::DeviceLoadError { roadmap, reason } => {
                write!(f, "Failed to load roadmap {}: {}", roadmap, reason)
            }
            PlannerError::DeviceError(msg) => write!(f, "Device error: {}", msg),
            PlannerError::DeviceReadError(msg) => write!(f, "Device read error: {}", msg),
            PlannerError::NoSolutionFound => write!(f, "No solution found"),
            PlannerError::PlanningTimeout => write!(f, "Planning timeout"),
        }
    }
}

impl std::error::Error for PlannerError {}

// src/planner/goal.rs
// Goal and solution types for roadmap planning requests.

use crate::device::{Config, ToolPose};
use crate::PlannerError;

/// Tool-pose goal: target transform, per-axis tolerance and ranking weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseTarget {
    /// Desired end-effector transform
    pub pose: ToolPose,
    /// Largest accepted absolute deviation per axis
    pub tolerance: ToolPose,
    /// Per-axis weights used to rank states within tolerance
    pub weights: ToolPose,
}

impl PoseTarget {
    /// Create a pose target
    pub fn new(pose: ToolPose, tolerance: ToolPose, weights: ToolPose) -> Self {
        PoseTarget { pose, tolerance, weights }
    }
}

/// A RapidPlan goal: either roadmap state ids or a tool pose
#[derive(Debug, Clone, PartialEq)]
pub enum RapidPlanGoal {
    /// Any of these roadmap states
    StateIds(Vec<usize>),
    /// Best-ranked state whose tool pose is within tolerance
    ToolPose(PoseTarget),
}

impl RapidPlanGoal {
    /// Check the goal's shape; roadmap bounds are checked once the roadmap is loaded
    pub fn validate(&self) -> Result<(), PlannerError> {
        match self {
            RapidPlanGoal::StateIds(ids) if ids.is_empty() => Err(
                PlannerError::InvalidGoalSpecification("no goal state ids".to_string()),
            ),
            RapidPlanGoal::StateIds(_) => Ok(()),
            RapidPlanGoal::ToolPose(target) => {
                if !target.pose.is_finite() {
                    return Err(PlannerError::InvalidGoalSpecification(
                        "tool pose is not finite".to_string(),
                    ));
                }
                if !non_negative(&target.tolerance) {
                    return Err(PlannerError::InvalidGoalSpecification(
                        "tolerance must be finite and non-negative".to_string(),
                    ));
                }
                if !non_negative(&target.weights) {
                    return Err(PlannerError::InvalidGoalSpecification(
                        "weights must be finite and non-negative".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Check goal state ids against the number of roadmap states
    pub(crate) fn check_bounds(&self, state_count: usize) -> Result<(), PlannerError> {
        if let RapidPlanGoal::StateIds(ids) = self {
            if let Some(id) = ids.iter().find(|&&id| id >= state_count) {
                return Err(PlannerError::InvalidGoalSpecification(format!(
                    "goal state {} out of range (roadmap has {} states)",
                    id, state_count
                )));
            }
        }
        Ok(())
    }
}

fn non_negative(pose: &ToolPose) -> bool {
    pose.components().iter().all(|c| c.is_finite() && *c >= 0.0)
}

/// Dense joint-space path, start to goal
#[derive(Debug, Clone, PartialEq)]
pub struct DensePath {
    /// Interpolated configurations in path order
    pub configs: Vec<Config>,
}

/// Sparse solution: waypoint and edge indices plus every roadmap state
#[derive(Debug, Clone, PartialEq)]
pub struct SparsePath {
    /// All configurations of the roadmap, for resolving indices
    pub roadmap_states: Vec<Config>,
    /// State indices from start to goal
    pub waypoints: Vec<usize>,
    /// Edge indices joining consecutive waypoints
    pub edges: Vec<usize>,
}

impl SparsePath {
    /// Configurations of the waypoints in path order
    pub fn waypoint_configs(&self) -> Vec<&Config> {
        self.waypoints
            .iter()
            .filter_map(|&id| self.roadmap_states.get(id))
            .collect()
    }
}

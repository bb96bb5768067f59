//! Planning context for host motion-planning frameworks
//!
//! A [`PlanningContext`] binds one kinematic group to one roadmap and adapts
//! framework-style requests (start configuration, goal constraint, allowed
//! planning time) to the roadmap planner. Start and joint-space goal
//! configurations are snapped to the nearest roadmap state; results come
//! back as framework responses carrying an error code and the measured
//! planning time.

use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use nalgebra::DVector;

use crate::device::{Config, RapidPlanDevice};
use crate::occupancy::OccupancyData;
use crate::planner::{PlannerInterface, PoseTarget, RapidPlanGoal};
use crate::PlannerError;

/// Largest joint-space distance between a requested configuration and the
/// roadmap state it is snapped to
pub const DEFAULT_STATE_TOLERANCE: f64 = 0.05;

/// Framework result codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPlanErrorCode {
    /// A trajectory was produced
    Success,
    /// The search found no path
    PlanningFailed,
    /// The search ran out of time
    TimedOut,
    /// The request targets a different group
    InvalidGroupName,
    /// The goal cannot be expressed on the roadmap
    InvalidGoalConstraints,
    /// The start configuration is not on the roadmap
    StartStateInvalid,
    /// The request itself is malformed
    InvalidMotionPlan,
    /// The planner or device failed
    Failure,
    /// The planning device is not available
    Unavailable,
}

impl From<&PlannerError> for MotionPlanErrorCode {
    fn from(err: &PlannerError) -> Self {
        match err {
            PlannerError::DeviceNotReady => MotionPlanErrorCode::Unavailable,
            PlannerError::NoSolutionFound => MotionPlanErrorCode::PlanningFailed,
            PlannerError::PlanningTimeout => MotionPlanErrorCode::TimedOut,
            PlannerError::InvalidStartState { .. } => MotionPlanErrorCode::StartStateInvalid,
            PlannerError::InvalidGoalSpecification(_) => MotionPlanErrorCode::InvalidGoalConstraints,
            PlannerError::InvalidTimeout(_) => MotionPlanErrorCode::InvalidMotionPlan,
            PlannerError::UnknownRoadmap(_)
            | PlannerError::DuplicateNameConflict(_)
            | PlannerError::DeviceLoadError { .. }
            | PlannerError::DeviceError(_)
            | PlannerError::DeviceReadError(_) => MotionPlanErrorCode::Failure,
        }
    }
}

/// Goal constraint of a framework request
#[derive(Debug, Clone, PartialEq)]
pub enum GoalConstraint {
    /// Reach this joint configuration
    JointConfig(Config),
    /// Reach a state whose tool pose matches
    ToolPose(PoseTarget),
}

/// Framework motion plan request
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPlanRequest {
    /// Kinematic group to plan for
    pub group_name: String,
    /// Current joint configuration
    pub start_config: Config,
    /// Goal constraint
    pub goal: GoalConstraint,
    /// Search budget in seconds
    pub allowed_planning_time: f64,
    /// Obstacles for this request
    pub occupancy: OccupancyData,
}

/// Simple framework response
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPlanResponse {
    /// Result code
    pub error_code: MotionPlanErrorCode,
    /// Joint-space trajectory, empty on failure
    pub trajectory: Vec<Config>,
    /// Wall time spent planning (seconds)
    pub planning_time: f64,
}

/// Detailed framework response with per-stage results
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPlanDetailedResponse {
    /// Result code
    pub error_code: MotionPlanErrorCode,
    /// One trajectory per stage that produced one
    pub trajectories: Vec<Vec<Config>>,
    /// Stage names
    pub descriptions: Vec<String>,
    /// Stage durations (seconds)
    pub processing_times: Vec<f64>,
}

/// Planning context bound to one group and roadmap
pub struct PlanningContext<D> {
    name: String,
    group: String,
    roadmap: String,
    planner: Arc<PlannerInterface<D>>,
    state_tolerance: f64,
    request: Option<MotionPlanRequest>,
}

impl<D: RapidPlanDevice> PlanningContext<D> {
    /// Create a context for `group` planning on `roadmap`
    pub fn new(name: &str, group: &str, roadmap: &str, planner: Arc<PlannerInterface<D>>) -> Self {
        PlanningContext {
            name: name.to_string(),
            group: group.to_string(),
            roadmap: roadmap.to_string(),
            planner,
            state_tolerance: DEFAULT_STATE_TOLERANCE,
            request: None,
        }
    }

    /// Override the snapping tolerance for start and goal configurations
    pub fn with_state_tolerance(mut self, tolerance: f64) -> Self {
        self.state_tolerance = tolerance;
        self
    }

    /// Context name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group this context plans for
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Set the request the next solve works on
    pub fn set_request(&mut self, request: MotionPlanRequest) {
        self.request = Some(request);
    }

    /// Drop the pending request
    pub fn clear(&mut self) {
        self.request = None;
    }

    /// Device searches cannot be cancelled once submitted
    pub fn terminate(&self) -> bool {
        warn!("{}: planning cannot be terminated, waiting for the device", self.name);
        false
    }

    /// Plan and return a single trajectory
    pub fn solve(&self) -> MotionPlanResponse {
        let started = Instant::now();
        let result = self
            .check_available()
            .and_then(|request| self.plan(request, |_| ()));
        let planning_time = started.elapsed().as_secs_f64();

        match result {
            Ok(trajectory) => {
                info!(
                    "{}: planned {} points in {:.3}s",
                    self.name,
                    trajectory.len(),
                    planning_time
                );
                MotionPlanResponse {
                    error_code: MotionPlanErrorCode::Success,
                    trajectory,
                    planning_time,
                }
            }
            Err(code) => MotionPlanResponse {
                error_code: code,
                trajectory: Vec::new(),
                planning_time,
            },
        }
    }

    /// Plan and report the roadmap lookup and planning stages separately
    pub fn solve_detailed(&self) -> MotionPlanDetailedResponse {
        let mut response = MotionPlanDetailedResponse {
            error_code: MotionPlanErrorCode::Success,
            trajectories: Vec::new(),
            descriptions: Vec::new(),
            processing_times: Vec::new(),
        };

        let request = match self.check_available() {
            Ok(request) => request,
            Err(code) => {
                response.error_code = code;
                return response;
            }
        };

        let started = Instant::now();
        let mut lookup_done = None;
        let planned = self.plan(request, |at| lookup_done = Some(at));
        let finished = Instant::now();

        response.descriptions.push("roadmap lookup".to_string());
        match lookup_done {
            Some(at) => {
                response.processing_times.push((at - started).as_secs_f64());
                response.descriptions.push("plan".to_string());
                response.processing_times.push((finished - at).as_secs_f64());
            }
            None => response
                .processing_times
                .push((finished - started).as_secs_f64()),
        }
        match planned {
            Ok(trajectory) => response.trajectories.push(trajectory),
            Err(code) => response.error_code = code,
        }
        response
    }

    fn check_available(&self) -> Result<&MotionPlanRequest, MotionPlanErrorCode> {
        if !self.planner.is_ready() {
            warn!("{}: planning device unavailable", self.name);
            return Err(MotionPlanErrorCode::Unavailable);
        }
        let request = self.request.as_ref().ok_or_else(|| {
            warn!("{}: solve called without a request", self.name);
            MotionPlanErrorCode::InvalidMotionPlan
        })?;
        if request.group_name != self.group {
            warn!(
                "{}: request for group {} but context plans for {}",
                self.name, request.group_name, self.group
            );
            return Err(MotionPlanErrorCode::InvalidGroupName);
        }
        let spec = self
            .planner
            .lookup_roadmap(&self.roadmap)
            .map_err(|e| self.report(e))?;
        if spec.group != self.group {
            warn!(
                "{}: roadmap {} was built for group {}, not {}",
                self.name, spec.name, spec.group, self.group
            );
            return Err(MotionPlanErrorCode::InvalidGroupName);
        }
        Ok(request)
    }

    /// Snap the request onto the roadmap and plan, all under one planner lock hold.
    /// `resolved` is told when the request has been mapped to roadmap states.
    fn plan(
        &self,
        request: &MotionPlanRequest,
        resolved: impl FnOnce(Instant),
    ) -> Result<Vec<Config>, MotionPlanErrorCode> {
        self.planner
            .solve_dense_resolved::<ContextError, _>(
                &self.roadmap,
                &request.occupancy,
                request.allowed_planning_time,
                |configs| {
                    let goal = self.resolve(request, configs)?;
                    resolved(Instant::now());
                    Ok(goal)
                },
            )
            .map(|path| path.configs)
            .map_err(|e| match e {
                ContextError::Planner(err) => self.report(err),
                ContextError::Rejected(code) => code,
            })
    }

    fn resolve(
        &self,
        request: &MotionPlanRequest,
        configs: &[Config],
    ) -> Result<(usize, RapidPlanGoal), ContextError> {
        let start = nearest_state(configs, &request.start_config, self.state_tolerance)
            .ok_or_else(|| {
                warn!("{}: start configuration is not on roadmap {}", self.name, self.roadmap);
                ContextError::Rejected(MotionPlanErrorCode::StartStateInvalid)
            })?;
        let goal = match &request.goal {
            GoalConstraint::JointConfig(config) => {
                let state = nearest_state(configs, config, self.state_tolerance).ok_or_else(|| {
                    warn!("{}: goal configuration is not on roadmap {}", self.name, self.roadmap);
                    ContextError::Rejected(MotionPlanErrorCode::InvalidGoalConstraints)
                })?;
                RapidPlanGoal::StateIds(vec![state])
            }
            GoalConstraint::ToolPose(target) => RapidPlanGoal::ToolPose(*target),
        };
        Ok((start, goal))
    }

    fn report(&self, err: PlannerError) -> MotionPlanErrorCode {
        if err.is_negative_result() {
            info!("{}: {}", self.name, err);
        } else {
            warn!("{}: {}", self.name, err);
        }
        MotionPlanErrorCode::from(&err)
    }
}

/// Why a context solve stopped
enum ContextError {
    Planner(PlannerError),
    // request could not be expressed on the roadmap
    Rejected(MotionPlanErrorCode),
}

impl From<PlannerError> for ContextError {
    fn from(err: PlannerError) -> Self {
        ContextError::Planner(err)
    }
}

/// Index of the roadmap state closest to `config`, if within `tolerance`
pub fn nearest_state(configs: &[Config], config: &[f32], tolerance: f64) -> Option<usize> {
    let target = DVector::from_column_slice(config);
    configs
        .iter()
        .enumerate()
        .filter(|(_, state)| state.len() == config.len())
        .map(|(index, state)| {
            let distance = (DVector::from_column_slice(state) - &target).norm() as f64;
            (index, distance)
        })
        .filter(|(_, distance)| *distance <= tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

//! Thread-safe roadmap planner
//!
//! [`PlannerInterface`] owns the planning device and serializes every device
//! interaction (roadmap load, path search, roadmap reads) behind a single
//! lock. Before any device call the requested roadmap is made resident via a
//! single-slot cache: solving repeatedly on the same roadmap never reloads it,
//! switching roadmaps always does.
//!
//! Request validation happens before the device is touched wherever the
//! information is available up front; start and goal state indices can only
//! be checked once the roadmap is loaded and its size is known.

mod goal;
mod loader;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use log::{error, info, log, warn, Level};

use crate::device::{Config, DeviceFault, Edge, RapidPlanDevice, RoadmapHandle, SearchOutcome, ToolPose};
use crate::occupancy::OccupancyData;
use crate::roadmap::{RoadmapRegistry, RoadmapSpecification};
use crate::{PlannerConfig, PlannerError};

pub use goal::{DensePath, PoseTarget, RapidPlanGoal, SparsePath};
pub use loader::LoadedRoadmapState;

use loader::DeviceSlot;

/// Raw path found by a search, before it is shaped into a solution
struct FoundPath {
    waypoints: Vec<usize>,
    edges: Vec<usize>,
}

/// Thread-safe planning interface to a single device
pub struct PlannerInterface<D> {
    registry: RwLock<RoadmapRegistry>,
    slot: Mutex<DeviceSlot<D>>,
    ready: AtomicBool,
    debug: bool,
}

impl<D: RapidPlanDevice> PlannerInterface<D> {
    /// Create a planner around an uninitialized device
    pub fn new(device: D, registry: RoadmapRegistry) -> Self {
        PlannerInterface {
            registry: RwLock::new(registry),
            slot: Mutex::new(DeviceSlot::new(device)),
            ready: AtomicBool::new(false),
            debug: false,
        }
    }

    /// Create a planner with the roadmaps and flags of `config`
    pub fn from_config(device: D, config: &PlannerConfig) -> Result<Self, PlannerError> {
        let registry = RoadmapRegistry::from_specs(config.roadmaps.iter().cloned())?;
        let mut planner = PlannerInterface::new(device, registry);
        planner.debug = config.debug;
        Ok(planner)
    }

    /// Initialize the device. Calling again after success does nothing.
    pub fn initialize(&self) -> Result<(), PlannerError> {
        let mut slot = self.lock_slot();
        if self.is_ready() {
            return Ok(());
        }
        match slot.device.initialize() {
            Ok(()) => {
                self.ready.store(true, Ordering::SeqCst);
                info!("Planning device initialized");
                Ok(())
            }
            Err(fault) => {
                error!("Planning device initialization failed: {}", fault);
                Err(PlannerError::DeviceError(fault.to_string()))
            }
        }
    }

    /// Whether the device is initialized and has not failed unrecoverably
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Register an additional roadmap
    pub fn register_roadmap(&self, spec: RoadmapSpecification) -> Result<(), PlannerError> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(spec)
    }

    /// Look up a registered roadmap
    pub fn lookup_roadmap(&self, name: &str) -> Result<RoadmapSpecification, PlannerError> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(name)
            .cloned()
    }

    /// Names of all registered roadmaps
    pub fn roadmap_names(&self) -> Vec<String> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names()
    }

    /// Roadmap currently resident on the device
    pub fn loaded_roadmap(&self) -> Option<LoadedRoadmapState> {
        self.lock_slot().loaded().cloned()
    }

    /// Board index a roadmap was last written to, if it is still on the board
    pub fn board_index_of(&self, name: &str) -> Option<u16> {
        self.lock_slot().board_index_of(name)
    }

    /// Solve and return the interpolated joint-space path
    pub fn solve_dense(
        &self,
        roadmap: &str,
        start_state_id: usize,
        goal: &RapidPlanGoal,
        occupancy: &OccupancyData,
        timeout: f64,
    ) -> Result<DensePath, PlannerError> {
        let budget = self.admit(timeout)?;
        goal.validate()?;
        let spec = self.lookup_roadmap(roadmap)?;

        let mut slot = self.lock_slot();
        let handle = self.load(&mut slot, &spec)?;
        let found = self.run_search(&mut slot, &handle, roadmap, start_state_id, goal, occupancy, budget)?;
        self.interpolate(&mut slot, &handle, found)
    }

    /// Solve densely with start and goal picked from the roadmap's configurations.
    ///
    /// `resolve` sees every state of the loaded roadmap and returns the start state
    /// and goal; loading, resolving and searching happen under one lock hold, so no
    /// other caller can swap the roadmap in between.
    pub fn solve_dense_resolved<E, R>(
        &self,
        roadmap: &str,
        occupancy: &OccupancyData,
        timeout: f64,
        resolve: R,
    ) -> Result<DensePath, E>
    where
        E: From<PlannerError>,
        R: FnOnce(&[Config]) -> Result<(usize, RapidPlanGoal), E>,
    {
        let budget = self.admit(timeout)?;
        let spec = self.lookup_roadmap(roadmap)?;

        let mut slot = self.lock_slot();
        let handle = self.load(&mut slot, &spec)?;
        let configs = slot
            .device
            .read_configs(handle.index)
            .map_err(|fault| self.fault(fault, PlannerError::DeviceReadError))?;
        let (start_state_id, goal) = resolve(&configs)?;
        goal.validate()?;

        let found = self.run_search(&mut slot, &handle, roadmap, start_state_id, &goal, occupancy, budget)?;
        Ok(self.interpolate(&mut slot, &handle, found)?)
    }

    /// Solve and return waypoint and edge indices with all roadmap states
    pub fn solve_sparse(
        &self,
        roadmap: &str,
        start_state_id: usize,
        goal: &RapidPlanGoal,
        occupancy: &OccupancyData,
        timeout: f64,
    ) -> Result<SparsePath, PlannerError> {
        let budget = self.admit(timeout)?;
        goal.validate()?;
        let spec = self.lookup_roadmap(roadmap)?;

        let mut slot = self.lock_slot();
        let handle = self.load(&mut slot, &spec)?;
        let found = self.run_search(&mut slot, &handle, roadmap, start_state_id, goal, occupancy, budget)?;
        let roadmap_states = slot
            .device
            .read_configs(handle.index)
            .map_err(|fault| self.fault(fault, PlannerError::DeviceReadError))?;
        Ok(SparsePath {
            roadmap_states,
            waypoints: found.waypoints,
            edges: found.edges,
        })
    }

    /// Configurations of every state in the roadmap
    pub fn roadmap_configs(&self, roadmap: &str) -> Result<Vec<Config>, PlannerError> {
        self.read(roadmap, "configs", |device, index| device.read_configs(index))
    }

    /// Edges of the roadmap
    pub fn roadmap_edges(&self, roadmap: &str) -> Result<Vec<Edge>, PlannerError> {
        self.read(roadmap, "edges", |device, index| device.read_edges(index))
    }

    /// Tool transforms of every state in the roadmap
    pub fn roadmap_transforms(&self, roadmap: &str) -> Result<Vec<ToolPose>, PlannerError> {
        self.read(roadmap, "transforms", |device, index| device.read_transforms(index))
    }

    fn admit(&self, timeout: f64) -> Result<Duration, PlannerError> {
        self.check_ready()?;
        search_budget(timeout)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_search(
        &self,
        slot: &mut DeviceSlot<D>,
        handle: &RoadmapHandle,
        roadmap: &str,
        start_state_id: usize,
        goal: &RapidPlanGoal,
        occupancy: &OccupancyData,
        budget: Duration,
    ) -> Result<FoundPath, PlannerError> {
        if start_state_id >= handle.state_count {
            return Err(PlannerError::InvalidStartState {
                state: start_state_id,
                state_count: handle.state_count,
            });
        }
        goal.check_bounds(handle.state_count)?;

        log!(
            self.diagnostics_level(),
            "Solving on {} from state {} to {:?} ({} occupied voxels, {:?} budget)",
            roadmap,
            start_state_id,
            goal,
            occupancy.len(),
            budget
        );

        let started = Instant::now();
        let outcome = match goal {
            RapidPlanGoal::StateIds(ids) => slot.device.find_path_to_states(
                handle.index,
                start_state_id,
                ids,
                occupancy,
                budget,
            ),
            RapidPlanGoal::ToolPose(target) => slot.device.find_path_to_pose(
                handle.index,
                start_state_id,
                target,
                occupancy,
                budget,
            ),
        }
        .map_err(|fault| self.fault(fault, PlannerError::DeviceError))?;

        let found = match outcome {
            SearchOutcome::Found { waypoints, edges } => FoundPath { waypoints, edges },
            SearchOutcome::Exhausted => {
                info!("No path found on {} after {:?}", roadmap, started.elapsed());
                return Err(PlannerError::NoSolutionFound);
            }
            SearchOutcome::TimedOut => {
                warn!("Search on {} exceeded its {:?} budget", roadmap, budget);
                return Err(PlannerError::PlanningTimeout);
            }
        };

        log!(
            self.diagnostics_level(),
            "Found path on {} with {} waypoints in {:?}",
            roadmap,
            found.waypoints.len(),
            started.elapsed()
        );
        Ok(found)
    }

    fn interpolate(
        &self,
        slot: &mut DeviceSlot<D>,
        handle: &RoadmapHandle,
        found: FoundPath,
    ) -> Result<DensePath, PlannerError> {
        let configs = slot
            .device
            .interpolate_path(handle.index, &found.waypoints, &found.edges)
            .map_err(|fault| self.fault(fault, PlannerError::DeviceReadError))?;
        Ok(DensePath { configs })
    }

    fn read<T, F>(&self, roadmap: &str, what: &str, read: F) -> Result<T, PlannerError>
    where
        F: FnOnce(&mut D, u16) -> Result<T, DeviceFault>,
    {
        self.check_ready()?;
        let spec = self.lookup_roadmap(roadmap)?;

        let mut slot = self.lock_slot();
        let handle = self.load(&mut slot, &spec)?;
        read(&mut slot.device, handle.index).map_err(|fault| {
            warn!("Reading {} of roadmap {} failed", what, roadmap);
            self.fault(fault, PlannerError::DeviceReadError)
        })
    }

    fn load(
        &self,
        slot: &mut DeviceSlot<D>,
        spec: &RoadmapSpecification,
    ) -> Result<RoadmapHandle, PlannerError> {
        slot.ensure_loaded(spec).map_err(|fault| {
            let reason = fault.to_string();
            self.fault(fault, |_| PlannerError::DeviceLoadError {
                roadmap: spec.name.clone(),
                reason,
            })
        })
    }

    fn fault(&self, fault: DeviceFault, wrap: impl FnOnce(String) -> PlannerError) -> PlannerError {
        if fault.is_fatal() && self.ready.swap(false, Ordering::SeqCst) {
            error!("Planning device unusable, rejecting further requests: {}", fault);
        }
        wrap(fault.to_string())
    }

    fn check_ready(&self) -> Result<(), PlannerError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(PlannerError::DeviceNotReady)
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, DeviceSlot<D>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn diagnostics_level(&self) -> Level {
        if self.debug { Level::Info } else { Level::Debug }
    }
}

fn search_budget(timeout: f64) -> Result<Duration, PlannerError> {
    if !timeout.is_finite() || timeout <= 0.0 {
        return Err(PlannerError::InvalidTimeout(timeout));
    }
    Duration::try_from_secs_f64(timeout).map_err(|_| PlannerError::InvalidTimeout(timeout))
}

// Shared fixtures for integration tests: a scripted device that records every call
// and flags any two calls that overlap in time.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rapidplan_core::{
    Config, DeviceFault, Edge, OccupancyData, PoseTarget, RapidPlanDevice, RoadmapHandle,
    RoadmapSpecification, SearchOutcome, SoftwareRoadmap, ToolPose,
};

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Initialize,
    Load(PathBuf),
    SearchStates { roadmap: u16, start: usize, goals: Vec<usize> },
    SearchPose { roadmap: u16, start: usize },
    Interpolate { roadmap: u16 },
    ReadConfigs(u16),
    ReadEdges(u16),
    ReadTransforms(u16),
}

impl Call {
    pub fn is_load(&self) -> bool {
        matches!(self, Call::Load(_))
    }

    pub fn is_search(&self) -> bool {
        matches!(self, Call::SearchStates { .. } | Call::SearchPose { .. })
    }
}

/// Observation side of a [`RecordingDevice`], kept by the test after the
/// device moves into the planner
#[derive(Default)]
pub struct CallRecorder {
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    overlapped: AtomicBool,
}

impl CallRecorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn loads(&self) -> usize {
        self.calls().iter().filter(|c| c.is_load()).count()
    }

    pub fn searches(&self) -> usize {
        self.calls().iter().filter(|c| c.is_search()).count()
    }

    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    fn enter(&self, call: Call) -> InFlight<'_> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        self.calls.lock().unwrap().push(call);
        InFlight(self)
    }
}

struct InFlight<'a>(&'a CallRecorder);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted device backed by in-memory roadmaps
pub struct RecordingDevice {
    recorder: Arc<CallRecorder>,
    roadmaps: HashMap<PathBuf, SoftwareRoadmap>,
    failing_loads: HashSet<PathBuf>,
    board: HashMap<u16, PathBuf>,
    next_index: u16,
    search_outcome: Result<SearchOutcome, DeviceFault>,
    call_delay: Duration,
}

impl RecordingDevice {
    pub fn new() -> (Self, Arc<CallRecorder>) {
        let recorder = Arc::new(CallRecorder::default());
        let device = RecordingDevice {
            recorder: Arc::clone(&recorder),
            roadmaps: HashMap::new(),
            failing_loads: HashSet::new(),
            board: HashMap::new(),
            next_index: 0,
            search_outcome: Ok(SearchOutcome::Exhausted),
            call_delay: Duration::ZERO,
        };
        (device, recorder)
    }

    pub fn with_roadmap(mut self, file: &str, roadmap: SoftwareRoadmap) -> Self {
        self.roadmaps.insert(PathBuf::from(file), roadmap);
        self
    }

    pub fn failing_load(mut self, file: &str) -> Self {
        self.failing_loads.insert(PathBuf::from(file));
        self
    }

    pub fn search_outcome(mut self, outcome: Result<SearchOutcome, DeviceFault>) -> Self {
        self.search_outcome = outcome;
        self
    }

    pub fn call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    fn roadmap(&self, index: u16) -> Result<&SoftwareRoadmap, DeviceFault> {
        self.board
            .get(&index)
            .and_then(|file| self.roadmaps.get(file))
            .ok_or_else(|| DeviceFault::Transient(format!("nothing at index {}", index)))
    }

    fn pause(&self) {
        if !self.call_delay.is_zero() {
            thread::sleep(self.call_delay);
        }
    }
}

impl RapidPlanDevice for RecordingDevice {
    fn initialize(&mut self) -> Result<(), DeviceFault> {
        let _busy = self.recorder.enter(Call::Initialize);
        Ok(())
    }

    fn load_roadmap(&mut self, file: &Path) -> Result<RoadmapHandle, DeviceFault> {
        let recorder = Arc::clone(&self.recorder);
        let _busy = recorder.enter(Call::Load(file.to_path_buf()));
        self.pause();
        if self.failing_loads.contains(file) {
            return Err(DeviceFault::Transient("checksum mismatch".to_string()));
        }
        let roadmap = self
            .roadmaps
            .get(file)
            .ok_or_else(|| DeviceFault::Transient(format!("no roadmap file {}", file.display())))?;
        let handle = RoadmapHandle {
            index: self.next_index,
            state_count: roadmap.configs.len(),
            edge_count: roadmap.edges.len(),
        };
        self.board.insert(self.next_index, file.to_path_buf());
        self.next_index += 1;
        Ok(handle)
    }

    fn find_path_to_states(
        &mut self,
        roadmap: u16,
        start: usize,
        goals: &[usize],
        _occupancy: &OccupancyData,
        _timeout: Duration,
    ) -> Result<SearchOutcome, DeviceFault> {
        let _busy = self.recorder.enter(Call::SearchStates {
            roadmap,
            start,
            goals: goals.to_vec(),
        });
        self.pause();
        self.search_outcome.clone()
    }

    fn find_path_to_pose(
        &mut self,
        roadmap: u16,
        start: usize,
        _target: &PoseTarget,
        _occupancy: &OccupancyData,
        _timeout: Duration,
    ) -> Result<SearchOutcome, DeviceFault> {
        let _busy = self.recorder.enter(Call::SearchPose { roadmap, start });
        self.pause();
        self.search_outcome.clone()
    }

    fn interpolate_path(
        &mut self,
        roadmap: u16,
        waypoints: &[usize],
        _edges: &[usize],
    ) -> Result<Vec<Config>, DeviceFault> {
        let _busy = self.recorder.enter(Call::Interpolate { roadmap });
        let map = self.roadmap(roadmap)?;
        Ok(waypoints.iter().map(|&w| map.configs[w].clone()).collect())
    }

    fn read_configs(&mut self, roadmap: u16) -> Result<Vec<Config>, DeviceFault> {
        let _busy = self.recorder.enter(Call::ReadConfigs(roadmap));
        Ok(self.roadmap(roadmap)?.configs.clone())
    }

    fn read_edges(&mut self, roadmap: u16) -> Result<Vec<Edge>, DeviceFault> {
        let _busy = self.recorder.enter(Call::ReadEdges(roadmap));
        Ok(self.roadmap(roadmap)?.edges.clone())
    }

    fn read_transforms(&mut self, roadmap: u16) -> Result<Vec<ToolPose>, DeviceFault> {
        let _busy = self.recorder.enter(Call::ReadTransforms(roadmap));
        Ok(self.roadmap(roadmap)?.transforms.clone())
    }
}

/// The "shelf_pick" roadmap: 10 states and 12 edges, including 0-3 (edge 2)
/// and 3-9 (edge 5)
pub fn shelf_pick() -> SoftwareRoadmap {
    let configs: Vec<Config> = (0..10).map(|i| vec![i as f32 * 0.1, 0.0, 0.0]).collect();
    let edges = vec![
        Edge::new(0, 1),
        Edge::new(1, 2),
        Edge::new(0, 3),
        Edge::new(2, 3),
        Edge::new(3, 4),
        Edge::new(3, 9),
        Edge::new(4, 5),
        Edge::new(5, 6),
        Edge::new(6, 7),
        Edge::new(7, 8),
        Edge::new(8, 9),
        Edge::new(1, 5),
    ];
    let transforms = (0..10)
        .map(|i| ToolPose::new(0.3 + i as f32 * 0.05, 0.0, 0.5, 0.0, 0.0, 0.0))
        .collect();
    SoftwareRoadmap {
        configs,
        edges,
        transforms,
        edge_voxels: Vec::new(),
    }
}

/// A small three-state line roadmap
pub fn line() -> SoftwareRoadmap {
    SoftwareRoadmap {
        configs: vec![vec![0.0, 0.0], vec![0.5, 0.0], vec![1.0, 0.0]],
        edges: vec![Edge::new(0, 1), Edge::new(1, 2)],
        transforms: vec![
            ToolPose::new(0.3, 0.0, 0.5, 0.0, 0.0, 0.0),
            ToolPose::new(0.4, 0.0, 0.5, 0.0, 0.0, 0.0),
            ToolPose::new(0.5, 0.0, 0.5, 0.0, 0.0, 0.0),
        ],
        edge_voxels: Vec::new(),
    }
}

pub fn spec(name: &str, file: &str) -> RoadmapSpecification {
    RoadmapSpecification::new(name, "manipulator", file)
}

pub fn found(waypoints: Vec<usize>, edges: Vec<usize>) -> Result<SearchOutcome, DeviceFault> {
    Ok(SearchOutcome::Found { waypoints, edges })
}

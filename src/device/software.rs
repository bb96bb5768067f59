// src/device/software.rs
// In-process planning device. Runs the roadmap search on the CPU so the planner can be
// exercised without accelerator hardware.
//
// Search: Dijkstra over the undirected roadmap graph, edge cost is the joint-space
// distance between its endpoints, and an edge is blocked when any voxel it sweeps
// is occupied. Tool-pose goals rank in-tolerance states by weighted pose deviation.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::{Config, DeviceFault, Edge, RapidPlanDevice, RoadmapHandle, SearchOutcome, ToolPose};
use crate::occupancy::{OccupancyData, Voxel};
use crate::planner::PoseTarget;

/// Roadmap data understood by the software device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoftwareRoadmap {
    /// State configurations
    pub configs: Vec<Config>,
    /// Edges between states
    pub edges: Vec<Edge>,
    /// Tool transform of each state
    #[serde(default)]
    pub transforms: Vec<ToolPose>,
    /// Voxels swept by each edge; missing entries sweep nothing
    #[serde(default)]
    pub edge_voxels: Vec<Vec<Voxel>>,
}

impl SoftwareRoadmap {
    /// Read a roadmap from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self, DeviceFault> {
        let file = File::open(path)
            .map_err(|e| DeviceFault::Transient(format!("{}: {}", path.display(), e)))?;
        let roadmap: SoftwareRoadmap = serde_yaml::from_reader(file)
            .map_err(|e| DeviceFault::Transient(format!("{}: {}", path.display(), e)))?;
        roadmap.check()?;
        Ok(roadmap)
    }

    /// Check edge endpoints and per-state arrays against the state count
    pub fn check(&self) -> Result<(), DeviceFault> {
        let n = self.configs.len();
        if let Some((i, edge)) = self
            .edges
            .iter()
            .enumerate()
            .find(|(_, e)| e.source >= n || e.target >= n)
        {
            return Err(DeviceFault::Transient(format!(
                "edge {} ({} -> {}) references a missing state",
                i, edge.source, edge.target
            )));
        }
        if !self.transforms.is_empty() && self.transforms.len() != n {
            return Err(DeviceFault::Transient(format!(
                "{} transforms for {} states",
                self.transforms.len(),
                n
            )));
        }
        if self.edge_voxels.len() > self.edges.len() {
            return Err(DeviceFault::Transient(format!(
                "{} swept voxel sets for {} edges",
                self.edge_voxels.len(),
                self.edges.len()
            )));
        }
        Ok(())
    }

    fn edge_cost(&self, edge: &Edge) -> f32 {
        let a = DVector::from_column_slice(&self.configs[edge.source]);
        let b = DVector::from_column_slice(&self.configs[edge.target]);
        if a.len() != b.len() {
            return f32::INFINITY;
        }
        (a - b).norm()
    }

    fn edge_blocked(&self, edge_index: usize, occupied: &HashSet<Voxel>) -> bool {
        self.edge_voxels
            .get(edge_index)
            .is_some_and(|swept| swept.iter().any(|v| occupied.contains(v)))
    }

    fn adjacency(&self, occupancy: &OccupancyData) -> Vec<Vec<(usize, usize, f32)>> {
        let occupied = occupancy.to_set();
        let mut adjacency = vec![Vec::new(); self.configs.len()];
        for (index, edge) in self.edges.iter().enumerate() {
            if self.edge_blocked(index, &occupied) {
                continue;
            }
            let cost = self.edge_cost(edge);
            if !cost.is_finite() {
                continue;
            }
            adjacency[edge.source].push((edge.target, index, cost));
            adjacency[edge.target].push((edge.source, index, cost));
        }
        adjacency
    }

    /// States whose tool pose is within tolerance, best-ranked first
    fn ranked_candidates(&self, target: &PoseTarget) -> Vec<usize> {
        let tolerance = target.tolerance.components();
        let weights = target.weights.components();
        let mut candidates: Vec<(f32, usize)> = self
            .transforms
            .iter()
            .enumerate()
            .filter_map(|(state, pose)| {
                let delta = pose.abs_delta(&target.pose);
                if delta.iter().zip(tolerance).any(|(d, t)| *d > t) {
                    return None;
                }
                let score: f32 = delta.iter().zip(weights).map(|(d, w)| d * w).sum();
                Some((score, state))
            })
            .collect();
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
        candidates.into_iter().map(|(_, state)| state).collect()
    }
}

#[derive(Clone, Copy, Debug)]
struct QueueEntry {
    cost: f32,
    node: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on cost, lower node index first on ties
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest-path tree grown from the start state
struct SearchTree {
    settled: Vec<bool>,
    // (previous node, edge index) for every reached node
    parent: Vec<Option<(usize, usize)>>,
}

impl SearchTree {
    fn path_to(&self, start: usize, goal: usize) -> (Vec<usize>, Vec<usize>) {
        let mut waypoints = vec![goal];
        let mut edges = Vec::new();
        let mut node = goal;
        while node != start {
            match self.parent[node] {
                Some((previous, edge)) => {
                    edges.push(edge);
                    waypoints.push(previous);
                    node = previous;
                }
                None => break,
            }
        }
        waypoints.reverse();
        edges.reverse();
        (waypoints, edges)
    }
}

enum GoalSet<'a> {
    // stop at the first goal settled
    Any(&'a HashSet<usize>),
    // settle every candidate, or as many as are reachable
    All(&'a HashSet<usize>),
}

fn dijkstra(
    adjacency: &[Vec<(usize, usize, f32)>],
    start: usize,
    goals: GoalSet<'_>,
    deadline: Option<Instant>,
) -> Option<SearchTree> {
    let n = adjacency.len();
    let mut dist = vec![f32::INFINITY; n];
    let mut tree = SearchTree {
        settled: vec![false; n],
        parent: vec![None; n],
    };
    let mut remaining = match goals {
        GoalSet::Any(_) => 1,
        GoalSet::All(set) => set.len(),
    };

    dist[start] = 0.0;
    let mut heap = BinaryHeap::new();
    heap.push(QueueEntry { cost: 0.0, node: start });

    while let Some(QueueEntry { cost, node }) = heap.pop() {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return None;
        }
        if tree.settled[node] || cost > dist[node] {
            continue;
        }
        tree.settled[node] = true;

        let is_goal = match goals {
            GoalSet::Any(set) | GoalSet::All(set) => set.contains(&node),
        };
        if is_goal {
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }

        for &(next, edge, step) in &adjacency[node] {
            let candidate = cost + step;
            if candidate < dist[next] {
                dist[next] = candidate;
                tree.parent[next] = Some((node, edge));
                heap.push(QueueEntry { cost: candidate, node: next });
            }
        }
    }
    Some(tree)
}

/// CPU implementation of [`RapidPlanDevice`]
pub struct SoftwareDevice {
    initialized: bool,
    interpolation_steps: usize,
    installed: HashMap<PathBuf, SoftwareRoadmap>,
    // roadmaps written to the board, by index
    board: HashMap<u16, SoftwareRoadmap>,
    // one board index per distinct file, handed out in load order
    indices: HashMap<PathBuf, u16>,
}

impl SoftwareDevice {
    /// Create a device that inserts `interpolation_steps` configurations inside each edge
    pub fn new(interpolation_steps: usize) -> Self {
        SoftwareDevice {
            initialized: false,
            interpolation_steps,
            installed: HashMap::new(),
            board: HashMap::new(),
            indices: HashMap::new(),
        }
    }

    /// Make `roadmap` loadable under `file` without touching the filesystem
    pub fn install(&mut self, file: impl Into<PathBuf>, roadmap: SoftwareRoadmap) {
        self.installed.insert(file.into(), roadmap);
    }

    fn check_initialized(&self) -> Result<(), DeviceFault> {
        if self.initialized {
            Ok(())
        } else {
            Err(DeviceFault::Fatal("device used before initialization".to_string()))
        }
    }

    fn roadmap(&self, index: u16) -> Result<&SoftwareRoadmap, DeviceFault> {
        self.check_initialized()?;
        self.board
            .get(&index)
            .ok_or_else(|| DeviceFault::Transient(format!("no roadmap at board index {}", index)))
    }

    fn path_search(
        &self,
        roadmap: u16,
        start: usize,
        goals: &[usize],
        rank: bool,
        occupancy: &OccupancyData,
        timeout: Duration,
    ) -> Result<SearchOutcome, DeviceFault> {
        // budgets past the clock's range never expire
        let deadline = Instant::now().checked_add(timeout);
        let map = self.roadmap(roadmap)?;
        if start >= map.configs.len() {
            return Err(DeviceFault::Transient(format!("start state {} out of range", start)));
        }
        if goals.is_empty() {
            return Ok(SearchOutcome::Exhausted);
        }

        let adjacency = map.adjacency(occupancy);
        let goal_set: HashSet<usize> = goals.iter().copied().collect();
        let set = if rank { GoalSet::All(&goal_set) } else { GoalSet::Any(&goal_set) };
        let Some(tree) = dijkstra(&adjacency, start, set, deadline) else {
            return Ok(SearchOutcome::TimedOut);
        };

        // ranked goals settle all reachable candidates, so the first settled one in
        // rank order wins; unranked search stops at the nearest goal
        let reached = goals.iter().copied().find(|&g| g < tree.settled.len() && tree.settled[g]);
        match reached {
            Some(goal) => {
                let (waypoints, edges) = tree.path_to(start, goal);
                debug!("Software search reached state {} via {} edges", goal, edges.len());
                Ok(SearchOutcome::Found { waypoints, edges })
            }
            None => Ok(SearchOutcome::Exhausted),
        }
    }
}

impl RapidPlanDevice for SoftwareDevice {
    fn initialize(&mut self) -> Result<(), DeviceFault> {
        self.initialized = true;
        info!("Software planning device ready");
        Ok(())
    }

    fn load_roadmap(&mut self, file: &Path) -> Result<RoadmapHandle, DeviceFault> {
        self.check_initialized()?;
        let roadmap = match self.installed.get(file) {
            Some(roadmap) => {
                roadmap.check()?;
                roadmap.clone()
            }
            None => SoftwareRoadmap::from_yaml_file(file)?,
        };

        let index = match self.indices.get(file) {
            Some(index) => *index,
            None => {
                let index = u16::try_from(self.indices.len()).map_err(|_| {
                    DeviceFault::Transient(format!(
                        "no free board index for {}",
                        file.display()
                    ))
                })?;
                self.indices.insert(file.to_path_buf(), index);
                index
            }
        };
        let handle = RoadmapHandle {
            index,
            state_count: roadmap.configs.len(),
            edge_count: roadmap.edges.len(),
        };
        self.board.insert(index, roadmap);
        Ok(handle)
    }

    fn find_path_to_states(
        &mut self,
        roadmap: u16,
        start: usize,
        goals: &[usize],
        occupancy: &OccupancyData,
        timeout: Duration,
    ) -> Result<SearchOutcome, DeviceFault> {
        self.path_search(roadmap, start, goals, false, occupancy, timeout)
    }

    fn find_path_to_pose(
        &mut self,
        roadmap: u16,
        start: usize,
        target: &PoseTarget,
        occupancy: &OccupancyData,
        timeout: Duration,
    ) -> Result<SearchOutcome, DeviceFault> {
        let candidates = self.roadmap(roadmap)?.ranked_candidates(target);
        debug!("{} states within tool pose tolerance", candidates.len());
        self.path_search(roadmap, start, &candidates, true, occupancy, timeout)
    }

    fn interpolate_path(
        &mut self,
        roadmap: u16,
        waypoints: &[usize],
        edges: &[usize],
    ) -> Result<Vec<Config>, DeviceFault> {
        let map = self.roadmap(roadmap)?;
        if waypoints.is_empty() || edges.len() + 1 != waypoints.len() {
            return Err(DeviceFault::Transient(format!(
                "{} waypoints do not match {} edges",
                waypoints.len(),
                edges.len()
            )));
        }
        let config = |state: usize| {
            map.configs
                .get(state)
                .ok_or_else(|| DeviceFault::Transient(format!("state {} out of range", state)))
        };

        let mut path = vec![config(waypoints[0])?.clone()];
        for (pair, &edge) in waypoints.windows(2).zip(edges) {
            let connects = map.edges.get(edge).is_some_and(|e| e.connects(pair[0], pair[1]));
            if !connects {
                return Err(DeviceFault::Transient(format!(
                    "edge {} does not join states {} and {}",
                    edge, pair[0], pair[1]
                )));
            }
            let from = DVector::from_column_slice(config(pair[0])?);
            let to = DVector::from_column_slice(config(pair[1])?);
            let segments = self.interpolation_steps + 1;
            for step in 1..=segments {
                let t = step as f32 / segments as f32;
                let point = from.lerp(&to, t);
                path.push(point.iter().copied().collect());
            }
        }
        Ok(path)
    }

    fn read_configs(&mut self, roadmap: u16) -> Result<Vec<Config>, DeviceFault> {
        Ok(self.roadmap(roadmap)?.configs.clone())
    }

    fn read_edges(&mut self, roadmap: u16) -> Result<Vec<Edge>, DeviceFault> {
        Ok(self.roadmap(roadmap)?.edges.clone())
    }

    fn read_transforms(&mut self, roadmap: u16) -> Result<Vec<ToolPose>, DeviceFault> {
        Ok(self.roadmap(roadmap)?.transforms.clone())
    }
}

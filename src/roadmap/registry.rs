// src/roadmap/registry.rs
// Maps roadmap names to their specifications. Pure bookkeeping, never touches the device.

use std::collections::HashMap;

use log::{debug, info};

use super::RoadmapSpecification;
use crate::PlannerError;

/// Registry of named roadmap specifications
#[derive(Debug, Clone, Default)]
pub struct RoadmapRegistry {
    roadmaps: HashMap<String, RoadmapSpecification>,
}

impl RoadmapRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        RoadmapRegistry {
            roadmaps: HashMap::new(),
        }
    }

    /// Build a registry from a list of specifications, rejecting conflicting names
    pub fn from_specs<I>(specs: I) -> Result<Self, PlannerError>
    where
        I: IntoIterator<Item = RoadmapSpecification>,
    {
        let mut registry = RoadmapRegistry::new();
        for spec in specs {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    /// Register a specification.
    /// Re-registering an identical specification is a no-op; a different one
    /// under a taken name fails with `DuplicateNameConflict`.
    pub fn register(&mut self, spec: RoadmapSpecification) -> Result<(), PlannerError> {
        match self.roadmaps.get(&spec.name) {
            Some(existing) if *existing == spec => {
                debug!("Roadmap {} already registered", spec.name);
                Ok(())
            }
            Some(_) => Err(PlannerError::DuplicateNameConflict(spec.name)),
            None => {
                info!(
                    "Registered roadmap {} (group {}, file {})",
                    spec.name,
                    spec.group,
                    spec.file.display()
                );
                self.roadmaps.insert(spec.name.clone(), spec);
                Ok(())
            }
        }
    }

    /// Look up a specification by name
    pub fn lookup(&self, name: &str) -> Result<&RoadmapSpecification, PlannerError> {
        self.roadmaps
            .get(name)
            .ok_or_else(|| PlannerError::UnknownRoadmap(name.to_string()))
    }

    /// Whether a roadmap with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.roadmaps.contains_key(name)
    }

    /// Registered roadmap names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roadmaps.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered roadmaps
    pub fn len(&self) -> usize {
        self.roadmaps.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.roadmaps.is_empty()
    }
}

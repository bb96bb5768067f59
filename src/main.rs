// src/main.rs
// Demo entry point: loads a planner config, runs the software device, and plans on each roadmap.

use std::error::Error;

use log::{error, info};
use rapidplan_core::{
    OccupancyData, PlannerConfig, PlannerInterface, RapidPlanGoal, SoftwareDevice,
};

const DEFAULT_CONFIG: &str = "config/planner.yaml";

/// Plans from the first to the last state of every configured roadmap.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    info!("Starting RapidPlan demo with {}", config_path);
    let config = PlannerConfig::from_yaml_file(&config_path)?;

    let device = SoftwareDevice::new(config.interpolation_steps);
    let planner = PlannerInterface::from_config(device, &config)?;
    planner.initialize()?;

    for name in planner.roadmap_names() {
        let configs = match planner.roadmap_configs(&name) {
            Ok(configs) => configs,
            Err(e) => {
                error!("Skipping roadmap {}: {}", name, e);
                continue;
            }
        };
        let edges = planner.roadmap_edges(&name)?;
        info!("Roadmap {}: {} states, {} edges", name, configs.len(), edges.len());

        let Some(goal) = configs.len().checked_sub(1) else {
            continue;
        };
        let goal = RapidPlanGoal::StateIds(vec![goal]);
        let empty = OccupancyData::empty();

        match planner.solve_sparse(&name, 0, &goal, &empty, config.default_timeout) {
            Ok(path) => info!("Waypoints {:?} via edges {:?}", path.waypoints, path.edges),
            Err(e) if e.is_negative_result() => info!("No plan on {}: {}", name, e),
            Err(e) => error!("Planning on {} failed: {}", name, e),
        }
        match planner.solve_dense(&name, 0, &goal, &empty, config.default_timeout) {
            Ok(path) => info!("Dense path with {} configurations", path.configs.len()),
            Err(e) => error!("Dense planning on {} failed: {}", name, e),
        }
    }

    info!("RapidPlan demo completed");
    Ok(())
}

//! Park Sim headless runner
//!
//! Usage: `park-sim [SCENARIO.json] [SECONDS]`
//!
//! Runs the scenario (the demo lot when omitted) for the given number of
//! simulated seconds, logs a summary and prints the final snapshot as JSON.
//! Log level comes from `RUST_LOG`.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Park Sim (native) starting...");

    if let Err(err) = run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the host page on wasm
}

/// Simulated seconds when no duration is given
#[cfg(not(target_arch = "wasm32"))]
const DEFAULT_SECONDS: f32 = 60.0;

/// Seed for the built-in demo lot
#[cfg(not(target_arch = "wasm32"))]
const DEMO_SEED: u64 = 42;

#[cfg(not(target_arch = "wasm32"))]
fn run() -> park_sim::SimResult<()> {
    use park_sim::consts::SIM_DT;
    use park_sim::sim::{ControlInput, SimEvent, advance};
    use park_sim::{Scenario, SimError};

    let mut args = std::env::args().skip(1);
    let scenario = match args.next() {
        Some(path) => Scenario::load(path)?,
        None => {
            log::info!("No scenario given, using demo lot (seed {DEMO_SEED})");
            Scenario::demo(DEMO_SEED)
        }
    };
    let seconds = match args.next() {
        Some(arg) => arg
            .parse::<f32>()
            .ok()
            .filter(|s| s.is_finite() && *s >= 0.0)
            .ok_or_else(|| SimError::Config(format!("invalid duration: {arg}")))?,
        None => DEFAULT_SECONDS,
    };

    let mut state = scenario.build()?;
    let input = ControlInput::default();
    let frames = (seconds / SIM_DT).round() as u64;

    let mut parked = 0;
    let mut failed = 0;
    let mut collisions = 0;
    let mut bounces = 0;
    for _ in 0..frames {
        advance(&mut state, &input, SIM_DT);
        for event in state.drain_events() {
            match event {
                SimEvent::Parked { .. } => parked += 1,
                SimEvent::ManeuverFailed { .. } => failed += 1,
                SimEvent::VehicleCollision { .. } | SimEvent::ObstacleCollision { .. } => {
                    collisions += 1
                }
                SimEvent::BoundaryBounce { .. } => bounces += 1,
            }
        }
    }

    log::info!(
        "Simulated {:.1}s in {} ticks: {} parked, {} failed maneuvers, {} collisions, {} boundary bounces",
        state.elapsed,
        state.time_ticks,
        parked,
        failed,
        collisions,
        bounces
    );
    log::info!(
        "Spaces: {} free, {} occupied",
        state.catalog.free_count(),
        state.catalog.occupied_count()
    );

    println!("{}", serde_json::to_string_pretty(&state.snapshot())?);
    Ok(())
}

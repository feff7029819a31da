mod app;
mod behavior;
mod config;

use std::process;

use pet_ui::{run_with_app, PetWindow, SheetData};

use crate::app::Pet;
use crate::behavior::{FixedPolicy, RandomPolicy, StateMachine, TransitionPolicy, Walker};
use crate::config::{Config, PolicyKind};

fn main() {
    // Initialize logging
    env_logger::init();

    // --- 1. LOAD CONFIGURATION ---
    let config = Config::load_default().unwrap_or_else(|e| fail("Failed to load configuration", e));

    // --- 2. LOAD SPRITE SHEET ---
    let sheet = SheetData::from_path(&config.sprite.path).unwrap_or_else(|e| {
        fail(
            &format!("Failed to load sprite sheet {}", config.sprite.path.display()),
            e,
        )
    });

    // --- 3. CREATE PET WINDOW ---
    let mut window =
        PetWindow::new(config.window.clone()).unwrap_or_else(|e| fail("Failed to create window", e));

    // --- 4. PLACE THE PET AT THE BOTTOM OF THE SCREEN ---
    let display = window.display();
    let behavior = &config.behavior;
    let (start_x, start_y) = behavior.start_position(display);
    let walker = Walker::new(
        start_x,
        start_y,
        behavior.facing,
        display.width,
        config.window.width,
    )
    .with_step(behavior.walk_step);
    let (x, y) = walker.position();
    log::debug!(
        "Moving window from creation position ({}, {}) to ({}, {})",
        config.window.x,
        config.window.y,
        x,
        y
    );
    if let Err(e) = window.move_to(x, y) {
        log::warn!("Failed to place window at ({}, {}): {}", x, y, e);
    }

    // --- 5. BUILD THE STATE MACHINE ---
    let policy: Box<dyn TransitionPolicy> = match behavior.policy {
        PolicyKind::Fixed => Box::new(FixedPolicy),
        PolicyKind::Random => {
            let dwell = behavior.dwell_times();
            match behavior.seed {
                Some(seed) => Box::new(RandomPolicy::seeded(dwell, behavior.weights, seed)),
                None => Box::new(RandomPolicy::new(dwell, behavior.weights)),
            }
        }
    };
    let layout = config.sprite.layout();
    let machine = StateMachine::new(behavior.initial_state, policy, walker, layout)
        .with_alert_state(behavior.alert_state);

    log::info!(
        "Starting as {:?} facing {:?} with {:?} policy at {:?}",
        machine.state(),
        machine.facing(),
        behavior.policy,
        machine.position()
    );

    // Run the frame loop
    run_with_app(window, Pet::new(machine, sheet, layout));
}

/// Start-up failures are fatal: log and exit with status 1.
fn fail(context: &str, error: impl std::fmt::Display) -> ! {
    log::error!("{}: {}", context, error);
    process::exit(1);
}

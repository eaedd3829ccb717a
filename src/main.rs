use std::{env, error::Error, time::Instant};

use tracing::info;
use tracing_subscriber::EnvFilter;
use vaccan_dqn::{QNetwork, Trainer, TrainingConfig, TrainingOutcome, VacuumCan};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match env::args().nth(1) {
        Some(path) => TrainingConfig::from_file(path)?,
        None => TrainingConfig::default(),
    };

    let vac_can = VacuumCan::new(config.chamber.clone())?;
    let network = QNetwork::from_config(&config.agent, config.chamber.n_actions)?;
    let mut trainer = Trainer::new(vac_can, network, config.clone())?;

    let start = Instant::now();
    let report = trainer.run()?;
    match report.outcome {
        TrainingOutcome::Solved { episode, trials } => {
            info!("ran {episode} episodes, solved after {trials} trials")
        }
        TrainingOutcome::Exhausted { last_episode } => {
            info!("did not solve after {last_episode} episodes")
        }
    }
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        checkpoint_failures = report.checkpoint_failures.len(),
        "training finished"
    );

    report.history.write_csv(&config.history_path)?;
    info!(path = %config.history_path.display(), "wrote training history");
    Ok(())
}

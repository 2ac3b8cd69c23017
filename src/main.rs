use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tunebreeder::{
    AdvanceOutcome, AppConfig, EvolutionService, InMemoryStore, Scheduler,
};

/// Demo run: an in-memory experiment scored by simulated listeners until it
/// completes, with the periodic scheduler running alongside.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut config = AppConfig::default();
    config.scheduler.tick_secs = 1;

    let store = Arc::new(InMemoryStore::new());
    let service = Arc::new(EvolutionService::new(store, config.clone())?);
    let scheduler = Scheduler::start(Arc::clone(&service), &config.scheduler);

    let experiment = service.create_experiment("Demo melody", None, 6)?;
    println!(
        "experiment {} created, population {}",
        experiment.id, config.evolution.population_size
    );

    let mut rng = StdRng::seed_from_u64(1);
    loop {
        let experiment = service.experiment(experiment.id)?;
        if experiment.completed {
            println!(
                "completed: {} (best score {:.1}, final genome {:?})",
                experiment.final_piece_name.as_deref().unwrap_or("untitled"),
                experiment.best_score,
                experiment.final_genome
            );
            break;
        }
        // Simulated listeners rate the whole current generation; the last
        // submission triggers the advance.
        let cohort = service.get_population(experiment.id, experiment.current_generation)?;
        for (user, genome) in cohort.iter().enumerate() {
            if genome.user_scored {
                continue;
            }
            let score = rng.gen_range(10.0..95.0);
            let receipt = service.submit_score(genome.id, user as u64 + 1, score)?;
            if let Some(AdvanceOutcome::Advanced { generation, offspring }) = receipt.advance {
                println!("advanced to generation {} ({} offspring)", generation, offspring);
            }
        }
    }

    println!("next scheduled tick: {}", scheduler.state().next_run());
    scheduler.stop();
    Ok(())
}

use std::sync::Arc;
use tunebreeder::store::DataStore;
use tunebreeder::types::{GenomeId, NewGenome};
use tunebreeder::{
    AdvanceOutcome, AppConfig, EvolutionService, InMemoryStore, Note, NoteDuration,
    TunebreederError,
};

/// Small, reproducible configuration. Cleanup is pushed far out so sweeps
/// never interfere with the assertions here.
fn test_config(population: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.evolution.population_size = population;
    config.evolution.genome_length = 16;
    config.evolution.genes_to_mutate = 2;
    config.evolution.seed = Some(42);
    config.scheduler.cleanup_min_generation = 100;
    config
}

fn service_with(population: usize) -> (Arc<InMemoryStore>, EvolutionService<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let service = EvolutionService::new(Arc::clone(&store), test_config(population)).unwrap();
    (store, service)
}

/// Human-score every genome of the current generation through the store,
/// without touching the submission trigger.
fn score_all(store: &InMemoryStore, experiment_id: u64, generation: u32) {
    for (i, genome) in store.population(experiment_id, generation).unwrap().iter().enumerate() {
        store
            .record_score(genome.id, i as u64 + 1, 50.0 + i as f64)
            .unwrap();
    }
}

#[test]
fn advance_is_pending_without_any_human_score() {
    let (_, service) = service_with(10);
    let experiment = service.create_experiment("pending", None, 5).unwrap();

    let outcome = service.force_advance(experiment.id).unwrap();

    assert_eq!(outcome, AdvanceOutcome::Pending { unscored: 10 });
    assert_eq!(service.experiment(experiment.id).unwrap().current_generation, 0);
}

#[test]
fn scoring_the_whole_generation_triggers_the_advance() {
    let (_, service) = service_with(10);
    let experiment = service.create_experiment("auto", None, 5).unwrap();
    let cohort = service.get_population(experiment.id, 0).unwrap();

    let mut last = None;
    for (i, genome) in cohort.iter().enumerate() {
        last = Some(service.submit_score(genome.id, i as u64 + 1, 60.0).unwrap());
    }

    let receipt = last.unwrap();
    assert_eq!(
        receipt.advance,
        Some(AdvanceOutcome::Advanced {
            generation: 1,
            offspring: 10
        })
    );
    assert_eq!(service.experiment(experiment.id).unwrap().current_generation, 1);
}

#[test]
fn partially_scored_generation_advances_on_the_timer_path() {
    // Generation 3 of max 5: ten genomes, six human-scored, the timer fires.
    let (store, service) = service_with(10);
    let experiment = service.create_experiment("partial", None, 5).unwrap();

    for generation in 0..3 {
        score_all(&store, experiment.id, generation);
        assert!(matches!(
            service.force_advance(experiment.id).unwrap(),
            AdvanceOutcome::Advanced { .. }
        ));
    }

    let cohort = service.get_population(experiment.id, 3).unwrap();
    for (i, genome) in cohort.iter().take(6).enumerate() {
        service.submit_score(genome.id, i as u64 + 1, 70.0 + i as f64).unwrap();
    }

    let outcome = service.force_advance(experiment.id).unwrap();

    assert_eq!(
        outcome,
        AdvanceOutcome::Advanced {
            generation: 4,
            offspring: 10
        }
    );
    let experiment = service.experiment(experiment.id).unwrap();
    assert_eq!(experiment.current_generation, 4);
    assert!(!experiment.completed);
    assert_eq!(store.population(experiment.id, 4).unwrap().len(), 10);
}

#[test]
fn reaching_the_ceiling_completes_with_no_children() {
    let (store, service) = service_with(5);
    let experiment = service.create_experiment("ceiling", None, 1).unwrap();
    score_all(&store, experiment.id, 0);
    let top = store
        .population(experiment.id, 0)
        .unwrap()
        .into_iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap())
        .unwrap();

    let outcome = service.force_advance(experiment.id).unwrap();

    assert_eq!(
        outcome,
        AdvanceOutcome::Completed {
            final_genome: top.id,
            final_score: top.score
        }
    );
    let experiment = service.experiment(experiment.id).unwrap();
    assert!(experiment.completed);
    assert_eq!(experiment.final_genome, Some(top.id));
    assert_eq!(
        experiment.final_piece_name,
        Some(format!("Evolved Melody #{}", experiment.id))
    );
    assert_eq!(experiment.current_generation, 0);
    assert!(store.population(experiment.id, 1).unwrap().is_empty());

    assert_eq!(
        service.force_advance(experiment.id).unwrap(),
        AdvanceOutcome::AlreadyCompleted
    );
}

fn seed_genome(generation: u32, parent1: Option<GenomeId>, parent2: Option<GenomeId>) -> NewGenome {
    NewGenome {
        generation,
        notes: (0..8)
            .map(|i| Note::new(60 + i, NoteDuration::Half, 80).unwrap())
            .collect(),
        score: 0.0,
        user_scored: false,
        parent1,
        parent2,
    }
}

#[test]
fn completion_sweeps_lineage_unreachable_from_the_final_generation() {
    let mut config = test_config(4);
    config.scheduler.cleanup_min_generation = 1;
    let store = Arc::new(InMemoryStore::new());
    let service = EvolutionService::new(Arc::clone(&store), config).unwrap();

    // Two founders breed, the third leaves no descendants.
    let experiment = store
        .create_experiment(
            "finale",
            None,
            2,
            vec![
                seed_genome(0, None, None),
                seed_genome(0, None, None),
                seed_genome(0, None, None),
            ],
        )
        .unwrap();
    let founders = store.population(experiment.id, 0).unwrap();
    let (kept_a, kept_b, orphan) = (founders[0].id, founders[1].id, founders[2].id);
    let children = store
        .commit_generation(
            experiment.id,
            0,
            vec![
                seed_genome(1, Some(kept_a), Some(kept_b)),
                seed_genome(1, Some(kept_a), Some(kept_b)),
            ],
            0.0,
        )
        .unwrap();
    store.record_score(children[0].id, 1, 80.0).unwrap();

    let outcome = service.force_advance(experiment.id).unwrap();

    assert!(matches!(outcome, AdvanceOutcome::Completed { .. }));
    assert!(store.genome(kept_a).is_ok());
    assert!(store.genome(kept_b).is_ok());
    assert!(matches!(
        store.genome(orphan),
        Err(TunebreederError::NotFound(_))
    ));
}

#[test]
fn lone_genome_cannot_breed() {
    let (store, service) = service_with(1);
    let experiment = service.create_experiment("lonely", None, 5).unwrap();
    score_all(&store, experiment.id, 0);

    let outcome = service.force_advance(experiment.id).unwrap();

    assert_eq!(outcome, AdvanceOutcome::InsufficientPopulation);
    assert_eq!(service.experiment(experiment.id).unwrap().current_generation, 0);
}

#[test]
fn offspring_carry_parent_links_into_the_next_generation() {
    let (store, service) = service_with(8);
    let experiment = service.create_experiment("lineage", None, 5).unwrap();
    score_all(&store, experiment.id, 0);
    let elders: Vec<u64> = store
        .population(experiment.id, 0)
        .unwrap()
        .iter()
        .map(|g| g.id)
        .collect();

    service.force_advance(experiment.id).unwrap();

    let children = store.population(experiment.id, 1).unwrap();
    assert_eq!(children.len(), 8);
    for child in children {
        assert_eq!(child.notes.len(), 16);
        assert!(!child.user_scored);
        let p1 = child.parent1.expect("crossover child has two parents");
        let p2 = child.parent2.expect("crossover child has two parents");
        assert_ne!(p1, p2);
        assert!(elders.contains(&p1));
        assert!(elders.contains(&p2));
    }
}

#[test]
fn best_score_high_water_mark_moves_with_the_top_genome() {
    let (store, service) = service_with(4);
    let experiment = service.create_experiment("best", None, 5).unwrap();
    score_all(&store, experiment.id, 0);

    service.force_advance(experiment.id).unwrap();

    let experiment = service.experiment(experiment.id).unwrap();
    assert_eq!(experiment.best_score, 53.0);
}

#[test]
fn concurrent_duplicate_triggers_advance_exactly_once() {
    let (store, service) = service_with(10);
    let service = Arc::new(service);
    let experiment = service.create_experiment("race", None, 10).unwrap();
    score_all(&store, experiment.id, 0);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = Arc::clone(&service);
        let id = experiment.id;
        handles.push(std::thread::spawn(move || service.force_advance(id).unwrap()));
    }
    let outcomes: Vec<AdvanceOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let advances = outcomes
        .iter()
        .filter(|o| matches!(o, AdvanceOutcome::Advanced { .. }))
        .count();
    assert_eq!(advances, 1, "outcomes: {:?}", outcomes);
    assert_eq!(service.experiment(experiment.id).unwrap().current_generation, 1);
    assert_eq!(store.population(experiment.id, 1).unwrap().len(), 10);
}

#[test]
fn submitted_scores_outside_the_range_are_rejected() {
    let (_, service) = service_with(4);
    let experiment = service.create_experiment("bounds", None, 5).unwrap();
    let genome = service.get_population(experiment.id, 0).unwrap()[0].clone();

    for bad in [-1.0, 100.5, f64::NAN] {
        assert!(matches!(
            service.submit_score(genome.id, 1, bad),
            Err(TunebreederError::Validation(_))
        ));
    }
    assert!(!service.get_population(experiment.id, 0).unwrap()[0].user_scored);
}

#[test]
fn unknown_ids_surface_as_not_found() {
    let (_, service) = service_with(4);

    assert!(matches!(
        service.submit_score(9999, 1, 50.0),
        Err(TunebreederError::NotFound(_))
    ));
    assert!(matches!(
        service.experiment(777),
        Err(TunebreederError::NotFound(_))
    ));
}

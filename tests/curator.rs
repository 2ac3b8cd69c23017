use std::sync::Arc;
use tunebreeder::engines::curator::{PopulationCurator, SweepOutcome, SweepReport};
use tunebreeder::store::DataStore;
use tunebreeder::types::{GenomeId, NewGenome, Note, NoteDuration};
use tunebreeder::{InMemoryStore, SchedulerConfig, TunebreederError};

fn genome(generation: u32, parent1: Option<GenomeId>, parent2: Option<GenomeId>) -> NewGenome {
    NewGenome {
        generation,
        notes: vec![Note::new(60, NoteDuration::Quarter, 80).unwrap()],
        score: 0.0,
        user_scored: false,
        parent1,
        parent2,
    }
}

fn curator(store: &Arc<InMemoryStore>) -> PopulationCurator<InMemoryStore> {
    PopulationCurator::new(Arc::clone(store), &SchedulerConfig::default())
}

#[test]
fn sweep_skips_reserved_early_generations() {
    let store = Arc::new(InMemoryStore::new());
    let experiment = store
        .create_experiment("early", None, 10, vec![genome(0, None, None)])
        .unwrap();

    let outcome = curator(&store).sweep(experiment.id).unwrap();

    assert_eq!(outcome, SweepOutcome::Skipped { generation: 0 });
}

/// Five generations: a surviving chain, an orphan branch per generation, and
/// a saved pin on one orphan. Only unsaved, unreachable genomes go away.
#[test]
fn sweep_preserves_ancestors_and_saved_melodies() {
    let store = Arc::new(InMemoryStore::new());
    let experiment = store
        .create_experiment(
            "lineage",
            None,
            20,
            vec![genome(0, None, None), genome(0, None, None)],
        )
        .unwrap();
    let gen0 = store.population(experiment.id, 0).unwrap();
    let (a, b) = (gen0[0].id, gen0[1].id);

    // gen1: child of both founders, plus an orphan descending from b alone.
    let gen1 = store
        .commit_generation(
            experiment.id,
            0,
            vec![genome(1, Some(a), Some(b)), genome(1, Some(b), None)],
            0.0,
        )
        .unwrap();
    let (c, orphan1) = (gen1[0].id, gen1[1].id);

    let gen2 = store
        .commit_generation(
            experiment.id,
            1,
            vec![genome(2, Some(c), None), genome(2, Some(orphan1), None)],
            0.0,
        )
        .unwrap();
    let (d, orphan2) = (gen2[0].id, gen2[1].id);

    let gen3 = store
        .commit_generation(
            experiment.id,
            2,
            vec![genome(3, Some(d), None), genome(3, None, None)],
            0.0,
        )
        .unwrap();
    let (e, orphan3) = (gen3[0].id, gen3[1].id);

    let gen4 = store
        .commit_generation(experiment.id, 3, vec![genome(4, Some(e), None)], 0.0)
        .unwrap();
    let current = gen4[0].id;

    // Pin the second orphan; reachability alone would delete it.
    store.save_melody(7, orphan2, "keeper", None).unwrap();

    let outcome = curator(&store).sweep(experiment.id).unwrap();

    assert_eq!(
        outcome,
        SweepOutcome::Swept(SweepReport {
            examined: 8,
            deleted: 2
        })
    );

    // The whole surviving chain, both shared founders, and the pin remain.
    for id in [current, e, d, c, a, b, orphan2] {
        assert!(store.genome(id).is_ok(), "genome {} should survive", id);
    }
    for id in [orphan1, orphan3] {
        assert!(
            matches!(store.genome(id), Err(TunebreederError::NotFound(_))),
            "genome {} should be deleted",
            id
        );
    }
}

#[test]
fn sweep_keeps_shared_ancestors_of_sibling_lineages() {
    let store = Arc::new(InMemoryStore::new());
    let experiment = store
        .create_experiment("siblings", None, 20, vec![genome(0, None, None)])
        .unwrap();
    let root = store.population(experiment.id, 0).unwrap()[0].id;

    let mut previous = vec![root, root];
    for generation in 1..=4 {
        let children = store
            .commit_generation(
                experiment.id,
                generation - 1,
                vec![
                    genome(generation, Some(previous[0]), None),
                    genome(generation, Some(previous[1]), None),
                ],
                0.0,
            )
            .unwrap();
        previous = children.iter().map(|g| g.id).collect();
    }

    let outcome = curator(&store).sweep(experiment.id).unwrap();

    // Two sibling chains converge on one root; everything is reachable.
    assert_eq!(
        outcome,
        SweepOutcome::Swept(SweepReport {
            examined: 7,
            deleted: 0
        })
    );
    assert!(store.genome(root).is_ok());
}

#[test]
fn sweep_never_touches_the_current_generation() {
    let store = Arc::new(InMemoryStore::new());
    let experiment = store
        .create_experiment("current", None, 20, vec![genome(0, None, None)])
        .unwrap();
    let mut tip = store.population(experiment.id, 0).unwrap()[0].id;
    for generation in 1..=4 {
        // Children without parent links: the older tip becomes unreachable.
        let children = store
            .commit_generation(experiment.id, generation - 1, vec![genome(generation, None, None)], 0.0)
            .unwrap();
        tip = children[0].id;
    }

    curator(&store).sweep(experiment.id).unwrap();

    assert!(store.genome(tip).is_ok());
    assert_eq!(store.population(experiment.id, 4).unwrap().len(), 1);
}

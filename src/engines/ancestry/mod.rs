use crate::error::Result;
use crate::store::DataStore;
use crate::types::{GenomeId, GenomeRecord};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// A node on the ancestry walk. `main_branch` marks the chain the walk
/// followed; the other parent at each step appears with the flag unset.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub genome: GenomeId,
    pub generation: u32,
    pub score: f64,
    pub main_branch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchEdge {
    pub child: GenomeId,
    pub parent: GenomeId,
    pub main_branch: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AncestorBranch {
    pub nodes: Vec<BranchNode>,
    pub edges: Vec<BranchEdge>,
}

/// Outcome of a lowest-common-ancestor query. Absence of a shared ancestor
/// (including genomes from different experiments) is a result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum LcaOutcome {
    Found {
        ancestor: GenomeId,
        generation: u32,
        /// Intermediate hops from the first genome to the ancestor, both
        /// endpoints excluded.
        path_a: Vec<GenomeId>,
        path_b: Vec<GenomeId>,
    },
    NoCommonAncestor,
}

/// Graph queries over the parent-link DAG. Each query fetches the
/// experiment's genome set once into an id-indexed arena and traverses that
/// snapshot, so results are deterministic even while writes land elsewhere.
pub struct AncestryEngine<S> {
    store: Arc<S>,
}

type Arena = HashMap<GenomeId, GenomeRecord>;

impl<S: DataStore> AncestryEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn arena(&self, genome_id: GenomeId) -> Result<Arena> {
        let experiment_id = self.store.genome_experiment(genome_id)?;
        let genomes = self.store.experiment_genomes(experiment_id)?;
        Ok(genomes.into_iter().map(|g| (g.id, g)).collect())
    }

    /// Walk upward from a genome, at each step following the higher-scored
    /// parent (ties favor parent1). Both parents of every visited node show
    /// up in the result; only the followed chain carries `main_branch`.
    pub fn ancestor_branch(&self, genome_id: GenomeId, max_depth: usize) -> Result<AncestorBranch> {
        let start = self.store.genome(genome_id)?;
        let arena = self.arena(genome_id)?;

        let mut branch = AncestorBranch::default();
        let mut seen: HashMap<GenomeId, usize> = HashMap::new();
        push_node(&mut branch, &mut seen, &start, true);

        let mut current = start;
        for _ in 0..max_depth {
            let main_parent = match pick_main_parent(&current, &arena) {
                Some(parent) => parent.clone(),
                None => break,
            };
            for parent_id in [current.parent1, current.parent2].into_iter().flatten() {
                if let Some(parent) = arena.get(&parent_id) {
                    let is_main = parent_id == main_parent.id;
                    push_node(&mut branch, &mut seen, parent, is_main);
                    branch.edges.push(BranchEdge {
                        child: current.id,
                        parent: parent_id,
                        main_branch: is_main,
                    });
                }
            }
            current = main_parent;
        }
        Ok(branch)
    }

    /// Most recent genome from which both inputs descend. `lca(x, x)` is `x`
    /// with empty paths.
    pub fn lowest_common_ancestor(&self, a: GenomeId, b: GenomeId) -> Result<LcaOutcome> {
        // Cross-experiment pairs share no ancestry by construction.
        let experiment_a = self.store.genome_experiment(a)?;
        let experiment_b = self.store.genome_experiment(b)?;
        if experiment_a != experiment_b {
            return Ok(LcaOutcome::NoCommonAncestor);
        }

        let arena = self.arena(a)?;
        let from_a = collect_ancestors(a, &arena);
        let from_b = collect_ancestors(b, &arena);

        let best = from_a
            .keys()
            .filter(|id| from_b.contains_key(id))
            .filter_map(|id| arena.get(id))
            .max_by(|x, y| x.generation.cmp(&y.generation).then(y.id.cmp(&x.id)));

        let ancestor = match best {
            Some(record) => record,
            None => return Ok(LcaOutcome::NoCommonAncestor),
        };
        Ok(LcaOutcome::Found {
            ancestor: ancestor.id,
            generation: ancestor.generation,
            path_a: rebuild_path(a, ancestor.id, &from_a),
            path_b: rebuild_path(b, ancestor.id, &from_b),
        })
    }
}

fn push_node(
    branch: &mut AncestorBranch,
    seen: &mut HashMap<GenomeId, usize>,
    record: &GenomeRecord,
    main_branch: bool,
) {
    match seen.get(&record.id) {
        // A node first met as the off-main parent can reappear on the
        // followed chain; the main flag only ever upgrades.
        Some(&index) => {
            if main_branch {
                branch.nodes[index].main_branch = true;
            }
        }
        None => {
            seen.insert(record.id, branch.nodes.len());
            branch.nodes.push(BranchNode {
                genome: record.id,
                generation: record.generation,
                score: record.score,
                main_branch,
            });
        }
    }
}

fn pick_main_parent<'a>(child: &GenomeRecord, arena: &'a Arena) -> Option<&'a GenomeRecord> {
    let p1 = child.parent1.and_then(|id| arena.get(&id));
    let p2 = child.parent2.and_then(|id| arena.get(&id));
    match (p1, p2) {
        (Some(a), Some(b)) => Some(if b.score > a.score { b } else { a }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// BFS over parent links. Maps every reachable ancestor (the start node
/// included) to the node it was discovered from, for path reconstruction.
fn collect_ancestors(start: GenomeId, arena: &Arena) -> HashMap<GenomeId, Option<GenomeId>> {
    let mut discovered: HashMap<GenomeId, Option<GenomeId>> = HashMap::new();
    let mut queue = VecDeque::new();
    if arena.contains_key(&start) {
        discovered.insert(start, None);
        queue.push_back(start);
    }
    while let Some(id) = queue.pop_front() {
        let record = match arena.get(&id) {
            Some(record) => record,
            None => continue,
        };
        for parent in [record.parent1, record.parent2].into_iter().flatten() {
            if arena.contains_key(&parent) && !discovered.contains_key(&parent) {
                discovered.insert(parent, Some(id));
                queue.push_back(parent);
            }
        }
    }
    discovered
}

/// Intermediate hops from `start` up to `ancestor`, endpoints excluded.
fn rebuild_path(
    start: GenomeId,
    ancestor: GenomeId,
    discovered: &HashMap<GenomeId, Option<GenomeId>>,
) -> Vec<GenomeId> {
    let mut path = Vec::new();
    let mut cursor = ancestor;
    while let Some(Some(previous)) = discovered.get(&cursor) {
        cursor = *previous;
        if cursor == start {
            break;
        }
        path.push(cursor);
    }
    path.reverse();
    path
}

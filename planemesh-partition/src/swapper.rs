//! Boundary refinement by face swapping.
//!
//! After merging, faces on cluster boundaries may sit in a sub-optimal
//! cluster. Each pass scores every boundary face against its neighboring
//! clusters and applies the negative-Δenergy migrations in ascending order.
//! Swaps can disconnect a cluster, so every pass ends with a BFS island
//! split of the touched clusters.

use crate::config::PartitionConfig;
use crate::partition::{Partition, SwapFace};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info};

/// Swaps below this magnitude are treated as no improvement.
const MIN_GAIN: f64 = 1e-12;

/// Boundary-face swap refinement.
pub struct Swapper {
    /// Hard cap on refinement passes
    pub pass_limit: usize,
    /// Area floor under which a split-off island is reabsorbed
    pub min_cluster_area: f64,
}

impl Swapper {
    pub fn from_config(config: &PartitionConfig) -> Self {
        Self {
            pass_limit: config.swap_pass_limit,
            min_cluster_area: config.min_cluster_area,
        }
    }

    /// Run passes until no swap applies, the touched-cluster set repeats
    /// (progress plateau), or the pass cap is hit. Returns total swaps.
    pub fn run(&self, partition: &mut Partition) -> usize {
        let mut total = 0usize;
        let mut last_touched: BTreeSet<usize> = BTreeSet::new();
        for pass in 0..self.pass_limit {
            let (applied, touched) = self.swap_once(partition);
            total += applied;
            debug!(pass, applied, "swap pass");
            if applied == 0 {
                break;
            }
            self.split_islands(partition, &touched);
            if touched == last_touched {
                break;
            }
            last_touched = touched;
        }
        info!(total, "boundary swapping finished");
        total
    }

    /// Energy change of moving face `fi` from cluster `from` to `to`.
    pub fn swap_delta(partition: &Partition, fi: usize, from: usize, to: usize) -> f64 {
        let f_cov = partition.mesh.faces[fi].cov;
        let from_c = &partition.clusters[from];
        let to_c = &partition.clusters[to];
        let removal = (from_c.cov - f_cov).energy() - from_c.energy;
        let insertion = to_c.cov.merged_energy(&f_cov) - to_c.energy;
        removal + insertion
    }

    /// One proposal + application pass. Returns (swaps applied, clusters
    /// touched by an applied swap).
    fn swap_once(&self, partition: &mut Partition) -> (usize, BTreeSet<usize>) {
        // Gather boundary faces with their foreign neighbor clusters.
        let mut candidates: Vec<(usize, usize, Vec<usize>)> = Vec::new();
        for cid in partition.active_clusters() {
            for &fi in &partition.clusters[cid].faces {
                let mut foreign = BTreeSet::new();
                for &g in &partition.mesh.faces[fi].nbr_faces {
                    if let Some(other) = partition.mesh.faces[g].cluster_id {
                        if other != cid && partition.mesh.faces[g].is_valid {
                            foreign.insert(other);
                        }
                    }
                }
                if !foreign.is_empty() {
                    candidates.push((fi, cid, foreign.into_iter().collect()));
                }
            }
        }

        // Score every candidate independently; keep the best improving move.
        let proposals: Vec<SwapFace> = {
            let p = &*partition;
            candidates
                .par_iter()
                .filter_map(|&(fi, from, ref tos)| {
                    let best = tos
                        .iter()
                        .map(|&to| (to, Self::swap_delta(p, fi, from, to)))
                        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))?;
                    (best.1 < -MIN_GAIN).then(|| SwapFace {
                        face: fi,
                        from,
                        to: best.0,
                        delta: best.1,
                    })
                })
                .collect()
        };

        // Queue proposals on their source cluster and apply in Δ order.
        for swap in proposals {
            partition.clusters[swap.from].pending_swaps.push(swap);
        }
        let mut applied = 0usize;
        let mut touched = BTreeSet::new();
        for cid in 0..partition.clusters.len() {
            let mut swaps = std::mem::take(&mut partition.clusters[cid].pending_swaps);
            swaps.sort_by(|a, b| a.delta.total_cmp(&b.delta).then(a.face.cmp(&b.face)));
            for swap in swaps {
                if partition.mesh.faces[swap.face].cluster_id != Some(swap.from) {
                    continue; // already migrated by an earlier swap
                }
                if !partition.clusters[swap.to].is_active() {
                    continue;
                }
                // Earlier applications may have invalidated the prediction.
                let delta = Self::swap_delta(partition, swap.face, swap.from, swap.to);
                if delta >= -MIN_GAIN {
                    continue;
                }
                partition.move_face(swap.face, swap.from, swap.to);
                touched.insert(swap.from);
                touched.insert(swap.to);
                applied += 1;
            }
        }
        (applied, touched)
    }

    /// BFS over same-cluster face adjacency; splits every touched cluster
    /// into connected components. The largest keeps the id; smaller ones
    /// become new clusters or are reabsorbed depending on their area.
    fn split_islands(&self, partition: &mut Partition, touched: &BTreeSet<usize>) {
        for &cid in touched {
            if !partition.clusters[cid].is_active() {
                continue;
            }
            let mut components = connected_components(partition, cid);
            if components.len() <= 1 {
                continue;
            }
            // Keep the largest component under the original id.
            components.sort_by(|a, b| {
                b.len()
                    .cmp(&a.len())
                    .then_with(|| a.iter().next().cmp(&b.iter().next()))
            });
            debug!(cluster = cid, islands = components.len() - 1, "splitting cluster");
            for comp in components.into_iter().skip(1) {
                let area: f64 = comp
                    .iter()
                    .map(|&fi| partition.mesh.faces[fi].area)
                    .sum();
                if area >= self.min_cluster_area {
                    partition.detach_faces(cid, comp);
                    continue;
                }
                match most_adjacent_cluster(partition, cid, &comp) {
                    Some(target) => {
                        for fi in comp {
                            partition.move_face(fi, cid, target);
                        }
                    }
                    // A floating patch with no outside neighbor stays a
                    // cluster of its own regardless of area.
                    None => {
                        partition.detach_faces(cid, comp);
                    }
                }
            }
        }
    }
}

/// Connected components of a cluster's faces under same-cluster adjacency.
pub(crate) fn connected_components(
    partition: &mut Partition,
    cid: usize,
) -> Vec<BTreeSet<usize>> {
    let faces: Vec<usize> = partition.clusters[cid].faces.iter().copied().collect();
    for &fi in &faces {
        partition.mesh.faces[fi].is_visited = false;
    }
    let mut components = Vec::new();
    for &start in &faces {
        if partition.mesh.faces[start].is_visited {
            continue;
        }
        partition.mesh.faces[start].is_visited = true;
        let mut component = BTreeSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(fi) = queue.pop_front() {
            component.insert(fi);
            let nbrs: Vec<usize> = partition.mesh.faces[fi]
                .nbr_faces
                .iter()
                .copied()
                .filter(|&g| {
                    partition.mesh.faces[g].cluster_id == Some(cid)
                        && !partition.mesh.faces[g].is_visited
                })
                .collect();
            for g in nbrs {
                partition.mesh.faces[g].is_visited = true;
                queue.push_back(g);
            }
        }
        components.push(component);
    }
    components
}

/// The foreign cluster sharing the most face adjacencies with `comp`.
pub(crate) fn most_adjacent_cluster(
    partition: &Partition,
    cid: usize,
    comp: &BTreeSet<usize>,
) -> Option<usize> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &fi in comp {
        for &g in &partition.mesh.faces[fi].nbr_faces {
            if let Some(other) = partition.mesh.faces[g].cluster_id {
                if other != cid && partition.mesh.faces[g].is_valid {
                    *counts.entry(other).or_insert(0) += 1;
                }
            }
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(cluster, _)| cluster)
}

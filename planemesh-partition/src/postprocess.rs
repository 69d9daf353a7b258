//! Partition clean-up after swap refinement.
//!
//! In order: split disconnected clusters, dissolve tiny clusters into their
//! best neighbor, merge adjacent coplanar clusters, reattach weakly
//! connected islands, and finally re-index the mesh densely.

use crate::config::PartitionConfig;
use crate::partition::Partition;
use crate::swapper::{connected_components, most_adjacent_cluster};
use planemesh_core::Result;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Run every post-processing stage and return the re-indexed partition.
pub fn run_post_processing(
    mut partition: Partition,
    config: &PartitionConfig,
) -> Result<Partition> {
    let before = partition.live_cluster_count();
    split_all_islands(&mut partition, config.min_cluster_area);
    remove_small_clusters(&mut partition, config.min_cluster_area);
    merge_adjacent_planes(&mut partition, config);
    merge_island_clusters(&mut partition, config.min_cluster_area);
    let partition = partition.reindexed()?;
    info!(
        before,
        after = partition.live_cluster_count(),
        "post-processing finished"
    );
    Ok(partition)
}

/// Split every cluster into connected components (restored label files may
/// group spatially disjoint patches under one id). Components keep the
/// original id for the largest part; the rest become their own clusters or
/// are reabsorbed, by area.
pub fn split_all_islands(partition: &mut Partition, min_cluster_area: f64) {
    for cid in partition.active_clusters() {
        if !partition.clusters[cid].is_active() {
            continue;
        }
        let mut components = connected_components(partition, cid);
        if components.len() <= 1 {
            continue;
        }
        components.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| a.iter().next().cmp(&b.iter().next()))
        });
        debug!(cluster = cid, parts = components.len(), "splitting restored cluster");
        for comp in components.into_iter().skip(1) {
            let area: f64 = comp.iter().map(|&fi| partition.mesh.faces[fi].area).sum();
            if area >= min_cluster_area {
                partition.detach_faces(cid, comp);
            } else {
                match most_adjacent_cluster(partition, cid, &comp) {
                    Some(target) => {
                        for fi in comp {
                            partition.move_face(fi, cid, target);
                        }
                    }
                    None => {
                        partition.detach_faces(cid, comp);
                    }
                }
            }
        }
    }
}

/// Dissolve clusters below the area floor into the neighbor that gains the
/// least energy by taking them.
pub fn remove_small_clusters(partition: &mut Partition, min_cluster_area: f64) {
    let mut removed = 0usize;
    for cid in partition.active_clusters() {
        if !partition.clusters[cid].is_active()
            || partition.clusters[cid].area() >= min_cluster_area
        {
            continue;
        }
        let small = &partition.clusters[cid];
        let target = small
            .nbr_clusters
            .iter()
            .copied()
            .filter(|&n| partition.clusters[n].is_active())
            .map(|n| {
                let c = &partition.clusters[n];
                (c.cov.merged_energy(&small.cov) - c.energy, n)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, n)| n);
        if let Some(target) = target {
            partition.absorb_cluster(target, cid);
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(removed, "dissolved tiny clusters");
    }
}

/// Maximum and mean distance between two clusters' vertices and each
/// other's fitted plane, evaluated symmetrically.
fn plane_separation(partition: &Partition, c1: usize, c2: usize) -> Option<(f64, f64)> {
    let (n1, d1) = partition.clusters[c1].cov.plane()?;
    let (n2, d2) = partition.clusters[c2].cov.plane()?;

    let mut max_dist = 0.0f64;
    let mut sum = 0.0f64;
    let mut samples = 0usize;
    for (cid, n, d) in [(c1, n2, d2), (c2, n1, d1)] {
        let mut verts: BTreeSet<usize> = BTreeSet::new();
        for &fi in &partition.clusters[cid].faces {
            verts.extend(partition.mesh.faces[fi].indices);
        }
        for v in verts {
            let dist = (n.dot(&partition.mesh.vertices[v].point.coords) + d).abs();
            max_dist = max_dist.max(dist);
            sum += dist;
            samples += 1;
        }
    }
    (samples > 0).then(|| (max_dist, sum / samples as f64))
}

/// Merge adjacent cluster pairs whose planes agree in normal direction and
/// lie within the configured distance thresholds.
pub fn merge_adjacent_planes(partition: &mut Partition, config: &PartitionConfig) {
    let mut merged_total = 0usize;
    loop {
        let mut merged_any = false;
        for c1 in partition.active_clusters() {
            if !partition.clusters[c1].is_active() {
                continue;
            }
            loop {
                let candidate = partition.clusters[c1]
                    .nbr_clusters
                    .iter()
                    .copied()
                    .filter(|&c2| c2 > c1 && partition.clusters[c2].is_active())
                    .find(|&c2| coplanar(partition, c1, c2, config));
                match candidate {
                    Some(c2) => {
                        partition.absorb_cluster(c1, c2);
                        merged_any = true;
                        merged_total += 1;
                    }
                    None => break,
                }
            }
        }
        if !merged_any {
            break;
        }
    }
    if merged_total > 0 {
        debug!(merged = merged_total, "merged coplanar clusters");
    }
}

fn coplanar(partition: &Partition, c1: usize, c2: usize, config: &PartitionConfig) -> bool {
    let (Some(n1), Some(n2)) = (partition.cluster_normal(c1), partition.cluster_normal(c2))
    else {
        return false;
    };
    if n1.dot(&n2).abs() <= config.coplanar_normal_cos {
        return false;
    }
    let Some((max_dist, avg_dist)) = plane_separation(partition, c1, c2) else {
        return false;
    };
    max_dist < config.coplanar_max_distance && avg_dist < config.coplanar_avg_distance
}

/// Absorb clusters hanging off the rest of the mesh by at most two face
/// adjacencies, when small, into their dominant neighbor.
pub fn merge_island_clusters(partition: &mut Partition, min_cluster_area: f64) {
    for cid in partition.active_clusters() {
        if !partition.clusters[cid].is_active() {
            continue;
        }
        if partition.clusters[cid].area() >= 2.0 * min_cluster_area {
            continue;
        }
        let mut external_links = 0usize;
        for &fi in &partition.clusters[cid].faces {
            for &g in &partition.mesh.faces[fi].nbr_faces {
                if partition.mesh.faces[g].is_valid
                    && partition.mesh.faces[g].cluster_id != Some(cid)
                {
                    external_links += 1;
                }
            }
        }
        if !(1..=2).contains(&external_links) {
            continue;
        }
        let faces = partition.clusters[cid].faces.clone();
        if let Some(target) = most_adjacent_cluster(partition, cid, &faces) {
            debug!(cluster = cid, into = target, "reattaching island cluster");
            partition.absorb_cluster(target, cid);
        }
    }
}

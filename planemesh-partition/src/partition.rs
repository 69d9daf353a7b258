//! The partition aggregate: clusters over a surface mesh.
//!
//! A `Partition` owns the connectivity mesh and the cluster table. Clusters
//! are only ever emptied, never removed, so cluster ids stay stable until
//! [`Partition::reindexed`] produces a dense copy.

use planemesh_core::{CovAccum, Error, Result, SurfaceMesh, TriangleMesh, Vector3};
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

/// A pending boundary-face migration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapFace {
    pub face: usize,
    pub from: usize,
    pub to: usize,
    /// Predicted change in total energy; negative improves the partition.
    pub delta: f64,
}

/// A set of faces approximated by a single plane.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    /// Stable label for colors and export, preserved across re-indexing
    pub original_id: usize,
    pub faces: BTreeSet<usize>,
    pub nbr_clusters: BTreeSet<usize>,
    pub cov: CovAccum,
    /// Cached planar-fit energy of `cov`
    pub energy: f64,
    pub pending_swaps: Vec<SwapFace>,
    /// Scratch flag for breadth-first traversals
    pub is_visited: bool,
}

impl Cluster {
    pub fn is_active(&self) -> bool {
        !self.faces.is_empty()
    }

    pub fn area(&self) -> f64 {
        self.cov.area()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// Clusters over a surface mesh, with per-cluster covariance and energy.
#[derive(Debug)]
pub struct Partition {
    pub mesh: SurfaceMesh,
    pub clusters: Vec<Cluster>,
    live_clusters: usize,
}

impl Partition {
    /// Seed one cluster per valid face. A single triangle fits its own
    /// plane exactly, so every initial energy is zero.
    pub fn new(mesh: SurfaceMesh) -> Self {
        let mut clusters: Vec<Cluster> = Vec::with_capacity(mesh.faces.len());
        let mut mesh = mesh;
        let mut live = 0;
        for fi in 0..mesh.faces.len() {
            let mut cluster = Cluster {
                original_id: fi,
                ..Cluster::default()
            };
            if mesh.faces[fi].is_valid {
                mesh.faces[fi].cluster_id = Some(fi);
                cluster.faces.insert(fi);
                cluster.cov = mesh.faces[fi].cov;
                cluster.nbr_clusters = mesh.faces[fi].nbr_faces.clone();
                live += 1;
            }
            clusters.push(cluster);
        }
        Self {
            mesh,
            clusters,
            live_clusters: live,
        }
    }

    /// Rebuild a partition from a per-face labelling (e.g. a cluster file).
    /// Labels must cover every face; covariances, energies and the dual
    /// graph are reconstructed from the mesh.
    pub fn from_labels(mesh: SurfaceMesh, labels: &[usize]) -> Result<Self> {
        if labels.len() != mesh.faces.len() {
            return Err(Error::InvalidData(format!(
                "{} labels for {} faces",
                labels.len(),
                mesh.faces.len()
            )));
        }
        let cluster_count = labels.iter().max().map_or(0, |&m| m + 1);
        let mut mesh = mesh;
        let mut clusters: Vec<Cluster> = (0..cluster_count)
            .map(|cid| Cluster {
                original_id: cid,
                ..Cluster::default()
            })
            .collect();
        for (fi, &cid) in labels.iter().enumerate() {
            if !mesh.faces[fi].is_valid {
                continue;
            }
            mesh.faces[fi].cluster_id = Some(cid);
            let cluster = &mut clusters[cid];
            cluster.faces.insert(fi);
            cluster.cov += mesh.faces[fi].cov;
        }
        let mut partition = Self {
            mesh,
            clusters,
            live_clusters: 0,
        };
        partition.live_clusters = partition.clusters.iter().filter(|c| c.is_active()).count();
        for cid in 0..partition.clusters.len() {
            partition.clusters[cid].energy = partition.clusters[cid].cov.energy();
            partition.rebuild_cluster_neighbors(cid);
        }
        Ok(partition)
    }

    pub fn live_cluster_count(&self) -> usize {
        self.live_clusters
    }

    pub fn total_energy(&self) -> f64 {
        self.clusters
            .iter()
            .filter(|c| c.is_active())
            .map(|c| c.energy)
            .sum()
    }

    /// Ids of active clusters in ascending order.
    pub fn active_clusters(&self) -> Vec<usize> {
        (0..self.clusters.len())
            .filter(|&c| self.clusters[c].is_active())
            .collect()
    }

    /// Active cluster ids sorted by descending area.
    pub fn clusters_by_area(&self) -> Vec<usize> {
        let mut ids = self.active_clusters();
        ids.sort_by(|&a, &b| {
            self.clusters[b]
                .area()
                .total_cmp(&self.clusters[a].area())
                .then(a.cmp(&b))
        });
        ids
    }

    /// Active cluster ids sorted by descending face count.
    pub fn clusters_by_face_count(&self) -> Vec<usize> {
        let mut ids = self.active_clusters();
        ids.sort_by(|&a, &b| {
            self.clusters[b]
                .face_count()
                .cmp(&self.clusters[a].face_count())
                .then(a.cmp(&b))
        });
        ids
    }

    /// Per-face cluster labels for the valid faces, in face order.
    pub fn labels(&self) -> Vec<usize> {
        self.mesh
            .faces
            .iter()
            .filter(|f| f.is_valid)
            .map(|f| f.cluster_id.unwrap_or(usize::MAX))
            .collect()
    }

    /// Recompute a cluster's neighbor set from its member faces.
    pub fn rebuild_cluster_neighbors(&mut self, cid: usize) {
        let mut nbrs = BTreeSet::new();
        for &fi in &self.clusters[cid].faces {
            for &g in &self.mesh.faces[fi].nbr_faces {
                if let Some(other) = self.mesh.faces[g].cluster_id {
                    if other != cid && self.mesh.faces[g].is_valid {
                        nbrs.insert(other);
                    }
                }
            }
        }
        self.clusters[cid].nbr_clusters = nbrs;
    }

    /// Move one face between clusters, updating covariances, energies and
    /// the dual graph of every cluster whose adjacency could change.
    pub fn move_face(&mut self, fi: usize, from: usize, to: usize) {
        debug_assert_eq!(self.mesh.faces[fi].cluster_id, Some(from));
        let mut touched: BTreeSet<usize> = BTreeSet::new();
        touched.extend(self.clusters[from].nbr_clusters.iter().copied());
        touched.extend(self.clusters[to].nbr_clusters.iter().copied());
        touched.insert(from);
        touched.insert(to);

        let cov = self.mesh.faces[fi].cov;
        let to_was_active = self.clusters[to].is_active();
        self.clusters[from].faces.remove(&fi);
        self.clusters[from].cov -= cov;
        self.clusters[from].energy = self.clusters[from].cov.energy();
        if !to_was_active {
            self.live_clusters += 1;
        }
        self.clusters[to].faces.insert(fi);
        self.clusters[to].cov += cov;
        self.clusters[to].energy = self.clusters[to].cov.energy();
        self.mesh.faces[fi].cluster_id = Some(to);
        if !self.clusters[from].is_active() {
            self.live_clusters -= 1;
            self.clusters[from].cov = CovAccum::new();
            self.clusters[from].energy = 0.0;
        }
        for n in touched {
            self.rebuild_cluster_neighbors(n);
        }
    }

    /// Absorb cluster `c2` into `c1` (face sets, covariance, dual graph).
    /// `c2` is left empty; its former neighbors now point at `c1`.
    pub fn absorb_cluster(&mut self, c1: usize, c2: usize) {
        debug_assert_ne!(c1, c2);
        let faces = std::mem::take(&mut self.clusters[c2].faces);
        for &fi in &faces {
            self.mesh.faces[fi].cluster_id = Some(c1);
        }
        let cov2 = self.clusters[c2].cov;
        self.clusters[c1].faces.extend(faces);
        self.clusters[c1].cov += cov2;
        self.clusters[c1].energy = self.clusters[c1].cov.energy();

        let nbrs2 = std::mem::take(&mut self.clusters[c2].nbr_clusters);
        let mut merged: BTreeSet<usize> = self.clusters[c1]
            .nbr_clusters
            .iter()
            .chain(nbrs2.iter())
            .copied()
            .collect();
        merged.remove(&c1);
        merged.remove(&c2);
        for &n in &merged {
            self.clusters[n].nbr_clusters.remove(&c2);
            self.clusters[n].nbr_clusters.insert(c1);
        }
        self.clusters[c1].nbr_clusters = merged;
        self.clusters[c2].cov = CovAccum::new();
        self.clusters[c2].energy = 0.0;
        self.live_clusters -= 1;
    }

    /// Register a brand-new cluster from a set of faces currently assigned
    /// elsewhere (used when splitting islands). Returns the new id.
    pub fn adopt_faces(&mut self, faces: BTreeSet<usize>) -> usize {
        let cid = self.clusters.len();
        let mut cov = CovAccum::new();
        for &fi in &faces {
            cov += self.mesh.faces[fi].cov;
            self.mesh.faces[fi].cluster_id = Some(cid);
        }
        let energy = cov.energy();
        self.clusters.push(Cluster {
            original_id: cid,
            faces,
            nbr_clusters: BTreeSet::new(),
            cov,
            energy,
            pending_swaps: Vec::new(),
            is_visited: false,
        });
        self.live_clusters += 1;
        cid
    }

    /// Split a set of faces out of `cid` into a brand-new cluster and
    /// refresh the dual graph around both. Returns the new cluster id.
    pub fn detach_faces(&mut self, cid: usize, faces: BTreeSet<usize>) -> usize {
        let mut touched: BTreeSet<usize> = self.clusters[cid].nbr_clusters.clone();
        touched.insert(cid);
        for &fi in &faces {
            self.clusters[cid].faces.remove(&fi);
            self.clusters[cid].cov -= self.mesh.faces[fi].cov;
        }
        if self.clusters[cid].is_active() {
            self.clusters[cid].energy = self.clusters[cid].cov.energy();
        } else {
            self.live_clusters -= 1;
            self.clusters[cid].cov = CovAccum::new();
            self.clusters[cid].energy = 0.0;
        }
        let new_cid = self.adopt_faces(faces);
        touched.insert(new_cid);
        for n in touched {
            self.rebuild_cluster_neighbors(n);
        }
        new_cid
    }

    /// Drop a face from the mesh and its cluster (edge contraction deletes
    /// the faces sharing the contracted edge). Refreshes the dual graph
    /// around the face's cluster.
    pub fn remove_face(&mut self, fi: usize) {
        let cid = self.mesh.faces[fi].cluster_id;
        let mut touched: BTreeSet<usize> = BTreeSet::new();
        if let Some(cid) = cid {
            let cov = self.mesh.faces[fi].cov;
            self.clusters[cid].faces.remove(&fi);
            self.clusters[cid].cov -= cov;
            if self.clusters[cid].is_active() {
                self.clusters[cid].energy = self.clusters[cid].cov.energy();
            } else {
                self.live_clusters -= 1;
                self.clusters[cid].cov = CovAccum::new();
                self.clusters[cid].energy = 0.0;
            }
            touched.insert(cid);
            touched.extend(self.clusters[cid].nbr_clusters.iter().copied());
        }
        self.mesh.faces[fi].is_valid = false;
        self.mesh.faces[fi].cluster_id = None;
        for n in touched {
            self.rebuild_cluster_neighbors(n);
        }
    }

    /// Recompute a face's cached area and covariance after one of its
    /// vertices moved, keeping the owning cluster's aggregate in sync.
    pub fn refresh_face_geometry(&mut self, fi: usize) {
        let [p0, p1, p2] = self.mesh.face_points(fi);
        let new_cov = CovAccum::from_triangle(&p0, &p1, &p2);
        let old_cov = self.mesh.faces[fi].cov;
        self.mesh.faces[fi].cov = new_cov;
        self.mesh.faces[fi].area = new_cov.area();
        if let Some(cid) = self.mesh.faces[fi].cluster_id {
            self.clusters[cid].cov -= old_cov;
            self.clusters[cid].cov += new_cov;
            self.clusters[cid].energy = self.clusters[cid].cov.energy();
        }
    }

    /// Unit normal of a cluster's fitted plane, when defined.
    pub fn cluster_normal(&self, cid: usize) -> Option<Vector3<f64>> {
        self.clusters[cid].cov.plane().map(|(n, _)| n)
    }

    /// Deterministic display color derived from a cluster's original id.
    pub fn cluster_color(original_id: usize) -> [u8; 3] {
        let mut rng = rand::rngs::StdRng::seed_from_u64(original_id as u64);
        [rng.gen_range(64..=255), rng.gen_range(64..=255), rng.gen_range(64..=255)]
    }

    /// Re-index the surviving mesh densely and rebuild the partition on it.
    /// Cluster `original_id`s are carried over.
    pub fn reindexed(&self) -> Result<Partition> {
        let (dense, _vmap, fmap) = self.mesh.compact();
        let surface = SurfaceMesh::build(&dense)?;

        // Map old cluster ids to dense ones in order of first appearance.
        let mut cluster_map: Vec<Option<usize>> = vec![None; self.clusters.len()];
        let mut originals = Vec::new();
        let mut labels = vec![0usize; dense.face_count()];
        for (fi, face) in self.mesh.faces.iter().enumerate() {
            let Some(new_fi) = fmap[fi] else { continue };
            let cid = face.cluster_id.ok_or_else(|| {
                Error::InvariantViolation(format!("valid face {} has no cluster", fi))
            })?;
            let dense_cid = match cluster_map[cid] {
                Some(d) => d,
                None => {
                    let d = originals.len();
                    originals.push(self.clusters[cid].original_id);
                    cluster_map[cid] = Some(d);
                    d
                }
            };
            labels[new_fi] = dense_cid;
        }
        let mut partition = Partition::from_labels(surface, &labels)?;
        for (cid, &original) in originals.iter().enumerate() {
            partition.clusters[cid].original_id = original;
        }
        Ok(partition)
    }

    /// Verify the partition invariants: every valid face in exactly one
    /// cluster, covariance consistency, neighbor-set correctness, and
    /// adjacency symmetry. Violations indicate a bug, not bad input.
    pub fn audit(&self) -> Result<()> {
        let mut seen = vec![false; self.mesh.faces.len()];
        for (cid, cluster) in self.clusters.iter().enumerate() {
            let mut cov = CovAccum::new();
            for &fi in &cluster.faces {
                if !self.mesh.faces[fi].is_valid {
                    return Err(Error::InvariantViolation(format!(
                        "cluster {} contains invalid face {}",
                        cid, fi
                    )));
                }
                if self.mesh.faces[fi].cluster_id != Some(cid) {
                    return Err(Error::InvariantViolation(format!(
                        "face {} is in cluster {} but labelled {:?}",
                        fi,
                        cid,
                        self.mesh.faces[fi].cluster_id
                    )));
                }
                if seen[fi] {
                    return Err(Error::InvariantViolation(format!(
                        "face {} belongs to more than one cluster",
                        fi
                    )));
                }
                seen[fi] = true;
                cov += self.mesh.faces[fi].cov;
            }
            if cluster.is_active() {
                let tol = 1e-6 * cluster.cov.area().max(1.0);
                if (cov.area() - cluster.cov.area()).abs() > tol
                    || (cov.centered() - cluster.cov.centered()).norm() > tol
                {
                    return Err(Error::InvariantViolation(format!(
                        "cluster {} covariance diverged from its faces",
                        cid
                    )));
                }
                if (cluster.energy - cluster.cov.energy()).abs() > tol {
                    return Err(Error::InvariantViolation(format!(
                        "cluster {} cached energy diverged",
                        cid
                    )));
                }
            }
        }
        for (fi, face) in self.mesh.faces.iter().enumerate() {
            if face.is_valid && !seen[fi] {
                return Err(Error::InvariantViolation(format!(
                    "valid face {} belongs to no cluster",
                    fi
                )));
            }
        }
        for cid in 0..self.clusters.len() {
            let mut expect = BTreeSet::new();
            for &fi in &self.clusters[cid].faces {
                for &g in &self.mesh.faces[fi].nbr_faces {
                    if let Some(other) = self.mesh.faces[g].cluster_id {
                        if other != cid && self.mesh.faces[g].is_valid {
                            expect.insert(other);
                        }
                    }
                }
            }
            if expect != self.clusters[cid].nbr_clusters {
                return Err(Error::InvariantViolation(format!(
                    "cluster {} neighbor set is stale",
                    cid
                )));
            }
            for &n in &self.clusters[cid].nbr_clusters {
                if !self.clusters[n].nbr_clusters.contains(&cid) {
                    return Err(Error::InvariantViolation(format!(
                        "cluster adjacency {} -> {} is not symmetric",
                        cid, n
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planemesh_core::{Point3, TriangleMesh};

    fn flat_quad() -> SurfaceMesh {
        SurfaceMesh::build(&TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [1, 3, 2]],
        ))
        .unwrap()
    }

    #[test]
    fn test_new_seeds_one_cluster_per_face() {
        let p = Partition::new(flat_quad());
        assert_eq!(p.live_cluster_count(), 2);
        assert_eq!(p.clusters[0].faces, BTreeSet::from([0]));
        assert_eq!(p.clusters[0].nbr_clusters, BTreeSet::from([1]));
        assert_eq!(p.total_energy(), 0.0);
        p.audit().unwrap();
    }

    #[test]
    fn test_absorb_cluster_unions_state() {
        let mut p = Partition::new(flat_quad());
        p.absorb_cluster(0, 1);
        assert_eq!(p.live_cluster_count(), 1);
        assert_eq!(p.clusters[0].faces, BTreeSet::from([0, 1]));
        assert!(p.clusters[1].faces.is_empty());
        assert_eq!(p.mesh.faces[1].cluster_id, Some(0));
        assert!(p.clusters[0].nbr_clusters.is_empty());
        p.audit().unwrap();
    }

    #[test]
    fn test_from_labels_restores_partition() {
        let p = Partition::from_labels(flat_quad(), &[0, 1]).unwrap();
        assert_eq!(p.live_cluster_count(), 2);
        assert_eq!(p.clusters[0].nbr_clusters, BTreeSet::from([1]));
        p.audit().unwrap();

        let merged = Partition::from_labels(flat_quad(), &[3, 3]).unwrap();
        assert_eq!(merged.live_cluster_count(), 1);
        assert_eq!(merged.clusters[3].face_count(), 2);
        merged.audit().unwrap();
    }

    #[test]
    fn test_from_labels_length_mismatch() {
        assert!(Partition::from_labels(flat_quad(), &[0]).is_err());
    }

    #[test]
    fn test_move_face_keeps_invariants() {
        let mut p = Partition::from_labels(flat_quad(), &[0, 1]).unwrap();
        p.move_face(1, 1, 0);
        assert_eq!(p.live_cluster_count(), 1);
        assert_eq!(p.clusters[0].face_count(), 2);
        p.audit().unwrap();
    }

    #[test]
    fn test_sorting_orders() {
        let mut p = Partition::from_labels(flat_quad(), &[0, 1]).unwrap();
        p.move_face(1, 1, 0);
        let by_area = p.clusters_by_area();
        assert_eq!(by_area, vec![0]);
        let by_faces = p.clusters_by_face_count();
        assert_eq!(by_faces, vec![0]);
    }

    #[test]
    fn test_cluster_color_is_deterministic() {
        assert_eq!(Partition::cluster_color(7), Partition::cluster_color(7));
        assert_ne!(Partition::cluster_color(7), Partition::cluster_color(8));
    }

    #[test]
    fn test_reindexed_preserves_labels() {
        let mut p = Partition::from_labels(flat_quad(), &[0, 1]).unwrap();
        p.clusters[0].original_id = 41;
        p.clusters[1].original_id = 42;
        let dense = p.reindexed().unwrap();
        assert_eq!(dense.live_cluster_count(), 2);
        assert_eq!(dense.clusters[0].original_id, 41);
        assert_eq!(dense.clusters[1].original_id, 42);
        dense.audit().unwrap();
    }

    #[test]
    fn test_labels_roundtrip_through_reindex() {
        let p = Partition::from_labels(flat_quad(), &[1, 0]).unwrap();
        let labels = p.labels();
        let q = Partition::from_labels(flat_quad(), &labels).unwrap();
        assert_eq!(q.labels(), labels);
    }
}

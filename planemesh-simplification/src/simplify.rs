//! QEM edge contraction over a labelled partition.
//!
//! Edges are classified as *inner* (both incident faces in one cluster) or
//! *border* (cluster borders and mesh-boundary edges). Inner edges contract
//! first using face-plane quadrics; border edges follow, with an extra
//! constraint-plane quadric per border edge so contractions resist leaving
//! the border. Every contraction is admitted only if it keeps the surface
//! manifold and flips no surviving face.

use planemesh_core::{edge_key, HeapItem, MinHeap, Point3, Quadric, Result, Vector3};
use planemesh_partition::{Partition, PartitionConfig};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Edge classification relative to the cluster labelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Both incident faces share a cluster
    Inner,
    /// Cluster border or mesh boundary
    Border,
}

/// A candidate contraction, arena-allocated for the heap.
#[derive(Debug, Clone)]
struct ContractEdge {
    v1: usize,
    v2: usize,
    kind: EdgeKind,
    cost: f64,
    target: Point3<f64>,
    live: bool,
    pos: Option<usize>,
}

impl HeapItem for ContractEdge {
    fn key(&self) -> f64 {
        self.cost
    }
    fn endpoints(&self) -> (usize, usize) {
        (self.v1, self.v2)
    }
    fn is_live(&self) -> bool {
        self.live
    }
    fn heap_pos(&self) -> Option<usize> {
        self.pos
    }
    fn set_heap_pos(&mut self, pos: Option<usize>) {
        self.pos = pos;
    }
}

/// Counters reported by a simplification run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimplifyStats {
    pub inner_contractions: usize,
    pub border_contractions: usize,
    pub faces_removed: usize,
    pub vertices_removed: usize,
}

/// Simplify the partitioned mesh in place. The cluster labelling is kept
/// consistent (collapsed faces leave their clusters); call
/// [`Partition::reindexed`] afterwards for a dense mesh.
pub fn simplify_partition(
    partition: &mut Partition,
    config: &PartitionConfig,
) -> Result<SimplifyStats> {
    let mut simplifier = Simplifier::new(config);
    simplifier.init_quadrics(partition);
    simplifier.run_phase(partition, EdgeKind::Inner);
    simplifier.run_phase(partition, EdgeKind::Border);
    let stats = simplifier.stats;
    info!(
        inner = stats.inner_contractions,
        border = stats.border_contractions,
        faces_removed = stats.faces_removed,
        vertices_removed = stats.vertices_removed,
        "simplification finished"
    );
    Ok(stats)
}

/// Classify the edge (a, b) from its currently valid incident faces.
/// Non-manifold edges (more than two faces) are never simplified.
fn classify_edge(partition: &Partition, a: usize, b: usize) -> Option<EdgeKind> {
    let shared = shared_faces(partition, a, b);
    match shared.len() {
        1 => Some(EdgeKind::Border),
        2 => {
            let c0 = partition.mesh.faces[shared[0]].cluster_id;
            let c1 = partition.mesh.faces[shared[1]].cluster_id;
            if c0 == c1 && c0.is_some() {
                Some(EdgeKind::Inner)
            } else {
                Some(EdgeKind::Border)
            }
        }
        _ => None,
    }
}

/// Valid faces incident to both vertices.
fn shared_faces(partition: &Partition, a: usize, b: usize) -> Vec<usize> {
    partition.mesh.vertices[a]
        .nbr_faces
        .iter()
        .copied()
        .filter(|&f| partition.mesh.faces[f].is_valid && partition.mesh.face_contains(f, b))
        .collect()
}

struct Simplifier {
    face_coefficient: f64,
    point_coefficient: f64,
    cost_limit: f64,
    min_vertices: usize,
    /// Vertices on a cluster border or mesh boundary at init time; border
    /// membership never changes during a run.
    border_vertices: BTreeSet<usize>,
    edges: Vec<ContractEdge>,
    heap: MinHeap,
    /// Live record id per packed edge key
    edge_ids: BTreeMap<u64, usize>,
    valid_vertices: usize,
    stats: SimplifyStats,
}

impl Simplifier {
    fn new(config: &PartitionConfig) -> Self {
        Self {
            face_coefficient: config.face_coefficient,
            point_coefficient: config.point_coefficient,
            cost_limit: config.simplify_cost_limit,
            min_vertices: config.simplify_min_vertices,
            border_vertices: BTreeSet::new(),
            edges: Vec::new(),
            heap: MinHeap::new(),
            edge_ids: BTreeMap::new(),
            valid_vertices: 0,
            stats: SimplifyStats::default(),
        }
    }

    /// Accumulate face-plane quadrics on every vertex and find the border
    /// vertices, then add their constraint-plane quadrics.
    fn init_quadrics(&mut self, partition: &mut Partition) {
        self.valid_vertices = partition.mesh.valid_vertex_count();
        for v in &mut partition.mesh.vertices {
            v.quadric = Quadric::zero();
        }
        for fi in 0..partition.mesh.faces.len() {
            if !partition.mesh.faces[fi].is_valid {
                continue;
            }
            let Some(q) = self.face_plane_quadric(partition, fi) else {
                continue;
            };
            let idx = partition.mesh.faces[fi].indices;
            let cid = partition.mesh.faces[fi].cluster_id;
            for vi in idx {
                partition.mesh.vertices[vi].quadric += q;
                partition.mesh.vertices[vi].cluster_id = cid;
            }
        }

        // Border detection over all current edges.
        let mut border_pairs: Vec<(usize, usize)> = Vec::new();
        for a in 0..partition.mesh.vertices.len() {
            if !partition.mesh.vertices[a].is_valid {
                continue;
            }
            let nbrs: Vec<usize> = partition.mesh.vertices[a]
                .nbr_vertices
                .iter()
                .copied()
                .filter(|&b| b > a && partition.mesh.vertices[b].is_valid)
                .collect();
            for b in nbrs {
                if classify_edge(partition, a, b) == Some(EdgeKind::Border) {
                    self.border_vertices.insert(a);
                    self.border_vertices.insert(b);
                    border_pairs.push((a, b));
                }
            }
        }
        for (a, b) in border_pairs {
            if let Some(q) = self.border_constraint_quadric(partition, a, b) {
                partition.mesh.vertices[a].quadric += q;
                partition.mesh.vertices[b].quadric += q;
            }
        }
        debug!(
            border_vertices = self.border_vertices.len(),
            "initialized simplification quadrics"
        );
    }

    fn face_plane_quadric(&self, partition: &Partition, fi: usize) -> Option<Quadric> {
        let normal = partition.mesh.face_normal(fi)?;
        let p0 = partition.mesh.vertices[partition.mesh.faces[fi].indices[0]].point;
        Some(Quadric::from_point_normal(
            &p0,
            &normal,
            partition.mesh.faces[fi].area * self.face_coefficient,
        ))
    }

    /// Constraint plane through a border edge, perpendicular to the mean of
    /// the incident face normals, keeping contractions on the border.
    fn border_constraint_quadric(
        &self,
        partition: &Partition,
        a: usize,
        b: usize,
    ) -> Option<Quadric> {
        let shared = shared_faces(partition, a, b);
        let mut avg = Vector3::zeros();
        for &f in &shared {
            avg += partition.mesh.face_normal(f)?;
        }
        let len = avg.norm();
        if len <= f64::EPSILON {
            return None;
        }
        let avg = avg / len;
        let pa = partition.mesh.vertices[a].point;
        let pb = partition.mesh.vertices[b].point;
        let constraint = (pb - pa).cross(&avg);
        let clen = constraint.norm();
        if clen <= f64::EPSILON {
            return None;
        }
        Some(Quadric::from_point_normal(
            &pa,
            &(constraint / clen),
            self.point_coefficient,
        ))
    }

    /// Seed the heap with every current edge of the requested kind, then
    /// contract until the minimum cost exceeds the limit, the vertex floor
    /// is reached, or candidates run out.
    fn run_phase(&mut self, partition: &mut Partition, phase: EdgeKind) {
        self.edges.clear();
        self.heap = MinHeap::new();
        self.edge_ids.clear();
        for a in 0..partition.mesh.vertices.len() {
            if !partition.mesh.vertices[a].is_valid {
                continue;
            }
            let nbrs: Vec<usize> = partition.mesh.vertices[a]
                .nbr_vertices
                .iter()
                .copied()
                .filter(|&b| b > a && partition.mesh.vertices[b].is_valid)
                .collect();
            for b in nbrs {
                self.try_push_edge(partition, a, b, phase);
            }
        }
        debug!(phase = ?phase, candidates = self.heap.len(), "seeded contraction heap");

        let mut contractions = 0usize;
        while self.valid_vertices > self.min_vertices {
            let Some(id) = self.heap.pop(&mut self.edges) else {
                break;
            };
            self.edges[id].live = false;
            let edge = self.edges[id].clone();
            let key = edge_key(edge.v1, edge.v2);
            if self.edge_ids.get(&key) == Some(&id) {
                self.edge_ids.remove(&key);
            }
            if edge.cost > self.cost_limit {
                break;
            }
            if !self.check_contraction(partition, &edge, phase) {
                continue;
            }
            self.apply_contraction(partition, &edge, phase);
            contractions += 1;
        }
        debug!(phase = ?phase, contractions, "contraction phase finished");
    }

    /// Push a candidate for edge (a, b) if it matches the phase and its
    /// endpoints are admissible. Replaces any stale record for the edge.
    fn try_push_edge(&mut self, partition: &Partition, a: usize, b: usize, phase: EdgeKind) {
        let Some(kind) = classify_edge(partition, a, b) else {
            return;
        };
        if kind != phase {
            return;
        }
        let a_border = self.border_vertices.contains(&a);
        let b_border = self.border_vertices.contains(&b);
        // An inner edge with both endpoints on a border has no contraction
        // target that leaves both borders intact.
        if kind == EdgeKind::Inner && a_border && b_border {
            return;
        }
        let key = edge_key(a, b);
        self.kill_edge(key);

        let combined = partition.mesh.vertices[a].quadric + partition.mesh.vertices[b].quadric;
        let pa = partition.mesh.vertices[a].point;
        let pb = partition.mesh.vertices[b].point;
        // When one endpoint is pinned to a border, the contraction may only
        // collapse onto it.
        let target = if kind == EdgeKind::Inner && a_border {
            pa
        } else if kind == EdgeKind::Inner && b_border {
            pb
        } else {
            combined.optimal_point(&pa, &pb)
        };
        let cost = combined.eval(&target);
        let id = self.edges.len();
        self.edges.push(ContractEdge {
            v1: a.min(b),
            v2: a.max(b),
            kind,
            cost,
            target,
            live: true,
            pos: None,
        });
        self.heap.push(&mut self.edges, id);
        self.edge_ids.insert(key, id);
    }

    fn kill_edge(&mut self, key: u64) {
        if let Some(id) = self.edge_ids.remove(&key) {
            self.edges[id].live = false;
            self.heap.remove(&mut self.edges, id);
        }
    }

    /// Validity, manifoldness and orientation checks before a contraction.
    fn check_contraction(
        &self,
        partition: &Partition,
        edge: &ContractEdge,
        phase: EdgeKind,
    ) -> bool {
        let (v1, v2) = (edge.v1, edge.v2);
        if !partition.mesh.vertices[v1].is_valid || !partition.mesh.vertices[v2].is_valid {
            return false;
        }
        if !partition.mesh.vertices[v1].nbr_vertices.contains(&v2) {
            return false;
        }
        // Earlier contractions may have re-classified the edge.
        if classify_edge(partition, v1, v2) != Some(phase) {
            return false;
        }
        if phase == EdgeKind::Inner
            && self.border_vertices.contains(&v1)
            && self.border_vertices.contains(&v2)
        {
            return false;
        }
        let collapsing = shared_faces(partition, v1, v2);
        // The link condition: the endpoints' common neighbors must be
        // exactly the apices of the collapsing faces.
        if partition.mesh.common_neighbor_count(v1, v2) != collapsing.len() {
            return false;
        }
        !self.causes_flip(partition, v1, v2, &edge.target, &collapsing)
    }

    /// Would moving both endpoints to `target` flip or degenerate any
    /// surviving incident face?
    fn causes_flip(
        &self,
        partition: &Partition,
        v1: usize,
        v2: usize,
        target: &Point3<f64>,
        collapsing: &[usize],
    ) -> bool {
        let mut faces: BTreeSet<usize> = BTreeSet::new();
        faces.extend(partition.mesh.vertices[v1].nbr_faces.iter().copied());
        faces.extend(partition.mesh.vertices[v2].nbr_faces.iter().copied());
        for fi in faces {
            if !partition.mesh.faces[fi].is_valid || collapsing.contains(&fi) {
                continue;
            }
            let Some(before) = partition.mesh.face_normal(fi) else {
                continue;
            };
            let pts: Vec<Point3<f64>> = partition.mesh.faces[fi]
                .indices
                .iter()
                .map(|&vi| {
                    if vi == v1 || vi == v2 {
                        *target
                    } else {
                        partition.mesh.vertices[vi].point
                    }
                })
                .collect();
            let after = (pts[1] - pts[0]).cross(&(pts[2] - pts[0]));
            let len = after.norm();
            if len <= f64::EPSILON {
                return true; // contraction would degenerate this face
            }
            if before.dot(&(after / len)) <= 0.0 {
                return true;
            }
        }
        false
    }

    /// Contract the edge: the kept endpoint moves to the target point and
    /// inherits the other's incidences; the shared faces disappear; the
    /// neighborhood's adjacency, quadrics and heap entries are refreshed.
    fn apply_contraction(
        &mut self,
        partition: &mut Partition,
        edge: &ContractEdge,
        phase: EdgeKind,
    ) {
        // A border endpoint must keep its identity so its pin survives.
        let (keep, gone) = if self.border_vertices.contains(&edge.v2)
            && !self.border_vertices.contains(&edge.v1)
        {
            (edge.v2, edge.v1)
        } else {
            (edge.v1, edge.v2)
        };

        // Retire every queued candidate around both endpoints.
        for w in [keep, gone] {
            let nbrs: Vec<usize> = partition.mesh.vertices[w]
                .nbr_vertices
                .iter()
                .copied()
                .collect();
            for u in nbrs {
                self.kill_edge(edge_key(w, u));
            }
        }

        let collapsing = shared_faces(partition, keep, gone);
        for &fi in &collapsing {
            partition.remove_face(fi);
            self.stats.faces_removed += 1;
        }

        // Transfer the retired endpoint's surviving faces.
        let gone_faces: Vec<usize> = partition.mesh.vertices[gone]
            .nbr_faces
            .iter()
            .copied()
            .filter(|&f| partition.mesh.faces[f].is_valid)
            .collect();
        for &fi in &gone_faces {
            for slot in partition.mesh.faces[fi].indices.iter_mut() {
                if *slot == gone {
                    *slot = keep;
                }
            }
        }

        let mut affected: BTreeSet<usize> = BTreeSet::new();
        affected.extend(partition.mesh.vertices[keep].nbr_vertices.iter().copied());
        affected.extend(partition.mesh.vertices[gone].nbr_vertices.iter().copied());
        affected.insert(keep);
        affected.remove(&gone);

        partition.mesh.vertices[keep].point = edge.target;
        partition.mesh.vertices[keep].nbr_faces.extend(gone_faces);
        let moved_faces: Vec<usize> = partition.mesh.vertices[keep]
            .nbr_faces
            .iter()
            .copied()
            .filter(|&f| partition.mesh.faces[f].is_valid)
            .collect();
        for &fi in &moved_faces {
            partition.refresh_face_geometry(fi);
        }

        partition.mesh.vertices[gone].is_valid = false;
        partition.mesh.vertices[gone].nbr_faces.clear();
        partition.mesh.vertices[gone].nbr_vertices.clear();
        partition.mesh.vertices[gone].quadric = Quadric::zero();
        self.valid_vertices -= 1;
        self.stats.vertices_removed += 1;

        // Rebuild vertex adjacency of the neighborhood from surviving faces.
        for &w in &affected {
            let keep_faces: BTreeSet<usize> = partition.mesh.vertices[w]
                .nbr_faces
                .iter()
                .copied()
                .filter(|&f| {
                    partition.mesh.faces[f].is_valid && partition.mesh.face_contains(f, w)
                })
                .collect();
            let mut nbrs: BTreeSet<usize> = BTreeSet::new();
            for &f in &keep_faces {
                nbrs.extend(partition.mesh.faces[f].indices.iter().copied());
            }
            nbrs.remove(&w);
            let vertex = &mut partition.mesh.vertices[w];
            vertex.nbr_faces = keep_faces;
            vertex.nbr_vertices = nbrs;
            if vertex.nbr_faces.is_empty() && vertex.is_valid {
                vertex.is_valid = false;
                self.valid_vertices -= 1;
                self.stats.vertices_removed += 1;
            }
        }

        // Contraction fuses edges, so face-to-face adjacency around the
        // kept vertex must be recomputed from shared edges.
        for &fi in &moved_faces {
            let idx = partition.mesh.faces[fi].indices;
            let mut nbrs: BTreeSet<usize> = BTreeSet::new();
            for k in 0..3 {
                let (a, b) = (idx[k], idx[(k + 1) % 3]);
                for g in shared_faces(partition, a, b) {
                    if g != fi {
                        nbrs.insert(g);
                    }
                }
            }
            for &g in &nbrs {
                partition.mesh.faces[g].nbr_faces.insert(fi);
            }
            let dropped: Vec<usize> = partition.mesh.faces[fi]
                .nbr_faces
                .difference(&nbrs)
                .copied()
                .collect();
            for g in dropped {
                partition.mesh.faces[g].nbr_faces.remove(&fi);
            }
            partition.mesh.faces[fi].nbr_faces = nbrs;
        }
        for &fi in &collapsing {
            let old: Vec<usize> = partition.mesh.faces[fi].nbr_faces.iter().copied().collect();
            for g in old {
                partition.mesh.faces[g].nbr_faces.remove(&fi);
            }
            partition.mesh.faces[fi].nbr_faces.clear();
        }

        // The dual graph may have gained or lost links with the fused edges.
        let mut cluster_region: BTreeSet<usize> = BTreeSet::new();
        for &fi in &moved_faces {
            if let Some(cid) = partition.mesh.faces[fi].cluster_id {
                cluster_region.insert(cid);
                cluster_region.extend(partition.clusters[cid].nbr_clusters.iter().copied());
            }
        }
        for cid in cluster_region {
            partition.rebuild_cluster_neighbors(cid);
        }

        // Quadrics of the whole neighborhood changed with the geometry.
        for &w in &affected {
            if partition.mesh.vertices[w].is_valid {
                self.recompute_vertex_quadric(partition, w);
            }
        }

        // Fresh candidates around the contracted vertex.
        let nbrs: Vec<usize> = partition.mesh.vertices[keep]
            .nbr_vertices
            .iter()
            .copied()
            .collect();
        for u in nbrs {
            if partition.mesh.vertices[u].is_valid {
                self.try_push_edge(partition, keep, u, phase);
            }
        }

        match phase {
            EdgeKind::Inner => self.stats.inner_contractions += 1,
            EdgeKind::Border => self.stats.border_contractions += 1,
        }
    }

    fn recompute_vertex_quadric(&self, partition: &mut Partition, w: usize) {
        let mut q = Quadric::zero();
        let faces: Vec<usize> = partition.mesh.vertices[w]
            .nbr_faces
            .iter()
            .copied()
            .filter(|&f| partition.mesh.faces[f].is_valid)
            .collect();
        for fi in faces {
            if let Some(fq) = self.face_plane_quadric(partition, fi) {
                q += fq;
            }
        }
        if self.border_vertices.contains(&w) {
            let nbrs: Vec<usize> = partition.mesh.vertices[w]
                .nbr_vertices
                .iter()
                .copied()
                .collect();
            for u in nbrs {
                if classify_edge(partition, w, u) == Some(EdgeKind::Border) {
                    if let Some(cq) = self.border_constraint_quadric(partition, w, u) {
                        q += cq;
                    }
                }
            }
        }
        partition.mesh.vertices[w].quadric = q;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planemesh_core::{SurfaceMesh, TriangleMesh};

    fn build_partition(
        vertices: Vec<Point3<f64>>,
        faces: Vec<[usize; 3]>,
        labels: &[usize],
    ) -> Partition {
        let mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
        Partition::from_labels(SurfaceMesh::build(&mesh).unwrap(), labels).unwrap()
    }

    /// A flat fan: a center vertex surrounded by a ring, all in one cluster.
    fn flat_fan(ring: usize) -> Partition {
        let mut vertices = vec![Point3::new(0.0, 0.0, 0.0)];
        for k in 0..ring {
            let angle = 2.0 * std::f64::consts::PI * k as f64 / ring as f64;
            vertices.push(Point3::new(angle.cos(), angle.sin(), 0.0));
        }
        let mut faces = Vec::new();
        for k in 0..ring {
            faces.push([0, 1 + k, 1 + (k + 1) % ring]);
        }
        let labels = vec![0; ring];
        build_partition(vertices, faces, &labels)
    }

    fn config(cost_limit: f64) -> PartitionConfig {
        PartitionConfig {
            simplify_cost_limit: cost_limit,
            simplify_min_vertices: 0,
            face_coefficient: 1.0,
            point_coefficient: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_edge_classification() {
        // Two coplanar triangles in one cluster: the diagonal is inner,
        // the outer edges are borders (mesh boundary).
        let p = build_partition(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [1, 3, 2]],
            &[0, 0],
        );
        assert_eq!(classify_edge(&p, 1, 2), Some(EdgeKind::Inner));
        assert_eq!(classify_edge(&p, 0, 1), Some(EdgeKind::Border));
        // Split the labels: the diagonal becomes a border too.
        let p2 = build_partition(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [1, 3, 2]],
            &[0, 1],
        );
        assert_eq!(classify_edge(&p2, 1, 2), Some(EdgeKind::Border));
    }

    #[test]
    fn test_flat_fan_loses_interior_vertex_keeps_boundary() {
        let mut p = flat_fan(8);
        assert_eq!(p.mesh.valid_vertex_count(), 9);
        let stats = simplify_partition(&mut p, &config(1e-2)).unwrap();
        // The center vertex is interior to the single cluster and coplanar
        // with its ring: free to contract. Ring vertices are boundary.
        assert!(stats.inner_contractions >= 1);
        assert!(!p.mesh.vertices[0].is_valid);
        for v in 1..=8 {
            assert!(p.mesh.vertices[v].is_valid, "ring vertex {} removed", v);
        }
        p.audit().unwrap();
    }

    #[test]
    fn test_boundary_of_disk_is_preserved() {
        // A disk triangulation: the interior simplifies away, the circular
        // boundary survives because off-border contractions are costly.
        let mut p = flat_fan(12);
        let boundary_before: Vec<Point3<f64>> =
            (1..=12).map(|v| p.mesh.vertices[v].point).collect();
        simplify_partition(&mut p, &config(1e-3)).unwrap();
        for (k, before) in boundary_before.iter().enumerate() {
            let v = 1 + k;
            assert!(p.mesh.vertices[v].is_valid);
            assert!((p.mesh.vertices[v].point - before).norm() < 1e-12);
        }
        p.audit().unwrap();
    }

    #[test]
    fn test_no_flipped_faces_after_simplification() {
        let mut p = flat_fan(8);
        let normals_before: Vec<_> = (0..p.mesh.faces.len())
            .map(|f| p.mesh.face_normal(f))
            .collect();
        simplify_partition(&mut p, &config(1e-2)).unwrap();
        for (fi, face) in p.mesh.faces.iter().enumerate() {
            if !face.is_valid {
                continue;
            }
            let (Some(before), Some(after)) = (normals_before[fi], p.mesh.face_normal(fi)) else {
                continue;
            };
            assert!(
                before.dot(&after) > 0.0,
                "face {} flipped during simplification",
                fi
            );
        }
    }

    #[test]
    fn test_cost_limit_blocks_curved_contractions() {
        // A pyramid-like fan (center lifted): every contraction has real
        // cost, so a tiny limit blocks all of them.
        let mut vertices = vec![Point3::new(0.0, 0.0, 0.5)];
        for k in 0..6 {
            let angle = 2.0 * std::f64::consts::PI * k as f64 / 6.0;
            vertices.push(Point3::new(angle.cos(), angle.sin(), 0.0));
        }
        let mut faces = Vec::new();
        for k in 0..6 {
            faces.push([0, 1 + k, 1 + (k + 1) % 6]);
        }
        let mut p = build_partition(vertices, faces, &vec![0; 6]);
        let stats = simplify_partition(&mut p, &config(1e-9)).unwrap();
        assert_eq!(stats.inner_contractions + stats.border_contractions, 0);
        assert_eq!(p.mesh.valid_vertex_count(), 7);
    }

    #[test]
    fn test_vertex_floor_stops_simplification() {
        let mut p = flat_fan(8);
        let cfg = PartitionConfig {
            simplify_cost_limit: 1e-2,
            simplify_min_vertices: 9, // everything present, nothing may go
            ..Default::default()
        };
        let stats = simplify_partition(&mut p, &cfg).unwrap();
        assert_eq!(stats.vertices_removed, 0);
        assert_eq!(p.mesh.valid_vertex_count(), 9);
    }

    #[test]
    fn test_cluster_bookkeeping_survives_contraction() {
        let mut p = flat_fan(8);
        let faces_before = p.mesh.valid_face_count();
        let stats = simplify_partition(&mut p, &config(1e-2)).unwrap();
        assert_eq!(
            p.mesh.valid_face_count(),
            faces_before - stats.faces_removed
        );
        p.audit().unwrap();
        let dense = p.reindexed().unwrap();
        dense.audit().unwrap();
    }

    #[test]
    fn test_cluster_border_edges_are_protected() {
        // A flat strip of four triangles split into two clusters; their
        // shared border runs across the middle. Inner candidates touching
        // the border must leave it unchanged.
        let mut p = build_partition(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(2.0, 1.0, 0.0),
            ],
            vec![[0, 1, 3], [1, 4, 3], [1, 2, 4], [2, 5, 4]],
            &[0, 0, 1, 1],
        );
        let border_before: Vec<Point3<f64>> =
            vec![p.mesh.vertices[1].point, p.mesh.vertices[4].point];
        simplify_partition(&mut p, &config(1e-3)).unwrap();
        // Vertices 1 and 4 carry the cluster border; they may not move.
        assert!(p.mesh.vertices[1].is_valid);
        assert!(p.mesh.vertices[4].is_valid);
        assert!((p.mesh.vertices[1].point - border_before[0]).norm() < 1e-12);
        assert!((p.mesh.vertices[4].point - border_before[1]).norm() < 1e-12);
        p.audit().unwrap();
    }
}

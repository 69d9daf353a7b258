//! Mesh data structures: the plain triangle mesh exchanged with I/O, and
//! the adjacency-rich surface mesh the partitioning stages operate on.

use crate::covariance::{triangle_area, CovAccum};
use crate::error::{Error, Result};
use crate::quadric::Quadric;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A triangle mesh with vertices and faces
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<[usize; 3]>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }
}

/// Pack an unordered vertex pair into a 64-bit edge key: `(min << 32) | max`.
#[inline]
pub fn edge_key(v1: usize, v2: usize) -> u64 {
    let (lo, hi) = if v1 < v2 { (v1, v2) } else { (v2, v1) };
    ((lo as u64) << 32) | hi as u64
}

/// Recover the (min, max) endpoints of an edge key.
#[inline]
pub fn edge_endpoints(key: u64) -> (usize, usize) {
    ((key >> 32) as usize, (key & 0xffff_ffff) as usize)
}

/// Mesh vertex with adjacency and an accumulated error quadric.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub point: Point3<f64>,
    /// false once every incident face has been removed
    pub is_valid: bool,
    pub cluster_id: Option<usize>,
    pub nbr_vertices: BTreeSet<usize>,
    pub nbr_faces: BTreeSet<usize>,
    pub quadric: Quadric,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            point: Point3::origin(),
            is_valid: false,
            cluster_id: None,
            nbr_vertices: BTreeSet::new(),
            nbr_faces: BTreeSet::new(),
            quadric: Quadric::default(),
        }
    }
}

/// Mesh face with cached geometry and adjacency.
#[derive(Debug, Clone)]
pub struct Face {
    pub indices: [usize; 3],
    pub area: f64,
    pub cluster_id: Option<usize>,
    pub cov: CovAccum,
    /// Faces sharing one of this face's three edges
    pub nbr_faces: BTreeSet<usize>,
    pub is_valid: bool,
    /// Scratch flag for breadth-first traversals
    pub is_visited: bool,
}

/// A triangle mesh with full connectivity: per-vertex and per-face
/// adjacency sets, per-face covariance, and an edge → incident-faces index
/// keyed by packed edge keys. Entities are only ever marked invalid, never
/// removed, until [`SurfaceMesh::compact`] re-indexes the survivors.
#[derive(Debug, Clone, Default)]
pub struct SurfaceMesh {
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
    pub edge_faces: BTreeMap<u64, Vec<usize>>,
    /// Zero-area or repeated-index faces skipped at build time
    pub degenerate_face_count: usize,
    /// Exact duplicate faces dropped at build time
    pub duplicate_face_count: usize,
}

impl SurfaceMesh {
    /// Build connectivity from a plain mesh.
    ///
    /// Out-of-range vertex indices are fatal. Degenerate faces (repeated
    /// indices or zero area) and duplicate faces are kept in the array as
    /// invalid entries so face ids remain stable, but contribute nothing.
    pub fn build(mesh: &TriangleMesh) -> Result<Self> {
        let nv = mesh.vertex_count();
        let mut vertices: Vec<Vertex> = mesh
            .vertices
            .iter()
            .map(|&point| Vertex {
                point,
                ..Vertex::default()
            })
            .collect();
        let mut faces = Vec::with_capacity(mesh.face_count());
        let mut edge_faces: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        let mut seen: BTreeSet<[usize; 3]> = BTreeSet::new();
        let mut degenerate = 0usize;
        let mut duplicates = 0usize;

        for (fi, &idx) in mesh.faces.iter().enumerate() {
            for &vi in &idx {
                if vi >= nv {
                    return Err(Error::InvalidData(format!(
                        "face {} references vertex {} out of range ({} vertices)",
                        fi, vi, nv
                    )));
                }
            }
            let mut sorted = idx;
            sorted.sort_unstable();
            let mut face = Face {
                indices: idx,
                area: 0.0,
                cluster_id: None,
                cov: CovAccum::new(),
                nbr_faces: BTreeSet::new(),
                is_valid: false,
                is_visited: false,
            };
            if sorted[0] == sorted[1] || sorted[1] == sorted[2] {
                degenerate += 1;
                faces.push(face);
                continue;
            }
            if !seen.insert(sorted) {
                duplicates += 1;
                faces.push(face);
                continue;
            }
            let [p0, p1, p2] = [
                mesh.vertices[idx[0]],
                mesh.vertices[idx[1]],
                mesh.vertices[idx[2]],
            ];
            let area = triangle_area(&p0, &p1, &p2);
            if area <= f64::EPSILON {
                degenerate += 1;
                faces.push(face);
                continue;
            }
            face.area = area;
            face.cov = CovAccum::from_triangle(&p0, &p1, &p2);
            face.is_valid = true;

            for k in 0..3 {
                let a = idx[k];
                let b = idx[(k + 1) % 3];
                edge_faces.entry(edge_key(a, b)).or_default().push(fi);
                vertices[a].nbr_vertices.insert(b);
                vertices[b].nbr_vertices.insert(a);
            }
            for &vi in &idx {
                vertices[vi].is_valid = true;
                vertices[vi].nbr_faces.insert(fi);
            }
            faces.push(face);
        }

        for incident in edge_faces.values() {
            for &fa in incident {
                for &fb in incident {
                    if fa != fb {
                        faces[fa].nbr_faces.insert(fb);
                    }
                }
            }
        }

        Ok(Self {
            vertices,
            faces,
            edge_faces,
            degenerate_face_count: degenerate,
            duplicate_face_count: duplicates,
        })
    }

    pub fn valid_face_count(&self) -> usize {
        self.faces.iter().filter(|f| f.is_valid).count()
    }

    pub fn valid_vertex_count(&self) -> usize {
        self.vertices.iter().filter(|v| v.is_valid).count()
    }

    pub fn face_points(&self, f: usize) -> [Point3<f64>; 3] {
        let idx = self.faces[f].indices;
        [
            self.vertices[idx[0]].point,
            self.vertices[idx[1]].point,
            self.vertices[idx[2]].point,
        ]
    }

    /// Unit normal of a face, following its winding order. None if the
    /// triangle is currently degenerate.
    pub fn face_normal(&self, f: usize) -> Option<Vector3<f64>> {
        let [p0, p1, p2] = self.face_points(f);
        let n = (p1 - p0).cross(&(p2 - p0));
        let len = n.norm();
        if len <= f64::EPSILON {
            return None;
        }
        Some(n / len)
    }

    pub fn face_contains(&self, f: usize, v: usize) -> bool {
        self.faces[f].indices.contains(&v)
    }

    /// A mesh-border edge has exactly one incident face.
    pub fn is_border_edge(&self, key: u64) -> bool {
        self.edge_faces.get(&key).map_or(false, |fs| fs.len() == 1)
    }

    /// Number of valid vertices adjacent to both endpoints.
    pub fn common_neighbor_count(&self, v1: usize, v2: usize) -> usize {
        self.vertices[v1]
            .nbr_vertices
            .intersection(&self.vertices[v2].nbr_vertices)
            .filter(|&&v| self.vertices[v].is_valid)
            .count()
    }

    /// Re-index surviving vertices and faces into a dense mesh. Returns the
    /// compact mesh plus old → new maps for vertices and faces.
    pub fn compact(&self) -> (TriangleMesh, Vec<Option<usize>>, Vec<Option<usize>>) {
        let mut vertex_map = vec![None; self.vertices.len()];
        let mut face_map = vec![None; self.faces.len()];
        let mut out = TriangleMesh::new();

        for (fi, face) in self.faces.iter().enumerate() {
            if !face.is_valid {
                continue;
            }
            let mut mapped = [0usize; 3];
            for (k, &vi) in face.indices.iter().enumerate() {
                let new = match vertex_map[vi] {
                    Some(n) => n,
                    None => {
                        let n = out.vertices.len();
                        out.vertices.push(self.vertices[vi].point);
                        vertex_map[vi] = Some(n);
                        n
                    }
                };
                mapped[k] = new;
            }
            face_map[fi] = Some(out.faces.len());
            out.faces.push(mapped);
        }
        (out, vertex_map, face_map)
    }
}

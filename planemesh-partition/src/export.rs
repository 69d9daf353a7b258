//! PLY export of a labelled partition.

use crate::partition::Partition;
use planemesh_core::{Result, TriangleMesh, Vector3};
use planemesh_io::ply::{PlyWriteOptions, PlyWriter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write the surviving mesh with one RGB color per face, derived
/// deterministically from the face's cluster label.
pub fn write_colored_ply<P: AsRef<Path>>(partition: &Partition, path: P) -> Result<()> {
    let (dense, _vmap, fmap) = partition.mesh.compact();
    let mut colors = vec![[128u8; 3]; dense.face_count()];
    for (fi, face) in partition.mesh.faces.iter().enumerate() {
        let Some(new_fi) = fmap[fi] else { continue };
        if let Some(cid) = face.cluster_id {
            colors[new_fi] = Partition::cluster_color(partition.clusters[cid].original_id);
        }
    }
    let options = PlyWriteOptions::binary_little_endian().with_face_colors(colors);
    PlyWriter::write_mesh_with(&dense, path, &options)
}

/// Write one PLY per cluster whose area reaches `min_area`, largest first.
/// Cluster normals are oriented so they point along `gravity` (faces are
/// re-wound when the fitted normal opposes it). Returns the written paths.
pub fn write_top_cluster_plys<P: AsRef<Path>>(
    partition: &Partition,
    base: P,
    min_area: f64,
    gravity: Vector3<f64>,
) -> Result<Vec<PathBuf>> {
    let base = base.as_ref();
    let mut written = Vec::new();
    for (rank, cid) in partition.clusters_by_area().into_iter().enumerate() {
        let cluster = &partition.clusters[cid];
        if cluster.area() < min_area {
            break; // sorted by descending area
        }
        // The fitted plane normal has an arbitrary sign; orient using the
        // winding-consistent average of the member face normals.
        let mut avg_normal = Vector3::zeros();
        for &fi in &cluster.faces {
            if let Some(n) = partition.mesh.face_normal(fi) {
                avg_normal += n * partition.mesh.faces[fi].area;
            }
        }
        let flip = avg_normal.dot(&gravity) < 0.0;

        let mut local: BTreeMap<usize, usize> = BTreeMap::new();
        let mut submesh = TriangleMesh::new();
        for &fi in &cluster.faces {
            let idx = partition.mesh.faces[fi].indices;
            let mut mapped = [0usize; 3];
            for (k, &vi) in idx.iter().enumerate() {
                let new = match local.get(&vi) {
                    Some(&n) => n,
                    None => {
                        let n = submesh.vertices.len();
                        submesh.vertices.push(partition.mesh.vertices[vi].point);
                        local.insert(vi, n);
                        n
                    }
                };
                mapped[k] = new;
            }
            if flip {
                mapped.swap(1, 2);
            }
            submesh.faces.push(mapped);
        }

        let path = numbered_path(base, rank);
        PlyWriter::write_mesh_with(&submesh, &path, &PlyWriteOptions::binary_little_endian())?;
        written.push(path);
    }
    info!(count = written.len(), "wrote per-cluster meshes");
    Ok(written)
}

fn numbered_path(base: &Path, rank: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cluster");
    let name = format!("{}_{}.ply", stem, rank);
    match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

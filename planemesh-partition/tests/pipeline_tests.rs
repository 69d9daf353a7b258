//! End-to-end pipeline tests: partitioning, persistence, and export.

use planemesh_core::{Point3, SurfaceMesh, TriangleMesh, Vector3};
use planemesh_io::cluster::{read_cluster_file, write_cluster_file};
use planemesh_io::ply::PlyReader;
use planemesh_io::MeshReader;
use planemesh_partition::{
    run_partition_pipeline, write_colored_ply, write_top_cluster_plys, Partition, PartitionConfig,
};
use std::collections::HashMap;
use tempfile::tempdir;

/// A gabled roof: two 4×4 rectangular slopes meeting at a ridge.
fn roof_mesh() -> TriangleMesh {
    let size = 5usize;
    let mut vertices = Vec::new();
    for y in 0..size {
        for x in 0..size {
            let fx = x as f64;
            vertices.push(Point3::new(fx, y as f64, 2.0 - (fx - 2.0).abs()));
        }
    }
    let mut faces = Vec::new();
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = y * size + x;
            let tr = tl + 1;
            let bl = (y + 1) * size + x;
            let br = bl + 1;
            faces.push([tl, bl, tr]);
            faces.push([tr, bl, br]);
        }
    }
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}

fn roof_partition() -> Partition {
    let config = PartitionConfig {
        target_cluster_num: 2,
        min_cluster_area: 0.0,
        ..Default::default()
    };
    run_partition_pipeline(SurfaceMesh::build(&roof_mesh()).unwrap(), &config).unwrap()
}

/// Two labelings describe the same partition iff the label map is a
/// bijection on faces.
fn same_partition(a: &[usize], b: &[usize]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut fwd: HashMap<usize, usize> = HashMap::new();
    let mut bwd: HashMap<usize, usize> = HashMap::new();
    for (&x, &y) in a.iter().zip(b) {
        if *fwd.entry(x).or_insert(y) != y || *bwd.entry(y).or_insert(x) != x {
            return false;
        }
    }
    true
}

#[test]
fn test_pipeline_splits_roof_into_two_planes() {
    let p = roof_partition();
    assert_eq!(p.live_cluster_count(), 2);
    assert!(p.total_energy() < 1e-9);
    p.audit().unwrap();
}

#[test]
fn test_cluster_file_roundtrip_restores_partition() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("roof-clusters.txt");
    let p = roof_partition();
    let labels = p.labels();
    write_cluster_file(&path, p.live_cluster_count(), &labels).unwrap();

    let restored = read_cluster_file(&path).unwrap();
    assert_eq!(restored.cluster_count, 2);
    let q = Partition::from_labels(SurfaceMesh::build(&roof_mesh()).unwrap(), &restored.labels)
        .unwrap();
    q.audit().unwrap();
    assert!(same_partition(&labels, &q.labels()));
    // The restored partition carries the same per-cluster energies.
    assert!((p.total_energy() - q.total_energy()).abs() < 1e-9);
}

#[test]
fn test_colored_export_roundtrips_geometry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("roof-colored.ply");
    let p = roof_partition();
    write_colored_ply(&p, &path).unwrap();
    let loaded = PlyReader::read_mesh(&path).unwrap();
    assert_eq!(loaded.vertex_count(), p.mesh.valid_vertex_count());
    assert_eq!(loaded.face_count(), p.mesh.valid_face_count());
}

#[test]
fn test_top_cluster_export_writes_both_slopes() {
    let dir = tempdir().unwrap();
    let p = roof_partition();
    let written =
        write_top_cluster_plys(&p, dir.path().join("roof"), 1.0, Vector3::z()).unwrap();
    assert_eq!(written.len(), 2);
    for path in &written {
        let slope = PlyReader::read_mesh(path).unwrap();
        assert_eq!(slope.face_count(), 16);
    }
}

#[test]
fn test_pipeline_is_deterministic() {
    let labels_a = roof_partition().labels();
    let labels_b = roof_partition().labels();
    assert_eq!(labels_a, labels_b);
}

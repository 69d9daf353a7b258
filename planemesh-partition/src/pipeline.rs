//! The partitioning pipeline: merge → swap → post-process.

use crate::config::PartitionConfig;
use crate::merger::Merger;
use crate::partition::Partition;
use crate::postprocess;
use crate::swapper::Swapper;
use planemesh_core::{Result, SurfaceMesh};
use tracing::{info, warn};

/// Partition a freshly built surface mesh down to the configured cluster
/// count, refine the boundaries, and (optionally) clean up and re-index.
pub fn run_partition_pipeline(mesh: SurfaceMesh, config: &PartitionConfig) -> Result<Partition> {
    if mesh.degenerate_face_count > 0 || mesh.duplicate_face_count > 0 {
        warn!(
            degenerate = mesh.degenerate_face_count,
            duplicate = mesh.duplicate_face_count,
            "skipped unusable faces at load"
        );
    }
    info!(
        vertices = mesh.valid_vertex_count(),
        faces = mesh.valid_face_count(),
        target = config.target_cluster_num,
        "starting mesh partition"
    );

    let mut partition = Partition::new(mesh);
    let mut merger = Merger::new(&partition);
    merger.run(&mut partition, config.target_cluster_num);

    let swapper = Swapper::from_config(config);
    swapper.run(&mut partition);

    if config.run_post_processing {
        partition = postprocess::run_post_processing(partition, config)?;
    }
    partition.audit()?;
    info!(
        clusters = partition.live_cluster_count(),
        energy = partition.total_energy(),
        "partition pipeline finished"
    );
    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use planemesh_core::{Point3, TriangleMesh};

    fn plane_grid(size: usize) -> SurfaceMesh {
        let mut vertices = Vec::new();
        for y in 0..size {
            for x in 0..size {
                vertices.push(Point3::new(x as f64, y as f64, 0.0));
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
        SurfaceMesh::build(&TriangleMesh::from_vertices_and_faces(vertices, faces)).unwrap()
    }

    #[test]
    fn test_flat_grid_partitions_to_one_zero_energy_cluster() {
        let config = PartitionConfig {
            target_cluster_num: 1,
            min_cluster_area: 0.0,
            ..Default::default()
        };
        let p = run_partition_pipeline(plane_grid(5), &config).unwrap();
        assert_eq!(p.live_cluster_count(), 1);
        assert!(p.total_energy() < 1e-9);
        assert_eq!(p.mesh.valid_face_count(), 32);
    }

    #[test]
    fn test_target_above_face_count_means_no_merging() {
        let config = PartitionConfig {
            target_cluster_num: 1000,
            run_post_processing: false,
            min_cluster_area: 0.0,
            ..Default::default()
        };
        let p = run_partition_pipeline(plane_grid(3), &config).unwrap();
        assert_eq!(p.live_cluster_count(), 8);
        assert_eq!(p.total_energy(), 0.0);
    }

    #[test]
    fn test_post_processing_merges_coplanar_remainder() {
        // Ask for 4 clusters on a flat grid; the coplanar merge pass should
        // collapse them into one.
        let config = PartitionConfig {
            target_cluster_num: 4,
            min_cluster_area: 0.0,
            ..Default::default()
        };
        let p = run_partition_pipeline(plane_grid(5), &config).unwrap();
        assert_eq!(p.live_cluster_count(), 1);
    }

    #[test]
    fn test_roof_mesh_finds_its_two_planes() {
        // A gable: two rectangular slopes meeting at a ridge.
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        let size = 5usize;
        for y in 0..size {
            for x in 0..size {
                let fx = x as f64;
                let z = 2.0 - (fx - 2.0).abs(); // peak at x = 2
                vertices.push(Point3::new(fx, y as f64, z));
            }
        }
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
        let mesh =
            SurfaceMesh::build(&TriangleMesh::from_vertices_and_faces(vertices, faces)).unwrap();
        let config = PartitionConfig {
            target_cluster_num: 2,
            min_cluster_area: 0.0,
            ..Default::default()
        };
        let p = run_partition_pipeline(mesh, &config).unwrap();
        assert_eq!(p.live_cluster_count(), 2);
        assert!(p.total_energy() < 1e-9);
        // Every face left of the ridge is in one cluster, right in the other.
        let left = p.mesh.faces[0].cluster_id;
        for (fi, face) in p.mesh.faces.iter().enumerate() {
            let centroid_x: f64 = face
                .indices
                .iter()
                .map(|&v| p.mesh.vertices[v].point.x)
                .sum::<f64>()
                / 3.0;
            if centroid_x < 2.0 {
                assert_eq!(face.cluster_id, left, "face {} on wrong side", fi);
            } else {
                assert_ne!(face.cluster_id, left, "face {} on wrong side", fi);
            }
        }
    }
}

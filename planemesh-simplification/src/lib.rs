//! QEM simplification of labelled planar partitions
//!
//! Contracts low-cost edges of a partitioned mesh: first the edges interior
//! to a cluster, then the edges on cluster borders (with constraint planes
//! holding the borders in place). Also provides the convenience entry point
//! running partitioning and simplification back to back.

pub mod simplify;

pub use simplify::{simplify_partition, SimplifyStats};

use planemesh_core::{Result, SurfaceMesh};
use planemesh_partition::{run_partition_pipeline, Partition, PartitionConfig};

/// Partition a mesh and, when enabled, simplify the labelled result.
pub fn run_full_pipeline(mesh: SurfaceMesh, config: &PartitionConfig) -> Result<Partition> {
    let mut partition = run_partition_pipeline(mesh, config)?;
    if config.run_mesh_simplification {
        simplify::simplify_partition(&mut partition, config)?;
    }
    Ok(partition)
}

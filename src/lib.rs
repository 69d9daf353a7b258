//! # planemesh
//!
//! Variational planar partitioning and QEM simplification for triangle
//! meshes.
//!
//! This is the umbrella crate that provides convenient access to all
//! planemesh functionality. You can use this crate to get everything in one
//! place, or use individual crates for more granular control over
//! dependencies.
//!
//! ## Pipeline
//!
//! - **Core**: mesh connectivity, covariance accumulators, QEM quadrics,
//!   the indexed heap
//! - **Partition**: cluster merging, boundary swapping, post-processing
//! - **Simplification**: inner/border QEM edge contraction
//! - **I/O**: PLY meshes and cluster assignment files
//!
//! ## Quick Start
//!
//! ```no_run
//! use planemesh::prelude::*;
//!
//! let mesh = read_mesh("scene.ply")?;
//! let surface = SurfaceMesh::build(&mesh)?;
//! let config = PartitionConfig::with_target(200);
//! let partition = run_full_pipeline(surface, &config)?;
//! write_colored_ply(&partition, "scene-clusters.ply")?;
//! # Ok::<(), planemesh::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: enables `io`, `partition`, and `simplification`
//! - `io`: PLY and cluster-file support
//! - `partition`: the partitioning pipeline
//! - `simplification`: QEM simplification of labelled partitions
//! - `all`: everything

// Re-export core functionality
pub use planemesh_core::*;

// Re-export sub-crates
#[cfg(feature = "io")]
pub use planemesh_io as io;

#[cfg(feature = "partition")]
pub use planemesh_partition as partition;

#[cfg(feature = "simplification")]
pub use planemesh_simplification as simplification;

/// Convenient imports for common use cases
pub mod prelude {
    pub use planemesh_core::*;

    #[cfg(feature = "io")]
    pub use planemesh_io::*;

    #[cfg(feature = "partition")]
    pub use planemesh_partition::*;

    #[cfg(feature = "simplification")]
    pub use planemesh_simplification::*;
}

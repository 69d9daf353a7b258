//! Variational planar partitioning of triangle meshes
//!
//! This crate groups the faces of a triangle mesh into nearly-planar
//! clusters:
//! - greedy best-first merging of adjacent clusters under a planar-fit
//!   energy, from one-cluster-per-face down to a target count;
//! - boundary refinement that swaps individual faces between neighboring
//!   clusters whenever that lowers the total energy;
//! - post-processing that removes tiny clusters, merges coplanar neighbors,
//!   reattaches islands, and re-indexes the mesh densely.

pub mod config;
pub mod export;
pub mod merger;
pub mod partition;
pub mod pipeline;
pub mod postprocess;
pub mod swapper;

pub use config::PartitionConfig;
pub use export::{write_colored_ply, write_top_cluster_plys};
pub use merger::Merger;
pub use partition::{Cluster, Partition, SwapFace};
pub use pipeline::run_partition_pipeline;
pub use swapper::Swapper;

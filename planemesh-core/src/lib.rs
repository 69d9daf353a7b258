//! Core data structures for planemesh
//!
//! This crate provides the building blocks shared by the partitioning and
//! simplification stages: the triangle mesh and its connectivity, the
//! area-weighted covariance accumulator behind the planar-fit energy, QEM
//! quadrics, and the indexed min-heap that schedules merge and contraction
//! candidates.

pub mod covariance;
pub mod error;
pub mod heap;
pub mod mesh;
pub mod quadric;

pub use covariance::{smallest_eigenvalue, triangle_area, CovAccum};
pub use error::{Error, Result};
pub use heap::{HeapItem, MinHeap};
pub use mesh::{edge_endpoints, edge_key, Face, SurfaceMesh, TriangleMesh, Vertex};
pub use quadric::Quadric;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

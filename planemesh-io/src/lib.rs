//! I/O operations for planemesh
//!
//! Reading and writing of triangle meshes in the PLY format (ascii and
//! binary, both endiannesses) and of the plain-text cluster assignment
//! files used to persist and restore a partition.

pub mod cluster;
pub mod ply;

pub use cluster::{read_cluster_file, write_cluster_file, ClusterAssignment};
pub use ply::{PlyFormat, PlyReader, PlyWriteOptions, PlyWriter};

use planemesh_core::{Error, Result, TriangleMesh};
use std::path::Path;

/// Trait for reading meshes from files
pub trait MeshReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh>;
}

/// Trait for writing meshes to files
pub trait MeshWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()>;
}

/// Auto-detect format and read mesh
pub fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    match path.extension().and_then(|s| s.to_str()) {
        Some("ply") => PlyReader::read_mesh(path),
        other => Err(Error::UnsupportedFormat(format!(
            "unsupported mesh format: {:?}",
            other
        ))),
    }
}

/// Auto-detect format and write mesh
pub fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match path.extension().and_then(|s| s.to_str()) {
        Some("ply") => PlyWriter::write_mesh(mesh, path),
        other => Err(Error::UnsupportedFormat(format!(
            "unsupported mesh format: {:?}",
            other
        ))),
    }
}

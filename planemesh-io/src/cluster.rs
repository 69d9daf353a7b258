//! Cluster assignment files
//!
//! Plain-text persistence of a face → cluster labelling:
//!
//! ```text
//! <cluster_count>
//! <face_count>
//! <cid_0>
//! <cid_1>
//! ...
//! ```

use planemesh_core::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A face → cluster labelling restored from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignment {
    pub cluster_count: usize,
    /// Cluster id of face i
    pub labels: Vec<usize>,
}

/// Write a cluster assignment file.
pub fn write_cluster_file<P: AsRef<Path>>(
    path: P,
    cluster_count: usize,
    labels: &[usize],
) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", cluster_count)?;
    writeln!(writer, "{}", labels.len())?;
    for &cid in labels {
        writeln!(writer, "{}", cid)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a cluster assignment file.
pub fn read_cluster_file<P: AsRef<Path>>(path: P) -> Result<ClusterAssignment> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let mut next_value = |ctx: &str| -> Result<usize> {
        let line = lines
            .next()
            .ok_or_else(|| Error::InvalidData(format!("cluster file truncated at {}", ctx)))??;
        line.trim()
            .parse::<usize>()
            .map_err(|_| Error::InvalidData(format!("invalid {} '{}'", ctx, line.trim())))
    };

    let cluster_count = next_value("cluster count")?;
    let face_count = next_value("face count")?;
    let mut labels = Vec::with_capacity(face_count);
    for i in 0..face_count {
        labels.push(next_value(&format!("label of face {}", i))?);
    }
    Ok(ClusterAssignment {
        cluster_count,
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusters.txt");
        let labels = vec![0, 0, 1, 2, 1, 0];
        write_cluster_file(&path, 3, &labels).unwrap();
        let loaded = read_cluster_file(&path).unwrap();
        assert_eq!(loaded.cluster_count, 3);
        assert_eq!(loaded.labels, labels);
    }

    #[test]
    fn test_truncated_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.txt");
        std::fs::write(&path, "2\n5\n0\n1\n").unwrap();
        assert!(read_cluster_file(&path).is_err());
    }

    #[test]
    fn test_garbage_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.txt");
        std::fs::write(&path, "2\ntwo\n").unwrap();
        assert!(read_cluster_file(&path).is_err());
    }
}

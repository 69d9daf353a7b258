//! Pipeline configuration.

/// Options controlling the partitioning pipeline and the downstream
/// simplification stage.
#[derive(Debug, Clone)]
pub struct PartitionConfig {
    /// Stop merging once this many clusters remain.
    pub target_cluster_num: usize,
    /// Run small-cluster removal, coplanar merging, island reattachment and
    /// re-indexing after swap refinement.
    pub run_post_processing: bool,
    /// Run QEM simplification of the labelled mesh after partitioning.
    pub run_mesh_simplification: bool,
    /// Clusters below this area are dissolved into their neighbors; also
    /// the floor for top-K cluster export.
    pub min_cluster_area: f64,
    /// Coplanar merge: maximum allowed point-to-plane distance.
    pub coplanar_max_distance: f64,
    /// Coplanar merge: maximum allowed mean point-to-plane distance.
    pub coplanar_avg_distance: f64,
    /// Coplanar merge: minimum |n1·n2| between cluster normals.
    pub coplanar_normal_cos: f64,
    /// Weight of triangle-derived quadrics in simplification.
    pub face_coefficient: f64,
    /// Weight of border constraint-plane quadrics in simplification.
    pub point_coefficient: f64,
    /// Contractions costing more than this are not applied.
    pub simplify_cost_limit: f64,
    /// Simplification stops once this many valid vertices remain.
    pub simplify_min_vertices: usize,
    /// Hard cap on boundary-swap passes.
    pub swap_pass_limit: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            target_cluster_num: 200,
            run_post_processing: true,
            run_mesh_simplification: true,
            min_cluster_area: 0.5,
            coplanar_max_distance: 0.2,
            coplanar_avg_distance: 0.1,
            coplanar_normal_cos: (10.0_f64).to_radians().cos(),
            face_coefficient: 1.0,
            point_coefficient: 1.0,
            simplify_cost_limit: 1e-2,
            simplify_min_vertices: 4,
            swap_pass_limit: 300,
        }
    }
}

impl PartitionConfig {
    /// Configuration with a given merge target and the remaining defaults.
    pub fn with_target(target_cluster_num: usize) -> Self {
        Self {
            target_cluster_num,
            ..Default::default()
        }
    }
}

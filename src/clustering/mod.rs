pub mod entity_clustering;

pub use entity_clustering::{compute_clusters, compute_clusters_with_singletons, Cluster};

mod dbscan;
mod engine;
mod kmeans;
mod similarity;
mod subdivide;
mod types;

pub use dbscan::{dbscan as run_dbscan, knn_graph};
pub use engine::GroupingEngine;
pub use kmeans::kmeans;
pub use similarity::{cosine_distance, cosine_similarity, mean_pairwise_similarity, normalize};
pub use types::{GroupAssignment, GroupItem};

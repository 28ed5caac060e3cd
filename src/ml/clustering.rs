//! 1-D k-means clustering with ordinal severity labels
//!
//! Seeding is percentile based rather than random, so a given input and `k`
//! always produce the same model. Distance ties resolve toward the
//! lowest-indexed centroid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ForecastError, Severity};

/// Default cap on Lloyd iterations
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Largest number of clusters chosen automatically for a training run
pub const MAX_CLUSTERS: usize = 3;

/// A fitted 1-D k-means model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterModel {
    /// Final centroid values, indexed by cluster
    pub centroids: Vec<f64>,
    /// Severity label for each cluster index
    pub cluster_labels: BTreeMap<usize, Severity>,
}

impl ClusterModel {
    /// Fit `k` clusters with the default iteration cap.
    pub fn train(values: &[f64], k: usize) -> Result<Self, ForecastError> {
        Self::train_with_max_iterations(values, k, DEFAULT_MAX_ITERATIONS)
    }

    pub fn train_with_max_iterations(
        values: &[f64],
        k: usize,
        max_iterations: usize,
    ) -> Result<Self, ForecastError> {
        if k == 0 {
            return Err(ForecastError::InvalidInput(
                "k-means requires at least one cluster".to_string(),
            ));
        }

        if values.len() < k {
            return Err(ForecastError::InsufficientData {
                values: values.len(),
                clusters: k,
            });
        }

        let mut centroids = seed_centroids(values, k);
        let mut assignments: Vec<usize> = Vec::new();

        for _ in 0..max_iterations {
            let next: Vec<usize> = values
                .iter()
                .map(|&value| nearest_centroid(&centroids, value).unwrap_or(0))
                .collect();
            let changed = next != assignments;
            assignments = next;

            let mut sums = vec![0.0; k];
            let mut counts = vec![0usize; k];
            for (&value, &cluster) in values.iter().zip(&assignments) {
                sums[cluster] += value;
                counts[cluster] += 1;
            }

            // Empty clusters keep their previous centroid
            for (centroid, (&sum, &count)) in centroids.iter_mut().zip(sums.iter().zip(&counts)) {
                if count > 0 {
                    *centroid = sum / count as f64;
                }
            }

            if !changed {
                break;
            }
        }

        let cluster_labels = rank_labels(&centroids);

        Ok(Self {
            centroids,
            cluster_labels,
        })
    }

    /// Number of clusters
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Label of the centroid closest to `value`.
    ///
    /// A model without centroids, or without a label for the winning
    /// cluster, classifies everything as `Low`.
    pub fn classify(&self, value: f64) -> Severity {
        nearest_centroid(&self.centroids, value)
            .and_then(|index| self.label_of(index))
            .unwrap_or_default()
    }

    pub fn label_of(&self, cluster: usize) -> Option<Severity> {
        self.cluster_labels.get(&cluster).copied()
    }
}

/// Cluster count for a training run over `rows` feature rows:
/// `min(3, max(1, floor(sqrt(rows))))`.
pub fn cluster_count_for(rows: usize) -> usize {
    ((rows as f64).sqrt().floor() as usize).clamp(1, MAX_CLUSTERS)
}

/// Pick `k` seeds from the sorted values at positions `floor(i * n / (k + 1))`.
fn seed_centroids(values: &[f64], k: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();

    (1..=k).map(|i| sorted[i * n / (k + 1)]).collect()
}

fn nearest_centroid(centroids: &[f64], value: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (index, &centroid) in centroids.iter().enumerate() {
        let distance = (value - centroid).abs();
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((index, distance)),
        }
    }

    best.map(|(index, _)| index)
}

/// Assign labels by ascending centroid value; equal centroids keep index order.
fn rank_labels(centroids: &[f64]) -> BTreeMap<usize, Severity> {
    let mut order: Vec<usize> = (0..centroids.len()).collect();
    order.sort_by(|&a, &b| centroids[a].total_cmp(&centroids[b]));

    order
        .into_iter()
        .enumerate()
        .map(|(rank, cluster)| (cluster, Severity::from_rank(rank)))
        .collect()
}

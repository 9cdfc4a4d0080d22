use crate::filter::{FilterOpts, RawReadPair, Reject};
use crate::io::ReadPair;
use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Read pairs sharing one exact barcode. Each cluster produces exactly one consensus pair.
pub struct BarcodeCluster {
    pub barcode: String,
    pub members: Vec<RawReadPair>,
}

/// Accepted read pairs grouped by their exact barcode, in the order each barcode was first seen.
///
/// Error tolerance is deliberately absent here: near-identical barcodes are only merged after
/// alignment, where the genomic position tells true duplicates apart from barcode collisions.
pub struct BarcodeClusterMap {
    pub by_barcode: IndexMap<String, Vec<RawReadPair>>,
}

impl BarcodeClusterMap {
    pub fn new() -> Self {
        BarcodeClusterMap {
            by_barcode: Default::default(),
        }
    }

    pub fn insert(&mut self, pair: RawReadPair) {
        self.by_barcode
            .entry(pair.barcode.clone())
            .or_default()
            .push(pair);
    }

    pub fn len(&self) -> usize {
        self.by_barcode.len()
    }

    pub fn shrink_to_fit(&mut self) {
        self.by_barcode.shrink_to_fit();
    }

    /// Member count -> number of clusters with that many members.
    pub fn distribution(&self) -> BTreeMap<usize, usize> {
        let mut distribution = BTreeMap::new();
        for members in self.by_barcode.values() {
            *distribution.entry(members.len()).or_insert(0) += 1;
        }
        distribution
    }

    pub fn into_clusters(self) -> impl Iterator<Item = BarcodeCluster> {
        self.by_barcode
            .into_iter()
            .map(|(barcode, members)| BarcodeCluster { barcode, members })
    }
}

#[derive(Serialize, Debug, Default)]
pub struct ClusterStatistics {
    pub read_pairs: usize,
    pub too_short: usize,
    pub low_quality: usize,
    pub constant_region_mismatch: usize,
    pub clusters: usize,
    pub emitted_clusters: usize,
    pub below_min_members: usize,
    pub retained_percent: f64,
    pub distribution: BTreeMap<usize, usize>,
}

impl ClusterStatistics {
    pub fn discarded(&self) -> usize {
        self.too_short + self.low_quality + self.constant_region_mismatch
    }

    pub fn reject(&mut self, reason: Reject) {
        match reason {
            Reject::TooShort => self.too_short += 1,
            Reject::LowQuality => self.low_quality += 1,
            Reject::ConstantRegion => self.constant_region_mismatch += 1,
        }
    }

    pub fn finish(&mut self) {
        self.retained_percent = if self.read_pairs == 0 {
            0.0
        } else {
            self.emitted_clusters as f64 / self.read_pairs as f64 * 100.0
        };
    }
}

/// Reads every pair, splits off its barcode and groups accepted pairs by exact barcode.
///
/// Rejected pairs are tallied in `stats`; errors from the reader (malformed or desynchronised
/// records) abort the pass.
pub fn collect_clusters(
    pairs: impl Iterator<Item = Result<ReadPair>>,
    filter: &FilterOpts,
    stats: &mut ClusterStatistics,
) -> Result<BarcodeClusterMap> {
    info!("Reading read pairs...");
    let mut map = BarcodeClusterMap::new();

    for pair in pairs {
        let pair = pair?;
        stats.read_pairs += 1;

        if stats.read_pairs % 50000 == 0 {
            info!("Processed: {}", stats.read_pairs)
        }

        match filter.split(pair) {
            Ok(raw) => map.insert(raw),
            Err(reason) => stats.reject(reason),
        }
    }

    map.shrink_to_fit(); // optimise memory usage
    stats.clusters = map.len();
    stats.distribution = map.distribution();

    info!("Extracted: {} barcode groups", stats.clusters);
    info!("Discarded: {} read pairs", stats.discarded());
    info!("Parsed:    {} read pairs", stats.read_pairs);

    Ok(map)
}

use crate::duplicates::ClusterStatistics;
use crate::dedup::DedupStatistics;
use crate::file::RunMetadata;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;

/// Reports the statistics of a `cluster` run to the log.
pub fn log_cluster(stats: &ClusterStatistics, outputs: &[String]) {
    info!("[Summary]");
    for output in outputs {
        info!("output:                    {output}");
    }
    info!("read pairs:                {}", stats.read_pairs);
    info!("too short:                 {}", stats.too_short);
    info!("low barcode quality:       {}", stats.low_quality);
    info!("constant region mismatch:  {}", stats.constant_region_mismatch);
    info!("barcode clusters:          {}", stats.clusters);
    info!("below minimum members:     {}", stats.below_min_members);
    info!("output clusters:           {}", stats.emitted_clusters);
    info!("percentage retained:       {:.3}", stats.retained_percent);
}

/// Reports the statistics of a `dedup` run to the log.
pub fn log_dedup(stats: &DedupStatistics) {
    info!("[Summary]");
    info!("fragments:                 {}", stats.fragments);
    info!("outside length window:     {}", stats.outside_length);
    info!("position groups:           {}", stats.groups);
    info!("barcode clusters:          {}", stats.subclusters);
    info!("members:                   {}", stats.members);
    if stats.saturation_overflows > 0 {
        info!("saturation overflows:      {}", stats.saturation_overflows);
    }
    info!("fraction retained:         {:.3}", stats.retained_fraction);
}

/// Writes the run metadata and statistics as a JSON document.
///
/// # Arguments
///
/// * `output` - A string slice that holds the path to the output file.
/// * `metadata` - Information about the run.
/// * `stats` - Any serialisable statistics struct.
pub fn write_stats(output: &str, metadata: &RunMetadata, stats: &impl Serialize) -> Result<()> {
    let mut data = serde_json::to_value(metadata).context("Could not serialize run info")?;
    data["stats"] = serde_json::to_value(stats).context("Could not serialize statistics")?;
    // round "elapsed" to 3dp
    data["elapsed"] = json!(format!("{:.3}", metadata.elapsed));

    let file = std::fs::File::create(output)
        .with_context(|| format!("Unable to create file {output}"))?;
    serde_json::to_writer_pretty(file, &data)?;

    info!("Wrote statistics to {output}");
    Ok(())
}

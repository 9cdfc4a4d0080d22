extern crate env_logger;
#[macro_use]
extern crate log;

use anyhow::Result;
use clap::Parser;

mod call;
mod cli;
mod cluster;
mod dedup;
mod duplicates;
mod errors;
mod file;
mod filter;
mod fragment;
mod group;
mod io;
mod metrics;
mod preset;
mod saturation;
mod summary;

use cli::{Cli, Commands};

fn try_main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let cli = Cli::parse();

    info!("umicollapse v{}", cli::VERSION);

    match &cli.command {
        Commands::Cluster {
            fastq1,
            fastq2,
            output_prefix,
            barcode_len,
            constant_region,
            mismatch,
            barcode_quality,
            read,
            min_members,
            fraction,
            max_quality,
            prefix_len,
            interleaved,
            threads,
            stats,
        } => {
            // validate everything before any input is read
            let filter_opts = filter::FilterOpts::new(
                *barcode_len,
                constant_region,
                *mismatch,
                *barcode_quality,
                *read,
            )?;
            let consensus_opts = call::ConsensusOpts::new(*fraction, *max_quality, *min_members)?;
            if *prefix_len > *barcode_len {
                return Err(errors::CollapseError::config(
                    "prefix-len",
                    format!("cannot bucket by {prefix_len} bases of a {barcode_len} base barcode"),
                )
                .into());
            }
            let layout = call::OutputLayout {
                prefix: output_prefix.clone(),
                prefix_len: *prefix_len,
                interleaved: *interleaved,
            };

            info!("[Parameters]");
            info!("indexed bases:               {barcode_len}");
            info!("constant region:             {constant_region}");
            info!("allowed mismatches:          {mismatch}");
            info!("min mean barcode quality:    {barcode_quality}");
            info!("minimum members:             {min_members}");
            info!("fraction to call consensus:  {fraction:.2}");
            info!("threads:                     {threads}");

            let now = std::time::Instant::now();
            let mut metadata = file::RunMetadata::new("cluster", &[fastq1.as_str(), fastq2.as_str()]);
            let mut statistics = duplicates::ClusterStatistics::default();

            let pairs = io::PairedReader::from_paths(fastq1, fastq2)?;
            let clusters = duplicates::collect_clusters(pairs, &filter_opts, &mut statistics)?;
            call::consensus(clusters, &consensus_opts, &layout, *threads, &mut statistics)?;

            metadata.elapsed = now.elapsed().as_secs_f64();
            summary::log_cluster(&statistics, &[format!("{output_prefix}*")]);
            if let Some(path) = stats {
                summary::write_stats(path, &metadata, &statistics)?;
            }
            info!("Completed successfully in {:.1}s", metadata.elapsed)
        }
        Commands::Dedup {
            input,
            output,
            mismatch,
            umi_len,
            barcode_source,
            barcode_regex,
            len,
            saturation,
            model,
            rounding,
            stats,
        } => {
            let opts = dedup::DedupOpts::new(
                *mismatch,
                *len,
                *umi_len,
                saturation.then_some((*model, *rounding)),
            )?;
            let extractor = fragment::BarcodeExtractor::from_options(barcode_source, barcode_regex)?;

            let now = std::time::Instant::now();
            let mut metadata = file::RunMetadata::new("dedup", &[input.as_str()]);
            let mut statistics = dedup::DedupStatistics::default();

            let fragments = fragment::FragmentReader::from_path(input, extractor, *umi_len)?;
            let mut writer = io::get_writer(output)?;

            if let Err(e) = dedup::dedup(fragments, &mut writer, &opts, &mut statistics) {
                // leave no partial output behind
                drop(writer);
                if let Some(path) = output {
                    if std::fs::remove_file(path).is_ok() {
                        warn!("Removed incomplete output {path}");
                    }
                }
                return Err(e);
            }

            metadata.elapsed = now.elapsed().as_secs_f64();
            summary::log_dedup(&statistics);
            if let Some(path) = stats {
                summary::write_stats(path, &metadata, &statistics)?;
            }
            info!("Completed successfully in {:.1}s", metadata.elapsed)
        }
        Commands::Saturation {
            draws,
            distinct,
            umi_len,
            symbols,
            model,
            rounding,
        } => {
            let alphabet = saturation::alphabet_size(*symbols, *umi_len);
            let estimate = saturation::estimate_molecules(*distinct, *draws, alphabet, *model)?;
            info!("{distinct} distinct of {draws} barcodes in a space of {alphabet}: {estimate:.3}");
            info!(
                "expected distinct barcodes at this estimate: {:.3}",
                saturation::expected_distinct(estimate, alphabet)
            );
            println!("{}", rounding.apply(estimate));
        }
    };
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        error!("{}", err);

        // report any errors that are produced
        err.chain()
            .skip(1)
            .for_each(|cause| error!("  because: {}", cause));

        std::process::exit(1);
    }
}

use crate::duplicates::{BarcodeCluster, BarcodeClusterMap, ClusterStatistics};
use crate::errors::CollapseError;
use crate::filter::PHRED_OFFSET;
use crate::io::{self, Record};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufWriter, Cursor};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use pariter::IteratorExt as _;

/// Highest quality representable in a Phred+33 FASTQ quality string.
pub const MAX_PHRED: u8 = 93;

pub struct ConsensusOpts {
    /// fraction of covering reads which must agree on a base for it to be called
    pub fraction: f64,
    pub max_quality: Option<u8>,
    pub min_members: usize,
}

impl ConsensusOpts {
    pub fn new(fraction: f64, max_quality: Option<u8>, min_members: usize) -> Result<Self, CollapseError> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(CollapseError::config(
                "fraction",
                format!("{fraction} is not within (0, 1]"),
            ));
        }
        if let Some(q) = max_quality {
            if q > MAX_PHRED {
                return Err(CollapseError::config(
                    "max-quality",
                    format!("{q} cannot be encoded; the highest Phred+33 quality is {MAX_PHRED}"),
                ));
            }
        }

        Ok(ConsensusOpts {
            fraction,
            max_quality,
            min_members,
        })
    }
}

pub struct ConsensusReadPair {
    pub barcode: String,
    pub r1: Record,
    pub r2: Record,
}

/// Calls one consensus base and quality per position across `reads`.
///
/// The consensus is as long as the longest read, and every position is voted on by the reads
/// that cover it. The base with the most votes wins; ties go to the higher summed quality and
/// then to the lower byte value, so the result does not depend on member order. If the winner
/// is supported by less than `opts.fraction` of the covering reads, `N` is called with quality 0.
fn call_read(reads: &[&Record], opts: &ConsensusOpts) -> (Vec<u8>, Vec<u8>) {
    let length = reads.iter().map(|r| r.seq.len()).max().unwrap_or(0);
    let mut seq = Vec::with_capacity(length);
    let mut qual = Vec::with_capacity(length);

    for i in 0..length {
        // base -> (votes, summed Phred quality)
        let mut votes: BTreeMap<u8, (usize, u64)> = BTreeMap::new();
        let mut covering = 0usize;

        for read in reads.iter() {
            let Some(base) = read.seq.get(i) else {
                continue;
            };
            let q = read
                .qual
                .get(i)
                .map(|q| q.saturating_sub(PHRED_OFFSET))
                .unwrap_or(0);

            let entry = votes.entry(base.to_ascii_uppercase()).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += q as u64;
            covering += 1;
        }

        // iteration is by ascending base, and only a strictly better vote replaces the winner
        let mut winner: Option<(u8, usize, u64)> = None;
        for (&base, &(count, qual_sum)) in votes.iter() {
            match winner {
                Some((_, c, q)) if (count, qual_sum) <= (c, q) => {}
                _ => winner = Some((base, count, qual_sum)),
            }
        }

        let Some((base, count, qual_sum)) = winner else {
            continue;
        };

        if (count as f64) < opts.fraction * (covering as f64) {
            seq.push(b'N');
            qual.push(PHRED_OFFSET);
            continue;
        }

        // mean of the agreeing qualities, rounded half up
        let mean = ((qual_sum * 2 + count as u64) / (count as u64 * 2)) as u8;
        let capped = mean
            .min(opts.max_quality.unwrap_or(MAX_PHRED))
            .min(MAX_PHRED);

        seq.push(base);
        qual.push(capped + PHRED_OFFSET);
    }

    (seq, qual)
}

/// Generates the consensus read pair of a single barcode cluster. A singleton cluster is its
/// own consensus.
pub fn call_cluster(cluster: &BarcodeCluster, opts: &ConsensusOpts) -> ConsensusReadPair {
    let r1s: Vec<&Record> = cluster.members.iter().map(|p| &p.r1).collect();
    let r2s: Vec<&Record> = cluster.members.iter().map(|p| &p.r2).collect();

    let (seq1, qual1) = call_read(&r1s, opts);
    let (seq2, qual2) = call_read(&r2s, opts);

    let members = cluster.members.len();
    let name = cluster
        .members
        .first()
        .map(|p| p.r1.pair_name())
        .unwrap_or("cluster");
    let id = format!("{}_{}_{}", name, cluster.barcode, members);

    ConsensusReadPair {
        barcode: cluster.barcode.clone(),
        r1: Record {
            id: id.clone(),
            seq: seq1,
            qual: qual1,
        },
        r2: Record {
            id,
            seq: seq2,
            qual: qual2,
        },
    }
}

/// How consensus pairs are laid out on disk.
pub struct OutputLayout {
    pub prefix: String,
    /// clusters are routed to files by this many leading barcode bases
    pub prefix_len: usize,
    pub interleaved: bool,
}

impl OutputLayout {
    /// The bucket of a barcode. Identical barcodes always share a bucket, so bucketing can never
    /// split an exact barcode cluster.
    pub fn bucket_of<'a>(&self, barcode: &'a str) -> &'a str {
        barcode.get(..self.prefix_len).unwrap_or(barcode)
    }

    fn file_stem(&self, bucket: &str) -> String {
        if bucket.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}_{}", self.prefix, bucket)
        }
    }

    /// The files a bucket is written to: one interleaved file, or a read 1 and read 2 file.
    pub fn paths(&self, bucket: &str) -> Vec<String> {
        let stem = self.file_stem(bucket);
        if self.interleaved {
            vec![format!("{stem}.fastq")]
        } else {
            vec![format!("{stem}_R1_001.fastq"), format!("{stem}_R2_001.fastq")]
        }
    }
}

/// Lazily opened writers, one set per bucket.
struct BucketWriters<'a> {
    layout: &'a OutputLayout,
    writers: IndexMap<String, Vec<BufWriter<File>>>,
}

impl<'a> BucketWriters<'a> {
    fn new(layout: &'a OutputLayout) -> Self {
        BucketWriters {
            layout,
            writers: IndexMap::new(),
        }
    }

    fn get(&mut self, bucket: &str) -> Result<&mut Vec<BufWriter<File>>> {
        if !self.writers.contains_key(bucket) {
            let mut files = Vec::new();
            for path in self.layout.paths(bucket) {
                let file = File::create(&path).with_context(|| format!("Unable to create file {path}"))?;
                files.push(BufWriter::new(file));
            }
            info!("Writing bucket `{}` to {}", bucket, self.layout.paths(bucket).join(", "));
            self.writers.insert(bucket.to_string(), files);
        }
        Ok(&mut self.writers[bucket])
    }

    fn write(&mut self, bucket: &str, r1: &[u8], r2: &[u8]) -> Result<()> {
        let writers = self.get(bucket)?;
        match writers.as_mut_slice() {
            [interleaved] => {
                interleaved.write_all(r1)?;
                interleaved.write_all(r2)?;
            }
            [w1, w2] => {
                w1.write_all(r1)?;
                w2.write_all(r2)?;
            }
            _ => unreachable!("a bucket has one or two output files"),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for writer in self.writers.values_mut().flatten() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// The formatted output of one cluster: its bucket, then read 1 and read 2 FASTQ entries.
type CalledCluster = (String, Vec<u8>, Vec<u8>);

fn format_cluster(cluster: BarcodeCluster, opts: &ConsensusOpts, layout: &OutputLayout) -> CalledCluster {
    let consensus = call_cluster(&cluster, opts);

    let mut r1 = Cursor::new(Vec::new());
    let mut r2 = Cursor::new(Vec::new());
    // writing into memory cannot fail
    io::write_read(&mut r1, &consensus.r1).expect("in-memory write");
    io::write_read(&mut r2, &consensus.r2).expect("in-memory write");

    (
        layout.bucket_of(&consensus.barcode).to_string(),
        r1.into_inner(),
        r2.into_inner(),
    )
}

/// Generates consensus read pairs for every cluster in a thread-stable manner: clusters are called
/// in parallel, and written in the order their barcode was first seen.
///
/// Clusters with fewer than `opts.min_members` members are skipped and counted in `stats`.
pub fn consensus(
    clusters: BarcodeClusterMap,
    opts: &ConsensusOpts,
    layout: &OutputLayout,
    threads: usize,
    stats: &mut ClusterStatistics,
) -> Result<()> {
    let threads = threads.max(1);
    let cache_size = threads * 3;
    let mut writers = BucketWriters::new(layout);
    // without bucketing the outputs exist even when no cluster is emitted
    if layout.prefix_len == 0 {
        writers.get("")?;
    }

    let mut below_min = 0usize;
    let mut emitted = 0usize;

    let result = crossbeam::thread::scope(|scope| -> Result<()> {
        clusters
            .into_clusters()
            .filter(|c| {
                let keep = c.members.len() >= opts.min_members;
                below_min += !keep as usize;
                keep
            })
            // convert this sequential iterator into a parallel one for consensus calling
            .parallel_map_scoped_custom(
                scope,
                |o| o.threads(threads).buffer_size(cache_size),
                |c| format_cluster(c, opts, layout),
            )
            // write every read in a global thread in order
            .try_for_each(|(bucket, r1, r2)| -> Result<()> {
                emitted += 1;
                writers.write(&bucket, &r1, &r2)
            })
    });

    // Threads can't send regular errors well between them, so
    // if there is an issue here we panic
    result.unwrap_or_else(|e| {
        error!("Caught a panic which is unrecoverable");
        std::panic::resume_unwind(e)
    })?;

    writers.flush()?;

    stats.below_min_members = below_min;
    stats.emitted_clusters = emitted;
    stats.finish();

    Ok(())
}

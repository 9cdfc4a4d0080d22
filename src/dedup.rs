use crate::cli::ArgInterval;
use crate::cluster::{write_bed_line, FragmentGroup};
use crate::errors::CollapseError;
use crate::fragment::Fragment;
use crate::group::group_fragments;
use crate::io::until_err;
use crate::saturation::{alphabet_size, estimate_molecules, Rounding, SaturationModel};

use anyhow::Result;
use serde::Serialize;
use std::io::Write;

/// Symbols a barcode base is drawn from.
pub const BARCODE_SYMBOLS: u32 = 4;

pub struct SaturationOpts {
    /// compared barcode length, which sets the size of the barcode space
    pub umi_len: usize,
    pub model: SaturationModel,
    pub rounding: Rounding,
}

pub struct DedupOpts {
    pub tolerance: u32,
    pub len: ArgInterval,
    pub saturation: Option<SaturationOpts>,
}

impl DedupOpts {
    pub fn new(
        tolerance: u32,
        len: ArgInterval,
        umi_len: Option<usize>,
        saturation: Option<(SaturationModel, Rounding)>,
    ) -> Result<Self, CollapseError> {
        len.validate("len")?;
        if umi_len == Some(0) {
            return Err(CollapseError::config(
                "umi-len",
                "at least one barcode base must be compared",
            ));
        }

        let saturation = match saturation {
            None => None,
            Some((model, rounding)) => {
                let Some(umi_len) = umi_len else {
                    return Err(CollapseError::config(
                        "saturation",
                        "saturation correction needs the compared barcode length (--umi-len)",
                    ));
                };
                if !alphabet_size(BARCODE_SYMBOLS, umi_len as u32).is_finite() {
                    return Err(CollapseError::config(
                        "umi-len",
                        format!("a barcode space of {BARCODE_SYMBOLS}^{umi_len} cannot be represented"),
                    ));
                }
                Some(SaturationOpts {
                    umi_len,
                    model,
                    rounding,
                })
            }
        };

        Ok(DedupOpts {
            tolerance,
            len,
            saturation,
        })
    }
}

#[derive(Serialize, Debug, Default)]
pub struct DedupStatistics {
    pub fragments: usize,
    pub outside_length: usize,
    pub groups: usize,
    pub subclusters: usize,
    pub members: usize,
    pub saturation_overflows: usize,
    pub retained_fraction: f64,
}

impl DedupStatistics {
    fn finish(&mut self) {
        let kept = self.fragments - self.outside_length;
        self.retained_fraction = if kept == 0 {
            0.0
        } else {
            self.subclusters as f64 / kept as f64
        };
    }
}

/// Writes the saturation-corrected molecule estimate of one group as a single BED line.
fn write_saturation(
    writer: &mut impl Write,
    group: &FragmentGroup,
    opts: &DedupOpts,
    saturation: &SaturationOpts,
    stats: &mut DedupStatistics,
) -> Result<()> {
    let (distinct, members) = group.demultiplex(opts.tolerance).counts();
    let alphabet = alphabet_size(BARCODE_SYMBOLS, saturation.umi_len as u32);

    let estimate = match estimate_molecules(distinct, members, alphabet, saturation.model) {
        Ok(estimate) => saturation.rounding.apply(estimate),
        Err(e @ CollapseError::SaturationOverflow { .. }) => {
            warn!("{}: {}; reporting the observed count", group.key, e);
            stats.saturation_overflows += 1;
            distinct as u64
        }
        Err(e) => return Err(e.into()),
    };

    write_bed_line(writer, &group.key, &format!("{estimate}_estimated_molecules"))?;

    stats.subclusters += distinct;
    stats.members += members;
    Ok(())
}

/// Groups coordinate-sorted fragments by position, collapses the barcodes of each group and
/// writes one BED line per surviving barcode subcluster (or, with saturation correction, one line
/// per group carrying the molecule estimate).
pub fn dedup(
    fragments: impl Iterator<Item = Result<Fragment>>,
    writer: &mut impl Write,
    opts: &DedupOpts,
    stats: &mut DedupStatistics,
) -> Result<()> {
    // Start with a placeholder error object. This will be mutated if there are errors during
    // iteration through the fragments.
    let mut err = Ok(());

    let mut fragment_count = 0usize;
    let mut outside_length = 0usize;

    {
        let kept = fragments.filter(|f| {
            let Ok(f) = f else {
                return true;
            };
            fragment_count += 1;
            if fragment_count % 50000 == 0 {
                info!("Processed: {}", fragment_count)
            }

            let keep = opts.len.contains(f.len() as f64);
            outside_length += !keep as usize;
            keep
        });

        for group in group_fragments(kept).scan(&mut err, until_err) {
            stats.groups += 1;

            match &opts.saturation {
                Some(saturation) => write_saturation(writer, &group, opts, saturation, stats)?,
                None => {
                    let demultiplexed = group.demultiplex(opts.tolerance);
                    debug!(
                        "{}: {} barcodes in {} clusters ({} merged), elected {}",
                        group.key,
                        group.distinct_barcodes(),
                        demultiplexed.subclusters.len(),
                        demultiplexed
                            .subclusters
                            .iter()
                            .map(|s| s.barcodes.len() - 1)
                            .sum::<usize>(),
                        demultiplexed.representatives().join(",")
                    );
                    let (subclusters, members) = demultiplexed.write_bed(writer)?;
                    stats.subclusters += subclusters;
                    stats.members += members;
                }
            }
        }
    }

    stats.fragments = fragment_count;
    stats.outside_length = outside_length;
    stats.finish();

    err?;
    writer.flush()?;
    Ok(())
}

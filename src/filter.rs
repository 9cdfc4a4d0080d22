use crate::errors::CollapseError;
use crate::io::{ReadPair, Record};
use crate::metrics::Metric;

/// Phred+33 offset of FASTQ quality strings.
pub const PHRED_OFFSET: u8 = 33;

/// Which read of a pair starts with the synthesis barcode.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarcodeRead {
    Read1,
    Read2,
}

pub struct FilterOpts {
    pub barcode_len: usize,
    pub constant_region: Vec<u8>,
    pub mismatch: usize,
    pub min_quality: f64,
    pub read: BarcodeRead,
}

/// A read pair whose barcode and constant region have been split off the designated read.
#[derive(Clone, Debug)]
pub struct RawReadPair {
    pub barcode: String,
    pub r1: Record,
    pub r2: Record,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Reject {
    /// the designated read is shorter than the barcode and constant region together
    TooShort,
    LowQuality,
    ConstantRegion,
}

impl FilterOpts {
    pub fn new(
        barcode_len: usize,
        constant_region: &str,
        mismatch: usize,
        min_quality: f64,
        read: BarcodeRead,
    ) -> Result<Self, CollapseError> {
        if barcode_len == 0 {
            return Err(CollapseError::config(
                "barcode-len",
                "the barcode must be at least one base long",
            ));
        }
        if mismatch > constant_region.len() {
            return Err(CollapseError::config(
                "mismatch",
                format!(
                    "{mismatch} mismatches allowed in a constant region of {} bases",
                    constant_region.len()
                ),
            ));
        }

        Ok(FilterOpts {
            barcode_len,
            constant_region: constant_region.to_ascii_uppercase().into_bytes(),
            mismatch,
            min_quality,
            read,
        })
    }

    /// Splits the barcode and constant region off the designated read, and checks both.
    ///
    /// On success the barcode and constant region are trimmed from the designated read, so the
    /// returned pair only carries the insert.
    pub fn split(&self, pair: ReadPair) -> Result<RawReadPair, Reject> {
        let ReadPair { mut r1, mut r2 } = pair;
        let tagged = match self.read {
            BarcodeRead::Read1 => &mut r1,
            BarcodeRead::Read2 => &mut r2,
        };

        let prefix_len = self.barcode_len + self.constant_region.len();
        if tagged.seq.len() < prefix_len || tagged.qual.len() < prefix_len {
            return Err(Reject::TooShort);
        }

        if mean_quality(&tagged.qual[..self.barcode_len]) < self.min_quality {
            return Err(Reject::LowQuality);
        }

        let constant = tagged.seq[self.barcode_len..prefix_len].to_ascii_uppercase();
        if !constant
            .as_slice()
            .distance_to(&self.constant_region)
            .within(self.mismatch as u32)
        {
            return Err(Reject::ConstantRegion);
        }

        let barcode = String::from_utf8_lossy(&tagged.seq[..self.barcode_len]).to_ascii_uppercase();
        tagged.seq.drain(..prefix_len);
        tagged.qual.drain(..prefix_len);

        Ok(RawReadPair { barcode, r1, r2 })
    }
}

/// Mean Phred value of a Phred+33 quality string.
pub fn mean_quality(qual: &[u8]) -> f64 {
    if qual.is_empty() {
        return 0.0;
    }
    let total: u64 = qual
        .iter()
        .map(|q| q.saturating_sub(PHRED_OFFSET) as u64)
        .sum();
    total as f64 / qual.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(seq1: &str, qual1: &str) -> ReadPair {
        ReadPair {
            r1: Record {
                id: "r1".to_string(),
                seq: seq1.as_bytes().to_vec(),
                qual: qual1.as_bytes().to_vec(),
            },
            r2: Record {
                id: "r1".to_string(),
                seq: b"TTTT".to_vec(),
                qual: b"IIII".to_vec(),
            },
        }
    }

    fn opts() -> FilterOpts {
        FilterOpts::new(4, "CATCG", 1, 30.0, BarcodeRead::Read1).unwrap()
    }

    #[test]
    fn zero_length_barcode_is_a_configuration_error() {
        let result = FilterOpts::new(0, "CATCG", 1, 30.0, BarcodeRead::Read1);
        assert!(matches!(result, Err(CollapseError::Configuration { .. })));
    }

    #[test]
    fn mismatch_budget_larger_than_constant_region() {
        let result = FilterOpts::new(4, "CAT", 4, 30.0, BarcodeRead::Read1);
        assert!(matches!(result, Err(CollapseError::Configuration { .. })));
    }

    #[test]
    fn splits_barcode_and_trims_read() {
        let split = opts()
            .split(pair("ACGTCATCGGGGG", "IIIIIIIII####"))
            .unwrap();
        assert_eq!(split.barcode, "ACGT");
        assert_eq!(split.r1.seq, b"GGGG".to_vec());
        assert_eq!(split.r1.qual, b"####".to_vec());
        assert_eq!(split.r2.seq, b"TTTT".to_vec());
    }

    #[test]
    fn constant_region_tolerates_budgeted_mismatches() {
        assert!(opts().split(pair("ACGTCATCAGGGG", "IIIIIIIIIIIII")).is_ok());
        assert_eq!(
            opts()
                .split(pair("ACGTCAAAAGGGG", "IIIIIIIIIIIII"))
                .unwrap_err(),
            Reject::ConstantRegion
        );
    }

    #[test]
    fn low_barcode_quality_is_rejected() {
        // '5' is Phred 20
        assert_eq!(
            opts()
                .split(pair("ACGTCATCGGGGG", "5555IIIIIIIII"))
                .unwrap_err(),
            Reject::LowQuality
        );
    }

    #[test]
    fn short_reads_are_rejected() {
        assert_eq!(
            opts().split(pair("ACGTCAT", "IIIIIII")).unwrap_err(),
            Reject::TooShort
        );
    }

    #[test]
    fn barcode_on_read2() {
        let opts = FilterOpts::new(2, "TT", 0, 0.0, BarcodeRead::Read2).unwrap();
        let split = opts.split(pair("ACGTCATCG", "IIIIIIIII")).unwrap();
        assert_eq!(split.barcode, "TT");
        assert!(split.r2.seq.is_empty());
        assert_eq!(split.r1.seq, b"ACGTCATCG".to_vec());
    }

    #[test]
    fn mean_phred_quality() {
        assert_eq!(mean_quality(b"II"), 40.0);
        assert_eq!(mean_quality(b"!I"), 20.0);
        assert_eq!(mean_quality(b""), 0.0);
    }
}

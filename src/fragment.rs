use crate::errors::CollapseError;
use crate::preset::{get_barcode_regex, PresetBarcodeSource};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use itertools::Itertools;
use regex::Regex;
use std::fmt;
use std::fs::File;
use std::io::Read;

/// Strand of a fragment. `+` sorts before `-`, as it does in ASCII.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn as_char(&self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl TryFrom<&str> for Strand {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(format!("strand must be `+` or `-`, got `{other}`")),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// The exact span and strand shared by every fragment of a group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
}

impl FragmentKey {
    pub fn new(chrom: &str, start: u64, end: u64, strand: Strand) -> Self {
        FragmentKey {
            chrom: chrom.to_string(),
            start,
            end,
            strand,
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Sort position within a chromosome.
    pub fn position(&self) -> (u64, u64, Strand) {
        (self.start, self.end, self.strand)
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}({})", self.chrom, self.start, self.end, self.strand)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub key: FragmentKey,
    pub barcode: String,
}

impl Fragment {
    pub fn new(chrom: &str, start: u64, end: u64, strand: Strand, barcode: &str) -> Self {
        Fragment {
            key: FragmentKey::new(chrom, start, end, strand),
            barcode: barcode.to_string(),
        }
    }

    pub fn len(&self) -> u64 {
        self.key.len()
    }
}

/// Where the barcode of a BED line is read from.
pub enum BarcodeExtractor {
    /// the first capture group of a regex applied to the name column
    Name(Regex),
    /// the 7th column
    Tag,
}

impl BarcodeExtractor {
    /// A custom regex takes precedence over the preset.
    pub fn from_options(preset: &PresetBarcodeSource, regex: &Option<String>) -> Result<Self> {
        let pattern = match regex {
            Some(v) => {
                info!("Using specified barcode format: {v}");
                Some(v.clone())
            }
            None => get_barcode_regex(preset),
        };

        match pattern {
            Some(pattern) => {
                let re = Regex::new(&pattern)
                    .map_err(|e| CollapseError::config("barcode-regex", e.to_string()))?;
                if re.captures_len() < 2 {
                    return Err(CollapseError::config(
                        "barcode-regex",
                        format!("`{pattern}` has no capture group for the barcode"),
                    )
                    .into());
                }
                Ok(BarcodeExtractor::Name(re))
            }
            None => Ok(BarcodeExtractor::Tag),
        }
    }

    fn extract<'r>(&self, record: &'r StringRecord) -> Option<&'r str> {
        match self {
            BarcodeExtractor::Name(re) => re
                .captures(record.get(3)?)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str()),
            BarcodeExtractor::Tag => record.get(6),
        }
    }
}

/// Streams fragments from BED lines: `chrom start end name score strand [tag]`.
pub struct FragmentReader {
    records: StringRecordsIntoIter<Box<dyn Read>>,
    extractor: BarcodeExtractor,
    umi_len: Option<usize>,
    source_name: String,
}

impl FragmentReader {
    /// Opens `input`, or standard input for `-`.
    pub fn from_path(input: &str, extractor: BarcodeExtractor, umi_len: Option<usize>) -> Result<Self> {
        let reader: Box<dyn Read> = if input == "-" {
            Box::new(std::io::stdin())
        } else {
            let file = File::open(input).with_context(|| format!("Unable to open file {input}"))?;
            Box::new(file)
        };
        Ok(Self::new(reader, input, extractor, umi_len))
    }

    pub fn new(
        reader: Box<dyn Read>,
        source_name: &str,
        extractor: BarcodeExtractor,
        umi_len: Option<usize>,
    ) -> Self {
        let records = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(reader)
            .into_records();

        FragmentReader {
            records,
            extractor,
            umi_len,
            source_name: source_name.to_string(),
        }
    }

    fn parse(&self, record: &StringRecord) -> Result<Fragment, CollapseError> {
        let malformed = |reason: String| {
            CollapseError::malformed(&self.source_name, &record.iter().join("\t"), reason)
        };

        if record.len() < 6 {
            return Err(malformed(format!(
                "expected at least 6 tab separated columns, found {}",
                record.len()
            )));
        }

        let start: u64 = record[1]
            .parse()
            .map_err(|_| malformed(format!("start `{}` is not a position", &record[1])))?;
        let end: u64 = record[2]
            .parse()
            .map_err(|_| malformed(format!("end `{}` is not a position", &record[2])))?;
        if end < start {
            return Err(malformed(format!("end {end} lies before start {start}")));
        }
        let strand = Strand::try_from(&record[5]).map_err(malformed)?;

        let barcode = self
            .extractor
            .extract(record)
            .ok_or_else(|| malformed("no barcode could be extracted".to_string()))?;

        // only the compared prefix of the barcode takes part in clustering
        let barcode = match self.umi_len {
            Some(n) => barcode.get(..n).ok_or_else(|| {
                malformed(format!("barcode `{barcode}` does not have the {n} compared bases"))
            })?,
            None => barcode,
        };

        Ok(Fragment::new(&record[0], start, end, strand, barcode))
    }
}

impl Iterator for FragmentReader {
    type Item = Result<Fragment>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => {
                return Some(Err(anyhow::Error::new(e)
                    .context(format!("Unable to read {}", self.source_name))))
            }
        };
        Some(self.parse(&record).map_err(anyhow::Error::from))
    }
}

use clap::builder::styling::AnsiColor;
use clap::builder::Styles;
use clap::{Parser, Subcommand};

use crate::errors::CollapseError;
use crate::filter::BarcodeRead;
use crate::preset::PresetBarcodeSource;
use crate::saturation::{Rounding, SaturationModel};

const fn extra_build_info() -> &'static str {
    match option_env!("CARGO_BUILD_DESC") {
        Some(e) => e,
        None => env!("CARGO_PKG_VERSION"),
    }
}
pub const VERSION: &str = extra_build_info();
const INFO_STRING: &str = "
umicollapse version ";
const AFTER_STRING: &str = "
   ──────────────────────────────────
   consensus calling and deduplication for UMI-tagged libraries";

// colouring of the help
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().bold())
    .usage(AnsiColor::BrightMagenta.on_default().bold())
    .literal(AnsiColor::BrightMagenta.on_default())
    .placeholder(AnsiColor::White.on_default());

#[derive(Parser)]
#[command(
    version = VERSION,
    about = format!("{}{}{}", INFO_STRING, VERSION, AFTER_STRING),
    arg_required_else_help = true,
    flatten_help = true,
    styles = STYLES
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cluster raw read pairs by their synthesis barcode and call one consensus pair per cluster
    #[command(arg_required_else_help = true)]
    Cluster {
        /// read 1 .fastq (optionally gzipped)
        #[arg(short = '1', long)]
        fastq1: String,

        /// read 2 .fastq (optionally gzipped)
        #[arg(short = '2', long)]
        fastq2: String,

        /// prefix of the output files; read pairs are written to
        /// <prefix>[_<bucket>]_R1_001.fastq and <prefix>[_<bucket>]_R2_001.fastq
        #[arg(short, long, verbatim_doc_comment)]
        output_prefix: String,

        /// how many bases at the 5' end of the read form the barcode
        #[arg(short = 'x', long, default_value_t = 13)]
        barcode_len: usize,

        /// constant sequence expected directly after the barcode
        #[arg(short, long, default_value = "CATCG")]
        constant_region: String,

        /// mismatches allowed in the constant region
        #[arg(short = 'a', long, default_value_t = 1)]
        mismatch: usize,

        /// minimum mean Phred quality of the barcode bases
        #[arg(short = 'q', long, default_value_t = 30.0)]
        barcode_quality: f64,

        /// which read of the pair carries the barcode
        #[arg(short, long, value_enum)]
        read: BarcodeRead,

        /// clusters with fewer members than this are discarded
        #[arg(short, long, default_value_t = 1)]
        min_members: usize,

        /// fraction of reads that must agree on a base to call it; otherwise `N` is called
        #[arg(short, long, default_value_t = 0.66)]
        fraction: f64,

        /// cap consensus base qualities at this Phred value
        #[arg(long)]
        max_quality: Option<u8>,

        /// route clusters to separate output files by the first N bases of their barcode
        #[arg(long, default_value_t = 0)]
        prefix_len: usize,

        /// write read 1 and read 2 alternately into a single file per bucket
        #[arg(long, action)]
        interleaved: bool,

        /// the number of threads to use
        #[arg(short, long, default_value_t = 4)]
        threads: usize,

        /// write run statistics as JSON to this file
        #[arg(long)]
        stats: Option<String>,
    },

    /// Collapse coordinate-sorted fragments that share a position, strand and barcode
    #[command(arg_required_else_help = true)]
    Dedup {
        /// the coordinate sorted BED input, or `-` for standard input
        #[arg(short, long)]
        input: String,

        /// the output BED; standard output if not given
        #[arg(short, long)]
        output: Option<String>,

        /// substitutions tolerated between barcodes of the same molecule
        #[arg(short, long, default_value_t = 0)]
        mismatch: u32,

        /// only compare the first N bases of every barcode
        #[arg(long)]
        umi_len: Option<usize>,

        /// where the barcode of each fragment is found
        #[arg(value_enum, long, conflicts_with = "barcode_regex", default_value = "name-prefix")]
        barcode_source: PresetBarcodeSource,

        /// regex applied to the BED name column; the first capture group is the barcode.
        /// this will override the preset given. for example, for `consensus-suffix`:
        ///     _([A-Za-z]+)_[0-9]+$
        #[arg(long, verbatim_doc_comment)]
        barcode_regex: Option<String>,

        /// keep fragments whose length lies within the given interval [a,b].
        /// a is the minimum, and b is the maximum (both inclusive).
        /// alternatively, a can be `-inf` and b can be `inf`.
        #[arg(
            long,
            value_parser = |x: &str| ArgInterval::try_from(x),
            default_value = "0,inf",
            verbatim_doc_comment
        )]
        len: ArgInterval,

        /// report a saturation-corrected molecule estimate per position instead of
        /// one line per barcode cluster. requires --umi-len
        #[arg(long, action, requires = "umi_len", verbatim_doc_comment)]
        saturation: bool,

        #[arg(long, value_enum, default_value = "exact")]
        model: SaturationModel,

        #[arg(long, value_enum, default_value = "floor")]
        rounding: Rounding,

        /// write run statistics as JSON to this file
        #[arg(long)]
        stats: Option<String>,
    },

    /// Estimate the number of molecules behind a set of barcodes, accounting for collisions
    #[command(arg_required_else_help = true)]
    Saturation {
        /// total number of barcodes drawn
        #[arg(long)]
        draws: usize,

        /// number of distinct barcodes observed
        #[arg(long)]
        distinct: usize,

        /// compared barcode length
        #[arg(long)]
        umi_len: u32,

        /// number of symbols in the barcode alphabet
        #[arg(long, default_value_t = 4)]
        symbols: u32,

        #[arg(long, value_enum, default_value = "exact")]
        model: SaturationModel,

        #[arg(long, value_enum, default_value = "floor")]
        rounding: Rounding,
    },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ArgInterval {
    pub min: f64,
    pub max: f64,
}

/// Error type for parsing an interval string.
#[derive(Debug)]
pub struct ParseIntervalErr(String);

impl std::fmt::Display for ParseIntervalErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid interval format: {}", self.0)
    }
}

impl std::error::Error for ParseIntervalErr {}

impl<'a> TryFrom<&'a str> for ArgInterval {
    type Error = ParseIntervalErr;

    fn try_from(arg: &'a str) -> Result<ArgInterval, Self::Error> {
        let arg_lc = arg.to_lowercase();
        let parts: Vec<&str> = arg_lc.split(',').collect();

        if parts.len() != 2 {
            return Err(ParseIntervalErr(indoc::formatdoc! {"
            Expected format '<min>,<max>', got '{arg}'. The expected format is \
            `a,b`, as in:
              --len 0,1000
              --len 0,inf
              --len 10,10000
            "}));
        }

        // Try to parse the minimum and maximum, handling unbounded cases.
        let min = match parts[0].trim() {
            "-inf" => f64::NEG_INFINITY,
            s => s.parse::<f64>().map_err(|_| {
                ParseIntervalErr(format!(
                    "Invalid minimum value: '{}' (should be any float or `-inf`)",
                    parts[0].trim()
                ))
            })?,
        };

        let max = match parts[1].trim() {
            "inf" => f64::INFINITY,
            s => s.parse::<f64>().map_err(|_| {
                ParseIntervalErr(format!(
                    "Invalid maximum value: '{}' (should be any float or `inf`)",
                    parts[1].trim()
                ))
            })?,
        };

        Ok(ArgInterval { min, max })
    }
}

impl ArgInterval {
    pub fn contains(&self, v: f64) -> bool {
        (self.min <= v) && (v <= self.max)
    }

    /// Rejects intervals which can never contain a value.
    pub fn validate(&self, parameter: &str) -> Result<(), CollapseError> {
        if self.min > self.max {
            return Err(CollapseError::config(
                parameter,
                format!("minimum {} is greater than maximum {}", self.min, self.max),
            ));
        }
        Ok(())
    }
}

use crate::errors::CollapseError;
use anyhow::Context;
use needletail::errors::ParseErrorKind;
use needletail::{parse_fastx_file, FastxReader};
use std::fs::File;
use std::io::{stdout, BufWriter, Write};
use std::path::Path;

/// A single FASTQ record, with Phred+33 encoded qualities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl Record {
    /// The read name used to check that two streams are synchronised: everything before the
    /// first whitespace, with any trailing `/1` or `/2` removed.
    pub fn pair_name(&self) -> &str {
        let name = self.id.split_whitespace().next().unwrap_or("");
        name.strip_suffix("/1")
            .or_else(|| name.strip_suffix("/2"))
            .unwrap_or(name)
    }
}

impl TryFrom<needletail::parser::SequenceRecord<'_>> for Record {
    type Error = anyhow::Error;

    fn try_from(rec: needletail::parser::SequenceRecord<'_>) -> Result<Self, Self::Error> {
        Ok(Record {
            id: String::from_utf8(rec.id().to_vec())?,
            seq: rec.seq().to_vec(),
            qual: rec.qual().unwrap_or(&[]).to_vec(),
        })
    }
}

#[derive(Debug)]
pub struct ReadPair {
    pub r1: Record,
    pub r2: Record,
}

/// Opens a FASTQ file. An empty file is an empty stream, and gives `None`.
fn open_fastq(path: &str) -> anyhow::Result<Option<Box<dyn FastxReader>>> {
    match parse_fastx_file(path) {
        Ok(reader) => Ok(Some(reader)),
        Err(e) if e.kind == ParseErrorKind::EmptyFile => {
            warn!("{path} is empty");
            Ok(None)
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("Unable to open file {path}"))),
    }
}

/// Reads two FASTQ files in lockstep. The streams must contain the same reads in the same
/// order; anything else is reported as a malformed record.
pub struct PairedReader {
    r1: Option<Box<dyn FastxReader>>,
    r2: Option<Box<dyn FastxReader>>,
    path1: String,
    path2: String,
}

impl PairedReader {
    pub fn from_paths(path1: &str, path2: &str) -> anyhow::Result<Self> {
        let r1 = open_fastq(path1)?;
        let r2 = open_fastq(path2)?;

        Ok(PairedReader {
            r1,
            r2,
            path1: path1.to_string(),
            path2: path2.to_string(),
        })
    }

    fn next_pair(&mut self) -> anyhow::Result<Option<ReadPair>> {
        let r1 = match self.r1.as_mut().and_then(|r| r.next()) {
            Some(rec) => Some(Record::try_from(rec.with_context(|| {
                format!("Invalid record in {}", self.path1)
            })?)?),
            None => None,
        };
        let r2 = match self.r2.as_mut().and_then(|r| r.next()) {
            Some(rec) => Some(Record::try_from(rec.with_context(|| {
                format!("Invalid record in {}", self.path2)
            })?)?),
            None => None,
        };

        match (r1, r2) {
            (None, None) => Ok(None),
            (Some(r1), None) => Err(CollapseError::malformed(
                &self.path2,
                &r1.id,
                "read 2 ended before read 1; the files are not synchronised",
            )
            .into()),
            (None, Some(r2)) => Err(CollapseError::malformed(
                &self.path1,
                &r2.id,
                "read 1 ended before read 2; the files are not synchronised",
            )
            .into()),
            (Some(r1), Some(r2)) => {
                if r1.pair_name() != r2.pair_name() {
                    return Err(CollapseError::malformed(
                        &self.path2,
                        &r2.id,
                        format!("expected the mate of `{}`", r1.id),
                    )
                    .into());
                }
                Ok(Some(ReadPair { r1, r2 }))
            }
        }
    }
}

impl Iterator for PairedReader {
    type Item = anyhow::Result<ReadPair>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_pair().transpose()
    }
}

/// Utility function to extract the error from an iterator and stop iteration immediately. Useful
/// for iterators which yield a Result<T>.
///
/// # Returns
///
/// This function returns an `Option<T>`. If the item is `Ok`, it returns `Some(T)`.
/// If the item is `Err`, it updates `err` with the error and returns `None`.
pub fn until_err<T>(err: &mut &mut anyhow::Result<()>, item: anyhow::Result<T>) -> Option<T> {
    match item {
        Ok(item) => Some(item),
        Err(e) => {
            **err = Err(e);
            None
        }
    }
}

/// Formats a record as a FASTQ entry and writes it to the provided writer.
///
/// Since this is `std::io::Write` and *not* `std::fmt::Write`, this does not accept Strings. It is
/// acceptable to use a `std::io::Cursor` instead.
pub fn write_read(writer: &mut impl Write, record: &Record) -> std::io::Result<()> {
    writer.write_all(b"@")?;
    writer.write_all(record.id.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.write_all(&record.seq)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(&record.qual)?;
    writer.write_all(b"\n")
}

/// Creates a `BufWriter` for the given output option. This allows for an output file to be passed
/// or otherwise will default to using standard output.
pub fn get_writer(output: &Option<String>) -> anyhow::Result<BufWriter<Box<dyn Write + Send>>> {
    let writer = BufWriter::new(match output {
        Some(ref x) => {
            let file = File::create(Path::new(x))
                .with_context(|| format!("Unable to create file {x}"))?;
            Box::new(file) as Box<dyn Write + Send>
        }
        None => Box::new(stdout()) as Box<dyn Write + Send>,
    });
    Ok(writer)
}

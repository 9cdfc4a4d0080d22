use thiserror::Error;

/// Errors raised by the clustering, grouping and saturation stages.
///
/// Per-record rejects (low barcode quality, constant region mismatches, fragments outside the
/// length window) are not errors; they are tallied in the statistics of each stage.
#[derive(Error, Debug)]
pub enum CollapseError {
    #[error("invalid configuration for `{parameter}`: {reason}")]
    Configuration { parameter: String, reason: String },

    #[error(
        "malformed record in {source_name}:
    `{record}`
{reason}"
    )]
    MalformedRecord {
        source_name: String,
        record: String,
        reason: String,
    },

    #[error(
        "input is not coordinate sorted:
    `{current}`
was found after
    `{previous}`
suggestion: sort the fragments first, e.g. `sort -k1,1 -k2,2n -k3,3n -k6,6`"
    )]
    UnsortedInput { previous: String, current: String },

    #[error(
        "saturation overflow: {distinct} distinct barcodes observed in an alphabet of {alphabet}; \
the molecule count cannot be estimated"
    )]
    SaturationOverflow { distinct: usize, alphabet: f64 },
}

impl CollapseError {
    pub fn config(parameter: &str, reason: impl Into<String>) -> Self {
        CollapseError::Configuration {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub fn malformed(source_name: &str, record: &str, reason: impl Into<String>) -> Self {
        CollapseError::MalformedRecord {
            source_name: source_name.to_string(),
            record: record.trim_end().to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_message() {
        let err = CollapseError::config("barcode-len", "must be greater than zero");
        let msg = err.to_string();
        assert!(msg.contains("`barcode-len`"));
        assert!(msg.contains("must be greater than zero"));
    }

    #[test]
    fn unsorted_message_names_both_keys() {
        let err = CollapseError::UnsortedInput {
            previous: "chr1:200-300(+)".to_string(),
            current: "chr1:100-300(+)".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("chr1:200-300(+)"));
        assert!(msg.contains("chr1:100-300(+)"));
    }
}

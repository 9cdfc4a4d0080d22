use bio::alignment::distance::hamming;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    /// The sequences cannot be compared by substitutions alone (different lengths)
    TooFar,
    Dist(u32),
}

impl Distance {
    /// Whether this distance is at most `max` substitutions.
    pub fn within(&self, max: u32) -> bool {
        match self {
            Distance::TooFar => false,
            Distance::Dist(d) => *d <= max,
        }
    }
}

pub trait Metric {
    fn distance_to(&self, other: &Self) -> Distance;
}

/// Barcodes are compared by Hamming distance only, so indels make them incomparable.
impl Metric for [u8] {
    fn distance_to(&self, other: &Self) -> Distance {
        if self.len() != other.len() {
            Distance::TooFar
        } else {
            Distance::Dist(hamming(self, other) as u32)
        }
    }
}

impl Metric for str {
    fn distance_to(&self, other: &Self) -> Distance {
        self.as_bytes().distance_to(other.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hamming_between_barcodes() {
        assert_eq!("ACT".distance_to("ACT"), Distance::Dist(0));
        assert_eq!("ACT".distance_to("ACG"), Distance::Dist(1));
        assert_eq!("ACGT".distance_to("TGCA"), Distance::Dist(4));
    }

    #[test]
    fn different_lengths_are_too_far() {
        assert_eq!("ACG".distance_to("ACGT"), Distance::TooFar);
        assert!(!Distance::TooFar.within(100));
    }

    #[test]
    fn within_threshold() {
        assert!("ACT".distance_to("ACG").within(1));
        assert!(!"ACT".distance_to("AGG").within(1));
    }
}

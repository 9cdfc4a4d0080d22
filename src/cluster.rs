use crate::fragment::{Fragment, FragmentKey};
use crate::metrics::Metric;

use indexmap::IndexMap;
use itertools::Itertools;
use std::cmp::Reverse;
use std::io::Write;

/// Fragments sharing one exact (chrom, start, end, strand), with the multiset of their barcodes.
pub struct FragmentGroup {
    pub key: FragmentKey,
    /// barcode -> count, in the order each barcode was first seen
    barcodes: IndexMap<String, usize>,
}

/// Barcodes which reach each other through a chain of substitutions within the tolerance,
/// represented by the barcode elected first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeSubcluster {
    pub representative: String,
    /// aggregate count of every attached barcode
    pub count: usize,
    pub barcodes: Vec<String>,
}

impl FragmentGroup {
    pub fn new(fragment: Fragment) -> Self {
        let mut group = FragmentGroup {
            key: fragment.key,
            barcodes: IndexMap::new(),
        };
        group.add_member(&fragment.barcode);
        group
    }

    /// Whether a fragment with this key belongs to the group.
    pub fn accepts(&self, key: &FragmentKey) -> bool {
        self.key == *key
    }

    pub fn add_member(&mut self, barcode: &str) {
        match self.barcodes.get_mut(barcode) {
            Some(count) => *count += 1,
            None => {
                self.barcodes.insert(barcode.to_string(), 1);
            }
        }
    }

    /// Total number of fragments in the group.
    pub fn members(&self) -> usize {
        self.barcodes.values().sum()
    }

    /// Number of distinct barcode strings.
    pub fn distinct_barcodes(&self) -> usize {
        self.barcodes.len()
    }

    /// Partitions the barcodes into subclusters tolerating `tolerance` substitutions.
    ///
    /// Barcodes are visited by descending count, ties by first-seen order. Each one joins the
    /// first subcluster whose representative is within `tolerance`, or else founds a new
    /// subcluster as its representative. Only representatives are compared, so the result may
    /// differ from exhaustive pairwise clustering on adversarial barcode sets; this greedy
    /// election is the canonical behaviour.
    pub fn demultiplex(&self, tolerance: u32) -> Demultiplexed<'_> {
        let mut subclusters: Vec<BarcodeSubcluster> = Vec::new();

        let ordered = self
            .barcodes
            .iter()
            .enumerate()
            .sorted_by_key(|(seen, (_, count))| (Reverse(**count), *seen));

        for (_, (barcode, count)) in ordered {
            let home = subclusters.iter_mut().find(|s| {
                barcode
                    .as_str()
                    .distance_to(s.representative.as_str())
                    .within(tolerance)
            });

            match home {
                Some(subcluster) => {
                    subcluster.count += count;
                    subcluster.barcodes.push(barcode.clone());
                }
                None => subclusters.push(BarcodeSubcluster {
                    representative: barcode.clone(),
                    count: *count,
                    barcodes: vec![barcode.clone()],
                }),
            }
        }

        Demultiplexed {
            key: &self.key,
            subclusters,
        }
    }
}

/// The subclusters of one fragment group, in order of election.
pub struct Demultiplexed<'g> {
    pub key: &'g FragmentKey,
    pub subclusters: Vec<BarcodeSubcluster>,
}

impl Demultiplexed<'_> {
    /// (subcluster count, total member count)
    pub fn counts(&self) -> (usize, usize) {
        (
            self.subclusters.len(),
            self.subclusters.iter().map(|s| s.count).sum(),
        )
    }

    pub fn representatives(&self) -> Vec<&str> {
        self.subclusters
            .iter()
            .map(|s| s.representative.as_str())
            .collect()
    }

    /// Writes one BED6 line per subcluster, named `<representative>_<count>_members`.
    pub fn write_bed(&self, writer: &mut impl Write) -> std::io::Result<(usize, usize)> {
        for subcluster in self.subclusters.iter() {
            write_bed_line(
                writer,
                self.key,
                &format!("{}_{}_members", subcluster.representative, subcluster.count),
            )?;
        }
        Ok(self.counts())
    }
}

/// Writes a BED6 line for `key`. The score column carries the fragment length.
pub fn write_bed_line(writer: &mut impl Write, key: &FragmentKey, name: &str) -> std::io::Result<()> {
    writeln!(
        writer,
        "{}\t{}\t{}\t{}\t{}\t{}",
        key.chrom,
        key.start,
        key.end,
        name,
        key.len(),
        key.strand
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Strand;
    use std::collections::HashSet;
    use std::io::Cursor;

    fn group(barcodes: &[&str]) -> FragmentGroup {
        let mut group = FragmentGroup::new(Fragment::new(
            "chr1",
            10000,
            20000,
            Strand::Forward,
            barcodes[0],
        ));
        for barcode in &barcodes[1..] {
            group.add_member(barcode);
        }
        group
    }

    fn bed(demultiplexed: &Demultiplexed) -> (String, (usize, usize)) {
        let mut output = Cursor::new(Vec::new());
        let counts = demultiplexed.write_bed(&mut output).unwrap();
        (String::from_utf8(output.into_inner()).unwrap(), counts)
    }

    #[test]
    fn exact_dedup_keeps_every_barcode() {
        let g = group(&["ACT", "ACT", "ACG"]);
        assert!(!g.accepts(&FragmentKey::new("chr1", 10000, 20000, Strand::Reverse)));
        assert!(g.accepts(&FragmentKey::new("chr1", 10000, 20000, Strand::Forward)));

        let (lines, counts) = bed(&g.demultiplex(0));
        assert_eq!(counts, (2, 3));
        assert_eq!(
            lines,
            "chr1\t10000\t20000\tACT_2_members\t10000\t+\nchr1\t10000\t20000\tACG_1_members\t10000\t+\n"
        );
    }

    #[test]
    fn one_mismatch_merges_into_the_majority_barcode() {
        let g = group(&["ACT", "ACT", "ACG"]);
        let demultiplexed = g.demultiplex(1);
        assert_eq!(demultiplexed.representatives(), vec!["ACT"]);

        let (lines, counts) = bed(&demultiplexed);
        assert_eq!(counts, (1, 3));
        assert_eq!(lines, "chr1\t10000\t20000\tACT_3_members\t10000\t+\n");
    }

    #[test]
    fn ties_elect_the_first_seen_barcode() {
        let g = group(&["ACG", "ACT", "ACT", "ACG"]);
        assert_eq!(g.demultiplex(1).representatives(), vec!["ACG"]);
    }

    #[test]
    fn zero_tolerance_never_merges_distinct_barcodes() {
        let g = group(&["AAAA", "AAAT", "AATT", "ATTT", "AAAA", "TTTT", "AAAT"]);
        assert_eq!(g.demultiplex(0).counts(), (g.distinct_barcodes(), g.members()));
        assert_eq!(g.distinct_barcodes(), 5);
    }

    #[test]
    fn chains_merge_through_the_representative() {
        // AAAA elects first; AAAT is one away and joins it
        let g = group(&["AAAA", "AAAA", "AAAA", "AAAT", "AAAT", "TTTT"]);
        let demultiplexed = g.demultiplex(1);
        assert_eq!(demultiplexed.representatives(), vec!["AAAA", "TTTT"]);
        assert_eq!(demultiplexed.subclusters[0].count, 5);
        assert_eq!(demultiplexed.subclusters[0].barcodes, vec!["AAAA", "AAAT"]);

        // with enough tolerance everything is one subcluster holding every member
        let merged = g.demultiplex(4);
        assert_eq!(merged.counts(), (1, 6));
    }

    #[test]
    fn counts_are_conserved() {
        let g = group(&["ACGT", "ACGA", "TCGA", "GGGG", "ACGT", "CCCC", "ACCT"]);
        for tolerance in 0..=4 {
            let demultiplexed = g.demultiplex(tolerance);
            assert_eq!(demultiplexed.counts().1, g.members());

            let every: HashSet<&String> = demultiplexed
                .subclusters
                .iter()
                .flat_map(|s| s.barcodes.iter())
                .collect();
            assert_eq!(every.len(), g.distinct_barcodes());
        }
    }

    #[test]
    fn different_length_barcodes_never_merge() {
        let g = group(&["ACGT", "ACG"]);
        assert_eq!(g.demultiplex(3).counts(), (2, 2));
    }
}

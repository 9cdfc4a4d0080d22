use crate::cluster::FragmentGroup;
use crate::errors::CollapseError;
use crate::fragment::Fragment;

use anyhow::Result;
use std::collections::HashSet;

/// Streaming reducer over coordinate-sorted fragments, holding exactly one open group.
///
/// Input must be sorted by chromosome (each chromosome contiguous), then start, end and strand.
/// A group is handed back the moment a fragment with a different key arrives, so a closed group
/// is never revisited and memory is bounded by the largest group.
#[derive(Default)]
pub struct FragmentGrouper {
    current: Option<FragmentGroup>,
    finished_chroms: HashSet<String>,
}

impl FragmentGrouper {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a fragment, returning the previous group if this fragment closed it.
    ///
    /// # Errors
    ///
    /// `UnsortedInput` if the fragment sorts before the open group, or belongs to a chromosome
    /// whose groups were already closed.
    pub fn push(&mut self, fragment: Fragment) -> Result<Option<FragmentGroup>, CollapseError> {
        let Some(current) = self.current.as_mut() else {
            self.current = Some(FragmentGroup::new(fragment));
            return Ok(None);
        };

        if current.accepts(&fragment.key) {
            current.add_member(&fragment.barcode);
            return Ok(None);
        }

        let unsorted = if current.key.chrom == fragment.key.chrom {
            fragment.key.position() < current.key.position()
        } else {
            self.finished_chroms.contains(&fragment.key.chrom)
        };
        if unsorted {
            return Err(CollapseError::UnsortedInput {
                previous: current.key.to_string(),
                current: fragment.key.to_string(),
            });
        }

        if current.key.chrom != fragment.key.chrom {
            self.finished_chroms.insert(current.key.chrom.clone());
        }

        Ok(self.current.replace(FragmentGroup::new(fragment)))
    }

    /// Closes the last open group at the end of input.
    pub fn finish(&mut self) -> Option<FragmentGroup> {
        self.current.take()
    }
}

/// Iterates over the groups formed by a stream of fragments. Errors from the fragment stream, or
/// from the sort order check, are yielded in place and the caller should stop.
pub struct GroupIter<I> {
    fragments: I,
    grouper: FragmentGrouper,
    done: bool,
}

impl<I: Iterator<Item = Result<Fragment>>> Iterator for GroupIter<I> {
    type Item = Result<FragmentGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        for fragment in self.fragments.by_ref() {
            let closed = fragment.and_then(|f| self.grouper.push(f).map_err(anyhow::Error::from));
            match closed {
                Ok(Some(group)) => return Some(Ok(group)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        self.done = true;
        self.grouper.finish().map(Ok)
    }
}

pub fn group_fragments<I: Iterator<Item = Result<Fragment>>>(fragments: I) -> GroupIter<I> {
    GroupIter {
        fragments,
        grouper: FragmentGrouper::new(),
        done: false,
    }
}

//! Overlap Filter: narrows a file-order record stream down to the records
//! overlapping a query interval, stopping as soon as the coordinate-sorted
//! stream guarantees no further match is possible.

use crate::error::Result;
use crate::record::{bases_covered, AlignmentRecord};

/// A half-open query interval on one reference sequence.
#[derive(Debug, Clone, Copy)]
pub struct QueryInterval {
    pub ref_id: i32,
    pub beg: u32,
    pub end: u32,
}

pub struct OverlapFilter<I> {
    inner: I,
    query: QueryInterval,
    done: bool,
}

impl<I: Iterator<Item = Result<AlignmentRecord>>> OverlapFilter<I> {
    pub fn new(inner: I, query: QueryInterval) -> Self {
        OverlapFilter { inner, query, done: query.beg >= query.end }
    }
}

impl<I: Iterator<Item = Result<AlignmentRecord>>> Iterator for OverlapFilter<I> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let record = match self.inner.next()? {
                Ok(r) => r,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            if record.ref_id > self.query.ref_id {
                self.done = true;
                return None;
            }
            if record.ref_id < self.query.ref_id {
                continue;
            }

            let position = record.position as u32;
            if position >= self.query.end {
                self.done = true;
                return None;
            }
            if position > self.query.beg {
                return Some(Ok(record));
            }
            // position <= beg: overlap only if the alignment reaches past beg.
            let end_of_alignment = position + bases_covered(&record.cigar);
            if end_of_alignment <= self.query.beg {
                continue;
            }
            return Some(Ok(record));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CigarElement, CigarOp};

    fn record(ref_id: i32, position: i32, cigar: Vec<CigarElement>) -> Result<AlignmentRecord> {
        Ok(AlignmentRecord {
            ref_id, position, flag: 0, mapq: 0, cigar,
            next_ref_id: -1, next_pos: -1, template_length: 0,
            packed_sequence: Vec::new(), seq_len: 0, qualities: Vec::new(),
            name: String::new(), tags: Vec::new(), start_vo: None, end_vo: None,
        })
    }

    fn matching_cigar(len: u32) -> Vec<CigarElement> {
        vec![CigarElement { len, op: CigarOp::Match }]
    }

    #[test]
    fn empty_interval_yields_nothing() {
        let records = vec![record(0, 5, matching_cigar(10))];
        let query = QueryInterval { ref_id: 0, beg: 10, end: 10 };
        let mut filter = OverlapFilter::new(records.into_iter(), query);
        assert!(filter.next().is_none());
    }

    #[test]
    fn stops_at_greater_ref_id() {
        let records = vec![
            Ok(record(0, 5, matching_cigar(10)).unwrap()),
            Ok(record(1, 0, matching_cigar(10)).unwrap()),
        ];
        let query = QueryInterval { ref_id: 0, beg: 0, end: 1000 };
        let filter = OverlapFilter::new(records.into_iter(), query);
        let results: Vec<_> = filter.map(|r| r.unwrap().ref_id).collect();
        assert_eq!(results, vec![0]);
    }

    #[test]
    fn skips_smaller_ref_id() {
        let records = vec![record(-1, 0, matching_cigar(10)), record(0, 5, matching_cigar(10))];
        let query = QueryInterval { ref_id: 0, beg: 0, end: 1000 };
        let filter = OverlapFilter::new(records.into_iter(), query);
        let results: Vec<_> = filter.map(|r| r.unwrap().position).collect();
        assert_eq!(results, vec![5]);
    }

    #[test]
    fn stops_when_position_reaches_end() {
        let records = vec![record(0, 100, matching_cigar(10))];
        let query = QueryInterval { ref_id: 0, beg: 0, end: 100 };
        let mut filter = OverlapFilter::new(records.into_iter(), query);
        assert!(filter.next().is_none());
    }

    #[test]
    fn read_ending_exactly_at_beg_is_excluded() {
        // position + bases_covered == beg is treated as non-overlapping.
        let records = vec![record(0, 0, matching_cigar(10))];
        let query = QueryInterval { ref_id: 0, beg: 10, end: 100 };
        let mut filter = OverlapFilter::new(records.into_iter(), query);
        assert!(filter.next().is_none());
    }

    #[test]
    fn read_ending_one_past_beg_is_included() {
        let records = vec![record(0, 0, matching_cigar(11))];
        let query = QueryInterval { ref_id: 0, beg: 10, end: 100 };
        let mut filter = OverlapFilter::new(records.into_iter(), query);
        assert!(filter.next().unwrap().is_ok());
    }

    #[test]
    fn record_starting_past_beg_always_emits() {
        let records = vec![record(0, 50, Vec::new())];
        let query = QueryInterval { ref_id: 0, beg: 10, end: 100 };
        let mut filter = OverlapFilter::new(records.into_iter(), query);
        assert!(filter.next().unwrap().is_ok());
    }
}

//! Precision compaction of one metric's points.
//!
//! Points are rounded down to `precision` boundaries and every run of
//! adjacent points that lands in the same bucket is collapsed into its first
//! point. Collapsing happens in place behind a write cursor, so the buffer
//! only ever shrinks and no second buffer is allocated.

use crate::core::Point;
use crate::rollup::aggregation::Aggregation;

/// Start of the `precision`-second bucket containing `time`.
#[inline(always)]
pub fn round_down(time: u32, precision: u32) -> u32 {
    time - time % precision
}

/// Compact `points` to `precision`-second buckets.
///
/// `points` must belong to a single metric and be sorted by time; that is
/// not checked. `aggr` is only called for runs of two or more points, with
/// timestamps already rounded. Surviving points keep their relative order.
///
/// # Panics
///
/// Panics if `precision` is 0. Compiled patterns never carry such a tier.
pub fn compact(points: &mut Vec<Point>, precision: u32, aggr: &Aggregation) {
    assert!(precision > 0, "compaction precision must be greater than 0");

    let len = points.len();
    if len == 0 {
        return;
    }

    // run: index of the first point of the current bucket
    // write: slot the current run collapses into
    let mut run = 0;
    let mut write = 0;

    points[0].time = round_down(points[0].time, precision);

    for i in 1..len {
        let t = round_down(points[i].time, precision);
        points[i].time = t;

        if points[run].time != t {
            finish_run(points, run, i, write, aggr);
            write += 1;
            run = i;
        }
    }
    finish_run(points, run, len, write, aggr);

    points.truncate(write + 1);
}

#[inline]
fn finish_run(points: &mut [Point], start: usize, end: usize, write: usize, aggr: &Aggregation) {
    if end - start > 1 {
        points[start].value = aggr.reduce(&points[start..end]);
    }
    // write <= start, and everything read later sits at or after `end`
    if write != start {
        points[write] = points[start];
    }
}

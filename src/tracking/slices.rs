//! Splitting a batch of histories over independent tasks

use super::DeltaCounters;
use crate::context::TaskContext;
use std::ops::Range;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// What one task did with its slice of histories.
#[derive(Debug, Clone)]
pub struct SliceReport<R> {
    pub task: usize,
    pub histories: Range<usize>,
    pub counters: DeltaCounters,
    pub result: R,
}

/// Run `n_histories` histories as `n_tasks` contiguous slices.
///
/// Every slice gets a fresh [`TaskContext`] whose id is the slice number, so
/// results depend only on `seed` and `n_tasks`, not on scheduling. Reports
/// come back in task order.
pub fn run_slices<R, F>(n_histories: usize, n_tasks: usize, seed: u64, history: F) -> Vec<SliceReport<R>>
where
    R: Send,
    F: Fn(Range<usize>, &mut TaskContext) -> R + Sync,
{
    let n_tasks = n_tasks.max(1);
    let chunk = n_histories.div_ceil(n_tasks);
    let run = |task: usize| {
        let start = (task * chunk).min(n_histories);
        let histories = start..(start + chunk).min(n_histories);
        let mut ctx = TaskContext::new(task, seed);
        let result = history(histories.clone(), &mut ctx);
        SliceReport {
            task,
            histories,
            counters: *ctx.counters(),
            result,
        }
    };

    #[cfg(not(feature = "parallel"))]
    let reports = (0..n_tasks).map(run).collect();

    #[cfg(feature = "parallel")]
    let reports = (0..n_tasks).into_par_iter().map(run).collect();

    reports
}

/// Sum of the counters of every slice.
pub fn total_counters<R>(reports: &[SliceReport<R>]) -> DeltaCounters {
    reports.iter().fold(DeltaCounters::default(), |mut acc, r| {
        acc.merge(&r.counters);
        acc
    })
}

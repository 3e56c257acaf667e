//! Operation Scheduler (§4.6): consumes a batch of node-update
//! descriptors in dependency order, classifies each child, dispatches to
//! the right kernel variant, and applies the rescaling policy.

use crate::buffer::BufferPool;
use crate::buffer::TipSlot;
use crate::error::EngineError;
use crate::error::Result;
use crate::handle::MatrixHandle;
use crate::handle::PartialHandle;
use crate::handle::ScaleHandle;
use crate::handle::TipHandle;
use crate::kernel;
use crate::kernel::Child;
use std::collections::HashSet;

/// names either a tip slot or an internal partials buffer as a
/// descriptor's child, the Rust re-expression of BEAGLE's single dense
/// "buffer index" that silently meant one or the other depending on
/// whether it fell below `tipCount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRef {
    Tip(TipHandle),
    Internal(PartialHandle),
}

/// one node update: combine two children across their transition
/// matrices into `dest_partial`.
///
/// `dest_scale` and `source_scale` mirror BEAGLE's
/// `destinationScaleWrite`/`destinationScaleRead` pair rather than being
/// the same handle read twice: under [`Rescale::Dynamic`] the freshly
/// computed per-site factor is written to `dest_scale` (so a caller can
/// later reuse it as a `Fixed` source); under [`Rescale::Fixed`] the
/// factor to divide by is read from `source_scale`, supplied by the
/// caller ahead of time. Either or both may be `None`; the cumulative
/// log-scale buffer a batch folds into is named once, at the
/// `update_partials` call boundary, not per operation.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub dest_partial: PartialHandle,
    pub dest_scale: Option<ScaleHandle>,
    pub source_scale: Option<ScaleHandle>,
    pub child_a: (BufferRef, MatrixHandle),
    pub child_b: (BufferRef, MatrixHandle),
}

/// the three rescaling modes of §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rescale {
    #[default]
    None,
    Fixed,
    Dynamic,
}

/// runs every operation in `ops` serially, in the order supplied, against
/// `pool`. Validates the whole batch up front: if any descriptor names a
/// bad handle or a dimension mismatch, returns `Err` and writes nothing
/// (§7 fail-fast policy). When `rescale != Rescale::None`,
/// `cumulative_scale` receives `log(scale[k])` for every operation's
/// destination.
pub fn run(
    pool: &mut BufferPool,
    ops: &[Operation],
    rescale: Rescale,
    cumulative_scale: Option<ScaleHandle>,
) -> Result<()> {
    validate(pool, ops, rescale)?;
    for op in ops {
        execute_one(pool, op, rescale, cumulative_scale)?;
    }
    Ok(())
}

/// the `parallel`-feature counterpart of [`run`]: partitions `ops` into
/// dependency-respecting waves and dispatches each wave across a `rayon`
/// thread pool bounded by the host's processor count (§5: "a worker pool
/// whose size is bounded by the host's processor count"), rather than
/// rayon's own default global pool. A descriptor is safe to run in the
/// current wave once neither its destination nor any earlier descriptor
/// in the same wave reads it as a child, matching §4.6 / §5's
/// commutativity contract.
#[cfg(feature = "parallel")]
pub fn run_parallel(
    pool: &mut BufferPool,
    ops: &[Operation],
    rescale: Rescale,
    cumulative_scale: Option<ScaleHandle>,
) -> Result<()> {
    use rayon::prelude::*;

    validate(pool, ops, rescale)?;
    let worker_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build()
        .expect("building a bounded rayon thread pool never fails on a sane host");
    for wave in waves(ops) {
        let pool_ref = &*pool;
        let results: Vec<(usize, Vec<f64>, Option<Vec<f64>>)> = worker_pool.install(|| {
            wave.par_iter()
                .map(|&index| {
                    let (values, scale) = compute_one(pool_ref, &ops[index], rescale);
                    (index, values, scale)
                })
                .collect()
        });
        for (index, values, scale) in results {
            let op = &ops[index];
            pool.partial_mut(op.dest_partial)?.copy_from_slice(&values);
            apply_scale_outputs(pool, op, rescale, cumulative_scale, scale)?;
        }
    }
    Ok(())
}

/// groups operation indices into waves such that, within a wave, no
/// descriptor's children alias another descriptor's destination in the
/// same wave — the commutativity condition of §4.6/§5.
#[cfg(feature = "parallel")]
fn waves(ops: &[Operation]) -> Vec<Vec<usize>> {
    let mut remaining: Vec<usize> = (0..ops.len()).collect();
    let mut all_waves = Vec::new();
    while !remaining.is_empty() {
        let mut wave = Vec::new();
        let mut dests_this_wave: HashSet<PartialHandle> = HashSet::new();
        let mut next_remaining = Vec::new();
        for &index in &remaining {
            let op = &ops[index];
            let reads_wave_dest = wave
                .iter()
                .any(|&w: &usize| op_reads(op, ops[w].dest_partial));
            if reads_wave_dest || dests_this_wave.contains(&op.dest_partial) {
                next_remaining.push(index);
            } else {
                dests_this_wave.insert(op.dest_partial);
                wave.push(index);
            }
        }
        if wave.is_empty() {
            // no progress possible under the dependency rule; run
            // whatever is left serially-within-one-wave rather than
            // looping forever.
            wave = next_remaining.clone();
            next_remaining.clear();
        }
        all_waves.push(wave);
        remaining = next_remaining;
    }
    all_waves
}

#[cfg(feature = "parallel")]
fn op_reads(op: &Operation, handle: PartialHandle) -> bool {
    matches!(op.child_a.0, BufferRef::Internal(h) if h == handle)
        || matches!(op.child_b.0, BufferRef::Internal(h) if h == handle)
}

fn validate(pool: &BufferPool, ops: &[Operation], rescale: Rescale) -> Result<()> {
    let mut destinations = HashSet::new();
    for op in ops {
        pool.partial(op.dest_partial)?;
        if !destinations.insert(op.dest_partial) {
            return Err(EngineError::invalid(format!(
                "duplicate destination {} within one update_partials batch",
                op.dest_partial
            )));
        }
        if let Some(scale) = op.dest_scale {
            pool.scale(scale)?;
        }
        if let Some(scale) = op.source_scale {
            let buffer = pool.scale(scale)?;
            if rescale == Rescale::Fixed && buffer.as_site_local().is_none() {
                return Err(EngineError::invalid(
                    "source_scale must name a site-local buffer under Rescale::Fixed",
                ));
            }
        }
        validate_child(pool, op.child_a)?;
        validate_child(pool, op.child_b)?;
    }
    Ok(())
}

fn validate_child(pool: &BufferPool, (buffer, matrix): (BufferRef, MatrixHandle)) -> Result<()> {
    pool.matrix(matrix)?;
    match buffer {
        BufferRef::Tip(tip) => {
            pool.tip(tip)?;
        }
        BufferRef::Internal(partial) => {
            pool.partial(partial)?;
        }
    }
    Ok(())
}

fn execute_one(
    pool: &mut BufferPool,
    op: &Operation,
    rescale: Rescale,
    cumulative_scale: Option<ScaleHandle>,
) -> Result<()> {
    let (values, scale) = compute_one(pool, op, rescale);
    pool.partial_mut(op.dest_partial)?.copy_from_slice(&values);
    apply_scale_outputs(pool, op, rescale, cumulative_scale, scale)
}

/// writes a freshly computed scale factor (if any) to `op.dest_scale`
/// and folds its log into `cumulative_scale`, shared by the serial and
/// parallel dispatch paths.
fn apply_scale_outputs(
    pool: &mut BufferPool,
    op: &Operation,
    rescale: Rescale,
    cumulative_scale: Option<ScaleHandle>,
    scale: Option<Vec<f64>>,
) -> Result<()> {
    if rescale == Rescale::None {
        return Ok(());
    }
    let Some(scale_values) = scale else { return Ok(()) };
    if rescale == Rescale::Dynamic {
        if let Some(dest_scale) = op.dest_scale {
            if let crate::buffer::ScaleBuffer::SiteLocal(buf) = pool.scale_mut(dest_scale)? {
                buf.copy_from_slice(&scale_values);
            }
        }
    }
    if let Some(cumulative) = cumulative_scale {
        pool.scale_mut(cumulative)?.accumulate(&scale_values);
    }
    Ok(())
}

/// computes one operation's destination buffer (and, under rescaling,
/// its per-site scale factors) without writing it back — the shared
/// core of the serial and `rayon`-parallel dispatch paths.
fn compute_one(pool: &BufferPool, op: &Operation, rescale: Rescale) -> (Vec<f64>, Option<Vec<f64>>) {
    let dims = *pool.dims();
    let state_count = dims.state_count;
    let category_count = dims.category_count;
    let pattern_count = dims.pattern_count;

    let mut dest = vec![0.0; state_count * pattern_count * category_count];
    let matrix_a = pool.matrix(op.child_a.1).expect("validated by scheduler");
    let matrix_b = pool.matrix(op.child_b.1).expect("validated by scheduler");
    let child_a = resolve_child(pool, op.child_a.0);
    let child_b = resolve_child(pool, op.child_b.0);

    if dims.is_four_state() {
        kernel::four_state(&mut dest, child_a, matrix_a, child_b, matrix_b, category_count, pattern_count);
    } else {
        kernel::general(
            &mut dest,
            child_a,
            matrix_a,
            child_b,
            matrix_b,
            state_count,
            category_count,
            pattern_count,
        );
    }

    let scale = match rescale {
        Rescale::None => None,
        Rescale::Fixed => {
            let factors = op
                .source_scale
                .and_then(|h| pool.scale(h).ok())
                .and_then(|buf| buf.as_site_local())
                .map(<[f64]>::to_vec);
            if let Some(ref factors) = factors {
                kernel::apply_fixed_scale(&mut dest, factors, state_count, category_count, pattern_count);
            }
            factors
        }
        Rescale::Dynamic => Some(kernel::dynamic_rescale(
            &mut dest,
            state_count,
            category_count,
            pattern_count,
        )),
    };

    (dest, scale)
}

fn resolve_child(pool: &BufferPool, buffer: BufferRef) -> Child<'_> {
    match buffer {
        BufferRef::Tip(tip) => match pool.tip(tip).expect("validated by scheduler") {
            TipSlot::Resolved(states) => Child::States(states),
            TipSlot::Partial(partials) => Child::Partials(partials),
        },
        BufferRef::Internal(partial) => {
            Child::Partials(pool.partial(partial).expect("validated by scheduler"))
        }
    }
}

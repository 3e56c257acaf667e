//! Edge / Root Integrator (§4.5): folds a partial buffer against
//! category weights and equilibrium frequencies into per-site
//! log-likelihoods, matching the reference BEAGLE
//! `calcRootLogLikelihoods` / `calcEdgeLogLikelihoods` accumulation
//! order (weights outer, states inner, frequencies applied once at the
//! end) so results are deterministic given identical inputs.

use crate::buffer::BufferPool;
use crate::buffer::TipSlot;
use crate::error::EngineError;
use crate::error::Result;
use crate::handle::MatrixHandle;
use crate::handle::PartialHandle;
use crate::handle::ScaleHandle;
use crate::model::CategoryWeights;
use crate::model::Frequencies;
use crate::schedule::BufferRef;

/// `root_log_likelihoods`: `integration[k,s] = Σ_l weights[l] .
/// rootPartial[l,k,s]`, then `outLogLik[k] = log(Σ_s frequencies[s] .
/// integration[k,s]) + cumulativeLogScale[k]`.
///
/// Returns [`EngineError::UnderflowOrNaN`] if any site's frequency-weighted
/// sum is non-positive or non-finite before the logarithm is taken, so a
/// caller never observes a silent `-inf`/`NaN`.
pub fn root_log_likelihoods(
    pool: &BufferPool,
    root: PartialHandle,
    weights: &CategoryWeights,
    frequencies: &Frequencies,
    scale: Option<ScaleHandle>,
) -> Result<Vec<f64>> {
    let dims = *pool.dims();
    let root_partial = pool.partial(root)?;
    let integration = weighted_integration(root_partial, weights, dims.state_count, dims.category_count, dims.pattern_count);
    finish(pool, &integration, frequencies, scale, dims.state_count, dims.pattern_count)
}

/// `edge_log_likelihoods`: if `child` is a tip with resolved states,
/// integrates `parentPartial . M[., childState] . weight` across
/// categories; otherwise integrates `parentPartial . (M . childPartial) .
/// weight`. Sums over every category (resolving the reference
/// implementation's acknowledged `TODO: implement rate categories for
/// calculateEdgeLnL`), then applies frequencies and the logarithm exactly
/// as the root path does.
#[allow(clippy::too_many_arguments)]
pub fn edge_log_likelihoods(
    pool: &BufferPool,
    parent: PartialHandle,
    child: BufferRef,
    matrix: MatrixHandle,
    weights: &CategoryWeights,
    frequencies: &Frequencies,
    scale: Option<ScaleHandle>,
) -> Result<Vec<f64>> {
    let dims = *pool.dims();
    let state_count = dims.state_count;
    let category_count = dims.category_count;
    let pattern_count = dims.pattern_count;
    let stride = dims.matrix_stride();

    let parent_partial = pool.partial(parent)?;
    let matrix_block = pool.matrix(matrix)?;
    let mut integration = vec![0.0; pattern_count * state_count];

    let resolved_states = match child {
        BufferRef::Tip(tip) => match pool.tip(tip)? {
            TipSlot::Resolved(states) => Some(states.clone()),
            TipSlot::Partial(_) => None,
        },
        BufferRef::Internal(_) => None,
    };

    if let Some(states) = resolved_states {
        for l in 0..category_count {
            let weight = weights.get(l);
            let mat_base = l * state_count * stride;
            for k in 0..pattern_count {
                let child_state = states[k] as usize;
                let parent_base = (l * pattern_count + k) * state_count;
                let out_base = k * state_count;
                for s in 0..state_count {
                    integration[out_base + s] +=
                        matrix_block[mat_base + s * stride + child_state] * parent_partial[parent_base + s] * weight;
                }
            }
        }
    } else {
        let child_partial = match child {
            BufferRef::Tip(tip) => match pool.tip(tip)? {
                TipSlot::Partial(partials) => partials,
                TipSlot::Resolved(_) => unreachable!("resolved tips handled above"),
            },
            BufferRef::Internal(partial) => pool.partial(partial)?,
        };
        for l in 0..category_count {
            let weight = weights.get(l);
            let mat_base = l * state_count * stride;
            for k in 0..pattern_count {
                let base = (l * pattern_count + k) * state_count;
                let out_base = k * state_count;
                for s in 0..state_count {
                    let row = mat_base + s * stride;
                    let sum: f64 = (0..state_count).map(|a| matrix_block[row + a] * child_partial[base + a]).sum();
                    integration[out_base + s] += sum * parent_partial[base + s] * weight;
                }
            }
        }
    }

    finish(pool, &integration, frequencies, scale, state_count, pattern_count)
}

/// `Σ_l weights[l] . partial[l,k,s]`, folded into a `pattern_count *
/// state_count` buffer — the shared first stage of the root path.
fn weighted_integration(
    partial: &[f64],
    weights: &CategoryWeights,
    state_count: usize,
    category_count: usize,
    pattern_count: usize,
) -> Vec<f64> {
    let mut integration = vec![0.0; pattern_count * state_count];
    for l in 0..category_count {
        let weight = weights.get(l);
        let base = l * pattern_count * state_count;
        for i in 0..pattern_count * state_count {
            integration[i] += partial[base + i] * weight;
        }
    }
    integration
}

/// applies equilibrium frequencies and the logarithm, then adds the
/// cumulative log-scale if one was supplied — the tail shared by both
/// the root and edge integration paths.
fn finish(
    pool: &BufferPool,
    integration: &[f64],
    frequencies: &Frequencies,
    scale: Option<ScaleHandle>,
    state_count: usize,
    pattern_count: usize,
) -> Result<Vec<f64>> {
    let mut out = vec![0.0; pattern_count];
    for k in 0..pattern_count {
        let base = k * state_count;
        let sum: f64 = (0..state_count).map(|s| frequencies.get(s) * integration[base + s]).sum();
        if !sum.is_finite() || sum <= 0.0 {
            return Err(EngineError::UnderflowOrNaN);
        }
        out[k] = sum.ln();
    }
    if let Some(scale) = scale {
        let cumulative = pool
            .scale(scale)?
            .as_cumulative()
            .ok_or_else(|| EngineError::invalid("scale handle passed to integration must be cumulative"))?;
        for (value, log_scale) in out.iter_mut().zip(cumulative) {
            *value += log_scale;
        }
    }
    Ok(out)
}

//! Partial-Likelihood Kernel (§4.3): the hottest path in the crate. Four
//! scalar variants selected by the representation of each child (resolved
//! states vs. dense partials) with two scaling variants (none, fixed).
//! `four_state` is a direct, idiomatic-Rust re-expression of the reference
//! BEAGLE `BeagleCPU4StateImpl::calcStatesStates` /
//! `calcStatesPartials` / `calcPartialsPartials` loop structure: category
//! outer, pattern inner, state loop unrolled across the four nucleotide
//! states with the sixteen matrix entries per category prefetched into
//! local bindings. `general` is the unrolled loop's N-state generalization,
//! using the padded column to fold the wildcard lookup into the same code
//! path as a resolved state.
//!
//! None of these functions can fail: their preconditions (dimension
//! agreement, handle validity) are checked once by the scheduler before
//! dispatch (§4.6), so the kernel itself has no `Result` in its signature.

use crate::FOUR_STATE_COUNT;
use crate::FOUR_STATE_STRIDE;

/// A child's contribution at one (category, pattern) cell, abstracted
/// over whether it is a resolved tip state or a dense partial-likelihood
/// row. The wildcard state (`state_count`) always yields `1.0` via the
/// padded matrix column, so resolved/wildcard tips share one code path.
#[derive(Debug, Clone, Copy)]
pub enum Child<'a> {
    /// resolved observation per pattern; `states[k]` in `[0, state_count]`.
    States(&'a [u8]),
    /// dense `pattern_count * state_count * category_count` partial buffer.
    Partials(&'a [f64]),
}

/// fills `dest` with the unscaled product
/// `(Σ_a M1[l,s,a] childA[l,k,a]) . (Σ_b M2[l,s,b] childB[l,k,b])`
/// for every category `l`, pattern `k`, state `s`, using the four-state
/// unrolled kernel. `dest`, `matrix_a`, `matrix_b` are assumed correctly
/// sized by the caller (the scheduler validates this once per batch).
pub fn four_state(
    dest: &mut [f64],
    child_a: Child,
    matrix_a: &[f64],
    child_b: Child,
    matrix_b: &[f64],
    category_count: usize,
    pattern_count: usize,
) {
    match (child_a, child_b) {
        (Child::States(a), Child::States(b)) => {
            four_state_states_states(dest, a, matrix_a, b, matrix_b, category_count, pattern_count)
        }
        (Child::States(a), Child::Partials(b)) => {
            four_state_states_partials(dest, a, matrix_a, b, matrix_b, category_count, pattern_count)
        }
        (Child::Partials(a), Child::States(b)) => {
            // symmetric to states/partials with the matrix roles swapped.
            four_state_states_partials(dest, b, matrix_b, a, matrix_a, category_count, pattern_count)
        }
        (Child::Partials(a), Child::Partials(b)) => {
            four_state_partials_partials(dest, a, matrix_a, b, matrix_b, category_count, pattern_count)
        }
    }
}

fn four_state_states_states(
    dest: &mut [f64],
    states1: &[u8],
    matrices1: &[f64],
    states2: &[u8],
    matrices2: &[f64],
    category_count: usize,
    pattern_count: usize,
) {
    const OFFSET: usize = FOUR_STATE_STRIDE;
    let mut v = 0;
    let mut w = 0;
    for _ in 0..category_count {
        for k in 0..pattern_count {
            let state1 = states1[k] as usize;
            let state2 = states2[k] as usize;
            dest[v] = matrices1[w + state1] * matrices2[w + state2];
            dest[v + 1] = matrices1[w + OFFSET + state1] * matrices2[w + OFFSET + state2];
            dest[v + 2] = matrices1[w + OFFSET * 2 + state1] * matrices2[w + OFFSET * 2 + state2];
            dest[v + 3] = matrices1[w + OFFSET * 3 + state1] * matrices2[w + OFFSET * 3 + state2];
            v += FOUR_STATE_COUNT;
        }
        w += OFFSET * FOUR_STATE_COUNT;
    }
}

fn four_state_states_partials(
    dest: &mut [f64],
    states1: &[u8],
    matrices1: &[f64],
    partials2: &[f64],
    matrices2: &[f64],
    category_count: usize,
    pattern_count: usize,
) {
    const OFFSET: usize = FOUR_STATE_STRIDE;
    let mut u = 0;
    let mut v = 0;
    let mut w = 0;
    for _ in 0..category_count {
        let m200 = matrices2[w];
        let m201 = matrices2[w + 1];
        let m202 = matrices2[w + 2];
        let m203 = matrices2[w + 3];
        let m210 = matrices2[w + OFFSET];
        let m211 = matrices2[w + OFFSET + 1];
        let m212 = matrices2[w + OFFSET + 2];
        let m213 = matrices2[w + OFFSET + 3];
        let m220 = matrices2[w + OFFSET * 2];
        let m221 = matrices2[w + OFFSET * 2 + 1];
        let m222 = matrices2[w + OFFSET * 2 + 2];
        let m223 = matrices2[w + OFFSET * 2 + 3];
        let m230 = matrices2[w + OFFSET * 3];
        let m231 = matrices2[w + OFFSET * 3 + 1];
        let m232 = matrices2[w + OFFSET * 3 + 2];
        let m233 = matrices2[w + OFFSET * 3 + 3];

        for k in 0..pattern_count {
            let state1 = states1[k] as usize;
            let p20 = partials2[v];
            let p21 = partials2[v + 1];
            let p22 = partials2[v + 2];
            let p23 = partials2[v + 3];

            let sum0 = m200 * p20 + m201 * p21 + m202 * p22 + m203 * p23;
            let sum1 = m210 * p20 + m211 * p21 + m212 * p22 + m213 * p23;
            let sum2 = m220 * p20 + m221 * p21 + m222 * p22 + m223 * p23;
            let sum3 = m230 * p20 + m231 * p21 + m232 * p22 + m233 * p23;

            dest[u] = matrices1[w + state1] * sum0;
            dest[u + 1] = matrices1[w + OFFSET + state1] * sum1;
            dest[u + 2] = matrices1[w + OFFSET * 2 + state1] * sum2;
            dest[u + 3] = matrices1[w + OFFSET * 3 + state1] * sum3;

            u += FOUR_STATE_COUNT;
            v += FOUR_STATE_COUNT;
        }
        w += OFFSET * FOUR_STATE_COUNT;
    }
}

fn four_state_partials_partials(
    dest: &mut [f64],
    partials1: &[f64],
    matrices1: &[f64],
    partials2: &[f64],
    matrices2: &[f64],
    category_count: usize,
    pattern_count: usize,
) {
    const OFFSET: usize = FOUR_STATE_STRIDE;
    let mut u = 0;
    let mut v = 0;
    let mut w = 0;
    for _ in 0..category_count {
        let m1 = [
            [matrices1[w], matrices1[w + 1], matrices1[w + 2], matrices1[w + 3]],
            [
                matrices1[w + OFFSET],
                matrices1[w + OFFSET + 1],
                matrices1[w + OFFSET + 2],
                matrices1[w + OFFSET + 3],
            ],
            [
                matrices1[w + OFFSET * 2],
                matrices1[w + OFFSET * 2 + 1],
                matrices1[w + OFFSET * 2 + 2],
                matrices1[w + OFFSET * 2 + 3],
            ],
            [
                matrices1[w + OFFSET * 3],
                matrices1[w + OFFSET * 3 + 1],
                matrices1[w + OFFSET * 3 + 2],
                matrices1[w + OFFSET * 3 + 3],
            ],
        ];
        let m2 = [
            [matrices2[w], matrices2[w + 1], matrices2[w + 2], matrices2[w + 3]],
            [
                matrices2[w + OFFSET],
                matrices2[w + OFFSET + 1],
                matrices2[w + OFFSET + 2],
                matrices2[w + OFFSET + 3],
            ],
            [
                matrices2[w + OFFSET * 2],
                matrices2[w + OFFSET * 2 + 1],
                matrices2[w + OFFSET * 2 + 2],
                matrices2[w + OFFSET * 2 + 3],
            ],
            [
                matrices2[w + OFFSET * 3],
                matrices2[w + OFFSET * 3 + 1],
                matrices2[w + OFFSET * 3 + 2],
                matrices2[w + OFFSET * 3 + 3],
            ],
        ];

        for k in 0..pattern_count {
            let p1 = [partials1[v], partials1[v + 1], partials1[v + 2], partials1[v + 3]];
            let p2 = [partials2[v], partials2[v + 1], partials2[v + 2], partials2[v + 3]];

            for s in 0..FOUR_STATE_COUNT {
                let sum1 = m1[s][0] * p1[0] + m1[s][1] * p1[1] + m1[s][2] * p1[2] + m1[s][3] * p1[3];
                let sum2 = m2[s][0] * p2[0] + m2[s][1] * p2[1] + m2[s][2] * p2[2] + m2[s][3] * p2[3];
                dest[u + s] = sum1 * sum2;
            }

            u += FOUR_STATE_COUNT;
            v += FOUR_STATE_COUNT;
        }
        w += OFFSET * FOUR_STATE_COUNT;
    }
}

/// applies fixed per-site rescaling to an already-computed destination
/// buffer in place: `dest[l,k,s] /= scale[k]`, the scaling variant of
/// every kernel above. Kept as a separate pass (rather than folded into
/// each specialized loop) because both the four-state and general paths
/// share this exact transform.
pub fn apply_fixed_scale(
    dest: &mut [f64],
    scale: &[f64],
    state_count: usize,
    category_count: usize,
    pattern_count: usize,
) {
    let mut idx = 0;
    for _ in 0..category_count {
        for k in 0..pattern_count {
            let factor = scale[k];
            for _ in 0..state_count {
                dest[idx] /= factor;
                idx += 1;
            }
        }
    }
}

/// the dynamic rescaling variant of §4.4: computes the per-site maximum
/// across states and categories, divides it out of `dest` in place, and
/// returns the scale vector so the caller can fold its log into the
/// cumulative buffer. A floor of `f64::MIN_POSITIVE` guards against an
/// all-zero site turning division into `NaN`.
pub fn dynamic_rescale(
    dest: &mut [f64],
    state_count: usize,
    category_count: usize,
    pattern_count: usize,
) -> Vec<f64> {
    let mut scale = vec![f64::MIN_POSITIVE; pattern_count];
    for l in 0..category_count {
        for k in 0..pattern_count {
            let base = (l * pattern_count + k) * state_count;
            for s in 0..state_count {
                scale[k] = scale[k].max(dest[base + s]);
            }
        }
    }
    apply_fixed_scale(dest, &scale, state_count, category_count, pattern_count);
    scale
}

/// the general N-state path (§4.3's "general path"): iterates
/// `state_count` explicitly and uses the padded column (index
/// `state_count`) so a wildcard lookup falls through the same code as a
/// resolved state without a branch.
pub fn general(
    dest: &mut [f64],
    child_a: Child,
    matrix_a: &[f64],
    child_b: Child,
    matrix_b: &[f64],
    state_count: usize,
    category_count: usize,
    pattern_count: usize,
) {
    let stride = state_count + 1;
    for l in 0..category_count {
        let mat_base = l * state_count * stride;
        for k in 0..pattern_count {
            let dest_base = (l * pattern_count + k) * state_count;
            for s in 0..state_count {
                let row = mat_base + s * stride;
                let sum_a = child_contribution(child_a, matrix_a, row, l, k, state_count, pattern_count);
                let sum_b = child_contribution(child_b, matrix_b, row, l, k, state_count, pattern_count);
                dest[dest_base + s] = sum_a * sum_b;
            }
        }
    }
}

fn child_contribution(
    child: Child,
    matrix: &[f64],
    matrix_row: usize,
    category: usize,
    pattern: usize,
    state_count: usize,
    pattern_count: usize,
) -> f64 {
    match child {
        Child::States(states) => {
            // tip states are not per-category: one resolved observation
            // per pattern, reused against every category's matrix block.
            let state = states[pattern] as usize;
            matrix[matrix_row + state]
        }
        Child::Partials(partials) => {
            let base = (category * pattern_count + pattern) * state_count;
            (0..state_count)
                .map(|a| matrix[matrix_row + a] * partials[base + a])
                .sum()
        }
    }
}

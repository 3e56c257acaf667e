//! Transition Matrix Builder (§4.2): given an eigen-decomposed rate
//! matrix and a branch length, fills a per-category block of transition
//! probabilities with the padded wildcard column the kernel relies on.

use crate::buffer::BufferPool;
use crate::error::EngineError;
use crate::error::Result;
use crate::handle::EigenHandle;
use crate::handle::MatrixHandle;
use crate::model::CategoryRates;

/// `update_transition_matrices(eigen, edges)`: for every `(matrix, branch
/// length)` pair and every rate category `l`, computes
/// `M_l = U . diag(exp(lambda * rates[l] * branch_length)) . U^-1` and
/// writes it into the matrix block at the padded stride, with the
/// trailing wildcard column set to `1.0`.
///
/// Fails fast (§7): validates every edge before writing any matrix, so a
/// single bad branch length or handle leaves every destination in the
/// batch untouched.
pub fn update_transition_matrices(
    pool: &mut BufferPool,
    eigen: EigenHandle,
    rates: &CategoryRates,
    edges: &[(MatrixHandle, f64)],
) -> Result<()> {
    for &(matrix, branch_length) in edges {
        if !branch_length.is_finite() || branch_length < 0.0 {
            return Err(EngineError::invalid(format!(
                "branch length must be finite and non-negative, found {branch_length}"
            )));
        }
        // touch the handle now so a bad index is reported before any
        // write, preserving the all-or-nothing batch contract.
        pool.matrix(matrix)?;
    }
    pool.eigen(eigen)?;

    let dims = *pool.dims();
    let stride = dims.matrix_stride();
    let state_count = dims.state_count;
    let category_count = dims.category_count;

    for &(matrix, branch_length) in edges {
        let eigen_decomp = pool.eigen(eigen)?.clone();
        let block = pool.matrix_mut(matrix)?;
        let mut scratch = vec![0.0; state_count * state_count];
        for category in 0..category_count {
            let rate = rates.get(category);
            eigen_decomp.transition_probabilities(rate, branch_length, &mut scratch);
            let base = category * state_count * stride;
            for row in 0..state_count {
                for col in 0..state_count {
                    block[base + row * stride + col] = scratch[row * state_count + col];
                }
                block[base + row * stride + state_count] = 1.0;
            }
        }
    }
    Ok(())
}

//! Eigen Decomposition Slot: `{ U, U⁻¹, λ }` for a diagonalizable
//! rate matrix, real-valued. Supplied by the caller; this crate never
//! computes an eigendecomposition itself (§1, out of scope).

use crate::error::EngineError;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    state_count: usize,
    /// row-major `state_count x state_count`
    u: Vec<f64>,
    /// row-major `state_count x state_count`
    u_inv: Vec<f64>,
    eigenvalues: Vec<f64>,
}

impl EigenDecomposition {
    pub fn new(state_count: usize, u: &[f64], u_inv: &[f64], eigenvalues: &[f64]) -> Result<Self> {
        let expected_matrix = state_count * state_count;
        if u.len() != expected_matrix {
            return Err(EngineError::dimension_mismatch(expected_matrix, u.len()));
        }
        if u_inv.len() != expected_matrix {
            return Err(EngineError::dimension_mismatch(
                expected_matrix,
                u_inv.len(),
            ));
        }
        if eigenvalues.len() != state_count {
            return Err(EngineError::dimension_mismatch(
                state_count,
                eigenvalues.len(),
            ));
        }
        if u.iter().chain(u_inv.iter()).chain(eigenvalues.iter()).any(|v| !v.is_finite()) {
            return Err(EngineError::invalid("eigen decomposition contains a non-finite entry"));
        }
        Ok(Self {
            state_count,
            u: u.to_vec(),
            u_inv: u_inv.to_vec(),
            eigenvalues: eigenvalues.to_vec(),
        })
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// `U[row, col]`, row-major.
    pub fn u(&self, row: usize, col: usize) -> f64 {
        self.u[row * self.state_count + col]
    }

    /// `U⁻¹[row, col]`, row-major.
    pub fn u_inv(&self, row: usize, col: usize) -> f64 {
        self.u_inv[row * self.state_count + col]
    }

    pub fn eigenvalue(&self, i: usize) -> f64 {
        self.eigenvalues[i]
    }

    /// fills `out` (row-major `state_count x state_count`) with
    /// `M = U . diag(exp(lambda * rate * branch_length)) . U^-1`.
    pub fn transition_probabilities(&self, rate: f64, branch_length: f64, out: &mut [f64]) {
        let n = self.state_count;
        debug_assert_eq!(out.len(), n * n);
        let exponentials: Vec<f64> = self
            .eigenvalues
            .iter()
            .map(|&lambda| (lambda * rate * branch_length).exp())
            .collect();
        for row in 0..n {
            for col in 0..n {
                let mut sum = 0.0;
                for k in 0..n {
                    sum += self.u(row, k) * exponentials[k] * self.u_inv(k, col);
                }
                out[row * n + col] = sum;
            }
        }
    }
}

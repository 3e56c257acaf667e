//! Equilibrium frequencies: an array of length `state_count` summing
//! to one, used by the Root/Edge Integrator.

use crate::error::EngineError;
use crate::error::Result;
use crate::STOCHASTICITY_TOLERANCE;

#[derive(Debug, Clone)]
pub struct Frequencies(Vec<f64>);

impl Frequencies {
    pub fn new(state_count: usize, frequencies: &[f64]) -> Result<Self> {
        if frequencies.len() != state_count {
            return Err(EngineError::dimension_mismatch(
                state_count,
                frequencies.len(),
            ));
        }
        if frequencies.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(EngineError::invalid("frequencies must be finite and non-negative"));
        }
        let total: f64 = frequencies.iter().sum();
        if (total - 1.0).abs() > STOCHASTICITY_TOLERANCE.max(1e-6) {
            return Err(EngineError::invalid(format!(
                "frequencies must sum to 1, found {total}"
            )));
        }
        Ok(Self(frequencies.to_vec()))
    }

    pub fn get(&self, state: usize) -> f64 {
        self.0[state]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

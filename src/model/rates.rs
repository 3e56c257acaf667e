//! Category rates and category weights: two parallel arrays of length
//! `category_count`. Weights must sum to one; rates carry no such
//! constraint (a rate of zero, or of arbitrary magnitude, is valid).

use crate::error::EngineError;
use crate::error::Result;
use crate::STOCHASTICITY_TOLERANCE;

#[derive(Debug, Clone)]
pub struct CategoryRates(Vec<f64>);

impl CategoryRates {
    pub fn new(category_count: usize, rates: &[f64]) -> Result<Self> {
        if rates.len() != category_count {
            return Err(EngineError::dimension_mismatch(category_count, rates.len()));
        }
        if rates.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(EngineError::invalid("category rates must be finite and non-negative"));
        }
        Ok(Self(rates.to_vec()))
    }

    pub fn get(&self, category: usize) -> f64 {
        self.0[category]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CategoryWeights(Vec<f64>);

impl CategoryWeights {
    pub fn new(category_count: usize, weights: &[f64]) -> Result<Self> {
        if weights.len() != category_count {
            return Err(EngineError::dimension_mismatch(
                category_count,
                weights.len(),
            ));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngineError::invalid("category weights must be finite and non-negative"));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > STOCHASTICITY_TOLERANCE.max(1e-6) {
            return Err(EngineError::invalid(format!(
                "category weights must sum to 1, found {total}"
            )));
        }
        Ok(Self(weights.to_vec()))
    }

    pub fn get(&self, category: usize) -> f64 {
        self.0[category]
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

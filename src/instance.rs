//! `Instance`: the engine's single public entry point, tying the Buffer
//! Pool, Transition Matrix Builder, Scheduler, Integrator, and Checkpoint
//! together behind the capability set of §6. A single `Instance` type
//! picks its own kernel variant internally based on `dims.state_count`
//! rather than exposing incompatible four-state/general constructors —
//! see DESIGN.md for why this is the more idiomatic re-expression of the
//! distilled spec's "factory refuses to construct" framing.

use crate::buffer::BufferPool;
use crate::buffer::TipSlot;
use crate::checkpoint::Checkpoint;
use crate::config::CreationFlags;
use crate::config::InstanceDims;
use crate::error::EngineError;
use crate::error::Result;
use crate::handle::EigenHandle;
use crate::handle::MatrixHandle;
use crate::handle::PartialHandle;
use crate::handle::ScaleHandle;
use crate::handle::TipHandle;
use crate::integrate;
use crate::matrix;
use crate::model::CategoryRates;
use crate::model::CategoryWeights;
use crate::model::EigenDecomposition;
use crate::model::Frequencies;
use crate::schedule;
use crate::schedule::BufferRef;
use crate::schedule::Operation;
use crate::schedule::Rescale;

/// the partial-likelihood engine for one tree-shaped numerical problem.
/// Owns its buffers exclusively (§5: never aliased to caller memory);
/// `Send` but not `Sync` since every mutation goes through `&mut self`.
pub struct Instance {
    pool: BufferPool,
    flags: CreationFlags,
    category_rates: Option<CategoryRates>,
    category_weights: Option<CategoryWeights>,
    frequencies: Option<Frequencies>,
    checkpoint: Checkpoint,
}

impl Instance {
    /// preallocates every buffer named by `dims`. The four-state
    /// specialization is selected transparently when `dims.state_count ==
    /// 4`; every other state count uses the general scalar path. `flags`
    /// is stored for introspection (`asynch`/`cpu`/`simd` steer no actual
    /// code path in this serial, `f64`-only core beyond the optional
    /// `parallel`-feature scheduler).
    pub fn new(dims: InstanceDims, flags: CreationFlags) -> Result<Self> {
        log::debug!(
            "creating instance: tips={} states={} patterns={} categories={} four_state={}",
            dims.tip_count,
            dims.state_count,
            dims.pattern_count,
            dims.category_count,
            dims.is_four_state(),
        );
        Ok(Self {
            pool: BufferPool::new(dims)?,
            flags,
            category_rates: None,
            category_weights: None,
            frequencies: None,
            checkpoint: Checkpoint::default(),
        })
    }

    pub fn dims(&self) -> &InstanceDims {
        self.pool.dims()
    }

    pub fn flags(&self) -> CreationFlags {
        self.flags
    }

    // -- tip content ------------------------------------------------------

    pub fn set_tip_states(&mut self, tip: TipHandle, states: &[u8]) -> Result<()> {
        let state_count = self.pool.dims().state_count as u8;
        if let Some(&bad) = states.iter().find(|&&s| s > state_count) {
            return Err(EngineError::invalid(format!(
                "tip state {bad} exceeds wildcard sentinel {state_count}"
            )));
        }
        self.pool.set_tip(tip, TipSlot::Resolved(states.to_vec()))
    }

    pub fn set_tip_partials(&mut self, tip: TipHandle, partials: &[f64]) -> Result<()> {
        if let Some(&bad) = partials.iter().find(|&&p| !p.is_finite() || p < 0.0) {
            return Err(EngineError::invalid(format!(
                "tip partial entries must be finite and non-negative, found {bad}"
            )));
        }
        self.pool.set_tip(tip, TipSlot::Partial(partials.to_vec()))
    }

    // -- model -------------------------------------------------------------

    pub fn set_eigen_decomposition(
        &mut self,
        eigen: EigenHandle,
        u: &[f64],
        u_inv: &[f64],
        lambda: &[f64],
    ) -> Result<()> {
        let state_count = self.pool.dims().state_count;
        let decomposition = EigenDecomposition::new(state_count, u, u_inv, lambda)?;
        self.pool.set_eigen(eigen, decomposition)
    }

    pub fn set_category_rates(&mut self, rates: &[f64]) -> Result<()> {
        self.category_rates = Some(CategoryRates::new(self.pool.dims().category_count, rates)?);
        Ok(())
    }

    pub fn set_category_weights(&mut self, weights: &[f64]) -> Result<()> {
        self.category_weights = Some(CategoryWeights::new(self.pool.dims().category_count, weights)?);
        Ok(())
    }

    pub fn set_state_frequencies(&mut self, frequencies: &[f64]) -> Result<()> {
        self.frequencies = Some(Frequencies::new(self.pool.dims().state_count, frequencies)?);
        Ok(())
    }

    // -- transition matrices -------------------------------------------------

    /// direct write, bypassing the builder.
    pub fn set_transition_matrix(&mut self, matrix: MatrixHandle, values: &[f64]) -> Result<()> {
        self.pool.set_matrix(matrix, values)
    }

    pub fn update_transition_matrices(
        &mut self,
        eigen: EigenHandle,
        edges: &[(MatrixHandle, f64)],
    ) -> Result<()> {
        let rates = self
            .category_rates
            .clone()
            .unwrap_or_else(|| CategoryRates::new(self.pool.dims().category_count, &vec![1.0; self.pool.dims().category_count]).expect("uniform rate-1 fallback is always valid"));
        matrix::update_transition_matrices(&mut self.pool, eigen, &rates, edges)
    }

    // -- partial likelihoods -------------------------------------------------

    pub fn update_partials(
        &mut self,
        ops: &[Operation],
        rescale: Rescale,
        cumulative_scale: Option<ScaleHandle>,
    ) -> Result<()> {
        #[cfg(feature = "parallel")]
        {
            if self.flags.asynch {
                return schedule::run_parallel(&mut self.pool, ops, rescale, cumulative_scale);
            }
        }
        schedule::run(&mut self.pool, ops, rescale, cumulative_scale)
    }

    /// no-op in this serial core; kept for interface symmetry with an
    /// eventual async back-end (§6).
    pub fn wait_for_partials(&self, _destinations: &[PartialHandle]) -> Result<()> {
        Ok(())
    }

    // -- integration ---------------------------------------------------------

    pub fn calculate_root_log_likelihoods(
        &self,
        root: PartialHandle,
        scale: Option<ScaleHandle>,
    ) -> Result<Vec<f64>> {
        let weights = self.require_weights()?;
        let frequencies = self.require_frequencies()?;
        integrate::root_log_likelihoods(&self.pool, root, weights, frequencies, scale)
    }

    pub fn calculate_edge_log_likelihoods(
        &self,
        parent: PartialHandle,
        child: BufferRef,
        matrix: MatrixHandle,
        scale: Option<ScaleHandle>,
    ) -> Result<Vec<f64>> {
        let weights = self.require_weights()?;
        let frequencies = self.require_frequencies()?;
        integrate::edge_log_likelihoods(&self.pool, parent, child, matrix, weights, frequencies, scale)
    }

    /// part of the public surface for forward compatibility with §4.5;
    /// not computed by this spec.
    pub fn calculate_edge_log_likelihoods_with_derivatives(&self) -> Result<Vec<f64>> {
        Err(EngineError::NotImplemented("branch-length derivatives"))
    }

    fn require_weights(&self) -> Result<&CategoryWeights> {
        self.category_weights
            .as_ref()
            .ok_or_else(|| EngineError::invalid("category weights must be set before integration"))
    }

    fn require_frequencies(&self) -> Result<&Frequencies> {
        self.frequencies
            .as_ref()
            .ok_or_else(|| EngineError::invalid("state frequencies must be set before integration"))
    }

    // -- scale factor bookkeeping ---------------------------------------------

    pub fn accumulate_scale_factors(&mut self, cumulative: ScaleHandle, sources: &[ScaleHandle]) -> Result<()> {
        for &source in sources {
            let factors = self
                .pool
                .scale(source)?
                .as_site_local()
                .ok_or_else(|| EngineError::invalid("accumulate_scale_factors sources must be site-local"))?
                .to_vec();
            self.pool.scale_mut(cumulative)?.accumulate(&factors);
        }
        Ok(())
    }

    pub fn remove_scale_factors(&mut self, cumulative: ScaleHandle, sources: &[ScaleHandle]) -> Result<()> {
        for &source in sources {
            let factors = self
                .pool
                .scale(source)?
                .as_site_local()
                .ok_or_else(|| EngineError::invalid("remove_scale_factors sources must be site-local"))?
                .to_vec();
            self.pool.scale_mut(cumulative)?.remove(&factors);
        }
        Ok(())
    }

    /// re-initializes `cumulative` as a log-domain accumulator at zero,
    /// establishing it as a cumulative scale buffer if it was not
    /// already one. This is the only public way to designate a scale
    /// buffer handle as the cumulative kind: every buffer starts out
    /// site-local (§3), and a caller names its chosen accumulator by
    /// resetting it here before the first `update_partials` batch that
    /// folds into it.
    pub fn reset_scale_factors(&mut self, cumulative: ScaleHandle) -> Result<()> {
        let pattern_count = self.pool.dims().pattern_count;
        *self.pool.scale_mut(cumulative)? = crate::buffer::ScaleBuffer::cumulative(pattern_count);
        Ok(())
    }

    // -- checkpoint ------------------------------------------------------------

    pub fn store_state(&mut self) -> Result<()> {
        self.checkpoint.store(&self.pool);
        Ok(())
    }

    pub fn restore_state(&mut self) -> Result<()> {
        self.checkpoint.restore(&mut self.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::PartialHandle;
    use crate::model::eigen::tests::jukes_cantor;

    fn dims() -> InstanceDims {
        InstanceDims {
            tip_count: 2,
            partials_buffer_count: 1,
            compact_buffer_count: 0,
            state_count: 4,
            pattern_count: 1,
            eigen_buffer_count: 1,
            matrix_buffer_count: 2,
            category_count: 1,
            scale_buffer_count: 1,
        }
    }

    fn jc_instance() -> Instance {
        let mut instance = Instance::new(dims(), CreationFlags::cpu_synchronous()).unwrap();
        let jc = jukes_cantor();
        instance
            .set_eigen_decomposition(EigenHandle::from(0), &jc_matrix(&jc, 0), &jc_matrix(&jc, 1), &jc_eigenvalues(&jc))
            .unwrap();
        instance.set_category_rates(&[1.0]).unwrap();
        instance.set_category_weights(&[1.0]).unwrap();
        instance.set_state_frequencies(&[0.25, 0.25, 0.25, 0.25]).unwrap();
        instance
    }

    fn jc_matrix(eigen: &EigenDecomposition, which: usize) -> Vec<f64> {
        let mut out = vec![0.0; 16];
        for row in 0..4 {
            for col in 0..4 {
                out[row * 4 + col] = if which == 0 { eigen.u(row, col) } else { eigen.u_inv(row, col) };
            }
        }
        out
    }

    fn jc_eigenvalues(eigen: &EigenDecomposition) -> Vec<f64> {
        (0..4).map(|i| eigen.eigenvalue(i)).collect()
    }

    #[test]
    fn scenario_s1_root_log_likelihood() {
        let mut instance = jc_instance();
        instance.set_tip_states(TipHandle::from(0), &[0]).unwrap();
        instance.set_tip_states(TipHandle::from(1), &[0]).unwrap();
        instance
            .update_transition_matrices(EigenHandle::from(0), &[(MatrixHandle::from(0), 0.0), (MatrixHandle::from(1), 0.0)])
            .unwrap();
        let op = Operation {
            dest_partial: PartialHandle::from(0),
            dest_scale: None,
            source_scale: None,
            child_a: (BufferRef::Tip(TipHandle::from(0)), MatrixHandle::from(0)),
            child_b: (BufferRef::Tip(TipHandle::from(1)), MatrixHandle::from(1)),
        };
        instance.update_partials(&[op], Rescale::None, None).unwrap();
        let log_lik = instance.calculate_root_log_likelihoods(PartialHandle::from(0), None).unwrap();
        assert!((log_lik[0] - 0.25_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn integration_without_weights_is_rejected() {
        let instance = Instance::new(dims(), CreationFlags::cpu_synchronous()).unwrap();
        let err = instance.calculate_root_log_likelihoods(PartialHandle::from(0), None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidValue(_)));
    }

    #[test]
    fn checkpoint_round_trip_through_instance() {
        let mut instance = jc_instance();
        instance.set_tip_states(TipHandle::from(0), &[0]).unwrap();
        instance.set_tip_states(TipHandle::from(1), &[0]).unwrap();
        instance
            .update_transition_matrices(EigenHandle::from(0), &[(MatrixHandle::from(0), 0.0), (MatrixHandle::from(1), 0.0)])
            .unwrap();
        let op = Operation {
            dest_partial: PartialHandle::from(0),
            dest_scale: None,
            source_scale: None,
            child_a: (BufferRef::Tip(TipHandle::from(0)), MatrixHandle::from(0)),
            child_b: (BufferRef::Tip(TipHandle::from(1)), MatrixHandle::from(1)),
        };
        instance.update_partials(&[op], Rescale::None, None).unwrap();
        instance.store_state().unwrap();
        let before = instance.pool.partial(PartialHandle::from(0)).unwrap().to_vec();

        instance.set_tip_states(TipHandle::from(0), &[1]).unwrap();
        instance.update_partials(&[op], Rescale::None, None).unwrap();

        instance.restore_state().unwrap();
        assert_eq!(instance.pool.partial(PartialHandle::from(0)).unwrap(), before.as_slice());
    }

    #[test]
    fn derivatives_are_not_implemented() {
        let instance = jc_instance();
        let err = instance.calculate_edge_log_likelihoods_with_derivatives().unwrap_err();
        assert!(matches!(err, EngineError::NotImplemented(_)));
    }
}

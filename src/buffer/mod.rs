//! Buffer Pool: owns every contiguous numeric array the engine touches —
//! partials, transition-matrix blocks, tip content, scale buffers — and
//! hands out the stable integer handles defined in [`crate::handle`].
//!
//! Preallocated once at [`crate::instance::Instance::new`] and never
//! resized; every accessor below is a bounds/kind check away from a raw
//! slice into one contiguous `Vec<f64>`.

pub mod scale;
pub mod tip;

pub use scale::ScaleBuffer;
pub use tip::TipSlot;

use crate::config::InstanceDims;
use crate::error::EngineError;
use crate::error::Result;
use crate::handle::EigenHandle;
use crate::handle::MatrixHandle;
use crate::handle::PartialHandle;
use crate::handle::ScaleHandle;
use crate::handle::TipHandle;
use crate::model::EigenDecomposition;

/// Owns all instance-scoped storage. `tip_count` slots are addressed
/// `[0, tip_count)`; internal partials occupy a disjoint Rust `Vec`
/// indexed directly by `PartialHandle`, so the two handle kinds never
/// collide even though BEAGLE's own dense index space would place them
/// back to back.
#[derive(Debug, Clone)]
pub struct BufferPool {
    dims: InstanceDims,
    tips: Vec<TipSlot>,
    partials: Vec<Vec<f64>>,
    matrices: Vec<Vec<f64>>,
    scales: Vec<ScaleBuffer>,
    eigens: Vec<Option<EigenDecomposition>>,
}

impl BufferPool {
    /// Preallocates every buffer named by `dims`. Returns
    /// [`EngineError::OutOfMemory`] only if a requested count's implied
    /// allocation size would overflow `usize` — the pool otherwise always
    /// succeeds since it is backed by the process heap.
    pub fn new(dims: InstanceDims) -> Result<Self> {
        let partial_len = dims
            .pattern_count
            .checked_mul(dims.state_count)
            .and_then(|v| v.checked_mul(dims.category_count))
            .ok_or(EngineError::OutOfMemory)?;
        let matrix_len = dims
            .category_count
            .checked_mul(dims.state_count)
            .and_then(|v| v.checked_mul(dims.matrix_stride()))
            .ok_or(EngineError::OutOfMemory)?;

        let tips = vec![TipSlot::wildcard(dims.pattern_count, dims.state_count); dims.tip_count];
        let partials = vec![vec![0.0; partial_len]; dims.partials_buffer_count];
        let matrices = (0..dims.matrix_buffer_count)
            .map(|_| identity_matrix_block(&dims, matrix_len))
            .collect();
        let scales = (0..dims.scale_buffer_count)
            .map(|_| ScaleBuffer::site_local(dims.pattern_count))
            .collect();
        let eigens = vec![None; dims.eigen_buffer_count];

        Ok(Self {
            dims,
            tips,
            partials,
            matrices,
            scales,
            eigens,
        })
    }

    pub fn dims(&self) -> &InstanceDims {
        &self.dims
    }

    // -- tips -----------------------------------------------------------

    pub fn tip(&self, handle: TipHandle) -> Result<&TipSlot> {
        self.tips
            .get(handle.index())
            .ok_or_else(|| EngineError::bad_handle(TipHandle::KIND, handle.index()))
    }

    pub fn set_tip(&mut self, handle: TipHandle, slot: TipSlot) -> Result<()> {
        let dims = self.dims;
        let len = self
            .tips
            .get_mut(handle.index())
            .ok_or_else(|| EngineError::bad_handle(TipHandle::KIND, handle.index()))?;
        match &slot {
            TipSlot::Resolved(states) if states.len() != dims.pattern_count => {
                return Err(EngineError::dimension_mismatch(
                    dims.pattern_count,
                    states.len(),
                ));
            }
            TipSlot::Partial(partials) => {
                let expected = dims.pattern_count * dims.state_count * dims.category_count;
                if partials.len() != expected {
                    return Err(EngineError::dimension_mismatch(expected, partials.len()));
                }
            }
            _ => {}
        }
        *len = slot;
        Ok(())
    }

    // -- partials ---------------------------------------------------------

    pub fn partial(&self, handle: PartialHandle) -> Result<&[f64]> {
        self.partials
            .get(handle.index())
            .map(Vec::as_slice)
            .ok_or_else(|| EngineError::bad_handle(PartialHandle::KIND, handle.index()))
    }

    pub fn partial_mut(&mut self, handle: PartialHandle) -> Result<&mut [f64]> {
        self.partials
            .get_mut(handle.index())
            .map(Vec::as_mut_slice)
            .ok_or_else(|| EngineError::bad_handle(PartialHandle::KIND, handle.index()))
    }

    // -- transition matrices -----------------------------------------------

    pub fn matrix(&self, handle: MatrixHandle) -> Result<&[f64]> {
        self.matrices
            .get(handle.index())
            .map(Vec::as_slice)
            .ok_or_else(|| EngineError::bad_handle(MatrixHandle::KIND, handle.index()))
    }

    pub fn matrix_mut(&mut self, handle: MatrixHandle) -> Result<&mut [f64]> {
        self.matrices
            .get_mut(handle.index())
            .map(Vec::as_mut_slice)
            .ok_or_else(|| EngineError::bad_handle(MatrixHandle::KIND, handle.index()))
    }

    pub fn set_matrix(&mut self, handle: MatrixHandle, values: &[f64]) -> Result<()> {
        let expected = self.dims.category_count * self.dims.state_count * self.dims.matrix_stride();
        if values.len() != expected {
            return Err(EngineError::dimension_mismatch(expected, values.len()));
        }
        let dest = self.matrix_mut(handle)?;
        dest.copy_from_slice(values);
        Ok(())
    }

    // -- scale buffers ------------------------------------------------------

    pub fn scale(&self, handle: ScaleHandle) -> Result<&ScaleBuffer> {
        self.scales
            .get(handle.index())
            .ok_or_else(|| EngineError::bad_handle(ScaleHandle::KIND, handle.index()))
    }

    pub fn scale_mut(&mut self, handle: ScaleHandle) -> Result<&mut ScaleBuffer> {
        self.scales
            .get_mut(handle.index())
            .ok_or_else(|| EngineError::bad_handle(ScaleHandle::KIND, handle.index()))
    }

    // -- eigen decompositions -------------------------------------------------

    pub fn eigen(&self, handle: EigenHandle) -> Result<&EigenDecomposition> {
        self.eigens
            .get(handle.index())
            .ok_or_else(|| EngineError::bad_handle(EigenHandle::KIND, handle.index()))?
            .as_ref()
            .ok_or_else(|| EngineError::bad_handle(EigenHandle::KIND, handle.index()))
    }

    pub fn set_eigen(&mut self, handle: EigenHandle, eigen: EigenDecomposition) -> Result<()> {
        let slot = self
            .eigens
            .get_mut(handle.index())
            .ok_or_else(|| EngineError::bad_handle(EigenHandle::KIND, handle.index()))?;
        *slot = Some(eigen);
        Ok(())
    }

    // -- checkpoint support ---------------------------------------------------

    pub(crate) fn partials_snapshot(&self) -> Vec<Vec<f64>> {
        self.partials.clone()
    }

    pub(crate) fn scales_snapshot(&self) -> Vec<ScaleBuffer> {
        self.scales.clone()
    }

    pub(crate) fn restore_partials(&mut self, snapshot: &[Vec<f64>]) {
        self.partials.clone_from_slice(snapshot);
    }

    pub(crate) fn restore_scales(&mut self, snapshot: &[ScaleBuffer]) {
        self.scales.clone_from_slice(snapshot);
    }
}

/// a freshly allocated matrix block starts out as `category_count`
/// copies of the identity matrix (a branch length of zero is the
/// natural "nothing has happened yet" default), with the padded
/// wildcard column already set to `1.0`.
fn identity_matrix_block(dims: &InstanceDims, matrix_len: usize) -> Vec<f64> {
    let mut block = vec![0.0; matrix_len];
    let stride = dims.matrix_stride();
    for category in 0..dims.category_count {
        let base = category * dims.state_count * stride;
        for state in 0..dims.state_count {
            block[base + state * stride + state] = 1.0;
            block[base + state * stride + dims.state_count] = 1.0;
        }
    }
    block
}

//! TOML scenario loading for the `evaluate` demo binary (§2 ambient
//! stack): a self-contained description of an instance's dimensions,
//! substitution model, tip observations, transition-matrix edges, and
//! operation batch, so the binary can exercise the full public surface
//! without a tree-search caller.

use crate::config::CreationFlags;
use crate::config::InstanceDims;
use crate::error::EngineError;
use crate::error::Result;
use crate::handle::EigenHandle;
use crate::handle::MatrixHandle;
use crate::handle::PartialHandle;
use crate::handle::ScaleHandle;
use crate::handle::TipHandle;
use crate::instance::Instance;
use crate::schedule::BufferRef;
use crate::schedule::Operation;
use crate::schedule::Rescale;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub dims: InstanceDims,
    pub model: Model,
    #[serde(default)]
    pub tips: Vec<TipEntry>,
    #[serde(default)]
    pub edges: Vec<EdgeEntry>,
    #[serde(default)]
    pub operations: Vec<OperationEntry>,
    pub root: usize,
    #[serde(default)]
    pub rescale: RescaleKind,
    /// the cumulative log-scale buffer to fold into when `rescale` is
    /// `fixed` or `dynamic`; ignored under `none`.
    #[serde(default)]
    pub scale_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct Model {
    pub u: Vec<f64>,
    pub u_inv: Vec<f64>,
    pub lambda: Vec<f64>,
    pub rates: Vec<f64>,
    pub weights: Vec<f64>,
    pub frequencies: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct TipEntry {
    pub handle: usize,
    #[serde(default)]
    pub states: Option<Vec<u8>>,
    #[serde(default)]
    pub partials: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct EdgeEntry {
    pub matrix: usize,
    pub branch_length: f64,
}

#[derive(Debug, Deserialize)]
pub struct OperationEntry {
    pub dest: usize,
    pub child_a: ChildEntry,
    pub child_b: ChildEntry,
}

#[derive(Debug, Deserialize)]
pub struct ChildEntry {
    #[serde(default)]
    pub tip: Option<usize>,
    #[serde(default)]
    pub partial: Option<usize>,
    pub matrix: usize,
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RescaleKind {
    #[default]
    None,
    Fixed,
    Dynamic,
}

impl From<RescaleKind> for Rescale {
    fn from(kind: RescaleKind) -> Self {
        match kind {
            RescaleKind::None => Rescale::None,
            RescaleKind::Fixed => Rescale::Fixed,
            RescaleKind::Dynamic => Rescale::Dynamic,
        }
    }
}

impl ChildEntry {
    fn resolve(&self) -> Result<BufferRef> {
        match (self.tip, self.partial) {
            (Some(tip), None) => Ok(BufferRef::Tip(TipHandle::from(tip))),
            (None, Some(partial)) => Ok(BufferRef::Internal(PartialHandle::from(partial))),
            _ => Err(EngineError::invalid(
                "operation child must name exactly one of `tip` or `partial`",
            )),
        }
    }
}

impl Scenario {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EngineError::invalid(format!("malformed scenario: {e}")))
    }

    /// builds an [`Instance`], loads the model and tip content, refreshes
    /// the named transition matrices, runs the operation batch, and
    /// returns the root log-likelihoods — the full pipeline described in
    /// §2's data flow, assembled from one file.
    pub fn evaluate(&self) -> Result<Vec<f64>> {
        let mut instance = Instance::new(self.dims, CreationFlags::cpu_synchronous())?;
        instance.set_eigen_decomposition(EigenHandle::from(0), &self.model.u, &self.model.u_inv, &self.model.lambda)?;
        instance.set_category_rates(&self.model.rates)?;
        instance.set_category_weights(&self.model.weights)?;
        instance.set_state_frequencies(&self.model.frequencies)?;

        for tip in &self.tips {
            match (&tip.states, &tip.partials) {
                (Some(states), None) => instance.set_tip_states(TipHandle::from(tip.handle), states)?,
                (None, Some(partials)) => instance.set_tip_partials(TipHandle::from(tip.handle), partials)?,
                _ => {
                    return Err(EngineError::invalid(format!(
                        "tip {} must name exactly one of `states` or `partials`",
                        tip.handle
                    )))
                }
            }
        }

        let edges: Vec<(MatrixHandle, f64)> = self
            .edges
            .iter()
            .map(|e| (MatrixHandle::from(e.matrix), e.branch_length))
            .collect();
        if !edges.is_empty() {
            instance.update_transition_matrices(EigenHandle::from(0), &edges)?;
        }

        let ops: Vec<Operation> = self
            .operations
            .iter()
            .map(|entry| {
                Ok(Operation {
                    dest_partial: PartialHandle::from(entry.dest),
                    dest_scale: None,
                    source_scale: None,
                    child_a: (entry.child_a.resolve()?, MatrixHandle::from(entry.child_a.matrix)),
                    child_b: (entry.child_b.resolve()?, MatrixHandle::from(entry.child_b.matrix)),
                })
            })
            .collect::<Result<_>>()?;

        let cumulative_scale = match (self.rescale, self.scale_index) {
            (RescaleKind::None, _) => None,
            (_, Some(index)) => {
                let handle = ScaleHandle::from(index);
                instance.reset_scale_factors(handle)?;
                Some(handle)
            }
            (_, None) => {
                return Err(EngineError::invalid(
                    "`rescale` is `fixed` or `dynamic` but no `scale_index` was given",
                ))
            }
        };

        if !ops.is_empty() {
            instance.update_partials(&ops, self.rescale.into(), cumulative_scale)?;
        }

        instance.calculate_root_log_likelihoods(PartialHandle::from(self.root), cumulative_scale)
    }
}

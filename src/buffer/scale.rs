//! Scale buffers: per-site multiplicative factors (site-local) or
//! per-site log-domain accumulators (cumulative), as described in
//! §4.4 of the scaling policy.

/// per-site scale storage. the two variants are never reinterpreted as
/// each other: a site-local buffer holds positive reals you divide by,
/// a cumulative buffer holds logs you add.
#[derive(Debug, Clone)]
pub enum ScaleBuffer {
    SiteLocal(Vec<f64>),
    Cumulative(Vec<f64>),
}

impl ScaleBuffer {
    pub fn site_local(pattern_count: usize) -> Self {
        Self::SiteLocal(vec![1.0; pattern_count])
    }

    pub fn cumulative(pattern_count: usize) -> Self {
        Self::Cumulative(vec![0.0; pattern_count])
    }

    pub fn as_site_local(&self) -> Option<&[f64]> {
        match self {
            Self::SiteLocal(v) => Some(v),
            Self::Cumulative(_) => None,
        }
    }

    pub fn as_cumulative(&self) -> Option<&[f64]> {
        match self {
            Self::Cumulative(v) => Some(v),
            Self::SiteLocal(_) => None,
        }
    }

    /// add `log(scale[k])` into a cumulative buffer for every site `k`.
    /// no-op (and returns `false`) if called on a site-local buffer.
    pub fn accumulate(&mut self, scale: &[f64]) -> bool {
        match self {
            Self::Cumulative(log_scale) => {
                for (acc, &s) in log_scale.iter_mut().zip(scale) {
                    *acc += s.ln();
                }
                true
            }
            Self::SiteLocal(_) => false,
        }
    }

    /// subtract `log(scale[k])` from a cumulative buffer, the inverse of
    /// [`Self::accumulate`]. used by `remove_scale_factors`.
    pub fn remove(&mut self, scale: &[f64]) -> bool {
        match self {
            Self::Cumulative(log_scale) => {
                for (acc, &s) in log_scale.iter_mut().zip(scale) {
                    *acc -= s.ln();
                }
                true
            }
            Self::SiteLocal(_) => false,
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Cumulative(log_scale) => log_scale.iter_mut().for_each(|v| *v = 0.0),
            Self::SiteLocal(scale) => scale.iter_mut().for_each(|v| *v = 1.0),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::SiteLocal(v) | Self::Cumulative(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

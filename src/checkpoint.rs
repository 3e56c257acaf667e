//! State Checkpoint (§4.7): a single eager snapshot of every mutable
//! numeric buffer, used by callers running speculative tree proposals.
//! Exactly one slot is kept — a second `store_state` silently discards
//! the first, matching the distilled spec's "multiple successive
//! `storeState` calls discard prior snapshots" verbatim.

use crate::buffer::BufferPool;
use crate::buffer::ScaleBuffer;
use crate::error::EngineError;
use crate::error::Result;

/// an eager clone of every partial and scale buffer in a [`BufferPool`].
/// Transition matrices, tip content, and the model (eigen/rates/weights/
/// frequencies) are not part of the snapshot: §4.7 scopes checkpoints to
/// "partials and scale buffers," the state a speculative `update_partials`
/// batch actually mutates.
#[derive(Debug, Clone)]
pub struct Snapshot {
    partials: Vec<Vec<f64>>,
    scales: Vec<ScaleBuffer>,
}

impl Snapshot {
    pub(crate) fn capture(pool: &BufferPool) -> Self {
        Self {
            partials: pool.partials_snapshot(),
            scales: pool.scales_snapshot(),
        }
    }

    pub(crate) fn restore_into(&self, pool: &mut BufferPool) {
        pool.restore_partials(&self.partials);
        pool.restore_scales(&self.scales);
    }
}

/// holds at most one [`Snapshot`]. `store` overwrites whatever was there;
/// `restore` fails with [`EngineError::InvalidValue`] if nothing was ever
/// stored.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    snapshot: Option<Snapshot>,
}

impl Checkpoint {
    pub fn store(&mut self, pool: &BufferPool) {
        self.snapshot = Some(Snapshot::capture(pool));
    }

    pub fn restore(&self, pool: &mut BufferPool) -> Result<()> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| EngineError::invalid("restore_state called with no prior store_state"))?;
        snapshot.restore_into(pool);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceDims;
    use crate::handle::PartialHandle;

    fn dims() -> InstanceDims {
        InstanceDims {
            tip_count: 1,
            partials_buffer_count: 1,
            compact_buffer_count: 0,
            state_count: 4,
            pattern_count: 2,
            eigen_buffer_count: 1,
            matrix_buffer_count: 1,
            category_count: 1,
            scale_buffer_count: 1,
        }
    }

    #[test]
    fn restore_without_store_is_an_error() {
        let pool = BufferPool::new(dims()).unwrap();
        let checkpoint = Checkpoint::default();
        let mut pool_mut = pool;
        assert!(checkpoint.restore(&mut pool_mut).is_err());
    }

    #[test]
    fn round_trip_restores_bitexact_content() {
        let mut pool = BufferPool::new(dims()).unwrap();
        let mut checkpoint = Checkpoint::default();
        pool.partial_mut(PartialHandle::from(0)).unwrap()[0] = 0.5;
        checkpoint.store(&pool);

        pool.partial_mut(PartialHandle::from(0)).unwrap()[0] = 0.9;
        checkpoint.restore(&mut pool).unwrap();

        assert_eq!(pool.partial(PartialHandle::from(0)).unwrap()[0], 0.5);
    }

    #[test]
    fn second_store_discards_first_snapshot() {
        let mut pool = BufferPool::new(dims()).unwrap();
        let mut checkpoint = Checkpoint::default();
        pool.partial_mut(PartialHandle::from(0)).unwrap()[0] = 0.1;
        checkpoint.store(&pool);
        pool.partial_mut(PartialHandle::from(0)).unwrap()[0] = 0.2;
        checkpoint.store(&pool);
        pool.partial_mut(PartialHandle::from(0)).unwrap()[0] = 0.3;
        checkpoint.restore(&mut pool).unwrap();
        assert_eq!(pool.partial(PartialHandle::from(0)).unwrap()[0], 0.2);
    }
}

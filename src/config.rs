//! Instance configuration: the dimensional counts fixed at creation
//! time, and the preference/requirement flags used to pick a kernel
//! back-end.

use serde::Deserialize;
use serde::Serialize;

/// the dimensional counts that determine every buffer size the pool
/// preallocates. fixed for the lifetime of an [`crate::instance::Instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDims {
    pub tip_count: usize,
    pub partials_buffer_count: usize,
    pub compact_buffer_count: usize,
    pub state_count: usize,
    pub pattern_count: usize,
    pub eigen_buffer_count: usize,
    pub matrix_buffer_count: usize,
    pub category_count: usize,
    pub scale_buffer_count: usize,
}

impl InstanceDims {
    /// row stride of one category's transition-matrix block, including
    /// the padded wildcard column.
    pub fn matrix_stride(&self) -> usize {
        self.state_count + 1
    }

    /// whether this configuration qualifies for the unrolled four-state
    /// kernel specialization.
    pub fn is_four_state(&self) -> bool {
        self.state_count == crate::FOUR_STATE_COUNT
    }
}

/// preference and requirement flags requested at creation, mirroring
/// BEAGLE's `ASYNCH`/`CPU`/`DOUBLE`/SIMD flag vocabulary. `double` is
/// always honored (this crate has no single-precision path); the others
/// steer back-end selection inside [`crate::instance::Instance::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreationFlags {
    pub asynch: bool,
    pub cpu: bool,
    pub double: bool,
    pub simd: bool,
}

impl CreationFlags {
    pub fn cpu_synchronous() -> Self {
        Self {
            asynch: false,
            cpu: true,
            double: true,
            simd: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(state_count: usize) -> InstanceDims {
        InstanceDims {
            tip_count: 2,
            partials_buffer_count: 1,
            compact_buffer_count: 0,
            state_count,
            pattern_count: 1,
            eigen_buffer_count: 1,
            matrix_buffer_count: 2,
            category_count: 1,
            scale_buffer_count: 1,
        }
    }

    #[test]
    fn four_state_is_detected() {
        assert!(dims(4).is_four_state());
        assert!(!dims(20).is_four_state());
    }

    #[test]
    fn matrix_stride_is_padded() {
        assert_eq!(dims(4).matrix_stride(), 5);
        assert_eq!(dims(20).matrix_stride(), 21);
    }
}

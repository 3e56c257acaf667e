pub mod buffer;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod handle;
pub mod instance;
pub mod integrate;
pub mod kernel;
pub mod matrix;
pub mod model;
#[cfg(feature = "cli")]
pub mod scenario;
pub mod schedule;

pub use config::CreationFlags;
pub use config::InstanceDims;
pub use error::EngineError;
pub use handle::EigenHandle;
pub use handle::MatrixHandle;
pub use handle::PartialHandle;
pub use handle::ScaleHandle;
pub use handle::TipHandle;
pub use instance::Instance;
pub use schedule::BufferRef;
pub use schedule::Operation;
pub use schedule::Rescale;

/// dimensional analysis types
pub type Probability = f64;
pub type Rate = f64;
pub type BranchLength = f64;
pub type LogLikelihood = f64;

/// row stride of a padded transition-matrix block for the four-state
/// specialization: four resolved columns plus one wildcard column.
pub const FOUR_STATE_COUNT: usize = 4;
pub const FOUR_STATE_STRIDE: usize = FOUR_STATE_COUNT + 1;

/// relative tolerance used when checking that rows of a transition
/// matrix, or a distribution such as frequencies/weights, sum to one.
pub const STOCHASTICITY_TOLERANCE: f64 = 1e-10;

/// initialize process-wide logging. safe to call more than once; only
/// the first call takes effect. never invoked implicitly by the library,
/// only by the demo binary and by tests that want visible diagnostics.
#[cfg(feature = "cli")]
pub fn init_logging() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let config = simplelog::ConfigBuilder::new()
            .set_time_level(log::LevelFilter::Off)
            .set_thread_level(log::LevelFilter::Off)
            .build();
        let _ = simplelog::TermLogger::init(
            log::LevelFilter::Info,
            config,
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        );
    });
}

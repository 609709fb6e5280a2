pub mod config;
pub mod error;
pub mod metric;
pub mod multires;
pub mod optimizer;
pub mod progress;
pub mod registration;
pub mod sampler;
pub mod schedule;
pub mod sink;
pub mod validation;

pub use config::RegistrationConfig;
pub use error::{RegistrationError, Result};
pub use multires::{CommittedTransform, MultiScaleRegistration, RegistrationOutcome, RegistrationState};
pub use progress::{ConsoleProgressCallback, HistoryCallback, ProgressBarCallback, ProgressCallback, ProgressInfo, ProgressState, ProgressTracker};
pub use sampler::FiberSampler;
pub use schedule::{RegistrationMode, ScaleEntry, ScaleSchedule};
pub use sink::{MemorySink, RegistrationSink};

pub mod reporter;
pub mod summary;

pub use reporter::{Reporter, TracingReporter};
pub use summary::{EpisodeSummary, EpisodeTally, StepReport, TrainingReport};

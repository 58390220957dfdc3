// 1. Traits
pub use crate::agent::Agent;
pub use crate::data::encoder::StateEncoder;
pub use crate::data_provider::PriceSeriesProvider;
pub use crate::math::rate::RateSource;
pub use crate::report::Reporter;

// 2. The Core "Loop" Types
pub use crate::gym::trading::{
    action::{ActionKind, ActionScores, Decision},
    config::{DEFAULT_CHECKPOINT_DIR, TrainConfig},
    env::Trainer,
    execution::Execution,
    ledger::Account,
    observation::Observation,
};
pub use crate::gym::{EpisodeStatus, Reward, RunStatus};

// 3. Financial Domain Types
pub use crate::data::domain::{Cash, Price};
pub use crate::data::series::PriceSeries;

// 4. Agents
pub use crate::agent::{
    AgentKind,
    ddpg::{DdpgAgent, DdpgConfig},
    dqn::{DqnAgent, DqnConfig},
    memory::{ReplayMemory, Transition},
    noise::OuNoiseConfig,
};

// 5. Errors
pub use crate::error::{
    AgentError, DataError, EnvError, IoError, SystemError, TraderError, TraderResult,
};

// 6. Providers, Encoders & Reports
pub use crate::data::encoder::SigmoidWindowEncoder;
pub use crate::data_provider::{CsvPriceSeries, StaticPriceSeries};
pub use crate::math::rate::{FixedRate, TreasuryBondRate};
pub use crate::report::{EpisodeSummary, StepReport, TracingReporter, TrainingReport};

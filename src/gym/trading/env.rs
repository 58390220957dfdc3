use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    agent::{Agent, memory::Transition},
    data::{
        domain::Cash,
        encoder::{SigmoidWindowEncoder, StateEncoder},
        series::PriceSeries,
    },
    error::{EnvError, SystemError, TraderResult},
    gym::{
        EpisodeStatus, Reward, RunStatus,
        trading::{config::TrainConfig, execution::execute, observation::Observation},
    },
    math::rate::{RateSource, TreasuryBondRate},
    report::{EpisodeSummary, EpisodeTally, Reporter, StepReport, TrainingReport},
};

/// Drives an agent through repeated episodes over one price series.
///
/// Every episode resets the agent's trading state, then steps
/// `t = 1 ..= trading_period`. Each step encodes the market, asks the agent
/// for a decision on the previous observation, executes it, shapes the
/// reward, records the transition and, once the agent's memory exceeds its
/// batch size, triggers exactly one learning update.
///
/// # Example
///
/// ```no_run
/// # use replay_trader::prelude::*;
/// # fn example() -> TraderResult<()> {
/// let prices = StaticPriceSeries::new()
///     .with_series("DEMO", vec![100.0, 101.0, 99.0, 105.0, 98.0])
///     .load("DEMO")?;
/// let config = TrainConfig::default().with_window_size(3).with_num_episode(2);
///
/// let mut trainer = Trainer::new(config, prices)?;
/// let mut agent = AgentKind::Dqn.build(trainer.state_dim(), Cash(1000.0), Some(7))?;
/// let report = trainer.run(&mut agent, &mut TracingReporter::default())?;
/// # Ok(())
/// # }
/// ```
pub struct Trainer {
    config: TrainConfig,
    prices: PriceSeries,
    encoder: Box<dyn StateEncoder>,
    rate_source: Box<dyn RateSource>,

    // === Run state ===
    run_status: RunStatus,
    episode_status: EpisodeStatus,
    /// Learning updates performed so far in the current run.
    update_count: u64,
}

impl Trainer {
    pub fn new(config: TrainConfig, prices: PriceSeries) -> TraderResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            prices,
            encoder: Box::new(SigmoidWindowEncoder),
            rate_source: Box::new(TreasuryBondRate::default()),
            run_status: RunStatus::Ready,
            episode_status: EpisodeStatus::Init,
            update_count: 0,
        })
    }

    pub fn with_encoder(self, encoder: impl StateEncoder + 'static) -> Self {
        Self {
            encoder: Box::new(encoder),
            ..self
        }
    }

    /// Replaces the source of the daily risk-free rate used for the
    /// opportunity cost of idle cash.
    pub fn with_rate_source(self, rate_source: impl RateSource + 'static) -> Self {
        Self {
            rate_source: Box::new(rate_source),
            ..self
        }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn prices(&self) -> &PriceSeries {
        &self.prices
    }

    /// Length of every observation handed to the agent.
    pub fn state_dim(&self) -> usize {
        self.encoder.state_dim(self.config.window_size)
    }

    pub fn status(&self) -> RunStatus {
        self.run_status
    }

    pub fn episode_status(&self) -> EpisodeStatus {
        self.episode_status
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Runs all configured episodes and returns the cross-episode report.
    ///
    /// Any failure (encoding, agent decision, learning update, checkpoint)
    /// aborts the run.
    #[tracing::instrument(
        skip_all,
        fields(agent = agent.identifier(), instrument = self.prices.instrument())
    )]
    pub fn run<A, R>(&mut self, agent: &mut A, reporter: &mut R) -> TraderResult<TrainingReport>
    where
        A: Agent + ?Sized,
        R: Reporter + ?Sized,
    {
        self.run_status = RunStatus::Ready;
        self.update_count = 0;

        let trading_period = self.prices.trading_period();
        let mut report = TrainingReport::new(
            self.prices.instrument(),
            agent.identifier(),
            self.config.clone(),
        );

        let pb = if self.config.show_progress {
            progress_bar((self.config.num_episode * trading_period) as u64)?
        } else {
            ProgressBar::hidden()
        };

        tracing::info!(
            num_episode = self.config.num_episode,
            trading_period,
            window_size = self.config.window_size,
            initial_funding = %self.config.initial_funding,
            "Training Started"
        );

        for episode in 1..=self.config.num_episode {
            self.run_status = RunStatus::Episode(episode);
            pb.set_message(format!("Episode {episode}/{}", self.config.num_episode));

            let summary = self.run_episode(episode, agent, reporter, &pb)?;
            reporter.on_episode_end(&summary);
            report.push(summary);

            if let Some(path) = self.config.checkpoint_path(agent.identifier(), episode) {
                agent.save(&path)?;
                tracing::info!(episode, path = %path.display(), "Checkpoint Saved");
            }
        }

        self.run_status = RunStatus::Finished;
        pb.finish_with_message("Training complete.");
        reporter.on_finish(&report);
        Ok(report)
    }

    #[tracing::instrument(skip(self, agent, reporter, pb))]
    fn run_episode<A, R>(
        &mut self,
        episode: usize,
        agent: &mut A,
        reporter: &mut R,
        pb: &ProgressBar,
    ) -> TraderResult<EpisodeSummary>
    where
        A: Agent + ?Sized,
        R: Reporter + ?Sized,
    {
        self.episode_status = EpisodeStatus::Init;
        agent.reset(self.config.initial_funding);
        tracing::info!(episode, num_episode = self.config.num_episode, "Episode Starting");

        let mut state = self.observe(0, agent)?;
        let mut tally = EpisodeTally::default();
        self.episode_status = EpisodeStatus::Stepping;

        let trading_period = self.prices.trading_period();
        for t in 1..=trading_period {
            let (step, hold_overridden) = self.step(episode, t, &mut state, agent)?;
            tally.record(&step, hold_overridden);
            reporter.on_step(&step);
            pb.inc(1);
        }

        self.episode_status = EpisodeStatus::Done;
        Ok(EpisodeSummary::from_account(
            episode,
            agent.account(),
            self.rate_source.daily_rate(),
            &tally,
        ))
    }

    /// One step of the episode protocol. `state` is the previous observation
    /// on entry and this step's observation on return.
    fn step<A>(
        &mut self,
        episode: usize,
        t: usize,
        state: &mut Observation,
        agent: &mut A,
    ) -> TraderResult<(StepReport, bool)>
    where
        A: Agent + ?Sized,
    {
        let price = self.prices.price(t)?;
        let next_state = self.observe(t, agent)?;
        let previous_value = agent.account().portfolio_value(price);

        let mut decision = agent.decide(state, t)?;
        let execution = execute(agent.account_mut(), &decision, price);

        let mut reward = match &execution {
            None => self.opportunity_cost(agent.account().balance()),
            Some(executed) => executed.realized_profit,
        };
        let hold_overridden = match execution.as_ref().and_then(|e| e.scores) {
            Some(scores) => {
                decision.scores = scores;
                true
            }
            None => false,
        };

        let account = agent.account();
        let current_value = account.portfolio_value(price);
        reward += Reward((current_value - account.initial_portfolio_value()).0);

        let return_rate = step_return_rate(previous_value, current_value)?;
        agent.account_mut().record_step(current_value, return_rate);

        let done = t == self.prices.trading_period();
        let previous_state = std::mem::replace(state, next_state.clone());
        agent.remember(Transition {
            state: previous_state,
            decision,
            reward,
            next_state,
            done,
        });

        let loss = if agent.memory_len() > agent.batch_size() {
            self.update_count += 1;
            Some(agent.experience_replay(self.update_count)?)
        } else {
            None
        };

        let account = agent.account();
        let step = StepReport {
            episode,
            t,
            trading_period: self.prices.trading_period(),
            price,
            decision,
            execution,
            reward,
            balance: account.balance(),
            holdings: account.holdings(),
            portfolio_value: current_value,
            loss,
        };
        Ok((step, hold_overridden))
    }

    fn observe<A>(&self, t: usize, agent: &A) -> TraderResult<Observation>
    where
        A: Agent + ?Sized,
    {
        let account = agent.account();
        self.encoder.encode(
            t,
            self.config.window_size,
            &self.prices,
            account.balance(),
            account.holdings(),
        )
    }

    /// Negative reward for leaving `balance` idle for one day.
    fn opportunity_cost(&self, balance: Cash) -> Reward {
        -Reward(self.rate_source.daily_rate() * balance.0)
    }
}

/// `(current - previous) / previous`, refusing a zero base.
fn step_return_rate(previous: Cash, current: Cash) -> TraderResult<f64> {
    if previous.0 == 0.0 {
        return Err(SystemError::InvariantViolation(
            "previous portfolio value is zero; step return rate is undefined".to_string(),
        )
        .into());
    }
    Ok((current - previous).0 / previous.0)
}

// ================================================================================================
// Helper Functions
// ================================================================================================

fn progress_bar(capacity: u64) -> TraderResult<ProgressBar> {
    let bar = ProgressBar::new(capacity);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(concat!(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] ",
                "{pos}/{len} ({eta_precise}) {msg}"
            ))
            .map_err(EnvError::ProgressBar)?
            .progress_chars("#>-"));
    Ok(bar)
}

use crate::report::summary::{EpisodeSummary, StepReport, TrainingReport};

/// Observer of a training run.
///
/// The trainer calls these hooks in order and never consumes a return
/// value; every hook defaults to doing nothing.
pub trait Reporter {
    fn on_step(&mut self, _step: &StepReport) {}

    fn on_episode_end(&mut self, _summary: &EpisodeSummary) {}

    fn on_finish(&mut self, _report: &TrainingReport) {}
}

impl Reporter for () {}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn on_step(&mut self, step: &StepReport) {
        (**self).on_step(step)
    }

    fn on_episode_end(&mut self, summary: &EpisodeSummary) {
        (**self).on_episode_end(summary)
    }

    fn on_finish(&mut self, report: &TrainingReport) {
        (**self).on_finish(report)
    }
}

/// Reports progress through `tracing` events.
///
/// Steps are logged at `debug` level, with a milestone at `info` every
/// `milestone_every` steps; learning updates are logged at `debug`.
#[derive(Debug, Clone, Copy)]
pub struct TracingReporter {
    milestone_every: usize,
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self {
            milestone_every: 100,
        }
    }
}

impl TracingReporter {
    pub fn with_milestone_every(self, milestone_every: usize) -> Self {
        Self {
            milestone_every: milestone_every.max(1),
        }
    }
}

impl Reporter for TracingReporter {
    fn on_step(&mut self, step: &StepReport) {
        if step.t % self.milestone_every == 0 {
            tracing::info!(
                episode = step.episode,
                t = step.t,
                trading_period = step.trading_period,
                "Period Milestone"
            );
        }

        let [hold, buy, sell] = step.decision.scores.0;
        tracing::debug!(
            t = step.t,
            hold = format_args!("{hold:.4}"),
            buy = format_args!("{buy:.4}"),
            sell = format_args!("{sell:.4}"),
            action = %step.decision.action,
            exploration = step.decision.is_exploration(),
            "Step Decision"
        );

        if let Some(execution) = &step.execution {
            tracing::debug!(t = step.t, result = %execution, "Step Executed");
        }

        if let Some(loss) = step.loss {
            tracing::debug!(
                episode = step.episode,
                loss = format_args!("{loss:.2}"),
                action = %step.decision.action,
                reward = format_args!("{:.2}", step.reward.0),
                balance = %step.balance,
                holdings = step.holdings,
                "Learning Update"
            );
        }
    }

    fn on_episode_end(&mut self, summary: &EpisodeSummary) {
        tracing::info!(
            episode = summary.episode,
            final_value = %summary.final_value,
            total_return = %summary.total_return,
            mean_return_rate = ?summary.mean_return_rate,
            sharpe_ratio = ?summary.sharpe_ratio,
            max_drawdown = format_args!("{:.2}%", summary.max_drawdown * 100.0),
            buys = summary.buys,
            sells = summary.sells,
            "Episode Complete"
        );
    }

    fn on_finish(&mut self, report: &TrainingReport) {
        let best = report.best_episode();
        tracing::info!(
            agent = %report.agent,
            instrument = %report.instrument,
            episodes = report.episodes.len(),
            best_episode = ?best.map(|s| s.episode),
            best_return = ?best.map(|s| s.total_return.0),
            "Training Finished"
        );
    }
}

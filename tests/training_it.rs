use std::fs;

use replay_trader::prelude::*;

mod common;

use common::{
    RecordingReporter, ScriptedAgent, quiet_config, scratch_dir, series, twenty_prices,
};

// ================================================================================================
// End-to-End Episodes
// ================================================================================================

#[test]
fn single_episode_over_twenty_prices() {
    for kind in [AgentKind::Dqn, AgentKind::Ddpg] {
        let prices = twenty_prices();
        let mut trainer =
            Trainer::new(quiet_config(10, 1, 1000.0), series(prices.clone())).unwrap();
        let mut agent = kind.build(trainer.state_dim(), Cash(1000.0), Some(17)).unwrap();

        let report = trainer.run(&mut agent, &mut ()).unwrap();

        let account = agent.account();
        let trading_period = prices.len() - 1;
        assert_eq!(account.portfolio_values().len(), trading_period);
        assert_eq!(account.return_rates().len(), trading_period);

        let last_price = prices[trading_period];
        let expected = account.balance().0 + account.holdings() as f64 * last_price;
        let final_value = account.portfolio_values()[trading_period - 1];
        assert!((final_value.0 - expected).abs() < 1e-9, "{kind}");

        assert_eq!(report.returns_across_episodes.len(), 1);
        assert!((report.returns_across_episodes[0] - (expected - 1000.0)).abs() < 1e-9);
        assert!(agent.account().balance().0 >= 0.0);
    }
}

#[test]
fn every_step_keeps_portfolio_identity_and_solvency() {
    let prices = twenty_prices();
    let mut trainer = Trainer::new(quiet_config(10, 2, 250.0), series(prices.clone())).unwrap();
    let mut agent = AgentKind::Dqn.build(trainer.state_dim(), Cash(250.0), Some(3)).unwrap();
    let mut reporter = RecordingReporter::default();

    trainer.run(&mut agent, &mut reporter).unwrap();

    assert_eq!(reporter.steps.len(), 2 * (prices.len() - 1));
    for step in &reporter.steps {
        let identity = step.balance.0 + step.holdings as f64 * step.price.0;
        assert!((step.portfolio_value.0 - identity).abs() < 1e-9);
        assert!(step.balance.0 >= 0.0);
        match &step.execution {
            Some(execution) if execution.executed == ActionKind::Buy => {
                // Pre-trade balance strictly exceeded the price.
                assert!(step.balance.0 + step.price.0 > step.price.0);
            }
            None if step.decision.action == ActionKind::Buy => {
                assert!(step.balance.0 <= step.price.0);
            }
            _ => {}
        }
    }
    assert_eq!(reporter.episodes.len(), 2);
    assert_eq!(reporter.finished, 1);
}

#[test]
fn sells_release_the_oldest_lot_first() {
    let prices = vec![10.0, 20.0, 30.0, 40.0, 50.0];
    let mut trainer = Trainer::new(quiet_config(2, 1, 1000.0), series(prices)).unwrap();
    let mut agent = ScriptedAgent::new(100).with_script(&[
        ActionKind::Buy,
        ActionKind::Buy,
        ActionKind::Sell,
        ActionKind::Hold,
    ]);
    let mut reporter = RecordingReporter::default();

    trainer.run(&mut agent, &mut reporter).unwrap();

    let sale = reporter.steps[2].execution.clone().unwrap();
    assert_eq!(sale.executed, ActionKind::Sell);
    assert_eq!(sale.realized_profit, Reward(40.0 - 20.0));
    assert_eq!(agent.account().inventory().iter().copied().collect::<Vec<_>>(), vec![Price(30.0)]);
}

// ================================================================================================
// Learning Cadence & Persistence
// ================================================================================================

#[test]
fn replay_cadence_spans_episodes() {
    let mut trainer = Trainer::new(quiet_config(3, 3, 100.0), series(vec![5.0; 6])).unwrap();
    let mut agent = ScriptedAgent::new(4);

    trainer.run(&mut agent, &mut ()).unwrap();

    // 5 steps per episode; memory first exceeds 4 at step 5 of episode 1.
    assert_eq!(agent.memory().len(), 15);
    assert_eq!(agent.replays, (1..=11).collect::<Vec<u64>>());
}

#[test]
fn reset_between_episodes_keeps_learned_parameters() {
    let config = DqnConfig {
        batch_size: 4,
        memory_capacity: 64,
        ..Default::default()
    };
    let mut trainer = Trainer::new(quiet_config(10, 2, 1000.0), series(twenty_prices())).unwrap();
    let mut agent = DqnAgent::new(trainer.state_dim(), Cash(1000.0), config, Some(21)).unwrap();
    let state = Observation::from(vec![0.5; trainer.state_dim()]);
    let initial = agent.predict(&state).unwrap();

    trainer.run(&mut agent, &mut ()).unwrap();
    let learned = agent.predict(&state).unwrap();
    assert_ne!(learned, initial);
    assert!(trainer.update_count() > 0);

    agent.reset(Cash(1000.0));

    assert_eq!(agent.account().balance(), Cash(1000.0));
    assert!(agent.account().inventory().is_empty());
    assert!(agent.account().portfolio_values().is_empty());
    assert_eq!(agent.predict(&state).unwrap(), learned);
}

#[test]
fn checkpoints_every_fifth_episode() {
    let dir = scratch_dir("checkpoints");
    let config = quiet_config(2, 10, 100.0).with_checkpoint_dir(&dir);
    let mut trainer = Trainer::new(config, series(vec![10.0, 11.0, 9.0])).unwrap();
    let mut agent = AgentKind::Dqn.build(trainer.state_dim(), Cash(100.0), Some(1)).unwrap();

    trainer.run(&mut agent, &mut ()).unwrap();

    let mut written: Vec<String> = fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    assert_eq!(written, vec!["DQN_ep10.postcard", "DQN_ep5.postcard"]);

    let restored = DqnAgent::load(&dir.join("DQN_ep10.postcard"), Cash(100.0), None).unwrap();
    assert_eq!(restored.account().balance(), Cash(100.0));

    fs::remove_dir_all(&dir).ok();
}

// ================================================================================================
// Data & Reporting
// ================================================================================================

#[test]
fn trains_from_csv_and_writes_report() {
    let dir = scratch_dir("csv");
    fs::create_dir_all(&dir).unwrap();
    let mut csv = String::from("Date,Open,Close\n");
    for (i, close) in twenty_prices().iter().enumerate() {
        csv.push_str(&format!("2015-01-{:02},{},{}\n", i + 1, close - 1.0, close));
    }
    fs::write(dir.join("DEMO.csv"), csv).unwrap();

    let prices = CsvPriceSeries::new(&dir).load("DEMO").unwrap();
    assert_eq!(prices.len(), 20);

    let mut trainer = Trainer::new(quiet_config(5, 2, 1000.0), prices)
        .unwrap()
        .with_rate_source(TreasuryBondRate::from_bps(500));
    let mut agent = AgentKind::Ddpg.build(trainer.state_dim(), Cash(1000.0), Some(8)).unwrap();
    let report = trainer.run(&mut agent, &mut TracingReporter::default()).unwrap();

    assert_eq!(report.instrument, "DEMO");
    assert_eq!(report.agent, "DDPG");
    assert_eq!(report.episodes.len(), 2);

    let json = dir.join("out/report.json");
    report.to_json(&json).unwrap();
    let parsed: TrainingReport = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(parsed.returns_across_episodes.len(), 2);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn unknown_model_name_fails_before_training() {
    let err = AgentKind::parse("A2C").unwrap_err();
    assert!(matches!(err, TraderError::Agent(AgentError::UnknownKind(_))));
}

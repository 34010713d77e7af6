//! End-to-end trading-day scenarios.
//!
//! Each test seeds an in-memory market database and debate store, runs a
//! day with scripted analysts through `DebateRunner`, and checks the
//! DailyState that lands in the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use debate_agents::test_support::{historical_records, ScriptedAnalyst};
use debate_agents::{Analyst, AnalystStatus, DebateRunner, RunError, RunnerSettings};
use debate_data::{DataReader, MarketRecordStore};
use debate_models::{
    AggregateError, DailyState, DataFolder, DebateKey, Decision, Normalization, RunMode, Vote,
};
use debate_store::{Ledger, StateStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
}

fn key() -> DebateKey {
    DebateKey::new("TSLA", "GPT3.5", "V2")
}

fn market() -> Arc<DataReader> {
    let mut store = MarketRecordStore::open_in_memory().unwrap();
    let opens: Vec<(NaiveDate, f64)> = (1..=10).map(|d| (day(d), 160.0 + d as f64)).collect();
    store
        .insert_records("TSLA", DataFolder::Historical, &historical_records(&opens))
        .unwrap();
    Arc::new(DataReader::new(store, 100, Duration::from_secs(60)))
}

fn settings(run_mode: RunMode) -> RunnerSettings {
    RunnerSettings {
        expected_opinions: 6,
        run_mode,
        total_timeout: Duration::from_secs(10),
        timeseries_points: 10,
        transcript_dir: None,
    }
}

/// Ledger with genesis on day 1 and, when `held > 0`, a BUY to `held` on day 2.
fn ledger_holding(held: Decimal) -> Arc<Ledger> {
    let ledger = Ledger::new(StateStore::open_in_memory().unwrap());
    ledger.seed_genesis(&key(), day(1)).unwrap();
    if held > Decimal::ZERO {
        let mut state = DailyState::genesis(&key(), day(2));
        state.content = "MDfinAnalyst: opening a position".to_string();
        state.decision = Decision::Buy;
        state.price = "162".to_string();
        state.position = true;
        state.positionsize = held;
        ledger.insert_daily_state(&state).unwrap();
    }
    Arc::new(ledger)
}

fn runner(analysts: Vec<ScriptedAnalyst>, ledger: &Arc<Ledger>, run_mode: RunMode) -> DebateRunner {
    let analysts = analysts
        .into_iter()
        .map(|a| Arc::new(a) as Arc<dyn Analyst>)
        .collect();
    DebateRunner::new(
        key(),
        "Tesla".to_string(),
        analysts,
        market(),
        Arc::clone(ledger),
        settings(run_mode),
    )
}

#[tokio::test]
async fn holding_fifty_buy_plurality_averages_buyers() {
    let ledger = ledger_holding(dec!(50));
    let report = runner(
        vec![
            ScriptedAnalyst::buy("MDfinAnalyst", dec!(58)),
            ScriptedAnalyst::buy("MDnewsAnalyst", dec!(60)),
            ScriptedAnalyst::buy("MDnrelAnalyst", dec!(62)),
            ScriptedAnalyst::hold("MDtserAnalyst", dec!(50)),
            ScriptedAnalyst::hold("MDearnAnalyst", dec!(50)),
            ScriptedAnalyst::sell("MDkeyAnalyst", dec!(40)),
        ],
        &ledger,
        RunMode::Sequential,
    )
    .run_day(day(3))
    .await
    .unwrap();

    assert_eq!(report.aggregation.winner, Vote::Buy);
    assert_eq!(report.aggregation.tally.buy, 3);
    assert_eq!(report.state.decision, Decision::Buy);
    assert_eq!(report.state.positionsize, dec!(60));
    assert!(report.state.position);
    assert_eq!(
        report.aggregation.agreeing,
        vec!["MDfinAnalyst", "MDnewsAnalyst", "MDnrelAnalyst"]
    );
    // Newest historical open is day 10.
    assert_eq!(report.state.price, "170");

    let stored = ledger.latest_state(&key()).unwrap().unwrap();
    assert_eq!(stored, report.state);
}

#[tokio::test]
async fn flat_sell_is_normalized_before_tally() {
    let ledger = ledger_holding(Decimal::ZERO);
    let report = runner(
        vec![
            ScriptedAnalyst::sell("MDfinAnalyst", dec!(0)),
            ScriptedAnalyst::sell("MDnewsAnalyst", dec!(0)),
            ScriptedAnalyst::sell("MDnrelAnalyst", dec!(0)),
            ScriptedAnalyst::buy("MDtserAnalyst", dec!(25)),
            ScriptedAnalyst::buy("MDearnAnalyst", dec!(35)),
            ScriptedAnalyst::hold("MDkeyAnalyst", dec!(0)),
        ],
        &ledger,
        RunMode::Sequential,
    )
    .run_day(day(2))
    .await
    .unwrap();

    // Three SELLs became HOLDs, so HOLD wins 4-2.
    assert_eq!(report.aggregation.tally.hold, 4);
    assert_eq!(report.aggregation.tally.sell, 0);
    assert_eq!(report.state.decision, Decision::Hold);
    assert_eq!(report.state.positionsize, dec!(0));
    assert!(!report.state.position);

    let opinions = ledger.opinions_for(day(2), &key()).unwrap();
    assert!(opinions
        .iter()
        .filter(|o| o.agent != "MDtserAnalyst" && o.agent != "MDearnAnalyst")
        .all(|o| o.decision == Decision::Hold && !o.position));

    let normalized = report
        .outcomes
        .iter()
        .filter(|o| {
            matches!(&o.status, AnalystStatus::Recorded { normalizations, .. }
                if normalizations.contains(&Normalization::SellWhileFlat))
        })
        .count();
    assert_eq!(normalized, 3);
}

#[tokio::test]
async fn three_way_tie_holds_at_yesterdays_size() {
    let ledger = ledger_holding(dec!(50));
    let report = runner(
        vec![
            ScriptedAnalyst::buy("MDfinAnalyst", dec!(70)),
            ScriptedAnalyst::buy("MDnewsAnalyst", dec!(80)),
            ScriptedAnalyst::sell("MDnrelAnalyst", dec!(20)),
            ScriptedAnalyst::sell("MDtserAnalyst", dec!(0)),
            ScriptedAnalyst::hold("MDearnAnalyst", dec!(50)),
            ScriptedAnalyst::hold("MDkeyAnalyst", dec!(50)),
        ],
        &ledger,
        RunMode::Parallel,
    )
    .run_day(day(3))
    .await
    .unwrap();

    assert!(report.aggregation.tied);
    assert_eq!(report.state.decision, Decision::Hold);
    assert_eq!(report.state.positionsize, dec!(50));
    assert!(report.state.position);
}

#[tokio::test]
async fn buy_sell_tie_without_holders_keeps_position() {
    let ledger = ledger_holding(dec!(50));
    let report = runner(
        vec![
            ScriptedAnalyst::buy("MDfinAnalyst", dec!(70)),
            ScriptedAnalyst::buy("MDnewsAnalyst", dec!(80)),
            ScriptedAnalyst::buy("MDnrelAnalyst", dec!(90)),
            ScriptedAnalyst::sell("MDtserAnalyst", dec!(20)),
            ScriptedAnalyst::sell("MDearnAnalyst", dec!(10)),
            ScriptedAnalyst::sell("MDkeyAnalyst", dec!(0)),
        ],
        &ledger,
        RunMode::Sequential,
    )
    .run_day(day(3))
    .await
    .unwrap();

    assert!(report.aggregation.tied);
    assert!(report.aggregation.agreeing.is_empty());
    assert_eq!(report.state.decision, Decision::Hold);
    assert_eq!(report.state.positionsize, dec!(50));
}

#[tokio::test]
async fn hold_with_drifted_size_is_pinned() {
    let ledger = ledger_holding(dec!(50));
    let report = runner(
        vec![
            ScriptedAnalyst::hold("MDfinAnalyst", dec!(55)),
            ScriptedAnalyst::hold("MDnewsAnalyst", dec!(50)),
            ScriptedAnalyst::reply("MDnrelAnalyst", Decision::NonAction, dec!(0)),
            ScriptedAnalyst::hold("MDtserAnalyst", dec!(50)).with_position_flag(false),
            ScriptedAnalyst::buy("MDearnAnalyst", dec!(75)),
            ScriptedAnalyst::sell("MDkeyAnalyst", dec!(30)),
        ],
        &ledger,
        RunMode::Sequential,
    )
    .run_day(day(3))
    .await
    .unwrap();

    assert_eq!(report.aggregation.winner, Vote::Hold);
    assert_eq!(report.state.positionsize, dec!(50));

    let opinions = ledger.opinions_for(day(3), &key()).unwrap();
    let nrel = opinions.iter().find(|o| o.agent == "MDnrelAnalyst").unwrap();
    assert_eq!(nrel.decision, Decision::NonAction);
    assert_eq!(nrel.positionsize, dec!(50));
    let tser = opinions.iter().find(|o| o.agent == "MDtserAnalyst").unwrap();
    assert!(tser.position);
}

#[tokio::test]
async fn a_week_of_trading_keeps_state_consistent() {
    let ledger = ledger_holding(Decimal::ZERO);
    let script: [(Vote, Decimal); 3] = [
        (Vote::Buy, dec!(30)),
        (Vote::Sell, dec!(12)),
        (Vote::Sell, dec!(0)),
    ];

    for (offset, (vote, size)) in script.iter().enumerate() {
        let analysts = [
            "MDfinAnalyst",
            "MDnewsAnalyst",
            "MDnrelAnalyst",
            "MDtserAnalyst",
            "MDearnAnalyst",
            "MDkeyAnalyst",
        ]
        .into_iter()
        .map(|name| ScriptedAnalyst::reply(name, vote.decision(), *size))
        .collect();
        let report = runner(analysts, &ledger, RunMode::Sequential)
            .run_day(day(2 + offset as u32))
            .await
            .unwrap();
        assert_eq!(report.state.decision, vote.decision());
        assert_eq!(report.state.positionsize, *size);
    }

    let history = ledger.history(&key()).unwrap();
    assert_eq!(history.len(), 4);
    assert!(history.iter().all(DailyState::is_consistent));
    assert_eq!(history.last().unwrap().positionsize, Decimal::ZERO);
    assert!(!history.last().unwrap().position);
}

#[tokio::test]
async fn five_of_six_is_not_a_day() {
    let ledger = ledger_holding(dec!(50));
    let err = runner(
        vec![
            ScriptedAnalyst::buy("MDfinAnalyst", dec!(58)),
            ScriptedAnalyst::buy("MDnewsAnalyst", dec!(60)),
            ScriptedAnalyst::buy("MDnrelAnalyst", dec!(62)),
            ScriptedAnalyst::hold("MDtserAnalyst", dec!(50)),
            ScriptedAnalyst::hold("MDearnAnalyst", dec!(50)),
            ScriptedAnalyst::failing("MDkeyAnalyst"),
        ],
        &ledger,
        RunMode::Parallel,
    )
    .run_day(day(3))
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        RunError::Aggregate(AggregateError::InsufficientOpinions { expected: 6, received: 5 })
    ));
    assert_eq!(ledger.latest_state(&key()).unwrap().unwrap().date, day(2));
}

#[tokio::test]
async fn tracks_are_independent() {
    let ledger = ledger_holding(dec!(50));
    let other = DebateKey::new("TSLA", "GPT3.5", "V1");
    ledger.seed_genesis(&other, day(1)).unwrap();

    runner(
        (1..=6)
            .map(|i| ScriptedAnalyst::hold(&format!("A{i}"), dec!(50)))
            .collect(),
        &ledger,
        RunMode::Sequential,
    )
    .run_day(day(3))
    .await
    .unwrap();

    let v1 = ledger.latest_state(&other).unwrap().unwrap();
    assert_eq!(v1.date, day(1));
    assert_eq!(v1.positionsize, Decimal::ZERO);
    assert!(ledger.opinions_for(day(3), &other).unwrap().is_empty());
}

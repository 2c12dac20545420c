use approx::assert_relative_eq;

use match_features::config::{MissingPolicy, PipelineConfig, PrefixStyle};
use match_features::fixtures::{TEAM_A, six_match_fixture, synthetic_league};
use match_features::pipeline::{ShiftPipeline, Stage};
use match_features::PipelineError;

fn pipeline(config: PipelineConfig) -> ShiftPipeline {
    ShiftPipeline::new(six_match_fixture(), config).unwrap()
}

#[test]
fn six_match_fixture_end_to_end() {
    let matrix = pipeline(PipelineConfig::default()).run().unwrap();

    assert!(matrix.has_column("home_prev_team_shoton_shifted"));
    assert!(matrix.has_column("away_prev_rolling_avg_goal_conversion_rate_shifted"));
    for raw in ["home_shoton", "away_shoton", "home_possession", "away_possession"] {
        assert!(!matrix.has_column(raw), "{raw} should be removed");
    }
    // the first match has no history for either side
    assert_eq!(matrix.len(), 5);
    assert!(matrix.row_by_match(1).is_none());

    let second = matrix.row_by_match(2).unwrap();
    let idx = matrix.column_index("away_prev_team_shoton_shifted").unwrap();
    assert_eq!(second.values[idx], 10.0);
    let idx = matrix.column_index("home_prev_rolling_std_team_goal_shifted").unwrap();
    assert_eq!(second.values[idx], 0.0);
    let idx = matrix
        .column_index("home_prev_rolling_avg_goal_conversion_rate_shifted")
        .unwrap();
    assert_relative_eq!(second.values[idx], 1.0 / 9.0, epsilon = 1e-12);
}

#[test]
fn timeline_has_two_rows_per_match_in_team_order() {
    let mut p = pipeline(PipelineConfig::default());
    let timeline = p.build_timeline().unwrap();
    assert_eq!(timeline.len(), 12);
    assert!(timeline.is_chronological());
    assert_eq!(p.stage(), Stage::Timelined);

    let shifted = p.shift().unwrap();
    let team_a: Vec<f64> = shifted
        .rows()
        .iter()
        .filter(|r| r.team == TEAM_A)
        .map(|r| r.values[shifted.column_index("team_shoton_shifted").unwrap()].unwrap())
        .collect();
    assert_eq!(team_a, vec![10.0, 11.0, 8.0, 7.0, 15.0]);
}

#[test]
fn out_of_order_calls_are_rejected() {
    let mut p = pipeline(PipelineConfig::default());
    match p.shift() {
        Err(PipelineError::OutOfOrder {
            operation,
            required,
            current,
        }) => {
            assert_eq!(operation, "shift");
            assert_eq!(required, Stage::Timelined);
            assert_eq!(current, Stage::Raw);
        }
        other => panic!("expected out-of-order error, got {:?}", other.map(|t| t.len())),
    }

    p.build_timeline().unwrap();
    assert!(matches!(p.merge(), Err(PipelineError::OutOfOrder { .. })));
    assert!(matches!(p.build_timeline(), Err(PipelineError::OutOfOrder { .. })));
}

#[test]
fn impute_policy_keeps_every_match() {
    let config = PipelineConfig {
        on_missing: MissingPolicy::ImputeRowMean,
        ..PipelineConfig::default()
    };
    let matrix = pipeline(config).run().unwrap();
    assert_eq!(matrix.len(), 6);
    let first = matrix.row_by_match(1).unwrap();
    let idx = matrix.column_index("home_prev_team_goal_shifted").unwrap();
    assert!(first.values[idx].is_nan());
}

#[test]
fn last_prefix_strips_shift_suffix() {
    let config = PipelineConfig {
        prefix_style: PrefixStyle::Last,
        ..PipelineConfig::default()
    };
    let matrix = pipeline(config).run().unwrap();
    assert!(matrix.has_column("home_last_team_possession"));
    assert!(matrix.has_column("away_last_rolling_std_team_shoton"));
    assert!(matrix.columns().iter().all(|c| !c.ends_with("_shifted")));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = PipelineConfig {
        rolling_window: 0,
        ..PipelineConfig::default()
    };
    assert!(matches!(
        ShiftPipeline::new(six_match_fixture(), config),
        Err(PipelineError::Configuration(_))
    ));
    assert!(matches!(
        ShiftPipeline::new(Vec::new(), PipelineConfig::default()),
        Err(PipelineError::EmptyTable(_))
    ));
}

#[test]
fn input_row_order_does_not_change_the_output() {
    let ordered = pipeline(PipelineConfig::default()).run().unwrap();

    let reversed: Vec<_> = six_match_fixture().into_iter().rev().collect();
    let fixture = six_match_fixture();
    let shuffled: Vec<_> = [3, 0, 5, 1, 4, 2].iter().map(|i| fixture[*i].clone()).collect();

    for input in [reversed, shuffled] {
        let matrix = ShiftPipeline::new(input, PipelineConfig::default())
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(matrix.columns(), ordered.columns());
        assert_eq!(matrix.len(), ordered.len());
        for (got, want) in matrix.rows().iter().zip(ordered.rows()) {
            assert_eq!(got.meta.match_api_id, want.meta.match_api_id);
            assert_eq!(got.values, want.values);
        }
    }
}

#[test]
fn recorded_zero_survives_when_zero_is_not_missing() {
    // team B scored nothing at home in match 4 and away in match 5
    let kept = pipeline(PipelineConfig {
        zero_as_missing: false,
        ..PipelineConfig::default()
    })
    .run()
    .unwrap();
    let away_goal = kept.column_index("away_prev_team_goal_shifted").unwrap();
    let home_goal = kept.column_index("home_prev_team_goal_shifted").unwrap();
    assert_eq!(kept.row_by_match(5).unwrap().values[away_goal], 0.0);
    assert_eq!(kept.row_by_match(6).unwrap().values[home_goal], 0.0);
    assert_eq!(kept.len(), 5);

    // by default the zeros are backfilled from B's earlier goals (1, 3, 2)
    let filled = pipeline(PipelineConfig::default()).run().unwrap();
    let away_goal = filled.column_index("away_prev_team_goal_shifted").unwrap();
    assert_relative_eq!(filled.row_by_match(5).unwrap().values[away_goal], 2.0, epsilon = 1e-12);
}

#[test]
fn synthetic_league_with_players() {
    let (matches, attributes) = synthetic_league(8, 2, 3);
    let total = matches.len();
    let matrix = ShiftPipeline::new(matches, PipelineConfig::default())
        .unwrap()
        .with_player_attributes(attributes)
        .run()
        .unwrap();

    assert!(matrix.len() < total);
    assert!(matrix.len() >= total / 2);
    assert!(matrix.has_column("player_rating_home_player_1"));
    assert!(matrix.has_column("team_aggression_away"));
    let rows = matrix.rows();
    assert!(rows.windows(2).all(|w| {
        (&w[0].meta.season, w[0].meta.stage, w[0].meta.date)
            <= (&w[1].meta.season, w[1].meta.stage, w[1].meta.date)
    }));
}

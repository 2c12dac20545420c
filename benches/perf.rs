use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use match_features::config::PipelineConfig;
use match_features::dataset::player_slots;
use match_features::fixtures::synthetic_league;
use match_features::pipeline::ShiftPipeline;
use match_features::player_stats::PlayerRatingResolver;
use match_features::rolling::RollingStatsComputer;
use match_features::shift::FeatureShifter;
use match_features::timeline::build_team_timeline;

fn bench_timeline_build(c: &mut Criterion) {
    let (matches, _) = synthetic_league(20, 4, 1);
    c.bench_function("timeline_build", |b| {
        b.iter(|| {
            let timeline = build_team_timeline(black_box(&matches)).unwrap();
            black_box(timeline.len());
        })
    });
}

fn bench_rolling_and_shift(c: &mut Criterion) {
    let (matches, _) = synthetic_league(20, 4, 2);
    let timeline = build_team_timeline(&matches).unwrap();
    let config = PipelineConfig::default();
    let rolling = RollingStatsComputer::new(config.rolling_window);
    let shifter = FeatureShifter::default();

    c.bench_function("rolling_stats", |b| {
        b.iter(|| {
            let out = rolling
                .apply(black_box(&timeline), &config.rolling_features)
                .unwrap();
            black_box(out.columns().len());
        })
    });
    c.bench_function("shift_features", |b| {
        b.iter(|| {
            let out = shifter
                .shift_features(black_box(&timeline), &config.features_to_shift)
                .unwrap();
            black_box(out.len());
        })
    });
}

fn bench_player_features(c: &mut Criterion) {
    let (matches, attributes) = synthetic_league(20, 2, 3);
    let resolver = PlayerRatingResolver::new(&matches, &attributes, 10, 10);
    c.bench_function("player_features_per_match", |b| {
        b.iter(|| {
            for m in matches.iter().take(50) {
                let features = resolver.compute_match_player_features(black_box(m), player_slots());
                black_box(features.columns.len());
            }
        })
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let (matches, _) = synthetic_league(20, 4, 4);
    c.bench_function("full_pipeline", |b| {
        b.iter(|| {
            let matrix = ShiftPipeline::new(matches.clone(), PipelineConfig::default())
                .unwrap()
                .run()
                .unwrap();
            black_box(matrix.len());
        })
    });
}

criterion_group!(
    benches,
    bench_timeline_build,
    bench_rolling_and_shift,
    bench_player_features,
    bench_full_pipeline
);
criterion_main!(benches);

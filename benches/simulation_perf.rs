mod fixtures;

use chrono::Duration;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use metric_drift::analysis;
use metric_drift::config::TeamSelection;
use metric_drift::dates::generate_dates;
use metric_drift::events::derive_events;
use metric_drift::export::write_csv;
use metric_drift::simulation::simulate;
use metric_drift::types::{Day, Granularity, Team};

use fixtures::{LARGE, MEDIUM, SMALL, dates_for, params, start};

// ── Group 1: date_sequence — granularity × span ──────────────────────────────

fn bench_date_sequence(c: &mut Criterion) {
    let mut group = c.benchmark_group("date_sequence");
    for g in [Granularity::Daily, Granularity::Weekly, Granularity::Monthly] {
        group.bench_with_input(BenchmarkId::from_parameter(g), &g, |b, &g| {
            b.iter(|| generate_dates(start(), start() + Duration::days(20 * 365), g))
        });
    }
    group.finish();
}

// ── Group 2: simulate — row count scaling ────────────────────────────────────

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate");
    let p = params(TeamSelection::all());
    for (name, scenario) in [("small", &SMALL), ("medium", &MEDIUM), ("large", &LARGE)] {
        let dates = dates_for(scenario);
        group.throughput(Throughput::Elements(dates.len() as u64));
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter_batched(
                || ChaCha20Rng::seed_from_u64(42),
                |mut rng| simulate(&dates, &p, &mut rng),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// ── Group 3: team_count — cost per enabled team ──────────────────────────────

fn bench_team_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("team_count");
    let dates = dates_for(&MEDIUM);
    let selections = [
        ("one", TeamSelection::only(Team::Finance)),
        ("two", TeamSelection { finance: true, product: true, marketing: false }),
        ("three", TeamSelection::all()),
    ];
    for (name, teams) in selections {
        let p = params(teams);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter_batched(
                || ChaCha20Rng::seed_from_u64(42),
                |mut rng| simulate(&dates, &p, &mut rng),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// ── Group 4: divergence — pairwise analysis over a finished table ────────────

fn bench_divergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("divergence");
    for (name, scenario) in [("small", &SMALL), ("medium", &MEDIUM), ("large", &LARGE)] {
        let out = simulate(&dates_for(scenario), &params(TeamSelection::all()), &mut ChaCha20Rng::seed_from_u64(42));
        group.throughput(Throughput::Elements(out.table.len() as u64));
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| analysis::divergence(&out.table).as_ref().and_then(analysis::summarize))
        });
    }
    group.finish();
}

// ── Group 5: export — CSV into memory ────────────────────────────────────────

fn bench_csv_export(c: &mut Criterion) {
    let out = simulate(&dates_for(&MEDIUM), &params(TeamSelection::all()), &mut ChaCha20Rng::seed_from_u64(42));
    c.bench_function("csv_export/medium", |b| {
        b.iter(|| {
            let mut buf = Vec::with_capacity(64 * out.table.len());
            write_csv(&out.table, &mut buf).expect("in-memory write");
            std::hint::black_box(buf)
        })
    });
}

fn bench_derive_events(c: &mut Criterion) {
    c.bench_function("derive_events", |b| b.iter(|| derive_events(std::hint::black_box(Day(365)))));
}

criterion_group!(
    benches,
    bench_date_sequence,
    bench_simulate,
    bench_team_count,
    bench_divergence,
    bench_csv_export,
    bench_derive_events,
);
criterion_main!(benches);

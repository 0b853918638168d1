use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pipeline_latency::{
    correlate, AnalysisConfig, CorrelationRule, EventParser, RawRecord, TraceAnalyzer,
};

fn synthetic_run(frames: i64, cameras: i64) -> Vec<RawRecord> {
    let mut records = Vec::new();
    for frame in 30..30 + frames {
        let base = frame * 33_000;
        for camera in 0..cameras {
            records.push(RawRecord::new(
                format!(
                    "perception_iteration_from_noidle_till_writebuffer-cam_id_{}-frame_id_{}",
                    camera, frame
                ),
                base + camera * 100,
                base + 15_000 + camera * 100,
                15_000,
            ));
        }
        let markers: Vec<String> = (0..cameras)
            .map(|camera| format!("cam_id_{}-frame_id_{}", camera, frame))
            .collect();
        records.push(RawRecord::new(
            format!("ssm_iteration_action-{}", markers.join("-")),
            base + 20_000,
            base + 23_000,
            3_000,
        ));
    }
    records
}

fn bench_correlate(c: &mut Criterion) {
    let parser = EventParser::new().unwrap();
    let rule = CorrelationRule::default();
    let mut group = c.benchmark_group("correlate");

    for frames in [1_000i64, 10_000] {
        let events = parser.normalize(&synthetic_run(frames, 4), 30).events;
        group.bench_with_input(BenchmarkId::from_parameter(frames), &events, |b, events| {
            b.iter(|| correlate(black_box(events), &rule))
        });
    }
    group.finish();
}

fn bench_full_pass(c: &mut Criterion) {
    let analyzer = TraceAnalyzer::new(AnalysisConfig::default()).unwrap();
    let records = synthetic_run(5_000, 4);

    c.bench_function("analyze_5000_frames", |b| {
        b.iter(|| analyzer.analyze(black_box(&records)).unwrap())
    });
}

criterion_group!(benches, bench_correlate, bench_full_pass);
criterion_main!(benches);

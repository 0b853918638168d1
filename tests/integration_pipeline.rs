use pipeline_latency::{
    AnalysisConfig, CameraBreakdown, CameraLabel, RawRecord, TraceAnalyzer, TypeMatcher,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const ORIGIN: &str = "perception_iteration_from_noidle_till_writebuffer";
const TERMINAL: &str = "ssm_iteration_action";

/// Two cameras over frames 25..45; each frame has a camera read, a detection,
/// the origin interval, and one terminal action consuming both cameras.
fn recorded_run() -> Vec<RawRecord> {
    let mut records = Vec::new();
    for frame in 25..45i64 {
        let base = 1_744_882_792_000_000 + frame * 33_000;
        for camera in 0..2i64 {
            let start = base + camera * 500;
            let camread = 4_000 + camera * 100 + frame;
            let detection = 12_000 + camera * 1_000 + frame * 10;
            records.push(RawRecord::new(
                format!("perception_camread_noidle-cam_id_{}-frame_id_{}", camera, frame),
                start,
                start + camread,
                camread,
            ));
            records.push(RawRecord::new(
                format!("perception_humandetection_cam_id_{}-frame_id_{}", camera, frame),
                start + camread,
                start + camread + detection,
                detection,
            ));
            records.push(RawRecord::new(
                format!("{}-cam_id_{}-frame_id_{}", ORIGIN, camera, frame),
                start,
                start + camread + detection + 200,
                camread + detection + 200,
            ));
        }
        let action_start = base + 20_000;
        records.push(RawRecord::new(
            format!(
                "{}-cam_id_0-frame_id_{}-cam_id_1-frame_id_{}",
                TERMINAL, frame, frame
            ),
            action_start,
            action_start + 3_000,
            3_000,
        ));
    }
    records.push(RawRecord::new("ssm_total", 0, 10, 10));
    records
}

#[test]
fn full_pass_produces_expected_table() {
    let analyzer = TraceAnalyzer::new(AnalysisConfig::default()).unwrap();
    let report = analyzer.analyze(&recorded_run()).unwrap();

    // Frames 25..29 and the marker-less record are warm-up.
    assert_eq!(report.diagnostics.records_seen, 20 * 7 + 1);
    assert_eq!(report.diagnostics.warmup_dropped, 5 * 7 + 1);
    assert_eq!(report.diagnostics.events_retained, 15 * 7);
    assert_eq!(report.diagnostics.parse_failures, 0);

    let samples = &report.correlation.samples;
    assert_eq!(samples.len(), 15);
    assert!(samples.iter().all(|s| s.matched_keys == 2));

    // Frame 30: camera 0 starts first, camera 1 finishes last.
    let base = 1_744_882_792_000_000 + 30 * 33_000;
    let cam1_end = base + 500 + (4_000 + 100 + 30) + (12_000 + 1_000 + 300) + 200;
    assert_eq!(samples[0].pipeline_runtime, base + 23_000 - base);
    assert_eq!(samples[0].buffer_wait, base + 20_000 - cam1_end);

    let table = &report.table;
    for timer_type in [
        "perception_camread_noidle",
        "perception_humandetection",
        ORIGIN,
    ] {
        assert!(table.get(timer_type, &CameraLabel::All).is_some());
        assert!(table.get(timer_type, &CameraLabel::camera(0)).is_some());
        assert!(table.get(timer_type, &CameraLabel::camera(1)).is_some());
    }
    assert!(table.get(TERMINAL, &CameraLabel::All).is_some());
    assert!(table.get(TERMINAL, &CameraLabel::camera(0)).is_none());

    let runtime = table.get("pipeline_runtime", &CameraLabel::All).unwrap();
    assert_eq!(runtime.stats.num, 15);
    assert_eq!(runtime.stats.min, 23_000);
    assert_eq!(runtime.stats.max, 23_000);

    let overview: Vec<&str> = table
        .overview(&["perception_camread_noidle", "pipeline_runtime", "pipeline_wait_in_buffer"])
        .iter()
        .map(|row| row.timer_type.as_str())
        .collect();
    assert_eq!(
        overview,
        vec!["perception_camread_noidle", "pipeline_runtime", "pipeline_wait_in_buffer"]
    );
}

#[test]
fn repeated_passes_are_identical() {
    let analyzer = TraceAnalyzer::new(AnalysisConfig::default()).unwrap();
    let records = recorded_run();

    let first = analyzer.analyze(&records).unwrap();
    let second = analyzer.analyze(&records).unwrap();

    assert_eq!(first.table, second.table);
    assert_eq!(first.correlation, second.correlation);
    assert_eq!(first.events, second.events);
}

#[test]
fn origin_order_does_not_change_derived_metrics() {
    let analyzer = TraceAnalyzer::new(AnalysisConfig::default()).unwrap();
    let records = recorded_run();
    let baseline = analyzer.analyze(&records).unwrap();

    // Shuffle only the origins; terminal order is kept so sample order is comparable.
    let (mut origins, terminals): (Vec<RawRecord>, Vec<RawRecord>) = records
        .into_iter()
        .partition(|r| r.description.as_deref().unwrap_or("").starts_with(ORIGIN));
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..5 {
        origins.shuffle(&mut rng);
        let shuffled: Vec<RawRecord> = origins.iter().chain(terminals.iter()).cloned().collect();
        let report = analyzer.analyze(&shuffled).unwrap();

        assert_eq!(
            report.correlation.pipeline_runtimes(),
            baseline.correlation.pipeline_runtimes()
        );
        assert_eq!(
            report.correlation.buffer_waits(),
            baseline.correlation.buffer_waits()
        );
    }
}

#[test]
fn missing_camera_degrades_gracefully() {
    let analyzer = TraceAnalyzer::new(AnalysisConfig::default()).unwrap();
    let records: Vec<RawRecord> = recorded_run()
        .into_iter()
        .filter(|r| {
            let description = r.description.as_deref().unwrap_or("");
            !(description.starts_with(ORIGIN) && description.contains("cam_id_1-"))
        })
        .collect();
    let report = analyzer.analyze(&records).unwrap();

    let stats = report.diagnostics.correlation;
    assert_eq!(stats.unmatched_keys, 15);
    assert_eq!(stats.unmatched_terminals, 0);
    assert_eq!(report.correlation.samples.len(), 15);
    assert!(report.correlation.samples.iter().all(|s| s.matched_keys == 1));
}

#[test]
fn bad_records_are_dropped_not_fatal() {
    let analyzer = TraceAnalyzer::new(AnalysisConfig::default()).unwrap();
    let mut records = recorded_run();
    records.push(RawRecord {
        duration: None,
        ..RawRecord::new(format!("{}-cam_id_0-frame_id_40", ORIGIN), 0, 1, 1)
    });
    records.push(RawRecord::new("perception_x-cam_id_0-frame_id_40", 10, 5, 5));

    let report = analyzer.analyze(&records).unwrap();
    assert_eq!(report.diagnostics.parse_failures, 2);
    assert_eq!(report.correlation.samples.len(), 15);
}

#[test]
fn configuration_drives_grouping_and_warmup() {
    let config = AnalysisConfig {
        warmup_threshold: -1,
        per_camera: CameraBreakdown {
            rules: vec![TypeMatcher::Exact(TERMINAL.to_string())],
        },
        ..AnalysisConfig::default()
    };
    let analyzer = TraceAnalyzer::new(config).unwrap();
    let report = analyzer.analyze(&recorded_run()).unwrap();

    assert_eq!(report.diagnostics.warmup_dropped, 0);
    assert!(report.table.get("ssm_total", &CameraLabel::All).is_some());
    assert!(report
        .table
        .get("perception_camread_noidle", &CameraLabel::camera(0))
        .is_none());

    let terminal_group = CameraLabel::Cameras(vec![
        pipeline_latency::CameraId(0),
        pipeline_latency::CameraId(1),
    ]);
    let row = report.table.get(TERMINAL, &terminal_group).unwrap();
    assert_eq!(row.stats.num, 20);
    assert_eq!(row.camera.to_string(), "0+1");
}

#[test]
fn report_serializes_to_json() {
    let analyzer = TraceAnalyzer::new(AnalysisConfig::default()).unwrap();
    let report = analyzer.analyze(&recorded_run()).unwrap();

    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["metadata"]["version"], pipeline_latency::VERSION);
    assert_eq!(json["metadata"]["config"]["warmup_threshold"], 30);
    assert_eq!(json["table"][0]["camera_id"], "all");
    assert_eq!(json["diagnostics"]["correlation"]["terminal_events"], 15);
}

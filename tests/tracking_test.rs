use std::f32::consts::PI;

use cuptrack_rs::tracker::{DetectorConfig, FlowStatus, MotionConfig};
use cuptrack_rs::{
    BlockMatcher, ColorDetector, CupTracker, DetectionSource, Identity, Region, SessionConfig,
    SessionState, Strategy, TrackingSession, TrackingWarning,
};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use tracing_subscriber::EnvFilter;

const CUP_SIZE: u32 = 60;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Black frame with a 60x60 cup centred on each point.
fn frame_with_cups(width: u32, height: u32, centers: &[(i32, i32)]) -> RgbImage {
    let mut frame = RgbImage::new(width, height);
    let half = CUP_SIZE as i32 / 2;
    for &(cx, cy) in centers {
        draw_filled_rect_mut(
            &mut frame,
            Rect::at(cx - half, cy - half).of_size(CUP_SIZE, CUP_SIZE),
            Rgb([235, 200, 60]),
        );
    }
    frame
}

fn row_of_cups() -> RgbImage {
    frame_with_cups(800, 200, &[(100, 100), (400, 100), (700, 100)])
}

fn center_of(region: Option<Region>) -> (f32, f32) {
    region.expect("identity should be mapped").center()
}

fn tracker(config: SessionConfig) -> CupTracker {
    init_logging();
    CupTracker::from_config(config).unwrap()
}

/// Cup 0 travels over the top and cup 2 under the bottom while cup 1 stays put.
fn swap_positions(t: u32, steps: u32) -> [(i32, i32); 3] {
    let phase = t as f32 / steps as f32;
    let lift = (200.0 * (PI * phase).sin()).round() as i32;
    let travel = (600.0 * phase).round() as i32;
    [(100 + travel, 300 - lift), (400, 300), (700 - travel, 300 + lift)]
}

#[test]
fn test_ball_follows_swapped_cup() {
    let mut tracker = tracker(SessionConfig {
        redetect_interval: 100,
        ..SessionConfig::default()
    });

    let first = tracker.process_frame(&frame_with_cups(800, 600, &swap_positions(0, 20)));
    assert_eq!(first.strategy, Strategy::Redetect);
    assert_eq!(first.assignment.mapped_count(), 3);
    tracker.mark(0).unwrap();

    for t in 1..=20 {
        let report = tracker.process_frame(&frame_with_cups(800, 600, &swap_positions(t, 20)));
        assert_eq!(report.strategy, Strategy::Propagate);
        assert_eq!(report.assignment.mapped_count(), 3, "frame {t}");
        assert_eq!(report.holder, Some(Identity::new(0)));
    }

    assert_eq!(tracker.holder(), Some(Identity::new(0)));
    let tracks = tracker.tracks();
    let (x0, y0) = center_of(tracks.get(Identity::new(0)).unwrap().current_region());
    let (x1, _) = center_of(tracks.get(Identity::new(1)).unwrap().current_region());
    let (x2, _) = center_of(tracks.get(Identity::new(2)).unwrap().current_region());
    assert!((x0 - 700.0).abs() <= 1.0, "identity 0 ended at x={x0}");
    assert!((y0 - 300.0).abs() <= 1.0);
    assert!((x1 - 400.0).abs() <= 1.0);
    assert!((x2 - 100.0).abs() <= 1.0, "identity 2 ended at x={x2}");

    let (holder, region) = tracker.holder_region().unwrap();
    assert_eq!(holder, Identity::new(0));
    assert!((region.center().0 - 700.0).abs() <= 1.0);
}

#[test]
fn test_redetection_mid_shuffle_keeps_identities() {
    let mut tracker = tracker(SessionConfig {
        redetect_interval: 5,
        ..SessionConfig::default()
    });

    tracker.process_frame(&frame_with_cups(800, 600, &swap_positions(0, 20)));
    tracker.mark(2).unwrap();

    let mut redetects = 0;
    for t in 1..=20 {
        let report = tracker.process_frame(&frame_with_cups(800, 600, &swap_positions(t, 20)));
        if report.strategy == Strategy::Redetect {
            redetects += 1;
        }
        assert_eq!(report.assignment.mapped_count(), 3, "frame {t}");
    }
    assert_eq!(redetects, 4);

    let region = tracker.holder_region().unwrap().1;
    assert!((region.center().0 - 100.0).abs() <= 1.0);
    assert_eq!(tracker.holder(), Some(Identity::new(2)));
}

#[test]
fn test_static_scene_keeps_bindings() {
    let mut tracker = tracker(SessionConfig::default());
    let frame = row_of_cups();

    let first = tracker.process_frame(&frame);
    let expected: Vec<(f32, f32)> = (0..3)
        .map(|i| center_of(first.assignment.get(Identity::new(i))))
        .collect();
    assert_eq!(expected, vec![(100.0, 100.0), (400.0, 100.0), (700.0, 100.0)]);

    for _ in 0..30 {
        let report = tracker.process_frame(&frame);
        assert_eq!(report.state, SessionState::Tracking);
        for (i, center) in expected.iter().enumerate() {
            assert_eq!(center_of(report.assignment.get(Identity::new(i))), *center);
        }
    }
}

#[test]
fn test_black_frame_keeps_mark_and_history() {
    let mut tracker = tracker(SessionConfig::default());
    for _ in 0..4 {
        tracker.process_frame(&row_of_cups());
    }
    tracker.mark(1).unwrap();
    let before = tracker.tracks().history_snapshot();

    // Frame 5: every cup disappears
    let gap = tracker.process_frame(&RgbImage::new(800, 200));
    assert_eq!(gap.strategy, Strategy::Propagate);
    assert!(gap.assignment.is_empty());
    assert_eq!(gap.state, SessionState::Degraded);
    assert_eq!(gap.holder, Some(Identity::new(1)));
    assert_eq!(gap.histories, before);
    assert!(gap.warnings.contains(&TrackingWarning::NoDetection { frame: 5 }));

    // Frame 6: cups are back, propagated from frame 4
    let back = tracker.process_frame(&row_of_cups());
    assert_eq!(back.state, SessionState::Tracking);
    assert_eq!(back.assignment.mapped_count(), 3);
    assert_eq!(back.holder, Some(Identity::new(1)));
    for (after, before) in back.histories.iter().zip(before.iter()) {
        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(&after[..before.len()], &before[..]);
    }
    assert_eq!(
        center_of(back.assignment.get(Identity::new(1))),
        (400.0, 100.0)
    );
}

#[test]
fn test_black_frame_on_redetect_is_not_an_error() {
    let mut tracker = tracker(SessionConfig {
        redetect_interval: 3,
        ..SessionConfig::default()
    });
    tracker.process_frame(&row_of_cups());
    tracker.process_frame(&row_of_cups());
    tracker.process_frame(&row_of_cups());
    tracker.mark(0).unwrap();

    // Frame 4 is a re-detect frame and finds nothing
    let report = tracker.process_frame(&RgbImage::new(800, 200));
    assert_eq!(report.strategy, Strategy::Redetect);
    assert!(report.assignment.is_empty());
    assert_eq!(report.holder, Some(Identity::new(0)));
    assert!(tracker.last_detections().is_empty());

    let report = tracker.process_frame(&row_of_cups());
    assert_eq!(report.strategy, Strategy::Propagate);
    assert_eq!(
        center_of(report.assignment.get(Identity::new(0))),
        (100.0, 100.0)
    );
}

/// Wraps the colour detector and counts how often the session calls it.
struct CountingDetector {
    inner: ColorDetector,
    calls: usize,
}

impl DetectionSource for CountingDetector {
    fn detect(&mut self, frame: &RgbImage) -> Vec<Region> {
        self.calls += 1;
        self.inner.detect(frame)
    }
}

#[test]
fn test_redetect_schedule() {
    init_logging();
    let config = SessionConfig::default();
    let detector = CountingDetector {
        inner: ColorDetector::new(config.detector.clone(), config.cardinality).unwrap(),
        calls: 0,
    };
    let estimator = BlockMatcher::new(config.motion.clone()).unwrap();
    let mut session = TrackingSession::new(config, detector, estimator).unwrap();

    let frame = row_of_cups();
    let mut redetect_frames = Vec::new();
    for _ in 0..25 {
        let report = session.process_frame(&frame);
        if report.strategy == Strategy::Redetect {
            redetect_frames.push(report.frame_index);
        }
    }

    assert_eq!(redetect_frames, vec![1, 11, 21]);
    assert_eq!(session.detector().calls, 3);
    assert_eq!(session.redetect_count(), 3);
}

#[test]
fn test_mark_reset_and_history_bounds() {
    let mut tracker = tracker(SessionConfig {
        history_capacity: 5,
        ..SessionConfig::default()
    });

    tracker.mark(0).unwrap();
    tracker.mark(2).unwrap();
    let marked: Vec<_> = tracker.tracks().iter().filter(|t| t.is_marked()).collect();
    assert_eq!(marked.len(), 1);
    assert_eq!(tracker.holder(), Some(Identity::new(2)));

    for _ in 0..40 {
        let report = tracker.process_frame(&row_of_cups());
        assert!(report.histories.iter().all(|h| h.len() <= 5));
    }
    assert!(tracker.tracks().iter().all(|t| t.history().len() == 5));

    tracker.reset();
    assert_eq!(tracker.holder(), None);
    assert!(tracker.tracks().iter().all(|t| t.history().is_empty()));
    let after_one = tracker.tracks().history_snapshot();

    tracker.reset();
    assert_eq!(tracker.holder(), None);
    assert_eq!(tracker.tracks().history_snapshot(), after_one);
    assert_eq!(tracker.state(), SessionState::Tracking);

    // Regions survive the reset, so the next frame propagates as usual.
    let report = tracker.process_frame(&row_of_cups());
    assert_eq!(report.assignment.mapped_count(), 3);
}

#[test]
fn test_vanished_cup_keeps_stale_region() {
    let mut tracker = tracker(SessionConfig {
        miss_streak_warning: 3,
        ..SessionConfig::default()
    });
    tracker.process_frame(&row_of_cups());
    tracker.mark(2).unwrap();

    let two_cups = frame_with_cups(800, 200, &[(100, 100), (400, 100)]);
    let mut last = None;
    for _ in 0..3 {
        last = Some(tracker.process_frame(&two_cups));
    }
    let report = last.unwrap();

    assert_eq!(report.state, SessionState::Tracking);
    assert_eq!(report.assignment.get(Identity::new(2)), None);
    assert_eq!(report.holder, Some(Identity::new(2)));
    assert!(report.warnings.contains(&TrackingWarning::LowConfidence {
        identity: Identity::new(2),
        missed_frames: 3,
    }));
    let stale = tracker.tracks().get(Identity::new(2)).unwrap().current_region();
    assert_eq!(center_of(stale), (700.0, 100.0));
}

#[test]
fn test_five_cups_use_general_assignment() {
    let config = SessionConfig {
        cardinality: 5,
        redetect_interval: 2,
        detector: DetectorConfig {
            min_area: 500.0,
            ..DetectorConfig::default()
        },
        ..SessionConfig::default()
    };
    let mut tracker = tracker(config);
    let centers = [(80, 100), (240, 100), (400, 100), (560, 100), (720, 100)];
    let frame = frame_with_cups(800, 200, &centers);

    for _ in 0..6 {
        let report = tracker.process_frame(&frame);
        assert_eq!(report.assignment.mapped_count(), 5);
        for (i, &(cx, cy)) in centers.iter().enumerate() {
            assert_eq!(
                center_of(report.assignment.get(Identity::new(i))),
                (cx as f32, cy as f32)
            );
        }
    }
}

#[test]
fn test_flow_status_is_public() {
    use cuptrack_rs::MotionEstimator;

    let matcher = BlockMatcher::default();
    let frame = image::imageops::grayscale(&row_of_cups());
    let region = Region::from_center(400.0, 100.0, 60.0, 60.0);
    let flow = matcher.estimate(&frame, &frame, &region);
    assert_eq!(flow.status, FlowStatus::Tracked);
    assert_eq!((flow.dx, flow.dy), (0.0, 0.0));
}

#[test]
fn test_collaborators_reject_invalid_config() {
    let stride = BlockMatcher::new(MotionConfig {
        sample_stride: 0,
        ..MotionConfig::default()
    });
    assert!(stride.is_err());

    let grid = BlockMatcher::new(MotionConfig {
        coarse_step: 0,
        ..MotionConfig::default()
    });
    assert!(grid.is_err());

    let config = SessionConfig {
        motion: MotionConfig {
            sample_stride: 0,
            ..MotionConfig::default()
        },
        ..SessionConfig::default()
    };
    assert!(CupTracker::from_config(config).is_err());
}

#[test]
fn test_cup_followed_to_the_frame_edge() {
    let mut tracker = tracker(SessionConfig {
        redetect_interval: 100,
        ..SessionConfig::default()
    });
    tracker.process_frame(&frame_with_cups(800, 200, &[(60, 100), (400, 100), (700, 100)]));
    tracker.mark(0).unwrap();

    // Cup 0 slides left until it touches the border.
    for cx in [50, 42, 36, 30] {
        let report = tracker.process_frame(&frame_with_cups(
            800,
            200,
            &[(cx, 100), (400, 100), (700, 100)],
        ));
        assert_eq!(report.strategy, Strategy::Propagate);
        assert_eq!(
            center_of(report.assignment.get(Identity::new(0))),
            (cx as f32, 100.0)
        );
    }
    let (_, region) = tracker.holder_region().unwrap();
    assert_eq!(region.x, 0.0);
}

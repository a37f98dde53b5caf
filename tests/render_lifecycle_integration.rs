//! Integration tests for the render worker lifecycle
//!
//! These tests validate the complete application workflow:
//! - Packets in, remapped bytes out on the right line
//! - Blackout on every kind of exit
//! - Overrun accounting and shutdown outcomes

mod common;

use common::builders::{ConfigBuilder, OutputBuilder};
use common::mock_helpers::{dmx_packet, memory_drivers, slow_drivers};
use common::{test_timeout, wait_until};
use pixelbox::app::PixelBoxApp;
use pixelbox::config::{AppConfig, LogSettings, RenderSettings};
use pixelbox::logging::Logging;
use pixelbox::output::FrameLog;
use pixelbox::render::{ExitReason, ShutdownOutcome};
use pixelbox::types::{OutputLabel, OutputLine};
use serial_test::serial;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn single_output(log_dir: &Path) -> ConfigBuilder {
    ConfigBuilder::new(log_dir).output(
        OutputLabel::Out1,
        OutputBuilder::new(OutputLine::Gpio18)
            .byte_order("GRB")
            .strip("bar", 2, 1, 1)
            .build(),
    )
}

fn graceful(outcome: Option<ShutdownOutcome>) -> pixelbox::render::WorkerReport {
    match outcome {
        Some(ShutdownOutcome::Graceful(report)) => report,
        other => panic!("expected graceful shutdown, got {other:?}"),
    }
}

#[test]
fn test_packet_is_rendered_in_byte_order() {
    let dir = TempDir::new().unwrap();
    let frames = FrameLog::default();
    let app = PixelBoxApp::start(
        single_output(dir.path()).build(),
        &Logging::disabled(),
        memory_drivers(&frames),
    )
    .unwrap();

    app.manager()
        .handle_packet(dmx_packet(1, 1, &[(1, 255), (2, 128), (3, 0)]));

    assert!(wait_until(test_timeout(), || {
        frames.last(OutputLine::Gpio18) == Some(vec![128, 255, 0, 0, 0, 0])
    }));
    assert_eq!(app.available_universes(), vec![1]);
    assert_eq!(app.fixtures_by_universe(1)[0].label, "bar");
}

#[test]
fn test_stop_blacks_out_and_reports() {
    let dir = TempDir::new().unwrap();
    let frames = FrameLog::default();
    let mut app = PixelBoxApp::start(
        single_output(dir.path()).build(),
        &Logging::disabled(),
        memory_drivers(&frames),
    )
    .unwrap();

    app.manager().handle_packet(dmx_packet(1, 1, &[(1, 50), (4, 60)]));
    assert!(wait_until(test_timeout(), || frames.count(OutputLine::Gpio18) >= 1));

    let report = graceful(app.stop());
    assert_eq!(report.reason, ExitReason::Stopped);
    assert_eq!(report.stats.cycles, 1);
    assert_eq!(frames.last(OutputLine::Gpio18), Some(vec![0u8; 6]));
    assert!(!app.is_worker_running());
    assert!(app.stop().is_none(), "second stop is a no-op");

    let worker_log = std::fs::read_to_string(dir.path().join("worker.log")).unwrap();
    assert!(worker_log.contains("Render worker stopped"));
}

#[test]
fn test_worker_logging_failure_blacks_out() {
    let dir = TempDir::new().unwrap();
    let not_a_dir = dir.path().join("occupied");
    std::fs::write(&not_a_dir, "file in the way").unwrap();

    let frames = FrameLog::default();
    let config = single_output(dir.path())
        .logging(LogSettings::file_only(&not_a_dir))
        .build();
    let mut app = PixelBoxApp::start(config, &Logging::disabled(), memory_drivers(&frames)).unwrap();

    assert!(wait_until(test_timeout(), || !app.is_worker_running()));
    assert_eq!(frames.frames(), vec![(OutputLine::Gpio18, vec![0u8; 6])]);

    let report = graceful(app.stop());
    assert!(matches!(report.reason, ExitReason::LoggingFailed(_)));
}

#[test]
#[serial]
fn test_slow_output_counts_overruns() {
    let dir = TempDir::new().unwrap();
    let frames = FrameLog::default();
    let config = single_output(dir.path())
        .render(RenderSettings {
            refresh_rate_hz: 1000,
            ..Default::default()
        })
        .build();
    let mut app = PixelBoxApp::start(
        config,
        &Logging::disabled(),
        slow_drivers(&frames, Duration::from_millis(5)),
    )
    .unwrap();

    app.manager().handle_packet(dmx_packet(1, 1, &[(1, 1)]));
    assert!(wait_until(test_timeout(), || frames.count(OutputLine::Gpio18) >= 1));

    let report = graceful(app.stop());
    assert_eq!(report.stats.cycles, 1);
    assert_eq!(report.stats.overruns, 1);
}

#[test]
#[serial]
fn test_stuck_worker_is_abandoned() {
    let dir = TempDir::new().unwrap();
    let frames = FrameLog::default();
    let config = single_output(dir.path())
        .render(RenderSettings {
            shutdown_grace_ms: 0,
            ..Default::default()
        })
        .build();
    let mut app = PixelBoxApp::start(
        config,
        &Logging::disabled(),
        slow_drivers(&frames, Duration::from_millis(300)),
    )
    .unwrap();

    app.manager().handle_packet(dmx_packet(1, 1, &[(1, 1)]));
    std::thread::sleep(Duration::from_millis(50));

    assert!(matches!(app.stop(), Some(ShutdownOutcome::Abandoned)));
}

#[test]
fn test_unsupported_output_is_skipped() {
    let dir = TempDir::new().unwrap();
    let frames = FrameLog::default();
    let config = single_output(dir.path())
        .output(
            OutputLabel::Out2,
            OutputBuilder::new(OutputLine::Gpio21)
                .pixel_type("rgbw8")
                .strip("wash", 4, 1, 100)
                .build(),
        )
        .build();
    let mut app = PixelBoxApp::start(config, &Logging::disabled(), memory_drivers(&frames)).unwrap();

    assert_eq!(app.fixtures_by_output(OutputLine::Gpio21).len(), 1);
    assert_eq!(app.fixtures_by_output_universe(OutputLine::Gpio21, 1)[0].pixel_type, "rgbw8");

    app.manager().handle_packet(dmx_packet(1, 1, &[(1, 9)]));
    assert!(wait_until(test_timeout(), || frames.count(OutputLine::Gpio18) >= 1));

    graceful(app.stop());
    assert_eq!(frames.count(OutputLine::Gpio21), 0);
}

#[test]
fn test_failed_start_still_blacks_out() {
    let dir = TempDir::new().unwrap();
    let frames = FrameLog::default();
    let mut config: AppConfig = single_output(dir.path()).build();
    // TEST-NET-3 is never a local address.
    config.input.bind_address = Ipv4Addr::new(203, 0, 113, 1);

    let result = PixelBoxApp::start(config, &Logging::disabled(), memory_drivers(&frames));
    assert!(result.is_err());
    assert_eq!(frames.last(OutputLine::Gpio18), Some(vec![0u8; 6]));
}

#[test]
fn test_invalid_config_never_starts() {
    let dir = TempDir::new().unwrap();
    let frames = FrameLog::default();
    let config = ConfigBuilder::new(dir.path()).build();

    assert!(PixelBoxApp::start(config, &Logging::disabled(), memory_drivers(&frames)).is_err());
    assert!(frames.is_empty());
}

//! Integration tests for the ingest primitives shared by all sessions

use hwpipe_core::{
    AudioClock, CancelToken, EsKind, FeedCommand, HwPipeError, IngestStats, InstanceGuard,
    PipelineConfig, RetryPolicy, SubmitOutcome,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// Instance guard
// ============================================================================

#[test]
fn test_guard_contention_across_threads() {
    let guard = InstanceGuard::new("contended pipeline");
    let barrier = Arc::new(Barrier::new(8));
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let guard = guard.clone();
            let barrier = barrier.clone();
            let winners = winners.clone();
            thread::spawn(move || {
                barrier.wait();
                match guard.try_acquire() {
                    Ok(lease) => {
                        winners.fetch_add(1, Ordering::SeqCst);
                        Some(lease)
                    }
                    Err(e) => {
                        assert!(matches!(e, HwPipeError::DeviceBusy { .. }));
                        None
                    }
                }
            })
        })
        .collect();

    let leases: Vec<_> = handles.into_iter().filter_map(|h| h.join().unwrap()).collect();
    assert_eq!(leases.len(), 1);
    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert!(guard.is_held());

    drop(leases);
    assert!(!guard.is_held());
}

#[test]
fn test_guard_reacquire_after_drop() {
    let guard = InstanceGuard::new("cycled pipeline");
    for _ in 0..3 {
        let lease = guard.try_acquire().unwrap();
        assert!(lease.is_active());
        drop(lease);
        assert!(!guard.is_held());
    }
}

// ============================================================================
// Backpressure
// ============================================================================

#[test]
fn test_interrupt_from_another_thread() {
    let policy = RetryPolicy::paced(Duration::from_millis(50));
    let cancel = CancelToken::new();
    let feeds = Arc::new(AtomicUsize::new(0));

    let interrupter = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(120));
            cancel.cancel();
        })
    };

    let start = Instant::now();
    let counter = feeds.clone();
    let outcome = policy.submit(&cancel, || {
        counter.fetch_add(1, Ordering::SeqCst);
        "BufferFull".to_string()
    });
    interrupter.join().unwrap();

    assert!(matches!(outcome, SubmitOutcome::Cancelled { .. }));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(feeds.load(Ordering::SeqCst) >= 2);
}

#[test]
fn test_closed_token_abandons_first_wait() {
    let policy = RetryPolicy::paced(Duration::from_secs(10));
    let cancel = CancelToken::new();
    cancel.close();

    let start = Instant::now();
    let outcome = policy.submit(&cancel, || "BufferFull".to_string());
    assert_eq!(outcome, SubmitOutcome::Cancelled { retries: 0 });
    assert!(start.elapsed() < Duration::from_secs(1));

    // Acceptance does not look at the token
    let outcome = policy.submit(&cancel, || "Ok".to_string());
    assert!(outcome.is_accepted());
}

#[test]
fn test_interrupt_ends_only_the_submission_in_flight() {
    let policy = RetryPolicy::paced(Duration::from_millis(20));
    let cancel = CancelToken::new();

    let interrupter = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(60));
            cancel.cancel();
        })
    };
    let outcome = policy.submit(&cancel, || "BufferFull".to_string());
    interrupter.join().unwrap();
    assert!(matches!(outcome, SubmitOutcome::Cancelled { .. }));

    // The next full buffer is waited out and resubmitted
    let mut responses = vec!["Ok", "BufferFull"];
    let outcome = policy.submit(&cancel, || responses.pop().unwrap_or("Ok").to_string());
    assert_eq!(outcome, SubmitOutcome::Accepted { retries: 1 });
}

#[test]
fn test_stats_fold_outcomes() {
    let mut stats = IngestStats::default();
    stats.record(&SubmitOutcome::Accepted { retries: 2 }, 100);
    stats.record(&SubmitOutcome::Accepted { retries: 0 }, 50);
    stats.record(
        &SubmitOutcome::Fatal {
            status: "Error".to_string(),
            retries: 1,
        },
        10,
    );
    stats.record(&SubmitOutcome::Cancelled { retries: 4 }, 10);

    assert_eq!(stats.packets_fed, 2);
    assert_eq!(stats.bytes_fed, 150);
    assert_eq!(stats.buffer_full_retries, 7);
    assert_eq!(stats.fatal_responses, 1);
    assert_eq!(stats.cancelled_submissions, 1);
}

// ============================================================================
// Feed documents
// ============================================================================

#[test]
fn test_feed_document_references_buffer() {
    let data = vec![0u8; 4096];
    let json = FeedCommand::new(&data, Some(1_000_000_000), EsKind::Audio)
        .to_json()
        .unwrap();
    let doc: Value = serde_json::from_str(&json).unwrap();

    assert_eq!(doc["bufferAddr"], format!("{:p}", data.as_ptr()));
    assert_eq!(doc["bufferSize"], 4096);
    assert_eq!(doc["pts"], 1_000_000_000i64);
    assert_eq!(doc["esData"], 2);
}

#[test]
fn test_feed_document_without_pts() {
    let data = [1u8, 2, 3];
    let json = FeedCommand::new(&data, None, EsKind::Video).to_json().unwrap();
    let doc: Value = serde_json::from_str(&json).unwrap();

    assert!(doc.get("pts").is_none());
    assert_eq!(doc["esData"], 1);
}

// ============================================================================
// Audio clock
// ============================================================================

#[test]
fn test_audio_clock_writers_on_separate_threads() {
    let clock = Arc::new(AudioClock::new());
    for _ in 0..10 {
        clock.advance(32_000_000);
    }

    let callback_side = {
        let clock = clock.clone();
        thread::spawn(move || clock.on_frame_ready(250_000_000))
    };
    callback_side.join().unwrap();

    assert_eq!(clock.pts_ns(), 320_000_000);
    assert_eq!(clock.playtime_ns(), 250_000_000);
    assert_eq!(clock.delay_ns(), Some(70_000_000));

    clock.reset();
    assert_eq!(clock.pts_ns(), 0);
    assert_eq!(clock.delay_ns(), None);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_from_file() {
    let path = std::env::temp_dir().join(format!("hwpipe-config-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{"app_id": "com.example.tv", "video_buffer": {"queue_level": 2097152, "source_minimum": 1048576, "source_maximum": 4194304}}"#,
    )
    .unwrap();

    let config = PipelineConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.app_id, "com.example.tv");
    assert_eq!(config.video_buffer.queue_level, 2_097_152);
    assert_eq!(config.audio_buffer_frames_multiplier, 8);
}

#[test]
fn test_config_rejects_inverted_buffer_levels() {
    let err = PipelineConfig::from_json_str(
        r#"{"video_buffer": {"queue_level": 1, "source_minimum": 10, "source_maximum": 5}}"#,
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
}

#[test]
fn test_config_rejects_malformed_json() {
    let err = PipelineConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, HwPipeError::Serialization(_)));
}

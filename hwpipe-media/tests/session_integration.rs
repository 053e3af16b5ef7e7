//! Integration tests for hardware video and audio sessions driven against a
//! recording pipeline

use hwpipe_core::{HwPipeError, InstanceGuard, PipelineConfig, PipelineEvent};
use hwpipe_diagnostics::{RecordedCommand, RecordingPipeline};
use hwpipe_media::{
    AudioFormat, AudioSession, AudioSessionState, AudioStreamType, ContentLightMetadata,
    FrameEvent, HdrType, KeyframeGate, MasteringMetadata, Packet, StreamDescriptor,
    TransferCharacteristic, VideoCodecId, VideoSession, VideoState, HARDWARE_LATENCY,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const IDR: [u8; 6] = [0, 0, 0, 1, 0x65, 0x88];
const NON_IDR: [u8; 6] = [0, 0, 0, 1, 0x41, 0x9a];

fn video_session(recorder: &Arc<RecordingPipeline>, guard: &InstanceGuard) -> VideoSession {
    VideoSession::new(recorder.clone(), guard.clone(), PipelineConfig::default())
}

fn audio_session(recorder: &Arc<RecordingPipeline>) -> AudioSession {
    AudioSession::new(recorder.clone(), PipelineConfig::default())
}

fn h264_1080p() -> StreamDescriptor {
    StreamDescriptor::video(VideoCodecId::H264, 1920, 1080).with_fps(24000, 1001)
}

fn hdr10_descriptor() -> StreamDescriptor {
    StreamDescriptor::video(VideoCodecId::Hevc, 3840, 2160)
        .with_fps(60, 1)
        .with_hdr(
            HdrType::Hdr10,
            TransferCharacteristic::Smpte2084,
            Some(MasteringMetadata {
                display_primaries: [(0.708, 0.292), (0.170, 0.797), (0.131, 0.046)],
                white_point: (0.3127, 0.3290),
                min_luminance: 0.005,
                max_luminance: 1000.0,
            }),
            Some(ContentLightMetadata {
                max_cll: 1000,
                max_fall: 400,
            }),
        )
}

// ============================================================================
// Video lifecycle
// ============================================================================

#[test]
fn test_open_feed_and_present() {
    let recorder = RecordingPipeline::new();
    let guard = InstanceGuard::new("video lifecycle");
    let mut session = video_session(&recorder, &guard);

    session.open(h264_1080p(), "window-1").unwrap();
    assert_eq!(session.state(), VideoState::Flushed);
    assert!(guard.is_held());
    assert_eq!(session.get_frame(), FrameEvent::NotReady);

    let loads = recorder.loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0]["args"][0]["mediaTransportType"], "BUFFERSTREAM");

    assert!(session.add_data(&Packet::new(&IDR).with_pts(Duration::ZERO)));
    assert_eq!(recorder.seeks(), vec!["0".to_string()]);
    assert_eq!(session.state(), VideoState::Running);

    // Playtime has not moved yet
    assert_eq!(session.get_frame(), FrameEvent::NoNewFrame);

    let playtime = 41_708_333i64;
    recorder.set_playtime(playtime);
    assert!(recorder.fire(PipelineEvent::frame_ready(playtime)));
    match session.get_frame() {
        FrameEvent::Frame(marker) => {
            assert_eq!(marker.pts, Duration::from_nanos(playtime as u64));
            assert_eq!(marker.width, 1920);
            assert_eq!(marker.height, 1080);
        }
        other => panic!("expected a frame, got {other:?}"),
    }
    assert_eq!(session.get_frame(), FrameEvent::NoNewFrame);
    assert_eq!(
        session.last_picture_pts(),
        Some(Duration::from_nanos(playtime as u64))
    );

    // Only one seek for the whole run
    assert!(session.add_data(&Packet::new(&NON_IDR).with_pts(Duration::from_millis(42))));
    assert_eq!(recorder.seeks().len(), 1);

    let feeds = recorder.feeds();
    assert_eq!(feeds.len(), 2);
    assert_eq!(feeds[0]["pts"], 0);
    assert_eq!(feeds[1]["pts"], 42_000_000i64);
    assert_eq!(feeds[1]["esData"], 1);

    session.dispose();
    assert!(!guard.is_held());
    assert_eq!(session.get_frame(), FrameEvent::Closed);
}

#[test]
fn test_load_completed_plays_and_reflushes() {
    let recorder = RecordingPipeline::new();
    let guard = InstanceGuard::new("load completed");
    let mut session = video_session(&recorder, &guard);
    session.open(h264_1080p(), "w").unwrap();
    assert!(recorder.has_callback());

    assert!(session.add_data(&Packet::new(&IDR).with_pts(Duration::from_secs(1))));
    assert_eq!(session.state(), VideoState::Running);

    // Callback arrives on the device thread
    let device = recorder.clone();
    thread::spawn(move || device.fire(PipelineEvent::load_completed()))
        .join()
        .unwrap();

    assert_eq!(recorder.count(|c| matches!(c, RecordedCommand::Play)), 1);
    assert_eq!(session.state(), VideoState::Flushed);
}

#[test]
fn test_guard_released_across_open_cycles() {
    let recorder = RecordingPipeline::new();
    let guard = InstanceGuard::new("open cycles");

    for _ in 0..3 {
        let mut session = video_session(&recorder, &guard);
        session.open(h264_1080p(), "w").unwrap();
        assert!(guard.is_held());
        session.dispose();
        assert!(!guard.is_held());
    }

    // Dropping an open session releases too
    {
        let mut session = video_session(&recorder, &guard);
        session.open(h264_1080p(), "w").unwrap();
    }
    assert!(!guard.is_held());
    assert_eq!(recorder.count(|c| matches!(c, RecordedCommand::Unload)), 4);
}

#[test]
fn test_second_open_is_busy_and_first_survives() {
    let first_device = RecordingPipeline::new();
    let second_device = RecordingPipeline::new();
    let guard = InstanceGuard::new("busy");

    let mut first = video_session(&first_device, &guard);
    first.open(h264_1080p(), "w").unwrap();

    let mut second = video_session(&second_device, &guard);
    let err = second.open(h264_1080p(), "w").unwrap_err();
    assert!(matches!(err, HwPipeError::DeviceBusy { .. }));
    assert!(second_device.commands().is_empty());

    assert!(guard.is_held());
    assert!(first.add_data(&Packet::new(&IDR).with_pts(Duration::ZERO)));
    assert_eq!(first_device.feeds().len(), 1);

    // Disposing the failed session must not free the winner's guard
    second.dispose();
    assert!(guard.is_held());
}

#[test]
fn test_double_dispose() {
    let recorder = RecordingPipeline::new();
    let guard = InstanceGuard::new("double dispose");
    let mut session = video_session(&recorder, &guard);
    session.open(h264_1080p(), "w").unwrap();

    session.dispose();
    session.dispose();
    drop(session);

    assert_eq!(recorder.count(|c| matches!(c, RecordedCommand::Unload)), 1);
    assert!(!guard.is_held());
}

#[test]
fn test_load_rejection_releases_guard() {
    let recorder = RecordingPipeline::rejecting_load();
    let guard = InstanceGuard::new("rejected");
    let mut session = video_session(&recorder, &guard);

    let err = session.open(h264_1080p(), "w").unwrap_err();
    assert!(matches!(err, HwPipeError::DeviceRejected { .. }));
    assert!(!guard.is_held());
    assert_eq!(session.state(), VideoState::Closed);
}

#[test]
fn test_open_rejects_bad_descriptors() {
    let recorder = RecordingPipeline::new();
    let guard = InstanceGuard::new("bad descriptors");

    let mut session = video_session(&recorder, &guard);
    let err = session
        .open(StreamDescriptor::video(VideoCodecId::H264, 0, 1080), "w")
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_STREAM_DESCRIPTOR");
    assert!(!guard.is_held());

    let err = session
        .open(StreamDescriptor::video(VideoCodecId::Mjpeg, 640, 480), "w")
        .unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    assert!(!guard.is_held());
    assert!(recorder.loads().is_empty());
}

#[test]
fn test_add_data_on_closed_session() {
    let recorder = RecordingPipeline::new();
    let guard = InstanceGuard::new("closed");
    let mut session = video_session(&recorder, &guard);

    assert!(session.add_data(&Packet::new(&IDR).with_pts(Duration::ZERO)));
    assert!(recorder.commands().is_empty());
}

// ============================================================================
// Video ingest
// ============================================================================

#[test]
fn test_buffer_full_is_retried_at_frame_pace() {
    let recorder = RecordingPipeline::new();
    recorder.script_feed_responses(["BufferFull", "BufferFull", "BufferFull", "Ok"]);
    let guard = InstanceGuard::new("buffer full");
    let mut session = video_session(&recorder, &guard);
    session.open(h264_1080p(), "w").unwrap();

    let frame = h264_1080p().frame_duration().unwrap();
    let start = Instant::now();
    assert!(session.add_data(&Packet::new(&IDR).with_pts(Duration::ZERO)));
    let elapsed = start.elapsed();

    assert!(elapsed >= frame * 3, "returned after {elapsed:?}");
    let feeds = recorder.feeds();
    assert_eq!(feeds.len(), 4);
    // Resubmissions carry the identical document
    assert!(feeds.iter().all(|doc| doc == &feeds[0]));
    assert_eq!(session.stats().buffer_full_retries, 3);
    assert_eq!(session.stats().packets_fed, 1);
}

#[test]
fn test_fatal_feed_response() {
    let recorder = RecordingPipeline::new();
    recorder.set_default_feed_response("Error: pipeline torn down");
    let guard = InstanceGuard::new("fatal");
    let mut session = video_session(&recorder, &guard);
    session.open(h264_1080p(), "w").unwrap();

    assert!(!session.add_data(&Packet::new(&IDR).with_pts(Duration::ZERO)));
    assert_eq!(recorder.feeds().len(), 1);
    assert_eq!(session.stats().fatal_responses, 1);
}

#[test]
fn test_interrupt_unblocks_buffer_full_loop() {
    let recorder = RecordingPipeline::new();
    recorder.set_default_feed_response("BufferFull");
    let guard = InstanceGuard::new("interrupt");
    let mut session = video_session(&recorder, &guard);
    session.open(h264_1080p(), "w").unwrap();

    let interrupt = session.interrupt_handle();
    let interrupter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        interrupt.cancel();
    });

    let start = Instant::now();
    assert!(!session.add_data(&Packet::new(&IDR).with_pts(Duration::ZERO)));
    interrupter.join().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(session.stats().cancelled_submissions, 1);
    assert_eq!(session.stats().packets_fed, 0);

    // The engine resubmits the packet it was told was not taken
    recorder.script_feed_responses(["BufferFull", "Ok"]);
    assert!(session.add_data(&Packet::new(&IDR).with_pts(Duration::ZERO)));
    assert_eq!(session.stats().packets_fed, 1);
    assert_eq!(session.stats().cancelled_submissions, 1);
}

#[test]
fn test_interrupt_before_feed_loses_nothing() {
    let recorder = RecordingPipeline::new();
    recorder.script_feed_responses(["BufferFull", "Ok"]);
    let guard = InstanceGuard::new("stale interrupt");
    let mut session = video_session(&recorder, &guard);
    session.open(h264_1080p(), "w").unwrap();

    session.interrupt_handle().cancel();
    assert!(session.add_data(&Packet::new(&IDR).with_pts(Duration::from_millis(40))));

    assert_eq!(recorder.feeds().len(), 2);
    assert_eq!(session.stats().packets_fed, 1);
    assert_eq!(session.stats().buffer_full_retries, 1);
    assert_eq!(session.stats().cancelled_submissions, 0);
}

#[test]
fn test_reset_seeks_again() {
    let recorder = RecordingPipeline::new();
    let guard = InstanceGuard::new("reset");
    let mut session = video_session(&recorder, &guard);
    session.open(h264_1080p(), "w").unwrap();

    assert!(session.add_data(&Packet::new(&IDR).with_pts(Duration::ZERO)));
    recorder.set_playtime(1_000_000);
    let _ = session.get_frame();
    assert!(session.last_picture_pts().is_some());

    session.reset();
    assert_eq!(session.state(), VideoState::Flushed);
    assert!(session.last_picture_pts().is_none());
    assert_eq!(recorder.count(|c| matches!(c, RecordedCommand::Flush)), 1);

    assert!(session.add_data(&Packet::new(&IDR).with_pts(Duration::from_secs(5))));
    assert_eq!(recorder.seeks(), vec!["0".to_string(), "5000".to_string()]);
}

#[test]
fn test_converter_holds_until_keyframe_after_reset() {
    let recorder = RecordingPipeline::new();
    let guard = InstanceGuard::new("keyframe");
    let mut session = video_session(&recorder, &guard);
    session.set_converter_factory(KeyframeGate::factory());
    session
        .open(h264_1080p().with_extradata(vec![1, 0x64, 0, 0x28]), "w")
        .unwrap();

    assert!(session.add_data(&Packet::new(&NON_IDR).with_pts(Duration::ZERO)));
    assert!(recorder.feeds().is_empty());
    assert!(recorder.seeks().is_empty());
    assert_eq!(session.state(), VideoState::Flushed);

    assert!(session.add_data(&Packet::new(&IDR).with_pts(Duration::from_millis(40))));
    assert!(session.add_data(&Packet::new(&NON_IDR).with_pts(Duration::from_millis(80))));
    assert_eq!(recorder.feeds().len(), 2);

    session.reset();
    assert!(session.add_data(&Packet::new(&NON_IDR).with_pts(Duration::from_millis(120))));
    assert_eq!(recorder.feeds().len(), 2);
}

#[test]
fn test_reconfigure() {
    let recorder = RecordingPipeline::new();
    let guard = InstanceGuard::new("reconfigure");
    let mut session = video_session(&recorder, &guard);
    session.open(h264_1080p(), "w").unwrap();

    let mut same_stream = h264_1080p().with_extradata(vec![1, 2, 3]);
    same_stream.id = 7;
    assert!(session.reconfigure(same_stream));
    assert_eq!(session.descriptor().map(|d| d.id), Some(7));

    let resized = StreamDescriptor::video(VideoCodecId::H264, 1280, 720).with_fps(24000, 1001);
    assert!(!session.reconfigure(resized));
    assert_eq!(session.descriptor().map(|d| d.width), Some(1920));
}

// ============================================================================
// HDR
// ============================================================================

#[test]
fn test_hdr10_metadata_sent_once() {
    let recorder = RecordingPipeline::new();
    let guard = InstanceGuard::new("hdr");
    let mut session = video_session(&recorder, &guard);
    session.open(hdr10_descriptor(), "w").unwrap();

    let documents = recorder.hdr_documents();
    assert_eq!(documents.len(), 1);
    let doc = &documents[0];
    assert_eq!(doc["hdrType"], "HDR10");
    assert_eq!(doc["sei"]["displayPrimariesX0"], 35400);
    assert_eq!(doc["sei"]["whitePointX"], 15635);
    assert_eq!(doc["sei"]["minDisplayMasteringLuminance"], 50);
    assert_eq!(doc["sei"]["maxDisplayMasteringLuminance"], 10_000_000);
    assert_eq!(doc["sei"]["maxContentLightLevel"], 1000);
    assert_eq!(doc["vui"]["transferCharacteristics"], 16);

    assert!(!session.set_hdr().unwrap());
    assert_eq!(recorder.hdr_documents().len(), 1);
}

#[test]
fn test_sdr_stream_sends_no_hdr() {
    let recorder = RecordingPipeline::new();
    let guard = InstanceGuard::new("sdr");
    let mut session = video_session(&recorder, &guard);
    session.open(h264_1080p(), "w").unwrap();

    assert!(!session.set_hdr().unwrap());
    assert!(recorder.hdr_documents().is_empty());
}

// ============================================================================
// Audio
// ============================================================================

#[test]
fn test_ac3_pts_advances_per_unit() {
    let recorder = RecordingPipeline::new();
    let mut session = audio_session(&recorder);
    let format = session
        .initialize(AudioFormat::passthrough(AudioStreamType::Ac3, 48000, 6))
        .unwrap();
    assert_eq!(format.unit_duration(), Duration::from_millis(32));

    let burst = vec![0u8; 1536];
    assert_eq!(session.add_packets(&burst, 1536, 0).unwrap(), 1536);
    assert_eq!(session.add_packets(&burst, 1536, 0).unwrap(), 1536);
    assert_eq!(session.pts_ns(), 64_000_000);

    // Transcoder preamble does not advance
    assert_eq!(session.add_packets(&burst, 1024, 0).unwrap(), 1024);
    assert_eq!(session.pts_ns(), 64_000_000);

    let feeds = recorder.feeds();
    assert_eq!(feeds[0]["pts"], 0);
    assert_eq!(feeds[1]["pts"], 32_000_000);
    assert_eq!(feeds[2]["pts"], 64_000_000);
    assert_eq!(feeds[2]["bufferSize"], 1024);
    assert_eq!(feeds[2]["esData"], 2);
}

#[test]
fn test_audio_delay_and_drain() {
    let recorder = RecordingPipeline::new();
    let mut session = audio_session(&recorder);
    session
        .initialize(AudioFormat::passthrough(AudioStreamType::Ac3, 48000, 2))
        .unwrap();
    assert_eq!(session.delay(), HARDWARE_LATENCY);
    assert_eq!(session.cache_total(), Duration::from_millis(256));

    let burst = vec![0u8; 1536];
    for _ in 0..4 {
        session.add_packets(&burst, 1536, 0).unwrap();
    }
    assert!(recorder.fire(PipelineEvent::frame_ready(100_000_000)));
    assert_eq!(session.delay(), HARDWARE_LATENCY + Duration::from_millis(28));

    session.drain();
    assert_eq!(session.pts_ns(), 0);
    assert_eq!(session.delay(), HARDWARE_LATENCY);
    assert_eq!(recorder.count(|c| matches!(c, RecordedCommand::Flush)), 1);

    session.add_packets(&burst, 1536, 0).unwrap();
    assert_eq!(recorder.feeds().last().unwrap()["pts"], 0);
}

#[test]
fn test_eac3_load_document() {
    let recorder = RecordingPipeline::new();
    let mut session = audio_session(&recorder);
    let format = session
        .initialize(AudioFormat::passthrough(AudioStreamType::Eac3, 48000, 6))
        .unwrap();
    assert_eq!(format.frames, 1536);
    assert_eq!(session.queue_level(), 1536 * 8);

    let loads = recorder.loads();
    let contents = &loads[0]["args"][0]["option"]["externalStreamingInfo"]["contents"];
    assert_eq!(contents["codec"]["audio"], "AC3 PLUS");
    assert_eq!(contents["ac3PlusInfo"]["channels"], 6);
    assert_eq!(contents["ac3PlusInfo"]["frequency"], 48.0);
}

#[test]
fn test_audio_rejects_unsupported_formats() {
    let recorder = RecordingPipeline::new();
    let mut session = audio_session(&recorder);

    let err = session
        .initialize(AudioFormat::passthrough(AudioStreamType::TrueHd, 48000, 8))
        .unwrap_err();
    assert!(matches!(err, HwPipeError::UnsupportedFormat { .. }));
    assert_eq!(session.state(), AudioSessionState::Closed);
    assert!(recorder.loads().is_empty());
}

#[test]
fn test_audio_ingest_errors() {
    let recorder = RecordingPipeline::new();
    let mut session = audio_session(&recorder);

    let err = session.add_packets(&[0u8; 16], 16, 0).unwrap_err();
    assert!(matches!(err, HwPipeError::InvalidState { .. }));

    session
        .initialize(AudioFormat::passthrough(AudioStreamType::Ac3, 48000, 2))
        .unwrap();
    let err = session.add_packets(&[0u8; 16], 16, 8).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_STREAM_DESCRIPTOR");

    let err = session.add_packets(&[0u8; 16], 16, u32::MAX).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_STREAM_DESCRIPTOR");
    let err = session.add_packets(&[0u8; 16], u32::MAX, 1).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_STREAM_DESCRIPTOR");
    assert!(recorder.feeds().is_empty());

    recorder.set_default_feed_response("Error: no sink");
    let err = session.add_packets(&[0u8; 1536], 1536, 0).unwrap_err();
    assert!(matches!(err, HwPipeError::IngestFatal { .. }));
    assert_eq!(session.pts_ns(), 0);
}

#[test]
fn test_interrupted_audio_does_not_advance_pts() {
    let recorder = RecordingPipeline::new();
    recorder.set_default_feed_response("BufferFull");
    let mut session = audio_session(&recorder);
    session
        .initialize(AudioFormat::passthrough(AudioStreamType::Ac3, 48000, 6))
        .unwrap();

    let interrupt = session.interrupt_handle();
    let interrupter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(80));
        interrupt.cancel();
    });

    let burst = vec![0u8; 1536];
    assert_eq!(session.add_packets(&burst, 1536, 0).unwrap(), 0);
    interrupter.join().unwrap();
    assert_eq!(session.pts_ns(), 0);

    recorder.set_default_feed_response("Ok");
    recorder.script_feed_responses(["BufferFull", "Ok"]);
    assert_eq!(session.add_packets(&burst, 1536, 0).unwrap(), 1536);
    assert_eq!(session.pts_ns(), 32_000_000);

    // Every resubmission carried the pre-advance timestamp
    assert!(recorder.feeds().iter().all(|feed| feed["pts"] == 0));
    assert_eq!(session.stats().cancelled_submissions, 1);
}

#[test]
fn test_audio_deinitialize_is_idempotent() {
    let recorder = RecordingPipeline::new();
    let mut session = audio_session(&recorder);
    session
        .initialize(AudioFormat::passthrough(AudioStreamType::Ac3, 44100, 2))
        .unwrap();

    session.deinitialize();
    session.deinitialize();
    drop(session);
    assert_eq!(recorder.count(|c| matches!(c, RecordedCommand::Unload)), 1);
}

//! Basic playback against a recording pipeline
//!
//! Opens a video and a passthrough audio session, feeds a few packets with a
//! simulated full ingest buffer, drives the device callback from its own
//! thread and prints a session report.
//!
//! Run with `RUST_LOG=debug cargo run --example basic_playback` for the full
//! command trace.

use hwpipe::{
    AudioFormat, AudioStreamType, CommandSummary, FrameEvent, GlobalConfig, HardwarePipeline,
    HwPipe, InstanceGuard, Packet, PipelineEvent, PipelineFactory, SessionReport,
    SharedVideoSession, StreamDescriptor, VideoCodecId,
};
use hwpipe_diagnostics::RecordingPipeline;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let video_device = RecordingPipeline::new();
    let audio_device = RecordingPipeline::new();
    video_device.script_feed_responses(["BufferFull", "BufferFull", "Ok"]);

    // Sessions ask the factory for a fresh handle; the first one is video
    let audio_handle: Arc<dyn HardwarePipeline> = audio_device.clone();
    let video_handle: Arc<dyn HardwarePipeline> = video_device.clone();
    let handles = Mutex::new(vec![audio_handle, video_handle]);
    let factory: Arc<dyn PipelineFactory> = Arc::new(move || -> Arc<dyn HardwarePipeline> {
        handles
            .lock()
            .pop()
            .unwrap_or_else(|| RecordingPipeline::new() as Arc<dyn HardwarePipeline>)
    });

    let config = GlobalConfig {
        debug_logging: true,
        ..GlobalConfig::default()
    };
    let hwpipe = HwPipe::init_with_guard(config, factory, InstanceGuard::new("demo video"))?;
    hwpipe.window().bind("demo-window");

    println!("🎬 Registered codecs: {:?}", hwpipe.registry().list_codecs());

    let descriptor = StreamDescriptor::video(VideoCodecId::H264, 1920, 1080).with_fps(24000, 1001);
    let video: SharedVideoSession = Arc::new(Mutex::new(hwpipe.open_video(descriptor)?));

    // The device completes the load on its own thread
    let device = video_device.clone();
    thread::spawn(move || {
        device.fire(PipelineEvent::load_completed());
    })
    .join()
    .map_err(|_| "callback thread panicked")?;

    let frame_interval = Duration::from_nanos(41_708_333);
    for i in 0..5u32 {
        let pts = frame_interval * i;
        let keyframe = if i == 0 { 0x65 } else { 0x41 };
        let accepted =
            HwPipe::feed_video_async(video.clone(), vec![0, 0, 0, 1, keyframe, 0x88], Some(pts))
                .await?;
        println!("📦 Packet {} at {:?} accepted: {}", i, pts, accepted);
    }

    for i in 1..=3i64 {
        video_device.set_playtime(i * 41_708_333);
        video_device.fire(PipelineEvent::frame_ready(i * 41_708_333));
        match video.lock().get_frame() {
            FrameEvent::Frame(marker) => println!("🖼️  Frame at {:?}", marker.pts),
            other => println!("⏳ {:?}", other),
        }
    }

    let mut audio = hwpipe.open_audio(AudioFormat::passthrough(AudioStreamType::Eac3, 48000, 6))?;
    let burst = vec![0u8; 1536];
    for _ in 0..4 {
        audio.add_packets(&burst, 1536, 0)?;
    }
    audio_device.set_playtime(32_000_000);
    audio_device.fire(PipelineEvent::frame_ready(32_000_000));
    println!("🔊 Audio pts {} ns, delay {:?}", audio.pts_ns(), audio.delay());

    let report = {
        let mut session = video.lock();
        let state = session.state();
        SessionReport::new(session.id(), "video", state, session.stats())
            .with_commands(CommandSummary::from_recording(&video_device))
    };
    println!("{}", report.to_json_pretty()?);

    let audio_report = SessionReport::new(audio.id(), "audio", audio.state(), audio.stats())
        .with_commands(CommandSummary::from_recording(&audio_device));
    println!("{}", audio_report.to_json_pretty()?);

    audio.deinitialize();
    video.lock().dispose();
    println!("✅ Done");
    Ok(())
}

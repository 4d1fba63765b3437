use clap::Parser;
use mpegts_streamer::{Demuxer, MediaEvent};
use serde::Serialize;

#[derive(Parser)]
struct Opt {
    /// TS file to stream
    input: std::path::PathBuf,

    /// Start this many milliseconds into the presentation
    #[clap(long, default_value_t = 0)]
    skip_ms: u64,
}

#[derive(Serialize)]
struct EventLine<'a> {
    time: String,
    event: &'a str,
    pid: u16,
    pts: u64,
    dts: u64,
    bytes: usize,
}

fn print_event(name: &str, event: &MediaEvent) {
    let line = EventLine {
        time: chrono::Utc::now().to_rfc3339(),
        event: name,
        pid: event.pid,
        pts: event.pts,
        dts: event.dts,
        bytes: event.payload.len(),
    };
    if let Ok(json) = serde_json::to_string(&line) {
        println!("{json}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = Opt::parse();

    let mut demuxer = Demuxer::new();
    demuxer.open(&opt.input)?;
    demuxer.on_audio(|ev| print_event("audio", ev));
    demuxer.on_video(|ev| print_event("video", ev));
    demuxer.on_end(|| println!("{}", serde_json::json!({ "event": "end" })));

    demuxer.start_streaming(opt.skip_ms).await?;
    demuxer.close();
    Ok(())
}

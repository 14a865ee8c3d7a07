//! Replays a JSON-lines detection log through one camera pipeline and prints
//! every alert as a JSON line.
//!
//! Each input line is one frame:
//!
//! ```json
//! {"timestamp": 1700000000.0, "persons": [
//!   {"box": [100, 80, 180, 320], "score": 0.91,
//!    "attributes": {"helmet": true, "gloves": false},
//!    "confidences": {"helmet": 0.82}, "zone": "welding"}
//! ]}
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ppe_sentinel::{
    AlertRecord, AlertSink, CameraConfig, CameraPipeline, CameraWorker, Clock, FrameSource,
    ManualClock, MemoryTtlStore, PersonBuilder, PersonObservation, SentinelConfig,
};

#[derive(Debug, Parser)]
#[command(name = "ppe-replay", version, about = "Replay a detection log through the PPE alert engine")]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(long, env = "PPE_SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Camera id to replay as
    #[arg(long, default_value = "replay")]
    camera: String,

    /// Frame width used when the camera is not in the config file
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Frame height used when the camera is not in the config file
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// JSON-lines input, `-` for stdin
    #[arg(default_value = "-")]
    input: String,
}

#[derive(Debug, Deserialize)]
struct ReplayFrame {
    timestamp: f64,
    #[serde(default)]
    persons: Vec<ReplayPerson>,
}

#[derive(Debug, Deserialize)]
struct ReplayPerson {
    #[serde(rename = "box")]
    tlbr: [f32; 4],
    #[serde(default = "default_score")]
    score: f32,
    #[serde(default)]
    attributes: BTreeMap<String, bool>,
    #[serde(default)]
    confidences: HashMap<String, f32>,
    #[serde(default)]
    zone: Option<String>,
    #[serde(default = "default_monitored")]
    monitored: bool,
}

fn default_score() -> f32 {
    1.0
}

fn default_monitored() -> bool {
    true
}

impl ReplayPerson {
    fn into_observation(self) -> PersonObservation {
        let [x1, y1, x2, y2] = self.tlbr;
        let mut builder = PersonBuilder::new().tlbr(x1, y1, x2, y2).score(self.score);
        for (name, present) in self.attributes {
            builder = match self.confidences.get(&name) {
                Some(&conf) => builder.attribute_with_confidence(name, present, conf),
                None => builder.attribute(name, present),
            };
        }
        if let Some(zone) = self.zone {
            builder = builder.zone(zone);
        }
        if !self.monitored {
            builder = builder.unmonitored();
        }
        builder.build()
    }
}

/// Reads frames and moves the shared clock to each frame's timestamp.
struct ReplaySource {
    lines: io::Lines<Box<dyn BufRead + Send>>,
    clock: ManualClock,
    line_no: usize,
}

impl FrameSource for ReplaySource {
    type Error = anyhow::Error;

    fn next_frame(&mut self) -> Result<Option<Vec<PersonObservation>>> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            self.line_no += 1;
            let line = line.context("failed to read input")?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: ReplayFrame = match serde_json::from_str(&line) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(line = self.line_no, error = %err, "skipping unparseable frame");
                    continue;
                }
            };
            self.clock.set(frame.timestamp);
            let persons = frame
                .persons
                .into_iter()
                .map(ReplayPerson::into_observation)
                .collect();
            return Ok(Some(persons));
        }
    }
}

struct JsonLinesSink {
    out: io::Stdout,
}

impl AlertSink for JsonLinesSink {
    fn deliver(&mut self, alert: AlertRecord) {
        let written = serde_json::to_string(&alert)
            .map_err(io::Error::from)
            .and_then(|json| writeln!(self.out.lock(), "{json}"));
        if let Err(err) = written {
            warn!(camera = %alert.camera_id, identity = alert.identity, error = %err, "failed to write alert");
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SentinelConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SentinelConfig::default(),
    };
    if config.camera(&cli.camera).is_none() {
        config
            .cameras
            .push(CameraConfig::new(&cli.camera, cli.width, cli.height));
    }

    let input: Box<dyn BufRead + Send> = if cli.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&cli.input).with_context(|| format!("opening {}", cli.input))?;
        Box::new(BufReader::new(file))
    };

    let clock = ManualClock::new(0.0);
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = Arc::new(MemoryTtlStore::new(shared_clock.clone()));
    let pipeline = CameraPipeline::new(&config, &cli.camera, store, shared_clock)
        .context("building camera pipeline")?;

    let source = ReplaySource {
        lines: input.lines(),
        clock,
        line_no: 0,
    };
    let sink = JsonLinesSink { out: io::stdout() };
    let report = CameraWorker::new(pipeline, source, sink, Arc::new(AtomicBool::new(false))).run();

    info!(
        frames = report.frames,
        alerts = report.alerts,
        dropped = report.dropped_observations,
        "replay finished"
    );
    if let Some(err) = report.source_error {
        anyhow::bail!("replay aborted: {err}");
    }
    Ok(())
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::{Args, Command, StreamArgs};
use clap::Parser;
use haarcam::{
    capture::CaptureSession,
    display::DisplaySurface,
    haar::HaarTransform,
    lut::ColorLookupTable,
    pipeline::{Pipeline, PipelineConfig},
    rawfile, Error, Result,
};
use std::{
    io::{self, Write},
    path::Path,
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, Layer};

mod args;

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    let result = match &args.command {
        Command::Stream(stream_args) => stream(stream_args),
        Command::BuildLut { output } => build_lut(output),
        Command::Transform {
            input,
            output,
            width,
            height,
        } => transform(input, output, *width, *height),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(args: &Args) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let stdout_log = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(level);

    let journald = if args.journald {
        Some(tracing_journald::layer()?.with_filter(level))
    } else {
        None
    };

    let tracy = if args.tracy {
        let _ = tracy_client::Client::start();
        Some(tracing_tracy::TracyLayer::default().with_filter(level))
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry()
        .with(stdout_log)
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    Ok(())
}

fn stream(args: &StreamArgs) -> Result<()> {
    let start = Instant::now();

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.store(true, Ordering::SeqCst))
        .map_err(|e| Error::Io(io::Error::other(e)))?;

    let lut = ColorLookupTable::load_or_build(&args.lut)?;

    // the panel comes up first and the camera last, so shutdown stops the
    // camera before the panel goes away
    let mut display = DisplaySurface::open(&args.display)?;
    display.fill(args.background);

    let mut capture = CaptureSession::open(&args.camera)?;
    capture.set_timeout(args.capture_timeout());
    capture.start(args.width(), args.height(), args.buffers)?;

    let config = PipelineConfig {
        frame_budget: args.frame_budget(),
        transform: !args.bypass_transform,
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(capture, display, &lut, config)?;
    info!("initialisation took {:.3}s", start.elapsed().as_secs_f64());

    let _cursor = args.hide_cursor.then(HiddenCursor::new);
    let result = pipeline.run(&stop);

    let mut snapshot = Ok(());
    if let Ok(stats) = &result {
        info!(
            "{} frames, {:.6} sec/frame, {:.2} frames/sec",
            stats.frames,
            stats.seconds_per_frame(),
            stats.frames_per_second()
        );
        if let Some(path) = &args.snapshot {
            snapshot = rawfile::write_frame16(path, pipeline.last_frame());
            if snapshot.is_ok() {
                info!("wrote snapshot {}", path.display());
            }
        }
    }

    // resources are released before any failure is reported
    let shutdown = pipeline.shutdown();
    result?;
    snapshot?;
    shutdown
}

fn build_lut(output: &Path) -> Result<()> {
    ColorLookupTable::build().persist(output)
}

fn transform(input: &Path, output: &Path, width: u32, height: u32) -> Result<()> {
    let haar = HaarTransform::new(width, height)?;
    let src = rawfile::read_frame16(input, width, height)?;

    let start = Instant::now();
    let dst = haar.transform_new(&src)?;
    info!("transformed {src} in {:?}", start.elapsed());

    rawfile::write_frame16(output, &dst)
}

/// Hides the console cursor over the framebuffer until dropped.
struct HiddenCursor;

impl HiddenCursor {
    fn new() -> Self {
        Self::write("\x1b[?25l");
        Self
    }

    fn write(sequence: &str) {
        let mut stdout = io::stdout();
        let _ = stdout
            .write_all(sequence.as_bytes())
            .and_then(|_| stdout.flush());
    }
}

impl Drop for HiddenCursor {
    fn drop(&mut self) {
        Self::write("\x1b[?25h");
    }
}

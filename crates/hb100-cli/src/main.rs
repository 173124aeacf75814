//! hb100-edit — editor/controller for the HB100 guitar multi-effects unit.
//!
//! Connects to the device over USB, downloads the preset bank and extras
//! catalogue, and executes commands arriving from the interactive CLI, the
//! HTTP/WebSocket API and the startup options. Can also run fully offline
//! as a preset file converter between the binary and PHB formats.

mod options;
mod repl;
mod startup;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hb100_api::Server;
use hb100_engine::{Engine, Task, TaskKind, TaskQueue, UsbTransport};

use crate::options::Options;

fn main() -> anyhow::Result<()> {
    println!("\nOpen source HB100 editor (experimental and WIP)\n");
    println!("  Not affiliated with, nor endorsed by, the device vendor.\n");

    let options = Options::parse();
    init_logging(&options);

    let result = run(&options);
    if let Err(e) = &result {
        tracing::error!("{e:#}");
    }
    println!("\nBye!");
    result
}

/// Map the numeric debug level onto a tracing filter. `RUST_LOG` still wins
/// when set, matching the rest of the tooling here.
fn init_logging(options: &Options) {
    let default = match options.debug_level {
        0 => "off",
        1 | 2 => "error",
        3 => "warn",
        4 => "info",
        5 | 6 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!options.disable_colors);
    if options.debug_timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}

fn run(options: &Options) -> anyhow::Result<()> {
    let http_port = options.http_port();

    startup::validate_file_options(options)?;
    let imported = startup::load_input_preset(options)?;
    startup::convert_outputs(options, imported.as_ref())?;
    if options.preset_out.is_none()
        && options.phb_out.is_none()
        && let Some(preset) = &imported
    {
        info!("\n{}", preset.describe());
    }

    if let Some(dir) = &options.save_presets {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating presets folder '{}'", dir.display()))?;
        info!("presets folder: {}", dir.display());
    }

    if options.offline {
        return Ok(());
    }

    let queue = Arc::new(TaskQueue::new());
    let stop = Arc::new(AtomicBool::new(false));

    for task in startup::startup_tasks(options, imported.as_ref().map(|p| p.name.as_str())) {
        queue.push(task);
    }

    {
        let stop = Arc::clone(&stop);
        let queue = Arc::clone(&queue);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
            queue.wake_all();
        })
        .context("installing the signal handler")?;
    }

    let transport =
        UsbTransport::open(options.debug_libusb).context("connecting to the device")?;
    let mut engine = Engine::new(Some(transport), Arc::clone(&queue), Arc::clone(&stop))
        .with_presets_dir(options.save_presets.clone());
    if let Some(preset) = imported
        && let Err(e) = engine.store_mut().add_by_name(preset.into_shared())
    {
        warn!(error = %e, "couldn't register the imported preset");
    }

    let server = if http_port > 0 {
        Some(
            Server::start(http_port, Arc::clone(&queue))
                .context("starting the HTTP/WebSocket server")?,
        )
    } else {
        None
    };

    if options.interactive {
        repl::spawn(Arc::clone(&queue), Arc::clone(&stop));
    } else if server.is_none() {
        // Nothing can enqueue more work: quit once the startup tasks ran
        queue.push(Task::new(TaskKind::Quit));
    }

    engine.run();

    if let Some(server) = server {
        server.shutdown();
    }
    Ok(())
}

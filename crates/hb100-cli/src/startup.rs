//! Startup-time file handling and task queueing.

use anyhow::{bail, Context};
use tracing::warn;

use hb100_preset::{export_preset, load_preset_file, Preset};

use hb100_engine::Task;

use crate::options::Options;

/// Reject contradictory file options before any work happens.
pub fn validate_file_options(options: &Options) -> anyhow::Result<()> {
    if options.preset_in.is_some() && options.phb_in.is_some() {
        bail!("can't provide both binary and PHB file as preset input");
    }
    if (options.preset_out.is_some() || options.phb_out.is_some())
        && options.preset_in.is_none()
        && options.phb_in.is_none()
    {
        bail!("can't convert preset to a different format, no input preset provided");
    }
    Ok(())
}

/// Read the startup preset file, if one was given.
pub fn load_input_preset(options: &Options) -> anyhow::Result<Option<Preset>> {
    let (path, phb) = match (&options.preset_in, &options.phb_in) {
        (Some(path), _) => (path, false),
        (_, Some(path)) => (path, true),
        _ => return Ok(None),
    };
    let preset = load_preset_file(path, phb)
        .with_context(|| format!("reading preset file '{}'", path.display()))?;
    Ok(Some(preset))
}

/// Write the startup conversion outputs, if any were requested.
pub fn convert_outputs(options: &Options, preset: Option<&Preset>) -> anyhow::Result<()> {
    let Some(preset) = preset else {
        return Ok(());
    };
    if let Some(path) = &options.preset_out {
        export_preset(preset, path, false)
            .with_context(|| format!("writing preset file '{}'", path.display()))?;
    }
    if let Some(path) = &options.phb_out {
        export_preset(preset, path, true)
            .with_context(|| format!("writing PHB file '{}'", path.display()))?;
    }
    Ok(())
}

/// Build the tasks queued at startup, in the canonical order: handshake,
/// bank download, extras download, then the optional preset change and
/// upload.
pub fn startup_tasks(options: &Options, imported: Option<&str>) -> Vec<Task> {
    let mut tasks = Vec::new();
    let mut push = |argv: &[&str]| {
        if let Some(task) = Task::from_argv(argv) {
            tasks.push(task);
        }
    };
    if !options.no_init {
        push(&["init"]);
    }
    if !options.no_get_presets {
        push(&["get-presets"]);
    }
    if !options.no_get_extras {
        push(&["get-extras"]);
    }
    if options.change_preset > 0 {
        // Out-of-range slots are warned about inside the task parser
        push(&["change-preset", &options.change_preset.to_string()]);
    }
    if options.upload_preset > 0 {
        match imported {
            Some(name) => push(&["upload-preset", &options.upload_preset.to_string(), name]),
            None => warn!("can't upload a preset, none was imported"),
        }
    }
    tasks
}

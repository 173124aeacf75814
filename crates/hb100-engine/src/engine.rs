//! The protocol engine: command execution and the event loop.
//!
//! One engine owns the transport, the preset store and the response buffer.
//! Exactly one command may be in flight at a time; the in-flight latch is an
//! explicit atomic that every path — success, failure, local-only tasks —
//! must release before the task's completion callback runs. A stuck latch
//! stalls the whole scheduler, so the release lives in exactly one place,
//! [`Engine::step`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use hb100_catalog::{BANK_SLOTS, PRESET_NAME_SIZE, PRESET_SIZE};
use hb100_preset::{
    decode_binary, encode_binary, export_preset, to_phb_value, PresetError, PresetStore,
    SharedPreset,
};

use crate::error::EngineError;
use crate::frame::Reassembly;
use crate::queue::TaskQueue;
use crate::task::{PresetRef, TaskKind};
use crate::usb::Transport;
use crate::wire::{
    pad64, CHANGE_PRESET, FRAME_SIZE, GET_EXTRAS_1, GET_EXTRAS_2, GET_PRESETS_1, GET_PRESETS_2,
    INIT_1, INIT_2, INIT_RESPONSE_PREFIX, PRESETS_RESPONSE_PREFIX, UPLOAD_FRAME_3, UPLOAD_FRAME_4,
    UPLOAD_PREFIX, UPLOAD_PRESET, UPLOAD_SPLITS,
};

/// How long the idle event loop waits for new tasks before re-checking the
/// stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Maximum extras catalogue entries the device reports.
const EXTRAS_MAX: usize = 20;
/// Size of one extras catalogue entry on the wire.
const EXTRAS_ENTRY_SIZE: usize = 16;
/// Offset of the first extras entry in the reassembled response.
const EXTRAS_OFFSET: usize = 5;

/// Interactive command overview, printed by `help`.
pub const COMMAND_HELP: &[&str] = &[
    "help",
    "quit",
    "list-presets",
    "init",
    "get-presets",
    "get-extras",
    "interrupt",
    "change-preset <1-200>",
    "rename-preset <1-200> <name>",
    "upload-preset <1-200> <name>",
    "import-preset <binary|phb> <path>",
    "parse-preset <1-200|name>",
    "export-preset <1-200|name> <binary|phb> [path]",
];

/// Device identity parsed from the handshake response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Free-form identity line (device and firmware family).
    pub identity: String,
    /// Three short version fields.
    pub versions: [String; 3],
}

/// The single-in-flight command engine.
pub struct Engine<T: Transport> {
    transport: Option<T>,
    store: PresetStore,
    queue: Arc<TaskQueue>,
    stop: Arc<AtomicBool>,
    in_flight: AtomicBool,
    presets_dir: Option<PathBuf>,
    response: Reassembly,
    device_info: Option<DeviceInfo>,
    extras: Vec<String>,
}

impl<T: Transport> Engine<T> {
    /// Build an engine. `transport` is `None` in offline mode, which makes
    /// every device command fail with `Disconnected`.
    pub fn new(transport: Option<T>, queue: Arc<TaskQueue>, stop: Arc<AtomicBool>) -> Self {
        Self {
            transport,
            store: PresetStore::new(),
            queue,
            stop,
            in_flight: AtomicBool::new(false),
            presets_dir: None,
            response: Reassembly::new(),
            device_info: None,
            extras: Vec::new(),
        }
    }

    /// Persist every downloaded bank preset under this folder.
    pub fn with_presets_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.presets_dir = dir;
        self
    }

    /// The preset store.
    pub fn store(&self) -> &PresetStore {
        &self.store
    }

    /// Mutable access to the preset store (startup imports).
    pub fn store_mut(&mut self) -> &mut PresetStore {
        &mut self.store
    }

    /// Identity reported by the device, once `init` has run.
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    /// Extras catalogue, once `get-extras` has run.
    pub fn extras(&self) -> &[String] {
        &self.extras
    }

    /// Run one scheduler step: acquire the latch, pop one task, execute it,
    /// release the latch, fire the completion. Returns whether a task ran.
    pub fn step(&mut self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let Some(task) = self.queue.try_pop() else {
            self.in_flight.store(false, Ordering::Release);
            return false;
        };
        self.response.begin();
        let (kind, completion) = task.into_parts();
        debug!(task = kind.label(), "dispatching");
        let outcome = self.execute(&kind);
        // Latch first, callback second: a completion that immediately
        // enqueues must find the engine free.
        self.in_flight.store(false, Ordering::Release);
        match outcome {
            Ok(payload) => {
                if let Some(complete) = completion {
                    complete(200, payload);
                }
            }
            Err(e) => {
                warn!(task = kind.label(), error = %e, "task failed");
                if let Some(complete) = completion {
                    complete(e.completion_code(), json!({ "reason": e.to_string() }));
                }
            }
        }
        true
    }

    /// The event loop: drain tasks until the stop flag flips, then discard
    /// whatever is still pending.
    pub fn run(&mut self) {
        info!("engine loop started");
        while !self.stop.load(Ordering::SeqCst) {
            if self.step() {
                continue;
            }
            self.queue.wait_nonempty(POLL_INTERVAL);
        }
        let discarded = self.queue.clear();
        if discarded > 0 {
            debug!(discarded, "dropped pending tasks at shutdown");
        }
        info!("engine loop stopped");
    }

    fn execute(&mut self, kind: &TaskKind) -> Result<Value, EngineError> {
        if kind.needs_device() && self.transport.is_none() {
            return Err(EngineError::Disconnected);
        }
        match kind {
            TaskKind::Cli => Ok(Value::Null),
            TaskKind::Help => {
                info!("commands:\n  {}", COMMAND_HELP.join("\n  "));
                Ok(json!({ "commands": COMMAND_HELP }))
            }
            TaskKind::Quit => {
                self.stop.store(true, Ordering::SeqCst);
                self.queue.wake_all();
                Ok(Value::Null)
            }
            TaskKind::ListPresets => {
                info!("\n{}", self.store.render_listing());
                Ok(self.store.to_json())
            }
            TaskKind::Init => self.cmd_init(),
            TaskKind::GetPresets => self.cmd_get_presets(),
            TaskKind::GetExtras => self.cmd_get_extras(),
            TaskKind::Interrupt => self.cmd_interrupt(),
            TaskKind::ChangePreset { slot } => self.cmd_change_preset(*slot),
            TaskKind::RenamePreset { .. } => Err(EngineError::Unsupported("rename-preset")),
            TaskKind::UploadPreset { slot, name } => self.cmd_upload_preset(*slot, name),
            TaskKind::ImportPreset { phb, path } => {
                let preset = self.store.import(path, *phb)?;
                let name = preset.borrow().name.clone();
                info!("  -- successfully imported preset '{name}'");
                Ok(json!({ "name": name }))
            }
            TaskKind::ParsePreset { target } => {
                let preset = self.lookup(target)?;
                let preset = preset.borrow();
                info!("\n{}", preset.describe());
                Ok(to_phb_value(&preset)?)
            }
            TaskKind::ExportPreset { target, phb, path } => {
                let preset = self.lookup(target)?;
                let preset = preset.borrow();
                let path = path.as_ref().map_or_else(
                    || PathBuf::from(format!("{}.{}", preset.name, if *phb { "phb" } else { "bhb" })),
                    PathBuf::from,
                );
                export_preset(&preset, &path, *phb)?;
                info!("  -- successfully exported preset '{}'", preset.name);
                Ok(json!({ "name": preset.name, "path": path.display().to_string() }))
            }
        }
    }

    fn lookup(&self, target: &PresetRef) -> Result<SharedPreset, EngineError> {
        let found = match target {
            PresetRef::Slot(slot) => self.store.find_by_id(*slot),
            PresetRef::Name(name) => self.store.find_by_name(name),
        };
        found.ok_or_else(|| {
            let what = match target {
                PresetRef::Slot(slot) => format!("slot {slot}"),
                PresetRef::Name(name) => name.clone(),
            };
            EngineError::Preset(PresetError::NotFound(what))
        })
    }

    fn cmd_init(&mut self) -> Result<Value, EngineError> {
        let transport = self.transport.as_mut().ok_or(EngineError::Disconnected)?;
        info!("greeting the device");
        transport.send(&pad64(&INIT_1))?;
        transport.send(&pad64(&INIT_2))?;
        drain_prefixed(transport, &mut self.response, &INIT_RESPONSE_PREFIX);

        let info = parse_device_info(self.response.as_slice());
        info!("  -- {}", info.identity);
        for version in &info.versions {
            info!("  -- {version}");
        }
        let payload = json!({
            "identity": info.identity,
            "versions": info.versions,
        });
        self.device_info = Some(info);
        Ok(payload)
    }

    fn cmd_get_presets(&mut self) -> Result<Value, EngineError> {
        let transport = self.transport.as_mut().ok_or(EngineError::Disconnected)?;
        info!("getting all existing presets");
        transport.send(&pad64(&GET_PRESETS_1))?;
        transport.send(&pad64(&GET_PRESETS_2))?;
        drain_prefixed(transport, &mut self.response, &PRESETS_RESPONSE_PREFIX);

        let buf = self.response.as_slice();
        let mut received = 0usize;
        let mut scanned = 0usize;
        let mut offset = 0usize;
        while offset + PRESET_SIZE <= buf.len() && scanned < BANK_SLOTS {
            let record = &buf[offset..offset + PRESET_SIZE];
            match decode_binary(record) {
                Ok(preset) => {
                    let slot = preset.id;
                    if (1..=BANK_SLOTS as u16).contains(&slot) {
                        // A re-download refreshes the slot
                        self.store.remove_by_id(slot);
                        self.store.add_by_id(preset.into_shared(), slot)?;
                        received += 1;
                        if let Some(dir) = &self.presets_dir {
                            save_bank_record(dir, slot, record);
                        }
                    } else {
                        warn!(slot, "bank record carries an out-of-range slot");
                    }
                }
                Err(e) => warn!(offset, error = %e, "skipping undecodable bank record"),
            }
            offset += PRESET_SIZE;
            scanned += 1;
        }
        info!("  -- received {received} presets");
        Ok(json!({ "received": received }))
    }

    fn cmd_get_extras(&mut self) -> Result<Value, EngineError> {
        let transport = self.transport.as_mut().ok_or(EngineError::Disconnected)?;
        info!("getting all existing extras");
        transport.send(&pad64(&GET_EXTRAS_1))?;
        transport.send(&pad64(&GET_EXTRAS_2))?;
        drain_unprefixed(transport, &mut self.response);

        let buf = self.response.as_slice();
        let mut extras = Vec::new();
        let mut offset = EXTRAS_OFFSET;
        while offset + EXTRAS_ENTRY_SIZE <= buf.len()
            && buf[offset] != 0
            && extras.len() < EXTRAS_MAX
        {
            let entry = String::from_utf8_lossy(&buf[offset..offset + EXTRAS_ENTRY_SIZE])
                .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string();
            info!("  -- {entry}");
            extras.push(entry);
            offset += EXTRAS_ENTRY_SIZE;
        }
        let payload = json!({ "extras": extras });
        self.extras = extras;
        Ok(payload)
    }

    fn cmd_change_preset(&mut self, slot: u16) -> Result<Value, EngineError> {
        let transport = self.transport.as_mut().ok_or(EngineError::Disconnected)?;
        info!("changing current preset to {slot}");
        let mut payload = CHANGE_PRESET.to_vec();
        payload.push(slot as u8);
        transport.send(&payload)?;
        Ok(json!({ "preset": slot }))
    }

    fn cmd_upload_preset(&mut self, slot: u16, name: &str) -> Result<Value, EngineError> {
        let preset = self
            .store
            .find_by_name(name)
            .ok_or_else(|| EngineError::Preset(PresetError::NotFound(name.to_string())))?;
        preset.borrow_mut().id = slot;
        let bytes = encode_binary(&preset.borrow())?;

        let transport = self.transport.as_mut().ok_or(EngineError::Disconnected)?;
        info!("uploading preset '{name}' to slot {slot}");
        transport.send(&pad64(&UPLOAD_PRESET))?;

        let mut frame = Vec::with_capacity(FRAME_SIZE);
        frame.extend_from_slice(&UPLOAD_PREFIX);
        frame.extend_from_slice(&bytes[..UPLOAD_SPLITS[0]]);
        transport.send(&frame)?;

        frame.clear();
        frame.push(UPLOAD_FRAME_3);
        frame.extend_from_slice(&bytes[UPLOAD_SPLITS[0]..UPLOAD_SPLITS[1]]);
        transport.send(&frame)?;

        frame.clear();
        frame.push(UPLOAD_FRAME_4);
        frame.extend_from_slice(&bytes[UPLOAD_SPLITS[1]..]);
        transport.send(&frame)?;

        // The device answers the upload with a single event frame
        let mut ack = [0u8; FRAME_SIZE];
        match transport.recv(&mut ack) {
            Ok(n) => debug!(len = n, "upload acknowledged"),
            Err(EngineError::TimedOut) => warn!("no upload acknowledgement"),
            Err(e) => return Err(e),
        }
        Ok(json!({ "name": name, "preset": slot }))
    }

    fn cmd_interrupt(&mut self) -> Result<Value, EngineError> {
        let transport = self.transport.as_mut().ok_or(EngineError::Disconnected)?;
        info!("sending interrupt request");
        let mut frame = [0u8; FRAME_SIZE];
        match transport.recv(&mut frame) {
            Ok(_) | Err(EngineError::TimedOut) => Ok(Value::Null),
            Err(e) => Err(e),
        }
    }
}

/// Drain a framed response stream: resubmit IN transfers until one times
/// out, de-framing every fragment into the reassembly buffer.
fn drain_prefixed<T: Transport>(transport: &mut T, response: &mut Reassembly, prefix: &[u8; 6]) {
    let mut frame = [0u8; FRAME_SIZE];
    loop {
        match transport.recv(&mut frame) {
            Ok(0) => break,
            Ok(n) => {
                response.append_framed(&frame[..n], prefix);
            }
            Err(EngineError::TimedOut) => break,
            Err(e) => {
                warn!(error = %e, "transfer failed while draining response");
                break;
            }
        }
    }
    debug!(len = response.len(), "response drained");
}

/// Same as [`drain_prefixed`] for streams that carry only per-fragment
/// framing bytes (the extras catalogue).
fn drain_unprefixed<T: Transport>(transport: &mut T, response: &mut Reassembly) {
    let mut frame = [0u8; FRAME_SIZE];
    loop {
        match transport.recv(&mut frame) {
            Ok(0) => break,
            Ok(n) => response.append_unprefixed(&frame[..n]),
            Err(EngineError::TimedOut) => break,
            Err(e) => {
                warn!(error = %e, "transfer failed while draining response");
                break;
            }
        }
    }
    debug!(len = response.len(), "response drained");
}

fn ascii_field(buf: &[u8], offset: usize, len: usize) -> String {
    buf.get(offset..offset + len)
        .map(|field| {
            String::from_utf8_lossy(field)
                .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string()
        })
        .unwrap_or_default()
}

/// Parse the four fixed ASCII identity fields out of the handshake
/// response.
fn parse_device_info(buf: &[u8]) -> DeviceInfo {
    DeviceInfo {
        identity: ascii_field(buf, 0, 31),
        versions: [
            ascii_field(buf, 32, 6),
            ascii_field(buf, 39, 6),
            ascii_field(buf, 46, 6),
        ],
    }
}

/// Write one raw bank record to `<dir>/NNN-<name>.bhb`. Failures are
/// logged, not fatal: the download itself already succeeded.
fn save_bank_record(dir: &std::path::Path, slot: u16, record: &[u8]) {
    let name = ascii_field(record, 1, PRESET_NAME_SIZE);
    let path = dir.join(format!("{slot:03}-{name}.bhb"));
    if let Err(e) = std::fs::write(&path, record) {
        warn!(path = %path.display(), error = %e, "failed to save preset");
    } else {
        debug!(path = %path.display(), "saved preset");
    }
}

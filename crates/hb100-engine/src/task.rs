//! The task model: commands queued for the engine.
//!
//! Every piece of work — whether it came from the interactive CLI, the
//! HTTP/WebSocket API or a startup option — is expressed as a [`Task`]:
//! a [`TaskKind`] plus an optional completion callback that routes the
//! result back to whoever asked.

use std::fmt;

use serde_json::Value;
use tracing::{info, warn};

use hb100_catalog::BANK_SLOTS;

/// Reference to a stored preset: by bank slot or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetRef {
    /// Slot-indexed lookup.
    Slot(u16),
    /// Name-indexed lookup.
    Name(String),
}

/// What a task should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Re-arm the interactive prompt.
    Cli,
    /// Print the command overview.
    Help,
    /// Stop the event loop.
    Quit,
    /// Print and report the preset store contents.
    ListPresets,
    /// Greet the device and read its identity.
    Init,
    /// Download the full preset bank.
    GetPresets,
    /// Download the extras catalogue.
    GetExtras,
    /// Wake/clear the device with a lone IN transfer.
    Interrupt,
    /// Make the device switch to a bank slot.
    ChangePreset {
        /// Target slot, 1..=200.
        slot: u16,
    },
    /// Rename a bank slot. Recognised but not implemented.
    RenamePreset {
        /// Target slot, 1..=200.
        slot: u16,
        /// New name.
        name: String,
    },
    /// Upload a named preset to a bank slot.
    UploadPreset {
        /// Destination slot, 1..=200.
        slot: u16,
        /// Name of the stored preset to send.
        name: String,
    },
    /// Import a preset file into the store.
    ImportPreset {
        /// True for PHB, false for binary.
        phb: bool,
        /// File to read.
        path: String,
    },
    /// Print a stored preset through the catalogue.
    ParsePreset {
        /// Which preset to show.
        target: PresetRef,
    },
    /// Export a stored preset to a file.
    ExportPreset {
        /// Which preset to write.
        target: PresetRef,
        /// True for PHB, false for binary.
        phb: bool,
        /// Destination path; derived from the preset name when absent.
        path: Option<String>,
    },
}

impl TaskKind {
    /// Short label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Cli => "cli",
            TaskKind::Help => "help",
            TaskKind::Quit => "quit",
            TaskKind::ListPresets => "list-presets",
            TaskKind::Init => "init",
            TaskKind::GetPresets => "get-presets",
            TaskKind::GetExtras => "get-extras",
            TaskKind::Interrupt => "interrupt",
            TaskKind::ChangePreset { .. } => "change-preset",
            TaskKind::RenamePreset { .. } => "rename-preset",
            TaskKind::UploadPreset { .. } => "upload-preset",
            TaskKind::ImportPreset { .. } => "import-preset",
            TaskKind::ParsePreset { .. } => "parse-preset",
            TaskKind::ExportPreset { .. } => "export-preset",
        }
    }

    /// Whether this command needs an open device.
    pub fn needs_device(&self) -> bool {
        matches!(
            self,
            TaskKind::Init
                | TaskKind::GetPresets
                | TaskKind::GetExtras
                | TaskKind::Interrupt
                | TaskKind::ChangePreset { .. }
                | TaskKind::RenamePreset { .. }
                | TaskKind::UploadPreset { .. }
        )
    }
}

/// Callback invoked once when a task terminates, with the completion code
/// and a result document.
pub type Completion = Box<dyn FnOnce(u16, Value) + Send>;

/// A queued command with its optional completion route.
pub struct Task {
    /// What to do.
    pub kind: TaskKind,
    completion: Option<Completion>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("kind", &self.kind)
            .field("completion", &self.completion.is_some())
            .finish()
    }
}

impl Task {
    /// Wrap a kind with no completion route (results are only logged).
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            completion: None,
        }
    }

    /// Build a task from an argv-style command line.
    ///
    /// The verb and the `binary`/`phb` format words match
    /// case-insensitively. Returns `None` for unknown verbs, bad arity or
    /// out-of-range slots; the caller decides how to report that.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let argv: Vec<&str> = argv.iter().map(|s| s.as_ref().trim()).collect();
        let verb = argv.first()?.to_ascii_lowercase();
        if verb.is_empty() {
            return None;
        }
        let kind = match verb.as_str() {
            "cli" if argv.len() == 1 => TaskKind::Cli,
            "help" if argv.len() == 1 => TaskKind::Help,
            "quit" if argv.len() == 1 => TaskKind::Quit,
            "list-presets" if argv.len() == 1 => TaskKind::ListPresets,
            "init" if argv.len() == 1 => TaskKind::Init,
            "get-presets" if argv.len() == 1 => TaskKind::GetPresets,
            "get-extras" if argv.len() == 1 => TaskKind::GetExtras,
            "interrupt" if argv.len() == 1 => TaskKind::Interrupt,
            "change-preset" if argv.len() == 2 => TaskKind::ChangePreset {
                slot: parse_bank_slot(argv[1])?,
            },
            "rename-preset" if argv.len() >= 3 => TaskKind::RenamePreset {
                slot: parse_bank_slot(argv[1])?,
                name: argv[2..].join(" "),
            },
            "upload-preset" if argv.len() >= 3 => TaskKind::UploadPreset {
                slot: parse_bank_slot(argv[1])?,
                name: argv[2..].join(" "),
            },
            "import-preset" if argv.len() == 3 => TaskKind::ImportPreset {
                phb: parse_format(argv[1])?,
                path: argv[2].to_string(),
            },
            "parse-preset" if argv.len() >= 2 => TaskKind::ParsePreset {
                target: parse_preset_ref(&argv[1..]),
            },
            "export-preset" if (3..=4).contains(&argv.len()) => TaskKind::ExportPreset {
                target: parse_preset_ref(&argv[1..2]),
                phb: parse_format(argv[2])?,
                path: argv.get(3).map(|s| s.to_string()),
            },
            _ => {
                warn!(command = %verb, "unsupported command");
                return None;
            }
        };
        info!(task = kind.label(), "queued task parsed");
        Some(Self::new(kind))
    }

    /// Record the completion callback for this task. At most one; a second
    /// call replaces the first.
    pub fn attach_completion(&mut self, completion: Completion) {
        self.completion = Some(completion);
    }

    /// Split into kind and completion for dispatch.
    pub fn into_parts(self) -> (TaskKind, Option<Completion>) {
        (self.kind, self.completion)
    }
}

/// Parse a bank slot argument, accepting only 1..=200.
fn parse_bank_slot(arg: &str) -> Option<u16> {
    let slot: u16 = arg.parse().ok()?;
    if (1..=BANK_SLOTS as u16).contains(&slot) {
        Some(slot)
    } else {
        warn!(slot, "preset slot out of range");
        None
    }
}

/// Slot-or-name argument: a positive integer of at most three digits is a
/// slot, anything else is a name.
fn parse_preset_ref(args: &[&str]) -> PresetRef {
    if args.len() == 1
        && args[0].len() <= 3
        && let Ok(slot) = args[0].parse::<u16>()
        && slot > 0
    {
        return PresetRef::Slot(slot);
    }
    PresetRef::Name(args.join(" "))
}

/// `binary` or `phb`, case-insensitively.
fn parse_format(arg: &str) -> Option<bool> {
    match arg.to_ascii_lowercase().as_str() {
        "phb" => Some(true),
        "binary" => Some(false),
        _ => {
            warn!(format = %arg, "unknown preset format");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(argv: &[&str]) -> Option<TaskKind> {
        Task::from_argv(argv).map(|t| t.kind)
    }

    #[test]
    fn plain_commands_parse() {
        assert_eq!(kind(&["init"]), Some(TaskKind::Init));
        assert_eq!(kind(&["get-presets"]), Some(TaskKind::GetPresets));
        assert_eq!(kind(&["quit"]), Some(TaskKind::Quit));
        assert_eq!(kind(&["list-presets"]), Some(TaskKind::ListPresets));
    }

    #[test]
    fn verbs_match_case_insensitively() {
        assert_eq!(kind(&["INIT"]), Some(TaskKind::Init));
        assert_eq!(kind(&["Get-Extras"]), Some(TaskKind::GetExtras));
        assert_eq!(
            kind(&["import-preset", "PHB", "a.phb"]),
            Some(TaskKind::ImportPreset { phb: true, path: "a.phb".into() })
        );
        assert_eq!(
            kind(&["import-preset", "Binary", "a.bhb"]),
            Some(TaskKind::ImportPreset { phb: false, path: "a.bhb".into() })
        );
    }

    #[test]
    fn slot_ranges_are_enforced() {
        assert!(kind(&["change-preset", "0"]).is_none());
        assert!(kind(&["change-preset", "201"]).is_none());
        assert!(kind(&["change-preset", "abc"]).is_none());
        assert_eq!(kind(&["change-preset", "42"]), Some(TaskKind::ChangePreset { slot: 42 }));
    }

    #[test]
    fn arity_is_enforced() {
        assert!(kind(&["upload-preset"]).is_none());
        assert!(kind(&["upload-preset", "3"]).is_none());
        assert!(kind(&["change-preset"]).is_none());
        assert!(kind(&["import-preset", "phb"]).is_none());
        assert!(kind(&["bogus-command"]).is_none());
        assert!(kind(&[""]).is_none());
    }

    #[test]
    fn slot_or_name_heuristic() {
        assert_eq!(
            kind(&["parse-preset", "42"]),
            Some(TaskKind::ParsePreset { target: PresetRef::Slot(42) })
        );
        assert_eq!(
            kind(&["parse-preset", "clean"]),
            Some(TaskKind::ParsePreset { target: PresetRef::Name("clean".into()) })
        );
        // Four digits can only be a name
        assert_eq!(
            kind(&["parse-preset", "1234"]),
            Some(TaskKind::ParsePreset { target: PresetRef::Name("1234".into()) })
        );
        assert_eq!(
            kind(&["export-preset", "7", "phb", "out.phb"]),
            Some(TaskKind::ExportPreset {
                target: PresetRef::Slot(7),
                phb: true,
                path: Some("out.phb".into()),
            })
        );
        assert_eq!(
            kind(&["export-preset", "Warm", "binary"]),
            Some(TaskKind::ExportPreset {
                target: PresetRef::Name("Warm".into()),
                phb: false,
                path: None,
            })
        );
    }

    #[test]
    fn multi_word_names_are_joined() {
        assert_eq!(
            kind(&["upload-preset", "3", "Warm", "Lead"]),
            Some(TaskKind::UploadPreset { slot: 3, name: "Warm Lead".into() })
        );
    }

    #[test]
    fn completion_runs_once_with_the_document() {
        use std::sync::atomic::{AtomicU16, Ordering};
        use std::sync::Arc;

        let seen = Arc::new(AtomicU16::new(0));
        let mut task = Task::from_argv(&["help"]).unwrap();
        let seen2 = seen.clone();
        task.attach_completion(Box::new(move |code, _doc| {
            seen2.store(code, Ordering::SeqCst);
        }));
        let (_, completion) = task.into_parts();
        completion.unwrap()(200, Value::Null);
        assert_eq!(seen.load(Ordering::SeqCst), 200);
    }
}

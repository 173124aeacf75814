//! Static effect catalogue for the HB100 guitar multi-effects unit.
//!
//! The HB100 organises every preset as a fixed chain of nine effect
//! *sections* (compressor, drive, amp, cabinet, gate, EQ, modulation, delay,
//! reverb). Each section holds exactly one selectable *effect* with up to six
//! named integer parameters, plus an on/off switch. This crate is the single
//! source of truth for that layout: section order, per-section wire strides,
//! the effect tables, and the expression-pedal parameter names.
//!
//! The tables are compile-time constants; the preset codec relies on lookup
//! being total for every selector it accepts, so an out-of-range selector is
//! reported as `None` rather than clamped.
//!
//! # Example
//!
//! ```rust
//! use hb100_catalog::{SECTIONS, section};
//!
//! // Walk the chain in wire order
//! for s in SECTIONS {
//!     println!("{}: {} effects", s.name, s.effects.len());
//! }
//!
//! // Resolve an effect selector read off the wire
//! let amp = section(2).unwrap();
//! let clean = amp.effect(0).unwrap();
//! assert_eq!(clean.name, "Clean 1");
//! ```

/// Size of a preset in its binary wire form, in bytes.
pub const PRESET_SIZE: usize = 184;

/// Maximum length of a preset name on the wire, in bytes.
pub const PRESET_NAME_SIZE: usize = 14;

/// Number of effect sections in a preset.
pub const SECTION_COUNT: usize = 9;

/// Number of expression-pedal parameters in a preset.
pub const EXPRESSION_COUNT: usize = 6;

/// Number of preset slots in the device bank (slots are numbered 1..=200).
pub const BANK_SLOTS: usize = 200;

/// Upper bound on parameter slots reserved per section in the wire layout.
pub const MAX_PARAMS: usize = 6;

/// Byte offset of the first section block inside a binary preset.
pub const SECTIONS_OFFSET: usize = 1 + PRESET_NAME_SIZE;

/// Byte offset of the expression-pedal values inside a binary preset.
pub const EXPRESSIONS_OFFSET: usize = PRESET_SIZE - 2 * EXPRESSION_COUNT;

/// One selectable effect within a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectModel {
    /// Wire selector for this effect (its index in the section table).
    pub id: u16,
    /// Display name, as the vendor editor shows it.
    pub name: &'static str,
    /// Display names of the active parameters, one per value slot used.
    pub params: &'static [&'static str],
}

impl EffectModel {
    /// Number of semantically meaningful parameter values for this effect.
    pub const fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// One of the nine fixed effect sections of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    /// Section name, also the key used in the PHB JSON format.
    pub name: &'static str,
    /// On-wire size of this section's block, in bytes. Covers the 2-byte
    /// switch, the 2-byte selector, `max_params` 2-byte values, and any
    /// reserved tail bytes the device pads the block with.
    pub stride: usize,
    /// Parameter value slots reserved in the wire layout.
    pub max_params: usize,
    /// Effects selectable in this section, indexed by wire selector.
    pub effects: &'static [EffectModel],
}

impl Section {
    /// Look up an effect by its wire selector.
    ///
    /// Returns `None` for selectors outside the table; callers treat that as
    /// a malformed preset, never as a default.
    pub fn effect(&self, selector: u16) -> Option<&'static EffectModel> {
        self.effects.get(selector as usize)
    }
}

macro_rules! effect {
    ($id:expr, $name:expr, [$($param:expr),*]) => {
        EffectModel { id: $id, name: $name, params: &[$($param),*] }
    };
}

/// The nine sections in wire order. Positions are the `type` values stored
/// in every preset effect.
pub static SECTIONS: &[Section; SECTION_COUNT] = &[
    Section {
        name: "FXCOMP",
        stride: 16,
        max_params: MAX_PARAMS,
        effects: &[
            effect!(0, "Comp", ["SUSTAIN", "ATTACK", "TONE", "LEVEL"]),
            effect!(1, "Touch Wah", ["SENS", "RANGE", "LEVEL"]),
            effect!(2, "Auto Wah", ["SPEED", "RANGE", "LEVEL"]),
            effect!(3, "Pitch", ["SHIFT", "MIX", "LEVEL"]),
            effect!(4, "Octaver", ["SUB", "DRY", "LEVEL"]),
        ],
    },
    Section {
        name: "DSOD",
        stride: 16,
        max_params: MAX_PARAMS,
        effects: &[
            effect!(0, "Overdrive", ["DRIVE", "TONE", "LEVEL"]),
            effect!(1, "Distortion", ["GAIN", "TONE", "LEVEL"]),
            effect!(2, "Metal Zone", ["GAIN", "LOW", "HIGH", "LEVEL"]),
            effect!(3, "Fuzz", ["FUZZ", "TONE", "LEVEL"]),
            effect!(4, "Boost", ["GAIN", "LEVEL"]),
        ],
    },
    Section {
        name: "AMP",
        stride: 21,
        max_params: MAX_PARAMS,
        effects: &[
            effect!(0, "Clean 1", ["GAIN", "BASS", "MID", "TREBLE", "PRES", "MST"]),
            effect!(1, "Clean 2", ["GAIN", "BASS", "MID", "TREBLE", "PRES", "MST"]),
            effect!(2, "Crunch 1", ["GAIN", "BASS", "MID", "TREBLE", "PRES", "MST"]),
            effect!(3, "Crunch 2", ["GAIN", "BASS", "MID", "TREBLE", "PRES", "MST"]),
            effect!(4, "Lead 1", ["GAIN", "BASS", "MID", "TREBLE", "PRES", "MST"]),
            effect!(5, "Lead 2", ["GAIN", "BASS", "MID", "TREBLE", "PRES", "MST"]),
            effect!(6, "Metal 1", ["GAIN", "BASS", "MID", "TREBLE", "PRES", "MST"]),
            effect!(7, "Metal 2", ["GAIN", "BASS", "MID", "TREBLE", "PRES", "MST"]),
        ],
    },
    Section {
        name: "CAB",
        stride: 16,
        max_params: MAX_PARAMS,
        effects: &[
            effect!(0, "1x8\"", ["LEVEL", "LOWCUT"]),
            effect!(1, "1x12\"", ["LEVEL", "LOWCUT"]),
            effect!(2, "2x12\"", ["LEVEL", "LOWCUT"]),
            effect!(3, "4x10\"", ["LEVEL", "LOWCUT"]),
            effect!(4, "4x12\"", ["LEVEL", "LOWCUT"]),
            effect!(5, "UK 4x12\"", ["LEVEL", "LOWCUT"]),
            effect!(6, "US 4x12\"", ["LEVEL", "LOWCUT"]),
        ],
    },
    Section {
        name: "NSGATE",
        stride: 16,
        max_params: MAX_PARAMS,
        effects: &[
            effect!(0, "Noise Gate", ["THRESHOLD", "DECAY"]),
            effect!(1, "Noise Killer", ["THRESHOLD", "DECAY", "ATTACK"]),
        ],
    },
    Section {
        name: "EQ",
        stride: 20,
        max_params: MAX_PARAMS,
        effects: &[
            effect!(0, "6-Band EQ", ["100", "200", "400", "800", "1.6K", "3.2K"]),
            effect!(1, "Para EQ", ["FREQ", "Q", "GAIN", "LEVEL"]),
        ],
    },
    Section {
        name: "MOD",
        stride: 16,
        max_params: MAX_PARAMS,
        effects: &[
            effect!(0, "Chorus", ["RATE", "DEPTH", "LEVEL"]),
            effect!(1, "Flanger", ["RATE", "DEPTH", "FEEDBACK", "LEVEL"]),
            effect!(2, "Phaser", ["RATE", "DEPTH", "LEVEL"]),
            effect!(3, "Tremolo", ["RATE", "DEPTH"]),
            effect!(4, "Vibrato", ["RATE", "DEPTH"]),
            effect!(5, "Rotary", ["RATE", "DEPTH", "LEVEL"]),
        ],
    },
    Section {
        name: "DELAY",
        stride: 20,
        max_params: MAX_PARAMS,
        effects: &[
            effect!(0, "Digital Delay", ["TIME", "FEEDBACK", "LEVEL"]),
            effect!(1, "Analog Delay", ["TIME", "FEEDBACK", "LEVEL"]),
            effect!(2, "Tape Echo", ["TIME", "FEEDBACK", "FLUTTER", "LEVEL"]),
            effect!(3, "Ping Pong", ["TIME", "FEEDBACK", "LEVEL"]),
            effect!(4, "Reverse", ["TIME", "FEEDBACK", "LEVEL"]),
        ],
    },
    Section {
        name: "REVERB",
        stride: 16,
        max_params: MAX_PARAMS,
        effects: &[
            effect!(0, "Room", ["DECAY", "TONE", "LEVEL"]),
            effect!(1, "Hall", ["DECAY", "TONE", "LEVEL"]),
            effect!(2, "Plate", ["DECAY", "TONE", "LEVEL"]),
            effect!(3, "Spring", ["DECAY", "TONE", "LEVEL"]),
            effect!(4, "Church", ["DECAY", "TONE", "LEVEL"]),
        ],
    },
];

/// Display names of the six expression-pedal parameters, in wire order.
/// These are also the keys of the `Exp` object in the PHB JSON format.
pub static EXPRESSION_PARAMS: &[&str; EXPRESSION_COUNT] =
    &["TYPE", "SWITCH", "MIN", "MAX", "PARAM", "LEVEL"];

/// Look up a section by its position in the chain (0..=8).
pub fn section(index: usize) -> Option<&'static Section> {
    SECTIONS.get(index)
}

/// Look up an effect descriptor by `(section index, wire selector)`.
pub fn effect(section_index: usize, selector: u16) -> Option<&'static EffectModel> {
    section(section_index)?.effect(selector)
}

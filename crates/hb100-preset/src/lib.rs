//! Preset model, codecs and store for the HB100 guitar multi-effects unit.
//!
//! A preset is a named snapshot of the device's nine effect blocks and six
//! expression-pedal parameters, addressable by a bank slot in 1..=200. This
//! crate provides:
//!
//! - **The in-memory model**: [`Preset`] and [`PresetEffect`]
//! - **The binary codec**: [`decode_binary`] / [`encode_binary`] for the
//!   fixed 184-byte wire form
//! - **The PHB codec**: [`decode_phb`] / [`encode_phb`] for the vendor
//!   editor's JSON file format
//! - **The store**: [`PresetStore`], a registry indexed both by bank slot
//!   and by preset name
//!
//! All decoding is validated against the static tables in [`hb100_catalog`];
//! an effect selector the catalogue does not know is a hard parse failure.

mod codec;
mod error;
mod phb;
mod preset;
mod store;

pub use codec::{
    decode_binary, encode_binary, encode_binary_into, export_preset, load_preset_file,
};
pub use error::PresetError;
pub use phb::{decode_phb, encode_phb, to_phb_value};
pub use preset::{Preset, PresetEffect, SharedPreset};
pub use store::PresetStore;

/// Convenience result type for preset operations.
pub type Result<T> = std::result::Result<T, PresetError>;

//! Binary wire codec for presets.
//!
//! The device stores every preset as a fixed 184-byte record: one slot byte,
//! a 14-byte right-padded name, nine section blocks in catalogue order, and
//! six little-endian expression values. Section blocks are `stride` bytes
//! each: a 2-byte switch, a 2-byte effect selector, six 2-byte parameter
//! values, and reserved tail bytes on the wider blocks.

use std::path::Path;

use tracing::{debug, warn};

use hb100_catalog::{
    EXPRESSIONS_OFFSET, PRESET_NAME_SIZE, PRESET_SIZE, SECTIONS, SECTIONS_OFFSET,
};

use crate::error::PresetError;
use crate::phb::{decode_phb, encode_phb};
use crate::preset::Preset;
use crate::Result;

/// Upper bound accepted for a PHB file on import.
const PHB_FILE_MAX: usize = 4096;

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Decode a preset from its 184-byte wire form.
///
/// The slot byte becomes the preset id, the name is trimmed of padding and
/// surrounding whitespace, and every effect selector is resolved through the
/// catalogue; a selector the catalogue does not know fails the whole decode.
pub fn decode_binary(buf: &[u8]) -> Result<Preset> {
    if buf.len() != PRESET_SIZE {
        return Err(PresetError::InvalidArgument("preset buffer must be 184 bytes"));
    }
    let mut preset = Preset::new("");
    preset.id = u16::from(buf[0]);
    let name = &buf[1..=PRESET_NAME_SIZE];
    let end = name.iter().position(|&b| b == 0).unwrap_or(PRESET_NAME_SIZE);
    preset.set_name(&String::from_utf8_lossy(&name[..end]));
    debug!(id = preset.id, name = %preset.name, "parsing preset");

    let mut offset = SECTIONS_OFFSET;
    for (i, section) in SECTIONS.iter().enumerate() {
        let block = &buf[offset..offset + section.stride];
        let selector = read_u16(block, 2);
        let effect = section
            .effect(selector)
            .ok_or(PresetError::UnknownEffect { section: section.name, selector })?;
        let e = &mut preset.effects[i];
        e.section = i;
        e.active = read_u16(block, 0) != 0;
        e.id = selector;
        for j in 0..effect.param_count() {
            e.values[j] = read_u16(block, 4 + 2 * j);
        }
        offset += section.stride;
    }
    for (j, value) in preset.expressions.iter_mut().enumerate() {
        *value = read_u16(buf, EXPRESSIONS_OFFSET + 2 * j);
    }
    Ok(preset)
}

/// Encode a preset into a caller-provided buffer, which must be exactly
/// 184 bytes. Parameter slots beyond the selected effect's declared count
/// are left zero, as are the reserved tail bytes of the wider blocks.
pub fn encode_binary_into(preset: &Preset, buf: &mut [u8]) -> Result<()> {
    if buf.len() != PRESET_SIZE {
        return Err(PresetError::InvalidArgument("output buffer must be 184 bytes"));
    }
    buf.fill(0);
    buf[0] = preset.id as u8;
    let name = preset.name.as_bytes();
    let len = name.len().min(PRESET_NAME_SIZE);
    buf[1..1 + len].copy_from_slice(&name[..len]);

    let mut offset = SECTIONS_OFFSET;
    for (section, e) in SECTIONS.iter().zip(&preset.effects) {
        let effect = section
            .effect(e.id)
            .ok_or(PresetError::UnknownEffect { section: section.name, selector: e.id })?;
        let block = &mut buf[offset..offset + section.stride];
        write_u16(block, 0, u16::from(e.active));
        write_u16(block, 2, e.id);
        for j in 0..effect.param_count() {
            write_u16(block, 4 + 2 * j, e.values[j]);
        }
        offset += section.stride;
    }
    for (j, value) in preset.expressions.iter().enumerate() {
        write_u16(buf, EXPRESSIONS_OFFSET + 2 * j, *value);
    }
    Ok(())
}

/// Encode a preset to a fresh 184-byte buffer.
pub fn encode_binary(preset: &Preset) -> Result<[u8; PRESET_SIZE]> {
    let mut buf = [0u8; PRESET_SIZE];
    encode_binary_into(preset, &mut buf)?;
    Ok(buf)
}

/// Read a binary preset file. Files longer than one record are truncated
/// with a warning, shorter ones are rejected.
pub(crate) fn read_binary_file(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = std::fs::read(path).map_err(|e| PresetError::read_file(path, e))?;
    if bytes.len() < PRESET_SIZE {
        return Err(PresetError::MalformedPreset(format!(
            "'{}' is {} bytes, expected {}",
            path.display(),
            bytes.len(),
            PRESET_SIZE
        )));
    }
    if bytes.len() > PRESET_SIZE {
        warn!(
            path = %path.display(),
            len = bytes.len(),
            "binary preset file longer than one record, truncating"
        );
        bytes.truncate(PRESET_SIZE);
    }
    Ok(bytes)
}

/// Read a PHB file as text, capped at 4 KiB.
pub(crate) fn read_phb_file(path: &Path) -> Result<String> {
    let mut bytes = std::fs::read(path).map_err(|e| PresetError::read_file(path, e))?;
    if bytes.len() > PHB_FILE_MAX {
        warn!(
            path = %path.display(),
            len = bytes.len(),
            "PHB file larger than {PHB_FILE_MAX} bytes, truncating"
        );
        bytes.truncate(PHB_FILE_MAX);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Load and decode a preset file, binary or PHB.
pub fn load_preset_file(path: impl AsRef<Path>, phb: bool) -> Result<Preset> {
    let path = path.as_ref();
    if phb {
        decode_phb(&read_phb_file(path)?)
    } else {
        decode_binary(&read_binary_file(path)?)
    }
}

/// Export a preset to a file: the raw 184-byte record, or the PHB JSON text
/// followed by a terminating newline.
pub fn export_preset(preset: &Preset, path: impl AsRef<Path>, phb: bool) -> Result<()> {
    let path = path.as_ref();
    if phb {
        let mut text = encode_phb(preset)?;
        text.push('\n');
        std::fs::write(path, text).map_err(|e| PresetError::write_file(path, e))?;
    } else {
        let buf = encode_binary(preset)?;
        std::fs::write(path, buf).map_err(|e| PresetError::write_file(path, e))?;
    }
    debug!(name = %preset.name, path = %path.display(), phb, "exported preset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb100_catalog::MAX_PARAMS;

    fn sample_preset() -> Preset {
        let mut p = Preset::new("Crunchy");
        p.id = 7;
        for (i, e) in p.effects.iter_mut().enumerate() {
            e.active = i % 2 == 0;
            e.id = 1;
            let params = SECTIONS[i].effect(1).unwrap().param_count();
            for j in 0..params {
                e.values[j] = (100 * i + j) as u16;
            }
        }
        for (j, v) in p.expressions.iter_mut().enumerate() {
            *v = j as u16 * 11;
        }
        p
    }

    #[test]
    fn roundtrip_preserves_preset() {
        let p = sample_preset();
        let buf = encode_binary(&p).unwrap();
        let q = decode_binary(&buf).unwrap();
        assert_eq!(p, q);
    }

    #[test]
    fn layout_offsets() {
        let p = sample_preset();
        let buf = encode_binary(&p).unwrap();
        assert_eq!(buf[0], 7);
        assert_eq!(&buf[1..8], b"Crunchy");
        assert_eq!(buf[8], 0);
        // FXCOMP block: switch on, selector 1
        assert_eq!(&buf[15..19], &[1, 0, 1, 0]);
        // expressions start at 172
        assert_eq!(u16::from_le_bytes([buf[172], buf[173]]), 0);
        assert_eq!(u16::from_le_bytes([buf[174], buf[175]]), 11);
    }

    #[test]
    fn wrong_buffer_sizes_are_rejected() {
        assert!(matches!(
            decode_binary(&[0u8; 100]),
            Err(PresetError::InvalidArgument(_))
        ));
        let p = sample_preset();
        let mut short = [0u8; 100];
        assert!(matches!(
            encode_binary_into(&p, &mut short),
            Err(PresetError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_selector_fails_decode() {
        let p = sample_preset();
        let mut buf = encode_binary(&p).unwrap();
        // Overwrite the FXCOMP selector with one past the table end
        buf[17] = 200;
        assert!(matches!(
            decode_binary(&buf),
            Err(PresetError::UnknownEffect { section: "FXCOMP", .. })
        ));
    }

    #[test]
    fn unknown_selector_fails_encode() {
        let mut p = sample_preset();
        p.effects[8].id = 77;
        assert!(matches!(
            encode_binary(&p),
            Err(PresetError::UnknownEffect { section: "REVERB", .. })
        ));
    }

    #[test]
    fn name_is_trimmed_on_decode() {
        let mut p = sample_preset();
        p.name = "  Lead Tone ".to_string();
        let buf = encode_binary(&p).unwrap();
        let q = decode_binary(&buf).unwrap();
        assert_eq!(q.name, "Lead Tone");
    }

    #[test]
    fn long_names_are_truncated_to_wire_size() {
        let mut p = sample_preset();
        p.name = "A very long preset name".to_string();
        let buf = encode_binary(&p).unwrap();
        let q = decode_binary(&buf).unwrap();
        assert_eq!(q.name.len(), PRESET_NAME_SIZE);
    }

    #[test]
    fn values_beyond_declared_params_encode_as_zero() {
        let mut p = sample_preset();
        // NSGATE "Noise Killer" declares 3 params; poke the 6th slot
        p.effects[4].values[MAX_PARAMS - 1] = 0xbeef;
        let buf = encode_binary(&p).unwrap();
        let q = decode_binary(&buf).unwrap();
        assert_eq!(q.effects[4].values[MAX_PARAMS - 1], 0);
    }
}

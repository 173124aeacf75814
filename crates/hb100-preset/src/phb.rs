//! PHB codec: the vendor editor's JSON preset file format.
//!
//! A PHB document has three mandatory members: `fileInfo` (metadata, of
//! which only `preset_name` matters), `effectModule` (one object per section
//! name with `TYPE`/`SWITCH`/`Data`) and `Exp` (expression-pedal values).
//! The slot id is not part of the format; decoded presets come back with
//! `id = 0` and get a slot assigned when they are uploaded.

use serde::Serialize;
use serde_json::{json, Map, Value};

use hb100_catalog::{EXPRESSION_PARAMS, SECTIONS};

use crate::error::PresetError;
use crate::preset::Preset;
use crate::Result;

/// Decorative `fileInfo` constants, mirrored from the vendor editor.
const APP: &str = "HB100 Edit";
const APP_VERSION: &str = "V1.0.0";
const DEVICE: &str = "HB100";
const DEVICE_VERSION: &str = "V1.0.0";
const SCHEMA: &str = "HB100 Preset";

fn as_u16(value: &Value) -> Option<u16> {
    value.as_u64().and_then(|v| u16::try_from(v).ok())
}

/// Decode a preset from PHB text.
pub fn decode_phb(text: &str) -> Result<Preset> {
    let json: Value = serde_json::from_str(text)?;
    let Some(root) = json.as_object() else {
        return Err(PresetError::MalformedPreset("not a JSON object".into()));
    };
    let (Some(exp), Some(modules), Some(info)) = (
        root.get("Exp").and_then(Value::as_object),
        root.get("effectModule").and_then(Value::as_object),
        root.get("fileInfo").and_then(Value::as_object),
    ) else {
        return Err(PresetError::MalformedPreset(
            "missing mandatory object (Exp, effectModule and/or fileInfo)".into(),
        ));
    };

    let Some(name) = info.get("preset_name").and_then(Value::as_str) else {
        return Err(PresetError::MalformedPreset("missing preset name".into()));
    };
    let mut preset = Preset::new(name);

    for (i, section) in SECTIONS.iter().enumerate() {
        let Some(module) = modules.get(section.name).and_then(Value::as_object) else {
            return Err(PresetError::MalformedPreset(format!(
                "missing mandatory effect section ({})",
                section.name
            )));
        };
        let (Some(selector), Some(switch), Some(data)) = (
            module.get("TYPE").and_then(as_u16),
            module.get("SWITCH").and_then(Value::as_i64),
            module.get("Data").and_then(Value::as_object),
        ) else {
            return Err(PresetError::MalformedPreset(format!(
                "missing mandatory effect property in '{}' (Data, SWITCH and/or TYPE)",
                section.name
            )));
        };
        let effect = section
            .effect(selector)
            .ok_or(PresetError::UnknownEffect { section: section.name, selector })?;
        let block = &mut preset.effects[i];
        block.section = i;
        block.id = selector;
        block.active = switch != 0;
        for (j, param) in effect.params.iter().enumerate() {
            let Some(value) = data.get(*param).and_then(as_u16) else {
                return Err(PresetError::MalformedPreset(format!(
                    "missing mandatory effect property ({param})"
                )));
            };
            block.values[j] = value;
        }
    }

    for (j, param) in EXPRESSION_PARAMS.iter().enumerate() {
        let Some(value) = exp.get(*param).and_then(as_u16) else {
            return Err(PresetError::MalformedPreset(format!(
                "missing mandatory expression property ({param})"
            )));
        };
        preset.expressions[j] = value;
    }

    Ok(preset)
}

/// Build the PHB JSON document for a preset.
///
/// Only the parameters the selected effect declares appear in each `Data`
/// object. The slot id is deliberately absent from the format.
pub fn to_phb_value(preset: &Preset) -> Result<Value> {
    let mut modules = Map::new();
    for (section, block) in SECTIONS.iter().zip(&preset.effects) {
        let effect = section
            .effect(block.id)
            .ok_or(PresetError::UnknownEffect { section: section.name, selector: block.id })?;
        let mut data = Map::new();
        for (param, value) in effect.params.iter().zip(&block.values) {
            data.insert((*param).to_string(), json!(value));
        }
        modules.insert(
            section.name.to_string(),
            json!({
                "TYPE": block.id,
                "SWITCH": u8::from(block.active),
                "Data": data,
            }),
        );
    }

    let mut exp = Map::new();
    for (param, value) in EXPRESSION_PARAMS.iter().zip(&preset.expressions) {
        exp.insert((*param).to_string(), json!(value));
    }

    Ok(json!({
        "fileInfo": {
            "app": APP,
            "app_version": APP_VERSION,
            "device": DEVICE,
            "device_version": DEVICE_VERSION,
            "preset_name": preset.name,
            "schema": SCHEMA,
        },
        "effectModule": modules,
        "Exp": exp,
    }))
}

/// Encode a preset to PHB text: pretty-printed with a 4-space indent and
/// keys sorted within every object.
pub fn encode_phb(preset: &Preset) -> Result<String> {
    let value = to_phb_value(preset)?;
    let mut out = Vec::with_capacity(4096);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_preset() -> Preset {
        let mut p = Preset::new("Warm Lead");
        p.id = 42;
        for (i, e) in p.effects.iter_mut().enumerate() {
            e.active = i != 3;
            e.id = (i % 2) as u16;
            let params = SECTIONS[i].effect(e.id).unwrap().param_count();
            for j in 0..params {
                e.values[j] = (10 * i + j) as u16;
            }
        }
        p.expressions = [1, 0, 0, 90, 2, 77];
        p
    }

    #[test]
    fn roundtrip_resets_id() {
        let p = sample_preset();
        let text = encode_phb(&p).unwrap();
        let q = decode_phb(&text).unwrap();
        assert_eq!(q.id, 0);
        let mut expected = p;
        expected.id = 0;
        assert_eq!(q, expected);
    }

    #[test]
    fn encode_is_pretty_sorted_and_decorated() {
        let text = encode_phb(&sample_preset()).unwrap();
        // Keys sorted within each object: Exp < effectModule < fileInfo
        let exp_pos = text.find("\"Exp\"").unwrap();
        let em_pos = text.find("\"effectModule\"").unwrap();
        let fi_pos = text.find("\"fileInfo\"").unwrap();
        assert!(exp_pos < em_pos && em_pos < fi_pos);
        assert!(text.contains("    \"Exp\""));
        assert!(text.contains("\"app\": \"HB100 Edit\""));
        assert!(text.contains("\"schema\": \"HB100 Preset\""));
        assert!(text.contains("\"preset_name\": \"Warm Lead\""));
    }

    #[test]
    fn data_holds_only_declared_params() {
        let text = encode_phb(&sample_preset()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        let gate = &value["effectModule"]["NSGATE"];
        let data = gate["Data"].as_object().unwrap();
        let effect = SECTIONS[4].effect(gate["TYPE"].as_u64().unwrap() as u16).unwrap();
        assert_eq!(data.len(), effect.param_count());
    }

    #[test]
    fn invalid_json_is_distinguished_from_malformed() {
        assert!(matches!(decode_phb("{ not json"), Err(PresetError::JsonInvalid(_))));
        assert!(matches!(
            decode_phb("[1, 2, 3]"),
            Err(PresetError::MalformedPreset(_))
        ));
    }

    #[test]
    fn missing_mandatory_objects() {
        let err = decode_phb("{\"fileInfo\": {}}").unwrap_err();
        assert!(err.to_string().contains("Exp, effectModule and/or fileInfo"));
    }

    #[test]
    fn missing_section_is_reported() {
        let p = sample_preset();
        let mut value = to_phb_value(&p).unwrap();
        value["effectModule"].as_object_mut().unwrap().remove("DELAY");
        let err = decode_phb(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("DELAY"));
    }

    #[test]
    fn missing_param_is_reported() {
        let p = sample_preset();
        let mut value = to_phb_value(&p).unwrap();
        value["effectModule"]["AMP"]["Data"]
            .as_object_mut()
            .unwrap()
            .remove("GAIN");
        let err = decode_phb(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("GAIN"));
    }

    #[test]
    fn non_integer_param_is_rejected() {
        let p = sample_preset();
        let mut value = to_phb_value(&p).unwrap();
        value["effectModule"]["AMP"]["Data"]["GAIN"] = json!("loud");
        assert!(matches!(
            decode_phb(&value.to_string()),
            Err(PresetError::MalformedPreset(_))
        ));
    }

    #[test]
    fn unknown_selector_is_rejected() {
        let p = sample_preset();
        let mut value = to_phb_value(&p).unwrap();
        value["effectModule"]["REVERB"]["TYPE"] = json!(99);
        assert!(matches!(
            decode_phb(&value.to_string()),
            Err(PresetError::UnknownEffect { section: "REVERB", selector: 99 })
        ));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let p = sample_preset();
        let mut value = to_phb_value(&p).unwrap();
        value["fileInfo"]["exported_by"] = json!("someone else");
        value["extra_top_level"] = json!({"ignored": true});
        assert!(decode_phb(&value.to_string()).is_ok());
    }

    #[test]
    fn name_is_trimmed() {
        let p = sample_preset();
        let mut value = to_phb_value(&p).unwrap();
        value["fileInfo"]["preset_name"] = json!("  Spacey  ");
        let q = decode_phb(&value.to_string()).unwrap();
        assert_eq!(q.name, "Spacey");
    }
}

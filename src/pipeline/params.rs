//! Parameter collection: raw user input → normalized [`ParameterBag`].
//!
//! Each [`ParameterDescriptor`] names the key its value is submitted under,
//! so the collector never needs to know which tool it is serving. Raw input
//! lives in [`ParameterInputs`] (what the widgets hold); [`collect`] turns it
//! into the bag that goes on the wire, applying defaults, slider scaling and
//! the conditional requirements of assets and watermarks.
//!
//! Collection never fails fast: every problem is gathered so the caller can
//! show them all at once.

use crate::error::{ValidationError, ValidationErrors};
use crate::pipeline::intake::StagedFile;
use crate::registry::{
    Condition, ParamKind, ParameterDescriptor, ToolSpec, WATERMARK_IMAGE, WATERMARK_TEXT,
    WATERMARK_TYPES,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Slider step used by increment/decrement.
pub const LEVEL_STEP: u8 = 10;
/// Upper end of the slider domain `[0, 100]`.
pub const LEVEL_MAX: u8 = 100;

/// A value as captured from an input widget.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Text box, password box or dropdown selection.
    Text(String),
    /// Slider level in `[0, 100]`.
    Level(u8),
    /// An attached file.
    Asset(StagedFile),
}

/// Where a key lands inside a tool's descriptors.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Direct(&'static ParameterDescriptor),
    WatermarkText,
    WatermarkAsset(&'static [&'static str]),
}

fn slot(spec: &ToolSpec, key: &str) -> Option<Slot> {
    for p in spec.parameters {
        if p.key == key {
            return Some(Slot::Direct(p));
        }
        if let ParamKind::Watermark {
            text_key,
            asset_key,
            asset_extensions,
        } = p.kind
        {
            if text_key == key {
                return Some(Slot::WatermarkText);
            }
            if asset_key == key {
                return Some(Slot::WatermarkAsset(asset_extensions));
            }
        }
    }
    None
}

/// Raw parameter values for one job attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterInputs {
    values: HashMap<String, RawValue>,
}

impl ParameterInputs {
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pre-select dropdown defaults and slider start levels for keys the user
    /// has not touched.
    pub fn apply_defaults(&mut self, spec: &ToolSpec) {
        for p in spec.parameters {
            let default = match p.kind {
                ParamKind::Choice { options } => options.first().map(|o| RawValue::Text(o.value.to_string())),
                ParamKind::Watermark { .. } => Some(RawValue::Text(WATERMARK_TEXT.to_string())),
                ParamKind::Scaled { default_level, .. } => Some(RawValue::Level(default_level)),
                _ => None,
            };
            if let Some(value) = default {
                self.values.entry(p.key.to_string()).or_insert(value);
            }
        }
    }

    /// Set a text, password or dropdown value.
    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), RawValue::Text(value.into()));
    }

    /// Set a slider by direct entry, clamped into `[0, 100]`.
    pub fn set_level(&mut self, key: impl Into<String>, level: i64) {
        let level = level.clamp(0, i64::from(LEVEL_MAX)) as u8;
        self.values.insert(key.into(), RawValue::Level(level));
    }

    /// Raise a slider by one step. Returns the new level.
    pub fn step_up(&mut self, spec: &ToolSpec, key: &str) -> Option<u8> {
        self.step(spec, key, i64::from(LEVEL_STEP))
    }

    /// Lower a slider by one step. Returns the new level.
    pub fn step_down(&mut self, spec: &ToolSpec, key: &str) -> Option<u8> {
        self.step(spec, key, -i64::from(LEVEL_STEP))
    }

    fn step(&mut self, spec: &ToolSpec, key: &str, delta: i64) -> Option<u8> {
        let default_level = match spec.parameter(key)?.kind {
            ParamKind::Scaled { default_level, .. } => default_level,
            _ => return None,
        };
        let current = match self.values.get(key) {
            Some(RawValue::Level(l)) => *l,
            _ => default_level,
        };
        self.set_level(key, i64::from(current) + delta);
        match self.values.get(key) {
            Some(RawValue::Level(l)) => Some(*l),
            _ => None,
        }
    }

    /// Attach a file to an asset parameter.
    pub fn attach(&mut self, key: impl Into<String>, file: StagedFile) {
        self.values.insert(key.into(), RawValue::Asset(file));
    }

    pub fn clear(&mut self, key: &str) {
        self.values.remove(key);
    }

    /// Set a non-file value from its textual form, dispatching on the
    /// descriptor kind declared for `key`.
    pub fn set_from_str(&mut self, spec: &ToolSpec, key: &str, raw: &str) -> Result<(), ValidationError> {
        let unknown = || ValidationError::UnknownParameter {
            tool: spec.id.to_string(),
            key: key.to_string(),
        };
        match slot(spec, key).ok_or_else(unknown)? {
            Slot::WatermarkText => self.set_text(key, raw),
            Slot::WatermarkAsset(_) => {
                return Err(ValidationError::WrongValueKind { key: key.to_string() })
            }
            Slot::Direct(p) => match p.kind {
                ParamKind::Text { .. } | ParamKind::Password => self.set_text(key, raw),
                ParamKind::Choice { options } => {
                    check_choice(key, raw, options.iter().map(|o| o.value))?;
                    self.set_text(key, raw);
                }
                ParamKind::Watermark { .. } => {
                    check_choice(key, raw, WATERMARK_TYPES.iter().map(|o| o.value))?;
                    self.set_text(key, raw);
                }
                ParamKind::Scaled { .. } => {
                    let level: i64 = raw.trim().parse().map_err(|_| ValidationError::InvalidNumber {
                        key: key.to_string(),
                        raw: raw.to_string(),
                    })?;
                    self.set_level(key, level);
                }
                ParamKind::Asset { .. } => {
                    return Err(ValidationError::WrongValueKind { key: key.to_string() })
                }
            },
        }
        Ok(())
    }

    /// Accepted extensions for an asset key, if `key` takes a file.
    pub fn asset_extensions(spec: &ToolSpec, key: &str) -> Option<&'static [&'static str]> {
        match slot(spec, key)? {
            Slot::WatermarkAsset(exts) => Some(exts),
            Slot::Direct(p) => match p.kind {
                ParamKind::Asset { extensions, .. } => Some(extensions),
                _ => None,
            },
            Slot::WatermarkText => None,
        }
    }

    fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(RawValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    fn asset(&self, key: &str) -> Option<&StagedFile> {
        match self.values.get(key) {
            Some(RawValue::Asset(f)) => Some(f),
            _ => None,
        }
    }

    /// Dropdown value with its declared default applied.
    fn effective_choice<'a>(&'a self, spec: &ToolSpec, key: &str) -> Option<&'a str> {
        if let Some(v) = self.text(key) {
            return Some(v);
        }
        match spec.parameter(key)?.kind {
            ParamKind::Choice { options } => options.first().map(|o| o.value),
            ParamKind::Watermark { .. } => Some(WATERMARK_TEXT),
            _ => None,
        }
    }
}

fn check_choice<'a>(
    key: &str,
    value: &str,
    allowed: impl Iterator<Item = &'a str> + Clone,
) -> Result<(), ValidationError> {
    if allowed.clone().any(|a| a == value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidChoice {
            key: key.to_string(),
            value: value.to_string(),
            allowed: allowed.collect::<Vec<_>>().join(", "),
        })
    }
}

/// A resolved parameter, ready to be submitted.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Number(f64),
    Asset(StagedFile),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Asset(file) => f.write_str(file.name()),
        }
    }
}

/// Normalized parameters keyed by submission name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBag(BTreeMap<String, ParamValue>);

impl ParameterBag {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, key: &str, value: ParamValue) {
        self.0.insert(key.to_string(), value);
    }
}

/// Resolve every descriptor of `spec` against `inputs`.
pub fn collect(spec: &ToolSpec, inputs: &ParameterInputs) -> Result<ParameterBag, ValidationErrors> {
    let mut bag = ParameterBag::default();
    let mut errors = Vec::new();

    for p in spec.parameters {
        if let Err(e) = collect_one(spec, p, inputs, &mut bag) {
            errors.push(e);
        }
    }

    if errors.is_empty() {
        Ok(bag)
    } else {
        Err(ValidationErrors(errors))
    }
}

fn collect_one(
    spec: &ToolSpec,
    p: &ParameterDescriptor,
    inputs: &ParameterInputs,
    bag: &mut ParameterBag,
) -> Result<(), ValidationError> {
    let wrong_kind = || ValidationError::WrongValueKind { key: p.key.to_string() };
    match p.kind {
        ParamKind::Text { .. } | ParamKind::Password => {
            let value = match inputs.get(p.key) {
                None => "",
                Some(RawValue::Text(s)) => s.as_str(),
                Some(_) => return Err(wrong_kind()),
            };
            if value.is_empty() {
                if p.required {
                    return Err(missing(p.key, p.label));
                }
            } else {
                bag.insert(p.key, ParamValue::Text(value.to_string()));
            }
        }
        ParamKind::Choice { options } => {
            if matches!(inputs.get(p.key), Some(RawValue::Level(_) | RawValue::Asset(_))) {
                return Err(wrong_kind());
            }
            let value = inputs.effective_choice(spec, p.key).ok_or_else(|| missing(p.key, p.label))?;
            check_choice(p.key, value, options.iter().map(|o| o.value))?;
            bag.insert(p.key, ParamValue::Text(value.to_string()));
        }
        ParamKind::Scaled { scale, default_level } => {
            let level = match inputs.get(p.key) {
                None => default_level,
                Some(RawValue::Level(l)) => (*l).min(LEVEL_MAX),
                Some(_) => return Err(wrong_kind()),
            };
            bag.insert(p.key, ParamValue::Number(scale.apply(level)));
        }
        ParamKind::Asset { required_when, .. } => match inputs.get(p.key) {
            Some(RawValue::Asset(file)) => bag.insert(p.key, ParamValue::Asset(file.clone())),
            Some(_) => return Err(wrong_kind()),
            None => {
                let needed = p.required
                    || required_when.is_some_and(|c| condition_holds(spec, inputs, c));
                if needed {
                    return Err(ValidationError::MissingAsset {
                        key: p.key.to_string(),
                        label: p.label.to_string(),
                    });
                }
            }
        },
        ParamKind::Watermark {
            text_key,
            asset_key,
            ..
        } => {
            if matches!(inputs.get(p.key), Some(RawValue::Level(_) | RawValue::Asset(_))) {
                return Err(wrong_kind());
            }
            let kind = inputs.effective_choice(spec, p.key).unwrap_or(WATERMARK_TEXT);
            check_choice(p.key, kind, WATERMARK_TYPES.iter().map(|o| o.value))?;
            bag.insert(p.key, ParamValue::Text(kind.to_string()));
            if kind == WATERMARK_IMAGE {
                let file = inputs.asset(asset_key).ok_or_else(|| ValidationError::MissingAsset {
                    key: asset_key.to_string(),
                    label: "a watermark image".to_string(),
                })?;
                bag.insert(asset_key, ParamValue::Asset(file.clone()));
            } else {
                let text = inputs.text(text_key).unwrap_or_default();
                if text.is_empty() {
                    return Err(missing(text_key, "Watermark Text"));
                }
                bag.insert(text_key, ParamValue::Text(text.to_string()));
            }
        }
    }
    Ok(())
}

fn condition_holds(spec: &ToolSpec, inputs: &ParameterInputs, c: Condition) -> bool {
    inputs.effective_choice(spec, c.key) == Some(c.equals)
}

fn missing(key: &str, label: &str) -> ValidationError {
    ValidationError::MissingParameter {
        key: key.to_string(),
        label: label.to_string(),
    }
}

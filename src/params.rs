//! Analysis parameters and the selected image.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PorometError;

/// The three numeric inputs forwarded to the analysis service.
///
/// No bounds checking is done here; whatever the operator typed is sent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// SEM magnification
    pub magnification: f64,
    /// Largest pore diameter considered, in nanometres
    pub max_diam_nm: f64,
    /// Threshold magnification
    pub thresh_mag: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            magnification: 300.0,
            max_diam_nm: 80.0,
            thresh_mag: 1.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKey {
    Magnification,
    MaxDiamNm,
    ThreshMag,
}

impl ParamKey {
    pub const ALL: [ParamKey; 3] = [ParamKey::Magnification, ParamKey::MaxDiamNm, ParamKey::ThreshMag];

    /// Multipart field name expected by the service.
    pub fn field_name(self) -> &'static str {
        match self {
            ParamKey::Magnification => "magnification",
            ParamKey::MaxDiamNm => "max_diam_nm",
            ParamKey::ThreshMag => "thresh_mag",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ParamKey::Magnification => "SEM Magnification",
            ParamKey::MaxDiamNm => "Max Diameter (nm)",
            ParamKey::ThreshMag => "Threshold Magnification",
        }
    }
}

impl AnalysisParams {
    pub fn get(&self, key: ParamKey) -> f64 {
        match key {
            ParamKey::Magnification => self.magnification,
            ParamKey::MaxDiamNm => self.max_diam_nm,
            ParamKey::ThreshMag => self.thresh_mag,
        }
    }

    /// Returns a copy with exactly one field replaced.
    pub fn with(mut self, key: ParamKey, value: f64) -> Self {
        match key {
            ParamKey::Magnification => self.magnification = value,
            ParamKey::MaxDiamNm => self.max_diam_nm = value,
            ParamKey::ThreshMag => self.thresh_mag = value,
        }
        self
    }

    /// Field name / text pairs in the order the service expects them.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        ParamKey::ALL
            .iter()
            .map(|&key| (key.field_name(), format_number(self.get(key))))
            .collect()
    }
}

/// Numeric coercion for operator text input, following the rules of a
/// browser number field.
///
/// Blank input is zero and anything that does not parse is NaN. Neither is
/// rejected; the service decides what to do with it. Accepted forms are
/// decimal literals with an optional sign and exponent, unsigned `0x`/`0o`/`0b`
/// integers, and a signed `Infinity`. Spellings such as `inf` or `nan` are NaN.
pub fn coerce_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    if let Some(value) = parse_radix_literal(trimmed) {
        return value;
    }

    let (sign, unsigned) = match trimmed.as_bytes()[0] {
        b'+' => (1.0, &trimmed[1..]),
        b'-' => (-1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }
    let decimal = unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && unsigned
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !decimal {
        return f64::NAN;
    }
    unsigned.parse::<f64>().map(|v| sign * v).unwrap_or(f64::NAN)
}

/// `0x1f`, `0o17`, `0b101`. Signs are not allowed on these.
fn parse_radix_literal(text: &str) -> Option<f64> {
    let radix = match text.get(..2)? {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() {
        return Some(f64::NAN);
    }
    let mut value = 0.0;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => value = value * f64::from(radix) + f64::from(d),
            None => return Some(f64::NAN),
        }
    }
    Some(value)
}

/// Textual form of a parameter as sent on the wire.
pub fn format_number(value: f64) -> String {
    if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        value.to_string()
    }
}

/// An image chosen by the operator.
#[derive(Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let mime = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            name,
            mime,
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, PorometError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        Ok(Self::new(name, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Holds the current parameters and selected file.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    params: AnalysisParams,
    file: Option<SelectedFile>,
}

impl ParameterStore {
    pub fn new(params: AnalysisParams) -> Self {
        Self { params, file: None }
    }

    pub fn params(&self) -> AnalysisParams {
        self.params
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn set_param(&mut self, key: ParamKey, value: f64) {
        self.params = self.params.with(key, value);
    }

    pub fn set_param_text(&mut self, key: ParamKey, text: &str) -> f64 {
        let value = coerce_number(text);
        self.set_param(key, value);
        value
    }

    /// Replace the selected file, returning the previous one.
    ///
    /// Callers holding a result or error for the old file must drop them.
    pub fn select_file(&mut self, file: SelectedFile) -> Option<SelectedFile> {
        self.file.replace(file)
    }
}

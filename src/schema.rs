use crate::error::ConfigError;
use crate::normalize::normalize;
use crate::records::{NOT_SIGNED, Record, SIGNED};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Column filled with the submission time, when the sheet has one.
pub const TIMESTAMP_COLUMN: &str = "Timestamp";
/// Column filled with the submitting user, when the sheet has one.
pub const SUBMITTED_BY_COLUMN: &str = "Submitted By";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Declared layout of one form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    pub title: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub signatures: Vec<String>,
}

impl FormSchema {
    pub fn new(
        title: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
        signatures: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        FormSchema {
            title: title.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            signatures: signatures.into_iter().map(Into::into).collect(),
        }
    }

    /// Fields followed by signatures, the column order a fresh sheet gets.
    pub fn expected_headers(&self) -> Vec<String> {
        self.fields
            .iter()
            .chain(self.signatures.iter())
            .cloned()
            .collect()
    }

    /// Check the title and names; `form` is only used in error messages.
    pub fn validate(&self, form: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidForm {
            form: form.to_string(),
            reason,
        };

        if self.title.trim().is_empty() {
            return Err(invalid("title is blank".to_string()));
        }

        let mut seen: HashMap<String, &str> = HashMap::new();
        for name in self.fields.iter().chain(self.signatures.iter()) {
            let key = normalize(name);
            if key.is_empty() {
                return Err(invalid("contains a blank field name".to_string()));
            }
            if let Some(previous) = seen.insert(key, name) {
                return Err(invalid(format!(
                    "'{}' and '{}' name the same column",
                    previous, name
                )));
            }
        }
        Ok(())
    }

    /// Every configured signer left out of `submission` counts as not signed,
    /// so each signature column gets a marker instead of a blank cell.
    pub fn complete(&self, submission: &mut FormSubmission) {
        for signer in &self.signatures {
            let key = normalize(signer);
            let given = submission
                .signatures
                .keys()
                .any(|k| k == signer || normalize(k) == key);
            if !given {
                submission.signatures.insert(signer.clone(), false);
            }
        }
    }

    /// Field values and signature states held in an existing record, for
    /// pre-filling an edit.
    pub fn prefill(&self, record: &Record) -> FormSubmission {
        let mut submission = FormSubmission::new();
        for field in &self.fields {
            let value = lookup(record, field).unwrap_or_default();
            submission = submission.field(field.clone(), value);
        }
        for signer in &self.signatures {
            let signed = lookup(record, signer).is_some_and(|v| v.trim() == SIGNED);
            submission = submission.sign(signer.clone(), signed);
        }
        submission
    }
}

fn lookup(record: &Record, name: &str) -> Option<String> {
    if let Some(value) = record.get(name) {
        return Some(value.clone());
    }
    let key = normalize(name);
    record
        .iter()
        .find(|(header, _)| normalize(header) == key)
        .map(|(_, value)| value.clone())
}

/// All forms of one sheet type, in form id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormCatalog {
    forms: BTreeMap<String, FormSchema>,
}

impl FormCatalog {
    /// Parse and validate a `{form_id: {title, fields, signatures}}` document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let forms: BTreeMap<String, FormSchema> =
            serde_json::from_str(json).map_err(|source| ConfigError::Json {
                path: "<inline>".into(),
                source,
            })?;
        Self::from_forms(forms)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let forms: BTreeMap<String, FormSchema> =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        let catalog = Self::from_forms(forms)?;
        log::info!("loaded {} forms from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_forms(forms: BTreeMap<String, FormSchema>) -> Result<Self, ConfigError> {
        for (id, schema) in &forms {
            schema.validate(id)?;
        }
        Ok(FormCatalog { forms })
    }

    pub fn get(&self, form_id: &str) -> Option<&FormSchema> {
        self.forms.get(form_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.forms.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormSchema)> {
        self.forms.iter().map(|(id, schema)| (id.as_str(), schema))
    }

    pub fn contains(&self, form_id: &str) -> bool {
        self.forms.contains_key(form_id)
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

/// Values collected from a filled-in form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSubmission {
    #[serde(default)]
    pub fields: HashMap<String, String>,
    #[serde(default)]
    pub signatures: HashMap<String, bool>,
    #[serde(default)]
    pub submitted_by: Option<String>,
    #[serde(skip)]
    pub timestamp: Option<DateTime<Local>>,
}

impl FormSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn sign(mut self, signer: impl Into<String>, signed: bool) -> Self {
        self.signatures.insert(signer.into(), signed);
        self
    }

    pub fn submitted_by(mut self, user: impl Into<String>) -> Self {
        self.submitted_by = Some(user.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Flatten into column name to cell value.
    ///
    /// Signatures become the signed/not-signed markers; the timestamp and
    /// submitter land in their own columns and are dropped later by
    /// [`crate::reconcile::map_submission`] if the sheet has no such column.
    pub fn into_values(self) -> HashMap<String, String> {
        let mut values = self.fields;
        for (signer, signed) in self.signatures {
            let marker = if signed { SIGNED } else { NOT_SIGNED };
            values.insert(signer, marker.to_string());
        }
        if let Some(ts) = self.timestamp {
            values.insert(
                TIMESTAMP_COLUMN.to_string(),
                ts.format(TIMESTAMP_FORMAT).to_string(),
            );
        }
        if let Some(user) = self.submitted_by {
            values.insert(SUBMITTED_BY_COLUMN.to_string(), user);
        }
        values
    }
}

//! Catalog descriptors to vendor tool specs, and back.
//!
//! Vendors restrict tool names (alphabet and length) while catalog names are
//! free-form, so every tool presented to a model gets a derived vendor name.
//! The [`NameMapping`] records the derivation so the model's tool calls can
//! be routed back to the catalog.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use toolrelay_core::naming::NamePolicy;
use toolrelay_core::provider::VendorToolSpec;
use toolrelay_core::tool::ToolDescriptor;
use tracing::debug;

/// Length of `_` plus eight hex characters.
const SUFFIX_LEN: usize = 9;

/// Fresh suffixes tried before giving up on an overlong name.
const SUFFIX_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("tool name collision: '{incoming}' and '{existing}' both map to vendor name '{vendor_name}'")]
    NameCollision {
        vendor_name: String,
        existing: String,
        incoming: String,
    },
}

/// Bidirectional `vendor_name <-> canonical_name` map of one session.
///
/// Entries are only ever added. Every vendor name resolves to exactly one
/// canonical name and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct NameMapping {
    by_vendor: HashMap<String, String>,
    by_canonical: HashMap<String, String>,
}

impl NameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_vendor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_vendor.is_empty()
    }

    /// The canonical name behind `vendor_name`.
    pub fn resolve(&self, vendor_name: &str) -> Option<&str> {
        self.by_vendor.get(vendor_name).map(String::as_str)
    }

    /// The vendor name already assigned to `canonical_name`.
    pub fn vendor_for(&self, canonical_name: &str) -> Option<&str> {
        self.by_canonical.get(canonical_name).map(String::as_str)
    }

    /// `(vendor_name, canonical_name)` pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_vendor.iter().map(|(v, c)| (v.as_str(), c.as_str()))
    }

    fn check(&self, vendor_name: &str, canonical_name: &str) -> Result<(), TranslateError> {
        if let Some(existing) = self.resolve(vendor_name) {
            if existing != canonical_name {
                return Err(TranslateError::NameCollision {
                    vendor_name: vendor_name.to_string(),
                    existing: existing.to_string(),
                    incoming: canonical_name.to_string(),
                });
            }
        }
        if let Some(existing_vendor) = self.vendor_for(canonical_name) {
            if existing_vendor != vendor_name {
                return Err(TranslateError::NameCollision {
                    vendor_name: vendor_name.to_string(),
                    existing: format!("{canonical_name} (as '{existing_vendor}')"),
                    incoming: canonical_name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn insert(&mut self, vendor_name: String, canonical_name: String) -> Result<(), TranslateError> {
        self.check(&vendor_name, &canonical_name)?;
        self.by_canonical.insert(canonical_name.clone(), vendor_name.clone());
        self.by_vendor.insert(vendor_name, canonical_name);
        Ok(())
    }

    /// Add every entry of `other`. Either all entries are added or none.
    pub fn merge(&mut self, other: NameMapping) -> Result<(), TranslateError> {
        for (vendor, canonical) in other.iter() {
            self.check(vendor, canonical)?;
        }
        for (vendor, canonical) in other.by_vendor {
            self.by_canonical.insert(canonical.clone(), vendor.clone());
            self.by_vendor.insert(vendor, canonical);
        }
        Ok(())
    }
}

impl TryFrom<BTreeMap<String, String>> for NameMapping {
    type Error = TranslateError;

    fn try_from(entries: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut mapping = NameMapping::new();
        for (vendor, canonical) in entries {
            mapping.insert(vendor, canonical)?;
        }
        Ok(mapping)
    }
}

impl From<NameMapping> for BTreeMap<String, String> {
    fn from(mapping: NameMapping) -> Self {
        mapping.by_vendor.into_iter().collect()
    }
}

/// The result of translating one batch of descriptors.
#[derive(Debug, Clone)]
pub struct Translation {
    /// One spec per distinct descriptor, in input order
    pub specs: Vec<VendorToolSpec>,

    /// Entries used by `specs`, to be merged into the session mapping
    pub mapping: NameMapping,
}

/// Derives vendor names and projects schemas for one vendor's [`NamePolicy`].
#[derive(Debug, Clone, Default)]
pub struct SchemaTranslator {
    policy: NamePolicy,
}

impl SchemaTranslator {
    /// Limits shorter than one character plus a suffix are raised to fit one.
    pub fn new(mut policy: NamePolicy) -> Self {
        policy.max_len = policy.max_len.max(SUFFIX_LEN + 1);
        Self { policy }
    }

    pub fn policy(&self) -> NamePolicy {
        self.policy
    }

    /// Translate `descriptors` against the session mapping.
    ///
    /// Canonical names already known to the session keep their vendor name.
    /// Two different canonical names landing on one vendor name is an error
    /// and nothing is returned.
    pub fn translate(
        &self,
        descriptors: &[ToolDescriptor],
        session: &NameMapping,
    ) -> Result<Translation, TranslateError> {
        let mut batch = NameMapping::new();
        let mut specs = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let canonical = descriptor.name.as_str();
            if batch.vendor_for(canonical).is_some() {
                continue;
            }

            let vendor_name = match session.vendor_for(canonical) {
                Some(existing) if self.policy.accepts(existing) => existing.to_string(),
                _ => self.derive(canonical, session, &batch)?,
            };

            session.check(&vendor_name, canonical)?;
            batch.insert(vendor_name.clone(), canonical.to_string())?;

            specs.push(VendorToolSpec {
                vendor_name,
                description: descriptor.description.clone(),
                input_schema: project_schema(&descriptor.input_schema),
            });
        }

        debug!(tools = specs.len(), "Translated tool descriptors");
        Ok(Translation { specs, mapping: batch })
    }

    /// Build a vendor name for a canonical name the session has not seen.
    fn derive(
        &self,
        canonical: &str,
        session: &NameMapping,
        batch: &NameMapping,
    ) -> Result<String, TranslateError> {
        let sanitized = self.policy.sanitize(canonical);
        if sanitized.chars().count() <= self.policy.max_len {
            return Ok(sanitized);
        }

        let keep = self.policy.max_len.saturating_sub(SUFFIX_LEN);
        let prefix: String = sanitized.chars().take(keep).collect();

        let mut candidate = String::new();
        for _ in 0..SUFFIX_ATTEMPTS {
            candidate = format!("{prefix}_{}", random_suffix());
            let taken = session.resolve(&candidate).is_some() || batch.resolve(&candidate).is_some();
            if !taken {
                return Ok(candidate);
            }
        }

        let existing = session
            .resolve(&candidate)
            .or_else(|| batch.resolve(&candidate))
            .unwrap_or_default()
            .to_string();
        Err(TranslateError::NameCollision {
            vendor_name: candidate,
            existing,
            incoming: canonical.to_string(),
        })
    }
}

fn random_suffix() -> String {
    let mut hex = uuid::Uuid::new_v4().simple().to_string();
    hex.truncate(8);
    hex
}

/// Reduce a descriptor schema to `{"type":"object","properties","required"}`.
///
/// Schemas nested under `parameters` or `inputs` are unwrapped first.
pub fn project_schema(schema: &Value) -> Value {
    let source = if schema.get("properties").is_some() {
        schema
    } else {
        schema
            .get("parameters")
            .or_else(|| schema.get("inputs"))
            .filter(|v| v.is_object())
            .unwrap_or(schema)
    };

    let properties = source
        .get("properties")
        .filter(|v| v.is_object())
        .cloned()
        .unwrap_or_else(|| json!({}));

    let required: Vec<Value> = source
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter(|n| n.is_string()).cloned().collect())
        .unwrap_or_default();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

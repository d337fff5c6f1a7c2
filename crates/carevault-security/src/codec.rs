// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Encrypted-field codec — converts between logical field values (a string,
// or an ordered sequence of strings) and the stored ciphertext envelope.
//
// A sequence is serialized to a canonical JSON array of strings and then
// encrypted as ONE envelope, not one envelope per element. Decode infers the
// shape by attempting the array parse after decryption; the registry does
// not track whether a field is scalar or sequence, so the stored data is the
// only source of truth.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use carevault_core::error::Result;

use crate::crypto::FieldCipher;

/// Static table declaring which fields of which entity types require
/// transparent encryption. Built once at startup and never mutated.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    entries: HashMap<String, Vec<String>>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity's encrypted fields. Field order is preserved.
    pub fn register(mut self, entity: &str, fields: &[&str]) -> Self {
        self.entries.insert(
            entity.to_owned(),
            fields.iter().map(|f| (*f).to_owned()).collect(),
        );
        self
    }

    /// The production registrations for the CareVault platform.
    pub fn healthcare_defaults() -> Self {
        Self::new()
            .register("user", &["phone", "national_id", "address"])
            .register(
                "health_record",
                &["diagnosis", "symptoms", "clinical_notes"],
            )
            .register(
                "medical_history",
                &["conditions", "allergies", "medications"],
            )
            .register("emergency_alert", &["description", "location_details"])
            .register("prescription", &["drug_name", "dosage", "instructions"])
    }

    /// Encrypted fields for an entity, or `None` if the entity is not
    /// registered.
    pub fn fields_for(&self, entity: &str) -> Option<&[String]> {
        self.entries.get(entity).map(Vec::as_slice)
    }

    pub fn is_registered(&self, entity: &str, field: &str) -> bool {
        self.fields_for(entity)
            .is_some_and(|fields| fields.iter().any(|f| f == field))
    }
}

/// Encodes and decodes single field values against the envelope format.
pub struct FieldCodec {
    cipher: FieldCipher,
}

impl FieldCodec {
    pub fn new(cipher: FieldCipher) -> Self {
        Self { cipher }
    }

    /// Encode a logical value into its stored form.
    ///
    /// - `Null` passes through unchanged — absence is never encrypted.
    /// - A string encrypts directly.
    /// - An array serializes to a JSON array of strings (non-string elements
    ///   are stringified), then encrypts as a single envelope.
    /// - Any other JSON type is stringified, then encrypted; it decodes back
    ///   as a string.
    pub fn encode_value(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) => Ok(Value::String(self.cipher.encrypt(s)?)),
            Value::Array(items) => {
                let strings: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                let wire = serde_json::to_string(&strings)?;
                debug!(elements = strings.len(), "sequence encoded as one envelope");
                Ok(Value::String(self.cipher.encrypt(&wire)?))
            }
            other => Ok(Value::String(self.cipher.encrypt(&other.to_string())?)),
        }
    }

    /// Decode a stored value back to its logical form.
    ///
    /// `Null` passes through; non-string stored values are returned as-is
    /// (nothing else can hold an envelope). Otherwise decrypt, then attempt
    /// the array parse: a JSON array of strings becomes `Array`, anything
    /// else stays a plain `String`. Decrypt failures propagate — silently
    /// returning garbage for a health record is worse than surfacing an
    /// error.
    pub fn decode_value(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(envelope) => {
                let plaintext = self.cipher.decrypt(envelope)?;
                match serde_json::from_str::<Vec<String>>(&plaintext) {
                    Ok(strings) => Ok(Value::Array(
                        strings.into_iter().map(Value::String).collect(),
                    )),
                    Err(_) => Ok(Value::String(plaintext)),
                }
            }
            other => Ok(other.clone()),
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data-access interception — a decorator over the record store that
// encrypts registered fields before writes and decrypts them after reads.
//
// Call sites hold only the wrapper, so the encrypt-before-write /
// decrypt-after-read ordering is enforced exactly once, structurally, no
// matter how many call sites touch the data layer. New entity/field
// registrations change the registry, never the call sites.

use serde_json::Value;
use tracing::instrument;

use carevault_core::error::Result;

use crate::codec::{FieldCodec, FieldRegistry};

/// The narrow data-access seam the security layer composes over.
///
/// Records are JSON objects; `filter` values are opaque to the interceptor
/// and interpreted by the backing store. Implementations are expected to be
/// thin adapters over the real persistence layer.
pub trait RecordStore: Send + Sync {
    // Write-class operations. Each returns the stored record.
    fn create(&self, entity: &str, payload: Value) -> Result<Value>;
    fn update(&self, entity: &str, id: &str, payload: Value) -> Result<Value>;
    fn upsert(&self, entity: &str, id: &str, payload: Value) -> Result<Value>;
    fn create_many(&self, entity: &str, payloads: Vec<Value>) -> Result<Vec<Value>>;
    /// Apply one payload to every matching record; returns the match count.
    fn update_many(&self, entity: &str, filter: &Value, payload: Value) -> Result<u64>;

    // Read-class operations.
    fn find_unique(&self, entity: &str, id: &str) -> Result<Option<Value>>;
    fn find_first(&self, entity: &str, filter: &Value) -> Result<Option<Value>>;
    fn find_many(&self, entity: &str, filter: &Value) -> Result<Vec<Value>>;
}

/// Record store decorator that applies the field registry transparently.
pub struct EncryptedStore<S> {
    inner: S,
    codec: FieldCodec,
    registry: FieldRegistry,
}

impl<S: RecordStore> EncryptedStore<S> {
    pub fn new(inner: S, codec: FieldCodec, registry: FieldRegistry) -> Self {
        Self {
            inner,
            codec,
            registry,
        }
    }

    /// The wrapped store. Bypasses interception — intended for composition
    /// at the process root, not for data access.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Encrypt every registered, present, non-null field of an outgoing
    /// payload. Unregistered entities and fields pass through untouched.
    fn encrypt_payload(&self, entity: &str, mut payload: Value) -> Result<Value> {
        let Some(fields) = self.registry.fields_for(entity) else {
            return Ok(payload);
        };
        if let Value::Object(map) = &mut payload {
            for field in fields {
                if let Some(value) = map.get(field) {
                    if !value.is_null() {
                        let encoded = self.codec.encode_value(value)?;
                        map.insert(field.clone(), encoded);
                    }
                }
            }
        }
        Ok(payload)
    }

    /// Decrypt every registered, present, non-null field of a returned
    /// record. A single field failure fails the whole record — a tamper or
    /// corruption signal is never partially hidden.
    fn decrypt_record(&self, entity: &str, mut record: Value) -> Result<Value> {
        let Some(fields) = self.registry.fields_for(entity) else {
            return Ok(record);
        };
        if let Value::Object(map) = &mut record {
            for field in fields {
                if let Some(value) = map.get(field) {
                    if !value.is_null() {
                        let decoded = self.codec.decode_value(value)?;
                        map.insert(field.clone(), decoded);
                    }
                }
            }
        }
        Ok(record)
    }

    fn decrypt_optional(&self, entity: &str, record: Option<Value>) -> Result<Option<Value>> {
        record.map(|r| self.decrypt_record(entity, r)).transpose()
    }
}

impl<S: RecordStore> RecordStore for EncryptedStore<S> {
    #[instrument(skip(self, payload))]
    fn create(&self, entity: &str, payload: Value) -> Result<Value> {
        let payload = self.encrypt_payload(entity, payload)?;
        let record = self.inner.create(entity, payload)?;
        self.decrypt_record(entity, record)
    }

    #[instrument(skip(self, payload))]
    fn update(&self, entity: &str, id: &str, payload: Value) -> Result<Value> {
        let payload = self.encrypt_payload(entity, payload)?;
        let record = self.inner.update(entity, id, payload)?;
        self.decrypt_record(entity, record)
    }

    #[instrument(skip(self, payload))]
    fn upsert(&self, entity: &str, id: &str, payload: Value) -> Result<Value> {
        let payload = self.encrypt_payload(entity, payload)?;
        let record = self.inner.upsert(entity, id, payload)?;
        self.decrypt_record(entity, record)
    }

    #[instrument(skip(self, payloads), fields(batch = payloads.len()))]
    fn create_many(&self, entity: &str, payloads: Vec<Value>) -> Result<Vec<Value>> {
        let payloads = payloads
            .into_iter()
            .map(|p| self.encrypt_payload(entity, p))
            .collect::<Result<Vec<_>>>()?;
        let records = self.inner.create_many(entity, payloads)?;
        records
            .into_iter()
            .map(|r| self.decrypt_record(entity, r))
            .collect()
    }

    #[instrument(skip(self, filter, payload))]
    fn update_many(&self, entity: &str, filter: &Value, payload: Value) -> Result<u64> {
        let payload = self.encrypt_payload(entity, payload)?;
        self.inner.update_many(entity, filter, payload)
    }

    #[instrument(skip(self))]
    fn find_unique(&self, entity: &str, id: &str) -> Result<Option<Value>> {
        let record = self.inner.find_unique(entity, id)?;
        self.decrypt_optional(entity, record)
    }

    #[instrument(skip(self, filter))]
    fn find_first(&self, entity: &str, filter: &Value) -> Result<Option<Value>> {
        let record = self.inner.find_first(entity, filter)?;
        self.decrypt_optional(entity, record)
    }

    #[instrument(skip(self, filter))]
    fn find_many(&self, entity: &str, filter: &Value) -> Result<Vec<Value>> {
        let records = self.inner.find_many(entity, filter)?;
        records
            .into_iter()
            .map(|r| self.decrypt_record(entity, r))
            .collect()
    }
}

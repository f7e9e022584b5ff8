//! Flat property records: the wire form of a shape.

use super::{Shape, ShapeKind};
use serde_json::{Map, Value};
use thiserror::Error;

/// A flat field mapping describing a shape, or a partial one for a patch.
pub type ShapeRecord = Map<String, Value>;

/// Errors turning a record into a shape.
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("shape record has no id")]
    MissingId,
    #[error("shape record has no type")]
    MissingKind,
    #[error("unknown shape type: {0}")]
    UnknownKind(String),
    #[error("invalid shape record: {0}")]
    Invalid(#[from] serde_json::Error),
}

impl Shape {
    /// Serialize to a flat record. The record always carries `id` and `type`.
    pub fn to_record(&self) -> ShapeRecord {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                log::error!("shape {} serialized to a non-object: {other}", self.id);
                self.identity_record()
            }
            Err(e) => {
                log::error!("failed to serialize shape {}: {e}", self.id);
                self.identity_record()
            }
        }
    }

    fn identity_record(&self) -> ShapeRecord {
        let mut record = ShapeRecord::new();
        record.insert("id".to_string(), Value::from(self.id.as_str()));
        record.insert("type".to_string(), Value::from(self.kind().as_str()));
        record
    }

    /// Build a shape from a record. Missing style fields take their defaults
    /// and unknown fields are ignored. The result is not interactive.
    pub fn from_record(record: &ShapeRecord) -> Result<Shape, ShapeError> {
        match record.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => {}
            _ => return Err(ShapeError::MissingId),
        }
        let kind = record
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ShapeError::MissingKind)?;
        if ShapeKind::from_wire(kind).is_none() {
            return Err(ShapeError::UnknownKind(kind.to_string()));
        }
        Ok(serde_json::from_value(Value::Object(record.clone()))?)
    }

    /// Apply the fields present in `patch`, leaving the rest untouched.
    ///
    /// `id` and `type` are never changed. If any field has an invalid value
    /// the whole patch is rejected and the shape is left as it was.
    pub fn apply_patch(&mut self, patch: &ShapeRecord) -> Result<(), ShapeError> {
        let mut merged = self.to_record();
        for (key, value) in patch {
            match key.as_str() {
                "id" => {}
                "type" => {
                    if value.as_str() != Some(self.kind().as_str()) {
                        log::warn!(
                            "ignoring type change {value} on shape {} ({})",
                            self.id,
                            self.kind().as_str()
                        );
                    }
                }
                _ => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }

        let mut updated: Shape = serde_json::from_value(Value::Object(merged))?;
        updated.interactive = self.interactive;
        *self = updated;
        Ok(())
    }
}

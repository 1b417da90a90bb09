// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Data minimization for resource documents
//!
//! Every document leaves the process through `clean`, which applies three
//! rules in a fixed order:
//!
//! 1. Metadata reduction: keep `name`, `namespace`, `labels` and the
//!    annotations that are not cluster bookkeeping
//! 2. Secret redaction: for credential-bearing kinds, replace every value of
//!    the data-bearing fields with `"REDACTED"`, keeping the keys
//! 3. Value truncation: cut every string longer than 256 characters, at any
//!    depth, and append a marker with the original length
//!
//! Redaction runs before truncation so a truncated prefix of a secret can
//! never be emitted. Cleaning never fails: fields of the wrong shape are
//! dropped rather than reported.

use serde_json::{Map, Value};

/// Replacement for every redacted value
pub const REDACTED: &str = "REDACTED";

/// Longest string value (in characters) returned unchanged
pub const MAX_VALUE_LEN: usize = 256;

/// Metadata fields copied through unchanged
const KEPT_METADATA_FIELDS: &[&str] = &["name", "namespace", "labels"];

/// Annotation key prefixes written by controllers and tooling
const BOOKKEEPING_ANNOTATION_PREFIXES: &[&str] = &[
    "kubectl.kubernetes.io/",
    "kubernetes.io/",
    "deployment.kubernetes.io/",
    "pod-template-generation",
    "autoscaling.",
    "control-plane.",
    "deployment.",
    "job.",
    "batch.",
    "meta.helm.sh/",
    "helm.sh/",
];

/// kubectl apply stores the whole submitted object here, secret data included
const LAST_APPLIED_SUFFIX: &str = "/last-applied-configuration";

/// Kinds whose payload fields carry credentials
const CREDENTIAL_KINDS: &[(&str, &[&str])] = &[("Secret", &["data", "stringData"])];

/// Clean a raw document of the given kind
pub fn clean(raw: Value, kind: &str) -> Value {
    let Value::Object(mut document) = raw else {
        return Value::Object(Map::new());
    };

    reduce_metadata(&mut document);
    redact_credentials(&mut document, kind);
    truncate_deep(Value::Object(document))
}

/// Whether an annotation is useful to a reader rather than internal state
pub fn is_useful_annotation(key: &str) -> bool {
    !(key.ends_with(LAST_APPLIED_SUFFIX)
        || BOOKKEEPING_ANNOTATION_PREFIXES
            .iter()
            .any(|prefix| key.starts_with(prefix)))
}

/// Data-bearing fields of a credential kind, if `kind` is one
pub fn credential_fields(kind: &str) -> Option<&'static [&'static str]> {
    CREDENTIAL_KINDS
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(kind))
        .map(|(_, fields)| *fields)
}

fn reduce_metadata(document: &mut Map<String, Value>) {
    let Some(metadata) = document.remove("metadata") else {
        return;
    };
    let Value::Object(mut original) = metadata else {
        return;
    };

    let mut reduced = Map::new();
    for field in KEPT_METADATA_FIELDS {
        if let Some(value) = original.remove(*field) {
            reduced.insert(field.to_string(), value);
        }
    }

    if let Some(Value::Object(annotations)) = original.remove("annotations") {
        let kept: Map<String, Value> = annotations
            .into_iter()
            .filter(|(key, _)| is_useful_annotation(key))
            .collect();
        if !kept.is_empty() {
            reduced.insert("annotations".to_string(), Value::Object(kept));
        }
    }

    document.insert("metadata".to_string(), Value::Object(reduced));
}

fn redact_credentials(document: &mut Map<String, Value>, kind: &str) {
    let Some(fields) = credential_fields(kind) else {
        return;
    };

    for field in fields {
        match document.get_mut(*field) {
            Some(Value::Object(entries)) => {
                for value in entries.values_mut() {
                    *value = Value::String(REDACTED.to_string());
                }
            }
            Some(Value::Null) | None => {}
            // Unexpected shape: hide all of it
            Some(other) => *other = Value::String(REDACTED.to_string()),
        }
    }
}

/// Truncate every over-long string in a nested value
pub fn truncate_deep(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(truncate(s)),
        Value::Array(items) => Value::Array(items.into_iter().map(truncate_deep).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, truncate_deep(value)))
                .collect(),
        ),
        other => other,
    }
}

fn truncate(s: String) -> String {
    let length = s.chars().count();
    if length <= MAX_VALUE_LEN {
        return s;
    }
    let prefix: String = s.chars().take(MAX_VALUE_LEN).collect();
    format!("{}... [truncated, original length: {}]", prefix, length)
}

// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Deferred values produced by one resource and consumed by another.
//!
//! An [`Output`] is either known or unknown. Transformations run through
//! [`Output::apply`] / [`Output::try_apply`] so that an unknown upstream
//! value can never be turned into a placeholder downstream: reading it with
//! [`Output::require`] fails with [`StackError::Unresolved`].

use crate::shared::error::{Result, StackError};
use serde::Serialize;
use std::collections::BTreeSet;

/// Rendered in plan inputs wherever a value is not known yet.
pub const UNKNOWN: &str = "<computed>";

#[derive(Debug, Clone, PartialEq)]
pub struct Output<T> {
    value: Option<T>,
    dependencies: BTreeSet<String>,
}

impl<T> Output<T> {
    pub fn known(value: T) -> Self {
        Self {
            value: Some(value),
            dependencies: BTreeSet::new(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            value: None,
            dependencies: BTreeSet::new(),
        }
    }

    pub fn from_option(value: Option<T>) -> Self {
        Self {
            value,
            dependencies: BTreeSet::new(),
        }
    }

    pub fn with_dependency(mut self, resource: impl Into<String>) -> Self {
        self.dependencies.insert(resource.into());
        self
    }

    pub fn is_known(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// Derives a new output from this one. Unknown stays unknown.
    pub fn apply<U, F>(self, f: F) -> Output<U>
    where
        F: FnOnce(T) -> U,
    {
        Output {
            value: self.value.map(f),
            dependencies: self.dependencies,
        }
    }

    /// Like [`Output::apply`] but for transformations that can fail, such as
    /// decoding a credential payload.
    pub fn try_apply<U, F>(self, f: F) -> Result<Output<U>>
    where
        F: FnOnce(T) -> Result<U>,
    {
        let value = match self.value {
            Some(v) => Some(f(v)?),
            None => None,
        };
        Ok(Output {
            value,
            dependencies: self.dependencies,
        })
    }

    pub fn zip<U>(self, other: Output<U>) -> Output<(T, U)> {
        let mut dependencies = self.dependencies;
        dependencies.extend(other.dependencies);
        let value = match (self.value, other.value) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        };
        Output {
            value,
            dependencies,
        }
    }

    /// Returns the value, or an unresolved-dependency error naming the
    /// resource and field the caller was waiting on.
    pub fn require(&self, resource: &str, field: &str) -> Result<&T> {
        self.value
            .as_ref()
            .ok_or_else(|| StackError::unresolved(resource, field))
    }

    pub fn into_required(self, resource: &str, field: &str) -> Result<T> {
        self.value
            .ok_or_else(|| StackError::unresolved(resource, field))
    }
}

impl<T: Serialize> Output<T> {
    /// JSON form used in declared inputs.
    pub fn to_input(&self) -> serde_json::Value {
        match &self.value {
            Some(v) => serde_json::to_value(v)
                .unwrap_or_else(|_| serde_json::Value::String(UNKNOWN.to_string())),
            None => serde_json::Value::String(UNKNOWN.to_string()),
        }
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Output<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "{}", UNKNOWN),
        }
    }
}

/// True when any leaf of `value` is the unknown marker.
pub fn contains_unknown(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(s) => s == UNKNOWN,
        serde_json::Value::Array(items) => items.iter().any(contains_unknown),
        serde_json::Value::Object(map) => map.values().any(contains_unknown),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_unknown() {
        let out: Output<String> = Output::unknown().with_dependency("cluster");
        let derived = out.apply(|s| s.len());
        assert!(!derived.is_known());
        assert!(derived.dependencies().contains("cluster"));
    }

    #[test]
    fn test_try_apply_propagates_error() {
        let out = Output::known("bad".to_string());
        let result: Result<Output<String>> =
            out.try_apply(|_| Err(StackError::CredentialDecode("boom".to_string())));
        assert!(matches!(result, Err(StackError::CredentialDecode(_))));
    }

    #[test]
    fn test_require_unknown_is_unresolved() {
        let out: Output<String> = Output::unknown();
        let err = out.require("api-ingress", "loadBalancerIp").unwrap_err();
        assert!(matches!(err, StackError::Unresolved { .. }));
        assert!(err.to_string().contains("loadBalancerIp"));
    }

    #[test]
    fn test_zip_merges_dependencies() {
        let a = Output::known(1).with_dependency("a");
        let b: Output<i32> = Output::unknown().with_dependency("b");
        let zipped = a.zip(b);
        assert!(!zipped.is_known());
        assert_eq!(zipped.dependencies().len(), 2);
    }

    #[test]
    fn test_to_input_renders_marker() {
        let out: Output<String> = Output::unknown();
        assert_eq!(out.to_input(), serde_json::json!(UNKNOWN));
        assert!(contains_unknown(&serde_json::json!({"a": [UNKNOWN]})));
        assert_eq!(Output::known(3).to_input(), serde_json::json!(3));
    }
}

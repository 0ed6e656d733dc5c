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

use thiserror::Error;
pub type Result<T> = std::result::Result<T, StackError>;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("Kubernetes API error: {0}")]
    Kube(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Declaration error: {0}")]
    Declaration(String),

    #[error("Resource not found: {resource_type} '{name}' in '{scope}'")]
    NotFound {
        resource_type: String,
        name: String,
        scope: String,
    },

    #[error("Stack '{stack}' does not export an output named '{output}'")]
    MissingOutput { stack: String, output: String },

    #[error("Unresolved dependency: '{field}' of '{resource}' is not available yet")]
    Unresolved { resource: String, field: String },

    #[error("Failed to decode cluster credentials: {0}")]
    CredentialDecode(String),

    #[error("Invalid kubeconfig: {0}")]
    InvalidKubeconfig(String),

    #[error("Provisioning of '{resource}' failed: {message}")]
    Provisioning { resource: String, message: String },

    #[error("{service} API returned {status}: {message}")]
    Api {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Stack '{0}' is locked by another operation")]
    StateLocked(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<kube::Error> for StackError {
    fn from(err: kube::Error) -> Self {
        StackError::Kube(err.to_string())
    }
}

impl StackError {
    pub fn config_error(context: impl Into<String>) -> Self {
        Self::ConfigError(context.into())
    }

    pub fn declaration(context: impl Into<String>) -> Self {
        Self::Declaration(context.into())
    }

    pub fn not_found(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
            scope: scope.into(),
        }
    }

    pub fn unresolved(resource: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Unresolved {
            resource: resource.into(),
            field: field.into(),
        }
    }

    pub fn provisioning(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provisioning {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Errors raised before any cloud call was made.
    pub fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_)
                | Self::Declaration(_)
                | Self::MissingOutput { .. }
                | Self::ValidationError(_)
        )
    }
}

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

use crate::shared::error::StackError;
use regex::Regex;
use std::sync::OnceLock;

/// `organization/project/stack`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackIdentifier {
    pub organization: String,
    pub project: String,
    pub stack: String,
}

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,99}$").expect("stack segment pattern is valid")
    })
}

impl StackIdentifier {
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        stack: impl Into<String>,
    ) -> Result<Self, StackError> {
        let id = Self {
            organization: organization.into(),
            project: project.into(),
            stack: stack.into(),
        };
        for (what, value) in [
            ("organization", &id.organization),
            ("project", &id.project),
            ("stack", &id.stack),
        ] {
            if !segment_pattern().is_match(value) {
                return Err(StackError::config_error(format!(
                    "Invalid {} name '{}' in stack identifier",
                    what, value
                )));
            }
        }
        Ok(id)
    }
}

impl std::str::FromStr for StackIdentifier {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [org, project, stack] => Self::new(*org, *project, *stack),
            _ => Err(StackError::config_error(format!(
                "Invalid stack identifier '{}'. Expected 'organization/project/stack'",
                s
            ))),
        }
    }
}

impl std::fmt::Display for StackIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.organization, self.project, self.stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifier() {
        let id: StackIdentifier = "wijayasena/cluster-general/dev".parse().unwrap();
        assert_eq!(id.organization, "wijayasena");
        assert_eq!(id.project, "cluster-general");
        assert_eq!(id.stack, "dev");
        assert_eq!(id.to_string(), "wijayasena/cluster-general/dev");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("cluster-general/dev".parse::<StackIdentifier>().is_err());
        assert!("a/b/c/d".parse::<StackIdentifier>().is_err());
        assert!("org//dev".parse::<StackIdentifier>().is_err());
        assert!("org/pro ject/dev".parse::<StackIdentifier>().is_err());
    }
}

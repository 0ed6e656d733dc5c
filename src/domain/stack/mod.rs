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

//! Stack identity, cross-stack references and apply bookkeeping

pub mod context;
pub mod identifier;
pub mod reference;

pub use self::context::{ApplyContext, ApplyResult, ApplySummary};
pub use self::identifier::StackIdentifier;
pub use self::reference::StackReference;

use crate::infrastructure::azure::AzureApi;
use crate::infrastructure::cloudflare::DnsApi;
use crate::infrastructure::kubernetes::ClusterConnector;
use crate::infrastructure::ssh::KeyPairGenerator;
use crate::infrastructure::state::StateBackend;
use std::sync::Arc;

/// External collaborators a stack talks to. Passed explicitly to every
/// operation instead of living in globals.
#[derive(Clone)]
pub struct Providers {
    pub azure: Arc<dyn AzureApi>,
    pub dns: Arc<dyn DnsApi>,
    pub clusters: Arc<dyn ClusterConnector>,
    pub keys: Arc<dyn KeyPairGenerator>,
    pub state: Arc<dyn StateBackend>,
}

//! Provides side of the integration endpoint
//!
//! Flags managed here:
//!
//! - `endpoint.<name>.changed` / `endpoint.<name>.departed`: set by the host
//!   when relation data changes or a unit leaves; cleared by the reactions.
//! - `endpoint.<name>.requested`: set while at least one new or updated
//!   request is waiting for the integrator charm. The charm iterates
//!   [`IntegrationProvides::requests`], satisfies each one, and calls
//!   [`IntegrationProvides::mark_completed`].

use crate::error::Result;
use crate::flags::FlagStore;
use crate::relation::RelationTransport;
use crate::request::{IntegrationRequest, RequestStatus};
use crate::store::KeyValueStore;
use aws_integration_config::IntegrationConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const CHANGED_FLAG: &str = "changed";
pub const DEPARTED_FLAG: &str = "departed";
pub const REQUESTED_FLAG: &str = "requested";

/// Reaction run by [`IntegrationProvides::dispatch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    CheckRequests,
    Cleanup,
}

/// Instance reported by a joined unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInstance {
    #[serde(rename = "instance-id")]
    pub instance_id: Option<String>,
    pub region: Option<String>,
}

/// The endpoint, bound to the host's transport, store and flags for the
/// duration of one dispatch.
pub struct IntegrationProvides<'a> {
    endpoint_name: String,
    transport: &'a mut dyn RelationTransport,
    kv: &'a mut dyn KeyValueStore,
    flags: &'a mut dyn FlagStore,
}

impl<'a> IntegrationProvides<'a> {
    pub fn new(
        endpoint_name: impl Into<String>,
        transport: &'a mut dyn RelationTransport,
        kv: &'a mut dyn KeyValueStore,
        flags: &'a mut dyn FlagStore,
    ) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            transport,
            kv,
            flags,
        }
    }

    /// Bind the endpoint named in the configuration
    pub fn from_config(
        config: &IntegrationConfig,
        transport: &'a mut dyn RelationTransport,
        kv: &'a mut dyn KeyValueStore,
        flags: &'a mut dyn FlagStore,
    ) -> Self {
        Self::new(config.endpoint_name.clone(), transport, kv, flags)
    }

    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    /// Full flag name for this endpoint (e.g. "requested" → "endpoint.aws.requested")
    pub fn expand_name(&self, flag: &str) -> String {
        format!("endpoint.{}.{}", self.endpoint_name, flag)
    }

    /// Runs each reaction whose trigger flag is set, at most once each.
    pub fn dispatch(&mut self) -> Result<Vec<Reaction>> {
        let mut ran = Vec::new();
        if self.flags.is_set(&self.expand_name(CHANGED_FLAG))? {
            self.check_requests()?;
            ran.push(Reaction::CheckRequests);
        }
        if self.flags.is_set(&self.expand_name(DEPARTED_FLAG))? {
            self.cleanup()?;
            ran.push(Reaction::Cleanup);
        }
        Ok(ran)
    }

    /// Reaction to `endpoint.<name>.changed`.
    ///
    /// Raises `requested` when any request changed. Requests already
    /// acknowledged in the store but missing from the published completion
    /// map are re-published here; they do not raise `requested`.
    pub fn check_requests(&mut self) -> Result<()> {
        let mut unfulfilled_requests = false;
        for request in self.all_requests()? {
            if request.changed(&*self.kv)? {
                tracing::info!(
                    "Marking request for processing for {} from {}",
                    request.unit_name(),
                    request.instance_id().unwrap_or_default()
                );
                unfulfilled_requests = true;
            } else if !request.is_completed(&*self.transport)?
                && request.completed_for_instance(&*self.kv)?
            {
                request.mark_completed(&mut *self.kv, &mut *self.transport)?;
                tracing::info!(
                    "Marking request as completed for {} from {}",
                    request.unit_name(),
                    request.instance_id().unwrap_or_default()
                );
            }
        }

        let requested = self.expand_name(REQUESTED_FLAG);
        tracing::debug!("Toggling {} to {}", requested, unfulfilled_requests);
        self.flags.toggle(&requested, unfulfilled_requests)?;
        self.flags.clear(&self.expand_name(CHANGED_FLAG))?;
        Ok(())
    }

    /// Reaction to `endpoint.<name>.departed`: forgets the acknowledgements
    /// of departed units so a returning instance is treated as new.
    pub fn cleanup(&mut self) -> Result<()> {
        for unit in self.transport.departed_units()? {
            let unit_name = unit.unit_name.clone();
            let request = IntegrationRequest::new(self.endpoint_name.clone(), unit)?;
            tracing::debug!("Clearing request state for departed unit {}", unit_name);
            request.clear(&mut *self.kv)?;
        }
        self.transport.clear_departed_units()?;
        self.flags.clear(&self.expand_name(DEPARTED_FLAG))?;
        Ok(())
    }

    /// New or updated requests that have been made
    pub fn requests(&self) -> Result<Vec<IntegrationRequest>> {
        let mut changed = Vec::new();
        for request in self.all_requests()? {
            if request.changed(&*self.kv)? {
                changed.push(request);
            }
        }
        Ok(changed)
    }

    /// All requests that have been made, even if unchanged
    pub fn all_requests(&self) -> Result<Vec<IntegrationRequest>> {
        self.transport
            .joined_units()?
            .into_iter()
            .map(|unit| IntegrationRequest::new(self.endpoint_name.clone(), unit))
            .collect()
    }

    /// Names of all applications that are still joined
    pub fn application_names(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .transport
            .joined_units()?
            .into_iter()
            .map(|unit| unit.application_name)
            .collect())
    }

    /// Unit names to instance IDs and regions for all joined units
    pub fn unit_instances(&self) -> Result<BTreeMap<String, UnitInstance>> {
        Ok(self
            .all_requests()?
            .into_iter()
            .map(|request| {
                let instance = UnitInstance {
                    instance_id: request.instance_id(),
                    region: request.region(),
                };
                (request.unit_name().to_string(), instance)
            })
            .collect())
    }

    pub fn mark_completed(&mut self, request: &IntegrationRequest) -> Result<()> {
        request.mark_completed(&mut *self.kv, &mut *self.transport)
    }

    pub fn is_changed(&self, request: &IntegrationRequest) -> Result<bool> {
        request.changed(&*self.kv)
    }

    pub fn is_completed(&self, request: &IntegrationRequest) -> Result<bool> {
        request.is_completed(&*self.transport)
    }

    pub fn status(&self, request: &IntegrationRequest) -> Result<RequestStatus> {
        request.status(&*self.kv, &*self.transport)
    }
}

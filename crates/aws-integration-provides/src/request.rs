//! A single remote unit's integration request

use crate::error::Result;
use crate::hash::content_hash;
use crate::relation::{RelationTransport, RemoteUnit};
use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Outgoing relation key carrying the instance id → hash acknowledgements
pub const COMPLETED_KEY: &str = "completed";

/// Cloud capability a unit can ask for with an `enable-*` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    InstanceInspection,
    AcmReadonly,
    AcmFullaccess,
    NetworkManagement,
    LoadBalancerManagement,
    BlockStorageManagement,
    DnsManagement,
    ObjectStorageAccess,
    ObjectStorageManagement,
    SesReadonly,
    SesFullaccess,
    SnsReadonly,
    SnsFullaccess,
    MobiletargetingReadonly,
    MobiletargetingFullaccess,
    SmsVoiceReadonly,
    SmsVoiceFullaccess,
}

impl Capability {
    pub const ALL: [Capability; 17] = [
        Capability::InstanceInspection,
        Capability::AcmReadonly,
        Capability::AcmFullaccess,
        Capability::NetworkManagement,
        Capability::LoadBalancerManagement,
        Capability::BlockStorageManagement,
        Capability::DnsManagement,
        Capability::ObjectStorageAccess,
        Capability::ObjectStorageManagement,
        Capability::SesReadonly,
        Capability::SesFullaccess,
        Capability::SnsReadonly,
        Capability::SnsFullaccess,
        Capability::MobiletargetingReadonly,
        Capability::MobiletargetingFullaccess,
        Capability::SmsVoiceReadonly,
        Capability::SmsVoiceFullaccess,
    ];

    /// Relation key the requiring side sets to ask for this capability
    pub fn key(&self) -> &'static str {
        match self {
            Capability::InstanceInspection => "enable-instance-inspection",
            Capability::AcmReadonly => "enable-acm-readonly",
            Capability::AcmFullaccess => "enable-acm-fullaccess",
            Capability::NetworkManagement => "enable-network-management",
            Capability::LoadBalancerManagement => "enable-load-balancer-management",
            Capability::BlockStorageManagement => "enable-block-storage-management",
            Capability::DnsManagement => "enable-dns-management",
            Capability::ObjectStorageAccess => "enable-object-storage-access",
            Capability::ObjectStorageManagement => "enable-object-storage-management",
            Capability::SesReadonly => "enable-ses-readonly",
            Capability::SesFullaccess => "enable-ses-fullaccess",
            Capability::SnsReadonly => "enable-sns-readonly",
            Capability::SnsFullaccess => "enable-sns-fullaccess",
            Capability::MobiletargetingReadonly => "enable-mobiletargeting-readonly",
            Capability::MobiletargetingFullaccess => "enable-mobiletargeting-fullaccess",
            Capability::SmsVoiceReadonly => "enable-sms-voice-readonly",
            Capability::SmsVoiceFullaccess => "enable-sms-voice-fullaccess",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key().trim_start_matches("enable-"))
    }
}

/// Where a request stands relative to the local and published acknowledgements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// `instance-id` or `requested` is missing; nothing to process yet
    Incomplete,
    /// Never acknowledged
    New,
    /// Acknowledged before, but the data changed since
    Pending,
    /// Local acknowledgement is current, the published one is not
    AckedLocal,
    /// Both acknowledgements are current
    AckedRemote,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Incomplete => write!(f, "incomplete"),
            RequestStatus::New => write!(f, "new"),
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::AckedLocal => write!(f, "acked-local"),
            RequestStatus::AckedRemote => write!(f, "acked-remote"),
        }
    }
}

/// A request for integration from a single remote unit.
///
/// This is a snapshot: the hash is computed once, at construction, over
/// everything the unit had sent at that point.
#[derive(Debug, Clone)]
pub struct IntegrationRequest {
    endpoint_name: String,
    unit: RemoteUnit,
    hash: String,
}

impl IntegrationRequest {
    pub fn new(endpoint_name: impl Into<String>, unit: RemoteUnit) -> Result<Self> {
        let hash = content_hash(&unit.received)?;
        Ok(Self {
            endpoint_name: endpoint_name.into(),
            unit,
            hash,
        })
    }

    /// SHA-256 hash of the data for this request
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Store key of this request's acknowledgement, if it has an instance id
    pub fn hash_key(&self) -> Option<String> {
        self.instance_id()
            .map(|id| format!("{}.request.{}", self.endpoint_name, id))
    }

    fn is_actionable(&self) -> bool {
        self.instance_id().is_some() && self.requested()
    }

    fn saved_hash(&self, kv: &dyn KeyValueStore) -> Result<Option<String>> {
        match self.hash_key() {
            Some(key) => kv.get(&key),
            None => Ok(None),
        }
    }

    /// Whether this request has changed since it was last marked completed
    pub fn changed(&self, kv: &dyn KeyValueStore) -> Result<bool> {
        if !self.is_actionable() {
            return Ok(false);
        }
        Ok(self.saved_hash(kv)?.as_deref() != Some(self.hash.as_str()))
    }

    /// Whether the local store already acknowledges this exact data
    pub fn completed_for_instance(&self, kv: &dyn KeyValueStore) -> Result<bool> {
        if !self.is_actionable() {
            return Ok(false);
        }
        Ok(self.saved_hash(kv)?.as_deref() == Some(self.hash.as_str()))
    }

    /// Whether the published completion map carries this data's hash
    pub fn is_completed(&self, transport: &dyn RelationTransport) -> Result<bool> {
        let Some(instance_id) = self.instance_id() else {
            return Ok(false);
        };
        let completed = transport.published(&self.unit.relation_id, COMPLETED_KEY)?;
        Ok(completed
            .as_ref()
            .and_then(|c| c.get(&instance_id))
            .and_then(Value::as_str)
            == Some(self.hash.as_str()))
    }

    pub fn status(
        &self,
        kv: &dyn KeyValueStore,
        transport: &dyn RelationTransport,
    ) -> Result<RequestStatus> {
        if !self.is_actionable() {
            return Ok(RequestStatus::Incomplete);
        }
        let status = match self.saved_hash(kv)? {
            None => RequestStatus::New,
            Some(saved) if saved != self.hash => RequestStatus::Pending,
            Some(_) => {
                if self.is_completed(transport)? {
                    RequestStatus::AckedRemote
                } else {
                    RequestStatus::AckedLocal
                }
            }
        };
        Ok(status)
    }

    /// Mark this request as having been completed.
    ///
    /// Records the hash locally and publishes it under `completed`.
    pub fn mark_completed(
        &self,
        kv: &mut dyn KeyValueStore,
        transport: &mut dyn RelationTransport,
    ) -> Result<()> {
        let (Some(instance_id), Some(key)) = (self.instance_id(), self.hash_key()) else {
            tracing::warn!(
                "Not marking request from {} completed: no instance-id",
                self.unit.unit_name
            );
            return Ok(());
        };

        let mut completed = match transport.published(&self.unit.relation_id, COMPLETED_KEY)? {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        completed.insert(instance_id, Value::String(self.hash.clone()));
        kv.set(&key, &self.hash)?;
        transport.publish(
            &self.unit.relation_id,
            COMPLETED_KEY,
            Value::Object(completed),
        )?;
        Ok(())
    }

    /// Clear this request's cached acknowledgement
    pub fn clear(&self, kv: &mut dyn KeyValueStore) -> Result<()> {
        if let Some(key) = self.hash_key() {
            kv.unset(&key)?;
        }
        Ok(())
    }

    /// The name of the unit making the request
    pub fn unit_name(&self) -> &str {
        &self.unit.unit_name
    }

    /// The name of the application making the request
    pub fn application_name(&self) -> &str {
        &self.unit.application_name
    }

    pub fn relation_id(&self) -> &str {
        &self.unit.relation_id
    }

    fn received(&self, key: &str) -> Option<&Value> {
        self.unit.received.get(key)
    }

    /// Text of a scalar field. Numbers are rendered as text; falsy values
    /// and containers read as absent.
    fn string(&self, key: &str) -> Option<String> {
        match self.received(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(n.to_string()),
            _ => None,
        }
    }

    fn flag(&self, key: &str) -> bool {
        self.received(key).is_some_and(truthy)
    }

    fn tags(&self, key: &str) -> BTreeMap<String, Option<String>> {
        match self.received(key) {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| (name.clone(), tag_value(value)))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    fn patterns(&self, key: &str) -> Vec<String> {
        match self.received(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn requested(&self) -> bool {
        self.flag("requested")
    }

    /// The instance ID reported for this request
    pub fn instance_id(&self) -> Option<String> {
        self.string("instance-id")
    }

    /// The region reported for this request
    pub fn region(&self) -> Option<String> {
        self.string("region")
    }

    /// Tag names to values (or `None`) to apply to this instance
    pub fn instance_tags(&self) -> BTreeMap<String, Option<String>> {
        self.tags("instance-tags")
    }

    /// Tags for the instance's machine-specific security group
    pub fn instance_security_group_tags(&self) -> BTreeMap<String, Option<String>> {
        self.tags("instance-security-group-tags")
    }

    /// Tags for the instance's subnet
    pub fn instance_subnet_tags(&self) -> BTreeMap<String, Option<String>> {
        self.tags("instance-subnet-tags")
    }

    /// Patterns to which to restrict object storage access
    pub fn object_storage_access_patterns(&self) -> Vec<String> {
        self.patterns("object-storage-access-patterns")
    }

    /// Patterns to which to restrict object storage management
    pub fn object_storage_management_patterns(&self) -> Vec<String> {
        self.patterns("object-storage-management-patterns")
    }

    pub fn requested_capability(&self, capability: Capability) -> bool {
        self.flag(capability.key())
    }

    /// Every capability this request enables
    pub fn requested_capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.requested_capability(*c))
            .collect()
    }

    pub fn requested_instance_inspection(&self) -> bool {
        self.requested_capability(Capability::InstanceInspection)
    }

    pub fn requested_acm_readonly(&self) -> bool {
        self.requested_capability(Capability::AcmReadonly)
    }

    pub fn requested_acm_fullaccess(&self) -> bool {
        self.requested_capability(Capability::AcmFullaccess)
    }

    /// Firewalls, subnets and the like
    pub fn requested_network_management(&self) -> bool {
        self.requested_capability(Capability::NetworkManagement)
    }

    pub fn requested_load_balancer_management(&self) -> bool {
        self.requested_capability(Capability::LoadBalancerManagement)
    }

    pub fn requested_block_storage_management(&self) -> bool {
        self.requested_capability(Capability::BlockStorageManagement)
    }

    pub fn requested_dns_management(&self) -> bool {
        self.requested_capability(Capability::DnsManagement)
    }

    pub fn requested_object_storage_access(&self) -> bool {
        self.requested_capability(Capability::ObjectStorageAccess)
    }

    pub fn requested_object_storage_management(&self) -> bool {
        self.requested_capability(Capability::ObjectStorageManagement)
    }

    pub fn requested_ses_readonly(&self) -> bool {
        self.requested_capability(Capability::SesReadonly)
    }

    pub fn requested_ses_fullaccess(&self) -> bool {
        self.requested_capability(Capability::SesFullaccess)
    }

    pub fn requested_sns_readonly(&self) -> bool {
        self.requested_capability(Capability::SnsReadonly)
    }

    pub fn requested_sns_fullaccess(&self) -> bool {
        self.requested_capability(Capability::SnsFullaccess)
    }

    /// Pinpoint mobile targeting, read only
    pub fn requested_mobiletargeting_readonly(&self) -> bool {
        self.requested_capability(Capability::MobiletargetingReadonly)
    }

    pub fn requested_mobiletargeting_fullaccess(&self) -> bool {
        self.requested_capability(Capability::MobiletargetingFullaccess)
    }

    /// Pinpoint SMS and voice, read only
    pub fn requested_sms_voice_readonly(&self) -> bool {
        self.requested_capability(Capability::SmsVoiceReadonly)
    }

    pub fn requested_sms_voice_fullaccess(&self) -> bool {
        self.requested_capability(Capability::SmsVoiceFullaccess)
    }
}

/// Truthiness of a relation value: null, false, zero and empty values are false
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn tag_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

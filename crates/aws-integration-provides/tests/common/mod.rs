use aws_integration_provides::{
    FlagStore, IntegrationProvides, KeyValueStore, MemoryFlags, MemoryStore, MemoryTransport,
    RemoteUnit,
};
use serde_json::Value;

pub const ENDPOINT: &str = "aws";
pub const RELATION: &str = "aws:0";

/// Host-side state of one charm: relation bus, unit data store and flags
pub struct TestHost<K: KeyValueStore = MemoryStore> {
    pub transport: MemoryTransport,
    pub kv: K,
    pub flags: MemoryFlags,
}

impl TestHost<MemoryStore> {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl<K: KeyValueStore> TestHost<K> {
    pub fn with_store(kv: K) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Self {
            transport: MemoryTransport::new(),
            kv,
            flags: MemoryFlags::new(),
        }
    }

    pub fn endpoint(&mut self) -> IntegrationProvides<'_> {
        IntegrationProvides::new(ENDPOINT, &mut self.transport, &mut self.kv, &mut self.flags)
    }

    /// Unit joins or updates its data, as a relation-changed hook would
    pub fn relation_changed(&mut self, unit_name: &str, received: Value) {
        let received = received.as_object().cloned().unwrap();
        if !self.transport.update(RELATION, unit_name, received.clone()) {
            self.transport
                .join(RemoteUnit::new(RELATION, unit_name, received));
        }
        self.flags.set("endpoint.aws.changed").unwrap();
    }

    /// Unit leaves, as a relation-departed hook would
    pub fn relation_departed(&mut self, unit_name: &str) {
        self.transport.depart(RELATION, unit_name).unwrap();
        self.flags.set("endpoint.aws.departed").unwrap();
    }

    pub fn is_set(&self, flag: &str) -> bool {
        self.flags.is_set(flag).unwrap()
    }

    #[allow(dead_code)]
    pub fn completed(&self, instance_id: &str) -> Option<String> {
        self.transport
            .published_data(RELATION)
            .and_then(|data| data.get("completed"))
            .and_then(|completed| completed.get(instance_id))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

//! Reactive flags shared with the host dispatcher

use crate::error::Result;
use std::collections::BTreeSet;

/// Named boolean triggers consumed by the host dispatcher
pub trait FlagStore {
    fn is_set(&self, flag: &str) -> Result<bool>;

    fn set(&mut self, flag: &str) -> Result<()>;

    fn clear(&mut self, flag: &str) -> Result<()>;

    /// Set the flag when `value` is true, clear it otherwise
    fn toggle(&mut self, flag: &str, value: bool) -> Result<()> {
        if value { self.set(flag) } else { self.clear(flag) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFlags {
    active: BTreeSet<String>,
}

impl MemoryFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(String::as_str)
    }
}

impl FlagStore for MemoryFlags {
    fn is_set(&self, flag: &str) -> Result<bool> {
        Ok(self.active.contains(flag))
    }

    fn set(&mut self, flag: &str) -> Result<()> {
        self.active.insert(flag.to_string());
        Ok(())
    }

    fn clear(&mut self, flag: &str) -> Result<()> {
        self.active.remove(flag);
        Ok(())
    }
}

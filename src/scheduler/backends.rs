//! The configured backend list.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("backend set must not be empty")]
pub struct EmptyBackendSet;

/// Ordered, non-empty, immutable list of backend addresses.
///
/// Cloning is cheap; every connection handler shares the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSet {
    addrs: Arc<[String]>,
}

impl BackendSet {
    pub fn new(addrs: Vec<String>) -> Result<Self, EmptyBackendSet> {
        if addrs.is_empty() {
            return Err(EmptyBackendSet);
        }
        Ok(Self {
            addrs: addrs.into(),
        })
    }

    /// Backend at `value mod len`. Never panics since the set is non-empty.
    pub fn pick(&self, value: u64) -> &str {
        let index = (value % self.addrs.len() as u64) as usize;
        &self.addrs[index]
    }
}

impl Deref for BackendSet {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.addrs
    }
}

impl fmt::Display for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.addrs.join(", "))
    }
}

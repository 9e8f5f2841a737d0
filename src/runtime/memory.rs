use std::collections::HashMap;

use tracing::warn;

use super::Storage;
use crate::types::ActorError;
use crate::utils::encoding::Cid;

/// Block store kept entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    blocks: HashMap<Cid, Vec<u8>>,
    head: Option<Cid>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Replaces the head without the stale-head check. Used to roll back a
    /// failed message.
    pub fn reset_head(&mut self, head: Option<Cid>) {
        self.head = head;
    }
}

impl Storage for MemoryStorage {
    fn head(&self) -> Option<Cid> {
        self.head
    }

    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>, ActorError> {
        Ok(self.blocks.get(cid).cloned())
    }

    fn put(&mut self, data: Vec<u8>) -> Result<Cid, ActorError> {
        let cid = Cid::of(&data);
        self.blocks.entry(cid).or_insert(data);
        Ok(cid)
    }

    fn commit(&mut self, new: Cid, old: Option<Cid>) -> Result<(), ActorError> {
        if self.head != old {
            warn!(head = ?self.head, expected = ?old, "refusing commit over stale head");
            return Err(ActorError::fault("stale head"));
        }
        if !self.blocks.contains_key(&new) {
            return Err(ActorError::fault(format!("dangling head {}", new)));
        }
        self.head = Some(new);
        Ok(())
    }
}

use std::collections::BTreeMap;

use ethers::types::Address;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::runtime::{Runtime, Storage};
use crate::types::{ActorError, ChannelId, PaymentBrokerError, PaymentChannel};
use crate::utils::encoding::{marshal, unmarshal, Cid};

/// String-keyed collection persisted as a single content-addressed block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lookup<V> {
    entries: BTreeMap<String, V>,
}

impl<V> Default for Lookup<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V: Serialize + DeserializeOwned> Lookup<V> {
    /// Loads the lookup rooted at `root`. No root means an empty lookup.
    pub fn load<S: Storage + ?Sized>(storage: &S, root: Option<Cid>) -> Result<Self, ActorError> {
        let root = match root {
            Some(root) => root,
            None => return Ok(Self::default()),
        };
        let bytes = storage
            .get(&root)?
            .ok_or_else(|| ActorError::fault(format!("lookup block {} not found", root)))?;
        let entries = unmarshal(&bytes).map_err(|e| e.wrap_fault("could not load lookup"))?;
        Ok(Self { entries })
    }

    pub fn find(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value);
    }

    pub fn delete(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn values(&self) -> impl Iterator<Item = (&String, &V)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the lookup to storage and returns its content identifier.
    pub fn commit<S: Storage + ?Sized>(&self, storage: &mut S) -> Result<Cid, ActorError> {
        let bytes = marshal(&self.entries)?;
        storage.put(bytes)
    }
}

/// Top-level lookup: payer key to the root of that payer's channels.
pub type PayerLookup = Lookup<Cid>;

pub fn payer_key(payer: &Address) -> String {
    hex::encode(payer.as_bytes())
}

/// The channels opened by one payer, keyed by channel id.
#[derive(Clone, Debug)]
pub struct PayerChannels {
    payer: Address,
    by_channel_id: Lookup<PaymentChannel>,
}

impl PayerChannels {
    pub fn payer(&self) -> Address {
        self.payer
    }

    pub fn find(&self, id: ChannelId) -> Option<&PaymentChannel> {
        self.by_channel_id.find(&id.key_string())
    }

    /// Returns a copy of the channel or `UnknownChannel`.
    pub fn get(&self, id: ChannelId) -> Result<PaymentChannel, ActorError> {
        self.find(id)
            .cloned()
            .ok_or(ActorError::Broker(PaymentBrokerError::UnknownChannel))
    }

    pub fn set(&mut self, id: ChannelId, channel: PaymentChannel) {
        self.by_channel_id.set(id.key_string(), channel);
    }

    pub fn delete(&mut self, id: ChannelId) -> Option<PaymentChannel> {
        self.by_channel_id.delete(&id.key_string())
    }

    pub fn is_empty(&self) -> bool {
        self.by_channel_id.is_empty()
    }

    /// All open channels ordered by id.
    pub fn channels(&self) -> Result<BTreeMap<ChannelId, PaymentChannel>, ActorError> {
        self.by_channel_id
            .values()
            .map(|(key, channel)| {
                let id = key.parse::<u64>().map_err(|_| {
                    ActorError::fault(format!("unexpected channel key {:?} in lookup", key))
                })?;
                Ok((ChannelId(id), channel.clone()))
            })
            .collect()
    }
}

fn find_by_channel_lookup<S: Storage + ?Sized>(
    storage: &S,
    by_payer: &PayerLookup,
    payer: Address,
) -> Result<PayerChannels, ActorError> {
    let root = by_payer.find(&payer_key(&payer)).copied();
    let by_channel_id = Lookup::load(storage, root)
        .map_err(|e| e.wrap_fault(&format!("could not load channels of payer {:?}", payer)))?;
    Ok(PayerChannels {
        payer,
        by_channel_id,
    })
}

/// Loads the channels of `payer` for reading. Nothing is committed.
pub fn load_payer_channels<S: Storage + ?Sized>(
    storage: &S,
    payer: Address,
) -> Result<PayerChannels, ActorError> {
    let by_payer = PayerLookup::load(storage, storage.head())?;
    find_by_channel_lookup(storage, &by_payer, payer)
}

/// Runs `f` against the channels of `payer` and commits the result as the
/// new actor head. Nothing is committed if `f` fails. A payer left without
/// channels is removed from the top-level lookup.
pub fn with_payer_channels<R, T, F>(rt: &mut R, payer: Address, f: F) -> Result<T, ActorError>
where
    R: Runtime,
    F: FnOnce(&mut R, &mut PayerChannels) -> Result<T, ActorError>,
{
    let old_head = rt.storage().head();
    let mut by_payer = PayerLookup::load(&*rt.storage(), old_head)?;
    let mut channels = find_by_channel_lookup(&*rt.storage(), &by_payer, payer)?;

    let out = f(rt, &mut channels)?;

    let key = payer_key(&payer);
    if channels.is_empty() {
        by_payer.delete(&key);
        debug!(?payer, payers = by_payer.len(), "payer has no channels left, pruned");
    } else {
        let root = channels.by_channel_id.commit(rt.storage())?;
        by_payer.set(key, root);
    }

    let new_head = by_payer.commit(rt.storage())?;
    rt.storage().commit(new_head, old_head)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MemoryStorage;
    use crate::testing::MockRuntime;
    use ethers::types::U256;

    fn channel(amount: u64, eol: u64) -> PaymentChannel {
        PaymentChannel::new(Address::from_low_u64_be(9), U256::from(amount), eol)
    }

    #[test]
    fn empty_storage_has_no_channels() {
        let storage = MemoryStorage::new();
        let channels = load_payer_channels(&storage, Address::random()).unwrap();
        assert!(channels.is_empty());
        assert_eq!(
            channels.get(ChannelId(1)),
            Err(ActorError::Broker(PaymentBrokerError::UnknownChannel))
        );
    }

    #[test]
    fn committed_channels_are_visible_per_payer() {
        let mut rt = MockRuntime::new();
        let alice = Address::random();
        let bob = Address::random();

        with_payer_channels(&mut rt, alice, |_, channels| {
            channels.set(ChannelId(1), channel(10, 5));
            channels.set(ChannelId(2), channel(20, 6));
            Ok(())
        })
        .unwrap();
        with_payer_channels(&mut rt, bob, |_, channels| {
            channels.set(ChannelId(1), channel(30, 7));
            Ok(())
        })
        .unwrap();

        let alice_channels = load_payer_channels(rt.storage(), alice).unwrap();
        let listed = alice_channels.channels().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[&ChannelId(2)], channel(20, 6));

        let bob_channels = load_payer_channels(rt.storage(), bob).unwrap();
        assert_eq!(bob_channels.get(ChannelId(1)).unwrap(), channel(30, 7));
    }

    #[test]
    fn failed_closure_commits_nothing() {
        let mut rt = MockRuntime::new();
        let payer = Address::random();
        with_payer_channels(&mut rt, payer, |_, channels| {
            channels.set(ChannelId(1), channel(10, 5));
            Ok(())
        })
        .unwrap();
        let head = rt.storage().head();

        let err = with_payer_channels(&mut rt, payer, |_, channels| {
            channels.delete(ChannelId(1));
            Err::<(), _>(PaymentBrokerError::Expired.into())
        })
        .unwrap_err();

        assert_eq!(err, ActorError::Broker(PaymentBrokerError::Expired));
        assert_eq!(rt.storage().head(), head);
        assert!(load_payer_channels(rt.storage(), payer)
            .unwrap()
            .find(ChannelId(1))
            .is_some());
    }

    #[test]
    fn last_channel_removal_prunes_payer() {
        let mut rt = MockRuntime::new();
        let payer = Address::random();
        with_payer_channels(&mut rt, payer, |_, channels| {
            channels.set(ChannelId(3), channel(10, 5));
            Ok(())
        })
        .unwrap();
        with_payer_channels(&mut rt, payer, |_, channels| {
            channels.delete(ChannelId(3));
            Ok(())
        })
        .unwrap();

        let head = rt.storage().head();
        let by_payer = PayerLookup::load(rt.storage(), head).unwrap();
        assert!(by_payer.find(&payer_key(&payer)).is_none());
        assert!(by_payer.is_empty());
    }

    #[test]
    fn corrupt_block_is_a_fault() {
        let mut storage = MemoryStorage::new();
        let root = storage.put(b"definitely not cbor map".to_vec()).unwrap();
        storage.commit(root, None).unwrap();

        let err = load_payer_channels(&storage, Address::random()).unwrap_err();
        assert!(err.is_fault());
    }
}

//! Interface between the actor and the virtual machine that executes it.

pub mod memory;

use ethers::types::Address;

use crate::types::{ActorError, BlockHeight, Param, TokenAmount};
use crate::utils::encoding::Cid;

pub use memory::MemoryStorage;

/// Method name used for plain value transfers.
pub const METHOD_SEND: &str = "";

/// The message currently being executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub from: Address,
    pub to: Address,
    pub value: TokenAmount,
    pub nonce: u64,
}

/// Content-addressed block store holding the actor's state.
pub trait Storage {
    /// Current state root of the actor, if any state was committed.
    fn head(&self) -> Option<Cid>;

    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>, ActorError>;

    fn put(&mut self, data: Vec<u8>) -> Result<Cid, ActorError>;

    /// Moves the head from `old` to `new`. Fails if the head is not `old`.
    fn commit(&mut self, new: Cid, old: Option<Cid>) -> Result<(), ActorError>;
}

/// Execution context handed to every actor method.
pub trait Runtime {
    type Storage: Storage;

    fn message(&self) -> &Message;

    fn block_height(&self) -> BlockHeight;

    /// Whether the message sender is an account (key-holding) actor.
    fn is_from_account_actor(&self) -> bool;

    fn charge_gas(&mut self, units: u64) -> Result<(), ActorError>;

    /// Invokes `method` on `to`, transferring `value` from this actor.
    /// Returns the callee's return bytes.
    fn send(
        &mut self,
        to: Address,
        method: &str,
        value: TokenAmount,
        params: &[Param],
    ) -> Result<Vec<u8>, ActorError>;

    fn storage(&mut self) -> &mut Self::Storage;
}

//! In-memory runtime for exercising the actor without a virtual machine.

use std::collections::{HashMap, HashSet};

use ethers::types::Address;
use tracing::debug;

use crate::runtime::{MemoryStorage, Message, Runtime, Storage, METHOD_SEND};
use crate::types::{ActorError, BlockHeight, ExitCode, Param, TokenAmount};

/// Revert code of a transfer the sender cannot cover.
pub const ERR_INSUFFICIENT_BALANCE: ExitCode = 2;
/// Revert code of a call to a method nobody registered.
pub const ERR_NO_SUCH_METHOD: ExitCode = 3;
/// Revert code of a message that exhausted its gas.
pub const ERR_OUT_OF_GAS: ExitCode = 4;
/// Revert code of a transfer to an address set up to refuse funds.
pub const ERR_TRANSFER_REFUSED: ExitCode = 5;

type Method = Box<dyn FnMut(&[Param]) -> Result<Vec<u8>, ActorError>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub to: Address,
    pub method: String,
    pub value: TokenAmount,
    pub params: Vec<Param>,
}

pub struct MockRuntime {
    actor: Address,
    storage: MemoryStorage,
    message: Message,
    block_height: BlockHeight,
    balances: HashMap<Address, TokenAmount>,
    accounts: HashSet<Address>,
    nonces: HashMap<Address, u64>,
    methods: HashMap<(Address, String), Method>,
    refusing: HashSet<Address>,
    sent: Vec<SentMessage>,
    gas_limit: Option<u64>,
    gas_used: u64,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRuntime {
    pub fn new() -> Self {
        let actor = Address::from_low_u64_be(0x2);
        Self {
            actor,
            storage: MemoryStorage::new(),
            message: Message {
                from: Address::zero(),
                to: actor,
                value: TokenAmount::zero(),
                nonce: 0,
            },
            block_height: 0,
            balances: HashMap::new(),
            accounts: HashSet::new(),
            nonces: HashMap::new(),
            methods: HashMap::new(),
            refusing: HashSet::new(),
            sent: Vec::new(),
            gas_limit: None,
            gas_used: 0,
        }
    }

    /// Address of the actor under test.
    pub fn actor_address(&self) -> Address {
        self.actor
    }

    /// Registers an account actor holding `balance`.
    pub fn add_account(&mut self, addr: Address, balance: TokenAmount) {
        self.accounts.insert(addr);
        self.balances.insert(addr, balance);
    }

    pub fn set_balance(&mut self, addr: Address, balance: TokenAmount) {
        self.balances.insert(addr, balance);
    }

    pub fn balance(&self, addr: Address) -> TokenAmount {
        self.balances.get(&addr).copied().unwrap_or_default()
    }

    pub fn set_block_height(&mut self, height: BlockHeight) {
        self.block_height = height;
    }

    /// Limits the gas of every following message.
    pub fn set_gas_limit(&mut self, limit: Option<u64>) {
        self.gas_limit = limit;
    }

    /// Plain transfers to `addr` revert from now on.
    pub fn refuse_transfers_to(&mut self, addr: Address) {
        self.refusing.insert(addr);
    }

    pub fn register_method<F>(&mut self, to: Address, method: &str, f: F)
    where
        F: FnMut(&[Param]) -> Result<Vec<u8>, ActorError> + 'static,
    {
        self.methods.insert((to, method.to_string()), Box::new(f));
    }

    /// Gas charged by the current message so far.
    pub fn gas_used(&self) -> u64 {
        self.gas_used
    }

    pub fn sent(&self) -> &[SentMessage] {
        &self.sent
    }

    /// Sets the current message without moving any value.
    pub fn set_message(&mut self, from: Address, value: TokenAmount, nonce: u64) {
        self.message = Message {
            from,
            to: self.actor,
            value,
            nonce,
        };
    }

    /// Executes one message from `from` carrying `value`. The value moves
    /// to the actor before `f` runs. When `f` fails, balances, sends and the
    /// state head are rolled back, as the chain would do. The sender's nonce
    /// advances either way.
    pub fn apply_message<T, F>(
        &mut self,
        from: Address,
        value: TokenAmount,
        f: F,
    ) -> Result<T, ActorError>
    where
        F: FnOnce(&mut Self) -> Result<T, ActorError>,
    {
        let nonce = self.nonces.get(&from).copied().unwrap_or_default();
        self.nonces.insert(from, nonce + 1);
        self.set_message(from, value, nonce);
        self.gas_used = 0;

        let balances = self.balances.clone();
        let head = self.storage.head();
        let sent = self.sent.len();

        let result = self
            .transfer(from, self.actor, value)
            .and_then(|_| f(self));
        if let Err(e) = &result {
            debug!(error = %e, ?from, nonce, "message failed, rolling back");
            self.balances = balances;
            self.storage.reset_head(head);
            self.sent.truncate(sent);
        }
        result
    }

    fn transfer(
        &mut self,
        from: Address,
        to: Address,
        value: TokenAmount,
    ) -> Result<(), ActorError> {
        if value.is_zero() {
            return Ok(());
        }
        let available = self.balance(from);
        if available < value {
            return Err(ActorError::revert(
                ERR_INSUFFICIENT_BALANCE,
                format!("balance {} of {:?} below {}", available, from, value),
            ));
        }
        self.balances.insert(from, available - value);
        let credited = self.balance(to) + value;
        self.balances.insert(to, credited);
        Ok(())
    }
}

impl Runtime for MockRuntime {
    type Storage = MemoryStorage;

    fn message(&self) -> &Message {
        &self.message
    }

    fn block_height(&self) -> BlockHeight {
        self.block_height
    }

    fn is_from_account_actor(&self) -> bool {
        self.accounts.contains(&self.message.from)
    }

    fn charge_gas(&mut self, units: u64) -> Result<(), ActorError> {
        self.gas_used += units;
        match self.gas_limit {
            Some(limit) if self.gas_used > limit => Err(ActorError::revert(
                ERR_OUT_OF_GAS,
                format!("gas used {} exceeds limit {}", self.gas_used, limit),
            )),
            _ => Ok(()),
        }
    }

    fn send(
        &mut self,
        to: Address,
        method: &str,
        value: TokenAmount,
        params: &[Param],
    ) -> Result<Vec<u8>, ActorError> {
        self.sent.push(SentMessage {
            to,
            method: method.to_string(),
            value,
            params: params.to_vec(),
        });

        if method == METHOD_SEND && self.refusing.contains(&to) {
            return Err(ActorError::revert(ERR_TRANSFER_REFUSED, "transfer refused"));
        }
        self.transfer(self.actor, to, value)?;
        if method == METHOD_SEND {
            return Ok(Vec::new());
        }

        match self.methods.get_mut(&(to, method.to_string())) {
            Some(handler) => handler(params),
            None => Err(ActorError::revert(
                ERR_NO_SUCH_METHOD,
                format!("no method {:?} on {:?}", method, to),
            )),
        }
    }

    fn storage(&mut self) -> &mut MemoryStorage {
        &mut self.storage
    }
}

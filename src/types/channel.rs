use std::fmt;

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::utils::encoding::u256_be;

pub type TokenAmount = U256;
pub type BlockHeight = u64;

/// Identifies a channel within the set of channels of one payer. It is the
/// nonce of the message that created the channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl ChannelId {
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn key_string(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChannelId {
    fn from(nonce: u64) -> Self {
        ChannelId(nonce)
    }
}

/// Funds a payer has locked for a target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChannel {
    /// Account that may redeem vouchers against this channel.
    pub target: Address,
    /// Total deposited by the payer.
    #[serde(with = "u256_be")]
    pub amount: TokenAmount,
    /// Total already paid out to the target.
    #[serde(with = "u256_be")]
    pub amount_redeemed: TokenAmount,
    /// Expiry agreed by both parties at creation or the last extension.
    pub agreed_eol: BlockHeight,
    /// Effective expiry. Lower than `agreed_eol` once the payer cancels.
    pub eol: BlockHeight,
}

impl PaymentChannel {
    pub fn new(target: Address, amount: TokenAmount, eol: BlockHeight) -> Self {
        Self {
            target,
            amount,
            amount_redeemed: TokenAmount::zero(),
            agreed_eol: eol,
            eol,
        }
    }

    /// Funds not yet paid to the target.
    pub fn remaining(&self) -> TokenAmount {
        self.amount.saturating_sub(self.amount_redeemed)
    }
}

/// A single typed argument of an actor call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Param {
    Address(Address),
    Amount(#[serde(with = "u256_be")] TokenAmount),
    Height(BlockHeight),
    ChannelId(ChannelId),
    Int(u64),
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    Str(String),
}

/// A call that must succeed before a voucher is honored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub to: Address,
    pub method: String,
    pub params: Vec<Param>,
}

impl Predicate {
    pub fn new(to: Address, method: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            to,
            method: method.into(),
            params,
        }
    }
}

/// Unsigned claim against a channel, issued by the payer and signed off-chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVoucher {
    pub channel: ChannelId,
    pub payer: Address,
    pub target: Address,
    #[serde(with = "u256_be")]
    pub amount: TokenAmount,
    pub valid_at: BlockHeight,
    pub condition: Option<Predicate>,
}

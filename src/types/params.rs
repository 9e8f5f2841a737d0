//! Parameters of the exported methods. Each is encoded as a CBOR array in
//! the exported parameter order.

use ethers::types::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_bytes::{ByteBuf, Bytes};

use super::{BlockHeight, ChannelId, Param, Predicate, TokenAmount};
use crate::utils::encoding::{U256De, U256Ser};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateChannelParams {
    pub target: Address,
    pub eol: BlockHeight,
}

impl Serialize for CreateChannelParams {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (&self.target, &self.eol).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CreateChannelParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (target, eol) = Deserialize::deserialize(deserializer)?;
        Ok(Self { target, eol })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendParams {
    pub channel: ChannelId,
    pub eol: BlockHeight,
}

impl Serialize for ExtendParams {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (&self.channel, &self.eol).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExtendParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (channel, eol) = Deserialize::deserialize(deserializer)?;
        Ok(Self { channel, eol })
    }
}

/// A signed voucher presented by the target to `redeem` or `close`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedeemParams {
    pub payer: Address,
    pub channel: ChannelId,
    pub amount: TokenAmount,
    pub valid_at: BlockHeight,
    pub condition: Option<Predicate>,
    pub signature: Vec<u8>,
    /// Appended to the condition's own params when it is invoked.
    pub redeemer_params: Vec<Param>,
}

impl Serialize for RedeemParams {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (
            &self.payer,
            &self.channel,
            U256Ser(&self.amount),
            &self.valid_at,
            &self.condition,
            Bytes::new(&self.signature),
            &self.redeemer_params,
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RedeemParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (payer, channel, U256De(amount), valid_at, condition, signature, redeemer_params): (
            _,
            _,
            _,
            _,
            _,
            ByteBuf,
            _,
        ) = Deserialize::deserialize(deserializer)?;
        Ok(Self {
            payer,
            channel,
            amount,
            valid_at,
            condition,
            signature: signature.into_vec(),
            redeemer_params,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoucherParams {
    pub channel: ChannelId,
    pub amount: TokenAmount,
    pub valid_at: BlockHeight,
    pub condition: Option<Predicate>,
}

impl Serialize for VoucherParams {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (
            &self.channel,
            U256Ser(&self.amount),
            &self.valid_at,
            &self.condition,
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VoucherParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (channel, U256De(amount), valid_at, condition) =
            Deserialize::deserialize(deserializer)?;
        Ok(Self {
            channel,
            amount,
            valid_at,
            condition,
        })
    }
}

use std::collections::BTreeMap;

use ethers::types::Address;
use tracing::{debug, info, warn};

use super::condition::check_condition;
use crate::config::ActorConfig;
use crate::runtime::{Runtime, METHOD_SEND};
use crate::state::channel::{load_payer_channels, with_payer_channels, PayerChannels};
use crate::types::{
    ActorError, BlockHeight, ChannelId, PaymentBrokerError, PaymentChannel, PaymentVoucher,
    Predicate, RedeemParams, TokenAmount,
};
use crate::utils::crypto::verify_voucher_signature;
use crate::utils::encoding::marshal;

/// Payment channel actor. Lets a payer lock funds for a target, who then
/// withdraws them with vouchers signed by the payer.
///
/// A typical sequence, with balances after each step:
///
/// ```text
///                            Payer: 2000, Target:   0, Channel:    0
/// payer  create_channel(1000) Payer: 1000, Target:   0, Channel: 1000
/// target redeem(100)          Payer: 1000, Target: 100, Channel:  900
/// target redeem(200)          Payer: 1000, Target: 200, Channel:  800
/// target close(500)           Payer: 1500, Target: 500, Channel:    0
/// ```
#[derive(Clone, Debug, Default)]
pub struct PaymentBroker {
    config: ActorConfig,
}

impl PaymentBroker {
    pub fn new(config: ActorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ActorConfig {
        &self.config
    }

    pub(super) fn charge<R: Runtime>(&self, rt: &mut R) -> Result<(), ActorError> {
        rt.charge_gas(self.config.gas_cost).map_err(|e| {
            if e.is_fault() {
                return e;
            }
            warn!(error = %e, "insufficient gas");
            PaymentBrokerError::InsufficientGas.into()
        })
    }

    /// Opens a channel from the caller to `target`, funded with the value
    /// attached to the message. The channel id is the message nonce.
    pub fn create_channel<R: Runtime>(
        &self,
        rt: &mut R,
        target: Address,
        eol: BlockHeight,
    ) -> Result<ChannelId, ActorError> {
        self.charge(rt)?;

        // the nonce is only a unique id when the sender is an account
        if !rt.is_from_account_actor() {
            return Err(PaymentBrokerError::NonAccountActor.into());
        }

        let payer = rt.message().from;
        let id = ChannelId::from(rt.message().nonce);
        let amount = rt.message().value;

        with_payer_channels(rt, payer, |_, channels| {
            if channels.find(id).is_some() {
                return Err(PaymentBrokerError::DuplicateChannel.into());
            }
            channels.set(id, PaymentChannel::new(target, amount, eol));
            Ok(())
        })
        .map_err(|e| e.wrap_fault("could not create payment channel"))?;

        info!(?payer, ?target, channel = %id, %amount, eol, "payment channel created");
        Ok(id)
    }

    /// Pays the target the difference between the voucher amount and what was
    /// redeemed so far. The channel stays open.
    pub fn redeem<R: Runtime>(&self, rt: &mut R, params: &RedeemParams) -> Result<(), ActorError> {
        self.charge(rt)?;
        verify_claim(rt, params)?;

        let redeemer = rt.message().from;
        with_payer_channels(rt, params.payer, |rt, channels| {
            let mut channel = channels.get(params.channel)?;
            update_channel(rt, redeemer, &mut channel, params.amount, params.valid_at)?;
            channels.set(params.channel, channel);
            Ok(())
        })
        .map_err(|e| e.wrap_fault("could not redeem payment channel"))?;

        info!(
            payer = ?params.payer,
            channel = %params.channel,
            amount = %params.amount,
            "voucher redeemed"
        );
        Ok(())
    }

    /// Redeems like [`PaymentBroker::redeem`], then returns what is left to
    /// the payer and deletes the channel.
    pub fn close<R: Runtime>(&self, rt: &mut R, params: &RedeemParams) -> Result<(), ActorError> {
        self.charge(rt)?;
        verify_claim(rt, params)?;

        let redeemer = rt.message().from;
        with_payer_channels(rt, params.payer, |rt, channels| {
            let mut channel = channels.get(params.channel)?;
            update_channel(rt, redeemer, &mut channel, params.amount, params.valid_at)?;
            reclaim(rt, channels, params.channel, &channel)
        })
        .map_err(|e| e.wrap_fault("could not close payment channel"))?;

        info!(
            payer = ?params.payer,
            channel = %params.channel,
            amount = %params.amount,
            "payment channel closed"
        );
        Ok(())
    }

    /// Moves the channel's expiry to `eol` and adds the attached value to it.
    pub fn extend<R: Runtime>(
        &self,
        rt: &mut R,
        id: ChannelId,
        eol: BlockHeight,
    ) -> Result<(), ActorError> {
        self.charge(rt)?;

        let payer = rt.message().from;
        let value = rt.message().value;
        with_payer_channels(rt, payer, |_, channels| {
            let mut channel = channels.get(id)?;

            // eol can only be increased
            if channel.eol > eol {
                return Err(PaymentBrokerError::EolTooLow.into());
            }
            channel.eol = eol;
            channel.agreed_eol = eol;
            channel.amount = channel
                .amount
                .checked_add(value)
                .ok_or_else(|| ActorError::fault("channel amount overflow"))?;

            channels.set(id, channel);
            Ok(())
        })
        .map_err(|e| e.wrap_fault("could not extend payment channel"))?;

        info!(?payer, channel = %id, eol, added = %value, "payment channel extended");
        Ok(())
    }

    /// Shortens the channel to `cancel_delay_blocks` from now, leaving the
    /// target that long to redeem. Never lengthens it.
    pub fn cancel<R: Runtime>(&self, rt: &mut R, id: ChannelId) -> Result<(), ActorError> {
        self.charge(rt)?;

        let payer = rt.message().from;
        let eol = rt
            .block_height()
            .saturating_add(self.config.cancel_delay_blocks);
        with_payer_channels(rt, payer, |_, channels| {
            let mut channel = channels.get(id)?;

            // eol can only be decreased
            if eol < channel.eol {
                channel.eol = eol;
            }

            channels.set(id, channel);
            Ok(())
        })
        .map_err(|e| e.wrap_fault("could not cancel payment channel"))?;

        info!(?payer, channel = %id, "payment channel cancelled");
        Ok(())
    }

    /// Returns the unredeemed funds of an expired channel to the payer and
    /// deletes it.
    pub fn reclaim<R: Runtime>(&self, rt: &mut R, id: ChannelId) -> Result<(), ActorError> {
        self.charge(rt)?;

        let payer = rt.message().from;
        with_payer_channels(rt, payer, |rt, channels| {
            let channel = channels.get(id)?;

            if rt.block_height() < channel.eol {
                return Err(PaymentBrokerError::ReclaimBeforeEol.into());
            }
            reclaim(rt, channels, id, &channel)
        })
        .map_err(|e| e.wrap_fault("could not reclaim payment channel"))?;

        info!(?payer, channel = %id, "payment channel reclaimed");
        Ok(())
    }

    /// Builds an unsigned voucher for the caller's channel and returns it
    /// CBOR encoded. The caller signs it off-chain.
    pub fn voucher<R: Runtime>(
        &self,
        rt: &mut R,
        id: ChannelId,
        amount: TokenAmount,
        valid_at: BlockHeight,
        condition: Option<Predicate>,
    ) -> Result<Vec<u8>, ActorError> {
        self.charge(rt)?;

        let payer = rt.message().from;
        let channel = load_payer_channels(&*rt.storage(), payer)?.get(id)?;

        if channel.amount < amount {
            return Err(PaymentBrokerError::InsufficientChannelFunds.into());
        }

        let voucher = PaymentVoucher {
            channel: id,
            payer,
            target: channel.target,
            amount,
            valid_at,
            condition,
        };
        marshal(&voucher).map_err(|e| e.wrap_fault("could not marshal voucher"))
    }

    /// Returns every open channel of `payer`, CBOR encoded as a map from
    /// channel id to channel.
    pub fn ls<R: Runtime>(&self, rt: &mut R, payer: Address) -> Result<Vec<u8>, ActorError> {
        self.charge(rt)?;

        let channels: BTreeMap<ChannelId, PaymentChannel> =
            load_payer_channels(&*rt.storage(), payer)?.channels()?;
        debug!(?payer, count = channels.len(), "listing payment channels");
        marshal(&channels).map_err(|e| e.wrap_fault("could not marshal channels"))
    }
}

fn verify_claim<R: Runtime>(rt: &mut R, params: &RedeemParams) -> Result<(), ActorError> {
    if !verify_voucher_signature(
        params.payer,
        params.channel,
        &params.amount,
        params.valid_at,
        params.condition.as_ref(),
        &params.signature,
    ) {
        return Err(PaymentBrokerError::InvalidSignature.into());
    }
    check_condition(rt, params.condition.as_ref(), &params.redeemer_params)
}

/// Validates a voucher amount against the channel and pays the increment to
/// `target`.
fn update_channel<R: Runtime>(
    rt: &mut R,
    target: Address,
    channel: &mut PaymentChannel,
    amount: TokenAmount,
    valid_at: BlockHeight,
) -> Result<(), ActorError> {
    if target != channel.target {
        return Err(PaymentBrokerError::WrongTarget.into());
    }

    let height = rt.block_height();
    if height < valid_at {
        return Err(PaymentBrokerError::TooEarly.into());
    }
    if height >= channel.eol {
        return Err(PaymentBrokerError::Expired.into());
    }
    if amount > channel.amount {
        return Err(PaymentBrokerError::InsufficientChannelFunds.into());
    }
    if amount <= channel.amount_redeemed {
        return Err(PaymentBrokerError::AlreadyWithdrawn.into());
    }

    let update = amount - channel.amount_redeemed;
    rt.send(target, METHOD_SEND, update, &[])?;
    channel.amount_redeemed = amount;

    debug!(?target, %update, redeemed = %amount, "paid voucher increment");
    Ok(())
}

/// Deletes the channel and returns its unredeemed balance to the payer.
fn reclaim<R: Runtime>(
    rt: &mut R,
    channels: &mut PayerChannels,
    id: ChannelId,
    channel: &PaymentChannel,
) -> Result<(), ActorError> {
    let amount = channel.remaining();
    channels.delete(id);

    if amount.is_zero() {
        return Ok(());
    }
    rt.send(channels.payer(), METHOD_SEND, amount, &[])
        .map_err(|e| e.wrap_revert("could not send update funds"))?;
    Ok(())
}

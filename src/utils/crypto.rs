use ethers::{
    signers::{LocalWallet, Signer, WalletError},
    types::{Address, Signature},
    utils::hash_message,
};
use thiserror::Error;
use tracing::debug;

use crate::types::{BlockHeight, ChannelId, Predicate, TokenAmount};
use crate::utils::encoding::U256Ext;

/// Byte placed between the channel id, the amount and the rest of the
/// signed voucher data.
const SEPARATOR: u8 = 0x0;

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("could not encode voucher condition: {0}")]
    Encoding(#[from] serde_cbor::Error),
    #[error("signer holds no key for address {0:?}")]
    UnknownAddress(Address),
    #[error("signing failed: {0}")]
    Wallet(#[from] WalletError),
}

/// Signs raw bytes on behalf of an address.
pub trait VoucherSigner {
    fn sign_bytes(&self, data: &[u8], addr: Address) -> Result<Signature, SignerError>;
}

impl VoucherSigner for LocalWallet {
    fn sign_bytes(&self, data: &[u8], addr: Address) -> Result<Signature, SignerError> {
        if self.address() != addr {
            return Err(SignerError::UnknownAddress(addr));
        }
        Ok(self.sign_hash(hash_message(data))?)
    }
}

/// Builds the bytes a payer signs for a voucher:
/// `channel | 0x0 | amount | 0x0 | [to | method | params] | valid_at`.
/// The bracketed condition segment is left out when there is no condition.
pub fn create_voucher_signature_data(
    channel_id: ChannelId,
    amount: &TokenAmount,
    valid_at: BlockHeight,
    condition: Option<&Predicate>,
) -> Result<Vec<u8>, serde_cbor::Error> {
    let mut data = Vec::with_capacity(96);
    data.extend_from_slice(&channel_id.to_be_bytes());
    data.push(SEPARATOR);
    data.extend_from_slice(&amount.to_be_bytes_vec());
    data.push(SEPARATOR);
    if let Some(condition) = condition {
        data.extend_from_slice(condition.to.as_bytes());
        data.extend_from_slice(condition.method.as_bytes());
        data.extend_from_slice(&serde_cbor::to_vec(&condition.params)?);
    }
    data.extend_from_slice(&valid_at.to_be_bytes());
    Ok(data)
}

pub fn sign_voucher(
    channel_id: ChannelId,
    amount: &TokenAmount,
    valid_at: BlockHeight,
    addr: Address,
    condition: Option<&Predicate>,
    signer: &impl VoucherSigner,
) -> Result<Signature, SignerError> {
    let data = create_voucher_signature_data(channel_id, amount, valid_at, condition)?;
    signer.sign_bytes(&data, addr)
}

/// Reports whether `sig` is the payer's signature over the voucher. Any
/// failure to encode or parse counts as an invalid signature.
pub fn verify_voucher_signature(
    payer: Address,
    channel_id: ChannelId,
    amount: &TokenAmount,
    valid_at: BlockHeight,
    condition: Option<&Predicate>,
    sig: &[u8],
) -> bool {
    let data = match create_voucher_signature_data(channel_id, amount, valid_at, condition) {
        Ok(data) => data,
        Err(e) => {
            debug!(error = %e, "voucher data could not be encoded");
            return false;
        }
    };

    let signature = match Signature::try_from(sig) {
        Ok(signature) => signature,
        Err(e) => {
            debug!(error = %e, "malformed voucher signature");
            return false;
        }
    };

    match signature.verify(data, payer) {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, ?payer, channel = %channel_id, "voucher signature rejected");
            false
        }
    }
}

use ethers::types::Address;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::PaymentBroker;
use crate::runtime::Runtime;
use crate::types::{
    ActorError, ChannelId, CreateChannelParams, ExitCode, ExtendParams, RedeemParams,
    VoucherParams, EXIT_OK,
};
use crate::utils::encoding::marshal;

pub const METHOD_CREATE_CHANNEL: &str = "createChannel";
pub const METHOD_EXTEND: &str = "extend";
pub const METHOD_CANCEL: &str = "cancel";
pub const METHOD_RECLAIM: &str = "reclaim";
pub const METHOD_REDEEM: &str = "redeem";
pub const METHOD_CLOSE: &str = "close";
pub const METHOD_VOUCHER: &str = "voucher";
pub const METHOD_LS: &str = "ls";

/// Types that appear in exported method signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbiType {
    Address,
    BlockHeight,
    ChannelId,
    TokenAmount,
    Predicate,
    Bytes,
    Parameters,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionSignature {
    pub params: &'static [AbiType],
    pub ret: &'static [AbiType],
}

const REDEEM_PARAMS: &[AbiType] = &[
    AbiType::Address,
    AbiType::ChannelId,
    AbiType::TokenAmount,
    AbiType::BlockHeight,
    AbiType::Predicate,
    AbiType::Bytes,
    AbiType::Parameters,
];

const EXPORTS: &[(&str, FunctionSignature)] = &[
    (
        METHOD_CANCEL,
        FunctionSignature {
            params: &[AbiType::ChannelId],
            ret: &[],
        },
    ),
    (
        METHOD_CLOSE,
        FunctionSignature {
            params: REDEEM_PARAMS,
            ret: &[],
        },
    ),
    (
        METHOD_CREATE_CHANNEL,
        FunctionSignature {
            params: &[AbiType::Address, AbiType::BlockHeight],
            ret: &[AbiType::ChannelId],
        },
    ),
    (
        METHOD_EXTEND,
        FunctionSignature {
            params: &[AbiType::ChannelId, AbiType::BlockHeight],
            ret: &[],
        },
    ),
    (
        METHOD_LS,
        FunctionSignature {
            params: &[AbiType::Address],
            ret: &[AbiType::Bytes],
        },
    ),
    (
        METHOD_RECLAIM,
        FunctionSignature {
            params: &[AbiType::ChannelId],
            ret: &[],
        },
    ),
    (
        METHOD_REDEEM,
        FunctionSignature {
            params: REDEEM_PARAMS,
            ret: &[],
        },
    ),
    (
        METHOD_VOUCHER,
        FunctionSignature {
            params: &[
                AbiType::ChannelId,
                AbiType::TokenAmount,
                AbiType::BlockHeight,
                AbiType::Predicate,
            ],
            ret: &[AbiType::Bytes],
        },
    ),
];

/// Outcome of applying one message to the actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub exit_code: ExitCode,
    pub return_value: Vec<u8>,
    pub error: Option<ActorError>,
}

impl Receipt {
    pub fn is_ok(&self) -> bool {
        self.exit_code == EXIT_OK
    }
}

impl From<Result<Vec<u8>, ActorError>> for Receipt {
    fn from(result: Result<Vec<u8>, ActorError>) -> Self {
        match result {
            Ok(return_value) => Receipt {
                exit_code: EXIT_OK,
                return_value,
                error: None,
            },
            Err(e) => Receipt {
                exit_code: e.exit_code(),
                return_value: Vec::new(),
                error: Some(e),
            },
        }
    }
}

impl PaymentBroker {
    /// Signatures of the methods this actor exports, sorted by name.
    pub fn exports() -> &'static [(&'static str, FunctionSignature)] {
        EXPORTS
    }

    pub fn signature(method: &str) -> Option<&'static FunctionSignature> {
        EXPORTS
            .iter()
            .find(|(name, _)| *name == method)
            .map(|(_, signature)| signature)
    }

    /// Decodes the params of `method`. A caller sending bad params still pays
    /// for the call before the fault.
    fn decode_params<R, T>(
        &self,
        rt: &mut R,
        method: &str,
        params: &[u8],
    ) -> Result<T, ActorError>
    where
        R: Runtime,
        T: DeserializeOwned,
    {
        match serde_cbor::from_slice(params) {
            Ok(decoded) => Ok(decoded),
            Err(e) => {
                self.charge(rt)?;
                Err(ActorError::fault(format!(
                    "could not decode params of {}: {}",
                    method, e
                )))
            }
        }
    }

    /// Runs `method` with CBOR encoded `params` and returns the CBOR encoded
    /// result. Methods without a return value return no bytes.
    pub fn invoke<R: Runtime>(
        &self,
        rt: &mut R,
        method: &str,
        params: &[u8],
    ) -> Result<Vec<u8>, ActorError> {
        debug!(method, from = ?rt.message().from, "invoking payment broker");
        match method {
            METHOD_CREATE_CHANNEL => {
                let p: CreateChannelParams = self.decode_params(rt, method, params)?;
                let id = self.create_channel(rt, p.target, p.eol)?;
                marshal(&id)
            }
            METHOD_EXTEND => {
                let p: ExtendParams = self.decode_params(rt, method, params)?;
                self.extend(rt, p.channel, p.eol).map(|_| Vec::new())
            }
            METHOD_CANCEL => {
                let (id,): (ChannelId,) = self.decode_params(rt, method, params)?;
                self.cancel(rt, id).map(|_| Vec::new())
            }
            METHOD_RECLAIM => {
                let (id,): (ChannelId,) = self.decode_params(rt, method, params)?;
                self.reclaim(rt, id).map(|_| Vec::new())
            }
            METHOD_REDEEM => {
                let p: RedeemParams = self.decode_params(rt, method, params)?;
                self.redeem(rt, &p).map(|_| Vec::new())
            }
            METHOD_CLOSE => {
                let p: RedeemParams = self.decode_params(rt, method, params)?;
                self.close(rt, &p).map(|_| Vec::new())
            }
            METHOD_VOUCHER => {
                let p: VoucherParams = self.decode_params(rt, method, params)?;
                self.voucher(rt, p.channel, p.amount, p.valid_at, p.condition)
            }
            METHOD_LS => {
                let (payer,): (Address,) = self.decode_params(rt, method, params)?;
                self.ls(rt, payer)
            }
            _ => {
                self.charge(rt)?;
                Err(ActorError::fault(format!("unknown method {:?}", method)))
            }
        }
    }

    /// Like [`PaymentBroker::invoke`], but folds the outcome into a receipt
    /// carrying the exit code.
    pub fn apply<R: Runtime>(&self, rt: &mut R, method: &str, params: &[u8]) -> Receipt {
        let result = self.invoke(rt, method, params);
        if let Err(e) = &result {
            warn!(method, error = %e, fault = e.is_fault(), "payment broker call failed");
        }
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRuntime;
    use crate::types::{PaymentBrokerError, EXIT_FAULT};
    use crate::utils::encoding::unmarshal;
    use ethers::types::U256;

    #[test]
    fn exports_cover_every_method() {
        let names: Vec<&str> = PaymentBroker::exports().iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec!["cancel", "close", "createChannel", "extend", "ls", "reclaim", "redeem", "voucher"]
        );
        assert_eq!(
            PaymentBroker::signature("redeem").unwrap().params.len(),
            7
        );
        assert_eq!(
            PaymentBroker::signature("createChannel").unwrap().ret,
            &[AbiType::ChannelId]
        );
        assert!(PaymentBroker::signature("nope").is_none());
    }

    #[test]
    fn create_channel_through_dispatch() {
        let broker = PaymentBroker::default();
        let mut rt = MockRuntime::new();
        let payer = Address::random();
        let target = Address::random();
        rt.add_account(payer, U256::from(100));

        let params = marshal(&CreateChannelParams { target, eol: 10 }).unwrap();
        let receipt = rt
            .apply_message(payer, U256::from(100), |rt| {
                Ok(broker.apply(rt, METHOD_CREATE_CHANNEL, &params))
            })
            .unwrap();
        assert!(receipt.is_ok());
        assert_eq!(unmarshal::<ChannelId>(&receipt.return_value).unwrap(), ChannelId(0));

        let receipt = broker.apply(&mut rt, METHOD_CANCEL, &marshal(&(ChannelId(3),)).unwrap());
        assert_eq!(receipt.exit_code, PaymentBrokerError::UnknownChannel.code());
        assert!(receipt.return_value.is_empty());
    }

    #[test]
    fn bad_input_faults() {
        let broker = PaymentBroker::default();
        let mut rt = MockRuntime::new();

        let receipt = broker.apply(&mut rt, "transfer", &[]);
        assert_eq!(receipt.exit_code, EXIT_FAULT);

        let receipt = broker.apply(&mut rt, METHOD_EXTEND, b"\xff");
        assert_eq!(receipt.exit_code, EXIT_FAULT);
        assert!(receipt.error.unwrap().is_fault());
    }

    #[test]
    fn bad_input_is_charged() {
        let broker = PaymentBroker::default();
        let mut rt = MockRuntime::new();
        let payer = Address::random();
        rt.add_account(payer, U256::zero());

        let receipt = rt
            .apply_message(payer, U256::zero(), |rt| {
                Ok(broker.apply(rt, METHOD_CANCEL, b"\xff"))
            })
            .unwrap();
        assert_eq!(receipt.exit_code, EXIT_FAULT);
        assert_eq!(rt.gas_used(), broker.config().gas_cost);

        let receipt = rt
            .apply_message(payer, U256::zero(), |rt| Ok(broker.apply(rt, "withdraw", &[])))
            .unwrap();
        assert_eq!(receipt.exit_code, EXIT_FAULT);
        assert_eq!(rt.gas_used(), broker.config().gas_cost);

        // without gas for the call the bad input reverts instead
        rt.set_gas_limit(Some(10));
        let receipt = rt
            .apply_message(payer, U256::zero(), |rt| {
                Ok(broker.apply(rt, METHOD_CANCEL, b"\xff"))
            })
            .unwrap();
        assert_eq!(receipt.exit_code, PaymentBrokerError::InsufficientGas.code());
    }
}

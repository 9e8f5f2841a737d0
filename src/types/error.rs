use thiserror::Error;

/// Numeric status returned alongside every invocation. Zero means success.
pub type ExitCode = u8;

pub const EXIT_OK: ExitCode = 0;
/// Exit code reported for faults, which carry no code of their own.
pub const EXIT_FAULT: ExitCode = 1;

/// Validation failures of the payment broker. The discriminants are the
/// wire codes and must not change.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PaymentBrokerError {
    #[error("insufficient gas")]
    InsufficientGas = 32,
    #[error("Only account actors may create payment channels")]
    NonAccountActor = 33,
    #[error("Duplicate create channel attempt")]
    DuplicateChannel = 34,
    #[error("payment channel eol may not be decreased")]
    EolTooLow = 35,
    #[error("payment channel may not reclaimed before eol")]
    ReclaimBeforeEol = 36,
    #[error("voucher amount exceeds amount in channel")]
    InsufficientChannelFunds = 37,
    #[error("payment channel is unknown")]
    UnknownChannel = 38,
    #[error("attempt to redeem channel from wrong target account")]
    WrongTarget = 39,
    #[error("block height has exceeded channel's end of life")]
    Expired = 40,
    #[error("update amount has already been redeemed")]
    AlreadyWithdrawn = 41,
    #[error("signature failed to validate")]
    InvalidSignature = 42,
    #[error("block height too low to redeem voucher")]
    TooEarly = 43,
    #[error("failed to validate voucher condition")]
    ConditionInvalid = 44,
}

impl PaymentBrokerError {
    pub const ALL: [PaymentBrokerError; 13] = [
        PaymentBrokerError::InsufficientGas,
        PaymentBrokerError::NonAccountActor,
        PaymentBrokerError::DuplicateChannel,
        PaymentBrokerError::EolTooLow,
        PaymentBrokerError::ReclaimBeforeEol,
        PaymentBrokerError::InsufficientChannelFunds,
        PaymentBrokerError::UnknownChannel,
        PaymentBrokerError::WrongTarget,
        PaymentBrokerError::Expired,
        PaymentBrokerError::AlreadyWithdrawn,
        PaymentBrokerError::InvalidSignature,
        PaymentBrokerError::TooEarly,
        PaymentBrokerError::ConditionInvalid,
    ];

    pub fn code(self) -> ExitCode {
        self as ExitCode
    }

    pub fn from_code(code: ExitCode) -> Option<Self> {
        Self::ALL.into_iter().find(|err| err.code() == code)
    }
}

/// Looks up the human readable message registered for a revert code.
pub fn message_for_code(code: ExitCode) -> Option<String> {
    PaymentBrokerError::from_code(code).map(|err| err.to_string())
}

impl From<PaymentBrokerError> for ExitCode {
    fn from(error: PaymentBrokerError) -> Self {
        error.code()
    }
}

/// Error returned by actor operations and by the runtime it calls into.
///
/// `Broker` and `Revert` unwind only the current message. `Fault` aborts the
/// whole state transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    #[error(transparent)]
    Broker(#[from] PaymentBrokerError),
    #[error("{message} (exit code {code})")]
    Revert { code: ExitCode, message: String },
    #[error("fault: {0}")]
    Fault(String),
}

impl ActorError {
    pub fn fault(message: impl Into<String>) -> Self {
        ActorError::Fault(message.into())
    }

    pub fn revert(code: ExitCode, message: impl Into<String>) -> Self {
        ActorError::Revert {
            code,
            message: message.into(),
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, ActorError::Fault(_))
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            ActorError::Broker(err) => err.code(),
            ActorError::Revert { code, .. } => *code,
            ActorError::Fault(_) => EXIT_FAULT,
        }
    }

    /// Re-raises a non-fault error as a revert with added context. Faults
    /// pass through untouched.
    pub fn wrap_revert(self, context: &str) -> Self {
        match self {
            ActorError::Fault(_) => self,
            other => ActorError::Revert {
                code: other.exit_code(),
                message: format!("{}: {}", context, other),
            },
        }
    }

    /// Adds context to a fault. Reverts pass through untouched.
    pub fn wrap_fault(self, context: &str) -> Self {
        match self {
            ActorError::Fault(message) => ActorError::Fault(format!("{}: {}", context, message)),
            other => other,
        }
    }
}

impl From<serde_cbor::Error> for ActorError {
    fn from(error: serde_cbor::Error) -> Self {
        ActorError::Fault(format!("cbor encoding error: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(PaymentBrokerError::NonAccountActor.code(), 33);
        assert_eq!(PaymentBrokerError::UnknownChannel.code(), 38);
        assert_eq!(PaymentBrokerError::TooEarly.code(), 43);
        assert_eq!(PaymentBrokerError::ConditionInvalid.code(), 44);
        assert_eq!(ExitCode::from(PaymentBrokerError::InvalidSignature), 42);
    }

    #[test]
    fn every_code_has_a_distinct_message() {
        for err in PaymentBrokerError::ALL {
            assert_eq!(PaymentBrokerError::from_code(err.code()), Some(err));
            assert_eq!(message_for_code(err.code()), Some(err.to_string()));
        }
        assert_eq!(message_for_code(EXIT_OK), None);
        assert_eq!(message_for_code(200), None);
    }

    #[test]
    fn wrapping_keeps_fault_class() {
        let fault = ActorError::fault("store corrupted").wrap_revert("could not send");
        assert!(fault.is_fault());
        assert_eq!(fault.exit_code(), EXIT_FAULT);

        let revert = ActorError::from(PaymentBrokerError::Expired).wrap_revert("could not send");
        assert!(!revert.is_fault());
        assert_eq!(revert.exit_code(), 40);
        assert!(revert.to_string().starts_with("could not send"));
    }
}

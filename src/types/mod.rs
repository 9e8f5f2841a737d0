pub mod channel;
pub mod error;
pub mod params;

pub use channel::{
    BlockHeight, ChannelId, Param, PaymentChannel, PaymentVoucher, Predicate, TokenAmount,
};
pub use error::{message_for_code, ActorError, ExitCode, PaymentBrokerError, EXIT_FAULT, EXIT_OK};
pub use params::{CreateChannelParams, ExtendParams, RedeemParams, VoucherParams};

pub mod actor;
pub mod config;
pub mod runtime;
pub mod state;
pub mod types;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use actor::{PaymentBroker, Receipt};
pub use config::ActorConfig;
pub use runtime::{Message, Runtime, Storage};
pub use types::{ActorError, ChannelId, PaymentBrokerError, PaymentChannel, PaymentVoucher};

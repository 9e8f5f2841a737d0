pub mod condition;
pub mod exports;
pub mod payment_broker;

pub use exports::{AbiType, FunctionSignature, Receipt};
pub use payment_broker::PaymentBroker;

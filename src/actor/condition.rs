use tracing::{debug, warn};

use crate::runtime::Runtime;
use crate::types::{ActorError, Param, PaymentBrokerError, Predicate, TokenAmount};

/// Invokes the voucher's condition, if any, with the redeemer's params
/// appended to the voucher's own. A fault from the call is returned as is;
/// any other failure becomes `ConditionInvalid`.
pub fn check_condition<R: Runtime>(
    rt: &mut R,
    condition: Option<&Predicate>,
    redeemer_params: &[Param],
) -> Result<(), ActorError> {
    let condition = match condition {
        Some(condition) => condition,
        None => return Ok(()),
    };

    let mut params = condition.params.clone();
    params.extend_from_slice(redeemer_params);

    debug!(
        to = ?condition.to,
        method = %condition.method,
        params = params.len(),
        "checking voucher condition"
    );
    match rt.send(condition.to, &condition.method, TokenAmount::zero(), &params) {
        Ok(_) => Ok(()),
        Err(e) if e.is_fault() => Err(e),
        Err(e) => {
            warn!(error = %e, method = %condition.method, "voucher condition failed");
            Err(PaymentBrokerError::ConditionInvalid.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRuntime;
    use ethers::types::Address;
    use std::sync::{Arc, Mutex};

    #[test]
    fn no_condition_sends_nothing() {
        let mut rt = MockRuntime::new();
        check_condition(&mut rt, None, &[Param::Int(1)]).unwrap();
        assert!(rt.sent().is_empty());
    }

    #[test]
    fn redeemer_params_follow_voucher_params() {
        let mut rt = MockRuntime::new();
        let verifier = Address::random();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        rt.register_method(verifier, "verify", move |params| {
            sink.lock().unwrap().extend_from_slice(params);
            Ok(vec![])
        });

        let condition = Predicate::new(verifier, "verify", vec![Param::Int(1), Param::Int(2)]);
        check_condition(&mut rt, Some(&condition), &[Param::Str("proof".into())]).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Param::Int(1), Param::Int(2), Param::Str("proof".into())]
        );
        assert_eq!(rt.sent()[0].value, TokenAmount::zero());
    }

    #[test]
    fn revert_becomes_condition_invalid() {
        let mut rt = MockRuntime::new();
        let verifier = Address::random();
        rt.register_method(verifier, "verify", |_| Err(ActorError::revert(7, "nope")));

        let condition = Predicate::new(verifier, "verify", vec![]);
        assert_eq!(
            check_condition(&mut rt, Some(&condition), &[]),
            Err(ActorError::Broker(PaymentBrokerError::ConditionInvalid))
        );

        // an unknown method also fails validation rather than faulting
        let missing = Predicate::new(verifier, "missing", vec![]);
        assert_eq!(
            check_condition(&mut rt, Some(&missing), &[]),
            Err(ActorError::Broker(PaymentBrokerError::ConditionInvalid))
        );
    }

    #[test]
    fn fault_is_propagated() {
        let mut rt = MockRuntime::new();
        let verifier = Address::random();
        rt.register_method(verifier, "verify", |_| Err(ActorError::fault("vm blew up")));

        let condition = Predicate::new(verifier, "verify", vec![]);
        let err = check_condition(&mut rt, Some(&condition), &[]).unwrap_err();
        assert_eq!(err, ActorError::fault("vm blew up"));
    }
}

/// Failure reported by a message handler, captured on the exchange and
/// turned into an error acknowledgement when auto-ack is enabled.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The message-processing callback a server endpoint invokes for every
/// decoded inbound payload.
///
/// One exchange per call: the decoded message comes in, the reply goes
/// out. `Ok(Some(reply))` answers with an explicit reply body,
/// `Ok(None)` reports success and leaves the acknowledgement to the
/// endpoint's generator, `Err(_)` marks the exchange failed.
///
/// Invoked synchronously from the connection worker with no timeout
/// enforced by the worker; a handler that needs one brings its own.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &[u8]) -> Result<Option<Vec<u8>>, HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&[u8]) -> Result<Option<Vec<u8>>, HandlerError> + Send + Sync,
{
    fn handle(&self, message: &[u8]) -> Result<Option<Vec<u8>>, HandlerError> {
        self(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_handlers() {
        let echo = |message: &[u8]| -> Result<Option<Vec<u8>>, HandlerError> {
            Ok(Some(message.to_vec()))
        };
        let reply = echo.handle(b"ping").unwrap();
        assert_eq!(reply, Some(b"ping".to_vec()));
    }

    #[test]
    fn handler_failures_carry_their_message() {
        let failing = |_message: &[u8]| -> Result<Option<Vec<u8>>, HandlerError> {
            Err("backend unavailable".into())
        };
        let err = failing.handle(b"msg").unwrap_err();
        assert_eq!(err.to_string(), "backend unavailable");
    }
}

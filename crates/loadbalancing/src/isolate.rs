//! Panic isolation for user-supplied callbacks.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Run `f`, turning a panic into an error message.
///
/// Callers log the message and carry on; one faulty observer or evaluator
/// must not stop event processing or the other observers.
pub(crate) fn catch<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_returns_value() {
        assert_eq!(catch(|| 41 + 1), Ok(42));
    }

    #[test]
    fn test_catch_extracts_message() {
        assert_eq!(catch(|| panic!("static")), Err::<(), _>("static".to_string()));
        let n = 3;
        assert_eq!(catch(|| panic!("formatted {}", n)), Err::<(), _>("formatted 3".to_string()));
    }
}

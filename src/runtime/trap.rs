//! Runtime traps.
//!
//! A trap aborts the current program. It unwinds with a [`Trap`] payload so
//! the VM can turn it into an error (or hand it to an `ON ERROR` handler)
//! instead of killing the host process.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

/// Error numbers reported through `ERR()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TrapKind {
    Generic = 1,
    InvalidArgument = 5,
    Overflow = 6,
    OutOfMemory = 7,
    Bounds = 9,
    DivideByZero = 11,
    InvalidCast = 13,
    BadFileMode = 54,
    FileNotFound = 53,
    InputPastEnd = 62,
    Io = 57,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trap {
    pub kind: TrapKind,
    pub message: String,
}

impl std::fmt::Display for Trap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Trap {
    pub fn code(&self) -> i64 {
        self.kind as i64
    }
}

/// Guess the error class from a trap message.
fn classify(msg: &str) -> TrapKind {
    if msg.contains("out of bounds") {
        TrapKind::Bounds
    } else if msg.contains("divide by zero") || msg.contains("division by zero") {
        TrapKind::DivideByZero
    } else if msg.contains("overflow") {
        TrapKind::Overflow
    } else if msg.contains("out of memory") {
        TrapKind::OutOfMemory
    } else if msg.contains("not found") {
        TrapKind::FileNotFound
    } else if msg.contains("past end") || msg.contains("EOF") {
        TrapKind::InputPastEnd
    } else if msg.contains("short write") || msg.contains("I/O error") {
        TrapKind::Io
    } else if msg.contains("must be") || msg.contains("invalid") || msg.contains("domain") {
        TrapKind::InvalidArgument
    } else {
        TrapKind::Generic
    }
}

static QUIET_HOOK: Once = Once::new();

/// Keep the default panic hook from printing trap unwinds.
pub fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let prev = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<Trap>().is_none() {
                prev(info);
            }
        }));
    });
}

/// Abort the running program with `msg`.
pub fn rt_trap(msg: &str) -> ! {
    rt_trap_kind(classify(msg), msg)
}

pub fn rt_trap_kind(kind: TrapKind, msg: &str) -> ! {
    install_quiet_hook();
    tracing::debug!(target: "ilc::runtime", code = kind as i32, "trap: {msg}");
    panic::panic_any(Trap { kind, message: msg.to_string() })
}

/// Shared helper for every bounds-checked container access.
pub fn rt_bounds_panic(index: i64, len: usize) -> ! {
    rt_trap_kind(
        TrapKind::Bounds,
        &format!("index {index} out of bounds (len={len})"),
    )
}

/// Run `f`, turning a trap into `Err`. Other panics keep unwinding.
pub fn catch_trap<R>(f: impl FnOnce() -> R) -> Result<R, Trap> {
    install_quiet_hook();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(v) => Ok(v),
        Err(payload) => match payload.downcast::<Trap>() {
            Ok(trap) => Err(*trap),
            Err(other) => panic::resume_unwind(other),
        },
    }
}

thread_local! {
    static LAST_ERROR: Cell<i64> = const { Cell::new(0) };
}

/// Record the code of the trap an `ON ERROR` handler is servicing.
pub fn set_last_error(code: i64) {
    LAST_ERROR.with(|c| c.set(code));
}

/// `ERR()`: code of the most recent handled trap, 0 if none.
pub fn rt_err() -> i64 {
    LAST_ERROR.with(Cell::get)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_trap_returns_message() {
        let err = catch_trap(|| rt_trap("boom")).unwrap_err();
        assert_eq!(err.message, "boom");
        assert_eq!(err.kind, TrapKind::Generic);
    }

    #[test]
    fn catch_trap_passes_through_values() {
        assert_eq!(catch_trap(|| 7).unwrap(), 7);
    }

    #[test]
    fn bounds_message_format() {
        let err = catch_trap(|| rt_bounds_panic(5, 5)).unwrap_err();
        assert_eq!(err.message, "index 5 out of bounds (len=5)");
        assert_eq!(err.code(), 9);
    }

    #[test]
    fn classify_known_messages() {
        assert_eq!(classify("integer overflow in add"), TrapKind::Overflow);
        assert_eq!(classify("divide by zero"), TrapKind::DivideByZero);
        assert_eq!(classify("CHR$: code must be 0-255 (got 300)"), TrapKind::InvalidArgument);
    }

    #[test]
    fn last_error_is_per_thread() {
        set_last_error(9);
        assert_eq!(rt_err(), 9);
        std::thread::spawn(|| assert_eq!(rt_err(), 0)).join().unwrap();
        set_last_error(0);
    }

    #[test]
    #[should_panic(expected = "plain panic")]
    fn non_trap_panics_propagate() {
        let _ = catch_trap(|| panic!("plain panic"));
    }
}

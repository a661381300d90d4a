//! Numeric helpers behind the math builtins.

use std::cell::Cell;

use super::trap::{rt_trap, rt_trap_kind, TrapKind};

pub fn rt_int_floor(x: f64) -> i64 {
    to_i64_checked("INT", x.floor())
}

pub fn rt_fix_trunc(x: f64) -> i64 {
    to_i64_checked("FIX", x.trunc())
}

fn to_i64_checked(who: &str, x: f64) -> i64 {
    if x.is_nan() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
        rt_trap_kind(TrapKind::Overflow, &format!("{who}: overflow"));
    }
    x as i64
}

/// Round half to even at `ndigits` decimal places. Negative `ndigits`
/// rounds to tens, hundreds, and so on.
pub fn rt_round_even(x: f64, ndigits: i64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let ndigits = ndigits.clamp(-308, 308) as i32;
    let scale = 10f64.powi(ndigits.abs());
    let scaled = if ndigits >= 0 { x * scale } else { x / scale };
    if !scaled.is_finite() {
        return x;
    }
    let rounded = scaled.round_ties_even();
    if ndigits >= 0 { rounded / scale } else { rounded * scale }
}

pub fn rt_sqrt(x: f64) -> f64 {
    if x < 0.0 {
        rt_trap(&format!("SQR: domain error (argument {x} must be >= 0)"));
    }
    x.sqrt()
}

pub fn rt_abs_i64(x: i64) -> i64 {
    match x.checked_abs() {
        Some(v) => v,
        None => rt_trap_kind(TrapKind::Overflow, "ABS: overflow"),
    }
}

pub fn rt_abs_f64(x: f64) -> f64 {
    x.abs()
}

pub fn rt_floor(x: f64) -> f64 {
    x.floor()
}

pub fn rt_ceil(x: f64) -> f64 {
    x.ceil()
}

pub fn rt_sin(x: f64) -> f64 {
    x.sin()
}

pub fn rt_cos(x: f64) -> f64 {
    x.cos()
}

pub fn rt_tan(x: f64) -> f64 {
    x.tan()
}

pub fn rt_atan(x: f64) -> f64 {
    x.atan()
}

pub fn rt_exp(x: f64) -> f64 {
    x.exp()
}

pub fn rt_log(x: f64) -> f64 {
    if x <= 0.0 {
        rt_trap(&format!("LOG: domain error (argument {x} must be > 0)"));
    }
    x.ln()
}

pub fn rt_sgn_i64(x: i64) -> i64 {
    x.signum()
}

pub fn rt_sgn_f64(x: f64) -> i64 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// `base ^ exp`, trapping where the real result is undefined.
pub fn rt_pow_f64_chkdom(base: f64, exp: f64) -> f64 {
    if base < 0.0 && exp.fract() != 0.0 {
        rt_trap("POW: domain error (negative base with fractional exponent)");
    }
    if base == 0.0 && exp < 0.0 {
        rt_trap_kind(TrapKind::DivideByZero, "POW: division by zero (zero base with negative exponent)");
    }
    base.powf(exp)
}

// ---------------------------------------------------------------------------
// Deterministic random numbers
// ---------------------------------------------------------------------------

const LCG_MUL: u64 = 6364136223846793005;
const LCG_INC: u64 = 1442695040888963407;
const DEFAULT_SEED: u64 = 0x853c_49e6_748f_ea9b;

thread_local! {
    static RNG_STATE: Cell<u64> = const { Cell::new(DEFAULT_SEED) };
}

pub fn rt_randomize_i64(seed: i64) {
    RNG_STATE.with(|s| s.set(seed as u64 ^ DEFAULT_SEED));
}

/// Next value in `[0, 1)`. The sequence depends only on the last seed.
pub fn rt_rnd() -> f64 {
    RNG_STATE.with(|s| {
        let next = s.get().wrapping_mul(LCG_MUL).wrapping_add(LCG_INC);
        s.set(next);
        (next >> 11) as f64 / (1u64 << 53) as f64
    })
}

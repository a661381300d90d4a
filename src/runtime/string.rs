//! Reference-counted, binary-safe runtime strings.
//!
//! Heap strings store their bytes directly in the heap payload followed by a
//! NUL byte. Literal strings (`rt_const_cstr`) keep a pointer to static bytes
//! and record `cap = 0` so nothing is freed but the header.

use std::cmp::Ordering;
use std::ffi::CStr;
use std::fmt;
use std::ptr::NonNull;
use std::sync::OnceLock;

use super::heap::{self, AllocSpec, ElemKind, HeapKind};
use super::trap::{rt_trap, rt_trap_kind, TrapKind};

/// Payload of a literal string: a borrowed static C string.
struct LiteralRef {
    text: &'static CStr,
}

unsafe fn drop_literal(_payload: NonNull<u8>) {
    // `LiteralRef` owns nothing.
}

pub struct RtString {
    ptr: NonNull<u8>,
}

static EMPTY: OnceLock<usize> = OnceLock::new();

fn empty_payload() -> NonNull<u8> {
    let addr = *EMPTY.get_or_init(|| {
        let p = heap::alloc(AllocSpec {
            kind: HeapKind::String,
            elem_kind: ElemKind::None,
            elem_size: 1,
            len: 0,
            cap: 1,
            extra: 0,
            finalizer: None,
        });
        // SAFETY: freshly allocated.
        unsafe { heap::make_immortal(p) };
        p.as_ptr() as usize
    });
    match NonNull::new(addr as *mut u8) {
        Some(p) => p,
        None => rt_trap("rt_empty_string: alloc"),
    }
}

impl RtString {
    /// The shared empty string. Never reference counted.
    pub fn empty() -> Self {
        RtString { ptr: empty_payload() }
    }

    /// Owning copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        let ptr = heap::alloc(AllocSpec {
            kind: HeapKind::String,
            elem_kind: ElemKind::None,
            elem_size: 1,
            len: bytes.len(),
            cap: bytes.len() + 1,
            extra: 0,
            finalizer: None,
        });
        // SAFETY: payload holds `len + 1` zeroed bytes.
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()) };
        RtString { ptr }
    }

    /// `n` copies of `byte`, allocated directly on the runtime heap so an
    /// impossible size traps instead of aborting.
    pub fn filled(n: usize, byte: u8) -> Self {
        if n == 0 {
            return Self::empty();
        }
        let cap = match n.checked_add(1) {
            Some(c) => c,
            None => rt_trap_kind(TrapKind::OutOfMemory, "rt_string_alloc: out of memory"),
        };
        let ptr = heap::alloc(AllocSpec {
            kind: HeapKind::String,
            elem_kind: ElemKind::None,
            elem_size: 1,
            len: n,
            cap,
            extra: 0,
            finalizer: None,
        });
        // SAFETY: payload holds `n + 1` zeroed bytes; the last stays NUL.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), byte, n) };
        RtString { ptr }
    }

    pub fn from_str(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// Non-owning wrapper around a static C string.
    pub fn from_static(text: &'static CStr) -> Self {
        let ptr = heap::alloc(AllocSpec {
            kind: HeapKind::String,
            elem_kind: ElemKind::None,
            elem_size: 1,
            len: text.to_bytes().len(),
            cap: 0,
            extra: std::mem::size_of::<LiteralRef>(),
            finalizer: Some(drop_literal),
        });
        // SAFETY: the payload has room for one `LiteralRef`; alignment is 16.
        unsafe { ptr.as_ptr().cast::<LiteralRef>().write(LiteralRef { text }) };
        RtString { ptr }
    }

    fn is_literal(&self) -> bool {
        // SAFETY: `self` keeps the block alive.
        let h = unsafe { heap::header(self.ptr) };
        h.cap == 0
    }

    pub fn len(&self) -> usize {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::header(self.ptr) }.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserved bytes; zero for literals.
    pub fn capacity(&self) -> usize {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::header(self.ptr) }.cap
    }

    pub fn as_bytes(&self) -> &[u8] {
        if self.is_literal() {
            // SAFETY: literal payloads always hold a `LiteralRef`.
            let lit = unsafe { &*self.ptr.as_ptr().cast::<LiteralRef>() };
            return lit.text.to_bytes();
        }
        // SAFETY: heap strings hold `len` initialized bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    /// NUL-terminated view of the bytes.
    pub fn as_cstr_bytes(&self) -> &[u8] {
        if self.is_literal() {
            // SAFETY: literal payloads always hold a `LiteralRef`.
            let lit = unsafe { &*self.ptr.as_ptr().cast::<LiteralRef>() };
            return lit.text.to_bytes_with_nul();
        }
        // SAFETY: heap strings reserve one trailing NUL byte.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len() + 1) }
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    pub fn refcount(&self) -> usize {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::refcount(self.ptr) }
    }

    pub fn is_empty_singleton(&self) -> bool {
        self.ptr == empty_payload()
    }

    pub fn ptr_eq(a: &RtString, b: &RtString) -> bool {
        a.ptr == b.ptr
    }

    /// Raw payload pointer, for identity checks in tests and debugging.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }
}

impl Clone for RtString {
    fn clone(&self) -> Self {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::retain(self.ptr) };
        RtString { ptr: self.ptr }
    }
}

impl Drop for RtString {
    fn drop(&mut self) {
        // SAFETY: this handle owns one reference.
        unsafe { heap::release(self.ptr) };
    }
}

impl PartialEq for RtString {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr || self.as_bytes() == other.as_bytes()
    }
}

impl Eq for RtString {}

impl std::hash::Hash for RtString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Debug for RtString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for RtString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl From<&str> for RtString {
    fn from(s: &str) -> Self {
        RtString::from_str(s)
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

pub fn rt_const_cstr(text: &'static CStr) -> RtString {
    RtString::from_static(text)
}

pub fn rt_str_empty() -> RtString {
    RtString::empty()
}

pub fn rt_len(s: Option<&RtString>) -> i64 {
    s.map_or(0, |s| s.len() as i64)
}

/// Concatenate, consuming both inputs.
pub fn rt_concat(a: RtString, b: RtString) -> RtString {
    if b.is_empty() {
        return a;
    }
    if a.is_empty() {
        return b;
    }
    let mut bytes = Vec::with_capacity(a.len() + b.len());
    bytes.extend_from_slice(a.as_bytes());
    bytes.extend_from_slice(b.as_bytes());
    // `a` and `b` may be the same block; each handle drops its own reference.
    RtString::from_bytes(&bytes)
}

// ---------------------------------------------------------------------------
// Slicing
// ---------------------------------------------------------------------------

/// Clamped slice; `start` is 0-based.
pub fn rt_substr(s: &RtString, start: i64, len: i64) -> RtString {
    let slen = s.len();
    let start = (start.max(0) as u64).min(slen as u64) as usize;
    let avail = slen - start;
    let take = (len.max(0) as u64).min(avail as u64) as usize;
    if take == 0 {
        return RtString::empty();
    }
    if start == 0 && take == slen {
        return s.clone();
    }
    RtString::from_bytes(&s.as_bytes()[start..start + take])
}

pub fn rt_left(s: &RtString, n: i64) -> RtString {
    if n < 0 {
        rt_trap(&format!("LEFT$: len must be >= 0 (got {n})"));
    }
    if n == 0 {
        return RtString::empty();
    }
    if n as u64 >= s.len() as u64 {
        return s.clone();
    }
    rt_substr(s, 0, n)
}

pub fn rt_right(s: &RtString, n: i64) -> RtString {
    if n < 0 {
        rt_trap(&format!("RIGHT$: len must be >= 0 (got {n})"));
    }
    let len = s.len();
    if n == 0 {
        return RtString::empty();
    }
    if n as u64 >= len as u64 {
        return s.clone();
    }
    rt_substr(s, (len - n as usize) as i64, n)
}

/// `MID$(s, start)` with a 1-based `start`; 0 and 1 both select from the
/// first byte.
pub fn rt_mid2(s: &RtString, start: i64) -> RtString {
    if start < 0 {
        rt_trap(&format!("MID$: start must be >= 0 (got {start})"));
    }
    let idx = (start - 1).max(0);
    let len = s.len() as i64;
    if idx == 0 {
        return s.clone();
    }
    if idx >= len {
        return RtString::empty();
    }
    rt_substr(s, idx, len - idx)
}

/// `MID$(s, start, len)` with a 1-based `start`.
pub fn rt_mid3(s: &RtString, start: i64, len: i64) -> RtString {
    if start < 0 {
        rt_trap(&format!("MID$: start must be >= 0 (got {start})"));
    }
    if len < 0 {
        rt_trap(&format!("MID$: len must be >= 0 (got {len})"));
    }
    let idx = (start - 1).max(0);
    let slen = s.len() as i64;
    if len == 0 || idx >= slen {
        return RtString::empty();
    }
    if idx == 0 && len >= slen {
        return s.clone();
    }
    rt_substr(s, idx, len.min(slen - idx))
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

fn find_from(hay: &[u8], start: usize, needle: &[u8]) -> i64 {
    let start = start.min(hay.len());
    if needle.len() > hay.len() - start {
        return 0;
    }
    hay[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map_or(0, |i| (start + i + 1) as i64)
}

/// 1-based position of `needle` in `hay`, 0 when absent. Empty needle → 1.
pub fn rt_instr2(hay: Option<&RtString>, needle: Option<&RtString>) -> i64 {
    let (Some(hay), Some(needle)) = (hay, needle) else {
        return 0;
    };
    if needle.is_empty() {
        return 1;
    }
    find_from(hay.as_bytes(), 0, needle.as_bytes())
}

/// Like [`rt_instr2`] starting at the 1-based `start`. An empty needle
/// returns the clamped start.
pub fn rt_instr3(start: i64, hay: Option<&RtString>, needle: Option<&RtString>) -> i64 {
    let (Some(hay), Some(needle)) = (hay, needle) else {
        return 0;
    };
    let pos = if start <= 1 { 0 } else { start - 1 };
    let pos = (pos as u64).min(hay.len() as u64) as usize;
    if needle.is_empty() {
        return pos as i64 + 1;
    }
    find_from(hay.as_bytes(), pos, needle.as_bytes())
}

// ---------------------------------------------------------------------------
// Trim and case
// ---------------------------------------------------------------------------

fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

pub fn rt_ltrim(s: &RtString) -> RtString {
    let bytes = s.as_bytes();
    let i = bytes.iter().position(|&b| !is_blank(b)).unwrap_or(bytes.len());
    rt_substr(s, i as i64, (bytes.len() - i) as i64)
}

pub fn rt_rtrim(s: &RtString) -> RtString {
    let bytes = s.as_bytes();
    let j = bytes.iter().rposition(|&b| !is_blank(b)).map_or(0, |j| j + 1);
    rt_substr(s, 0, j as i64)
}

pub fn rt_trim(s: &RtString) -> RtString {
    let bytes = s.as_bytes();
    let i = bytes.iter().position(|&b| !is_blank(b)).unwrap_or(bytes.len());
    let j = bytes.iter().rposition(|&b| !is_blank(b)).map_or(i, |j| j + 1);
    rt_substr(s, i as i64, (j - i) as i64)
}

pub fn rt_ucase(s: &RtString) -> RtString {
    RtString::from_bytes(&s.as_bytes().to_ascii_uppercase())
}

pub fn rt_lcase(s: &RtString) -> RtString {
    RtString::from_bytes(&s.as_bytes().to_ascii_lowercase())
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

pub fn rt_chr(code: i64) -> RtString {
    if !(0..=255).contains(&code) {
        rt_trap(&format!("CHR$: code must be 0-255 (got {code})"));
    }
    RtString::from_bytes(&[code as u8])
}

pub fn rt_asc(s: Option<&RtString>) -> i64 {
    let Some(s) = s else {
        rt_trap("rt_asc: null");
    };
    s.as_bytes().first().map_or(0, |&b| b as i64)
}

pub fn rt_space(n: i64) -> RtString {
    if n < 0 {
        rt_trap(&format!("SPACE$: len must be >= 0 (got {n})"));
    }
    RtString::filled(n as usize, b' ')
}

pub fn rt_string_rep(n: i64, code: i64) -> RtString {
    if n < 0 {
        rt_trap(&format!("STRING$: len must be >= 0 (got {n})"));
    }
    if !(0..=255).contains(&code) {
        rt_trap(&format!("STRING$: code must be 0-255 (got {code})"));
    }
    RtString::filled(n as usize, code as u8)
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

pub fn rt_str_eq(a: Option<&RtString>, b: Option<&RtString>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

pub fn rt_str_ne(a: Option<&RtString>, b: Option<&RtString>) -> bool {
    !rt_str_eq(a, b)
}

/// Bytewise ordering.
pub fn rt_str_cmp(a: &RtString, b: &RtString) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

pub fn rt_str_lt(a: &RtString, b: &RtString) -> bool {
    rt_str_cmp(a, b) == Ordering::Less
}

pub fn rt_str_le(a: &RtString, b: &RtString) -> bool {
    rt_str_cmp(a, b) != Ordering::Greater
}

pub fn rt_str_gt(a: &RtString, b: &RtString) -> bool {
    rt_str_cmp(a, b) == Ordering::Greater
}

pub fn rt_str_ge(a: &RtString, b: &RtString) -> bool {
    rt_str_cmp(a, b) != Ordering::Less
}

// ---------------------------------------------------------------------------
// Number conversions
// ---------------------------------------------------------------------------

/// Strict integer parse: surrounding whitespace allowed, nothing else.
pub fn rt_to_int(s: &RtString) -> i64 {
    let text = s.as_bytes();
    let i = text.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(text.len());
    let j = text.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(i, |j| j + 1);
    if i == j {
        rt_trap("rt_to_int: empty");
    }
    let digits = match std::str::from_utf8(&text[i..j]) {
        Ok(d) => d,
        Err(_) => rt_trap("rt_to_int: invalid"),
    };
    match digits.parse::<i64>() {
        Ok(v) => v,
        Err(_) => rt_trap("rt_to_int: invalid"),
    }
}

/// Writes decimal digits into a fixed stack buffer.
struct StackBuf {
    buf: [u8; 32],
    len: usize,
}

impl fmt::Write for StackBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

pub fn rt_int_to_str(v: i64) -> RtString {
    use std::fmt::Write;
    let mut sb = StackBuf { buf: [0; 32], len: 0 };
    if write!(sb, "{v}").is_ok() {
        return RtString::from_bytes(&sb.buf[..sb.len]);
    }
    RtString::from_str(&v.to_string())
}

/// `%g`-style layout using the shortest digits that round-trip.
pub fn format_f64(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    // `{:e}` yields the shortest round-trip mantissa, e.g. "1.2345e-7".
    let sci = format!("{:e}", v.abs());
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let sign = if v < 0.0 { "-" } else { "" };

    if exp < -4 || exp >= 17 {
        let (head, tail) = digits.split_at(1);
        let frac = if tail.is_empty() { String::new() } else { format!(".{tail}") };
        let esign = if exp < 0 { '-' } else { '+' };
        return format!("{sign}{head}{frac}e{esign}{:02}", exp.abs());
    }

    let ndigits = digits.len() as i32;
    if exp < 0 {
        let zeros = "0".repeat((-exp - 1) as usize);
        format!("{sign}0.{zeros}{digits}")
    } else if exp + 1 >= ndigits {
        let zeros = "0".repeat((exp + 1 - ndigits) as usize);
        format!("{sign}{digits}{zeros}")
    } else {
        let (int_part, frac_part) = digits.split_at((exp + 1) as usize);
        format!("{sign}{int_part}.{frac_part}")
    }
}

pub fn rt_f64_to_str(v: f64) -> RtString {
    RtString::from_str(&format_f64(v))
}

pub fn rt_str(v: f64) -> RtString {
    rt_f64_to_str(v)
}

/// Length of the longest numeric prefix of `b` (after leading blanks).
fn numeric_prefix(b: &[u8]) -> (usize, usize) {
    let mut i = 0;
    while i < b.len() && b[i].is_ascii_whitespace() {
        i += 1;
    }
    let start = i;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let mut seen_digits = i > int_start;
    if i < b.len() && b[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if seen_digits || j > frac_start {
            seen_digits = true;
            i = j;
        }
    }
    if !seen_digits {
        return (start, start);
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    (start, i)
}

/// Lenient numeric parse: longest numeric prefix, 0 when there is none.
pub fn rt_val(s: &RtString) -> f64 {
    let bytes = s.as_bytes();
    let (start, end) = numeric_prefix(bytes);
    if start == end {
        return 0.0;
    }
    let text = std::str::from_utf8(&bytes[start..end]).unwrap_or("0");
    let v = text.parse::<f64>().unwrap_or(0.0);
    if !v.is_finite() {
        rt_trap("rt_val: overflow");
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::trap::catch_trap;

    fn s(text: &str) -> RtString {
        RtString::from_str(text)
    }

    #[test]
    fn from_bytes_round_trips_and_is_nul_terminated() {
        let v = RtString::from_bytes(b"a\0b");
        assert_eq!(v.len(), 3);
        assert_eq!(v.as_bytes(), b"a\0b");
        assert_eq!(v.as_cstr_bytes(), b"a\0b\0");
    }

    #[test]
    fn space_and_string_rep_fill_bytes() {
        assert_eq!(rt_space(3).as_cstr_bytes(), b"   \0");
        assert_eq!(rt_string_rep(2, 42).as_bytes(), b"**");
        assert!(rt_space(0).is_empty());
    }

    #[test]
    fn impossible_lengths_trap_out_of_memory() {
        use crate::runtime::trap::TrapKind;
        let trap = catch_trap(|| rt_space(i64::MAX)).unwrap_err();
        assert_eq!(trap.kind, TrapKind::OutOfMemory);
        let trap = catch_trap(|| rt_string_rep(i64::MAX, 65)).unwrap_err();
        assert_eq!(trap.kind, TrapKind::OutOfMemory);
    }

    #[test]
    fn literal_has_zero_capacity() {
        let lit = rt_const_cstr(c"HELLO");
        assert_eq!(lit.capacity(), 0);
        assert_eq!(lit.as_bytes(), b"HELLO");
        assert_eq!(lit.as_cstr_bytes(), b"HELLO\0");
    }

    #[test]
    fn empty_singleton_is_shared_and_immortal() {
        let a = RtString::empty();
        let b = rt_substr(&s("xy"), 1, 0);
        assert!(RtString::ptr_eq(&a, &b));
        assert_eq!(a.refcount(), heap::IMMORTAL);
    }

    #[test]
    fn clone_and_drop_adjust_refcount() {
        let a = s("abc");
        assert_eq!(a.refcount(), 1);
        let b = a.clone();
        assert_eq!(a.refcount(), 2);
        drop(b);
        assert_eq!(a.refcount(), 1);
    }

    #[test]
    fn concat_of_aliased_inputs() {
        let a = s("ab");
        let r = rt_concat(a.clone(), a.clone());
        assert_eq!(r.as_bytes(), b"abab");
        assert_eq!(r.refcount(), 1);
        assert_eq!(a.refcount(), 1);
    }

    #[test]
    fn substr_clamps() {
        let v = s("HELLO");
        assert_eq!(rt_substr(&v, -5, 3).as_bytes(), b"HEL");
        assert!(rt_substr(&s("hi"), 100, 5).is_empty_singleton());
        let whole = rt_substr(&v, 0, 99);
        assert!(RtString::ptr_eq(&whole, &v));
    }

    #[test]
    fn left_right_mid() {
        let v = s("HELLO WORLD");
        assert_eq!(rt_left(&v, 5).as_bytes(), b"HELLO");
        assert_eq!(rt_right(&v, 5).as_bytes(), b"WORLD");
        assert_eq!(rt_mid3(&v, 3, 5).as_bytes(), b"LLO W");
        assert_eq!(rt_mid2(&v, 7).as_bytes(), b"WORLD");
        assert_eq!(rt_mid2(&v, 0).as_bytes(), b"HELLO WORLD");
        assert!(rt_mid3(&v, 50, 2).is_empty());
    }

    #[test]
    fn negative_lengths_trap() {
        let v = s("abc");
        let err = catch_trap(|| rt_left(&v, -1)).unwrap_err();
        assert_eq!(err.message, "LEFT$: len must be >= 0 (got -1)");
        let err = catch_trap(|| rt_mid3(&v, 1, -2)).unwrap_err();
        assert_eq!(err.message, "MID$: len must be >= 0 (got -2)");
    }

    #[test]
    fn instr_variants() {
        let hay = s("banana");
        assert_eq!(rt_instr2(Some(&hay), Some(&s("nan"))), 3);
        assert_eq!(rt_instr2(Some(&hay), Some(&s(""))), 1);
        assert_eq!(rt_instr2(Some(&hay), Some(&s("x"))), 0);
        assert_eq!(rt_instr3(4, Some(&hay), Some(&s("a"))), 4);
        assert_eq!(rt_instr3(5, Some(&hay), Some(&s("an"))), 0);
        assert_eq!(rt_instr3(100, Some(&hay), Some(&s(""))), 7);
        assert_eq!(rt_instr2(None, Some(&hay)), 0);
    }

    #[test]
    fn trims_space_and_tab_only() {
        let v = s(" \t hi \n\t ");
        assert_eq!(rt_ltrim(&v).as_bytes(), b"hi \n\t ");
        assert_eq!(rt_rtrim(&v).as_bytes(), b" \t hi \n");
        assert_eq!(rt_trim(&s("  x  ")).as_bytes(), b"x");
        assert!(rt_trim(&s("   ")).is_empty());
    }

    #[test]
    fn case_mapping_is_ascii_only() {
        assert_eq!(rt_ucase(&s("abc\u{e9}")).as_bytes(), "ABC\u{e9}".as_bytes());
        assert_eq!(rt_lcase(&s("AbC")).as_bytes(), b"abc");
    }

    #[test]
    fn chr_and_asc_boundaries() {
        assert_eq!(rt_chr(0).as_bytes(), &[0u8]);
        assert_eq!(rt_chr(255).as_bytes(), &[0xFFu8]);
        assert!(catch_trap(|| rt_chr(-1)).is_err());
        assert_eq!(catch_trap(|| rt_chr(256)).unwrap_err().message, "CHR$: code must be 0-255 (got 256)");
        assert_eq!(rt_asc(Some(&RtString::empty())), 0);
        assert_eq!(catch_trap(|| rt_asc(None)).unwrap_err().message, "rt_asc: null");
    }

    #[test]
    fn to_int_is_strict() {
        assert_eq!(rt_to_int(&s("  42 ")), 42);
        assert_eq!(rt_to_int(&s("-9223372036854775808")), i64::MIN);
        assert_eq!(catch_trap(|| rt_to_int(&s("   "))).unwrap_err().message, "rt_to_int: empty");
        assert_eq!(catch_trap(|| rt_to_int(&s("12x"))).unwrap_err().message, "rt_to_int: invalid");
        assert!(catch_trap(|| rt_to_int(&s("99999999999999999999"))).is_err());
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_f64(55.0), "55");
        assert_eq!(format_f64(2.5), "2.5");
        assert_eq!(format_f64(-0.125), "-0.125");
        assert_eq!(format_f64(0.0001), "0.0001");
        assert_eq!(format_f64(0.00001), "1e-05");
        assert_eq!(format_f64(1e20), "1e+20");
        assert_eq!(format_f64(123456789.0), "123456789");
    }

    #[test]
    fn val_takes_longest_prefix() {
        assert_eq!(rt_val(&s("  3.5abc")), 3.5);
        assert_eq!(rt_val(&s("-2e3")), -2000.0);
        assert_eq!(rt_val(&s("1e")), 1.0);
        assert_eq!(rt_val(&s("abc")), 0.0);
        assert_eq!(rt_val(&s(".5")), 0.5);
    }

    #[test]
    fn val_of_str_round_trips() {
        for x in [0.1, 1.0 / 3.0, -1234.5678e-9, 6.02214076e23, f64::MAX, f64::MIN_POSITIVE] {
            assert_eq!(rt_val(&rt_str(x)), x);
        }
    }

    #[test]
    fn string_comparisons() {
        assert!(rt_str_lt(&s("abc"), &s("abd")));
        assert!(rt_str_ge(&s("b"), &s("abc")));
        assert!(rt_str_eq(Some(&s("x")), Some(&s("x"))));
        assert!(!rt_str_eq(None, Some(&s("x"))));
        assert!(rt_str_ne(Some(&s("x")), Some(&s("y"))));
    }
}

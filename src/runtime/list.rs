//! Growable list of raw `i64` values on top of the `i64` array.

use super::array::{copy_payload, RtArray};
use super::trap::{rt_bounds_panic, rt_trap};

const MIN_CAPACITY: usize = 8;

#[derive(Clone, Debug, PartialEq)]
pub struct RtListI64 {
    buf: RtArray<i64>,
}

impl Default for RtListI64 {
    fn default() -> Self {
        Self::new()
    }
}

impl RtListI64 {
    pub fn new() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }

    pub fn with_capacity(cap: usize) -> Self {
        RtListI64 { buf: RtArray::with_capacity(0, cap.max(MIN_CAPACITY)) }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.buf.cap()
    }

    pub fn push(&mut self, value: i64) {
        let len = self.buf.len();
        if len < self.buf.cap() && self.buf.is_unique() {
            self.buf.set_len(len + 1);
            // SAFETY: `len < cap` and the length now covers the slot.
            unsafe { self.buf.set_unchecked(len, value) };
            return;
        }
        let new_cap = self.buf.cap().max(MIN_CAPACITY / 2).saturating_mul(2);
        let grown = RtArray::<i64>::with_capacity(len + 1, new_cap);
        copy_payload(&grown, &self.buf, len);
        // SAFETY: `len < len + 1 == grown.len()`.
        unsafe { grown.set_unchecked(len, value) };
        self.buf = grown;
    }

    pub fn pop(&mut self) -> i64 {
        let len = self.buf.len();
        if len == 0 {
            rt_trap("rt_list_i64_pop: empty list");
        }
        // SAFETY: `len - 1` is in bounds.
        let v = unsafe { self.buf.get_unchecked(len - 1) };
        if !self.buf.is_unique() {
            self.buf.make_unique();
        }
        self.buf.set_len(len - 1);
        v
    }

    pub fn peek(&self) -> i64 {
        let len = self.buf.len();
        if len == 0 {
            rt_trap("rt_list_i64_peek: empty list");
        }
        // SAFETY: `len - 1` is in bounds.
        unsafe { self.buf.get_unchecked(len - 1) }
    }

    pub fn get(&self, index: i64) -> i64 {
        if index < 0 || index as u64 >= self.len() as u64 {
            rt_bounds_panic(index, self.len());
        }
        // SAFETY: bounds checked above.
        unsafe { self.buf.get_unchecked(index as usize) }
    }

    pub fn set(&mut self, index: i64, value: i64) {
        if index < 0 || index as u64 >= self.len() as u64 {
            rt_bounds_panic(index, self.len());
        }
        self.buf.make_unique();
        // SAFETY: bounds checked above.
        unsafe { self.buf.set_unchecked(index as usize, value) };
    }

    pub fn clear(&mut self) {
        self.buf.make_unique();
        self.buf.set_len(0);
    }

    pub fn as_slice(&self) -> &[i64] {
        self.buf.as_slice()
    }
}

pub fn rt_list_i64_new() -> RtListI64 {
    RtListI64::new()
}

pub fn rt_list_i64_len(l: Option<&RtListI64>) -> i64 {
    l.map_or(0, |l| l.len() as i64)
}

pub fn rt_list_i64_push(l: &mut RtListI64, v: i64) {
    l.push(v)
}

pub fn rt_list_i64_pop(l: &mut RtListI64) -> i64 {
    l.pop()
}

pub fn rt_list_i64_peek(l: &RtListI64) -> i64 {
    l.peek()
}

pub fn rt_list_i64_get(l: &RtListI64, index: i64) -> i64 {
    l.get(index)
}

pub fn rt_list_i64_set(l: &mut RtListI64, index: i64, v: i64) {
    l.set(index, v)
}

pub fn rt_list_i64_clear(l: &mut RtListI64) {
    l.clear()
}

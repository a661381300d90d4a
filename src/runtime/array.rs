//! Typed arrays over the shared heap.
//!
//! `RtArray<T>` is the handle; the `i32`, `i64` and `f64` flavors get their
//! `rt_arr_*` entry points from [`array_flavor!`]. String arrays hold retained
//! string handles and live in [`RtStrArray`].

use std::marker::PhantomData;
use std::ptr::NonNull;

use super::heap::{self, AllocSpec, ElemKind, HeapKind};
use super::string::RtString;
use super::trap::{rt_bounds_panic, rt_trap};

/// Plain element types stored inline in an array payload.
pub trait ArrayElem: Copy + Default + PartialEq + std::fmt::Debug + 'static {
    const KIND: ElemKind;
    const NAME: &'static str;
}

impl ArrayElem for i32 {
    const KIND: ElemKind = ElemKind::I32;
    const NAME: &'static str = "rt_arr_i32";
}

impl ArrayElem for i64 {
    const KIND: ElemKind = ElemKind::I64;
    const NAME: &'static str = "rt_arr_i64";
}

impl ArrayElem for f64 {
    const KIND: ElemKind = ElemKind::F64;
    const NAME: &'static str = "rt_arr_f64";
}

/// Error returned by [`RtArray::resize`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArrayError {
    #[error("negative length {0}")]
    NegativeLength(i64),
    #[error("length {0} too large")]
    TooLarge(i64),
}

pub struct RtArray<T: ArrayElem> {
    ptr: NonNull<u8>,
    _elem: PhantomData<T>,
}

impl<T: ArrayElem> RtArray<T> {
    /// Zero-initialized array with `len == cap == len`.
    pub fn new(len: usize) -> Self {
        Self::with_capacity(len, len)
    }

    pub(crate) fn with_capacity(len: usize, cap: usize) -> Self {
        let ptr = heap::alloc(AllocSpec {
            kind: HeapKind::Array,
            elem_kind: T::KIND,
            elem_size: std::mem::size_of::<T>(),
            len,
            cap: cap.max(len),
            extra: 0,
            finalizer: None,
        });
        RtArray { ptr, _elem: PhantomData }
    }

    fn validate(&self) {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::validate(self.ptr, HeapKind::Array, T::KIND, T::NAME) };
    }

    pub fn len(&self) -> usize {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::header(self.ptr) }.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cap(&self) -> usize {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::header(self.ptr) }.cap
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.cap());
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::header(self.ptr) }.set_len(len);
    }

    pub fn refcount(&self) -> usize {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::refcount(self.ptr) }
    }

    /// True when this handle is the only owner.
    pub fn is_unique(&self) -> bool {
        self.refcount() == 1
    }

    fn data(&self) -> *mut T {
        self.ptr.as_ptr().cast::<T>()
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: payload holds `cap >= len` initialized (zeroed) elements.
        unsafe { std::slice::from_raw_parts(self.data(), self.len()) }
    }

    fn check_index(&self, index: i64) -> usize {
        let len = self.len();
        if index < 0 || index as u64 >= len as u64 {
            rt_bounds_panic(index, len);
        }
        index as usize
    }

    pub fn get(&self, index: i64) -> T {
        self.validate();
        let i = self.check_index(index);
        // SAFETY: bounds checked above.
        unsafe { *self.data().add(i) }
    }

    /// Write through the handle. Callers copy-on-write first when shared.
    pub fn set(&self, index: i64, value: T) {
        self.validate();
        let i = self.check_index(index);
        // SAFETY: bounds checked above.
        unsafe { *self.data().add(i) = value };
    }

    /// # Safety
    /// `index` must be in `0..len`.
    pub unsafe fn get_unchecked(&self, index: usize) -> T {
        // SAFETY: guaranteed by caller.
        unsafe { *self.data().add(index) }
    }

    /// # Safety
    /// `index` must be in `0..len`.
    pub unsafe fn set_unchecked(&self, index: usize, value: T) {
        // SAFETY: guaranteed by caller.
        unsafe { *self.data().add(index) = value };
    }

    /// Resize to `new_len`, growing in place when capacity allows and
    /// otherwise rebinding `self` to a fresh block with the old prefix.
    /// New slots read as zero. On error `self` is unchanged.
    pub fn resize(&mut self, new_len: i64) -> Result<(), ArrayError> {
        if new_len < 0 {
            return Err(ArrayError::NegativeLength(new_len));
        }
        let bytes = (new_len as u128) * std::mem::size_of::<T>() as u128;
        if bytes > isize::MAX as u128 {
            return Err(ArrayError::TooLarge(new_len));
        }
        let new_len = new_len as usize;
        let old_len = self.len();
        if new_len <= self.cap() && self.is_unique() {
            for i in old_len..new_len {
                // SAFETY: `i < cap`.
                unsafe { self.data().add(i).write(T::default()) };
            }
            self.set_len(new_len);
            return Ok(());
        }
        let fresh = RtArray::<T>::new(new_len);
        copy_payload(&fresh, self, old_len.min(new_len));
        *self = fresh;
        Ok(())
    }

    /// Private copy when shared; no-op when already unique.
    pub fn make_unique(&mut self) {
        if self.is_unique() {
            return;
        }
        let fresh = RtArray::<T>::new(self.len());
        copy_payload(&fresh, self, self.len());
        *self = fresh;
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }
}

impl<T: ArrayElem> Clone for RtArray<T> {
    fn clone(&self) -> Self {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::retain(self.ptr) };
        RtArray { ptr: self.ptr, _elem: PhantomData }
    }
}

impl<T: ArrayElem> Drop for RtArray<T> {
    fn drop(&mut self) {
        // SAFETY: this handle owns one reference.
        unsafe { heap::release(self.ptr) };
    }
}

impl<T: ArrayElem> std::fmt::Debug for RtArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: ArrayElem> PartialEq for RtArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

/// Copy `count` leading elements from `src` into `dst`.
pub fn copy_payload<T: ArrayElem>(dst: &RtArray<T>, src: &RtArray<T>, count: usize) {
    if count == 0 {
        return;
    }
    if count > dst.cap() || count > src.len() {
        rt_trap(&format!("{}_copy_payload: count {count} exceeds array size", T::NAME));
    }
    // SAFETY: both payloads hold at least `count` elements; distinct blocks
    // are required for a copy to be meaningful, overlapping copies use `copy`.
    unsafe { std::ptr::copy(src.data(), dst.data(), count) };
}

/// Expands the `rt_arr_<flavor>_*` entry points for one element type.
macro_rules! array_flavor {
    ($t:ty, $new:ident, $len:ident, $cap:ident, $get:ident, $set:ident, $resize:ident, $copy:ident) => {
        pub fn $new(len: i64) -> RtArray<$t> {
            if len < 0 {
                rt_trap(&format!("{}: negative length {len}", stringify!($new)));
            }
            RtArray::<$t>::new(len as usize)
        }

        pub fn $len(a: Option<&RtArray<$t>>) -> i64 {
            a.map_or(0, |a| a.len() as i64)
        }

        pub fn $cap(a: Option<&RtArray<$t>>) -> i64 {
            a.map_or(0, |a| a.cap() as i64)
        }

        pub fn $get(a: &RtArray<$t>, index: i64) -> $t {
            a.get(index)
        }

        pub fn $set(a: &RtArray<$t>, index: i64, value: $t) {
            a.set(index, value)
        }

        pub fn $resize(a: &mut RtArray<$t>, new_len: i64) -> Result<(), ArrayError> {
            a.resize(new_len)
        }

        pub fn $copy(dst: &RtArray<$t>, src: Option<&RtArray<$t>>, count: i64) {
            match src {
                None if count > 0 => rt_trap(concat!(stringify!($copy), ": null source")),
                None => {}
                Some(src) => copy_payload(dst, src, count.max(0) as usize),
            }
        }
    };
}

array_flavor!(i32, rt_arr_i32_new, rt_arr_i32_len, rt_arr_i32_cap, rt_arr_i32_get, rt_arr_i32_set, rt_arr_i32_resize, rt_arr_i32_copy_payload);
array_flavor!(i64, rt_arr_i64_new, rt_arr_i64_len, rt_arr_i64_cap, rt_arr_i64_get, rt_arr_i64_set, rt_arr_i64_resize, rt_arr_i64_copy_payload);
array_flavor!(f64, rt_arr_f64_new, rt_arr_f64_len, rt_arr_f64_cap, rt_arr_f64_get, rt_arr_f64_set, rt_arr_f64_resize, rt_arr_f64_copy_payload);

// ---------------------------------------------------------------------------
// String arrays
// ---------------------------------------------------------------------------

/// Array of string handles; elements are retained on store and released on
/// overwrite and when the array is freed. Empty slots read as "".
pub struct RtStrArray {
    ptr: NonNull<u8>,
}

type Slot = Option<RtString>;

unsafe fn finalize_str_array(payload: NonNull<u8>) {
    // SAFETY: the header is live until after the finalizer returns.
    let len = unsafe { heap::header(payload) }.len();
    let slots = payload.as_ptr().cast::<Slot>();
    for i in 0..len {
        // SAFETY: every slot in `0..len` is initialized (zero == None).
        unsafe { std::ptr::drop_in_place(slots.add(i)) };
    }
}

impl RtStrArray {
    pub fn new(len: usize) -> Self {
        let ptr = heap::alloc(AllocSpec {
            kind: HeapKind::Array,
            elem_kind: ElemKind::Str,
            elem_size: std::mem::size_of::<Slot>(),
            len,
            cap: len,
            extra: 0,
            finalizer: Some(finalize_str_array),
        });
        RtStrArray { ptr }
    }

    fn slots(&self) -> *mut Slot {
        self.ptr.as_ptr().cast::<Slot>()
    }

    pub fn len(&self) -> usize {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::header(self.ptr) }.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn refcount(&self) -> usize {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::refcount(self.ptr) }
    }

    fn check_index(&self, index: i64) -> usize {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::validate(self.ptr, HeapKind::Array, ElemKind::Str, "rt_arr_str") };
        let len = self.len();
        if index < 0 || index as u64 >= len as u64 {
            rt_bounds_panic(index, len);
        }
        index as usize
    }

    pub fn get(&self, index: i64) -> RtString {
        let i = self.check_index(index);
        // SAFETY: bounds checked; zeroed slots are valid `None`.
        let slot = unsafe { &*self.slots().add(i) };
        slot.clone().unwrap_or_else(RtString::empty)
    }

    pub fn set(&self, index: i64, value: RtString) {
        let i = self.check_index(index);
        // SAFETY: bounds checked; the old value is dropped (released) here.
        unsafe { *self.slots().add(i) = Some(value) };
    }

    /// Resize preserving the prefix; always rebinds to a fresh block.
    pub fn resize(&mut self, new_len: i64) -> Result<(), ArrayError> {
        if new_len < 0 {
            return Err(ArrayError::NegativeLength(new_len));
        }
        let fresh = RtStrArray::new(new_len as usize);
        for i in 0..self.len().min(new_len as usize) {
            fresh.set(i as i64, self.get(i as i64));
        }
        *self = fresh;
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<RtString> {
        (0..self.len()).map(|i| self.get(i as i64)).collect()
    }
}

impl Clone for RtStrArray {
    fn clone(&self) -> Self {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::retain(self.ptr) };
        RtStrArray { ptr: self.ptr }
    }
}

impl Drop for RtStrArray {
    fn drop(&mut self) {
        // SAFETY: this handle owns one reference.
        unsafe { heap::release(self.ptr) };
    }
}

impl std::fmt::Debug for RtStrArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

impl PartialEq for RtStrArray {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

pub fn rt_arr_str_new(len: i64) -> RtStrArray {
    if len < 0 {
        rt_trap(&format!("rt_arr_str_new: negative length {len}"));
    }
    RtStrArray::new(len as usize)
}

pub fn rt_arr_str_len(a: Option<&RtStrArray>) -> i64 {
    a.map_or(0, |a| a.len() as i64)
}

pub fn rt_arr_str_get(a: &RtStrArray, index: i64) -> RtString {
    a.get(index)
}

pub fn rt_arr_str_put(a: &RtStrArray, index: i64, value: RtString) {
    a.set(index, value)
}

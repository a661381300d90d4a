//! Shared heap for every reference-counted runtime object.
//!
//! Each allocation is a [`HeapHeader`] followed by the payload. Handles hold
//! the payload pointer; the header sits at a fixed negative offset from it.
//!
//! ```text
//! +-------------+----------------------------+
//! | HeapHeader  | payload (len/cap elements) |
//! +-------------+----------------------------+
//!               ^ payload pointer
//! ```

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::trap::{rt_trap, rt_trap_kind, TrapKind};

const HEAP_MAGIC: u32 = 0x5248_4550; // "RHEP"

/// Refcount value of immortal objects (the empty string singleton).
pub const IMMORTAL: usize = usize::MAX;

const PAYLOAD_ALIGN: usize = 16;

/// Top-level object category.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapKind {
    String = 1,
    Array = 2,
    Object = 3,
}

/// Element tag recorded in the header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemKind {
    None = 0,
    I32 = 1,
    I64 = 2,
    F64 = 3,
    Str = 4,
    Object = 5,
}

/// Finalizer invoked with the payload pointer right before the block is freed.
pub type Finalizer = unsafe fn(NonNull<u8>);

#[repr(C)]
pub struct HeapHeader {
    magic: u32,
    pub kind: HeapKind,
    pub elem_kind: ElemKind,
    pub elem_size: u16,
    refcnt: AtomicUsize,
    /// Updated in place by resize; every access goes through `len`/`set_len`.
    len: AtomicUsize,
    pub cap: usize,
    /// Payload byte size used for the layout; independent of `cap` for
    /// objects whose capacity field carries other meaning.
    alloc_bytes: usize,
    pub finalizer: Option<Finalizer>,
}

impl HeapHeader {
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn set_len(&self, len: usize) {
        self.len.store(len, Ordering::Release);
    }
}

const fn round_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

/// Distance from the start of the block to the payload.
pub const PAYLOAD_OFFSET: usize = round_up(std::mem::size_of::<HeapHeader>(), PAYLOAD_ALIGN);

fn too_large() -> ! {
    rt_trap_kind(TrapKind::OutOfMemory, "rt_heap_alloc: out of memory (allocation size overflow)")
}

fn layout_for(payload_bytes: usize) -> Layout {
    let total = match PAYLOAD_OFFSET.checked_add(payload_bytes) {
        Some(t) => t,
        None => too_large(),
    };
    match Layout::from_size_align(total, PAYLOAD_ALIGN) {
        Ok(l) => l,
        Err(_) => too_large(),
    }
}

/// Parameters of a fresh allocation.
#[derive(Debug, Clone, Copy)]
pub struct AllocSpec {
    pub kind: HeapKind,
    pub elem_kind: ElemKind,
    pub elem_size: usize,
    pub len: usize,
    pub cap: usize,
    /// Extra payload bytes on top of `cap * elem_size`.
    pub extra: usize,
    pub finalizer: Option<Finalizer>,
}

/// Allocate a zeroed block with refcount 1 and return the payload pointer.
/// Traps on size overflow or allocation failure.
pub fn alloc(spec: AllocSpec) -> NonNull<u8> {
    let elem_size = match u16::try_from(spec.elem_size) {
        Ok(s) => s,
        Err(_) => rt_trap("rt_heap_alloc: element size too large"),
    };
    let payload_bytes = spec
        .cap
        .checked_mul(spec.elem_size)
        .and_then(|b| b.checked_add(spec.extra));
    let payload_bytes = match payload_bytes {
        Some(b) => b,
        None => too_large(),
    };
    let layout = layout_for(payload_bytes);
    // SAFETY: layout has non-zero size (the header is never empty).
    let base = unsafe { alloc::alloc_zeroed(layout) };
    if base.is_null() {
        rt_trap_kind(TrapKind::OutOfMemory, "rt_heap_alloc: out of memory");
    }
    let header = base.cast::<HeapHeader>();
    // SAFETY: `base` is a fresh allocation large enough for a header.
    unsafe {
        header.write(HeapHeader {
            magic: HEAP_MAGIC,
            kind: spec.kind,
            elem_kind: spec.elem_kind,
            elem_size,
            refcnt: AtomicUsize::new(1),
            len: AtomicUsize::new(spec.len),
            cap: spec.cap,
            alloc_bytes: payload_bytes,
            finalizer: spec.finalizer,
        });
        NonNull::new_unchecked(base.add(PAYLOAD_OFFSET))
    }
}

/// Header of a payload pointer.
///
/// # Safety
/// `payload` must come from [`alloc`] and still be live.
pub unsafe fn header<'a>(payload: NonNull<u8>) -> &'a HeapHeader {
    // SAFETY: guaranteed by caller.
    unsafe { &*payload.as_ptr().sub(PAYLOAD_OFFSET).cast::<HeapHeader>() }
}

/// Trap unless the header carries the expected kind and element tag.
///
/// # Safety
/// `payload` must come from [`alloc`] and still be live.
pub unsafe fn validate(payload: NonNull<u8>, kind: HeapKind, elem: ElemKind, who: &str) {
    // SAFETY: guaranteed by caller.
    let h = unsafe { header(payload) };
    if h.magic != HEAP_MAGIC {
        rt_trap(&format!("{who}: corrupt heap header"));
    }
    if h.kind != kind || h.elem_kind != elem {
        rt_trap(&format!(
            "{who}: header tag mismatch (expected {kind:?}/{elem:?}, found {:?}/{:?})",
            h.kind, h.elem_kind
        ));
    }
}

/// Mark a block immortal; retain/release become no-ops.
///
/// # Safety
/// `payload` must come from [`alloc`] and still be live.
pub unsafe fn make_immortal(payload: NonNull<u8>) {
    // SAFETY: guaranteed by caller.
    unsafe { header(payload) }.refcnt.store(IMMORTAL, Ordering::Relaxed);
}

/// # Safety
/// `payload` must come from [`alloc`] and still be live.
pub unsafe fn refcount(payload: NonNull<u8>) -> usize {
    // SAFETY: guaranteed by caller.
    unsafe { header(payload) }.refcnt.load(Ordering::Acquire)
}

/// # Safety
/// `payload` must come from [`alloc`] and still be live.
pub unsafe fn retain(payload: NonNull<u8>) {
    // SAFETY: guaranteed by caller.
    let h = unsafe { header(payload) };
    if h.refcnt.load(Ordering::Relaxed) == IMMORTAL {
        return;
    }
    h.refcnt.fetch_add(1, Ordering::Relaxed);
}

/// Drop one reference. On zero the finalizer runs and the block is freed.
/// Returns `true` when the block was freed.
///
/// # Safety
/// `payload` must come from [`alloc`], be live, and the caller must own the
/// reference being released.
pub unsafe fn release(payload: NonNull<u8>) -> bool {
    // SAFETY: guaranteed by caller.
    let h = unsafe { header(payload) };
    if h.refcnt.load(Ordering::Relaxed) == IMMORTAL {
        return false;
    }
    if h.refcnt.fetch_sub(1, Ordering::Release) != 1 {
        return false;
    }
    std::sync::atomic::fence(Ordering::Acquire);
    if let Some(fin) = h.finalizer {
        // SAFETY: last reference; payload is still allocated.
        unsafe { fin(payload) };
    }
    let layout = layout_for(h.alloc_bytes);
    // SAFETY: same base pointer and layout as the allocation.
    unsafe { alloc::dealloc(payload.as_ptr().sub(PAYLOAD_OFFSET), layout) };
    true
}

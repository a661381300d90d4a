//! Heap objects carrying a Rust value as payload.
//!
//! `RtObj<T>` stores a `RefCell<T>` after the shared header and drops it from
//! the finalizer. Tries, line writers and BASIC class instances all use it.

use std::cell::{Ref, RefCell, RefMut};
use std::marker::PhantomData;
use std::ptr::NonNull;

use super::heap::{self, AllocSpec, ElemKind, HeapKind};
use super::string::RtString;
use super::trap::{rt_bounds_panic, rt_trap};

unsafe fn finalize_obj<T>(payload: NonNull<u8>) {
    // SAFETY: the payload was initialized with a `RefCell<T>` by `RtObj::new`.
    unsafe { std::ptr::drop_in_place(payload.as_ptr().cast::<RefCell<T>>()) };
}

pub struct RtObj<T: 'static> {
    ptr: NonNull<u8>,
    _value: PhantomData<RefCell<T>>,
}

impl<T: 'static> RtObj<T> {
    pub fn new(value: T) -> Self {
        if std::mem::align_of::<RefCell<T>>() > 16 {
            rt_trap("rt_obj_new: payload alignment too large");
        }
        let ptr = heap::alloc(AllocSpec {
            kind: HeapKind::Object,
            elem_kind: ElemKind::Object,
            elem_size: 1,
            len: 0,
            cap: 0,
            extra: std::mem::size_of::<RefCell<T>>(),
            finalizer: Some(finalize_obj::<T>),
        });
        // SAFETY: the payload is sized and aligned for `RefCell<T>`.
        unsafe { ptr.as_ptr().cast::<RefCell<T>>().write(RefCell::new(value)) };
        RtObj { ptr, _value: PhantomData }
    }

    fn cell(&self) -> &RefCell<T> {
        // SAFETY: initialized in `new`; alive while `self` is.
        unsafe { &*self.ptr.as_ptr().cast::<RefCell<T>>() }
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.cell().borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        match self.cell().try_borrow_mut() {
            Ok(r) => r,
            Err(_) => rt_trap("object is already in use"),
        }
    }

    pub fn refcount(&self) -> usize {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::refcount(self.ptr) }
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }

    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }
}

impl<T: 'static> Clone for RtObj<T> {
    fn clone(&self) -> Self {
        // SAFETY: `self` keeps the block alive.
        unsafe { heap::retain(self.ptr) };
        RtObj { ptr: self.ptr, _value: PhantomData }
    }
}

impl<T: 'static> Drop for RtObj<T> {
    fn drop(&mut self) {
        // SAFETY: this handle owns one reference.
        unsafe { heap::release(self.ptr) };
    }
}

impl<T: 'static> PartialEq for RtObj<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for RtObj<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cell().try_borrow() {
            Ok(v) => f.debug_tuple("RtObj").field(&*v).finish(),
            Err(_) => f.write_str("RtObj(<borrowed>)"),
        }
    }
}

// ---------------------------------------------------------------------------
// BASIC class instances
// ---------------------------------------------------------------------------

/// One field slot of a class instance.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Empty,
    I64(i64),
    F64(f64),
    Str(RtString),
    Obj(RtInstance),
}

#[derive(Debug)]
pub struct Instance {
    pub class: RtString,
    pub fields: Vec<FieldValue>,
    pub deleted: bool,
}

/// Reference-counted class instance. Cycles between instances are not
/// collected.
pub type RtInstance = RtObj<Instance>;

pub fn rt_obj_new(class: RtString, nfields: i64) -> RtInstance {
    if nfields < 0 {
        rt_trap(&format!("rt_obj_new: negative field count {nfields}"));
    }
    RtObj::new(Instance {
        class,
        fields: vec![FieldValue::Empty; nfields as usize],
        deleted: false,
    })
}

fn field_index(obj: &RtInstance, index: i64) -> usize {
    let inst = obj.borrow();
    if inst.deleted {
        rt_trap("object used after DELETE");
    }
    if index < 0 || index as u64 >= inst.fields.len() as u64 {
        rt_bounds_panic(index, inst.fields.len());
    }
    index as usize
}

pub fn rt_obj_get(obj: &RtInstance, index: i64) -> FieldValue {
    let i = field_index(obj, index);
    obj.borrow().fields[i].clone()
}

pub fn rt_obj_set(obj: &RtInstance, index: i64, value: FieldValue) {
    let i = field_index(obj, index);
    // Release the old value after the borrow ends; it may be another instance.
    let old = std::mem::replace(&mut obj.borrow_mut().fields[i], value);
    drop(old);
}

pub fn rt_obj_get_i64(obj: &RtInstance, index: i64) -> i64 {
    match rt_obj_get(obj, index) {
        FieldValue::I64(v) => v,
        FieldValue::F64(v) => v as i64,
        _ => 0,
    }
}

pub fn rt_obj_get_f64(obj: &RtInstance, index: i64) -> f64 {
    match rt_obj_get(obj, index) {
        FieldValue::F64(v) => v,
        FieldValue::I64(v) => v as f64,
        _ => 0.0,
    }
}

pub fn rt_obj_get_str(obj: &RtInstance, index: i64) -> RtString {
    match rt_obj_get(obj, index) {
        FieldValue::Str(s) => s,
        _ => RtString::empty(),
    }
}

/// Mark an instance deleted and drop its fields. Later field access traps.
pub fn rt_obj_delete(obj: &RtInstance) {
    let fields = {
        let mut inst = obj.borrow_mut();
        if inst.deleted {
            rt_trap("DELETE: object already deleted");
        }
        inst.deleted = true;
        std::mem::take(&mut inst.fields)
    };
    drop(fields);
}

pub fn rt_obj_class(obj: &RtInstance) -> RtString {
    obj.borrow().class.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::trap::catch_trap;
    use std::rc::Rc;

    struct DropFlag(Rc<std::cell::Cell<u32>>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn payload_dropped_on_last_release() {
        let hits = Rc::new(std::cell::Cell::new(0));
        let obj = RtObj::new(DropFlag(hits.clone()));
        let alias = obj.clone();
        drop(obj);
        assert_eq!(hits.get(), 0);
        drop(alias);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn instance_fields_round_trip() {
        let o = rt_obj_new(RtString::from_str("POINT"), 3);
        rt_obj_set(&o, 0, FieldValue::I64(4));
        rt_obj_set(&o, 1, FieldValue::F64(1.5));
        rt_obj_set(&o, 2, FieldValue::Str(RtString::from_str("p")));
        assert_eq!(rt_obj_get_i64(&o, 0), 4);
        assert_eq!(rt_obj_get_f64(&o, 1), 1.5);
        assert_eq!(rt_obj_get_str(&o, 2).as_bytes(), b"p");
        assert_eq!(rt_obj_class(&o).as_bytes(), b"POINT");
    }

    #[test]
    fn field_index_is_checked() {
        let o = rt_obj_new(RtString::from_str("C"), 1);
        assert!(catch_trap(|| rt_obj_get(&o, 1)).is_err());
    }

    #[test]
    fn delete_releases_fields_and_blocks_access() {
        let s = RtString::from_str("held");
        let o = rt_obj_new(RtString::from_str("C"), 1);
        rt_obj_set(&o, 0, FieldValue::Str(s.clone()));
        assert_eq!(s.refcount(), 2);
        rt_obj_delete(&o);
        assert_eq!(s.refcount(), 1);
        assert!(catch_trap(|| rt_obj_get(&o, 0)).is_err());
        assert!(catch_trap(|| rt_obj_delete(&o)).is_err());
    }
}

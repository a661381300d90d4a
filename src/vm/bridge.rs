//! Dispatch from `extern` names to runtime helpers.
//!
//! Each handler unpacks VM values, calls the typed helper in
//! [`crate::runtime`] and packs the result. A helper that traps unwinds out
//! of the handler; the interpreter catches it around the call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::builtins::dynamic;
use crate::runtime::array::{self, ArrayError, RtArray, RtStrArray};
use crate::runtime::linewriter::{self, RtLineWriter};
use crate::runtime::{
    channels, console, date, list, math, object, string as rts, trap, trie, FieldValue, RtInstance, RtListI64,
    RtString, RtTrie, TrieValue,
};

use super::{Handle, Value};

pub type Handler = fn(&[Value]) -> Value;

fn bad(i: usize, want: &str, got: Option<&Value>) -> ! {
    let got = got.map_or_else(|| "nothing".to_string(), |v| v.to_string());
    trap::rt_trap(&format!("invalid argument {i}: expected {want}, got {got}"))
}

fn null_ref(what: &str) -> ! {
    trap::rt_trap(&format!("invalid use of null {what} reference"))
}

fn int(a: &[Value], i: usize) -> i64 {
    match a.get(i) {
        Some(Value::Int(v)) => *v,
        other => bad(i, "integer", other),
    }
}

fn float(a: &[Value], i: usize) -> f64 {
    match a.get(i) {
        Some(v @ (Value::Float(_) | Value::Int(_))) => v.as_float().unwrap_or_default(),
        other => bad(i, "float", other),
    }
}

/// A string argument; a null string reads as empty.
fn text(a: &[Value], i: usize) -> RtString {
    match a.get(i) {
        Some(Value::Str(s)) => s.clone(),
        Some(Value::Ptr(Handle::Null)) | None => RtString::empty(),
        other => bad(i, "string", other),
    }
}

fn flag(b: bool) -> Value {
    Value::Int(b as i64)
}

fn resized(r: Result<(), ArrayError>) {
    if let Err(e) = r {
        trap::rt_trap(&format!("REDIM: {e}"))
    }
}

macro_rules! handle_arg {
    ($name:ident, $variant:ident, $ty:ty, $what:literal) => {
        fn $name(a: &[Value], i: usize) -> $ty {
            match a.get(i) {
                Some(Value::Ptr(Handle::$variant(h))) => h.clone(),
                Some(Value::Ptr(Handle::Null)) => null_ref($what),
                other => bad(i, $what, other),
            }
        }
    };
}

handle_arg!(arr_i32, ArrI32, RtArray<i32>, "array");
handle_arg!(arr_i64, ArrI64, RtArray<i64>, "array");
handle_arg!(arr_f64, ArrF64, RtArray<f64>, "array");
handle_arg!(arr_str, ArrStr, RtStrArray, "array");
handle_arg!(obj, Obj, RtInstance, "object");
handle_arg!(lst, List, Rc<RefCell<RtListI64>>, "list");
handle_arg!(tri, Trie, RtTrie, "trie");
handle_arg!(writer, Writer, RtLineWriter, "line writer");

fn ptr(h: Handle) -> Value {
    Value::Ptr(h)
}

macro_rules! handlers {
    ($($name:literal => |$a:ident| $body:expr,)*) => {
        &[$(($name, {
            #[allow(unused_variables)]
            fn handler($a: &[Value]) -> Value {
                $body
            }
            handler as Handler
        })),*]
    };
}

static TABLE: &[(&str, Handler)] = handlers! {
    // Strings
    "rt_concat" => |a| Value::Str(rts::rt_concat(text(a, 0), text(a, 1))),
    "rt_substr" => |a| Value::Str(rts::rt_substr(&text(a, 0), int(a, 1), int(a, 2))),
    "rt_left" => |a| Value::Str(rts::rt_left(&text(a, 0), int(a, 1))),
    "rt_right" => |a| Value::Str(rts::rt_right(&text(a, 0), int(a, 1))),
    "rt_mid2" => |a| Value::Str(rts::rt_mid2(&text(a, 0), int(a, 1))),
    "rt_mid3" => |a| Value::Str(rts::rt_mid3(&text(a, 0), int(a, 1), int(a, 2))),
    "rt_instr2" => |a| Value::Int(rts::rt_instr2(Some(&text(a, 0)), Some(&text(a, 1)))),
    "rt_instr3" => |a| Value::Int(rts::rt_instr3(int(a, 0), Some(&text(a, 1)), Some(&text(a, 2)))),
    "rt_ltrim" => |a| Value::Str(rts::rt_ltrim(&text(a, 0))),
    "rt_rtrim" => |a| Value::Str(rts::rt_rtrim(&text(a, 0))),
    "rt_trim" => |a| Value::Str(rts::rt_trim(&text(a, 0))),
    "rt_ucase" => |a| Value::Str(rts::rt_ucase(&text(a, 0))),
    "rt_lcase" => |a| Value::Str(rts::rt_lcase(&text(a, 0))),
    "rt_chr" => |a| Value::Str(rts::rt_chr(int(a, 0))),
    "rt_asc" => |a| Value::Int(rts::rt_asc(Some(&text(a, 0)))),
    "rt_len" => |a| Value::Int(rts::rt_len(Some(&text(a, 0)))),
    "rt_space" => |a| Value::Str(rts::rt_space(int(a, 0))),
    "rt_string_rep" => |a| Value::Str(rts::rt_string_rep(int(a, 0), int(a, 1))),
    "rt_str_eq" => |a| flag(rts::rt_str_eq(Some(&text(a, 0)), Some(&text(a, 1)))),
    "rt_str_ne" => |a| flag(rts::rt_str_ne(Some(&text(a, 0)), Some(&text(a, 1)))),
    "rt_str_lt" => |a| flag(rts::rt_str_lt(&text(a, 0), &text(a, 1))),
    "rt_str_le" => |a| flag(rts::rt_str_le(&text(a, 0), &text(a, 1))),
    "rt_str_gt" => |a| flag(rts::rt_str_gt(&text(a, 0), &text(a, 1))),
    "rt_str_ge" => |a| flag(rts::rt_str_ge(&text(a, 0), &text(a, 1))),
    "rt_to_int" => |a| Value::Int(rts::rt_to_int(&text(a, 0))),
    "rt_int_to_str" => |a| Value::Str(rts::rt_int_to_str(int(a, 0))),
    "rt_f64_to_str" => |a| Value::Str(rts::rt_f64_to_str(float(a, 0))),
    "rt_str" => |a| Value::Str(rts::rt_str(float(a, 0))),
    "rt_val" => |a| Value::Float(rts::rt_val(&text(a, 0))),

    // Math
    "rt_int_floor" => |a| Value::Int(math::rt_int_floor(float(a, 0))),
    "rt_fix_trunc" => |a| Value::Int(math::rt_fix_trunc(float(a, 0))),
    "rt_round_even" => |a| Value::Float(math::rt_round_even(float(a, 0), int(a, 1))),
    "rt_sqrt" => |a| Value::Float(math::rt_sqrt(float(a, 0))),
    "rt_abs_i64" => |a| Value::Int(math::rt_abs_i64(int(a, 0))),
    "rt_abs_f64" => |a| Value::Float(math::rt_abs_f64(float(a, 0))),
    "rt_floor" => |a| Value::Float(math::rt_floor(float(a, 0))),
    "rt_ceil" => |a| Value::Float(math::rt_ceil(float(a, 0))),
    "rt_sin" => |a| Value::Float(math::rt_sin(float(a, 0))),
    "rt_cos" => |a| Value::Float(math::rt_cos(float(a, 0))),
    "rt_tan" => |a| Value::Float(math::rt_tan(float(a, 0))),
    "rt_atan" => |a| Value::Float(math::rt_atan(float(a, 0))),
    "rt_exp" => |a| Value::Float(math::rt_exp(float(a, 0))),
    "rt_log" => |a| Value::Float(math::rt_log(float(a, 0))),
    "rt_sgn_i64" => |a| Value::Int(math::rt_sgn_i64(int(a, 0))),
    "rt_sgn_f64" => |a| Value::Int(math::rt_sgn_f64(float(a, 0))),
    "rt_pow_f64_chkdom" => |a| Value::Float(math::rt_pow_f64_chkdom(float(a, 0), float(a, 1))),
    "rt_randomize_i64" => |a| { math::rt_randomize_i64(int(a, 0)); Value::Void },
    "rt_rnd" => |a| Value::Float(math::rt_rnd()),

    // Console and terminal
    "rt_print_str" => |a| { console::rt_print_str(&text(a, 0)); Value::Void },
    "rt_print_i64" => |a| { console::rt_print_i64(int(a, 0)); Value::Void },
    "rt_print_f64" => |a| { console::rt_print_f64(float(a, 0)); Value::Void },
    "rt_print_nl" => |a| { console::rt_print_nl(); Value::Void },
    "rt_print_tab" => |a| { console::rt_print_tab(); Value::Void },
    "rt_input_line" => |a| Value::Str(console::rt_input_line()),
    "rt_term_cls" => |a| { console::rt_term_cls(); Value::Void },
    "rt_term_color" => |a| { console::rt_term_color(int(a, 0), int(a, 1)); Value::Void },
    "rt_term_locate" => |a| { console::rt_term_locate(int(a, 0), int(a, 1)); Value::Void },

    // File channels
    "rt_open" => |a| { channels::rt_open(&text(a, 0), int(a, 1), int(a, 2)); Value::Void },
    "rt_close" => |a| { channels::rt_close(int(a, 0)); Value::Void },
    "rt_close_all" => |a| { channels::rt_close_all(); Value::Void },
    "rt_seek" => |a| { channels::rt_seek(int(a, 0), int(a, 1)); Value::Void },
    "rt_eof" => |a| Value::Int(channels::rt_eof(int(a, 0))),
    "rt_line_input_ch" => |a| Value::Str(channels::rt_line_input_ch(int(a, 0))),
    "rt_print_ch_str" => |a| { channels::rt_print_ch_str(int(a, 0), &text(a, 1)); Value::Void },
    "rt_print_ch_i64" => |a| { channels::rt_print_ch_i64(int(a, 0), int(a, 1)); Value::Void },
    "rt_print_ch_f64" => |a| { channels::rt_print_ch_f64(int(a, 0), float(a, 1)); Value::Void },
    "rt_print_ch_nl" => |a| { channels::rt_print_ch_nl(int(a, 0)); Value::Void },
    "rt_print_ch_tab" => |a| { channels::rt_print_ch_tab(int(a, 0)); Value::Void },

    // Traps and errors
    "rt_trap" => |a| trap::rt_trap(&text(a, 0).to_string_lossy()),
    "rt_err" => |a| Value::Int(trap::rt_err()),
    // The interpreter stops the program itself; the handler only exists
    // so that modules declaring it load.
    "rt_end" => |a| Value::Void,
    "rt_arr_oob_panic" => |a| trap::rt_bounds_panic(int(a, 0), int(a, 1).max(0) as usize),

    // Arrays
    "rt_arr_i32_new" => |a| ptr(Handle::ArrI32(array::rt_arr_i32_new(int(a, 0)))),
    "rt_arr_i32_len" => |a| match a.first() {
        Some(Value::Ptr(Handle::ArrI32(h))) => Value::Int(array::rt_arr_i32_len(Some(h))),
        _ => Value::Int(0),
    },
    "rt_arr_i32_get" => |a| Value::Int(array::rt_arr_i32_get(&arr_i32(a, 0), int(a, 1)) as i64),
    "rt_arr_i32_set" => |a| {
        let v = i32::try_from(int(a, 2)).unwrap_or_else(|_| trap::rt_trap("integer overflow storing to i32 array"));
        { array::rt_arr_i32_set(&arr_i32(a, 0), int(a, 1), v); Value::Void }
    },
    "rt_arr_i32_resize" => |a| {
        let mut h = match a.first() {
            Some(Value::Ptr(Handle::ArrI32(h))) => h.clone(),
            _ => RtArray::new(0),
        };
        resized(array::rt_arr_i32_resize(&mut h, int(a, 1)));
        ptr(Handle::ArrI32(h))
    },
    "rt_arr_i64_new" => |a| ptr(Handle::ArrI64(array::rt_arr_i64_new(int(a, 0)))),
    "rt_arr_i64_len" => |a| match a.first() {
        Some(Value::Ptr(Handle::ArrI64(h))) => Value::Int(array::rt_arr_i64_len(Some(h))),
        _ => Value::Int(0),
    },
    "rt_arr_i64_get" => |a| Value::Int(array::rt_arr_i64_get(&arr_i64(a, 0), int(a, 1))),
    "rt_arr_i64_set" => |a| { array::rt_arr_i64_set(&arr_i64(a, 0), int(a, 1), int(a, 2)); Value::Void },
    "rt_arr_i64_resize" => |a| {
        let mut h = match a.first() {
            Some(Value::Ptr(Handle::ArrI64(h))) => h.clone(),
            _ => RtArray::new(0),
        };
        resized(array::rt_arr_i64_resize(&mut h, int(a, 1)));
        ptr(Handle::ArrI64(h))
    },
    "rt_arr_f64_new" => |a| ptr(Handle::ArrF64(array::rt_arr_f64_new(int(a, 0)))),
    "rt_arr_f64_len" => |a| match a.first() {
        Some(Value::Ptr(Handle::ArrF64(h))) => Value::Int(array::rt_arr_f64_len(Some(h))),
        _ => Value::Int(0),
    },
    "rt_arr_f64_get" => |a| Value::Float(array::rt_arr_f64_get(&arr_f64(a, 0), int(a, 1))),
    "rt_arr_f64_set" => |a| { array::rt_arr_f64_set(&arr_f64(a, 0), int(a, 1), float(a, 2)); Value::Void },
    "rt_arr_f64_resize" => |a| {
        let mut h = match a.first() {
            Some(Value::Ptr(Handle::ArrF64(h))) => h.clone(),
            _ => RtArray::new(0),
        };
        resized(array::rt_arr_f64_resize(&mut h, int(a, 1)));
        ptr(Handle::ArrF64(h))
    },
    "rt_arr_str_new" => |a| ptr(Handle::ArrStr(array::rt_arr_str_new(int(a, 0)))),
    "rt_arr_str_len" => |a| match a.first() {
        Some(Value::Ptr(Handle::ArrStr(h))) => Value::Int(array::rt_arr_str_len(Some(h))),
        _ => Value::Int(0),
    },
    "rt_arr_str_get" => |a| Value::Str(array::rt_arr_str_get(&arr_str(a, 0), int(a, 1))),
    "rt_arr_str_put" => |a| { array::rt_arr_str_put(&arr_str(a, 0), int(a, 1), text(a, 2)); Value::Void },
    "rt_arr_str_resize" => |a| {
        let mut h = match a.first() {
            Some(Value::Ptr(Handle::ArrStr(h))) => h.clone(),
            _ => RtStrArray::new(0),
        };
        resized(h.resize(int(a, 1)));
        ptr(Handle::ArrStr(h))
    },

    // Lists
    "rt_list_i64_new" => |a| ptr(Handle::List(Rc::new(RefCell::new(list::rt_list_i64_new())))),
    "rt_list_i64_len" => |a| match a.first() {
        Some(Value::Ptr(Handle::List(l))) => Value::Int(list::rt_list_i64_len(Some(&*l.borrow()))),
        _ => Value::Int(0),
    },
    "rt_list_i64_push" => |a| { list::rt_list_i64_push(&mut lst(a, 0).borrow_mut(), int(a, 1)); Value::Void },
    "rt_list_i64_pop" => |a| Value::Int(list::rt_list_i64_pop(&mut lst(a, 0).borrow_mut())),
    "rt_list_i64_peek" => |a| Value::Int(list::rt_list_i64_peek(&lst(a, 0).borrow())),
    "rt_list_i64_get" => |a| Value::Int(list::rt_list_i64_get(&lst(a, 0).borrow(), int(a, 1))),
    "rt_list_i64_set" => |a| { list::rt_list_i64_set(&mut lst(a, 0).borrow_mut(), int(a, 1), int(a, 2)); Value::Void },
    "rt_list_i64_clear" => |a| { list::rt_list_i64_clear(&mut lst(a, 0).borrow_mut()); Value::Void },

    // Objects
    "rt_obj_new" => |a| ptr(Handle::Obj(object::rt_obj_new(text(a, 0), int(a, 1)))),
    "rt_obj_class" => |a| Value::Str(object::rt_obj_class(&obj(a, 0))),
    "rt_obj_delete" => |a| match a.first() {
        Some(Value::Ptr(Handle::Null)) => Value::Void,
        _ => { object::rt_obj_delete(&obj(a, 0)); Value::Void },
    },
    "rt_obj_get_i64" => |a| Value::Int(object::rt_obj_get_i64(&obj(a, 0), int(a, 1))),
    "rt_obj_get_f64" => |a| Value::Float(object::rt_obj_get_f64(&obj(a, 0), int(a, 1))),
    "rt_obj_get_str" => |a| Value::Str(object::rt_obj_get_str(&obj(a, 0), int(a, 1))),
    "rt_obj_get_ptr" => |a| match object::rt_obj_get(&obj(a, 0), int(a, 1)) {
        FieldValue::Obj(o) => ptr(Handle::Obj(o)),
        _ => ptr(Handle::Null),
    },
    "rt_obj_set_i64" => |a| { object::rt_obj_set(&obj(a, 0), int(a, 1), FieldValue::I64(int(a, 2))); Value::Void },
    "rt_obj_set_f64" => |a| { object::rt_obj_set(&obj(a, 0), int(a, 1), FieldValue::F64(float(a, 2))); Value::Void },
    "rt_obj_set_str" => |a| { object::rt_obj_set(&obj(a, 0), int(a, 1), FieldValue::Str(text(a, 2))); Value::Void },
    "rt_obj_set_ptr" => |a| {
        let field = match a.get(2) {
            Some(Value::Ptr(Handle::Obj(o))) => FieldValue::Obj(o.clone()),
            Some(Value::Ptr(Handle::Null)) => FieldValue::Empty,
            other => bad(2, "object", other),
        };
        { object::rt_obj_set(&obj(a, 0), int(a, 1), field); Value::Void }
    },

    // Tries
    "rt_trie_new" => |a| ptr(Handle::Trie(trie::rt_trie_new())),
    "rt_trie_len" => |a| Value::Int(trie::rt_trie_len(&tri(a, 0))),
    "rt_trie_put_i64" => |a| { trie::rt_trie_put(&tri(a, 0), &text(a, 1), TrieValue::I64(int(a, 2))); Value::Void },
    "rt_trie_put_str" => |a| { trie::rt_trie_put(&tri(a, 0), &text(a, 1), TrieValue::Str(text(a, 2))); Value::Void },
    "rt_trie_get_i64" => |a| Value::Int(match trie::rt_trie_get(&tri(a, 0), &text(a, 1)) {
        Some(TrieValue::I64(v)) => v,
        Some(TrieValue::F64(x)) => x as i64,
        _ => 0,
    }),
    "rt_trie_get_str" => |a| Value::Str(match trie::rt_trie_get(&tri(a, 0), &text(a, 1)) {
        Some(TrieValue::Str(s)) => s,
        _ => RtString::empty(),
    }),
    "rt_trie_has" => |a| flag(trie::rt_trie_has(&tri(a, 0), &text(a, 1))),
    "rt_trie_has_prefix" => |a| flag(trie::rt_trie_has_prefix(&tri(a, 0), &text(a, 1))),
    "rt_trie_with_prefix" => |a| ptr(Handle::ArrStr(trie::rt_trie_with_prefix(&tri(a, 0), &text(a, 1)))),
    "rt_trie_keys" => |a| ptr(Handle::ArrStr(trie::rt_trie_keys(&tri(a, 0)))),
    "rt_trie_longest_prefix" => |a| Value::Str(trie::rt_trie_longest_prefix(&tri(a, 0), &text(a, 1))),
    "rt_trie_remove" => |a| flag(trie::rt_trie_remove(&tri(a, 0), &text(a, 1))),
    "rt_trie_clear" => |a| { trie::rt_trie_clear(&tri(a, 0)); Value::Void },

    // Dates
    "rt_date_from_ymd" => |a| Value::Int(date::rt_date_from_ymd(int(a, 0), int(a, 1), int(a, 2))),
    "rt_date_parse" => |a| Value::Int(date::rt_date_parse(&text(a, 0))),
    "rt_date_today" => |a| Value::Int(date::rt_date_today()),
    "rt_date_year" => |a| Value::Int(date::rt_date_year(int(a, 0))),
    "rt_date_month" => |a| Value::Int(date::rt_date_month(int(a, 0))),
    "rt_date_day" => |a| Value::Int(date::rt_date_day(int(a, 0))),
    "rt_date_day_of_week" => |a| Value::Int(date::rt_date_day_of_week(int(a, 0))),
    "rt_date_day_of_year" => |a| Value::Int(date::rt_date_day_of_year(int(a, 0))),
    "rt_date_is_leap_year" => |a| flag(date::rt_date_is_leap_year(int(a, 0))),
    "rt_date_days_in_month" => |a| Value::Int(date::rt_date_days_in_month(int(a, 0), int(a, 1))),
    "rt_date_add_days" => |a| Value::Int(date::rt_date_add_days(int(a, 0), int(a, 1))),
    "rt_date_add_months" => |a| Value::Int(date::rt_date_add_months(int(a, 0), int(a, 1))),
    "rt_date_add_years" => |a| Value::Int(date::rt_date_add_years(int(a, 0), int(a, 1))),
    "rt_date_diff_days" => |a| Value::Int(date::rt_date_diff_days(int(a, 0), int(a, 1))),
    "rt_date_start_of_month" => |a| Value::Int(date::rt_date_start_of_month(int(a, 0))),
    "rt_date_end_of_month" => |a| Value::Int(date::rt_date_end_of_month(int(a, 0))),
    "rt_date_start_of_year" => |a| Value::Int(date::rt_date_start_of_year(int(a, 0))),
    "rt_date_end_of_year" => |a| Value::Int(date::rt_date_end_of_year(int(a, 0))),
    "rt_date_compare" => |a| Value::Int(date::rt_date_compare(int(a, 0), int(a, 1))),
    "rt_date_equals" => |a| flag(date::rt_date_equals(int(a, 0), int(a, 1))),
    "rt_date_to_iso" => |a| Value::Str(date::rt_date_to_iso(int(a, 0))),
    "rt_date_format" => |a| Value::Str(date::rt_date_format(int(a, 0), &text(a, 1))),

    // Line writer
    "rt_linewriter_open" => |a| ptr(Handle::Writer(linewriter::rt_linewriter_open(&text(a, 0)))),
    "rt_linewriter_append" => |a| ptr(Handle::Writer(linewriter::rt_linewriter_append(&text(a, 0)))),
    "rt_linewriter_close" => |a| { linewriter::rt_linewriter_close(&writer(a, 0)); Value::Void },
    "rt_linewriter_write" => |a| { linewriter::rt_linewriter_write(&writer(a, 0), &text(a, 1)); Value::Void },
    "rt_linewriter_write_ln" => |a| { linewriter::rt_linewriter_write_ln(&writer(a, 0), &text(a, 1)); Value::Void },
    "rt_linewriter_write_char" => |a| { linewriter::rt_linewriter_write_char(&writer(a, 0), int(a, 1)); Value::Void },
    "rt_linewriter_flush" => |a| { linewriter::rt_linewriter_flush(&writer(a, 0)); Value::Void },
    "rt_linewriter_newline" => |a| match a.first() {
        Some(Value::Ptr(Handle::Writer(w))) => Value::Str(linewriter::rt_linewriter_newline(Some(w))),
        _ => Value::Str(linewriter::rt_linewriter_newline(None)),
    },
    "rt_linewriter_set_newline" => |a| { linewriter::rt_linewriter_set_newline(&writer(a, 0), text(a, 1)); Value::Void },
};

/// Name to handler map over the static table plus any dynamic bindings.
pub struct Bridge {
    handlers: HashMap<&'static str, Handler>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        Bridge { handlers: TABLE.iter().copied().collect() }
    }

    /// Static handlers win; otherwise fall back to a host binding.
    pub fn resolve(&self, name: &str) -> Option<Handler> {
        self.handlers
            .get(name)
            .copied()
            .or_else(|| dynamic::lookup(&name.to_ascii_uppercase()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }
}

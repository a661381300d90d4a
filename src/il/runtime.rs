//! IL signatures of the runtime helpers.
//!
//! The lowerer declares `extern`s from this table and the VM bridge checks
//! its handlers against it, so a helper's IL shape is written down once.
//! Containers, objects and writers travel as `ptr`.

use super::Type;
use super::Type::{F64, I1, I32, I64, Ptr, Str, Void};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSig {
    pub name: &'static str,
    pub params: &'static [Type],
    pub ret: Type,
}

const fn sig(name: &'static str, params: &'static [Type], ret: Type) -> RuntimeSig {
    RuntimeSig { name, params, ret }
}

static RUNTIME: &[RuntimeSig] = &[
    // Strings
    sig("rt_concat", &[Str, Str], Str),
    sig("rt_substr", &[Str, I64, I64], Str),
    sig("rt_left", &[Str, I64], Str),
    sig("rt_right", &[Str, I64], Str),
    sig("rt_mid2", &[Str, I64], Str),
    sig("rt_mid3", &[Str, I64, I64], Str),
    sig("rt_instr2", &[Str, Str], I64),
    sig("rt_instr3", &[I64, Str, Str], I64),
    sig("rt_ltrim", &[Str], Str),
    sig("rt_rtrim", &[Str], Str),
    sig("rt_trim", &[Str], Str),
    sig("rt_ucase", &[Str], Str),
    sig("rt_lcase", &[Str], Str),
    sig("rt_chr", &[I32], Str),
    sig("rt_asc", &[Str], I64),
    sig("rt_len", &[Str], I64),
    sig("rt_space", &[I64], Str),
    sig("rt_string_rep", &[I64, I64], Str),
    sig("rt_str_eq", &[Str, Str], I1),
    sig("rt_str_ne", &[Str, Str], I1),
    sig("rt_str_lt", &[Str, Str], I1),
    sig("rt_str_le", &[Str, Str], I1),
    sig("rt_str_gt", &[Str, Str], I1),
    sig("rt_str_ge", &[Str, Str], I1),
    sig("rt_to_int", &[Str], I64),
    sig("rt_int_to_str", &[I64], Str),
    sig("rt_f64_to_str", &[F64], Str),
    sig("rt_str", &[F64], Str),
    sig("rt_val", &[Str], F64),
    // Math
    sig("rt_int_floor", &[F64], I64),
    sig("rt_fix_trunc", &[F64], I64),
    sig("rt_round_even", &[F64, I64], F64),
    sig("rt_sqrt", &[F64], F64),
    sig("rt_abs_i64", &[I64], I64),
    sig("rt_abs_f64", &[F64], F64),
    sig("rt_floor", &[F64], F64),
    sig("rt_ceil", &[F64], F64),
    sig("rt_sin", &[F64], F64),
    sig("rt_cos", &[F64], F64),
    sig("rt_tan", &[F64], F64),
    sig("rt_atan", &[F64], F64),
    sig("rt_exp", &[F64], F64),
    sig("rt_log", &[F64], F64),
    sig("rt_sgn_i64", &[I64], I64),
    sig("rt_sgn_f64", &[F64], I64),
    sig("rt_pow_f64_chkdom", &[F64, F64], F64),
    sig("rt_randomize_i64", &[I64], Void),
    sig("rt_rnd", &[], F64),
    // Console and terminal
    sig("rt_print_str", &[Str], Void),
    sig("rt_print_i64", &[I64], Void),
    sig("rt_print_f64", &[F64], Void),
    sig("rt_print_nl", &[], Void),
    sig("rt_print_tab", &[], Void),
    sig("rt_input_line", &[], Str),
    sig("rt_term_cls", &[], Void),
    sig("rt_term_color", &[I64, I64], Void),
    sig("rt_term_locate", &[I64, I64], Void),
    // File channels
    sig("rt_open", &[Str, I64, I64], Void),
    sig("rt_close", &[I64], Void),
    sig("rt_close_all", &[], Void),
    sig("rt_seek", &[I64, I64], Void),
    sig("rt_eof", &[I64], I64),
    sig("rt_line_input_ch", &[I64], Str),
    sig("rt_print_ch_str", &[I64, Str], Void),
    sig("rt_print_ch_i64", &[I64, I64], Void),
    sig("rt_print_ch_f64", &[I64, F64], Void),
    sig("rt_print_ch_nl", &[I64], Void),
    sig("rt_print_ch_tab", &[I64], Void),
    // Traps and errors
    sig("rt_trap", &[Str], Void),
    sig("rt_err", &[], I64),
    sig("rt_end", &[], Void),
    sig("rt_arr_oob_panic", &[I64, I64], Void),
    // Arrays
    sig("rt_arr_i32_new", &[I64], Ptr),
    sig("rt_arr_i32_len", &[Ptr], I64),
    sig("rt_arr_i32_get", &[Ptr, I64], I64),
    sig("rt_arr_i32_set", &[Ptr, I64, I64], Void),
    sig("rt_arr_i32_resize", &[Ptr, I64], Ptr),
    sig("rt_arr_i64_new", &[I64], Ptr),
    sig("rt_arr_i64_len", &[Ptr], I64),
    sig("rt_arr_i64_get", &[Ptr, I64], I64),
    sig("rt_arr_i64_set", &[Ptr, I64, I64], Void),
    sig("rt_arr_i64_resize", &[Ptr, I64], Ptr),
    sig("rt_arr_f64_new", &[I64], Ptr),
    sig("rt_arr_f64_len", &[Ptr], I64),
    sig("rt_arr_f64_get", &[Ptr, I64], F64),
    sig("rt_arr_f64_set", &[Ptr, I64, F64], Void),
    sig("rt_arr_f64_resize", &[Ptr, I64], Ptr),
    sig("rt_arr_str_new", &[I64], Ptr),
    sig("rt_arr_str_len", &[Ptr], I64),
    sig("rt_arr_str_get", &[Ptr, I64], Str),
    sig("rt_arr_str_put", &[Ptr, I64, Str], Void),
    sig("rt_arr_str_resize", &[Ptr, I64], Ptr),
    // Lists
    sig("rt_list_i64_new", &[], Ptr),
    sig("rt_list_i64_len", &[Ptr], I64),
    sig("rt_list_i64_push", &[Ptr, I64], Void),
    sig("rt_list_i64_pop", &[Ptr], I64),
    sig("rt_list_i64_peek", &[Ptr], I64),
    sig("rt_list_i64_get", &[Ptr, I64], I64),
    sig("rt_list_i64_set", &[Ptr, I64, I64], Void),
    sig("rt_list_i64_clear", &[Ptr], Void),
    // Objects
    sig("rt_obj_new", &[Str, I64], Ptr),
    sig("rt_obj_class", &[Ptr], Str),
    sig("rt_obj_delete", &[Ptr], Void),
    sig("rt_obj_get_i64", &[Ptr, I64], I64),
    sig("rt_obj_get_f64", &[Ptr, I64], F64),
    sig("rt_obj_get_str", &[Ptr, I64], Str),
    sig("rt_obj_get_ptr", &[Ptr, I64], Ptr),
    sig("rt_obj_set_i64", &[Ptr, I64, I64], Void),
    sig("rt_obj_set_f64", &[Ptr, I64, F64], Void),
    sig("rt_obj_set_str", &[Ptr, I64, Str], Void),
    sig("rt_obj_set_ptr", &[Ptr, I64, Ptr], Void),
    // Tries
    sig("rt_trie_new", &[], Ptr),
    sig("rt_trie_len", &[Ptr], I64),
    sig("rt_trie_put_i64", &[Ptr, Str, I64], Void),
    sig("rt_trie_put_str", &[Ptr, Str, Str], Void),
    sig("rt_trie_get_i64", &[Ptr, Str], I64),
    sig("rt_trie_get_str", &[Ptr, Str], Str),
    sig("rt_trie_has", &[Ptr, Str], I1),
    sig("rt_trie_has_prefix", &[Ptr, Str], I1),
    sig("rt_trie_with_prefix", &[Ptr, Str], Ptr),
    sig("rt_trie_keys", &[Ptr], Ptr),
    sig("rt_trie_longest_prefix", &[Ptr, Str], Str),
    sig("rt_trie_remove", &[Ptr, Str], I1),
    sig("rt_trie_clear", &[Ptr], Void),
    // Dates (day numbers)
    sig("rt_date_from_ymd", &[I64, I64, I64], I64),
    sig("rt_date_parse", &[Str], I64),
    sig("rt_date_today", &[], I64),
    sig("rt_date_year", &[I64], I64),
    sig("rt_date_month", &[I64], I64),
    sig("rt_date_day", &[I64], I64),
    sig("rt_date_day_of_week", &[I64], I64),
    sig("rt_date_day_of_year", &[I64], I64),
    sig("rt_date_is_leap_year", &[I64], I1),
    sig("rt_date_days_in_month", &[I64, I64], I64),
    sig("rt_date_add_days", &[I64, I64], I64),
    sig("rt_date_add_months", &[I64, I64], I64),
    sig("rt_date_add_years", &[I64, I64], I64),
    sig("rt_date_diff_days", &[I64, I64], I64),
    sig("rt_date_start_of_month", &[I64], I64),
    sig("rt_date_end_of_month", &[I64], I64),
    sig("rt_date_start_of_year", &[I64], I64),
    sig("rt_date_end_of_year", &[I64], I64),
    sig("rt_date_compare", &[I64, I64], I64),
    sig("rt_date_equals", &[I64, I64], I1),
    sig("rt_date_to_iso", &[I64], Str),
    sig("rt_date_format", &[I64, Str], Str),
    // Line writer
    sig("rt_linewriter_open", &[Str], Ptr),
    sig("rt_linewriter_append", &[Str], Ptr),
    sig("rt_linewriter_close", &[Ptr], Void),
    sig("rt_linewriter_write", &[Ptr, Str], Void),
    sig("rt_linewriter_write_ln", &[Ptr, Str], Void),
    sig("rt_linewriter_write_char", &[Ptr, I64], Void),
    sig("rt_linewriter_flush", &[Ptr], Void),
    sig("rt_linewriter_newline", &[Ptr], Str),
    sig("rt_linewriter_set_newline", &[Ptr, Str], Void),
];

pub fn all() -> &'static [RuntimeSig] {
    RUNTIME
}

pub fn signature(name: &str) -> Option<&'static RuntimeSig> {
    RUNTIME.iter().find(|s| s.name == name)
}

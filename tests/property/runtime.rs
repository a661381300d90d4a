// Property-based tests for the reference-counted runtime.
//
// Each property compares a runtime routine against a plain Rust reference
// over generated inputs. Inputs stay inside the documented domains so no
// property ever reaches a trap.
//
// Run with more cases:
//   PROPTEST_CASES=1000 cargo test --test runtime_props

use proptest::prelude::*;

use ilc::runtime::trie::Trie;
use ilc::runtime::{RtArray, RtListI64, TrieValue};
use ilc::runtime::string::{
    format_f64, rt_concat, rt_instr2, rt_int_to_str, rt_lcase, rt_left, rt_mid3, rt_right, rt_substr, rt_to_int,
    rt_trim, rt_ucase, rt_val,
};
use ilc::runtime::RtString;

fn text() -> impl Strategy<Value = String> {
    "[ -~]{0,40}"
}

// =============================================================================
// Strings
// =============================================================================

proptest! {
    #[test]
    fn concat_joins_bytes(a in text(), b in text()) {
        let joined = rt_concat(RtString::from_str(&a), RtString::from_str(&b));
        let expected = format!("{a}{b}");
        prop_assert_eq!(joined.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn concat_releases_its_inputs(a in "[a-z]{1,20}", b in "[a-z]{1,20}") {
        let left = RtString::from_str(&a);
        let keep = left.clone();
        prop_assert_eq!(keep.refcount(), 2);
        let joined = rt_concat(left, RtString::from_str(&b));
        prop_assert_eq!(keep.refcount(), 1);
        prop_assert_eq!(joined.refcount(), 1);
    }

    #[test]
    fn substr_is_a_clamped_slice(s in text(), start in -5i64..60, len in -5i64..60) {
        let got = rt_substr(&RtString::from_str(&s), start, len);
        let bytes = s.as_bytes();
        let from = (start.max(0) as usize).min(bytes.len());
        let to = (from + len.max(0) as usize).min(bytes.len());
        prop_assert_eq!(got.as_bytes(), &bytes[from..to]);
    }

    #[test]
    fn left_and_right_cover_the_string(s in text(), n in 0i64..50) {
        let rs = RtString::from_str(&s);
        let k = (n as usize).min(s.len());
        let left = rt_left(&rs, n);
        let right = rt_right(&rs, n);
        prop_assert_eq!(left.as_bytes(), &s.as_bytes()[..k]);
        prop_assert_eq!(right.as_bytes(), &s.as_bytes()[s.len() - k..]);
    }

    #[test]
    fn mid_matches_one_based_slicing(s in text(), start in 1i64..50, len in 0i64..50) {
        let got = rt_mid3(&RtString::from_str(&s), start, len);
        let bytes = s.as_bytes();
        let from = ((start - 1) as usize).min(bytes.len());
        let to = (from + len as usize).min(bytes.len());
        prop_assert_eq!(got.as_bytes(), &bytes[from..to]);
    }

    #[test]
    fn instr_finds_the_first_match(hay in "[ab]{0,30}", needle in "[ab]{1,4}") {
        let pos = rt_instr2(Some(&RtString::from_str(&hay)), Some(&RtString::from_str(&needle)));
        let expected = hay.find(&needle).map_or(0, |i| i as i64 + 1);
        prop_assert_eq!(pos, expected);
    }

    #[test]
    fn case_mapping_is_ascii(s in text()) {
        let rs = RtString::from_str(&s);
        prop_assert_eq!(rt_ucase(&rs).to_string_lossy(), s.to_ascii_uppercase());
        prop_assert_eq!(rt_lcase(&rs).to_string_lossy(), s.to_ascii_lowercase());
    }

    #[test]
    fn trim_strips_blanks(core in "[a-z]{0,10}", l in 0usize..4, r in 0usize..4) {
        let padded = format!("{}{core}{}", " ".repeat(l), " ".repeat(r));
        prop_assert_eq!(rt_trim(&RtString::from_str(&padded)).to_string_lossy(), core);
    }
}

// =============================================================================
// Number formatting and parsing
// =============================================================================

proptest! {
    #[test]
    fn integers_print_and_parse_back(v in any::<i64>()) {
        let s = rt_int_to_str(v);
        prop_assert_eq!(s.to_string_lossy(), v.to_string());
        prop_assert_eq!(rt_to_int(&s), v);
    }

    #[test]
    fn doubles_print_shortest_round_trip(v in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        let text = format_f64(v);
        let back: f64 = text.parse().unwrap();
        prop_assert_eq!(back, v, "{}", text);
        prop_assert_eq!(rt_val(&RtString::from_str(&text)), v);
    }

    #[test]
    fn whole_doubles_have_no_point(v in -1_000_000_000i64..1_000_000_000) {
        prop_assert_eq!(format_f64(v as f64), v.to_string());
    }

    #[test]
    fn val_reads_the_numeric_prefix(n in 0i64..100_000, tail in "[a-z ]{0,8}") {
        let s = RtString::from_str(&format!("  {n}{tail}"));
        prop_assert_eq!(rt_val(&s), n as f64);
    }
}

// =============================================================================
// Arrays
// =============================================================================

proptest! {
    #[test]
    fn resize_keeps_the_prefix_and_zeroes_the_rest(
        values in prop::collection::vec(any::<i64>(), 0..32),
        new_len in 0i64..64,
    ) {
        let mut arr = RtArray::<i64>::new(values.len());
        for (i, v) in values.iter().enumerate() {
            arr.set(i as i64, *v);
        }
        arr.resize(new_len).unwrap();
        prop_assert_eq!(arr.len(), new_len as usize);
        let keep = values.len().min(new_len as usize);
        prop_assert_eq!(&arr.as_slice()[..keep], &values[..keep]);
        prop_assert!(arr.as_slice()[keep..].iter().all(|v| *v == 0));
    }

    #[test]
    fn shared_arrays_copy_before_writing(values in prop::collection::vec(any::<i64>(), 1..16), idx in 0usize..16) {
        let idx = idx % values.len();
        let mut a = RtArray::<i64>::new(values.len());
        for (i, v) in values.iter().enumerate() {
            a.set(i as i64, *v);
        }
        let b = a.clone();
        prop_assert_eq!(a.refcount(), 2);
        a.make_unique();
        a.set(idx as i64, values[idx].wrapping_add(1));
        prop_assert_eq!(b.to_vec(), values.clone());
        prop_assert_eq!(a.refcount(), 1);
        prop_assert_eq!(b.refcount(), 1);
    }

    #[test]
    fn negative_resize_is_rejected(len in 0usize..8, bad in i64::MIN..0) {
        let mut arr = RtArray::<f64>::new(len);
        prop_assert!(arr.resize(bad).is_err());
        prop_assert_eq!(arr.len(), len);
    }
}

// =============================================================================
// Lists and tries
// =============================================================================

proptest! {
    #[test]
    fn list_pushes_are_readable(values in prop::collection::vec(any::<i64>(), 1..100)) {
        let mut list = RtListI64::new();
        for v in &values {
            list.push(*v);
        }
        prop_assert_eq!(list.len(), values.len());
        prop_assert!(list.cap() >= values.len());
        prop_assert_eq!(list.peek(), *values.last().unwrap());
        for (i, v) in values.iter().enumerate() {
            prop_assert_eq!(list.get(i as i64), *v);
        }
        let mut popped = Vec::new();
        while !list.is_empty() {
            popped.push(list.pop());
        }
        popped.reverse();
        prop_assert_eq!(popped, values);
    }

    #[test]
    fn trie_membership_agrees_with_a_set(
        keys in prop::collection::btree_set("[a-c]{0,6}", 0..20),
        probes in prop::collection::vec("[a-c]{0,6}", 0..20),
    ) {
        let mut trie = Trie::new();
        for (i, k) in keys.iter().enumerate() {
            trie.put(k.as_bytes(), TrieValue::I64(i as i64));
        }
        prop_assert_eq!(trie.len(), keys.len());
        let listed: Vec<Vec<u8>> = keys.iter().map(|k| k.as_bytes().to_vec()).collect();
        prop_assert_eq!(trie.keys(), listed);
        for p in probes.iter().chain(keys.iter()) {
            let member = keys.contains(p);
            prop_assert_eq!(trie.has(p.as_bytes()), member);
            prop_assert_eq!(trie.get(p.as_bytes()).is_some(), member);
        }
    }

    #[test]
    fn trie_remove_is_idempotent(keys in prop::collection::btree_set("[a-c]{1,5}", 1..12)) {
        let mut trie = Trie::new();
        for k in &keys {
            trie.put(k.as_bytes(), TrieValue::I64(1));
        }
        let victim = keys.iter().next().unwrap();
        prop_assert!(trie.remove(victim.as_bytes()));
        let after = trie.keys();
        prop_assert!(!trie.remove(victim.as_bytes()));
        prop_assert_eq!(trie.keys(), after);
        prop_assert_eq!(trie.len(), keys.len() - 1);
    }
}

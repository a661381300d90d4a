//! Prefix tree over ASCII keys.
//!
//! Each node owns a fixed table of 128 children. `remove` only clears the
//! terminal flag; empty branches stay allocated until `clear` or drop, which
//! keeps removal O(key length) at the cost of memory.
//!
//! Values are primitives or strings. Container values are not accepted, so a
//! trie can never take part in a reference cycle.

use super::array::RtStrArray;
use super::object::RtObj;
use super::string::RtString;
use super::trap::rt_trap;

const FANOUT: usize = 128;
const INITIAL_KEY_BUF: usize = 4096;

#[derive(Clone, Debug, PartialEq)]
pub enum TrieValue {
    I64(i64),
    F64(f64),
    Str(RtString),
}

struct Node {
    children: [Option<Box<Node>>; FANOUT],
    value: Option<TrieValue>,
    terminal: bool,
}

impl Node {
    fn new() -> Box<Node> {
        Box::new(Node {
            children: std::array::from_fn(|_| None),
            value: None,
            terminal: false,
        })
    }
}

pub struct Trie {
    root: Box<Node>,
    count: usize,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Trie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trie").field("count", &self.count).finish()
    }
}

impl Trie {
    pub fn new() -> Self {
        Trie { root: Node::new(), count: 0 }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn find(&self, key: &[u8]) -> Option<&Node> {
        let mut node = &*self.root;
        for &b in key {
            if b as usize >= FANOUT {
                return None;
            }
            node = node.children[b as usize].as_deref()?;
        }
        Some(node)
    }

    /// Insert or replace. The previous value (if any) is released.
    pub fn put(&mut self, key: &[u8], value: TrieValue) {
        if let Some(&b) = key.iter().find(|&&b| b as usize >= FANOUT) {
            rt_trap(&format!("Trie.Put: key byte {b} is not ASCII"));
        }
        let mut node = &mut *self.root;
        for &b in key {
            node = &mut **node.children[b as usize].get_or_insert_with(Node::new);
        }
        if !node.terminal {
            node.terminal = true;
            self.count += 1;
        }
        node.value = Some(value);
    }

    pub fn get(&self, key: &[u8]) -> Option<TrieValue> {
        self.find(key).filter(|n| n.terminal).and_then(|n| n.value.clone())
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.find(key).is_some_and(|n| n.terminal)
    }

    pub fn has_prefix(&self, prefix: &[u8]) -> bool {
        let Some(start) = self.find(prefix) else {
            return false;
        };
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if node.terminal {
                return true;
            }
            stack.extend(node.children.iter().flatten().map(|c| &**c));
        }
        false
    }

    /// All keys under `prefix`, in lexicographic order.
    pub fn with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let Some(start) = self.find(prefix) else {
            return out;
        };
        let mut buf: Vec<u8> = Vec::with_capacity(INITIAL_KEY_BUF.max(prefix.len()));
        buf.extend_from_slice(prefix);
        collect(start, &mut buf, &mut out);
        out
    }

    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.with_prefix(b"")
    }

    /// Longest stored key that is a prefix of `text`.
    pub fn longest_prefix(&self, text: &[u8]) -> Option<Vec<u8>> {
        let mut node = &*self.root;
        let mut best = node.terminal.then_some(0);
        for (i, &b) in text.iter().enumerate() {
            if b as usize >= FANOUT {
                break;
            }
            match node.children[b as usize].as_deref() {
                Some(next) => node = next,
                None => break,
            }
            if node.terminal {
                best = Some(i + 1);
            }
        }
        best.map(|n| text[..n].to_vec())
    }

    /// Clear the terminal flag and release the value. Returns whether the
    /// key was present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let mut node = &mut *self.root;
        for &b in key {
            if b as usize >= FANOUT {
                return false;
            }
            match node.children[b as usize].as_deref_mut() {
                Some(next) => node = next,
                None => return false,
            }
        }
        if !node.terminal {
            return false;
        }
        node.terminal = false;
        node.value = None;
        self.count -= 1;
        true
    }

    pub fn clear(&mut self) {
        teardown(std::mem::replace(&mut self.root, Node::new()));
        self.count = 0;
    }
}

/// Depth-first walk in byte order. Each frame holds a node and the next
/// child index to try; `buf` always spells the path to the top frame.
fn collect(start: &Node, buf: &mut Vec<u8>, out: &mut Vec<Vec<u8>>) {
    if start.terminal {
        out.push(buf.clone());
    }
    let mut stack: Vec<(&Node, usize)> = vec![(start, 0)];
    while let Some(top) = stack.last_mut() {
        let node = top.0;
        let from = top.1;
        let Some(off) = node.children[from..].iter().position(Option::is_some) else {
            stack.pop();
            if !stack.is_empty() {
                buf.pop();
            }
            continue;
        };
        let b = from + off;
        top.1 = b + 1;
        let Some(child) = node.children[b].as_deref() else {
            continue;
        };
        if buf.len() == buf.capacity() {
            buf.reserve_exact(buf.capacity().max(1));
        }
        buf.push(b as u8);
        if child.terminal {
            out.push(buf.clone());
        }
        stack.push((child, 0));
    }
}

/// Free a subtree iteratively so very long keys cannot overflow the stack.
fn teardown(root: Box<Node>) {
    let mut stack = vec![root];
    while let Some(mut node) = stack.pop() {
        for child in node.children.iter_mut() {
            if let Some(c) = child.take() {
                stack.push(c);
            }
        }
    }
}

impl Drop for Trie {
    fn drop(&mut self) {
        let mut detached = Node::new();
        std::mem::swap(&mut detached.children, &mut self.root.children);
        teardown(detached);
    }
}

/// Reference-counted trie handle used by the runtime bridge.
pub type RtTrie = RtObj<Trie>;

pub fn rt_trie_new() -> RtTrie {
    RtObj::new(Trie::new())
}

pub fn rt_trie_len(t: &RtTrie) -> i64 {
    t.borrow().len() as i64
}

pub fn rt_trie_put(t: &RtTrie, key: &RtString, value: TrieValue) {
    t.borrow_mut().put(key.as_bytes(), value)
}

pub fn rt_trie_get(t: &RtTrie, key: &RtString) -> Option<TrieValue> {
    t.borrow().get(key.as_bytes())
}

pub fn rt_trie_has(t: &RtTrie, key: &RtString) -> bool {
    t.borrow().has(key.as_bytes())
}

pub fn rt_trie_has_prefix(t: &RtTrie, prefix: &RtString) -> bool {
    t.borrow().has_prefix(prefix.as_bytes())
}

fn to_str_array(keys: Vec<Vec<u8>>) -> RtStrArray {
    let arr = RtStrArray::new(keys.len());
    for (i, k) in keys.into_iter().enumerate() {
        arr.set(i as i64, RtString::from_bytes(&k));
    }
    arr
}

pub fn rt_trie_with_prefix(t: &RtTrie, prefix: &RtString) -> RtStrArray {
    to_str_array(t.borrow().with_prefix(prefix.as_bytes()))
}

pub fn rt_trie_keys(t: &RtTrie) -> RtStrArray {
    to_str_array(t.borrow().keys())
}

pub fn rt_trie_longest_prefix(t: &RtTrie, text: &RtString) -> RtString {
    t.borrow()
        .longest_prefix(text.as_bytes())
        .map_or_else(RtString::empty, |k| RtString::from_bytes(&k))
}

pub fn rt_trie_remove(t: &RtTrie, key: &RtString) -> bool {
    t.borrow_mut().remove(key.as_bytes())
}

pub fn rt_trie_clear(t: &RtTrie) {
    t.borrow_mut().clear()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::trap::catch_trap;

    fn fruit() -> Trie {
        let mut t = Trie::new();
        for (i, k) in ["apple", "application", "apply", "banana"].iter().enumerate() {
            t.put(k.as_bytes(), TrieValue::I64(i as i64));
        }
        t
    }

    #[test]
    fn prefix_query_is_sorted() {
        let t = fruit();
        let keys: Vec<String> = t
            .with_prefix(b"app")
            .into_iter()
            .map(|k| String::from_utf8(k).unwrap())
            .collect();
        assert_eq!(keys, vec!["apple", "application", "apply"]);
        assert!(t.with_prefix(b"cherry").is_empty());
    }

    #[test]
    fn put_replaces_without_growing() {
        let mut t = fruit();
        t.put(b"apple", TrieValue::I64(99));
        assert_eq!(t.len(), 4);
        assert_eq!(t.get(b"apple"), Some(TrieValue::I64(99)));
    }

    #[test]
    fn has_prefix_ignores_inner_nodes_without_terminals() {
        let mut t = fruit();
        assert!(t.has_prefix(b"ban"));
        t.remove(b"banana");
        assert!(!t.has_prefix(b"ban"));
        assert!(t.has_prefix(b""));
    }

    #[test]
    fn longest_prefix_tracks_last_terminal() {
        let t = fruit();
        assert_eq!(t.longest_prefix(b"applesauce"), Some(b"apple".to_vec()));
        assert_eq!(t.longest_prefix(b"applicationx"), Some(b"application".to_vec()));
        assert_eq!(t.longest_prefix(b"xyz"), None);
    }

    #[test]
    fn remove_twice_is_noop() {
        let mut t = fruit();
        assert!(t.remove(b"apply"));
        assert!(!t.remove(b"apply"));
        assert_eq!(t.len(), 3);
        assert!(!t.has(b"apply"));
        assert_eq!(t.get(b"apply"), None);
    }

    #[test]
    fn values_are_released() {
        let s = RtString::from_str("payload");
        let mut t = Trie::new();
        t.put(b"k", TrieValue::Str(s.clone()));
        assert_eq!(s.refcount(), 2);
        t.remove(b"k");
        assert_eq!(s.refcount(), 1);
        t.put(b"k", TrieValue::Str(s.clone()));
        drop(t);
        assert_eq!(s.refcount(), 1);
    }

    #[test]
    fn long_keys_exceed_initial_buffer() {
        let mut t = Trie::new();
        let key = vec![b'a'; INITIAL_KEY_BUF * 2 + 3];
        t.put(&key, TrieValue::I64(1));
        assert_eq!(t.keys(), vec![key]);
    }

    #[test]
    fn very_long_keys_walk_without_recursion() {
        let mut t = Trie::new();
        let key = vec![b'a'; 200_000];
        t.put(&key, TrieValue::I64(1));
        t.put(b"ab", TrieValue::I64(2));
        assert!(t.has(&key));
        assert!(t.has_prefix(b"a"));
        assert!(t.has_prefix(&key[..150_000]));
        let keys = t.keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], key);
        assert_eq!(keys[1], b"ab".to_vec());
        assert_eq!(t.with_prefix(&key[..199_999]), vec![key.clone()]);
        t.clear();
        assert!(!t.has_prefix(b""));
    }

    #[test]
    fn non_ascii_keys_trap_on_put() {
        let mut t = Trie::new();
        assert!(catch_trap(move || t.put(&[0xC3, 0xA9], TrieValue::I64(1))).is_err());
    }

    #[test]
    fn clear_empties_everything() {
        let handle = rt_trie_new();
        rt_trie_put(&handle, &RtString::from_str("a"), TrieValue::F64(1.0));
        rt_trie_clear(&handle);
        assert_eq!(rt_trie_len(&handle), 0);
        assert_eq!(rt_trie_keys(&handle).len(), 0);
    }

    #[test]
    fn handle_queries_return_strings() {
        let handle = rt_trie_new();
        for k in ["to", "tea", "ten"] {
            rt_trie_put(&handle, &RtString::from_str(k), TrieValue::I64(0));
        }
        let keys = rt_trie_with_prefix(&handle, &RtString::from_str("te"));
        let keys: Vec<String> = keys.to_vec().iter().map(|k| k.to_string_lossy()).collect();
        assert_eq!(keys, vec!["tea", "ten"]);
        assert_eq!(
            rt_trie_longest_prefix(&handle, &RtString::from_str("tent")).as_bytes(),
            b"ten"
        );
    }
}

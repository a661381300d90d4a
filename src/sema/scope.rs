use std::collections::{BTreeSet, HashMap};

/// Stack of lexical scopes mapping source names to unique names.
#[derive(Debug, Default, Clone)]
pub struct ScopeStack {
    scopes: Vec<HashMap<String, String>>,
}

impl ScopeStack {
    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Innermost binding for `name`.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.scopes.iter().rev().find_map(|s| s.get(name).map(String::as_str))
    }

    pub fn declared_here(&self, name: &str) -> bool {
        self.scopes.last().is_some_and(|s| s.contains_key(name))
    }

    pub fn bind(&mut self, name: &str, unique: &str) {
        if let Some(top) = self.scopes.last_mut() {
            top.insert(name.to_string(), unique.to_string());
        }
    }
}

/// Classic Levenshtein distance over bytes.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        cur[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Closest known symbol within a small edit distance, ties broken by name.
pub fn suggest<'a>(name: &str, known: &'a BTreeSet<String>) -> Option<&'a str> {
    let limit = 2.max(name.len() / 3);
    known
        .iter()
        .map(|s| (edit_distance(name, s), s))
        .filter(|(d, _)| *d <= limit)
        .min_by_key(|(d, _)| *d)
        .map(|(_, s)| s.as_str())
}

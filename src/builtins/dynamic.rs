//! Run-time overlay of host-provided builtins.
//!
//! Embedders bind extra runtime entry points by name. The VM consults this
//! map for any extern its static bridge table does not know.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::vm::Value;

pub type DynamicHandler = fn(&[Value]) -> Value;

fn registry() -> &'static RwLock<HashMap<String, DynamicHandler>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, DynamicHandler>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Bind `name` to `handler`, or remove the binding when `handler` is `None`.
/// Names are canonicalized to uppercase.
pub fn register(name: &str, handler: Option<DynamicHandler>) {
    let key = name.to_ascii_uppercase();
    let mut map = match registry().write() {
        Ok(map) => map,
        Err(poisoned) => poisoned.into_inner(),
    };
    match handler {
        Some(h) => {
            tracing::debug!(target: "ilc::builtins", name = %key, "dynamic builtin bound");
            map.insert(key, h);
        }
        None => {
            map.remove(&key);
        }
    }
}

/// Exact lookup on the canonical uppercase name.
pub fn lookup(name: &str) -> Option<DynamicHandler> {
    let map = match registry().read() {
        Ok(map) => map,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forty_two(_: &[Value]) -> Value {
        Value::Int(42)
    }

    #[test]
    fn register_lookup_remove() {
        register("host_answer", Some(forty_two));
        let h = lookup("HOST_ANSWER").expect("bound");
        assert_eq!(h(&[]), Value::Int(42));
        assert!(lookup("host_answer").is_none(), "lookup is exact on uppercase");
        register("HOST_ANSWER", None);
        assert!(lookup("HOST_ANSWER").is_none());
    }
}

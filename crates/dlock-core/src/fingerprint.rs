//! Lock key derivation
//!
//! An explicit key is used verbatim. Otherwise the key is
//! `{operation}({args})` where `args` is the compact JSON of the call
//! arguments. Arguments go through `serde_json::Value` first, whose object
//! map is ordered, so a `HashMap` argument yields the same key regardless of
//! iteration order.
//!
//! Encodings longer than `max_inline_args` bytes are replaced by
//! `md5:<hex>` of the same JSON to keep keys short. Arguments that cannot be
//! serialized (e.g. maps with non-string keys) fall back to the bare
//! operation identity, which makes every call of that operation contend on
//! one key.

use md5::{Digest, Md5};
use serde::Serialize;
use tracing::warn;

use dlock_common::DEFAULT_MAX_INLINE_ARGS;

use crate::model::{LockKey, OperationId};

/// Derives lock keys from protected-call identities
#[derive(Debug, Clone)]
pub struct FingerprintResolver {
    prefix: String,
    max_inline_args: usize,
}

impl Default for FingerprintResolver {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            max_inline_args: DEFAULT_MAX_INLINE_ARGS,
        }
    }
}

impl FingerprintResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace prepended to every key, explicit ones included
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_max_inline_args(mut self, max_inline_args: usize) -> Self {
        self.max_inline_args = max_inline_args;
        self
    }

    pub fn resolve<A>(&self, operation: &OperationId, args: &A, explicit: Option<&str>) -> LockKey
    where
        A: Serialize + ?Sized,
    {
        if let Some(key) = explicit.filter(|k| !k.is_empty()) {
            return LockKey::new(format!("{}{}", self.prefix, key));
        }

        match encode_args(args) {
            Ok(encoded) if encoded.len() > self.max_inline_args => LockKey::new(format!(
                "{}{}(md5:{})",
                self.prefix,
                operation,
                md5_hex(&encoded)
            )),
            Ok(encoded) => LockKey::new(format!("{}{}({})", self.prefix, operation, encoded)),
            Err(e) => {
                warn!(
                    operation = %operation,
                    error = %e,
                    "Arguments are not serializable, lock key falls back to operation identity"
                );
                LockKey::new(format!("{}{}", self.prefix, operation))
            }
        }
    }
}

fn encode_args<A: Serialize + ?Sized>(args: &A) -> serde_json::Result<String> {
    let value = serde_json::to_value(args)?;
    serde_json::to_string(&value)
}

fn md5_hex(content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content.as_bytes());
    const_hex::encode(hasher.finalize())
}

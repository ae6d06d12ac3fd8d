//! Serde adapter for `Arc`-linked plan nodes: serialize through the Arc,
//! deserialize into a fresh one. Sharing is not preserved across a
//! round-trip, which is fine for plan trees (they are DAG-shaped only
//! within one process).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn serialize<S, T>(val: &Arc<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: Serialize,
{
    T::serialize(val.as_ref(), serializer)
}

pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Arc<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Arc::new)
}

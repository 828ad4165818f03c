//! SQL schema for the namespaced key/value store (design spec §6).

/// Schema for v1: a single namespaced KV table. `namespace` carries the
/// key's prefix up to and including its final dot (`id.`, `peer.`,
/// `fav.`, `ch.`) so [`crate::kv::clear_namespace`] can target one without
/// a string `LIKE` scan, and `key` the remainder.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value BLOB NOT NULL,
    PRIMARY KEY (namespace, key)
);

CREATE INDEX IF NOT EXISTS idx_kv_namespace ON kv_store(namespace);
"#;

// crates/authority-kernel-config/tests/config_kernel.rs
// ============================================================================
// Module: Config Kernel Tests
// Description: Versioning, validation, rollback, snapshots, and caching.
// ============================================================================
//! ## Overview
//! Exercises the namespaced configuration store: version bumps on every
//! write, schema validation before apply, deactivating deletes, rollback to
//! prior versions, deterministic snapshots with diffing, and cache
//! invalidation via `reload`.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use authority_kernel_config::ConfigDataType;
use authority_kernel_config::ConfigError;
use authority_kernel_config::ConfigKernel;
use serde_json::json;

// ============================================================================
// SECTION: Versioned Writes
// ============================================================================

#[test]
fn writes_bump_the_version_counter() {
    let kernel = ConfigKernel::new();
    let first = kernel.set("replay", "grace_seconds", json!(300), "ops").expect("set");
    let second = kernel.set("replay", "grace_seconds", json!(600), "ops").expect("set");

    assert_eq!(first.version, 1);
    assert_eq!(second.version, 2);
    assert_eq!(first.data_type, ConfigDataType::Number);
    assert_eq!(kernel.get("replay", "grace_seconds").expect("get"), json!(600));
}

#[test]
fn null_values_are_rejected() {
    let kernel = ConfigKernel::new();
    assert!(matches!(
        kernel.set("replay", "grace_seconds", json!(null), "ops"),
        Err(ConfigError::NullValue)
    ));
}

#[test]
fn history_preserves_every_version() {
    let kernel = ConfigKernel::new();
    kernel.set("gate", "sources", json!(["api"]), "ops").expect("set");
    kernel.set("gate", "sources", json!(["api", "sales-bench"]), "ops").expect("set");
    let history = kernel.history("gate", "sources");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].version, 1);
    assert_eq!(history[1].version, 2);
}

// ============================================================================
// SECTION: Schema Validation
// ============================================================================

#[test]
fn registered_schemas_gate_writes() {
    let kernel = ConfigKernel::new();
    kernel
        .register_schema(
            "replay",
            "grace_seconds",
            &json!({"type": "integer", "minimum": 1}),
        )
        .expect("register schema");

    assert!(kernel.set("replay", "grace_seconds", json!(300), "ops").is_ok());
    let err = kernel.set("replay", "grace_seconds", json!("soon"), "ops").unwrap_err();
    assert!(matches!(err, ConfigError::SchemaViolation { .. }));
    assert_eq!(
        kernel.get("replay", "grace_seconds").expect("get"),
        json!(300),
        "rejected writes must not apply"
    );
}

#[test]
fn invalid_schemas_are_rejected_at_registration() {
    let kernel = ConfigKernel::new();
    let err = kernel
        .register_schema("replay", "grace_seconds", &json!({"type": "not-a-type"}))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSchema(_)));
}

// ============================================================================
// SECTION: Deletes and Rollback
// ============================================================================

#[test]
fn delete_deactivates_without_erasing_history() {
    let kernel = ConfigKernel::new();
    kernel.set("gate", "sources", json!(["api"]), "ops").expect("set");
    kernel.delete("gate", "sources", "ops").expect("delete");

    assert!(matches!(
        kernel.get("gate", "sources"),
        Err(ConfigError::NotFound { .. })
    ));
    let history = kernel.history("gate", "sources");
    assert_eq!(history.len(), 2);
    assert!(!history[1].is_active);
}

#[test]
fn rollback_restores_a_prior_value_as_a_new_version() {
    let kernel = ConfigKernel::new();
    kernel.set("replay", "grace_seconds", json!(300), "ops").expect("set");
    kernel.set("replay", "grace_seconds", json!(600), "ops").expect("set");
    let restored = kernel.rollback("replay", "grace_seconds", 1, "ops").expect("rollback");

    assert_eq!(restored.version, 3, "rollback appends; history is never rewritten");
    assert_eq!(kernel.get("replay", "grace_seconds").expect("get"), json!(300));
}

#[test]
fn rollback_to_a_missing_version_is_rejected() {
    let kernel = ConfigKernel::new();
    kernel.set("replay", "grace_seconds", json!(300), "ops").expect("set");
    assert!(matches!(
        kernel.rollback("replay", "grace_seconds", 9, "ops"),
        Err(ConfigError::VersionNotFound { .. })
    ));
}

// ============================================================================
// SECTION: Snapshots
// ============================================================================

#[test]
fn snapshots_are_deterministic_ordered_maps() {
    let kernel = ConfigKernel::new();
    kernel.set("replay", "grace_seconds", json!(300), "ops").expect("set");
    kernel.set("replay", "fan_out", json!(8), "ops").expect("set");
    kernel.set("gate", "sources", json!(["api"]), "ops").expect("set");

    let snapshot = kernel.snapshot(&["gate", "replay"]);
    let namespaces: Vec<&String> = snapshot.keys().collect();
    assert_eq!(namespaces, ["gate", "replay"]);
    let replay_keys: Vec<&String> = snapshot["replay"].keys().collect();
    assert_eq!(replay_keys, ["fan_out", "grace_seconds"]);
}

#[test]
fn validate_snapshot_reports_missing_extra_and_changed() {
    let kernel = ConfigKernel::new();
    kernel.set("replay", "grace_seconds", json!(300), "ops").expect("set");
    kernel.set("replay", "fan_out", json!(8), "ops").expect("set");

    let mut snapshot = kernel.snapshot(&["replay"]);
    let clean = kernel.validate_snapshot(&snapshot, &["replay"]);
    assert!(clean.is_clean());

    if let Some(keys) = snapshot.get_mut("replay") {
        keys.remove("fan_out");
        keys.insert("grace_seconds".to_string(), json!(900));
        keys.insert("unknown_key".to_string(), json!(true));
    }
    let diff = kernel.validate_snapshot(&snapshot, &["replay"]);
    assert_eq!(diff.missing, vec![("replay".to_string(), "fan_out".to_string())]);
    assert_eq!(diff.changed, vec![("replay".to_string(), "grace_seconds".to_string())]);
    assert_eq!(diff.extra, vec![("replay".to_string(), "unknown_key".to_string())]);
}

// ============================================================================
// SECTION: Cache and Bulk Reads
// ============================================================================

#[test]
fn reload_invalidates_cached_reads() {
    let kernel = ConfigKernel::new();
    kernel.set("replay", "grace_seconds", json!(300), "ops").expect("set");
    assert_eq!(kernel.get("replay", "grace_seconds").expect("warm cache"), json!(300));

    kernel.set("replay", "grace_seconds", json!(600), "ops").expect("set");
    assert_eq!(
        kernel.get("replay", "grace_seconds").expect("get after write"),
        json!(600),
        "writes invalidate the affected slot"
    );

    kernel.reload();
    assert_eq!(kernel.get("replay", "grace_seconds").expect("get after reload"), json!(600));
}

#[test]
fn get_many_aligns_to_the_request_order() {
    let kernel = ConfigKernel::new();
    kernel.set("replay", "grace_seconds", json!(300), "ops").expect("set");
    kernel.set("gate", "sources", json!(["api"]), "ops").expect("set");

    let values = kernel.get_many(&[
        ("gate", "sources"),
        ("replay", "grace_seconds"),
        ("replay", "missing"),
    ]);
    assert_eq!(values[0], Some(json!(["api"])));
    assert_eq!(values[1], Some(json!(300)));
    assert_eq!(values[2], None);
}

#[test]
fn namespace_reads_skip_inactive_keys() {
    let kernel = ConfigKernel::new();
    kernel.set("gate", "sources", json!(["api"]), "ops").expect("set");
    kernel.set("gate", "strict", json!(true), "ops").expect("set");
    kernel.delete("gate", "sources", "ops").expect("delete");

    let namespace = kernel.get_namespace("gate");
    assert_eq!(namespace.len(), 1);
    assert_eq!(namespace["strict"], json!(true));
}

//! MCPGuard - injection scanning and tool pinning for MCP servers
//!
//! A detection-and-integrity library for Model Context Protocol tool
//! definitions. Scans untrusted tool descriptions for prompt injection
//! patterns, and pins content-addressed fingerprints of tool definitions
//! as a trust baseline for tamper (rug-pull) detection.
//!
//! # Modules
//!
//! - `scanner` - pattern-based injection detection with allowlist suppression
//! - `fingerprint` - canonical SHA-256 hashing of tool definitions
//! - `manifest` - persisted trust baseline with migration and backups
//! - `verify` - verify/diff/approve/remove against the baseline
//!
//! # Example
//!
//! ```rust,ignore
//! use mcpguard::{Scanner, ScannerConfig};
//!
//! let scanner = Scanner::new(ScannerConfig::default());
//! let result = scanner.scan("read_file", "Reads a file from disk.");
//! assert!(result.is_clean());
//! ```
//!
//! # Concurrency
//!
//! All operations are synchronous and perform no I/O beyond the manifest
//! store's load/save. The store is last-write-wins with no internal
//! locking: concurrent processes sharing a data directory must be
//! serialized by the embedding host.

pub mod definition;
pub mod fingerprint;
pub mod manifest;
pub mod scanner;
pub mod verify;

// Re-export commonly used types
pub use definition::Definition;
pub use scanner::{Scanner, ScannerConfig};
pub use verify::VerifyEngine;

//! Purpose: Internal JSON parsing boundary shared by runtime callsites.
//! Exports: `parse` module with decode helpers used by the configuration codec.
//! Role: Single seam for parser implementation so callsites avoid ad hoc decode logic.
//! Invariants: Host-supplied JSON is decoded through this module only.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;

// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to implement the interactive terminal.
//
// Module responsibilities:
// - `json`: Minimal field extraction and record scanning over the
//   backend's flat JSON responses.
// - `session`: The in-memory login session and its two transitions
//   (login success, clear).
// - `api`: The blocking HTTP transport and the feature operations
//   (login, logout, balance, send, deposit, withdraw, history).
// - `ui`: Terminal menus, prompts, and colored rendering; delegates
//   everything else to `api`.
//
// Keeping this separation makes it easy to test the scanning and API
// logic without a terminal attached.
pub mod api;
pub mod json;
pub mod session;
pub mod ui;

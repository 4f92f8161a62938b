//! State module for tracking crawl session progress
//!
//! # Components
//!
//! - `SessionState`: Lifecycle of a crawl session (not started, running, completed)

mod session_state;

// Re-export main types
pub use session_state::SessionState;

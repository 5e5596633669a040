//! Shared types for the scriptpad execution core.

mod diagnostic;
mod event;
mod session;
mod span;

pub use diagnostic::*;
pub use event::*;
pub use session::*;
pub use span::*;

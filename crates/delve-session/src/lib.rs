//! The record/replay duality layer.
//!
//! Every point where the simulation asks an external party a question
//! goes through a [`Session`]. In record mode the answer is solicited
//! from the live [`Prompter`](delve_core::Prompter) and appended to the
//! log; in replay mode it is read back from the log and handed over as
//! if it had just been solicited. Collapsing both modes into one call
//! site keeps the simulation's own code free of any awareness that it
//! might be replaying.
//!
//! [`GameSession`] is the explicitly passed handle that owns a live
//! game's [`LogWriter`](delve_log::LogWriter) and drives one command
//! end-to-end: header, interactions, fingerprint, periodic snapshot.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod driver;
pub mod guard;
pub mod session;

pub use driver::{GameSession, SessionConfig, SessionError};
pub use guard::Divergence;
pub use session::{Mode, Session, TokenFeed};

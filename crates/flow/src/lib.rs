//! Multi-agent flows for Taskloom.
//!
//! A [`Flow`] runs role-tagged [`Agent`](taskloom_agent::Agent)s in order
//! against one task, pass after pass, until the terminal role accepts the
//! work or the pass limit is reached.

pub mod accept;
pub mod flow;

pub use accept::is_accepted;
pub use flow::{
    DEFAULT_ACCEPT_MARKER, Flow, FlowError, FlowMember, FlowOutcome, FlowSpec, FlowSummary,
    MemberOutput,
};

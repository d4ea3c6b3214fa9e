//! Domain model and error types shared by every crate in the case engine:
//! the tagged message hierarchy, case/user bookkeeping, media descriptors,
//! and the timestamp conventions every persisted document follows.

pub mod case;
pub mod errors;
pub mod media;
pub mod message;
pub mod time;
pub mod tool;
pub mod user;

pub use case::{CaseIndex, CaseManifest, CaseStatus};
pub use errors::{CoreError, CoreResult};
pub use media::{MediaContent, MediaData};
pub use message::{
    AssistantMeta, AssistantMsg, InteractiveChoice, InteractiveOption, InteractiveOptsType,
    Message, MessageCommon, MessageParams, ServerInteractiveOptsMsg, ServerTextMsg,
    ToolResultsMsg, UserContentMsg, UserInteractiveReplyMsg,
};
pub use time::now_utc_iso;
pub use tool::{ToolCall, ToolResult};
pub use user::UserData;

/// Default cap on in-memory transcript length when `context_build` truncates.
pub const DEFAULT_MAX_CONTEXT_LEN: usize = 20;

/// Default staleness threshold for a case with no recent activity.
pub const DEFAULT_TIME_LIMIT_STALE_SECONDS: i64 = 48 * 3600;

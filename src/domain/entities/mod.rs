//! # Domain Entities
//!
//! Core entities of the guild archive. All entities map directly to their
//! corresponding database tables and are keyed by Discord-assigned
//! snowflakes; the archiver never generates its own identifiers.
//!
//! ## Core Entities
//!
//! - **Guild**: an archived Discord server with scrape bookkeeping
//! - **Channel**: a message container (or category/thread) within a guild
//! - **User**: a message author
//! - **Message**: one archived message with embeds and reply linkage
//! - **Attachment**: a file attached to a message, with download lifecycle
//! - **Reaction**: aggregated emoji reaction counts per message
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access
//! operations. These traits are implemented in the infrastructure layer
//! over the runtime-selected store, following the dependency inversion
//! principle.

mod attachment;
mod channel;
mod guild;
mod message;
mod reaction;
mod user;

// Re-export Guild entity and related types
pub use guild::{Guild, GuildRepository};

// Re-export Channel entity and related types
pub use channel::{Channel, ChannelKind, ChannelRepository};

// Re-export User entity and related types
pub use user::{User, UserRepository};

// Re-export Message entity and related types
pub use message::{Message, MessagePage, MessageRepository, MAX_MESSAGE_PAGE};

// Re-export Attachment entity and related types
pub use attachment::{
    Attachment, AttachmentRepository, ChannelAttachment, DownloadState, IMAGE_CONTENT_TYPES,
    IMAGE_EXTENSIONS,
};

// Re-export Reaction entity and related types
pub use reaction::{Reaction, ReactionRepository};

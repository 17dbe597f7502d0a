//! Inbound CV attribution: the matching cascade that ties a file arriving
//! over email or WhatsApp back to a candidate's application(s), and the
//! CV Inbox operations recruiters use to resolve what the cascade can't.

pub mod cascade;
pub mod crud;
pub mod db;
pub mod error;
pub mod extraction;
pub mod storage;
pub mod text_extract;
pub mod types;

pub use cascade::{match_inbound, InboundCv, MatchResult};
pub use crud::{
    assign_unmatched, attach_cv, confirm_cv_review, create_unmatched_inbound, get_cv_upload, list_needs_review,
    list_unresolved_inbound, reassign_cv,
};
pub use db::init_db;
pub use error::{MatchingError, Result};
pub use extraction::{extract_contact, ExtractedContact};
pub use storage::{delete_if_orphaned, store_cv_file};
pub use text_extract::extract_text;
pub use types::{CvMatchMethod, CvSource, CvUpload, InboundChannel, UnmatchedInbound};

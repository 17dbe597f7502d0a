//! The Application state machine: the single authority for status
//! transitions, its audit log, and the sidebar-counts cache.

pub mod cache;
pub mod db;
pub mod error;
pub mod transition;
pub mod types;

pub use cache::SidebarCache;
pub use db::init_db;
pub use error::{Result, StateError};
pub use transition::{
    add_note, candidate_ids_awaiting_cv, create_application, get_application, list_applications_by_status,
    list_awaiting_cv_applications, list_due_callbacks, list_status_changes, most_recent_transition_into,
    transition, transition_with, write_transition,
};
pub use types::{Application, ApplicationStatus, StatusChange};

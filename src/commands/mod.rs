//! Query and management commands over the dataset index
//!
//! - `ask`: keyword search plus a constrained answer from the chat client
//! - `manage`: list, move, copy and delete datasets, keeping the index in step

mod ask;
mod manage;

pub use ask::{extract_keywords, format_dataset_info, run_ask, Answer, NOTHING_FOUND};
pub use manage::{
    directory_context, run_manage, validate_manage_intent, ManageAction, ManageOutcome, Manager,
};

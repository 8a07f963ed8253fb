//! TUI module for the interactive link builder

mod link_builder;
pub mod session;

pub use link_builder::LinkBuilderApp;
pub use session::LinkSession;

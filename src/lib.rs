//! Document-window lifecycle for a desktop editor shell.
//!
//! The [`reconcile`] core decides whether windows may close, saves and
//! save-as's documents, merges external file changes and keeps the session
//! (open windows, recent documents) persisted across launches. Windows are
//! reached only through the [`provider::ContentProvider`] protocol and users
//! only through [`dialog::Dialogs`].

pub mod dialog;
pub mod file_store;
pub mod model;
pub mod provider;
pub mod reconcile;
pub mod session;
pub mod store;

#![doc = "theme-sync-core: core logic library for theme-sync."]

//! This crate contains the theme install pipeline: provider index parsing,
//! repository sync, theme installation, batch orchestration and the read-only
//! catalog. Configuration files and the command line live in the `theme-sync`
//! crate; this crate only ever sees a [`config::ConfigSnapshot`].
//!
//! # Usage
//! Build a [`synchronise::ThemeInstaller`] (or use its `Default` for git,
//! pulldown-cmark and the program directory layout) and hand it a snapshot.

pub mod catalog;
pub mod config;
pub mod contract;
pub mod download;
pub mod error;
pub mod install;
pub mod manifest;
pub mod progress;
pub mod render;
pub mod synchronise;
pub mod target;

pub use catalog::{Catalog, ProviderSummary, ThemeSummary};
pub use config::{ConfigSnapshot, ProviderRef};
pub use progress::{ProgressEvent, ProgressSink};
pub use synchronise::{BatchReport, ThemeInstaller};

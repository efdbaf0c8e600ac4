//! # mdpress-core
//!
//! Core library for the mdpress static site generator.
//!
//! This crate compiles markdown documents into view modules with embedded
//! page data, expands dynamic route templates, and post-processes the
//! production bundle.

pub mod bundle;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod frontmatter;
pub mod header;
pub mod inject;
pub mod markdown;
pub mod page_data;
pub mod pages;
pub mod plugin;
pub mod routes;
pub mod slug;

pub use cache::CompileCache;
pub use compiler::{CompileError, CompiledPage, Compiler, CompilerOptions, DeadLink};
pub use config::Config;
pub use header::normalize_header;
pub use markdown::{MarkdownOptions, MarkdownRenderer, Render, RenderOutput};
pub use page_data::extract_page_data;
pub use pages::{resolve_pages, SitePages};
pub use plugin::{HotUpdate, MdpressPlugin, PluginError};
pub use routes::{
    resolve_dynamic_routes, DynamicRoutes, FilePathsLoader, PathsLoader, RouteGraph, RouteSpec,
};
pub use slug::slugify;

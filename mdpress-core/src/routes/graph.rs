//! Invalidation edges between watched files and virtual route modules.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Which virtual modules each template produced, and which files feed
/// each template
///
/// All keys are normalized absolute paths. A template watches itself, its
/// generator file and every declared dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGraph {
    modules: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    watchers: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl RouteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&mut self, template: &Path) {
        self.modules.entry(template.to_path_buf()).or_default();
        self.add_dependency(template, template);
    }

    /// Record that edits to `file` invalidate `template`
    pub fn add_dependency(&mut self, file: &Path, template: &Path) {
        self.watchers
            .entry(file.to_path_buf())
            .or_default()
            .insert(template.to_path_buf());
    }

    /// Record a virtual module generated from `template`
    pub fn register_module(&mut self, template: &Path, module_id: &Path) {
        self.modules
            .entry(template.to_path_buf())
            .or_default()
            .insert(module_id.to_path_buf());
    }

    pub fn is_tracked(&self, file: &Path) -> bool {
        self.watchers.contains_key(file)
    }

    /// Templates invalidated by an edit to `file`
    pub fn templates_for(&self, file: &Path) -> impl Iterator<Item = &Path> {
        self.watchers
            .get(file)
            .into_iter()
            .flatten()
            .map(PathBuf::as_path)
    }

    /// Virtual modules invalidated by an edit to `file`
    pub fn modules_for(&self, file: &Path) -> BTreeSet<PathBuf> {
        self.templates_for(file)
            .filter_map(|template| self.modules.get(template))
            .flatten()
            .cloned()
            .collect()
    }
}

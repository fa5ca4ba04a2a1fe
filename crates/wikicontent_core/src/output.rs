use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::title::Title;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionHeading {
    pub index: usize,
    pub level: usize,
    pub line: String,
    pub anchor: String,
    pub byte_offset: usize,
}

/// Link-table refresh derived from one render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinksUpdate {
    pub title: Title,
    pub links: Vec<Title>,
    pub templates: Vec<Title>,
    pub categories: BTreeMap<String, String>,
    pub external_links: Vec<String>,
    pub recursive: bool,
}

/// Descriptor of derived data to refresh after a save or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecondaryDataUpdate {
    Links(LinksUpdate),
    LinksDeletion { title: Title },
    Custom { name: String, payload: serde_json::Value },
}

/// Rendered HTML plus the metadata harvested while rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    html: Option<String>,
    links: BTreeSet<Title>,
    templates: BTreeSet<Title>,
    categories: BTreeMap<String, String>,
    external_links: BTreeSet<String>,
    sections: Vec<SectionHeading>,
    module_styles: BTreeSet<String>,
    redirect_target: Option<Title>,
    revision_id: Option<u64>,
    cache_time: Option<i64>,
    secondary_updates: Vec<SecondaryDataUpdate>,
}

impl RenderOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    pub fn set_html(&mut self, html: Option<String>) {
        self.html = html;
    }

    pub fn links(&self) -> &BTreeSet<Title> {
        &self.links
    }

    pub fn has_links(&self) -> bool {
        !self.links.is_empty()
    }

    pub fn add_link(&mut self, title: &Title) {
        self.links.insert(title.page());
    }

    pub fn templates(&self) -> &BTreeSet<Title> {
        &self.templates
    }

    pub fn add_template(&mut self, title: &Title) {
        self.templates.insert(title.page());
    }

    /// Category db keys mapped to their sort keys.
    pub fn categories(&self) -> &BTreeMap<String, String> {
        &self.categories
    }

    pub fn add_category(&mut self, name: &str, sort_key: &str) {
        self.categories
            .insert(name.replace(' ', "_"), sort_key.to_string());
    }

    pub fn external_links(&self) -> &BTreeSet<String> {
        &self.external_links
    }

    pub fn add_external_link(&mut self, url: &str) {
        self.external_links.insert(url.to_string());
    }

    pub fn sections(&self) -> &[SectionHeading] {
        &self.sections
    }

    pub fn push_section(&mut self, heading: SectionHeading) {
        self.sections.push(heading);
    }

    pub fn module_styles(&self) -> &BTreeSet<String> {
        &self.module_styles
    }

    pub fn add_module_style(&mut self, module: &str) {
        self.module_styles.insert(module.to_string());
    }

    pub fn redirect_target(&self) -> Option<&Title> {
        self.redirect_target.as_ref()
    }

    pub fn set_redirect_target(&mut self, target: Option<Title>) {
        self.redirect_target = target;
    }

    pub fn revision_id(&self) -> Option<u64> {
        self.revision_id
    }

    pub fn set_revision_id(&mut self, revision_id: Option<u64>) {
        self.revision_id = revision_id;
    }

    pub fn cache_time(&self) -> Option<i64> {
        self.cache_time
    }

    pub fn set_cache_time(&mut self, unix_seconds: i64) {
        self.cache_time = Some(unix_seconds);
    }

    pub fn add_secondary_data_update(&mut self, update: SecondaryDataUpdate) {
        self.secondary_updates.push(update);
    }

    /// Registered custom updates followed by the links update for `title`.
    pub fn secondary_data_updates(&self, title: &Title, recursive: bool) -> Vec<SecondaryDataUpdate> {
        let mut updates = self.secondary_updates.clone();
        updates.push(SecondaryDataUpdate::Links(LinksUpdate {
            title: title.page(),
            links: self.links.iter().cloned().collect(),
            templates: self.templates.iter().cloned().collect(),
            categories: self.categories.clone(),
            external_links: self.external_links.iter().cloned().collect(),
            recursive,
        }));
        updates
    }
}

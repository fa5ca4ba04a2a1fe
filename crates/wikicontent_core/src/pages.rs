use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use crate::content::Content;
use crate::title::Title;

/// Read access to the latest stored content of a page.
pub trait PageStore: Send + Sync + fmt::Debug {
    fn latest_content(&self, title: &Title) -> Option<Content>;
}

#[derive(Debug, Default)]
pub struct MemoryPageStore {
    pages: RwLock<HashMap<Title, Content>>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, title: &Title, content: Content) -> Option<Content> {
        self.pages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(title.page(), content)
    }

    pub fn remove(&self, title: &Title) -> Option<Content> {
        self.pages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&title.page())
    }

    pub fn len(&self) -> usize {
        self.pages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PageStore for MemoryPageStore {
    fn latest_content(&self, title: &Title) -> Option<Content> {
        self.pages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&title.page())
            .cloned()
    }
}

use std::fmt;

use tracing::debug;

use crate::content::Content;
use crate::output::RenderOutput;
use crate::parser_cache::ParserCacheSaveComplete;
use crate::title::Title;

/// Pieces of a `section = "new"` edit before they are joined.
#[derive(Debug, Clone, Copy)]
pub struct NewSection<'a> {
    pub existing: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

/// Signal returned by parser-cache observers. `Abort` is accepted but has
/// no effect on the committed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
    Abort,
}

type NewSectionHook = Box<dyn Fn(&NewSection<'_>, Option<&str>) -> Option<String> + Send + Sync>;
type AlterOutputHook = Box<dyn Fn(&Content, &Title, &mut RenderOutput) + Send + Sync>;
type CacheSaveHook = Box<dyn Fn(&ParserCacheSaveComplete<'_>) -> HookOutcome + Send + Sync>;

/// Synchronous callback lists, invoked in registration order.
#[derive(Default)]
pub struct ContentHooks {
    new_section: Vec<NewSectionHook>,
    alter_output: Vec<AlterOutputHook>,
    cache_save_complete: Vec<CacheSaveHook>,
}

impl ContentHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each hook sees the pending replacement left by earlier hooks and may
    /// return a new one; the last replacement becomes the full page text.
    pub fn add_new_section_hook(
        &mut self,
        hook: impl Fn(&NewSection<'_>, Option<&str>) -> Option<String> + Send + Sync + 'static,
    ) -> &mut Self {
        self.new_section.push(Box::new(hook));
        self
    }

    pub fn add_alter_output_hook(
        &mut self,
        hook: impl Fn(&Content, &Title, &mut RenderOutput) + Send + Sync + 'static,
    ) -> &mut Self {
        self.alter_output.push(Box::new(hook));
        self
    }

    pub fn add_cache_save_complete_hook(
        &mut self,
        hook: impl Fn(&ParserCacheSaveComplete<'_>) -> HookOutcome + Send + Sync + 'static,
    ) -> &mut Self {
        self.cache_save_complete.push(Box::new(hook));
        self
    }

    pub(crate) fn place_new_section(&self, section: &NewSection<'_>) -> Option<String> {
        let mut pending: Option<String> = None;
        for hook in &self.new_section {
            if let Some(replacement) = hook(section, pending.as_deref()) {
                pending = Some(replacement);
            }
        }
        pending
    }

    pub(crate) fn alter_output(&self, content: &Content, title: &Title, output: &mut RenderOutput) {
        for hook in &self.alter_output {
            hook(content, title, output);
        }
    }

    /// Notifies every observer; returns how many asked to abort.
    pub(crate) fn cache_save_complete(&self, event: &ParserCacheSaveComplete<'_>) -> usize {
        let mut aborted = 0usize;
        for hook in &self.cache_save_complete {
            if hook(event) == HookOutcome::Abort {
                aborted += 1;
            }
        }
        if aborted > 0 {
            debug!(
                cache = event.cache_name,
                key = event.key,
                aborted,
                "save-complete observers returned abort after commit"
            );
        }
        aborted
    }
}

impl fmt::Debug for ContentHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHooks")
            .field("new_section", &self.new_section.len())
            .field("alter_output", &self.alter_output.len())
            .field("cache_save_complete", &self.cache_save_complete.len())
            .finish()
    }
}

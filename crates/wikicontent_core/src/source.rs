use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::content::{Content, ContentValue};
use crate::model::ModelTag;
use crate::pages::{MemoryPageStore, PageStore};
use crate::services::ContentServices;
use crate::title::{Namespace, Title};

/// Page read from a source tree laid out as `<Namespace>/<Page>.<ext>`.
#[derive(Debug, Clone)]
pub struct SourcePage {
    pub relative_path: String,
    pub title: Title,
    pub content: Content,
    pub content_hash: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    pub total_pages: usize,
    pub skipped_files: usize,
    pub redirects: usize,
    pub broken_redirects: Vec<String>,
    pub countable: usize,
    pub empty: usize,
    pub bytes: usize,
    pub by_model: BTreeMap<String, usize>,
    pub by_namespace: BTreeMap<String, usize>,
}

/// Reads every recognised page file under `root`, sorted by path.
pub fn load_pages(root: &Path, services: &ContentServices) -> Result<Vec<SourcePage>> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = relative_path(root, path)?;
        let Some((title, model)) = page_for_relative_path(&relative, services) else {
            debug!(path = %relative, "skipping file outside the page layout");
            continue;
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let content = services
            .registry()
            .make_content(&text, &model, None)
            .with_context(|| format!("failed to load {relative} as {model}"))?;
        pages.push(SourcePage {
            relative_path: relative,
            title,
            content,
            content_hash: compute_hash(&text),
        });
    }
    pages.sort_by(|left, right| left.relative_path.cmp(&right.relative_path));
    Ok(pages)
}

/// Loads the tree and reports model, namespace, redirect and article counts.
pub fn scan_pages(root: &Path, services: &ContentServices) -> Result<ScanSummary> {
    let mut summary = ScanSummary::default();
    let total_files = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .count();
    let pages = load_pages(root, services)?;
    summary.skipped_files = total_files.saturating_sub(pages.len());

    let store = page_store(&pages);
    for page in &pages {
        summary.total_pages += 1;
        summary.bytes += page.content.size();
        *summary
            .by_model
            .entry(page.content.model().to_string())
            .or_insert(0) += 1;
        *summary
            .by_namespace
            .entry(namespace_folder(page.title.namespace()).to_string())
            .or_insert(0) += 1;
        if page.content.is_empty() {
            summary.empty += 1;
        }
        if let Some(target) = page.content.redirect_target(services) {
            summary.redirects += 1;
            if store.latest_content(&target).is_none() {
                summary.broken_redirects.push(page.title.prefixed_text());
            }
            continue;
        }
        if page
            .content
            .is_countable(None, services)
            .with_context(|| format!("failed to evaluate {}", page.relative_path))?
        {
            summary.countable += 1;
        }
    }
    Ok(summary)
}

/// Store holding the latest content of every loaded page.
pub fn page_store(pages: &[SourcePage]) -> MemoryPageStore {
    let store = MemoryPageStore::new();
    for page in pages {
        store.insert(&page.title, page.content.clone());
    }
    store
}

/// Title and model for a path such as `MediaWiki/Common.css` or
/// `Main/Foo___Bar.wiki`; `None` for paths outside the layout.
pub fn page_for_relative_path(
    relative: &str,
    services: &ContentServices,
) -> Option<(Title, ModelTag)> {
    let (folder, rest) = relative.split_once('/')?;
    let namespace = if folder == "Main" {
        Namespace::Main
    } else {
        Namespace::from_prefix(folder)?
    };
    let (stem, extension) = rest.rsplit_once('.')?;
    let name = match extension {
        "wiki" | "wikitext" | "txt" => decode_segment(stem),
        "js" | "css" => decode_segment(rest),
        _ => return None,
    };
    let title = match namespace {
        Namespace::Main => Title::parse(&name)?,
        other => Title::parse(&format!("{}:{name}", other.as_str()))?,
    };
    let model = match extension {
        "txt" => ModelTag::text(),
        "js" => ModelTag::javascript(),
        "css" => ModelTag::css(),
        _ => services.registry().default_model_for(&title),
    };
    Some((title, model))
}

fn namespace_folder(namespace: Namespace) -> &'static str {
    match namespace {
        Namespace::Main => "Main",
        other => other.as_str(),
    }
}

fn decode_segment(value: &str) -> String {
    value
        .replace("___", "/")
        .replace("--", ":")
        .replace('_', " ")
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).with_context(|| {
        format!(
            "failed to derive relative path from root {} for {}",
            root.display(),
            path.display()
        )
    })?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(segments.join("/"))
}

fn compute_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut output = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArticleCountMethod, ContentConfig};
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, text: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, text).expect("write");
    }

    #[test]
    fn relative_paths_map_to_titles_and_models() {
        let services = ContentServices::default();
        let lookup = |path: &str| {
            page_for_relative_path(path, &services)
                .map(|(title, model)| (title.prefixed_text(), model.as_str().to_string()))
        };
        assert_eq!(
            lookup("Main/Foo_bar.wiki"),
            Some(("Foo bar".to_string(), "wikitext".to_string()))
        );
        assert_eq!(
            lookup("MediaWiki/Common.css"),
            Some(("MediaWiki:Common.css".to_string(), "css".to_string()))
        );
        assert_eq!(
            lookup("User/Alice___skin.js"),
            Some(("User:Alice/skin.js".to_string(), "javascript".to_string()))
        );
        assert_eq!(
            lookup("Help/Notes.txt"),
            Some(("Help:Notes".to_string(), "text".to_string()))
        );
        assert_eq!(lookup("Main/image.png"), None);
        assert_eq!(lookup("Nowhere/Page.wiki"), None);
        assert_eq!(lookup("README.wiki"), None);
    }

    #[test]
    fn scan_counts_models_redirects_and_articles() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        write(root, "Main/Alpha.wiki", "Alpha links to [[Beta]].");
        write(root, "Main/Beta.wiki", "No links here");
        write(root, "Main/Gamma.wiki", "#REDIRECT [[Alpha]]");
        write(root, "Main/Delta.wiki", "#REDIRECT [[Missing page]]");
        write(root, "MediaWiki/Common.css", "body {}");
        write(root, "Main/notes.md", "ignored");

        let services = ContentServices::default();
        let summary = scan_pages(root, &services).expect("scan");
        assert_eq!(summary.total_pages, 5);
        assert_eq!(summary.skipped_files, 1);
        assert_eq!(summary.redirects, 2);
        assert_eq!(summary.broken_redirects, vec!["Delta".to_string()]);
        assert_eq!(summary.countable, 1);
        assert_eq!(summary.by_model.get("wikitext"), Some(&4));
        assert_eq!(summary.by_model.get("css"), Some(&1));
        assert_eq!(summary.by_namespace.get("Main"), Some(&4));

        let any = ContentServices::new(
            ContentConfig::default().with_count_method(ArticleCountMethod::Any),
        );
        let summary = scan_pages(root, &any).expect("scan");
        assert_eq!(summary.countable, 3);
    }

    #[test]
    fn loaded_pages_feed_redirect_chains() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        write(root, "Main/One.wiki", "#REDIRECT [[Two]]");
        write(root, "Main/Two.wiki", "#REDIRECT [[Three]]");
        write(root, "Main/Three.wiki", "Destination");

        let config = ContentConfig {
            max_redirects: 3,
            ..ContentConfig::default()
        };
        let pages = load_pages(root, &ContentServices::new(config.clone())).expect("load");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].content_hash.len(), 16);

        let services =
            ContentServices::new(config).with_pages(std::sync::Arc::new(page_store(&pages)));
        let one = pages
            .iter()
            .find(|page| page.title.text() == "One")
            .expect("page one");
        assert_eq!(
            one.content
                .ultimate_redirect_target(&services)
                .map(|title| title.prefixed_text()),
            Some("Three".to_string())
        );
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use wikicontent_core::config::load_config;
use wikicontent_core::options::User;
use wikicontent_core::parser::SectionId;
use wikicontent_core::parser_cache::{ParserCache, SqliteParserCacheStore};
use wikicontent_core::source::{load_pages, page_store, scan_pages};
use wikicontent_core::{Content, ContentServices, ContentValue, ModelTag, SectionLookup, Title};

const DEFAULT_CONFIG_PATH: &str = "wikicontent.toml";
const LOG_ENV: &str = "WIKICONTENT_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "wikicontent",
    version,
    about = "Render, diff and inspect wiki page content by content model"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long, global = true, help = "Print JSON instead of key: value lines")]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Render a page and print HTML plus link metadata")]
    Render(RenderArgs),
    #[command(about = "Line diff between two revisions of a page")]
    Diff(DiffArgs),
    #[command(about = "Extract or replace a section")]
    Section(SectionArgs),
    #[command(about = "Summary text, size, redirect and article status")]
    Summary(SummaryArgs),
    #[command(about = "Apply the pre-save transform")]
    Pst(PstArgs),
    #[command(about = "Resolve the redirect target and chain")]
    Redirect(RedirectArgs),
    #[command(about = "Scan a page source tree")]
    Scan(ScanArgs),
}

#[derive(Debug, Args)]
struct PageArgs {
    #[arg(value_name = "FILE")]
    file: PathBuf,
    #[arg(long, value_name = "TITLE", help = "Page title (default: from the file name)")]
    title: Option<String>,
    #[arg(long, value_name = "MODEL", help = "Content model (default: from title and extension)")]
    model: Option<String>,
}

#[derive(Debug, Args)]
struct RenderArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(long, help = "Collect metadata only")]
    no_html: bool,
    #[arg(long, value_name = "DB", help = "SQLite parser cache to read and fill")]
    cache: Option<PathBuf>,
    #[arg(long, value_name = "ID")]
    revision: Option<u64>,
}

#[derive(Debug, Args)]
struct DiffArgs {
    #[command(flatten)]
    old: PageArgs,
    #[arg(value_name = "NEW_FILE")]
    new_file: PathBuf,
}

#[derive(Debug, Args)]
struct SectionArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(value_name = "SECTION", help = "Section number, anchor, 'new' or empty for the whole page")]
    section: String,
    #[arg(long, value_name = "FILE", help = "Replace the section with this file's text")]
    replace: Option<PathBuf>,
    #[arg(long, value_name = "TEXT", help = "Heading for a new section")]
    section_title: Option<String>,
}

#[derive(Debug, Args)]
struct SummaryArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(long, default_value_t = 250)]
    max_length: usize,
}

#[derive(Debug, Args)]
struct PstArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(long, default_value = "WikiUser")]
    user: String,
    #[arg(long)]
    nickname: Option<String>,
}

#[derive(Debug, Args)]
struct RedirectArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(long, value_name = "DIR", help = "Page source tree used to follow the chain")]
    root: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ScanArgs {
    #[arg(value_name = "DIR")]
    root: PathBuf,
}

#[derive(Debug, Serialize)]
struct SummaryReport {
    title: String,
    model: String,
    bytes: usize,
    empty: bool,
    redirect: bool,
    countable: bool,
    summary: String,
}

#[derive(Debug, Serialize)]
struct RedirectReport {
    title: String,
    target: Option<String>,
    chain: Vec<String>,
    ultimate: Option<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?
        .apply_env_overrides()
        .context("failed to apply environment overrides")?;
    tracing::debug!(
        config = %normalize_path(&cli.config),
        count_method = config.article_count_method.as_str(),
        language = %config.content_language,
        "loaded content configuration"
    );
    let services = ContentServices::new(config);

    match cli.command {
        Commands::Render(args) => run_render(&services, cli.json, args),
        Commands::Diff(args) => run_diff(&services, cli.json, args),
        Commands::Section(args) => run_section(&services, cli.json, args),
        Commands::Summary(args) => run_summary(&services, cli.json, args),
        Commands::Pst(args) => run_pst(&services, cli.json, args),
        Commands::Redirect(args) => run_redirect(services, cli.json, args),
        Commands::Scan(args) => run_scan(&services, cli.json, args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_render(services: &ContentServices, json: bool, args: RenderArgs) -> Result<()> {
    let (title, content) = load_page(services, &args.page)?;
    let output = match &args.cache {
        Some(path) => {
            if args.no_html {
                bail!("--no-html cannot be combined with --cache");
            }
            let store = SqliteParserCacheStore::open(path)?;
            let cache = ParserCache::new("pcache", Arc::new(store), services);
            cache.get_or_render(&content, &title, args.revision, None, services)?
        }
        None => content.parser_output(&title, args.revision, None, !args.no_html, services)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    println!("title: {}", title.prefixed_text());
    println!("model: {}", content.model());
    println!("links: {}", join_titles(output.links()));
    println!("templates: {}", join_titles(output.templates()));
    println!(
        "categories: {}",
        output.categories().keys().cloned().collect::<Vec<_>>().join(", ")
    );
    println!("external_links: {}", output.external_links().len());
    println!("sections: {}", output.sections().len());
    println!(
        "redirect_target: {}",
        output
            .redirect_target()
            .map(Title::full_text)
            .unwrap_or_else(|| "<none>".to_string())
    );
    if let Some(html) = output.html() {
        println!("html:\n{html}");
    }
    Ok(())
}

fn run_diff(services: &ContentServices, json: bool, args: DiffArgs) -> Result<()> {
    let (title, old) = load_page(services, &args.old)?;
    let new_text = read_text(&args.new_file)?;
    let new = services
        .registry()
        .make_content(&new_text, old.model(), None)
        .with_context(|| format!("failed to load {}", normalize_path(&args.new_file)))?;
    let diff = old.diff(&new, None, services)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
        return Ok(());
    }
    println!("title: {}", title.prefixed_text());
    println!("added_lines: {}", diff.added_lines());
    println!("deleted_lines: {}", diff.deleted_lines());
    print!("{}", diff.render());
    Ok(())
}

fn run_section(services: &ContentServices, json: bool, args: SectionArgs) -> Result<()> {
    let (title, content) = load_page(services, &args.page)?;
    let section = SectionId::parse(&args.section);

    let result = match &args.replace {
        Some(path) => {
            let text = read_text(path)?;
            let with = services
                .registry()
                .make_content(&text, content.model(), None)
                .with_context(|| format!("failed to load {}", normalize_path(path)))?;
            match content.replace_section(&section, &with, args.section_title.as_deref(), services)? {
                Some(replaced) => replaced,
                None => bail!("{} does not support sections", content.model()),
            }
        }
        None => match content.section(&section, services) {
            SectionLookup::Found(found) => found,
            SectionLookup::Missing => bail!("section {section} not found in {}", title.prefixed_text()),
            SectionLookup::Unsupported => bail!("{} does not support sections", content.model()),
        },
    };

    if json {
        let report = serde_json::json!({
            "title": title.prefixed_text(),
            "section": section.to_string(),
            "text": result.native_data(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("{}", result.native_data());
    Ok(())
}

fn run_summary(services: &ContentServices, json: bool, args: SummaryArgs) -> Result<()> {
    let (title, content) = load_page(services, &args.page)?;
    let report = SummaryReport {
        title: title.prefixed_text(),
        model: content.model().to_string(),
        bytes: content.size(),
        empty: content.is_empty(),
        redirect: content.is_redirect(services),
        countable: content.is_countable(None, services)?,
        summary: content.text_for_summary(args.max_length, services),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("title: {}", report.title);
    println!("model: {}", report.model);
    println!("bytes: {}", report.bytes);
    println!("empty: {}", format_flag(report.empty));
    println!("redirect: {}", format_flag(report.redirect));
    println!("countable: {}", format_flag(report.countable));
    println!("summary: {}", report.summary);
    Ok(())
}

fn run_pst(services: &ContentServices, json: bool, args: PstArgs) -> Result<()> {
    let (title, content) = load_page(services, &args.page)?;
    let mut user = User::new(args.user);
    if let Some(nickname) = args.nickname {
        user = user.with_nickname(nickname);
    }
    let options = services.default_parser_options();
    let saved = content.pre_save_transform(&title, &user, &options, services);

    if json {
        let report = serde_json::json!({
            "title": title.prefixed_text(),
            "changed": !saved.equals(Some(&content)),
            "text": saved.native_data(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("{}", saved.native_data());
    Ok(())
}

fn run_redirect(services: ContentServices, json: bool, args: RedirectArgs) -> Result<()> {
    let services = match &args.root {
        Some(root) => {
            let pages = load_pages(root, &services)?;
            services.with_pages(Arc::new(page_store(&pages)))
        }
        None => services,
    };
    let (title, content) = load_page(&services, &args.page)?;
    let report = RedirectReport {
        title: title.prefixed_text(),
        target: content.redirect_target(&services).map(|target| target.full_text()),
        chain: content
            .redirect_chain(&services)
            .unwrap_or_default()
            .iter()
            .map(Title::full_text)
            .collect(),
        ultimate: content
            .ultimate_redirect_target(&services)
            .map(|target| target.full_text()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("title: {}", report.title);
    println!("target: {}", report.target.as_deref().unwrap_or("<none>"));
    println!("chain: {}", report.chain.join(" -> "));
    println!("ultimate: {}", report.ultimate.as_deref().unwrap_or("<none>"));
    Ok(())
}

fn run_scan(services: &ContentServices, json: bool, args: ScanArgs) -> Result<()> {
    if !args.root.is_dir() {
        bail!("{} is not a directory", normalize_path(&args.root));
    }
    let summary = scan_pages(&args.root, services)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("root: {}", normalize_path(&args.root));
    println!("total_pages: {}", summary.total_pages);
    println!("skipped_files: {}", summary.skipped_files);
    println!("bytes: {}", summary.bytes);
    println!("redirects: {}", summary.redirects);
    println!("countable: {}", summary.countable);
    println!("empty: {}", summary.empty);
    for (model, count) in &summary.by_model {
        println!("model.{model}: {count}");
    }
    for (namespace, count) in &summary.by_namespace {
        println!("namespace.{namespace}: {count}");
    }
    if !summary.broken_redirects.is_empty() {
        println!("broken_redirects:");
        for title in &summary.broken_redirects {
            println!("  - {title}");
        }
    }
    Ok(())
}

fn load_page(services: &ContentServices, args: &PageArgs) -> Result<(Title, Content)> {
    let text = read_text(&args.file)?;
    let title = match &args.title {
        Some(title) => {
            Title::parse(title).with_context(|| format!("invalid page title: {title}"))?
        }
        None => title_from_file(&args.file)?,
    };
    let model = match &args.model {
        Some(model) => ModelTag::new(model.as_str()),
        None => model_from_file(services, &args.file, &title),
    };
    let content = services
        .registry()
        .make_content(&text, &model, None)
        .with_context(|| format!("failed to load {} as {model}", normalize_path(&args.file)))?;
    Ok((title, content))
}

fn title_from_file(path: &Path) -> Result<Title> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("no usable file name in {}", normalize_path(path)))?;
    let name = [".wikitext", ".wiki", ".txt"]
        .iter()
        .find_map(|extension| name.strip_suffix(extension))
        .unwrap_or(name);
    let decoded = name
        .replace("___", "/")
        .replace("--", ":")
        .replace('_', " ");
    Title::parse(&decoded).with_context(|| format!("cannot derive a title from {name}"))
}

fn model_from_file(services: &ContentServices, path: &Path, title: &Title) -> ModelTag {
    match path.extension().and_then(|extension| extension.to_str()) {
        Some("js") => ModelTag::javascript(),
        Some("css") => ModelTag::css(),
        Some("txt") => ModelTag::text(),
        _ => services.registry().default_model_for(title),
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", normalize_path(path)))
}

fn join_titles<'a>(titles: impl IntoIterator<Item = &'a Title>) -> String {
    let joined: Vec<String> = titles.into_iter().map(Title::prefixed_text).collect();
    if joined.is_empty() {
        "<none>".to_string()
    } else {
        joined.join(", ")
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

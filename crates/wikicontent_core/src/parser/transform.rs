use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::strip::map_unprotected;
use crate::language::{Language, MSG_SIGNATURE, substitute_params};
use crate::options::{ParserOptions, User};
use crate::title::{Namespace, Title};

static SIGNATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~~~~~|~~~~|~~~").expect("signature pattern"));

static PIPE_TRICK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\[\]|]+)\|\]\]").expect("pipe trick pattern")
});

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^()]*\)\s*$").expect("parenthetical pattern"));

static NOINCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<noinclude\s*>.*?(?:</noinclude\s*>|\z)").expect("noinclude pattern")
});

static INCLUDEONLY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?includeonly\s*>").expect("includeonly pattern"));

static ONLYINCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<onlyinclude\s*>(.*?)(?:</onlyinclude\s*>|\z)").expect("onlyinclude pattern")
});

/// Save-time rewrite: line endings, signatures, pipe tricks, trailing space.
pub fn pre_save_transform(
    text: &str,
    user: &User,
    options: &ParserOptions,
    language: &dyn Language,
) -> String {
    let normalized = text.replace("\r\n", "\n");
    let timestamp = language.format_timestamp(options.current_timestamp());
    let signature = language
        .message(
            MSG_SIGNATURE,
            &[user.name.clone(), user.display_name().to_string()],
        )
        .unwrap_or_else(|| format!("[[User:{}|{}]]", user.name, user.display_name()));

    let transformed = map_unprotected(&normalized, |part| {
        let signed = SIGNATURE.replace_all(part, |captures: &Captures| match &captures[0] {
            "~~~~~" => timestamp.clone(),
            "~~~~" => format!("{signature} {timestamp}"),
            _ => signature.clone(),
        });
        PIPE_TRICK
            .replace_all(&signed, |captures: &Captures| {
                let target = &captures[1];
                format!("[[{target}|{}]]", pipe_trick_label(target))
            })
            .into_owned()
    });
    transformed.trim_end().to_string()
}

/// Label produced by `[[Target|]]`: namespace, parenthetical and comma tail removed.
pub fn pipe_trick_label(target: &str) -> String {
    let target = target.trim().trim_start_matches(':');
    let without_namespace = match Title::parse(target) {
        Some(title) if title.namespace() != Namespace::Main => target
            .split_once(':')
            .map_or(target, |(_, rest)| rest),
        _ => target,
    };
    let without_parenthetical = PARENTHETICAL.replace(without_namespace, "");
    let label = without_parenthetical
        .split_once(',')
        .map_or(&*without_parenthetical, |(head, _)| head);
    label.trim().to_string()
}

/// Text used to prefill a new page from a template-like source page.
pub fn preload_transform(text: &str, _title: &Title, _options: &ParserOptions, params: &[String]) -> String {
    let without_noinclude = NOINCLUDE.replace_all(text, "");
    let selected = if ONLYINCLUDE.is_match(&without_noinclude) {
        ONLYINCLUDE
            .captures_iter(&without_noinclude)
            .filter_map(|captures| captures.get(1).map(|body| body.as_str().to_string()))
            .collect::<String>()
    } else {
        without_noinclude.into_owned()
    };
    let unwrapped = INCLUDEONLY_TAG.replace_all(&selected, "");
    substitute_params(&unwrapped, params)
}

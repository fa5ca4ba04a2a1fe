//! Typed page content for a MediaWiki-style wiki: content models, the
//! render pipeline and the parser cache that stores its results.

pub mod config;
pub mod content;
pub mod diff;
pub mod error;
pub mod handler;
pub mod hooks;
pub mod language;
pub mod model;
pub mod options;
pub mod output;
pub mod pages;
pub mod parser;
pub mod parser_cache;
pub mod services;
pub mod source;
pub mod title;

pub use content::{Content, ContentValue, SectionLookup, TextBacked};
pub use error::{ContentError, ContentResult};
pub use model::ModelTag;
pub use services::ContentServices;
pub use title::{Namespace, Title};

//! Front matter extraction (text stage).
//!
//! Accepts a leading YAML (`---`) or TOML (`+++`) block:
//!
//! ```text
//! ---
//! title: Hello
//! tags: [rust, notes]
//! aliases: old-hello
//! ---
//! body...
//! ```
//!
//! The block is removed from the working text; the parsed mapping becomes
//! the document's front matter, and aliases become alias slugs.

use crate::content::{Document, Field, FrontMatter};
use crate::core::slug::{Slug, slugify_file_path, slugify_tag};
use crate::pipeline::{Contract, StageContext, TextStage, Transformer};
use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

const NAME: &str = "frontmatter";

pub struct FrontMatterPlugin;

impl Transformer for FrontMatterPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn text_stage(&self) -> Option<&dyn TextStage> {
        Some(self)
    }
}

impl Contract for FrontMatterPlugin {
    fn provides(&self) -> &'static [Field] {
        &[Field::FrontMatter, Field::Aliases]
    }
}

impl TextStage for FrontMatterPlugin {
    fn transform_text(&self, _ctx: &StageContext<'_>, doc: &mut Document) -> Result<()> {
        let (raw, body) = match split_block(&doc.text) {
            Some((Format::Yaml, block, body)) => (parse_yaml(block)?, body),
            Some((Format::Toml, block, body)) => (parse_toml(block)?, body),
            None => (Map::new(), doc.text.as_str()),
        };
        let body = body.to_string();

        let stem = doc
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (fm, aliases) = interpret(raw, &stem);

        doc.text = body;
        doc.frontmatter.set(NAME, fm)?;
        doc.aliases.set(NAME, aliases)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
}

/// Split `text` into (format, block, body) if it opens with a delimiter line.
fn split_block(text: &str) -> Option<(Format, &str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let (format, delim) = if text.starts_with("---") {
        (Format::Yaml, "---")
    } else if text.starts_with("+++") {
        (Format::Toml, "+++")
    } else {
        return None;
    };

    let first_nl = text.find('\n')?;
    if text[..first_nl].trim_end() != delim {
        return None;
    }

    let rest = &text[first_nl + 1..];
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == delim {
            let block = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((format, block, body));
        }
        offset += line.len();
    }
    None
}

fn parse_yaml(block: &str) -> Result<Map<String, Value>> {
    if block.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_yaml::from_str(block).context("invalid YAML front matter")?;
    into_map(value)
}

fn parse_toml(block: &str) -> Result<Map<String, Value>> {
    let value: toml::Value = toml::from_str(block).context("invalid TOML front matter")?;
    into_map(toml_to_json(value))
}

fn into_map(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => bail!("front matter must be a mapping, found {}", kind(&other)),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// First non-null value among `keys`.
fn coalesce<'a>(raw: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| raw.get(*k).filter(|v| !v.is_null()))
}

/// Strings and lists become lists of strings; `"a, b"` splits on commas.
fn coerce_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other)
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim(), "true" | "yes"),
        _ => false,
    }
}

/// Turn the raw mapping into typed front matter plus alias slugs.
fn interpret(raw: Map<String, Value>, stem: &str) -> (FrontMatter, Vec<Slug>) {
    let title = raw
        .get("title")
        .and_then(scalar_string)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| stem.to_string());

    let mut tags: Vec<String> = Vec::new();
    for tag in coalesce(&raw, &["tags", "tag"]).map(coerce_list).unwrap_or_default() {
        let tag = slugify_tag(&tag);
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let mut aliases: Vec<Slug> = coalesce(&raw, &["aliases", "alias"])
        .map(coerce_list)
        .unwrap_or_default()
        .iter()
        .map(|alias| alias_slug(alias))
        .collect();
    if let Some(permalink) = raw.get("permalink").and_then(scalar_string)
        && !permalink.trim().is_empty()
    {
        aliases.push(alias_slug(&permalink));
    }
    aliases.retain(|s| !s.as_str().is_empty());
    aliases.dedup();

    let description = coalesce(&raw, &["description", "socialDescription"])
        .and_then(scalar_string)
        .filter(|d| !d.trim().is_empty());

    let enable_toc = match raw.get("enableToc") {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => Some(s != "false"),
        _ => None,
    };

    let fm = FrontMatter {
        title,
        tags,
        description,
        draft: truthy(raw.get("draft")) || raw.get("publish") == Some(&Value::Bool(false)),
        noindex: truthy(coalesce(&raw, &["noindex", "unlisted"])),
        enable_toc,
        raw,
    };
    (fm, aliases)
}

/// Aliases are written like file paths, with or without `.md`.
fn alias_slug(alias: &str) -> Slug {
    let alias = alias.trim().trim_matches('/');
    let path = if alias.ends_with(".md") {
        alias.to_string()
    } else {
        format!("{alias}.md")
    };
    Slug::new(slugify_file_path(&path))
}

//! Plain text, description and reading time (tree stage).

use crate::config::section::DescriptionConfig;
use crate::content::{Document, Field, ReadingTime, Tree};
use crate::pipeline::{Contract, StageContext, Transformer, TreeStage};
use anyhow::Result;
use pulldown_cmark::{Event, TagEnd};
use regex::Regex;
use std::sync::LazyLock;

const NAME: &str = "description";

const WORDS_PER_MINUTE: usize = 200;
const FALLBACK: &str = "No description provided";

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(https?://)?(?P<domain>([\da-z.-]+)\.([a-z.]{2,6})(:\d+)?)(?P<path>[/\w.-]*)(\?[/\w.=&;-]*)?",
    )
    .expect("url regex is valid")
});

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\s").expect("sentence regex is valid"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

pub struct DescriptionPlugin;

impl Transformer for DescriptionPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn tree_stage(&self) -> Option<&dyn TreeStage> {
        Some(self)
    }
}

impl Contract for DescriptionPlugin {
    fn requires(&self) -> &'static [Field] {
        &[Field::FrontMatter, Field::Tree]
    }

    fn provides(&self) -> &'static [Field] {
        &[Field::PlainText, Field::Description, Field::ReadingTime]
    }
}

impl TreeStage for DescriptionPlugin {
    fn transform_tree(&self, ctx: &StageContext<'_>, doc: &mut Document) -> Result<()> {
        let opts = &ctx.config.plugins.description;
        let declared = doc.frontmatter.require(NAME)?.description.clone();
        let mut text = plain_text(doc.tree.require(NAME)?);

        let declared = match declared {
            Some(d) if opts.replace_external_links => Some(strip_urls(&d)),
            other => other,
        };
        if opts.replace_external_links {
            text = strip_urls(&text);
        }

        let description = summarize(declared.as_deref().unwrap_or(&text), opts);
        let description = if description.trim().is_empty() {
            FALLBACK.to_string()
        } else {
            description
        };

        doc.reading_time.set(NAME, reading_time(&text))?;
        doc.description.set(NAME, description)?;
        doc.plain_text.set(NAME, text)?;
        Ok(())
    }
}

/// Text content of the tree, with blocks separated by newlines.
fn plain_text(tree: &Tree) -> String {
    let mut out = String::new();
    for event in tree {
        match event {
            Event::Text(t) | Event::Code(t) | Event::InlineMath(t) | Event::DisplayMath(t) => {
                out.push_str(t)
            }
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableCell
                | TagEnd::BlockQuote(_),
            ) => out.push('\n'),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// `https://example.com/a?b=c` → `example.com/a`
fn strip_urls(text: &str) -> String {
    URL.replace_all(text, "$domain$path").into_owned()
}

/// Whole sentences up to `length` (always at least one), cut at
/// `max_length` characters.
fn summarize(text: &str, opts: &DescriptionConfig) -> String {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let mut out = String::new();

    for (idx, sentence) in SENTENCE_BREAK.split(&collapsed).enumerate() {
        if sentence.is_empty() {
            break;
        }
        let sentence = if sentence.ends_with('.') {
            sentence.to_string()
        } else {
            format!("{sentence}.")
        };
        let sep = usize::from(!out.is_empty());
        let next_len = out.chars().count() + sentence.chars().count() + sep;
        if next_len > opts.length && idx > 0 {
            break;
        }
        if sep == 1 {
            out.push(' ');
        }
        out.push_str(&sentence);
    }

    if out.chars().count() > opts.max_length {
        let cut: String = out.chars().take(opts.max_length).collect();
        format!("{cut}...")
    } else {
        out
    }
}

fn reading_time(text: &str) -> ReadingTime {
    let words = text.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE);
    ReadingTime {
        words,
        minutes: u32::try_from(minutes).unwrap_or(u32::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::{FrontMatter, test_document};
    use pulldown_cmark::Parser;
    use std::collections::BTreeSet;

    fn run(md: &str, declared: Option<&str>) -> Document {
        let config = SiteConfig::default();
        let slugs = BTreeSet::new();
        let ctx = StageContext { config: &config, slugs: &slugs };

        let mut doc = test_document("page", md);
        let fm = FrontMatter {
            description: declared.map(str::to_string),
            ..FrontMatter::default()
        };
        doc.frontmatter.set("frontmatter", fm).unwrap();
        doc.tree
            .set("parse", Parser::new(md).map(Event::into_static).collect())
            .unwrap();
        DescriptionPlugin.transform_tree(&ctx, &mut doc).unwrap();
        doc
    }

    fn opts(length: usize, max_length: usize) -> DescriptionConfig {
        DescriptionConfig {
            length,
            max_length,
            ..DescriptionConfig::default()
        }
    }

    #[test]
    fn test_whole_sentences_up_to_length() {
        let text = "First sentence here. Second one. Third is a much longer sentence";
        assert_eq!(summarize(text, &opts(35, 300)), "First sentence here. Second one.");
    }

    #[test]
    fn test_first_sentence_always_included() {
        let text = "A very long first sentence that exceeds the limit. Short.";
        assert_eq!(
            summarize(text, &opts(10, 300)),
            "A very long first sentence that exceeds the limit."
        );
    }

    #[test]
    fn test_hard_cut_at_max_length() {
        assert_eq!(summarize("abcdefghij", &opts(5, 5)), "abcde...");
    }

    #[test]
    fn test_urls_are_shortened() {
        assert_eq!(
            strip_urls("see https://example.com/docs?x=1 now"),
            "see example.com/docs now"
        );
    }

    #[test]
    fn test_document_fields() {
        let doc = run("# Title\n\nHello *world*. Bye.\n", None);
        assert_eq!(doc.plain_text.get().unwrap(), "Title\nHello world. Bye.");
        assert_eq!(doc.description.get().unwrap(), "Title Hello world. Bye.");
        assert_eq!(doc.reading_time.get().unwrap().words, 4);
        assert_eq!(doc.reading_time.get().unwrap().minutes, 1);
    }

    #[test]
    fn test_frontmatter_description_wins() {
        let doc = run("Body text.", Some("Declared."));
        assert_eq!(doc.description.get().unwrap(), "Declared.");
    }

    #[test]
    fn test_empty_document_fallback() {
        let doc = run("", None);
        assert_eq!(doc.description.get().unwrap(), FALLBACK);
        assert_eq!(doc.reading_time.get().unwrap().minutes, 0);
    }
}

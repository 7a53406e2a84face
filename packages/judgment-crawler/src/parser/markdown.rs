use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("p").unwrap_or_else(|_| unreachable!())
});

/// Markdown prefix for the court's paragraph classes. Both detail-page
/// template variants use the same class conventions.
fn class_prefix(class: &str) -> Option<&'static str> {
    match class {
        "Judg-Author" => Some("** "),
        "Judg-Heading-1" => Some("# "),
        "Judg-Heading-2" => Some("## "),
        "Judge-Quote-1" => Some("> "),
        "Judge-Quote-2" => Some(">> "),
        "Judg-QuoteList-2" => Some("- "),
        "Judg-QuoteList-3" => Some("  - "),
        "Footnote" => Some("^"),
        "Judg-List-1-No" => Some("1. "),
        "Judg-List-2-No" => Some("a. "),
        "Judg-1" | "Judg-2" | "Judg-List-1-Item" | "Judg-List-2-Item" => Some(""),
        _ => None,
    }
}

/// Render one verdict block as markdown.
///
/// A block that is itself a paragraph renders as a single prefixed line;
/// container blocks render each nested paragraph on its own line.
pub fn block_to_markdown(block: ElementRef<'_>) -> String {
    if block.value().name() == "p" {
        return paragraph_to_markdown(block);
    }

    let paragraphs: Vec<String> = block.select(&PARAGRAPH).map(paragraph_to_markdown).collect();
    if paragraphs.is_empty() {
        convert(&block.inner_html(), block)
    } else {
        paragraphs.join("\n")
    }
}

fn paragraph_to_markdown(paragraph: ElementRef<'_>) -> String {
    let content = convert(&paragraph.inner_html(), paragraph);
    let content = content.trim();

    let prefix = paragraph
        .value()
        .attr("class")
        .and_then(|classes| classes.split_whitespace().find_map(class_prefix));

    match prefix {
        Some(prefix) => format!("{prefix}{content}"),
        None => content.to_string(),
    }
}

fn convert(html: &str, element: ElementRef<'_>) -> String {
    htmd::convert(html)
        .unwrap_or_else(|_| element.text().collect::<String>())
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::*;

    fn render(html: &str) -> String {
        let document = Html::parse_fragment(html);
        let root = document
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .next()
            .expect("fragment has one root element");
        block_to_markdown(root)
    }

    #[test]
    fn headings_get_markdown_prefixes() {
        assert_eq!(
            render(r#"<p class="Judg-Heading-1">Background</p>"#),
            "# Background"
        );
        assert_eq!(
            render(r#"<p class="Judg-Heading-2">The charges</p>"#),
            "## The charges"
        );
    }

    #[test]
    fn quotes_nest_by_depth() {
        assert_eq!(
            render(r#"<p class="Judge-Quote-1">cited passage</p>"#),
            "> cited passage"
        );
        assert_eq!(
            render(r#"<p class="Judge-Quote-2">inner citation</p>"#),
            ">> inner citation"
        );
    }

    #[test]
    fn footnotes_are_caret_marked() {
        assert_eq!(render(r#"<p class="Footnote">see annex A</p>"#), "^see annex A");
    }

    #[test]
    fn body_paragraphs_render_plain() {
        assert_eq!(render(r#"<p class="Judg-1">The accused pleaded guilty.</p>"#),
            "The accused pleaded guilty.");
    }

    #[test]
    fn container_blocks_render_each_paragraph() {
        let markdown = render(
            r#"<div><p class="Judg-Heading-1">Facts</p><p class="Judg-1">On 3 May...</p></div>"#,
        );
        assert_eq!(markdown, "# Facts\nOn 3 May...");
    }

    #[test]
    fn inline_markup_survives_conversion() {
        let markdown = render(r#"<p class="Judg-1">The <em>actus reus</em> was made out.</p>"#);
        assert!(markdown.starts_with("The "));
        assert!(markdown.contains("actus reus"));
        assert!(markdown.ends_with("was made out."));
    }
}

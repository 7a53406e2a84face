use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::errors::CrawlError;
use crate::parser::markdown::block_to_markdown;
use crate::types::TemplateVariant;

static JUDGMENT: LazyLock<Selector> = LazyLock::new(|| selector("#divJudgement"));
static NEW_MARKER: LazyLock<Selector> = LazyLock::new(|| selector("content"));
static INFO_ROW: LazyLock<Selector> = LazyLock::new(|| selector("#info-table tr.info-row"));
static INFO_LABEL: LazyLock<Selector> = LazyLock::new(|| selector("td.txt-label"));
static INFO_BODY: LazyLock<Selector> = LazyLock::new(|| selector("td.txt-body"));
static CORAM: LazyLock<Selector> = LazyLock::new(|| selector("div.HN-Coram"));
static CASE_NUMBER: LazyLock<Selector> = LazyLock::new(|| selector("div.CaseNumber"));
static OLD_VERDICT: LazyLock<Selector> = LazyLock::new(|| selector("#divJudgement > div > p"));
static NEW_VERDICT: LazyLock<Selector> =
    LazyLock::new(|| selector("div.col.col-md-12.align-self-center"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));

const EM_DASH: char = '\u{2014}';
const PROSECUTOR: &str = "public prosecutor";

fn selector(raw: &str) -> Selector {
    // All selectors here are compile-time constants.
    Selector::parse(raw).unwrap_or_else(|_| unreachable!())
}

/// Fields a detail-page template contributes on top of the listing
/// metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFields {
    pub judicial_institution: String,
    pub judges: String,
    pub counsel: String,
    pub defendant: String,
    pub case_number: String,
    pub verdict: String,
    pub verdict_markdown: String,
}

/// Parsed judgment detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailPage {
    /// Outer HTML of the judgment container, the input to the page hash.
    pub container_html: String,
    pub variant: TemplateVariant,
    pub fields: TemplateFields,
    pub pdf_url: Option<String>,
}

/// Parse a judgment detail page. The judgment container is mandatory; a
/// page without one fails extraction for that URL.
pub fn parse_detail(
    html: &str,
    url: &str,
    domain: &str,
    title: &str,
) -> Result<DetailPage, CrawlError> {
    let document = Html::parse_document(html);

    let container = document
        .select(&JUDGMENT)
        .next()
        .ok_or_else(|| CrawlError::Extraction {
            url: url.to_string(),
            reason: "judgment container #divJudgement not found".to_string(),
        })?;

    let variant = if container.select(&NEW_MARKER).next().is_some() {
        TemplateVariant::New
    } else {
        TemplateVariant::Old
    };

    let fields = match variant {
        TemplateVariant::Old => parse_old_template(container),
        TemplateVariant::New => parse_new_template(container, title),
    };

    Ok(DetailPage {
        container_html: container.html(),
        variant,
        fields,
        pdf_url: find_pdf_url(container, domain),
    })
}

/// Legacy layout: structured metadata lives in a labelled info table and
/// the verdict is a flat run of paragraphs ending at the first footnote.
fn parse_old_template(container: ElementRef<'_>) -> TemplateFields {
    let mut fields = TemplateFields::default();

    for row in container.select(&INFO_ROW) {
        let Some(label) = row.select(&INFO_LABEL).next().map(element_text) else {
            continue;
        };
        let Some(value) = row.select(&INFO_BODY).next().map(element_text) else {
            continue;
        };

        if label.contains("Tribunal/Court") {
            fields.judicial_institution = value;
        } else if label.contains("Coram") {
            fields.judges = value;
        } else if label.contains("Counsel Name") {
            fields.counsel = value;
        } else if label.contains("Parties") {
            fields.defendant = defendant_of(value.split(EM_DASH));
        } else if label.contains("Case Number") {
            fields.case_number = value;
        }
    }

    let mut raw = Vec::new();
    let mut markdown = Vec::new();
    for paragraph in container.select(&OLD_VERDICT) {
        if paragraph.value().attr("class") == Some("Footnote") {
            break;
        }
        raw.push(element_text(paragraph));
        markdown.push(block_to_markdown(paragraph));
    }
    fields.verdict = raw.join("\n");
    fields.verdict_markdown = markdown.join("\n");

    fields
}

/// Current layout: the coram block carries court and judges, the defendant
/// comes from the case title, and the verdict sits in centered columns.
fn parse_new_template(container: ElementRef<'_>, title: &str) -> TemplateFields {
    let mut fields = TemplateFields {
        defendant: defendant_of(title.split(" v ")),
        ..TemplateFields::default()
    };

    if let Some(case_number) = container.select(&CASE_NUMBER).next() {
        fields.case_number = element_text(case_number);
    }

    for coram in container.select(&CORAM) {
        // Each line of the coram block is its own text node.
        let lines: Vec<String> = coram
            .text()
            .map(|node| node.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if let Some(first) = lines.first() {
            let institution = first.split(EM_DASH).next().unwrap_or(first);
            fields.judicial_institution = institution.trim().to_string();
        }
        if let Some(second) = lines.get(1) {
            fields.judges = second.clone();
        }
    }

    let mut raw = Vec::new();
    let mut markdown = Vec::new();
    for block in container.select(&NEW_VERDICT) {
        raw.push(element_text(block));
        markdown.push(block_to_markdown(block));
    }
    fields.verdict = raw.join("\n");
    fields.verdict_markdown = markdown.join("\n");

    fields
}

/// The last party that is not the prosecution.
fn defendant_of<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .filter(|part| !part.to_lowercase().contains(PROSECUTOR))
        .last()
        .map(|part| part.trim().to_string())
        .unwrap_or_default()
}

/// First link on the page pointing at a PDF, made absolute against the
/// crawl domain.
fn find_pdf_url(container: ElementRef<'_>, domain: &str) -> Option<String> {
    for anchor in container.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.contains("pdf") {
            continue;
        }
        if href.starts_with("http") {
            return Some(href.to_string());
        }
        return Some(format!("https://{domain}{href}"));
    }
    None
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

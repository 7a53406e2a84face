use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::CrawlError;
use crate::parser::{parse_detail, DetailPage};
use crate::types::{page_hash, ExtractionMetadata, ExtractionRecord, FrontierEntry};

const LANGUAGE: &str = "en";

/// Build the extraction record for one fetched detail page.
///
/// Listing metadata stays authoritative for citation, classification, and
/// date fields; the detail page contributes the template-specific fields
/// and the judgment body. The record shares its id with the frontier entry.
pub fn extract_judgment(
    html: &str,
    entry: &FrontierEntry,
    domain: &str,
) -> Result<ExtractionRecord, CrawlError> {
    let page = parse_detail(html, &entry.url, domain, &entry.metadata.title)?;
    debug!(url = %entry.url, variant = ?page.variant, "parsed detail page");

    let year = decision_year(&entry.metadata.decision_date).ok_or_else(|| {
        CrawlError::Extraction {
            url: entry.url.clone(),
            reason: format!(
                "decision date {:?} is not RFC 3339",
                entry.metadata.decision_date
            ),
        }
    })?;

    // Metadata borrows the parsed page, so build it before the container
    // HTML moves into the record.
    let metadata = metadata_of(entry, &page, year);
    let now = Utc::now();
    Ok(ExtractionRecord {
        id: entry.id.clone(),
        url_frontier_id: entry.id.clone(),
        page_hash: Some(page_hash(&page.container_html)),
        site_content: Some(page.container_html),
        artifact_link: None,
        raw_page_link: None,
        language: LANGUAGE.to_string(),
        metadata,
        created_at: now,
        updated_at: now,
    })
}

fn metadata_of(entry: &FrontierEntry, page: &DetailPage, year: String) -> ExtractionMetadata {
    let fields = &page.fields;

    let mut case_numbers = entry.metadata.case_numbers.clone();
    if !fields.case_number.is_empty() && !case_numbers.contains(&fields.case_number) {
        case_numbers.push(fields.case_number.clone());
    }

    ExtractionMetadata {
        citation_number: entry.metadata.citation_number.clone(),
        case_numbers,
        classifications: entry.metadata.categories.clone(),
        year,
        decision_date: entry.metadata.decision_date.clone(),
        title: entry.metadata.title.clone(),
        defendant: fields.defendant.clone(),
        judicial_institution: fields.judicial_institution.clone(),
        judges: fields.judges.clone(),
        counsel: fields.counsel.clone(),
        verdict: fields.verdict.clone(),
        verdict_markdown: fields.verdict_markdown.clone(),
        pdf_url: page.pdf_url.clone().unwrap_or_default(),
    }
}

fn decision_year(decision_date: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(decision_date)
        .ok()
        .map(|date| date.format("%Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrontierStatus, ListingMetadata};

    const DOMAIN: &str = "www.elitigation.sg";

    fn entry() -> FrontierEntry {
        FrontierEntry::discovered(
            "https://www.elitigation.sg/gd/s/2023_SGHC_42".to_string(),
            DOMAIN,
            "sg-supreme-court",
            ListingMetadata {
                citation_number: "[2023] SGHC 42".to_string(),
                decision_date: "2023-01-12T00:00:00+00:00".to_string(),
                title: "Public Prosecutor v Tan Ah Kow".to_string(),
                categories: vec!["Corruption".to_string()],
                case_numbers: vec!["Suit 123/2020".to_string()],
            },
        )
    }

    fn detail_html() -> &'static str {
        r#"<html><body><div id="divJudgement">
             <table id="info-table">
               <tr class="info-row"><td class="txt-label">Tribunal/Court</td><td class="txt-body">High Court</td></tr>
               <tr class="info-row"><td class="txt-label">Case Number</td><td class="txt-body">CC 12 of 2022</td></tr>
             </table>
             <div><p class="Judg-1">The accused claimed trial.</p></div>
             <a href="/pdf/judgment.pdf">PDF</a>
           </div></body></html>"#
    }

    #[test]
    fn record_shares_identity_with_the_frontier_entry() {
        let entry = entry();
        let record = extract_judgment(detail_html(), &entry, DOMAIN).unwrap();
        assert_eq!(record.id, entry.id);
        assert_eq!(record.url_frontier_id, entry.id);
        assert_eq!(entry.status, FrontierStatus::New);
    }

    #[test]
    fn listing_metadata_stays_authoritative() {
        let record = extract_judgment(detail_html(), &entry(), DOMAIN).unwrap();
        assert_eq!(record.metadata.citation_number, "[2023] SGHC 42");
        assert_eq!(record.metadata.year, "2023");
        assert_eq!(record.metadata.title, "Public Prosecutor v Tan Ah Kow");
        assert_eq!(record.metadata.classifications, vec!["Corruption"]);
    }

    #[test]
    fn detail_case_number_is_appended_without_duplicates() {
        let record = extract_judgment(detail_html(), &entry(), DOMAIN).unwrap();
        assert_eq!(
            record.metadata.case_numbers,
            vec!["Suit 123/2020", "CC 12 of 2022"]
        );

        let again = extract_judgment(detail_html(), &entry(), DOMAIN).unwrap();
        assert_eq!(again.metadata.case_numbers.len(), 2);
    }

    #[test]
    fn page_hash_covers_the_container_html() {
        let record = extract_judgment(detail_html(), &entry(), DOMAIN).unwrap();
        let container = record.site_content.as_deref().unwrap();
        assert_eq!(record.page_hash.as_deref(), Some(page_hash(container).as_str()));
        assert!(container.contains("divJudgement"));
    }

    #[test]
    fn same_page_yields_the_same_hash() {
        let first = extract_judgment(detail_html(), &entry(), DOMAIN).unwrap();
        let second = extract_judgment(detail_html(), &entry(), DOMAIN).unwrap();
        assert_eq!(first.page_hash, second.page_hash);
    }

    #[test]
    fn bad_decision_date_fails_extraction_for_the_url() {
        let mut entry = entry();
        entry.metadata.decision_date = "12 Jan 2023".to_string();
        let err = extract_judgment(detail_html(), &entry, DOMAIN).unwrap_err();
        assert!(matches!(err, CrawlError::Extraction { .. }));
    }

    #[test]
    fn record_keeps_both_the_container_html_and_its_metadata() {
        let record = extract_judgment(detail_html(), &entry(), DOMAIN).unwrap();
        let container = record.site_content.as_deref().unwrap();
        assert!(container.contains("The accused claimed trial."));
        assert_eq!(record.metadata.judicial_institution, "High Court");
        assert_eq!(record.metadata.verdict, "The accused claimed trial.");
    }

    #[test]
    fn pdf_url_lands_in_metadata() {
        let record = extract_judgment(detail_html(), &entry(), DOMAIN).unwrap();
        assert_eq!(
            record.metadata.pdf_url,
            "https://www.elitigation.sg/pdf/judgment.pdf"
        );
    }
}

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use crate::errors::CrawlError;
use crate::types::{ListingMetadata, Pagination};

static LISTVIEW: LazyLock<Selector> = LazyLock::new(|| selector("#listview"));
static CARD: LazyLock<Selector> = LazyLock::new(|| selector("#listview > div.row > div.card.col-12"));
static CARD_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a.h5.gd-heardertext"));
static ADD_INFO: LazyLock<Selector> = LazyLock::new(|| selector(".gd-addinfo-text"));
static CATCHWORD: LazyLock<Selector> = LazyLock::new(|| selector("div.gd-catchword-container a"));
static SUMMARY: LazyLock<Selector> = LazyLock::new(|| selector("div.gd-csummary"));
static PAGE_LINK: LazyLock<Selector> = LazyLock::new(|| selector("li.page-item.page-link > a"));

static FIRST_INT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+").unwrap_or_else(|_| unreachable!())
});

const DECISION_DATE_LABEL: &str = "Decision Date:";

fn selector(raw: &str) -> Selector {
    // All selectors here are compile-time constants.
    Selector::parse(raw).unwrap_or_else(|_| unreachable!())
}

/// One judgment card lifted off a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCard {
    pub url: String,
    pub metadata: ListingMetadata,
}

/// Parse every judgment card on a listing page.
///
/// A missing listing container is fatal to the page. A malformed card is
/// logged and skipped; the rest of the page still yields results.
pub fn parse_listing_cards(html: &str, domain: &str) -> Result<Vec<ListingCard>, CrawlError> {
    let document = Html::parse_document(html);

    if document.select(&LISTVIEW).next().is_none() {
        return Err(CrawlError::Discovery(
            "listing container #listview not found".to_string(),
        ));
    }

    let mut cards = Vec::new();
    for element in document.select(&CARD) {
        match parse_card(element, domain) {
            Ok(card) => cards.push(card),
            Err(err) => warn!(error = %err, "skipping malformed listing card"),
        }
    }
    Ok(cards)
}

fn parse_card(element: ElementRef<'_>, domain: &str) -> Result<ListingCard, CrawlError> {
    let link = element
        .select(&CARD_LINK)
        .next()
        .ok_or_else(|| CrawlError::Parse("card has no heading link".to_string()))?;

    let href = link
        .value()
        .attr("href")
        .ok_or_else(|| CrawlError::Parse("card heading link has no href".to_string()))?;

    if !href.contains("/gd/s") {
        return Err(CrawlError::Parse(format!(
            "card link {href} is not a detail page"
        )));
    }

    let title = element_text(link);

    let mut citation_number = String::new();
    let mut decision_date = String::new();
    let mut case_numbers = Vec::new();
    for (index, info) in element.select(&ADD_INFO).enumerate() {
        let text = element_text(info);
        if let Some(raw_date) = text.strip_prefix(DECISION_DATE_LABEL) {
            decision_date = normalize_decision_date(raw_date.trim());
        } else if index == 0 {
            citation_number = text;
        } else if !text.is_empty() {
            case_numbers.push(text);
        }
    }

    let categories = element
        .select(&CATCHWORD)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect();

    Ok(ListingCard {
        url: absolute_url(domain, href),
        metadata: ListingMetadata {
            citation_number,
            decision_date,
            title,
            categories,
            case_numbers,
        },
    })
}

/// Probe result for page 1 of a query: total result count plus the highest
/// page number advertised in the pagination strip. A page with no
/// pagination links is its own last page.
pub fn parse_pagination(html: &str, current_page: u32) -> Result<Pagination, CrawlError> {
    let document = Html::parse_document(html);

    let summary = document
        .select(&SUMMARY)
        .next()
        .ok_or_else(|| CrawlError::Discovery("result summary not found".to_string()))?;
    let summary_text = element_text(summary);
    let total_results = FIRST_INT
        .find(&summary_text)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| {
            CrawlError::Discovery(format!("no result count in summary {summary_text:?}"))
        })?;

    let mut last_page = current_page;
    for link in document.select(&PAGE_LINK) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if let Some(page) = page_of(href) {
            last_page = last_page.max(page);
        }
    }

    Ok(Pagination {
        last_page,
        total_results,
    })
}

fn page_of(href: &str) -> Option<u32> {
    let base = Url::parse("https://www.elitigation.sg/").ok()?;
    let url = base.join(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "CurrentPage")
        .and_then(|(_, value)| value.parse().ok())
}

fn absolute_url(domain: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("https://{domain}{href}")
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Listing cards render dates as e.g. "12 Jan 2023"; persist RFC 3339 so
/// downstream consumers can parse them without knowing the site format.
fn normalize_decision_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw, "%d %b %Y") {
        Ok(date) => date
            .and_time(NaiveTime::MIN)
            .and_utc()
            .to_rfc3339(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "www.elitigation.sg";

    fn listing_page(cards: &str, pagination: &str) -> String {
        format!(
            r#"<html><body><div id="listview">
                 <div class="row justify-content-between align-items-center">
                   <div class="gd-csummary">237 judgment(s) found</div>
                 </div>
                 <div class="row">{cards}</div>
                 <div class="row justify-content-end"><div><ul>{pagination}</ul></div></div>
               </div></body></html>"#
        )
    }

    fn card(href: &str, title: &str, citation: &str, date: &str) -> String {
        format!(
            r##"<div class="card col-12">
                 <a class="h5 gd-heardertext" href="{href}">{title}</a>
                 <div class="gd-card-body">
                   <span class="gd-addinfo-text">{citation}</span>
                   <span class="gd-addinfo-text">Decision Date: {date}</span>
                   <span class="gd-addinfo-text">Suit 123/2020</span>
                 </div>
                 <div class="gd-catchword-container">
                   <a href="#">Criminal Law</a><a href="#">Corruption</a>
                 </div>
               </div>"##
        )
    }

    fn page_link(page: u32) -> String {
        format!(
            r#"<li class="page-item page-link"><a href="/gd/Home/Index?CurrentPage={page}">{page}</a></li>"#
        )
    }

    #[test]
    fn parses_card_fields() {
        let html = listing_page(
            &card(
                "/gd/s/2023_SGHC_42",
                "Public Prosecutor v Tan Ah Kow",
                "[2023] SGHC 42",
                "12 Jan 2023",
            ),
            "",
        );
        let cards = parse_listing_cards(&html, DOMAIN).unwrap();
        assert_eq!(cards.len(), 1);
        let card = &cards[0];
        assert_eq!(card.url, "https://www.elitigation.sg/gd/s/2023_SGHC_42");
        assert_eq!(card.metadata.title, "Public Prosecutor v Tan Ah Kow");
        assert_eq!(card.metadata.citation_number, "[2023] SGHC 42");
        assert_eq!(card.metadata.decision_date, "2023-01-12T00:00:00+00:00");
        assert_eq!(card.metadata.case_numbers, vec!["Suit 123/2020"]);
        assert_eq!(card.metadata.categories, vec!["Criminal Law", "Corruption"]);
    }

    #[test]
    fn missing_listview_is_a_discovery_error() {
        let err = parse_listing_cards("<html><body></body></html>", DOMAIN).unwrap_err();
        assert!(matches!(err, CrawlError::Discovery(_)));
    }

    #[test]
    fn malformed_card_is_skipped_not_fatal() {
        let broken = r#"<div class="card col-12"><span>no link here</span></div>"#;
        let good = card(
            "/gd/s/2023_SGHC_43",
            "Public Prosecutor v Lim",
            "[2023] SGHC 43",
            "13 Jan 2023",
        );
        let html = listing_page(&format!("{broken}{good}"), "");
        let cards = parse_listing_cards(&html, DOMAIN).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].metadata.citation_number, "[2023] SGHC 43");
    }

    #[test]
    fn non_detail_links_are_skipped() {
        let html = listing_page(
            &card("/gd/Home/Index?page=2", "Not a judgment", "x", "1 Jan 2020"),
            "",
        );
        let cards = parse_listing_cards(&html, DOMAIN).unwrap();
        assert!(cards.is_empty());
    }

    #[test]
    fn pagination_takes_the_highest_linked_page() {
        let links = [2, 3, 24, 4]
            .iter()
            .map(|page| page_link(*page))
            .collect::<String>();
        let html = listing_page("", &links);
        let pagination = parse_pagination(&html, 1).unwrap();
        assert_eq!(pagination.last_page, 24);
        assert_eq!(pagination.total_results, 237);
    }

    #[test]
    fn no_pagination_links_means_single_page() {
        let html = listing_page("", "");
        let pagination = parse_pagination(&html, 1).unwrap();
        assert_eq!(pagination.last_page, 1);
        assert_eq!(pagination.total_results, 237);
    }

    #[test]
    fn missing_summary_is_a_discovery_error() {
        let html = r#"<html><body><div id="listview"></div></body></html>"#;
        assert!(matches!(
            parse_pagination(html, 1),
            Err(CrawlError::Discovery(_))
        ));
    }

    #[test]
    fn unparseable_dates_pass_through_raw() {
        let html = listing_page(
            &card("/gd/s/2023_SGHC_44", "A v B", "[2023] SGHC 44", "sometime"),
            "",
        );
        let cards = parse_listing_cards(&html, DOMAIN).unwrap();
        assert_eq!(cards[0].metadata.decision_date, "sometime");
    }
}

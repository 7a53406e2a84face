//! DOM parsing for the judgment index.
//!
//! All HTML parsing happens in synchronous functions on raw HTML strings;
//! `scraper::Html` never crosses an await point.

pub mod detail;
pub mod listing;
pub mod markdown;

pub use detail::{parse_detail, DetailPage, TemplateFields};
pub use listing::{parse_listing_cards, parse_pagination, ListingCard};

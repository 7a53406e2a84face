use url::Url;

use crate::errors::CrawlError;

/// One listing search against the judgment index, addressable by page.
///
/// The index keys pagination off the `currentPage` query parameter and keeps
/// every other parameter stable across pages, so a query plus a page number
/// fully determines a listing URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub base: Url,
    pub filter: String,
    pub year_of_decision: String,
    pub sort_by: String,
    pub current_page: u32,
    pub sort_ascending: bool,
    pub search_phrase: String,
    pub verbose: bool,
}

impl ListingQuery {
    /// Parse a listing URL into its query components. Missing parameters
    /// take neutral defaults.
    pub fn parse(raw: &str) -> Result<Self, CrawlError> {
        let url = Url::parse(raw)
            .map_err(|err| CrawlError::Discovery(format!("invalid listing url {raw}: {err}")))?;

        let mut query = Self {
            base: {
                let mut base = url.clone();
                base.set_query(None);
                base
            },
            filter: String::new(),
            year_of_decision: "All".to_string(),
            sort_by: "DateOfDecision".to_string(),
            current_page: 1,
            sort_ascending: false,
            search_phrase: String::new(),
            verbose: false,
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "filter" => query.filter = value.into_owned(),
                "yearOfDecision" => query.year_of_decision = value.into_owned(),
                "sortBy" => query.sort_by = value.into_owned(),
                "currentPage" => {
                    query.current_page = value.parse().map_err(|_| {
                        CrawlError::Discovery(format!("non-numeric currentPage in {raw}"))
                    })?;
                }
                "sortAscending" => query.sort_ascending = value.eq_ignore_ascii_case("true"),
                "searchPhrase" => query.search_phrase = value.into_owned(),
                "verbose" => query.verbose = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        Ok(query)
    }

    /// Same query addressed at a different page.
    pub fn with_page(&self, page: u32) -> Self {
        let mut query = self.clone();
        query.current_page = page;
        query
    }

    /// Render the listing URL. Parameter order is fixed so the rendered URL
    /// is stable for a given query.
    pub fn to_url(&self) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("filter", &self.filter)
            .append_pair("yearOfDecision", &self.year_of_decision)
            .append_pair("sortBy", &self.sort_by)
            .append_pair("currentPage", &self.current_page.to_string())
            .append_pair("sortAscending", bool_param(self.sort_ascending))
            .append_pair("searchPhrase", &self.search_phrase)
            .append_pair("verbose", bool_param(self.verbose));
        url
    }

    /// URLs for pages `first..=last` of this query.
    pub fn page_urls(&self, first: u32, last: u32) -> Vec<Url> {
        (first..=last)
            .map(|page| self.with_page(page).to_url())
            .collect()
    }
}

fn bool_param(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

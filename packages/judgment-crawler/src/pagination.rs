use tracing::info;

use crate::errors::CrawlError;
use crate::parser::parse_pagination;
use crate::query::ListingQuery;
use crate::traits::PageSession;
use crate::types::Pagination;

/// Probe the query's starting page and read the pagination strip.
///
/// The listing advertises its page count only through pagination links, so
/// the probe loads one page and takes the highest linked page number. A
/// query whose results fit on one page has no links and is its own last
/// page.
pub async fn discover_pagination<S: PageSession>(
    session: &mut S,
    query: &ListingQuery,
) -> Result<Pagination, CrawlError> {
    let url = query.to_url();
    session.navigate(url.as_str()).await?;
    session.wait_stable().await?;

    let pagination = parse_pagination(session.content()?, query.current_page)?;
    info!(
        total = pagination.total_results,
        last_page = pagination.last_page,
        "discovered pagination"
    );
    Ok(pagination)
}

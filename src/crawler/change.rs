//! Detecting that an asynchronous page swap has landed.

use super::poll::{PollError, PollPolicy, poll_until};
use crate::extract::extract_holdings;
use crate::models::PageTable;
use crate::session::RenderSession;
use tracing::trace;

/// Structural comparison: any differing row or cell counts as a change.
pub fn has_changed(previous: &PageTable, current: &PageTable) -> bool {
    previous != current
}

/// Re-read the page until its holdings table differs from `previous`.
///
/// Markup that does not yet contain a usable table counts as "not changed",
/// since the table is often torn down and rebuilt during the swap.
pub async fn wait_for_change(
    session: &dyn RenderSession,
    previous: &PageTable,
    marker: &str,
    policy: &PollPolicy,
) -> Result<PageTable, PollError> {
    poll_until(policy, move || async move {
        let markup = session.markup().await?;
        match extract_holdings(&markup, marker) {
            Ok(table) if has_changed(previous, &table) => Ok(table),
            Ok(_) => {
                trace!("Page still shows previous table");
                Err(PollError::Pending)
            }
            Err(e) => {
                trace!("Table not ready: {}", e);
                Err(PollError::Pending)
            }
        }
    })
    .await
}

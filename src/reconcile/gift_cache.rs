use std::collections::HashMap;

use tracing::debug;

use crate::adapters::traits::DestinationSink;
use crate::crm::models::Gift;
use crate::error::AppResult;

/// Gifts per constituent, loaded at most once per batch run.
///
/// Owned by a single run and handed to the engine by `&mut`, so nothing
/// leaks between runs.
#[derive(Debug, Default)]
pub struct GiftCache {
    by_constituent: HashMap<String, Vec<Gift>>,
}

impl GiftCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// All gifts of every type for the constituent, fetching on first use.
    pub async fn gifts_for(
        &mut self,
        sink: &dyn DestinationSink,
        constituent_id: &str,
    ) -> AppResult<&[Gift]> {
        if !self.by_constituent.contains_key(constituent_id) {
            let gifts = sink.list_gifts_by_constituent(constituent_id, None).await?;
            debug!("💾 Cached {} gift(s) for constituent {}", gifts.len(), constituent_id);
            self.by_constituent.insert(constituent_id.to_string(), gifts);
        }

        Ok(self
            .by_constituent
            .get(constituent_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Adds a freshly created gift to its constituent's entry.
    ///
    /// Constituents that were never loaded are left alone so their first
    /// lookup still fetches the complete list.
    pub fn record(&mut self, gift: Gift) {
        if let Some(gifts) = self.by_constituent.get_mut(&gift.constituent_id) {
            gifts.push(gift);
        }
    }

    pub fn loaded_constituents(&self) -> usize {
        self.by_constituent.len()
    }
}

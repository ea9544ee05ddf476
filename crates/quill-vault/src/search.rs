//! Client-side search over decrypted records.
//!
//! Ciphertext cannot be searched server-side, so search here is the direct
//! consequence of zero-knowledge storage: load the user's record set in
//! bulk, decrypt, and filter locally. That makes it O(n) over the loaded
//! set by design, not by oversight; record sets are personal-scale.

use quill_core::{EntityRepository, ListOptions, NoteRepository, Result, SearchResults};

use crate::Vault;

impl Vault {
    /// Case-insensitive substring search across a user's notes and
    /// entities.
    ///
    /// Records flagged `decryption_error` are excluded: their sensitive
    /// fields hold sentinels, and matching against a sentinel would
    /// surface garbage hits.
    pub async fn search(&self, user_id: &str, query: &str) -> Result<SearchResults> {
        let needle = query.to_lowercase();
        let everything = ListOptions {
            limit: None,
            offset: 0,
            newest_first: true,
        };

        let (notes, entities) = tokio::try_join!(
            self.notes.load_many(user_id, everything.clone()),
            self.entities.load_many(user_id, everything),
        )?;

        Ok(SearchResults {
            notes: notes
                .into_iter()
                .filter(|n| !n.decryption_error && n.content.to_lowercase().contains(&needle))
                .collect(),
            entities: entities
                .into_iter()
                .filter(|e| {
                    !e.decryption_error
                        && (e.name.to_lowercase().contains(&needle)
                            || e.summary.to_lowercase().contains(&needle))
                })
                .collect(),
        })
    }
}

//! One-shot decrypted export.
//!
//! Export is the single place bulk plaintext deliberately leaves the
//! vault. It is user-initiated and explicit; nothing else decrypts a
//! user's whole record set in one pass.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use quill_core::{
    EntityRepository, ExportData, ExportDocument, FactRepository, ListOptions, MirrorConversation,
    MirrorMessage, MirrorMessageRepository, NoteRepository, PatternRepository, Result,
    EXPORT_FORMAT,
};

use crate::Vault;

impl Vault {
    /// Load and decrypt every record type for a user into one document.
    ///
    /// The result is tagged with the export format version and an explicit
    /// `plaintext` marker. Hand it to the user and drop it; it must never
    /// be written back to the store.
    pub async fn export_all(&self, user_id: &str) -> Result<ExportDocument> {
        // Chronological order reads better in an export file.
        let everything = ListOptions {
            limit: None,
            offset: 0,
            newest_first: false,
        };

        let (notes, entities, facts, patterns, messages) = tokio::try_join!(
            self.notes.load_many(user_id, everything.clone()),
            self.entities.load_many(user_id, everything.clone()),
            self.facts.load_many(user_id, everything.clone()),
            self.patterns.load_many(user_id, everything.clone()),
            self.mirror.load_many(user_id, everything),
        )?;

        info!(
            subsystem = "vault",
            component = "export",
            op = "export_all",
            user_id,
            row_count = notes.len() + entities.len() + facts.len() + patterns.len() + messages.len(),
            "Built decrypted export document"
        );

        Ok(ExportDocument {
            format: EXPORT_FORMAT.to_string(),
            exported_at: Utc::now(),
            plaintext: true,
            data: ExportData {
                notes,
                entities,
                facts,
                patterns,
                mirror_conversations: group_conversations(messages),
            },
        })
    }
}

/// Group a chronological message list into per-conversation documents.
fn group_conversations(messages: Vec<MirrorMessage>) -> Vec<MirrorConversation> {
    let mut grouped: BTreeMap<Uuid, Vec<MirrorMessage>> = BTreeMap::new();
    for message in messages {
        grouped.entry(message.conversation_id).or_default().push(message);
    }

    grouped
        .into_iter()
        .map(|(conversation_id, messages)| MirrorConversation {
            conversation_id,
            messages,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::new_v7;

    fn message(conversation_id: Uuid, content: &str) -> MirrorMessage {
        MirrorMessage {
            id: new_v7(),
            user_id: "u1".to_string(),
            conversation_id,
            role: "user".to_string(),
            content: content.to_string(),
            created_at_utc: Utc::now(),
            is_encrypted: true,
            decryption_error: false,
        }
    }

    #[test]
    fn test_group_conversations_keeps_order_within_thread() {
        let a = new_v7();
        let b = new_v7();
        let messages = vec![message(a, "one"), message(b, "other"), message(a, "two")];

        let grouped = group_conversations(messages);
        assert_eq!(grouped.len(), 2);

        let thread_a = grouped
            .iter()
            .find(|c| c.conversation_id == a)
            .unwrap();
        let contents: Vec<&str> = thread_a.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }
}

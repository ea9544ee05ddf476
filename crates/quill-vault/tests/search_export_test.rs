//! Client-side search and one-shot export.

use std::sync::Arc;

use quill_core::{
    CreateEntityRequest, CreateMirrorMessageRequest, CreateNoteRequest, EntityRepository,
    MirrorMessageRepository, NoteRepository, EXPORT_FORMAT,
};
use quill_vault::{MemoryStore, Vault, VaultConfig};
use serde_json::json;

async fn seeded_vault() -> (Arc<MemoryStore>, Vault) {
    let store = Arc::new(MemoryStore::new());
    let vault = Vault::new(store.clone(), VaultConfig::default());
    vault.session().unlock("u1").await.unwrap();

    for content in ["Groceries for the week", "Call the dentist", "Dentist moved to Tuesday"] {
        vault
            .notes
            .save(CreateNoteRequest {
                user_id: "u1".to_string(),
                source: "text".to_string(),
                content: content.to_string(),
                tags: vec![],
            })
            .await
            .unwrap();
    }

    vault
        .entities
        .save(CreateEntityRequest {
            user_id: "u1".to_string(),
            kind: "person".to_string(),
            name: "Dr. Dentiste".to_string(),
            summary: "my dentist since 2023".to_string(),
            confidence: 0.9,
        })
        .await
        .unwrap();

    (store, vault)
}

#[tokio::test]
async fn test_search_is_case_insensitive_substring() {
    let (_store, vault) = seeded_vault().await;

    let results = vault.search("u1", "dentist").await.unwrap();
    assert_eq!(results.notes.len(), 2);
    assert_eq!(results.entities.len(), 1);
    assert_eq!(results.len(), 3);

    let results = vault.search("u1", "DENTIST").await.unwrap();
    assert_eq!(results.len(), 3);

    let results = vault.search("u1", "groceries").await.unwrap();
    assert_eq!(results.notes.len(), 1);
    assert!(results.entities.is_empty());
}

#[tokio::test]
async fn test_search_misses_return_empty() {
    let (_store, vault) = seeded_vault().await;
    let results = vault.search("u1", "nonexistent topic").await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_search_does_not_cross_users() {
    let (_store, vault) = seeded_vault().await;
    let results = vault.search("someone-else", "dentist").await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_search_skips_undecryptable_records() {
    let (store, vault) = seeded_vault().await;

    // Corrupt one matching note's envelope.
    use quill_core::{ListOptions, RemoteStore};
    let notes = vault
        .notes
        .load_many("u1", ListOptions::default())
        .await
        .unwrap();
    let target = notes.iter().find(|n| n.content.contains("Call")).unwrap();
    store
        .update(
            "notes",
            &target.id.to_string(),
            json!({"content_encrypted": "ruined"}),
        )
        .await
        .unwrap();

    let results = vault.search("u1", "dentist").await.unwrap();
    assert_eq!(results.notes.len(), 1);
    assert_eq!(results.entities.len(), 1);
}

#[tokio::test]
async fn test_export_document_shape() {
    let (_store, vault) = seeded_vault().await;

    let conversation_id = quill_core::new_v7();
    for content in ["evening check-in", "slept better this week"] {
        vault
            .mirror
            .save(CreateMirrorMessageRequest {
                user_id: "u1".to_string(),
                conversation_id,
                role: "user".to_string(),
                content: content.to_string(),
            })
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let export = vault.export_all("u1").await.unwrap();

    assert_eq!(export.format, EXPORT_FORMAT);
    assert!(export.plaintext);
    assert_eq!(export.data.notes.len(), 3);
    assert_eq!(export.data.entities.len(), 1);
    assert_eq!(export.data.mirror_conversations.len(), 1);

    let thread = &export.data.mirror_conversations[0];
    assert_eq!(thread.conversation_id, conversation_id);
    assert_eq!(thread.messages.len(), 2);
    assert_eq!(thread.messages[0].content, "evening check-in");

    // Everything in the document is decrypted plaintext.
    assert!(export.data.notes.iter().all(|n| !n.decryption_error));
    assert!(export
        .data
        .notes
        .iter()
        .any(|n| n.content == "Groceries for the week"));
    assert_eq!(export.data.entities[0].name, "Dr. Dentiste");
}

#[tokio::test]
async fn test_export_serializes_to_json() {
    let (_store, vault) = seeded_vault().await;
    let export = vault.export_all("u1").await.unwrap();

    let rendered = serde_json::to_string_pretty(&export).unwrap();
    assert!(rendered.contains("\"format\": \"export/2\""));
    assert!(rendered.contains("Groceries for the week"));
}

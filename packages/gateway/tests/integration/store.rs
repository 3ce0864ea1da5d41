use common::DeliveryStatus;
use gateway::store::{DocumentStore, IngestOutcome, to_canonical};

use crate::common::{TestApp, order, t0};

mod ingestion {
    use super::*;

    #[tokio::test]
    async fn insert_creates_document_and_pending_entry() {
        let app = TestApp::spawn(vec![]).await;
        let doc = order("ext-1", "PO-1");

        let outcome = DocumentStore::new(&app.db)
            .insert_if_absent(&doc, t0())
            .await
            .expect("Insert failed");
        assert!(outcome.is_inserted());

        let entries = app.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].document_id, outcome.document_id());
        assert_eq!(entries[0].status, DeliveryStatus::Pending);
        assert_eq!(entries[0].attempts, 0);
        assert!(entries[0].next_retry_at.is_none());
    }

    #[tokio::test]
    async fn second_insert_of_same_id_is_a_no_op() {
        let app = TestApp::spawn(vec![]).await;
        let store = DocumentStore::new(&app.db);
        let doc = order("ext-1", "PO-1");

        let first = store.insert_if_absent(&doc, t0()).await.unwrap();
        let second = store.insert_if_absent(&doc, t0()).await.unwrap();

        assert_eq!(
            second,
            IngestOutcome::AlreadyExists {
                document_id: first.document_id()
            }
        );
        assert_eq!(app.document_count().await, 1);
        assert_eq!(app.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn flow_id_match_counts_as_already_seen() {
        let app = TestApp::spawn(vec![]).await;
        let store = DocumentStore::new(&app.db);

        let mut first = order("ext-1", "PO-1");
        first.flow_id = Some("flow-1".into());
        let inserted = store.insert_if_absent(&first, t0()).await.unwrap();

        let mut reissued = order("ext-2", "PO-1");
        reissued.flow_id = Some("flow-1".into());
        let outcome = store.insert_if_absent(&reissued, t0()).await.unwrap();

        assert!(!outcome.is_inserted());
        assert_eq!(outcome.document_id(), inserted.document_id());
        assert_eq!(app.document_count().await, 1);
    }

    #[tokio::test]
    async fn documents_without_flow_id_do_not_collide() {
        let app = TestApp::spawn(vec![]).await;
        let store = DocumentStore::new(&app.db);

        store.insert_if_absent(&order("a", "1"), t0()).await.unwrap();
        store.insert_if_absent(&order("b", "2"), t0()).await.unwrap();

        assert_eq!(app.document_count().await, 2);
        assert_eq!(app.entries().await.len(), 2);
    }

    #[tokio::test]
    async fn stored_document_round_trips() {
        let app = TestApp::spawn(vec![]).await;
        let mut doc = order("ext-1", "PO-1");
        doc.raw_payload = serde_json::json!({ "documentId": "ext-1", "content": { "k": 1 } });

        let id = DocumentStore::new(&app.db)
            .insert_if_absent(&doc, t0())
            .await
            .unwrap()
            .document_id();

        let model = app.document(id).await;
        assert_eq!(model.number, "PO-1");
        assert_eq!(model.raw_payload["content"]["k"], 1);
        assert!(model.document.get("rawPayload").is_none());

        let back = to_canonical(&model).expect("Stored document should decode");
        assert_eq!(back, doc);
    }
}

mod insert_race {
    use super::*;

    // `insert` skips the existence check, as a concurrent writer would
    // after both saw the identity as unknown.

    #[tokio::test]
    async fn external_id_conflict_reports_existing_row() {
        let app = TestApp::spawn(vec![]).await;
        let store = DocumentStore::new(&app.db);
        let doc = order("ext-1", "PO-1");

        let first = store.insert(&doc, t0()).await.unwrap();
        let second = store
            .insert(&doc, t0())
            .await
            .expect("Conflict should not be an error");

        assert_eq!(
            second,
            IngestOutcome::AlreadyExists {
                document_id: first.document_id()
            }
        );
        assert_eq!(app.document_count().await, 1);
        assert_eq!(app.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn flow_id_conflict_reports_existing_row() {
        let app = TestApp::spawn(vec![]).await;
        let store = DocumentStore::new(&app.db);

        let mut first = order("ext-1", "PO-1");
        first.flow_id = Some("flow-1".into());
        let inserted = store.insert(&first, t0()).await.unwrap();

        let mut reissued = order("ext-2", "PO-1");
        reissued.flow_id = Some("flow-1".into());
        let outcome = store
            .insert(&reissued, t0())
            .await
            .expect("Conflict should not be an error");

        assert_eq!(
            outcome,
            IngestOutcome::AlreadyExists {
                document_id: inserted.document_id()
            }
        );
        assert_eq!(app.document_count().await, 1);
        assert_eq!(app.entries().await.len(), 1);
    }
}

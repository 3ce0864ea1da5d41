use chrono::Duration;
use common::{DeliveryStatus, DocType, RetryPolicy};
use gateway::error::GatewayError;
use gateway::pipeline::{CycleReport, DeliveryOutcome};
use gateway::queue::DeliveryQueue;
use gateway::store::DocumentStore;
use gateway::templates::{TemplateInput, TemplateStore};

use crate::common::{StaticSource, TestApp, order, t0};

async fn ingest_one(app: &TestApp, external_id: &str, number: &str) -> i32 {
    DocumentStore::new(&app.db)
        .insert_if_absent(&order(external_id, number), t0())
        .await
        .expect("Insert failed")
        .document_id()
}

fn template(body: &str, line: &str) -> TemplateInput {
    TemplateInput {
        name: "test".into(),
        body_tpl: body.into(),
        line_tpl: line.into(),
        content_type: codec::XML_CONTENT_TYPE.into(),
        is_active: true,
    }
}

mod backoff {
    use super::*;

    #[tokio::test]
    async fn three_rejections_leave_entry_in_error() {
        let app = TestApp::spawn(vec![]).await;
        ingest_one(&app, "ext-1", "PO-1").await;
        app.receiver.respond_with(&[503, 503, 503]);

        let t1 = t0() + Duration::minutes(2);
        let t2 = t1 + Duration::minutes(4);
        for now in [t0(), t1, t2] {
            let report = app.pipeline.deliver_due(now).await.unwrap();
            assert_eq!(report.failed_attempts, 1, "attempt at {now}");
        }

        let entry = &app.entries().await[0];
        assert_eq!(entry.status, DeliveryStatus::Error);
        assert_eq!(entry.attempts, 3);
        assert_eq!(entry.next_retry_at, Some(t2 + Duration::minutes(8)));
        assert_eq!(entry.last_http_status, Some(503));
        assert!(
            entry
                .last_error
                .as_deref()
                .is_some_and(|e| e.starts_with("DELIVERY_REJECTED")),
            "{:?}",
            entry.last_error
        );
        assert_eq!(app.receiver.received().len(), 3);
    }

    #[tokio::test]
    async fn entry_is_not_retried_before_its_time() {
        let app = TestApp::spawn(vec![]).await;
        ingest_one(&app, "ext-1", "PO-1").await;
        app.receiver.respond_with(&[500]);

        app.pipeline.deliver_due(t0()).await.unwrap();
        let report = app
            .pipeline
            .deliver_due(t0() + Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(report, CycleReport::default());
        assert_eq!(app.receiver.received().len(), 1);
    }

    #[tokio::test]
    async fn success_after_failures_keeps_attempt_count() {
        let app = TestApp::spawn(vec![]).await;
        ingest_one(&app, "ext-1", "PO-1").await;
        app.receiver.respond_with(&[503, 503, 503]);

        let mut now = t0();
        for minutes in [2, 4, 8] {
            app.pipeline.deliver_due(now).await.unwrap();
            now += Duration::minutes(minutes);
        }
        let report = app.pipeline.deliver_due(now).await.unwrap();
        assert_eq!(report.sent, 1);

        let entry = &app.entries().await[0];
        assert_eq!(entry.status, DeliveryStatus::Sent);
        assert_eq!(entry.attempts, 3);
        assert_eq!(entry.sent_at, Some(now));
        assert_eq!(entry.last_http_status, Some(200));
        assert!(entry.last_error.is_none());
        assert!(entry.next_retry_at.is_none());

        // Sent entries are never picked up again.
        let later = app
            .pipeline
            .deliver_due(now + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(later.sent, 0);
        assert_eq!(app.receiver.received().len(), 4);
    }

    #[tokio::test]
    async fn exhausted_entry_fails_and_notifies() {
        let app = TestApp::with_source(StaticSource::default(), RetryPolicy::new(2, 60)).await;
        ingest_one(&app, "ext-1", "PO-9").await;
        app.receiver.respond_with(&[500, 500, 500]);

        app.pipeline.deliver_due(t0()).await.unwrap();
        let outcome = app
            .pipeline
            .deliver_due(t0() + Duration::minutes(2))
            .await
            .unwrap();
        assert_eq!(outcome.failed_attempts, 1);

        let entry = &app.entries().await[0];
        assert_eq!(entry.status, DeliveryStatus::Failed);
        assert_eq!(entry.attempts, 2);
        assert!(entry.next_retry_at.is_none());

        let report = app
            .pipeline
            .deliver_due(t0() + Duration::days(30))
            .await
            .unwrap();
        assert_eq!(report.failed_attempts + report.sent + report.skipped, 0);
        assert_eq!(app.receiver.received().len(), 2);

        app.notifier.wait_for(2, 1).await;
        let failures = app.notifier.failures.lock().unwrap().clone();
        assert_eq!(failures, vec![(DocType::Order, "PO-9".to_string(), 2)]);
        assert!(
            app.audit_actions()
                .await
                .contains(&"TERMINAL_DELIVERY_FAILURE".to_string())
        );
    }
}

mod rendering {
    use super::*;

    #[tokio::test]
    async fn default_encoder_is_used_without_template() {
        let app = TestApp::spawn(vec![]).await;
        ingest_one(&app, "ext-1", "PO-1").await;

        app.pipeline.deliver_due(t0()).await.unwrap();

        let received = app.receiver.received();
        assert_eq!(received.len(), 1);
        assert!(received[0].body.contains("<DocumentId>PO-1</DocumentId>"));
        assert_eq!(
            received[0].content_type.as_deref(),
            Some(codec::XML_CONTENT_TYPE)
        );
        assert_eq!(received[0].doc_type.as_deref(), Some("ORDER"));
    }

    #[tokio::test]
    async fn retry_reuses_cached_payload() {
        let app = TestApp::spawn(vec![]).await;
        let doc_id = ingest_one(&app, "ext-1", "PO-1").await;
        let templates = TemplateStore::new(&app.db);
        templates
            .upsert(DocType::Order, template("<v1>{{number}}</v1>", ""))
            .await
            .unwrap();
        app.receiver.respond_with(&[503]);

        app.pipeline.deliver_due(t0()).await.unwrap();
        templates
            .upsert(DocType::Order, template("<v2>{{number}}</v2>", ""))
            .await
            .unwrap();
        app.pipeline
            .deliver_due(t0() + Duration::minutes(2))
            .await
            .unwrap();

        let bodies: Vec<_> = app.receiver.received().into_iter().map(|r| r.body).collect();
        assert_eq!(bodies, vec!["<v1>PO-1</v1>", "<v1>PO-1</v1>"]);
        assert_eq!(
            app.document(doc_id).await.rendered_payload.as_deref(),
            Some("<v1>PO-1</v1>")
        );
    }

    #[tokio::test]
    async fn rerender_replaces_cache_without_touching_entry() {
        let app = TestApp::spawn(vec![]).await;
        let doc_id = ingest_one(&app, "ext-1", "PO-1").await;
        let templates = TemplateStore::new(&app.db);
        templates
            .upsert(DocType::Order, template("<v1>{{number}}</v1>", ""))
            .await
            .unwrap();
        app.receiver.respond_with(&[503]);
        app.pipeline.deliver_due(t0()).await.unwrap();
        let before = app.entries().await[0].clone();

        templates
            .upsert(
                DocType::Order,
                template("<v2>{{number}}{{positions}}</v2>", "<l>{{ean}}</l>"),
            )
            .await
            .unwrap();
        let rendered = app.pipeline.rerender(doc_id).await.unwrap();
        assert_eq!(rendered.body, "<v2>PO-1<l>4870000000011</l></v2>");

        assert_eq!(
            app.document(doc_id).await.rendered_payload.as_deref(),
            Some(rendered.body.as_str())
        );
        assert_eq!(app.entries().await[0], before);
    }

    #[tokio::test]
    async fn inactive_template_falls_back_to_default() {
        let app = TestApp::spawn(vec![]).await;
        ingest_one(&app, "ext-1", "PO-1").await;
        let templates = TemplateStore::new(&app.db);
        templates
            .upsert(DocType::Order, template("<custom/>", ""))
            .await
            .unwrap();
        assert!(templates.set_active(DocType::Order, false).await.unwrap());

        app.pipeline.deliver_due(t0()).await.unwrap();

        assert!(app.receiver.received()[0].body.starts_with("<?xml"));
    }

    #[tokio::test]
    async fn encoding_failure_is_a_delivery_failure() {
        let app = TestApp::spawn(vec![]).await;
        ingest_one(&app, "ext-1", "PO-1").await;
        TemplateStore::new(&app.db)
            .upsert(DocType::Order, template("", ""))
            .await
            .unwrap();

        let report = app.pipeline.deliver_due(t0()).await.unwrap();
        assert_eq!(report.failed_attempts, 1);

        let entry = &app.entries().await[0];
        assert_eq!(entry.status, DeliveryStatus::Error);
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.next_retry_at, Some(t0() + Duration::minutes(2)));
        assert!(
            entry
                .last_error
                .as_deref()
                .is_some_and(|e| e.starts_with("ENCODING_FAILURE"))
        );
        assert!(app.receiver.received().is_empty());

        app.notifier.wait_for(1, 0).await;
        assert!(app.notifier.failures.lock().unwrap().is_empty());
    }
}

mod manual {
    use super::*;

    #[tokio::test]
    async fn retry_now_delivers_failed_entry() {
        let app = TestApp::with_source(StaticSource::default(), RetryPolicy::new(1, 60)).await;
        ingest_one(&app, "ext-1", "PO-1").await;
        app.receiver.respond_with(&[500]);
        app.pipeline.deliver_due(t0()).await.unwrap();

        let entry_id = app.entries().await[0].id;
        assert_eq!(app.entry(entry_id).await.status, DeliveryStatus::Failed);

        let outcome = app.pipeline.retry_now(entry_id).await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Sent { http_status: 200 }));

        let entry = app.entry(entry_id).await;
        assert_eq!(entry.status, DeliveryStatus::Sent);
        assert_eq!(entry.attempts, 1);
        assert!(app.audit_actions().await.contains(&"REQUEUED".to_string()));
    }

    #[tokio::test]
    async fn retry_now_refuses_sent_entry() {
        let app = TestApp::spawn(vec![]).await;
        ingest_one(&app, "ext-1", "PO-1").await;
        app.pipeline.deliver_due(t0()).await.unwrap();
        let entry_id = app.entries().await[0].id;

        let err = app.pipeline.retry_now(entry_id).await.unwrap_err();
        assert!(matches!(err, GatewayError::AlreadySent(id) if id == entry_id));
        assert_eq!(app.receiver.received().len(), 1);
    }

    #[tokio::test]
    async fn retry_now_unknown_entry_is_not_found() {
        let app = TestApp::spawn(vec![]).await;
        let err = app.pipeline.retry_now(404).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn force_ingest_is_idempotent() {
        let app = TestApp::spawn(vec![order("ext-7", "PO-7")]).await;

        let first = app
            .pipeline
            .force_ingest(DocType::Order, "ext-7")
            .await
            .unwrap();
        let second = app
            .pipeline
            .force_ingest(DocType::Order, "ext-7")
            .await
            .unwrap();

        assert!(first.is_inserted());
        assert!(!second.is_inserted());
        assert_eq!(app.document_count().await, 1);
    }

    #[tokio::test]
    async fn entry_claimed_elsewhere_is_skipped() {
        let app = TestApp::spawn(vec![]).await;
        ingest_one(&app, "ext-1", "PO-1").await;
        let entry = app.entries().await.remove(0);

        // Another worker claims the entry first.
        let queue = DeliveryQueue::new(&app.db, RetryPolicy::default());
        assert!(queue.claim(entry.id, t0()).await.unwrap());
        assert!(!queue.claim(entry.id, t0()).await.unwrap());

        let outcome = app
            .pipeline
            .deliver_entry(entry.clone(), t0())
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Skipped);
        assert!(app.receiver.received().is_empty());
        assert_eq!(app.entry(entry.id).await.status, DeliveryStatus::Sending);
        assert_eq!(app.entry(entry.id).await.attempts, 0);
    }

    #[tokio::test]
    async fn retry_now_refuses_entry_in_flight() {
        let app = TestApp::spawn(vec![]).await;
        ingest_one(&app, "ext-1", "PO-1").await;
        let entry_id = app.entries().await[0].id;
        DeliveryQueue::new(&app.db, RetryPolicy::default())
            .claim(entry_id, t0())
            .await
            .unwrap();

        let err = app.pipeline.retry_now(entry_id).await.unwrap_err();
        assert!(matches!(err, GatewayError::InFlight(id) if id == entry_id));
        assert_eq!(app.entry(entry_id).await.status, DeliveryStatus::Sending);
        assert!(app.receiver.received().is_empty());
    }
}

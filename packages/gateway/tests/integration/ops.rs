use common::{DeliveryStatus, DocType};
use gateway::models::delivery::EntryResponse;
use gateway::models::document::{IngestResponse, RenderResponse};
use gateway::models::template::TemplateResponse;
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::common::{TestApp, order, routes};

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops.get(routes::HEALTH).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn openapi_document_lists_operator_routes() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops.get(routes::OPENAPI).await;
        assert_eq!(res.status(), StatusCode::OK);
        let api: Value = res.json().await.unwrap();
        let paths = api["paths"].as_object().expect("paths should be an object");
        assert!(paths.contains_key("/api/v1/entries/{id}/retry"));
        assert!(paths.contains_key("/api/v1/documents/ingest"));
        assert!(paths.contains_key("/api/v1/templates/{doc_type}"));
        assert!(api["components"]["schemas"]["ErrorBody"].is_object());
    }
}

mod templates {
    use super::*;

    #[tokio::test]
    async fn put_then_list() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops
            .put_json(
                &routes::template("ORDRSP"),
                &json!({ "name": "1C", "body_tpl": "<R>{{number}}</R>" }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let saved: TemplateResponse = res.json().await.unwrap();
        assert_eq!(saved.doc_type, DocType::OrderResponse);
        assert!(saved.is_active);
        assert_eq!(saved.content_type, codec::XML_CONTENT_TYPE);

        // Replacing keeps a single row per type.
        ops.put_json(
            &routes::template("ORDRSP"),
            &json!({ "name": "1C v2", "body_tpl": "<R2/>", "is_active": false }),
        )
        .await;

        let list: Vec<TemplateResponse> = ops.get(routes::TEMPLATES).await.json().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "1C v2");
        assert!(!list[0].is_active);
    }

    #[tokio::test]
    async fn unknown_doc_type_is_rejected() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops
            .put_json(
                &routes::template("RECADV"),
                &json!({ "name": "x", "body_tpl": "<x/>" }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn active_template_needs_a_body() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops
            .put_json(&routes::template("ORDER"), &json!({ "name": "x", "body_tpl": "  " }))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops
            .put_json(&routes::template("ORDER"), &json!({ "body_tpl": "<x/>" }))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn body_without_json_content_type_is_rejected() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops
            .post_raw(routes::TEMPLATE_PREVIEW, r#"{"doc_type":"ORDER"}"#, None)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().unwrap().contains("Content-Type"));
    }

    #[tokio::test]
    async fn invalid_json_syntax_is_rejected() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops
            .post_raw(routes::TEMPLATE_PREVIEW, "{not json", Some("application/json"))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().unwrap().starts_with("Request body is not valid JSON"));
    }

    #[tokio::test]
    async fn preview_renders_sample_data() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops
            .post_json(
                routes::TEMPLATE_PREVIEW,
                &json!({
                    "doc_type": "INVOICE",
                    "body_tpl": "<I s=\"{{supplier_name}}\">{{positions}}</I>",
                    "line_tpl": "<L n=\"{{line}}\"/>",
                }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let preview: RenderResponse = res.json().await.unwrap();
        assert!(preview.body.starts_with("<I s=\"ТОО &quot;Поставщик&quot;\">"));
        assert!(preview.body.contains("<L n=\"1\"/>\n<L n=\"2\"/>"));
    }

    #[tokio::test]
    async fn preview_without_body_uses_default_encoder() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let preview: RenderResponse = ops
            .post_json(routes::TEMPLATE_PREVIEW, &json!({ "doc_type": "DESADV" }))
            .await
            .json()
            .await
            .unwrap();
        assert!(preview.body.contains("<DocumentType>DESADV</DocumentType>"));
        assert_eq!(preview.content_type, codec::XML_CONTENT_TYPE);
    }
}

mod documents {
    use super::*;

    #[tokio::test]
    async fn ingest_then_render() {
        let app = TestApp::spawn(vec![order("ext-5", "PO-5")]).await;
        let ops = app.serve_ops().await;

        let res = ops
            .post_json(
                routes::INGEST,
                &json!({ "doc_type": "ORDER", "external_id": "ext-5" }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let ingested: IngestResponse = res.json().await.unwrap();
        assert!(ingested.inserted);

        let again = ops
            .post_json(
                routes::INGEST,
                &json!({ "doc_type": "ORDER", "external_id": "ext-5" }),
            )
            .await;
        assert_eq!(again.status(), StatusCode::OK);

        let rendered: RenderResponse = ops
            .post_empty(&routes::document_render(ingested.document_id))
            .await
            .json()
            .await
            .unwrap();
        assert!(rendered.body.contains("<DocumentId>PO-5</DocumentId>"));
    }

    #[tokio::test]
    async fn ingest_of_unknown_document_is_upstream_error() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops
            .post_json(
                routes::INGEST,
                &json!({ "doc_type": "ORDER", "external_id": "missing" }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "UPSTREAM_ERROR");
    }

    #[tokio::test]
    async fn render_of_unknown_document_is_not_found() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops.post_empty(&routes::document_render(77)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}

mod entries {
    use super::*;

    #[tokio::test]
    async fn retry_sent_entry_conflicts() {
        let app = TestApp::spawn(vec![order("ext-1", "PO-1")]).await;
        let ops = app.serve_ops().await;
        app.pipeline.force_ingest(DocType::Order, "ext-1").await.unwrap();
        app.pipeline.deliver_due(crate::common::t0()).await.unwrap();
        let entry_id = app.entries().await[0].id;

        let res = ops.post_empty(&routes::entry_retry(entry_id)).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn retry_pending_entry_delivers_it() {
        let app = TestApp::spawn(vec![order("ext-1", "PO-1")]).await;
        let ops = app.serve_ops().await;
        app.pipeline.force_ingest(DocType::Order, "ext-1").await.unwrap();
        let entry_id = app.entries().await[0].id;

        let res = ops.post_empty(&routes::entry_retry(entry_id)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let entry: EntryResponse = res.json().await.unwrap();
        assert_eq!(entry.status, DeliveryStatus::Sent);
        assert_eq!(app.receiver.received().len(), 1);
    }

    #[tokio::test]
    async fn retry_unknown_entry_is_not_found() {
        let app = TestApp::spawn(vec![]).await;
        let ops = app.serve_ops().await;

        let res = ops.post_empty(&routes::entry_retry(999)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
    }
}

use common::UploadStatus;
use folio_server::store::AssetStore;
use serde_json::json;

use crate::common::{NOTE, OTHER_NOTE, OTHER_USER, TestApp, USER, routes, token_for};

mod upload_url {
    use super::*;

    #[tokio::test]
    async fn returns_presigned_target() {
        let app = TestApp::spawn().await;
        let token = token_for(USER);

        let res = app.request_upload("lecture.pdf", 2048, &token).await;

        assert_eq!(res.status, 201);
        assert!(res.body["asset_id"].as_i64().is_some());
        let key = res.body["storage_key"].as_str().unwrap();
        assert!(key.starts_with(&format!("users/{USER}/notes/{NOTE}/assets/")));
        assert!(key.ends_with("_lecture.pdf"));
        let url = res.body["upload_url"].as_str().unwrap();
        assert!(url.starts_with(&format!("stub://put/{key}")));
        assert!(url.contains("content-type=application/pdf"));
        assert!(res.body["expires_at"].as_str().is_some());
    }

    #[tokio::test]
    async fn requires_token() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::UPLOAD_URL, &json!({}))
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");

        let res = app
            .post_with_token(routes::UPLOAD_URL, &json!({}), "not-a-jwt")
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn rejects_invalid_requests() {
        let app = TestApp::spawn().await;
        let token = token_for(USER);

        let res = app
            .post_with_token(
                routes::UPLOAD_URL,
                &json!({
                    "note_id": NOTE,
                    "file_name": "clip.gif",
                    "mime_type": "image/gif",
                    "file_size": 10,
                }),
                &token,
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let res = app.request_upload("../escape.pdf", 10, &token).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let res = app.request_upload("huge.pdf", 10_001, &token).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        // 255 characters that do not fit in a storage key once encoded.
        let wide = format!("{}.pdf", "😀".repeat(251));
        let res = app.request_upload(&wide, 10, &token).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let res = app
            .post_with_token(routes::UPLOAD_URL, &json!({ "note_id": NOTE }), &token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn presign_failure_leaves_no_intent() {
        let app = TestApp::spawn().await;
        let token = token_for(USER);
        app.harness.blobs.fail_presigns();

        let res = app.request_upload("lecture.pdf", 2048, &token).await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["code"], "INTERNAL_ERROR");
        let used = app
            .harness
            .memory
            .declared_usage(NOTE, &[UploadStatus::Pending, UploadStatus::Uploaded])
            .await
            .unwrap();
        assert_eq!(used, 0);
    }

    #[tokio::test]
    async fn checks_note_ownership() {
        let app = TestApp::spawn().await;
        let token = token_for(USER);

        let res = app
            .post_with_token(
                routes::UPLOAD_URL,
                &json!({
                    "note_id": OTHER_NOTE,
                    "file_name": "scan.pdf",
                    "mime_type": "application/pdf",
                    "file_size": 10,
                }),
                &token,
            )
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");

        let res = app
            .post_with_token(
                routes::UPLOAD_URL,
                &json!({
                    "note_id": 999,
                    "file_name": "scan.pdf",
                    "mime_type": "application/pdf",
                    "file_size": 10,
                }),
                &token,
            )
            .await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn enforces_note_quota() {
        let app = TestApp::spawn().await;
        let token = token_for(USER);

        assert_eq!(app.request_upload("a.pdf", 9_000, &token).await.status, 201);
        assert_eq!(app.request_upload("b.pdf", 6_000, &token).await.status, 201);

        let res = app.request_upload("c.pdf", 1, &token).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "QUOTA_EXCEEDED");
    }
}

mod confirm {
    use super::*;

    #[tokio::test]
    async fn confirm_flow() {
        let app = TestApp::spawn().await;
        let token = token_for(USER);

        let created = app.request_upload("scan.pdf", 100, &token).await;
        let id = created.body["asset_id"].as_i64().unwrap();
        let key = created.body["storage_key"].as_str().unwrap().to_string();

        let res = app
            .post_with_token(&routes::confirm(id), &json!({}), &token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "BLOB_NOT_UPLOADED");

        app.harness.blobs.upload(&key).await;

        let res = app
            .post_with_token(&routes::confirm(id), &json!({}), &token)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["asset_id"], id);
        assert_eq!(res.body["upload_status"], "UPLOADED");
        assert_eq!(res.body["extraction_status"], "processing");

        let res = app
            .post_with_token(&routes::confirm(id), &json!({}), &token)
            .await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "ALREADY_CONFIRMED");
    }

    #[tokio::test]
    async fn other_user_cannot_confirm() {
        let app = TestApp::spawn().await;
        let token = token_for(USER);

        let created = app.request_upload("scan.pdf", 100, &token).await;
        let id = created.body["asset_id"].as_i64().unwrap();

        let res = app
            .post_with_token(&routes::confirm(id), &json!({}), &token_for(OTHER_USER))
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");

        let res = app
            .post_with_token(&routes::confirm(12345), &json!({}), &token)
            .await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod detail {
    use super::*;

    #[tokio::test]
    async fn shows_extraction_result() {
        let app = TestApp::spawn().await;
        let token = token_for(USER);

        let created = app.request_upload("scan.pdf", 100, &token).await;
        let id = created.body["asset_id"].as_i64().unwrap();

        let res = app.get_with_token(&routes::asset(id), &token).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["upload_status"], "PENDING");
        assert!(res.body["extraction_status"].is_null());
        assert_eq!(res.body["file_name"], "scan.pdf");
        assert_eq!(res.body["origin"], "upload");

        app.harness
            .blobs
            .upload(created.body["storage_key"].as_str().unwrap())
            .await;
        app.harness.lifecycle.confirm_upload(id, USER).await.unwrap();
        app.harness
            .lifecycle
            .complete_extraction(id, "X".into(), Some(3))
            .await
            .unwrap();

        let res = app.get_with_token(&routes::asset(id), &token).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["extraction_status"], "completed");
        assert_eq!(res.body["extracted_content"], "X");
        assert_eq!(res.body["page_count"], 3);

        let res = app
            .get_with_token(&routes::asset(id), &token_for(OTHER_USER))
            .await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn download_url_needs_confirmed_upload() {
        let app = TestApp::spawn().await;
        let token = token_for(USER);

        let created = app.request_upload("scan.pdf", 100, &token).await;
        let id = created.body["asset_id"].as_i64().unwrap();

        let res = app.get_with_token(&routes::download_url(id), &token).await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "NOT_UPLOADED");

        app.harness
            .blobs
            .upload(created.body["storage_key"].as_str().unwrap())
            .await;
        app.harness.lifecycle.confirm_upload(id, USER).await.unwrap();

        let res = app.get_with_token(&routes::download_url(id), &token).await;
        assert_eq!(res.status, 200);
        let url = res.body["download_url"].as_str().unwrap();
        assert!(url.starts_with("stub://get/"));
        assert!(url.contains("name=scan.pdf"));
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn delete_then_not_found() {
        let app = TestApp::spawn().await;
        let token = token_for(USER);

        let created = app.request_upload("scan.pdf", 100, &token).await;
        let id = created.body["asset_id"].as_i64().unwrap();

        let res = app
            .delete_with_token(&routes::asset(id), &token_for(OTHER_USER))
            .await;
        assert_eq!(res.status, 403);

        let res = app.delete_with_token(&routes::asset(id), &token).await;
        assert_eq!(res.status, 204);

        let res = app.get_with_token(&routes::asset(id), &token).await;
        assert_eq!(res.status, 404);

        let res = app.delete_with_token(&routes::asset(id), &token).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn deleted_asset_frees_quota() {
        let app = TestApp::spawn().await;
        let token = token_for(USER);

        let created = app.request_upload("big.pdf", 10_000, &token).await;
        let id = created.body["asset_id"].as_i64().unwrap();
        assert_eq!(app.request_upload("more.pdf", 6_000, &token).await.status, 400);

        app.delete_with_token(&routes::asset(id), &token).await;
        assert_eq!(app.request_upload("more.pdf", 6_000, &token).await.status, 201);
    }
}

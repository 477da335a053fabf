//! In-process tests for the admin router against the mock CMS.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};

use threadline_integration_tests::{
    MEDIA_DOMAIN, MockCms, admin_app, admin_request, empty, send, with_form, with_json,
};

fn rpc_get(name: &str) -> Request<Body> {
    empty(admin_request(Method::GET, &format!("/rpc/{name}")))
}

fn rpc_post(name: &str, input: &Value) -> Request<Body> {
    with_json(admin_request(Method::POST, &format!("/rpc/{name}")), input)
}

async fn seeded_cms() -> MockCms {
    let cms = MockCms::start().await;
    cms.insert(json!({
        "_id": "cat-shirts",
        "_type": "category",
        "name": "Shirts",
        "slug": { "current": "shirts" }
    }));
    cms.insert(json!({
        "_id": "sub-oxford",
        "_type": "subcategory",
        "name": "Oxford",
        "slug": { "current": "oxford" },
        "category": { "_type": "reference", "_ref": "cat-shirts" }
    }));
    cms.insert(json!({
        "_id": "color-sand",
        "_type": "color",
        "name": "Sand",
        "hex": "#d8c9a7"
    }));
    cms.insert(json!({
        "_id": "color-slate",
        "_type": "color",
        "name": "Slate",
        "hex": "#5a6470"
    }));
    cms.insert(json!({
        "_id": "size-m",
        "_type": "size",
        "name": "M",
        "sortOrder": 2
    }));
    cms.insert(json!({
        "_id": "prod-oxford",
        "_type": "product",
        "name": "Oxford Shirt",
        "slug": { "current": "oxford-shirt" },
        "category": { "_type": "reference", "_ref": "cat-shirts" },
        "subcategory": { "_type": "reference", "_ref": "sub-oxford" },
        "variants": [{
            "_key": "v1",
            "name": "Sand / M",
            "color": { "_type": "reference", "_ref": "color-sand" },
            "sizes": [{ "_key": "s1", "_type": "reference", "_ref": "size-m" }],
            "price": "49.00"
        }]
    }));
    cms
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_health_needs_no_token() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(&app, empty(Request::builder().uri("/health"))).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(&app, empty(Request::builder().uri("/rpc/category.list"))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.header("www-authenticate"), Some("Bearer"));
    assert_eq!(response.json()["error"], "Unauthorized");
}

#[tokio::test]
async fn test_wrong_token_is_unauthorized() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let request = empty(
        Request::builder()
            .uri("/rpc/category.list")
            .header(header::AUTHORIZATION, "Bearer tl_admin_wrong"),
    );
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(cms.graphql_requests(), 0);
}

// =============================================================================
// RPC dispatch
// =============================================================================

#[tokio::test]
async fn test_list_query_returns_result_envelope() {
    let cms = seeded_cms().await;
    let app = admin_app(&cms);

    let response = send(&app, rpc_get("color.list")).await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    let colors = body["result"]["data"].as_array().expect("color list");
    assert_eq!(colors.len(), 2);
    assert!(colors.iter().any(|c| c["name"] == "Sand"));
}

#[tokio::test]
async fn test_query_input_from_query_string() {
    let cms = seeded_cms().await;
    let app = admin_app(&cms);

    let input = "%7B%22categoryId%22%3A%22cat-shirts%22%7D";
    let request = empty(admin_request(
        Method::GET,
        &format!("/rpc/subcategory.list?input={input}"),
    ));
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    let items = body["result"]["data"].as_array().expect("subcategories");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Oxford");
}

#[tokio::test]
async fn test_query_called_with_post_is_rejected() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(&app, rpc_post("color.list", &json!({}))).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.json()["error"]["code"], "METHOD_NOT_SUPPORTED");
}

#[tokio::test]
async fn test_mutation_called_with_get_is_rejected() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(&app, rpc_get("color.create")).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.json()["error"]["code"], "METHOD_NOT_SUPPORTED");
    assert!(cms.documents("color").is_empty());
}

#[tokio::test]
async fn test_other_methods_are_rejected() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(&app, empty(admin_request(Method::PUT, "/rpc/color.list"))).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.json()["error"]["code"], "METHOD_NOT_SUPPORTED");
}

#[tokio::test]
async fn test_unknown_procedure_is_not_found() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(&app, rpc_get("widget.list")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_input_is_parse_error() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let request = empty(admin_request(Method::GET, "/rpc/color.byId?input=%7Bid"));
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"]["code"], "PARSE_ERROR");
}

#[tokio::test]
async fn test_wrong_input_shape_is_bad_request() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(&app, rpc_post("color.create", &json!({ "name": "Sand" }))).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"]["code"], "BAD_REQUEST");
}

// =============================================================================
// Catalog procedures
// =============================================================================

#[tokio::test]
async fn test_create_color_validates_hex() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(
        &app,
        rpc_post("color.create", &json!({ "name": "Sand", "hex": "sandy" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let body = response.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["fieldErrors"]["hex"].is_array());
    assert!(cms.documents("color").is_empty());
}

#[tokio::test]
async fn test_create_color_stores_document() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(
        &app,
        rpc_post("color.create", &json!({ "name": "Moss", "hex": "#4A5D23" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let created = &response.json()["result"]["data"];
    assert_eq!(created["name"], "Moss");
    assert!(created["_id"].is_string());

    let stored = cms.documents("color");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["name"], "Moss");
}

#[tokio::test]
async fn test_create_category_derives_slug() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(
        &app,
        rpc_post("category.create", &json!({ "name": "Summer Shirts" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json()["result"]["data"]["slug"]["current"],
        "summer-shirts"
    );
}

#[tokio::test]
async fn test_duplicate_category_slug_is_rejected() {
    let cms = seeded_cms().await;
    let app = admin_app(&cms);

    let response = send(&app, rpc_post("category.create", &json!({ "name": "Shirts" }))).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["error"]["fieldErrors"]["slug"].is_array());
    assert_eq!(cms.documents("category").len(), 1);
}

#[tokio::test]
async fn test_subcategory_needs_existing_category() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(
        &app,
        rpc_post(
            "subcategory.create",
            &json!({ "name": "Linen", "categoryId": "cat-missing" }),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["error"]["fieldErrors"]["categoryId"].is_array());
}

#[tokio::test]
async fn test_unknown_document_is_not_found() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let request = empty(admin_request(
        Method::GET,
        "/rpc/category.byId?input=%7B%22id%22%3A%22cat-missing%22%7D",
    ));
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_category_with_subcategories_cannot_be_deleted() {
    let cms = seeded_cms().await;
    let app = admin_app(&cms);

    let response = send(&app, rpc_post("category.delete", &json!({ "id": "cat-shirts" }))).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.json()["error"]["code"], "CONFLICT");
    assert_eq!(cms.documents("category").len(), 1);
}

#[tokio::test]
async fn test_unused_color_can_be_deleted() {
    let cms = seeded_cms().await;
    let app = admin_app(&cms);

    let response = send(&app, rpc_post("color.delete", &json!({ "id": "color-slate" }))).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["result"]["data"]["id"], "color-slate");
    assert_eq!(cms.documents("color").len(), 1);
}

#[tokio::test]
async fn test_update_color_patches_document() {
    let cms = seeded_cms().await;
    let app = admin_app(&cms);

    let response = send(
        &app,
        rpc_post(
            "color.update",
            &json!({ "id": "color-slate", "name": "Storm", "hex": "#5A6470" }),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let stored = cms
        .documents("color")
        .into_iter()
        .find(|c| c["_id"] == "color-slate")
        .expect("color kept");
    assert_eq!(stored["name"], "Storm");
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_invalid_order_status_is_bad_request() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(
        &app,
        rpc_post("order.updateStatus", &json!({ "id": 1, "status": "teleported" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_database_failure_hides_details() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(&app, rpc_get("order.list")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    let body = response.json();
    assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body["error"]["message"], "Internal server error");
}

// =============================================================================
// Form actions
// =============================================================================

#[tokio::test]
async fn test_form_create_returns_action_state() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let request = with_form(
        admin_request(Method::POST, "/actions/colors"),
        &[("name", "Moss"), ("hex", "#4A5D23")],
    );
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::CREATED);

    let body = response.json();
    assert_eq!(body["ok"], true);
    assert!(body["id"].is_string());
    assert_eq!(cms.documents("color")[0]["hex"], "#4a5d23");
}

#[tokio::test]
async fn test_form_create_reports_field_errors() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let request = with_form(
        admin_request(Method::POST, "/actions/colors"),
        &[("name", ""), ("hex", "green")],
    );
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let body = response.json();
    assert_eq!(body["ok"], false);
    assert!(body["fieldErrors"]["name"].is_array());
    assert!(body["fieldErrors"]["hex"].is_array());
}

#[tokio::test]
async fn test_form_unknown_resource_is_not_found() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let request = with_form(
        admin_request(Method::POST, "/actions/widgets"),
        &[("name", "Gadget")],
    );
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_form_delete_of_used_option_conflicts() {
    let cms = seeded_cms().await;
    let app = admin_app(&cms);

    for uri in ["/actions/colors/color-sand/delete", "/actions/sizes/size-m/delete"] {
        let response = send(&app, with_form(admin_request(Method::POST, uri), &[])).await;
        assert_eq!(response.status, StatusCode::CONFLICT, "{uri}");
        assert_eq!(response.json()["ok"], false);
    }
    assert_eq!(cms.documents("color").len(), 2);
    assert_eq!(cms.documents("size").len(), 1);
}

// =============================================================================
// Media
// =============================================================================

const BOUNDARY: &str = "threadline-test-boundary";

fn multipart(content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"swatch\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    admin_request(Method::POST, "/api/media")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request builds")
}

#[tokio::test]
async fn test_upload_serves_from_media_domain() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    let response = send(&app, multipart("image/png", &png)).await;
    assert_eq!(response.status, StatusCode::CREATED);

    let body = response.json();
    let url = body["url"].as_str().expect("url");
    assert!(url.starts_with(&format!("https://{MEDIA_DOMAIN}/")), "{url}");
    assert_eq!(body["size"], png.len());
}

#[tokio::test]
async fn test_upload_rejects_non_images() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let response = send(&app, multipart("text/plain", b"hello")).await;
    assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(response.json()["error"].is_string());
}

#[tokio::test]
async fn test_upload_without_file_field_is_bad_request() {
    let cms = MockCms::start().await;
    let app = admin_app(&cms);

    let body = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--{BOUNDARY}--\r\n");
    let request = admin_request(Method::POST, "/api/media")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request builds");
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

//! Wiremock integration tests for HttpTransport and the HTTP-backed client.

use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hermod::{Domain, Filters, Hermod, HermodError, HttpTransport, RetryPolicy, Transport};

fn api(server: &MockServer) -> String {
    format!("{}/api", server.uri())
}

fn invoice(paid: u64) -> Value {
    json!({
        "_id": "42",
        "invoiceNo": "INV-0042",
        "customer": { "id": "c7", "name": "Gulf Star" },
        "total": 9000,
        "received": paid,
        "balance": 9000 - paid,
        "status": "partial"
    })
}

#[tokio::test]
async fn get_sends_token_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/invoices"))
        .and(query_param("page", "2"))
        .and(query_param("status", "pending"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [invoice(0)],
            "pagination": { "page": 2, "limit": 20, "total": 21, "pages": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let hermod = Hermod::builder()
        .base_url(api(&server))
        .bearer_token("secret")
        .build()
        .unwrap();
    let page = hermod
        .invoices()
        .list(&Filters::new().page(2).status("pending").search(""))
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].customer_name, "Gulf Star");
    assert_eq!(page.pagination.unwrap().page, 2);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/manpower-services"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let hermod = Hermod::builder()
        .base_url(api(&server))
        .retry(
            Domain::ManpowerServices,
            RetryPolicy::new()
                .max_retries(2)
                .initial_delay(Duration::from_millis(10)),
        )
        .build()
        .unwrap();
    let err = hermod
        .manpower_services()
        .list(&Filters::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        HermodError::HttpServer {
            status: 503,
            message: "Service Unavailable".into()
        }
    );
}

#[tokio::test]
async fn client_errors_are_not_retried_and_keep_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/invoices/bad"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "message": "Invalid invoice ID"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let hermod = Hermod::builder().base_url(api(&server)).build().unwrap();
    let err = hermod.invoices().detail("bad").await.unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(err.response_message(), Some("Invalid invoice ID"));
}

#[tokio::test]
async fn unsuccessful_envelope_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/customer-types"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Session expired"
        })))
        .mount(&server)
        .await;

    let hermod = Hermod::builder().base_url(api(&server)).build().unwrap();
    let err = hermod
        .customer_types()
        .list(&Filters::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        HermodError::Envelope {
            message: "Session expired".into()
        }
    );
}

#[tokio::test]
async fn update_patches_pruned_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/invoices/42"))
        .and(body_json(json!({ "paid": 5000 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Invoice updated",
            "data": invoice(5000)
        })))
        .expect(1)
        .mount(&server)
        .await;

    let hermod = Hermod::builder().base_url(api(&server)).build().unwrap();
    let updated = hermod
        .invoices()
        .update("42", json!({ "paid": 5000, "notes": null, "status": "" }))
        .await
        .unwrap();

    assert_eq!(updated.paid, 5000.0);
    assert_eq!(updated.due, 4000.0);
}

#[tokio::test]
async fn delete_can_carry_a_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/customer-types/ct1"))
        .and(body_json(json!({ "value": "agent" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let hermod = Hermod::builder().base_url(api(&server)).build().unwrap();
    hermod
        .customer_types()
        .delete_with("ct1", json!({ "value": "agent" }))
        .await
        .unwrap();
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/invoices"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "data": [] }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let transport = HttpTransport::with_timeout(api(&server), Duration::from_millis(50)).unwrap();
    let err = transport.get("/invoices").await.unwrap_err();

    assert_eq!(err, HermodError::Timeout);
    assert!(err.is_transient());
}

#[tokio::test]
async fn empty_success_body_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/invoices/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(api(&server)).unwrap();
    let body = transport.delete("/invoices/1", None).await.unwrap();

    assert_eq!(body, Value::Null);
}

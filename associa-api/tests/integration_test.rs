/// Integration tests for the Associa API
///
/// The full router runs against the in-memory stores:
/// - registration, login and the session cookie
/// - access gate redirects for member and admin views
/// - standing derived from payments, signed processor notifications
/// - credentials and their public validation
/// - certificates, event registration and attendance

mod common;

use associa_api::payments::webhook::{sign, SIGNATURE_HEADER};
use associa_shared::models::{
    member::MemberRole,
    payment::PaymentPlan,
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::{DateTime, Duration, Months, Utc};
use common::{TestContext, PASSWORD, WEBHOOK_SECRET};
use serde_json::json;
use uuid::Uuid;

fn signed_webhook(body: &serde_json::Value, timestamp: i64, secret: &str) -> Request<Body> {
    let payload = body.to_string();
    let signature = sign(secret, timestamp, payload.as_bytes()).unwrap();

    Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(payload))
        .unwrap()
}

#[tokio::test]
async fn test_new_member_is_sent_to_payment() {
    let ctx = TestContext::new();
    let (_, token) = ctx.register("nova@associa.test").await;

    let response = ctx.get("/dashboard", Some(&token)).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/payment-required"));

    let page = ctx.get("/payment-required", Some(&token)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body["subscription"]["status"], "inadimplente");
    assert_eq!(page.body["actions"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_annual_payment_standing() {
    let ctx = TestContext::new();
    let now = Utc::now();
    let member = ctx.seed_member(MemberRole::Member, now - Duration::days(3)).await;
    let paid = ctx.seed_paid(member.id, PaymentPlan::Annual, now).await;
    let token = ctx.token_for(member.id);

    let response = ctx
        .get(&format!("/api/payments/status/{}", member.id), Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text);
    assert_eq!(response.body["status"], "adimplente");

    let expiry: DateTime<Utc> = serde_json::from_value(response.body["expiryDate"].clone()).unwrap();
    assert_eq!(expiry, paid.payment_date.unwrap() + Duration::days(365));

    let dashboard = ctx.get("/dashboard", Some(&token)).await;
    assert_eq!(dashboard.status, StatusCode::OK);
    assert_eq!(dashboard.body["authorized"], true);
    assert_eq!(dashboard.body["view"], "/dashboard");
}

#[tokio::test]
async fn test_validate_unknown_credential() {
    let ctx = TestContext::new();

    let response = ctx.get("/api/validate/UNKNOWN123", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["isValid"], false);
    assert!(response.body.get("member").is_none());
}

#[tokio::test]
async fn test_admin_and_member_views() {
    let ctx = TestContext::new();
    let (_, admin_token) = ctx.admin().await;
    let (_, member_token) = ctx.paid_member().await;

    // Admins skip the payment check on member views
    let response = ctx.get("/credential", Some(&admin_token)).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = ctx.get("/admin/payments", Some(&admin_token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["view"], "/admin/payments");

    let response = ctx.get("/admin", Some(&member_token)).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/dashboard"));
}

#[tokio::test]
async fn test_views_without_session() {
    let ctx = TestContext::new();

    let response = ctx.get("/ebooks", None).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/login"));

    let response = ctx.get("/ebooks", Some("not-a-token")).await;
    assert_eq!(response.location(), Some("/login"));

    let response = ctx.get("/api/user", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_decision() {
    let ctx = TestContext::new();
    let (_, token) = ctx.register("decisao@associa.test").await;

    let response = ctx.get("/api/access/events", Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["decision"], "paymentRequired");
    assert_eq!(response.body["standing"], "inadimplente");

    let response = ctx.get("/api/access/admin/members", Some(&token)).await;
    assert_eq!(response.body["decision"], "redirect");
    assert_eq!(response.body["location"], "/dashboard");

    let response = ctx.get("/api/access/nowhere", Some(&token)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_conflicts_and_validation() {
    let ctx = TestContext::new();
    ctx.register("repetido@associa.test").await;

    let duplicate = ctx
        .post(
            "/api/register",
            json!({
                "name": "Outra Pessoa",
                "email": "Repetido@Associa.test",
                "password": PASSWORD,
                "cpf": common::next_cpf(),
            }),
            None,
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.body["message"], "E-mail já cadastrado");

    let bad_cpf = ctx
        .post(
            "/api/register",
            json!({
                "name": "Outra Pessoa",
                "email": "cpf@associa.test",
                "password": PASSWORD,
                "cpf": "111.111.111-11",
            }),
            None,
        )
        .await;
    assert_eq!(bad_cpf.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_and_logout() {
    let ctx = TestContext::new();
    let (id, _) = ctx.register("login@associa.test").await;

    let wrong = ctx
        .post(
            "/api/login",
            json!({ "email": "login@associa.test", "password": "senhaErrada1" }),
            None,
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let ok = ctx
        .post(
            "/api/login",
            json!({ "email": "login@associa.test", "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["id"], id.to_string());
    assert!(ok.body.get("password_hash").is_none());

    let token = ok.session_token().unwrap();
    let me = ctx.get("/api/user", Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "login@associa.test");

    let logout = ctx.request(Method::POST, "/api/logout", None, None).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);
    assert!(logout.set_cookie().unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn test_signed_webhook_issues_credential() {
    let ctx = TestContext::new();
    let (id, token) = ctx.register("webhook@associa.test").await;
    let now = Utc::now();

    let notification = json!({
        "id": "pay_001",
        "memberId": id,
        "plan": "monthly",
        "status": "paid",
        "amountCents": 4990,
        "method": "pix",
        "paidAt": now,
    });

    let response = ctx
        .send(signed_webhook(&notification, now.timestamp(), WEBHOOK_SECRET))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text);
    let payment_id = response.body["id"].clone();

    // Redelivery maps onto the same row
    let again = ctx
        .send(signed_webhook(&notification, now.timestamp(), WEBHOOK_SECRET))
        .await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.body["id"], payment_id);

    let ledger = ctx.get("/api/payments", Some(&token)).await;
    assert_eq!(ledger.body.as_array().map(Vec::len), Some(1));

    let dashboard = ctx.get("/dashboard", Some(&token)).await;
    assert_eq!(dashboard.status, StatusCode::OK);

    let credential = ctx.get("/api/credentials/me", Some(&token)).await;
    assert_eq!(credential.status, StatusCode::OK, "{}", credential.text);
    let number = credential.body["credential_number"].as_str().unwrap().to_string();

    let validation = ctx.get(&format!("/api/validate/{}", number), None).await;
    assert_eq!(validation.body["isValid"], true);
    assert!(validation.body.get("member").is_some());
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let ctx = TestContext::new();
    let (id, _) = ctx.register("forjado@associa.test").await;
    let now = Utc::now();

    let notification = json!({
        "id": "pay_forged",
        "memberId": id,
        "plan": "annual",
        "status": "paid",
        "amountCents": 49900,
    });

    let forged = ctx
        .send(signed_webhook(&notification, now.timestamp(), "wrong-secret"))
        .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

    let stale = ctx
        .send(signed_webhook(
            &notification,
            (now - Duration::minutes(10)).timestamp(),
            WEBHOOK_SECRET,
        ))
        .await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);

    let unsigned = ctx.post("/api/payments/webhook", notification, None).await;
    assert_eq!(unsigned.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_members_only_see_their_own_status() {
    let ctx = TestContext::new();
    let (other, _) = ctx.paid_member().await;
    let (_, token) = ctx.paid_member().await;

    let response = ctx
        .get(&format!("/api/payments/status/{}", other.id), Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = ctx.get("/api/users", Some(&token)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_certificate_requires_streak() {
    let ctx = TestContext::new();
    let (_, token) = ctx.paid_member().await;

    let response = ctx
        .post("/api/certificates", json!({ "type": "formacao_livre" }), Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = ctx
        .post("/api/certificates", json!({ "type": "evento" }), Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_certificate_after_twelve_months() {
    let ctx = TestContext::new();
    let now = Utc::now();
    let enrolled = now.checked_sub_months(Months::new(13)).unwrap();
    let member = ctx.seed_member(MemberRole::Member, enrolled).await;
    let mut paid_at = enrolled;
    while paid_at <= now {
        ctx.seed_paid(member.id, PaymentPlan::Monthly, paid_at).await;
        paid_at += Duration::days(29);
    }
    let token = ctx.token_for(member.id);

    let eligibility = ctx.get("/api/certificates/eligibility", Some(&token)).await;
    assert_eq!(eligibility.body["eligible"], true);
    assert_eq!(eligibility.body["progressPercent"], 100);

    let issued = ctx
        .post("/api/certificates", json!({ "type": "formacao_livre" }), Some(&token))
        .await;
    assert_eq!(issued.status, StatusCode::CREATED, "{}", issued.text);

    let again = ctx
        .post("/api/certificates", json!({ "type": "formacao_livre" }), Some(&token))
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(ctx.store.certificate_count(member.id).await, 1);

    let id = issued.body["id"].as_str().unwrap();
    let download = ctx
        .get(&format!("/api/certificates/{}/download", id), Some(&token))
        .await;
    assert_eq!(download.status, StatusCode::OK);
    assert!(download.headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(download.text.contains(&member.name));
}

#[tokio::test]
async fn test_admin_payment_transitions() {
    let ctx = TestContext::new();
    let (_, admin_token) = ctx.admin().await;
    let (member_id, member_token) = ctx.register("manual@associa.test").await;

    let created = ctx
        .post(
            "/api/payments",
            json!({
                "userId": member_id,
                "amountCents": 49900,
                "plan": "annual",
                "status": "paid",
                "method": "manual",
            }),
            Some(&admin_token),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.text);
    let payment_id = created.body["id"].as_str().unwrap().to_string();

    let status = ctx
        .get(&format!("/api/payments/status/{}", member_id), Some(&member_token))
        .await;
    assert_eq!(status.body["status"], "adimplente");

    let uri = format!("/api/payments/{}/status", payment_id);
    let refunded = ctx
        .request(Method::PUT, &uri, Some(json!({ "status": "refunded" })), Some(&admin_token))
        .await;
    assert_eq!(refunded.status, StatusCode::OK);

    let status = ctx
        .get(&format!("/api/payments/status/{}", member_id), Some(&member_token))
        .await;
    assert_eq!(status.body["status"], "inadimplente");

    let repaid = ctx
        .request(Method::PUT, &uri, Some(json!({ "status": "paid" })), Some(&admin_token))
        .await;
    assert_eq!(repaid.status, StatusCode::CONFLICT);

    let forbidden = ctx
        .request(Method::PUT, &uri, Some(json!({ "status": "paid" })), Some(&member_token))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cancel_membership() {
    let ctx = TestContext::new();
    let (member, token) = ctx.paid_member().await;

    let cancelled = ctx
        .post(&format!("/api/users/{}/cancel", member.id), json!({}), Some(&token))
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(cancelled.body["status"], "cancelado");

    let response = ctx.get("/dashboard", Some(&token)).await;
    assert_eq!(response.location(), Some("/payment-required"));
}

#[tokio::test]
async fn test_event_registration_and_certificate() {
    let ctx = TestContext::new();
    let (_, admin_token) = ctx.admin().await;
    let (member, token) = ctx.paid_member().await;
    let (_, late_token) = ctx.paid_member().await;
    let (_, unpaid_token) = ctx.register("semvaga@associa.test").await;
    let event = ctx.seed_event(Some(1)).await;
    let register_uri = format!("/api/events/{}/register", event.id);

    let unpaid = ctx.post(&register_uri, json!({}), Some(&unpaid_token)).await;
    assert_eq!(unpaid.status, StatusCode::FORBIDDEN);

    let registered = ctx.post(&register_uri, json!({}), Some(&token)).await;
    assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.text);

    let full = ctx.post(&register_uri, json!({}), Some(&late_token)).await;
    assert_eq!(full.status, StatusCode::CONFLICT);

    let detail = ctx.get(&format!("/api/events/{}", event.id), Some(&token)).await;
    assert_eq!(detail.body["registrations"], 1);

    let certificate_uri = format!("/api/events/{}/certificate", event.id);
    let early = ctx.post(&certificate_uri, json!({}), Some(&token)).await;
    assert_eq!(early.status, StatusCode::UNPROCESSABLE_ENTITY);

    let attendance = ctx
        .request(
            Method::PUT,
            &format!("/api/events/{}/attendance", event.id),
            Some(json!({ "userId": member.id, "attended": true })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(attendance.status, StatusCode::OK, "{}", attendance.text);

    let issued = ctx.post(&certificate_uri, json!({}), Some(&token)).await;
    assert_eq!(issued.status, StatusCode::CREATED, "{}", issued.text);
    assert_eq!(issued.body["certificate_type"], "evento");

    let again = ctx.post(&certificate_uri, json!({}), Some(&token)).await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_checkout_link() {
    let ctx = TestContext::new();
    let (member, token) = ctx.paid_member().await;

    let response = ctx
        .post(
            "/api/payments/update-method",
            json!({ "userId": member.id, "plan": "annual" }),
            Some(&token),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text);

    let link = response.body["paymentLink"].as_str().unwrap();
    assert!(link.starts_with(&ctx.config.payment.checkout_base_url));
    assert!(link.contains("plan=annual"));
    assert!(link.contains("amount=49900"));
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let ctx = TestContext::new();

    let response = ctx.get("/api/health", None).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["status"], "unhealthy");
    assert_eq!(response.body["database"], "disconnected");
}

#[tokio::test]
async fn test_security_headers_on_api() {
    let ctx = TestContext::new();

    let response = ctx.get("/api/validate/ABC", None).await;
    assert_eq!(response.headers["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn test_catalog_writes_are_admin_only() {
    let ctx = TestContext::new();
    let (_, token) = ctx.paid_member().await;
    let ebook_uri = format!("/api/ebooks/{}", Uuid::new_v4());
    let benefit_uri = format!("/api/benefits/{}", Uuid::new_v4());

    let created = ctx
        .post("/api/ebooks", json!({ "title": "O Mal-Estar na Cultura" }), Some(&token))
        .await;
    assert_eq!(created.status, StatusCode::FORBIDDEN, "{}", created.text);
    assert_eq!(created.body["error"], "forbidden");

    let updated = ctx
        .request(
            Method::PUT,
            &benefit_uri,
            Some(json!({ "partnerName": "Livraria Freud" })),
            Some(&token),
        )
        .await;
    assert_eq!(updated.status, StatusCode::FORBIDDEN, "{}", updated.text);

    let deleted = ctx.request(Method::DELETE, &ebook_uri, None, Some(&token)).await;
    assert_eq!(deleted.status, StatusCode::FORBIDDEN, "{}", deleted.text);

    let upload = Request::builder()
        .method(Method::PUT)
        .uri(format!("{}/file", ebook_uri))
        .header(header::COOKIE, format!("associa_session={}", token))
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Body::from("%PDF-1.7"))
        .unwrap();
    let uploaded = ctx.send(upload).await;
    assert_eq!(uploaded.status, StatusCode::FORBIDDEN, "{}", uploaded.text);
    assert!(ctx.artifacts.is_empty().await);
}

#[tokio::test]
async fn test_ebook_download_requires_paid_up() {
    let ctx = TestContext::new();
    let (_, token) = ctx.register("leitora@associa.test").await;

    let response = ctx
        .get(&format!("/api/ebooks/{}/download", Uuid::new_v4()), Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN, "{}", response.text);
    assert_eq!(response.body["error"], "forbidden");
}

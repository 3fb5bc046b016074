//! End-to-end executor behavior over a scripted transport.

mod common;

use common::{client, empty, json, raw, CountingRefresher, ScriptedTransport};
use resilient_client::error::InterceptorStage;
use resilient_client::interceptors::{FnErrorInterceptor, FnRequestInterceptor, FnResponseInterceptor};
use resilient_client::structured::JsonSchemaValidator;
use resilient_client::{
    ClassifiedError, Error, ErrorAction, ErrorKind, Hooks, Payload, RequestDescriptor, RequestOptions,
    ResponseOutcome, TokenPair, TokenState, TransportError,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn bearer(token: &str) -> Option<String> {
    Some(format!("Bearer {}", token))
}

#[tokio::test]
async fn test_get_widgets_returns_decoded_json() {
    let transport = ScriptedTransport::always(json(200, json!([{"id": "w1"}])));
    let client = client(transport.clone(), CountingRefresher::succeeding());

    let payload = client.get("/widgets", RequestOptions::new()).await.unwrap();

    assert_eq!(payload, Payload::Json(json!([{"id": "w1"}])));
    let sent = &transport.requests()[0];
    assert_eq!(sent.url, "https://api.test/widgets");
    assert_eq!(sent.header("authorization"), Some("Bearer T1"));
    assert!(sent.header("x-request-id").is_some());
}

#[tokio::test]
async fn test_get_widgets_404_is_not_found_with_data() {
    let transport = ScriptedTransport::always(json(404, json!({"reason": "no widgets"})));
    let refresher = CountingRefresher::succeeding();
    let client = client(transport.clone(), refresher.clone());

    let err = client.get("/widgets", RequestOptions::new()).await.unwrap_err();
    let classified = err.classified().expect("classified error");

    assert_eq!(classified.kind(), ErrorKind::NotFound);
    assert_eq!(classified.code(), "NOT_FOUND_ERROR");
    assert_eq!(classified.status(), Some(404));
    assert_eq!(classified.data(), Some(&json!({"reason": "no widgets"})));
    assert_eq!(transport.calls(), 1);
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_retried() {
    let transport = ScriptedTransport::new(|req, _| {
        Ok(match req.header("authorization") {
            Some("Bearer T2") => json(200, json!({"ok": true})),
            _ => empty(401),
        })
    });
    let refresher = CountingRefresher::succeeding();
    let client = client(transport.clone(), refresher.clone());

    let payload = client.get("/me", RequestOptions::new()).await.unwrap();

    assert_eq!(payload, Payload::Json(json!({"ok": true})));
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.calls(), 2);
    assert_eq!(transport.authorization(0), bearer("T1"));
    assert_eq!(transport.authorization(1), bearer("T2"));
    assert_eq!(client.tokens().current_access_token(), "T2");
}

#[tokio::test]
async fn test_request_id_is_kept_across_the_retry() {
    let transport = ScriptedTransport::sequence(vec![empty(401), json(200, json!({}))]);
    let client = client(transport.clone(), CountingRefresher::succeeding());

    client.get("/me", RequestOptions::new()).await.unwrap();

    let requests = transport.requests();
    let first = requests[0].header("x-request-id").unwrap();
    assert_eq!(Some(first), requests[1].header("x-request-id"));
}

#[tokio::test]
async fn test_second_401_is_not_retried_again() {
    let transport = ScriptedTransport::always(json(401, json!({"error": "token rejected"})));
    let refresher = CountingRefresher::succeeding();
    let client = client(transport.clone(), refresher.clone());

    let err = client.get("/me", RequestOptions::new()).await.unwrap_err();
    let classified = err.classified().unwrap();

    assert_eq!(classified.kind(), ErrorKind::Authentication);
    assert_eq!(classified.code(), "AUTHENTICATION_ERROR");
    assert!(!classified.is_refresh_failure());
    assert_eq!(transport.calls(), 2);
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let transport = ScriptedTransport::with_latency(Duration::from_millis(10), |req, _| {
        Ok(match req.header("authorization") {
            Some("Bearer T2") => json(200, json!({"ok": true})),
            _ => empty(401),
        })
    });
    let refresher = CountingRefresher::succeeding();
    let client = client(transport.clone(), refresher.clone());

    let (a, b) = tokio::join!(
        client.get("/a", RequestOptions::new()),
        client.get("/b", RequestOptions::new())
    );

    assert_eq!(a.unwrap(), Payload::Json(json!({"ok": true})));
    assert_eq!(b.unwrap(), Payload::Json(json!({"ok": true})));
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn test_failed_refresh_is_distinguishable_and_invalidates() {
    let transport = ScriptedTransport::always(json(401, json!({"error": "expired"})));
    let refresher = CountingRefresher::failing();
    let client = client(transport.clone(), refresher.clone());

    let err = client.get("/me", RequestOptions::new()).await.unwrap_err();
    let classified = err.classified().unwrap();

    assert_eq!(classified.kind(), ErrorKind::Authentication);
    assert_eq!(classified.status(), Some(401));
    assert!(classified.is_refresh_failure());
    assert!(classified.message().contains("refresh token revoked"));
    assert_eq!(transport.calls(), 1);
    assert_eq!(client.tokens().state(), TokenState::Invalidated);

    // Invalidated: no token is sent and the refresh endpoint is not called again.
    let err = client.get("/me", RequestOptions::new()).await.unwrap_err();
    assert!(err.classified().unwrap().is_refresh_failure());
    assert_eq!(transport.authorization(1), None);
    assert_eq!(refresher.calls(), 1);

    // Re-authentication brings the client back.
    client.tokens().set_credentials(TokenPair::new("LOGIN", "R-LOGIN"));
    let _ = client.get("/me", RequestOptions::new()).await;
    assert_eq!(transport.authorization(2), bearer("LOGIN"));
}

#[tokio::test]
async fn test_other_failures_are_never_retried() {
    for status in [403u16, 500, 503, 429] {
        let transport = ScriptedTransport::always(empty(status));
        let refresher = CountingRefresher::succeeding();
        let client = client(transport.clone(), refresher.clone());

        let err = client.get("/x", RequestOptions::new()).await.unwrap_err();
        assert_eq!(err.classified().unwrap().status(), Some(status));
        assert_eq!(transport.calls(), 1, "status {}", status);
        assert_eq!(refresher.calls(), 0);
    }
}

#[tokio::test]
async fn test_transport_failure_is_network_error() {
    let transport = ScriptedTransport::new(|_, _| Err(TransportError::Other("connection refused".into())));
    let client = client(transport.clone(), CountingRefresher::succeeding());

    let err = client.get("/x", RequestOptions::new()).await.unwrap_err();
    let classified = err.classified().unwrap();

    assert_eq!(classified.kind(), ErrorKind::Network);
    assert_eq!(classified.code(), "NETWORK_ERROR");
    assert_eq!(classified.status(), None);
    assert!(classified.cause().is_some());
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_skip_auth_sends_no_token_and_never_refreshes() {
    let transport = ScriptedTransport::always(empty(401));
    let refresher = CountingRefresher::succeeding();
    let client = client(transport.clone(), refresher.clone());

    let err = client
        .post("/login", &json!({"user": "u"}), RequestOptions::new().skip_auth(true))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Authentication));
    assert_eq!(transport.authorization(0), None);
    assert_eq!(transport.calls(), 1);
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn test_no_content_and_empty_body_are_not_errors() {
    let transport = ScriptedTransport::sequence(vec![empty(204), raw(200, "application/json", "")]);
    let client = client(transport, CountingRefresher::succeeding());

    assert_eq!(client.delete("/w/1", RequestOptions::new()).await.unwrap(), Payload::NoContent);
    assert_eq!(client.get("/w/1", RequestOptions::new()).await.unwrap(), Payload::NoContent);
}

#[tokio::test]
async fn test_garbage_json_on_200_is_decode_not_http() {
    let transport = ScriptedTransport::always(raw(200, "application/json", "{\"id\": "));
    let client = client(transport, CountingRefresher::succeeding());

    let err = client.get("/widgets", RequestOptions::new()).await.unwrap_err();
    let classified = err.classified().unwrap();
    assert_eq!(classified.kind(), ErrorKind::Decode);
    assert_eq!(classified.status(), None);
}

#[tokio::test]
async fn test_text_bodies_are_returned_raw() {
    let transport = ScriptedTransport::always(raw(200, "text/csv", "id\nw1\n"));
    let client = client(transport, CountingRefresher::succeeding());

    let payload = client.get("/export", RequestOptions::new()).await.unwrap();
    assert_eq!(payload.as_text(), Some("id\nw1\n"));
}

#[tokio::test]
async fn test_interceptors_run_in_registration_order_for_both_phases() {
    let transport = ScriptedTransport::always(json(200, json!({})));
    let client = client(transport.clone(), CountingRefresher::succeeding());
    let log = Arc::new(Mutex::new(Vec::new()));

    for name in ["A", "B", "C"] {
        let req_log = log.clone();
        client.add_request_interceptor(FnRequestInterceptor::new(move |req: RequestDescriptor| {
            req_log.lock().unwrap().push(format!("req:{}", name));
            Ok(req)
        }));
        let res_log = log.clone();
        client.add_response_interceptor(FnResponseInterceptor::new(move |res: ResponseOutcome| {
            res_log.lock().unwrap().push(format!("res:{}", name));
            Ok(res)
        }));
    }

    client.get("/x", RequestOptions::new()).await.unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["req:A", "req:B", "req:C", "res:A", "res:B", "res:C"]
    );
}

#[tokio::test]
async fn test_interceptors_run_once_per_attempt() {
    let transport = ScriptedTransport::sequence(vec![empty(401), json(200, json!({}))]);
    let client = client(transport, CountingRefresher::succeeding());
    let count = Arc::new(Mutex::new((0, 0)));

    let c = count.clone();
    client.add_request_interceptor(FnRequestInterceptor::new(move |req: RequestDescriptor| {
        c.lock().unwrap().0 += 1;
        Ok(req)
    }));
    let c = count.clone();
    client.add_response_interceptor(FnResponseInterceptor::new(move |res: ResponseOutcome| {
        c.lock().unwrap().1 += 1;
        Ok(res)
    }));

    client.get("/x", RequestOptions::new()).await.unwrap();
    assert_eq!(*count.lock().unwrap(), (2, 2));
}

#[tokio::test]
async fn test_token_is_injected_after_request_interceptors() {
    let transport = ScriptedTransport::always(json(200, json!({})));
    let client = client(transport.clone(), CountingRefresher::succeeding());
    client.add_request_interceptor(FnRequestInterceptor::new(|req: RequestDescriptor| {
        req.with_header("Authorization", "Bearer stale")
    }));

    client.get("/x", RequestOptions::new()).await.unwrap();
    assert_eq!(transport.authorization(0), bearer("T1"));
}

#[tokio::test]
async fn test_error_interceptor_replacement_reaches_caller() {
    let transport = ScriptedTransport::always(json(404, json!({})));
    let client = client(transport, CountingRefresher::succeeding());
    client.add_error_interceptor(FnErrorInterceptor::new(|err: Error| match err.kind() {
        Some(ErrorKind::NotFound) => ErrorAction::Propagate(
            ClassifiedError::new(ErrorKind::Forbidden, "widget is private").into(),
        ),
        _ => ErrorAction::Propagate(err),
    }));

    let err = client.get("/w/9", RequestOptions::new()).await.unwrap_err();
    let classified = err.classified().unwrap();
    assert_eq!(classified.kind(), ErrorKind::Forbidden);
    assert_eq!(classified.code(), "FORBIDDEN_ERROR");
    assert_eq!(classified.message(), "widget is private");
}

#[tokio::test]
async fn test_per_call_error_hook_can_suppress() {
    let transport = ScriptedTransport::always(empty(503));
    let client = client(transport, CountingRefresher::succeeding());
    let hooks = Hooks::new().on_error(FnErrorInterceptor::new(|_err: Error| {
        ErrorAction::Suppress(Payload::Json(json!({"cached": true})))
    }));

    let payload = client
        .get("/status", RequestOptions::new().hooks(hooks))
        .await
        .unwrap();
    assert_eq!(payload, Payload::Json(json!({"cached": true})));
}

#[tokio::test]
async fn test_failing_request_interceptor_aborts_before_transport() {
    let transport = ScriptedTransport::always(json(200, json!({})));
    let client = client(transport.clone(), CountingRefresher::succeeding());
    let error_hook_ran = Arc::new(Mutex::new(false));

    client.add_request_interceptor(FnRequestInterceptor::new(|_req: RequestDescriptor| {
        Err(Error::interceptor(InterceptorStage::Request, "offline mode"))
    }));
    let flag = error_hook_ran.clone();
    client.add_error_interceptor(FnErrorInterceptor::new(move |err: Error| {
        *flag.lock().unwrap() = true;
        ErrorAction::Propagate(err)
    }));

    let err = client.get("/x", RequestOptions::new()).await.unwrap_err();
    assert!(matches!(err, Error::Interceptor { stage: InterceptorStage::Request, .. }));
    assert_eq!(transport.calls(), 0);
    assert!(!*error_hook_ran.lock().unwrap());
}

#[tokio::test]
async fn test_schema_rejection_is_decode_error() {
    let transport = ScriptedTransport::always(json(200, json!([{"id": 7}])));
    let client = client(transport, CountingRefresher::succeeding());
    let schema = JsonSchemaValidator::new(&json!({
        "type": "array",
        "items": {"type": "object", "properties": {"id": {"type": "string"}}}
    }))
    .unwrap();

    let err = client
        .get("/widgets", RequestOptions::new().schema(schema))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Decode));
}

#[derive(Debug, Deserialize, PartialEq)]
struct Widget {
    id: String,
}

#[tokio::test]
async fn test_typed_decoding() {
    let transport = ScriptedTransport::sequence(vec![
        json(200, json!([{"id": "w1"}])),
        json(200, json!({"unexpected": true})),
    ]);
    let client = client(transport, CountingRefresher::succeeding());

    let widgets: Vec<Widget> = client.get_json("/widgets", RequestOptions::new()).await.unwrap();
    assert_eq!(widgets, vec![Widget { id: "w1".into() }]);

    let err = client
        .get_json::<Vec<Widget>>("/widgets", RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Decode));
}

#[tokio::test]
async fn test_deadline_elapses_as_timeout() {
    let transport = ScriptedTransport::with_latency(Duration::from_millis(200), |_, _| Ok(json(200, json!({}))));
    let client = client(transport, CountingRefresher::succeeding());

    let err = client
        .get("/slow", RequestOptions::new().timeout(Duration::from_millis(20)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
}

#[tokio::test]
async fn test_suppressed_payload_of_wrong_shape_is_not_reintercepted() {
    let transport = ScriptedTransport::always(empty(503));
    let client = client(transport, CountingRefresher::succeeding());
    let seen = Arc::new(Mutex::new(0));
    let counter = seen.clone();
    client.add_error_interceptor(FnErrorInterceptor::new(move |_err: Error| {
        *counter.lock().unwrap() += 1;
        ErrorAction::Suppress(Payload::Json(json!({"cached": true})))
    }));

    let err = client
        .get_json::<Vec<Widget>>("/widgets", RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Decode));
    assert_eq!(*seen.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_timed_out_caller_does_not_strand_the_refresh() {
    let transport = ScriptedTransport::new(|req, _| {
        Ok(match req.header("authorization") {
            Some("Bearer T2") => json(200, json!({"ok": true})),
            _ => empty(401),
        })
    });
    let refresher = CountingRefresher::succeeding();
    let client = client(transport.clone(), refresher.clone());

    // The refresh takes longer than this deadline.
    let err = client
        .get("/a", RequestOptions::new().timeout(Duration::from_millis(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));

    let payload = client.get("/b", RequestOptions::new()).await.unwrap();

    assert_eq!(payload, Payload::Json(json!({"ok": true})));
    assert_eq!(refresher.calls(), 1);
    assert_eq!(client.tokens().state(), TokenState::Idle);
    assert_eq!(client.tokens().current_access_token(), "T2");
}

#[tokio::test]
async fn test_refresh_ahead_renews_expiring_token_before_sending() {
    let transport = ScriptedTransport::always(json(200, json!({})));
    let refresher = CountingRefresher::succeeding();
    let client = resilient_client::ApiClient::builder()
        .base_url("https://api.test")
        .transport(transport.clone())
        .refresher(refresher.clone())
        .credentials(TokenPair::new("T1", "R1").with_expires_in(Duration::from_secs(5)))
        .refresh_ahead(Duration::from_secs(60))
        .build()
        .unwrap();

    client.get("/me", RequestOptions::new()).await.unwrap();
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.authorization(0), bearer("T2"));
}

#[tokio::test]
async fn test_post_and_put_send_json_bodies() {
    let transport = ScriptedTransport::always(json(201, json!({"id": "w2"})));
    let client = client(transport.clone(), CountingRefresher::succeeding());

    client
        .post("/widgets", &json!({"name": "gear"}), RequestOptions::new())
        .await
        .unwrap();
    client.put("/widgets/w2", &(), RequestOptions::new()).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, reqwest::Method::POST);
    assert_eq!(
        requests[0].body,
        Some(resilient_client::RequestBody::Json(json!({"name": "gear"})))
    );
    assert_eq!(requests[1].method, reqwest::Method::PUT);
    assert_eq!(requests[1].body, None);
}

use qualys_rate_limit::{RateLimitConfig, RateLimitHeaders, RateLimitState};
use reqwest::header::{HeaderMap, HeaderValue};

fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_static(*value));
    }
    map
}

#[test]
fn test_parse_all_headers() {
    let map = headers(&[
        ("x-ratelimit-limit", "300"),
        ("x-ratelimit-window-sec", "3600"),
        ("x-ratelimit-remaining", "287"),
        ("x-ratelimit-towait-sec", "0"),
        ("x-concurrency-limit-limit", "2"),
        ("x-concurrency-limit-running", "1"),
    ]);

    let detected = RateLimitHeaders::from_headers(&map);
    assert_eq!(
        detected,
        RateLimitHeaders {
            limit: Some(300),
            window_seconds: Some(3600),
            remaining: Some(287),
            to_wait_seconds: Some(0),
            concurrency_limit: Some(2),
            concurrency_running: Some(1),
        }
    );
    assert!(!detected.is_empty());
}

#[test]
fn test_missing_headers_are_none() {
    let detected = RateLimitHeaders::from_headers(&headers(&[("content-type", "application/json")]));
    assert!(detected.is_empty());
}

#[test]
fn test_malformed_values_are_ignored() {
    let map = headers(&[
        ("x-ratelimit-remaining", "lots"),
        ("x-ratelimit-limit", " 500 "),
        ("x-ratelimit-towait-sec", "-3"),
    ]);

    let detected = RateLimitHeaders::from_headers(&map);
    assert_eq!(detected.remaining, None);
    assert_eq!(detected.limit, Some(500));
    assert_eq!(detected.to_wait_seconds, None);
}

#[test]
fn test_partial_headers_keep_previous_values() {
    let mut state = RateLimitState::default();
    let detected = RateLimitHeaders::from_headers(&headers(&[("x-ratelimit-remaining", "42")]));

    state.apply_headers(&detected);
    assert_eq!(state.limit, 300);
    assert_eq!(state.limit_window_seconds, 3600);
    assert_eq!(state.limit_remaining, 42);
    assert_eq!(state.concurrency, 2);
}

#[test]
fn test_parsed_remaining_drives_budget() {
    let config = RateLimitConfig::default();
    let mut state = RateLimitState::default();

    state.apply_headers(&RateLimitHeaders::from_headers(&headers(&[(
        "x-ratelimit-remaining",
        "30",
    )])));
    assert!(state.budget_exhausted(&config));

    state.apply_headers(&RateLimitHeaders::from_headers(&headers(&[(
        "x-ratelimit-remaining",
        "31",
    )])));
    assert!(!state.budget_exhausted(&config));
    assert_eq!(state.usable_budget(&config), 1);
}

#[test]
fn test_state_round_trips_through_json() {
    let state = RateLimitState {
        limit_remaining: 17,
        to_wait_seconds: 9,
        ..Default::default()
    };
    let json = serde_json::to_string(&state).unwrap();
    let parsed: RateLimitState = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, state);
}

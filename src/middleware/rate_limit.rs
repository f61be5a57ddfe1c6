use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::AppError;
use crate::middleware::auth::{hash_token, GUEST_TOKEN_HEADER};
use crate::state::{AppState, RateLimitBucket};

/// Burst allowance on top of the per-minute rate.
const BURST: u32 = 10;
/// Window duration in seconds. An idle bucket is full again after this period.
const WINDOW_SECS: u64 = 60;
/// Idle buckets are swept once every this many requests.
const PRUNE_EVERY: u64 = 1024;

static REQUESTS_SEEN: AtomicU64 = AtomicU64::new(0);

/// Bucket key for a request: the hashed admin or guest credential, or a
/// shared anonymous bucket.
fn bucket_key(req: &Request) -> String {
    let headers = req.headers();
    if let Some(auth) = headers.get("Authorization").and_then(|v| v.to_str().ok()) {
        return format!("auth:{}", hash_token(auth));
    }
    if let Some(token) = headers.get(GUEST_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return format!("guest:{}", hash_token(token));
    }
    "anon".to_string()
}

/// Time it takes to earn one token.
fn token_interval(capacity: u32) -> Duration {
    Duration::from_secs(WINDOW_SECS) / capacity.max(1)
}

/// Credit whole tokens earned since `last_refill`. The clock only advances
/// by the time those tokens cover, so partial progress carries over.
fn refill(bucket: &mut RateLimitBucket, capacity: u32, now: Instant) {
    let interval = token_interval(capacity);
    let elapsed = now.saturating_duration_since(bucket.last_refill);
    let earned = elapsed.as_nanos() / interval.as_nanos();
    if earned == 0 {
        return;
    }

    let total = u128::from(bucket.remaining) + earned;
    if total >= u128::from(capacity) {
        bucket.remaining = capacity;
        bucket.last_refill = now;
    } else {
        // total < capacity, so both casts fit in a u32.
        bucket.remaining = total as u32;
        bucket.last_refill += interval * earned as u32;
    }
}

/// Whole seconds until the next token, at least one.
fn retry_after_secs(bucket: &RateLimitBucket, capacity: u32, now: Instant) -> u64 {
    let wait = token_interval(capacity)
        .saturating_sub(now.saturating_duration_since(bucket.last_refill));
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Drop buckets nobody has used for a full window. They would be full on
/// their next request anyway.
fn prune_idle(buckets: &DashMap<String, RateLimitBucket>, now: Instant) {
    let window = Duration::from_secs(WINDOW_SECS);
    buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) < window);
}

/// Token-bucket rate limiter. A limit of zero disables it.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if state.rate_limit_per_minute == 0 {
        return next.run(req).await;
    }

    let capacity = state.rate_limit_per_minute.saturating_add(BURST);
    let key = bucket_key(&req);
    let now = Instant::now();

    let (remaining, retry_after) = {
        let mut entry = state
            .rate_limits
            .entry(key)
            .or_insert_with(|| RateLimitBucket {
                remaining: capacity,
                last_refill: now,
                last_seen: now,
            });

        let bucket = entry.value_mut();
        bucket.last_seen = now;
        refill(bucket, capacity, now);

        if bucket.remaining == 0 {
            (0u32, Some(retry_after_secs(bucket, capacity, now)))
        } else {
            bucket.remaining -= 1;
            (bucket.remaining, None)
        }
    };

    // The entry guard is released above; retain locks every shard.
    if REQUESTS_SEEN.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
        prune_idle(&state.rate_limits, now);
    }

    if let Some(retry_after) = retry_after {
        tracing::warn!(retry_after, "request rate limited");
        return AppError::RateLimited { retry_after }.into_response();
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(capacity));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
    let reset = chrono::Utc::now().timestamp() + WINDOW_SECS as i64;
    headers.insert("X-RateLimit-Reset", HeaderValue::from(reset));
    response
}

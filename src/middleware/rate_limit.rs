//! Process-wide limit on requests that reach the language model.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use tracing::warn;

use crate::error::GmaoError;
use crate::router::GmaoState;

pub type AiRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// `per_minute` requests per minute, bursting up to the same amount.
/// Zero is treated as one.
pub fn ai_rate_limiter(per_minute: u32) -> AiRateLimiter {
    let rate = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_minute(rate))
}

/// Seconds until `limiter` admits another request; `None` when admitted now.
pub fn check(limiter: &AiRateLimiter) -> Option<u64> {
    match limiter.check() {
        Ok(()) => None,
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            Some(wait.as_secs().max(1))
        }
    }
}

pub async fn limit_ai_requests(
    State(state): State<GmaoState>,
    req: Request,
    next: Next,
) -> Result<Response, GmaoError> {
    if let Some(retry_after_secs) = check(&state.limiter) {
        warn!(path = %req.uri().path(), retry_after_secs, "AI rate limit hit");
        return Err(GmaoError::RateLimited { retry_after_secs });
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_reject() {
        let limiter = ai_rate_limiter(2);
        assert_eq!(check(&limiter), None);
        assert_eq!(check(&limiter), None);
        let retry = check(&limiter).expect("third request is limited");
        assert!((1..=30).contains(&retry));
    }

    #[test]
    fn zero_means_one() {
        let limiter = ai_rate_limiter(0);
        assert_eq!(check(&limiter), None);
        assert!(check(&limiter).is_some());
    }
}

//! Bounded sequential retry

use crate::result::{FlakeError, FlakeResult};
use std::future::Future;

/// Call `f` up to `max_tries` times, returning the first success
///
/// Attempts run one after another. When every attempt fails the last
/// error is returned inside [`FlakeError::RetryExhausted`].
pub async fn attempt<T, F, Fut>(max_tries: usize, mut f: F) -> FlakeResult<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = FlakeResult<T>>,
{
    let max_tries = max_tries.max(1);
    let mut last = None;
    for n in 1..=max_tries {
        match f(n).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::debug!(attempt = n, max_tries, error = %e, "trial attempt failed");
                last = Some(e);
            }
        }
    }
    Err(FlakeError::RetryExhausted {
        attempts: max_tries,
        last: Box::new(last.unwrap_or_else(|| FlakeError::protocol("no attempt was made"))),
    })
}

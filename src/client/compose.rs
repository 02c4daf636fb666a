//! Combinators for operations built from more than one request.
//!
//! - [`best_effort`]: the optional leg degrades to a default value.
//! - [`all_or_nothing`]: any failing leg fails the whole operation.

use std::fmt::Display;
use std::future::Future;

use tracing::warn;

use crate::error::ClientError;

/// Run `primary` and `optional` concurrently.
///
/// A failure of `primary` fails the composition. A failure of `optional` is
/// logged and replaced by `default()`.
pub async fn best_effort<P, O, T, U, E, F>(
    primary: P,
    optional: O,
    default: impl FnOnce() -> U,
) -> Result<(T, U), E>
where
    P: Future<Output = Result<T, E>>,
    O: Future<Output = Result<U, F>>,
    F: Display,
{
    let (primary, optional) = tokio::join!(primary, optional);
    let primary = primary?;
    let optional = optional.unwrap_or_else(|e| {
        warn!(error = %e, "optional request failed, using default");
        default()
    });
    Ok((primary, optional))
}

/// Run two labelled legs concurrently; the first failure wins.
///
/// The failing leg is reported as [`ClientError::Composition`] and no partial
/// result is returned.
pub async fn all_or_nothing<A, B, T, U>(
    first: (&'static str, A),
    second: (&'static str, B),
) -> Result<(T, U), ClientError>
where
    A: Future<Output = Result<T, ClientError>>,
    B: Future<Output = Result<U, ClientError>>,
{
    let (first_leg, first) = first;
    let (second_leg, second) = second;

    tokio::try_join!(
        async move { first.await.map_err(|e| leg_failed(first_leg, e)) },
        async move { second.await.map_err(|e| leg_failed(second_leg, e)) },
    )
}

fn leg_failed(leg: &'static str, source: ClientError) -> ClientError {
    ClientError::Composition {
        leg,
        source: Box::new(source),
    }
}

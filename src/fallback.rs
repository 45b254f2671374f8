//! Ordered-fallback and create-or-find combinators.
//!
//! Region failover and distribution fallback both walk an ordered candidate
//! list, trying each in turn; resource provisioning repeatedly tries to create
//! something and, when that fails, goes looking for the existing one. Both
//! patterns live here once.

use std::future::Future;

use thiserror::Error;

use crate::provider::ProviderError;

/// Decision taken after a candidate fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// Record the failure and try the next candidate.
    Advance,
    /// Stop immediately and surface the failure.
    Abort,
}

/// A failed trial for one candidate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attempt<C, E> {
    /// Candidate that was tried.
    pub candidate: C,
    /// Failure it produced.
    pub error: E,
}

/// Outcome of an unsuccessful [`try_in_order`] run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FallbackError<C, E> {
    /// A failure was classified as [`Verdict::Abort`].
    Aborted {
        /// The aborting attempt.
        attempt: Attempt<C, E>,
        /// Attempts that advanced before it.
        prior: Vec<Attempt<C, E>>,
    },
    /// Every candidate failed with an advance-worthy error.
    Exhausted(Vec<Attempt<C, E>>),
}

/// Tries candidates in order until one succeeds.
///
/// # Errors
///
/// Returns [`FallbackError::Aborted`] as soon as `classify` yields
/// [`Verdict::Abort`], or [`FallbackError::Exhausted`] once every candidate
/// failed (including when `candidates` is empty).
pub async fn try_in_order<'c, C, T, E, F, Fut, K>(
    candidates: &'c [C],
    mut trial: F,
    classify: K,
) -> Result<(C, T), FallbackError<C, E>>
where
    C: Clone,
    F: FnMut(&'c C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    K: Fn(&E) -> Verdict,
{
    let mut attempts = Vec::new();
    for candidate in candidates {
        match trial(candidate).await {
            Ok(value) => return Ok((candidate.clone(), value)),
            Err(error) => {
                let verdict = classify(&error);
                let attempt = Attempt {
                    candidate: candidate.clone(),
                    error,
                };
                if verdict == Verdict::Abort {
                    return Err(FallbackError::Aborted {
                        attempt,
                        prior: attempts,
                    });
                }
                attempts.push(attempt);
            }
        }
    }
    Err(FallbackError::Exhausted(attempts))
}

/// How a resource was obtained by [`ensure_resource`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Ensured<T> {
    /// Freshly created by this call.
    Created(T),
    /// Already present; found by lookup.
    Existing(T),
}

impl<T> Ensured<T> {
    /// Returns `true` when this call created the resource.
    #[must_use]
    pub const fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    /// Unwraps the resource regardless of origin.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Created(value) | Self::Existing(value) => value,
        }
    }
}

/// Failure of [`ensure_resource`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum EnsureError {
    /// Creation failed in a way that does not warrant a lookup.
    #[error("create failed: {0}")]
    Create(#[source] ProviderError),
    /// Creation failed and the lookup found nothing.
    #[error("create failed ({create}) and no existing resource was found")]
    Missing {
        /// Creation failure.
        create: ProviderError,
    },
    /// Creation and lookup both failed.
    #[error("create failed ({create}) and lookup failed ({lookup})")]
    Lookup {
        /// Creation failure.
        create: ProviderError,
        /// Lookup failure.
        lookup: Box<ProviderError>,
    },
}

/// Creates a resource, falling back to finding the existing one.
///
/// `fall_back_on` decides which creation failures mean "probably already
/// there".
///
/// # Errors
///
/// Returns [`EnsureError`] when creation fails and the fallback cannot supply
/// the resource.
pub async fn ensure_resource<T, Create, CreateFut, Find, FindFut, P>(
    create: Create,
    find: Find,
    fall_back_on: P,
) -> Result<Ensured<T>, EnsureError>
where
    Create: FnOnce() -> CreateFut,
    CreateFut: Future<Output = Result<T, ProviderError>>,
    Find: FnOnce() -> FindFut,
    FindFut: Future<Output = Result<Option<T>, ProviderError>>,
    P: FnOnce(&ProviderError) -> bool,
{
    let create_error = match create().await {
        Ok(value) => return Ok(Ensured::Created(value)),
        Err(err) => err,
    };
    if !fall_back_on(&create_error) {
        return Err(EnsureError::Create(create_error));
    }
    match find().await {
        Ok(Some(value)) => Ok(Ensured::Existing(value)),
        Ok(None) => Err(EnsureError::Missing {
            create: create_error,
        }),
        Err(lookup) => Err(EnsureError::Lookup {
            create: create_error,
            lookup: Box::new(lookup),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::provider::ProviderErrorKind;

    fn conflict() -> ProviderError {
        ProviderError::new(ProviderErrorKind::Conflict, "Create", "duplicate")
    }

    #[tokio::test]
    async fn try_in_order_returns_first_success() {
        let calls = Cell::new(0);
        let result = try_in_order(
            &["a", "b", "c"],
            |candidate| {
                calls.set(calls.get() + 1);
                let outcome = if *candidate == "b" {
                    Ok(candidate.len())
                } else {
                    Err("nope")
                };
                async move { outcome }
            },
            |_| Verdict::Advance,
        )
        .await;
        assert_eq!(result, Ok(("b", 1)));
        assert_eq!(calls.get(), 2, "candidate c must not be tried");
    }

    #[tokio::test]
    async fn try_in_order_stops_on_abort() {
        let result: Result<(&str, ()), _> = try_in_order(
            &["a", "b", "c"],
            |candidate| {
                let error = if *candidate == "b" { "fatal" } else { "soft" };
                async move { Err(error) }
            },
            |err| {
                if *err == "fatal" {
                    Verdict::Abort
                } else {
                    Verdict::Advance
                }
            },
        )
        .await;
        let Err(FallbackError::Aborted { attempt, prior }) = result else {
            panic!("expected abort, got {result:?}");
        };
        assert_eq!(attempt.candidate, "b");
        assert_eq!(prior.len(), 1);
    }

    #[tokio::test]
    async fn try_in_order_exhausts_empty_list() {
        let result: Result<(&str, ()), FallbackError<&str, &str>> =
            try_in_order(&[], |_| async { Err("unused") }, |_| Verdict::Advance).await;
        assert_eq!(result, Err(FallbackError::Exhausted(Vec::new())));
    }

    #[tokio::test]
    async fn ensure_resource_reports_creation() {
        let result = ensure_resource(
            || async { Ok::<_, ProviderError>(7) },
            || async { Ok(Some(0)) },
            |_| true,
        )
        .await;
        assert_eq!(result, Ok(Ensured::Created(7)));
    }

    #[tokio::test]
    async fn ensure_resource_falls_back_to_lookup() {
        let result = ensure_resource(
            || async { Err(conflict()) },
            || async { Ok(Some(7)) },
            ProviderError::is_conflict,
        )
        .await;
        assert_eq!(result, Ok(Ensured::Existing(7)));
    }

    #[tokio::test]
    async fn ensure_resource_skips_lookup_for_other_failures() {
        let denied = ProviderError::new(ProviderErrorKind::Permission, "Create", "denied");
        let expected = denied.clone();
        let result = ensure_resource(
            || async { Err::<u8, _>(denied) },
            || async { Ok(Some(0)) },
            ProviderError::is_conflict,
        )
        .await;
        assert_eq!(result, Err(EnsureError::Create(expected)));
    }

    #[tokio::test]
    async fn ensure_resource_reports_missing_and_lookup_failures() {
        let missing =
            ensure_resource(|| async { Err::<u8, _>(conflict()) }, || async { Ok(None) }, |_| true)
                .await;
        assert!(matches!(missing, Err(EnsureError::Missing { .. })));

        let lookup = ensure_resource(
            || async { Err::<u8, _>(conflict()) },
            || async {
                Err(ProviderError::new(
                    ProviderErrorKind::Transient,
                    "Describe",
                    "timeout",
                ))
            },
            |_| true,
        )
        .await;
        assert!(matches!(lookup, Err(EnsureError::Lookup { .. })));
    }
}

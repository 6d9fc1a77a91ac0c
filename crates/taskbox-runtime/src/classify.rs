//! Maps raised failures onto the closed error taxonomy.

use std::error::Error as StdError;

use taskbox_core::{Failure, FailureOrigin, TaskError};
use tokio::task::JoinError;

/// Classify a failure raised by a task body.
///
/// Tagged failures pass through unchanged. An untyped failure keeps the most
/// specific [`TaskError`] found in its source chain; failing that it becomes
/// a network error when raised inside `fetch` and a generic error otherwise.
pub fn classify(failure: Failure) -> TaskError {
    match failure {
        Failure::Tagged(error) => error,
        Failure::Untyped {
            message,
            origin,
            source,
        } => {
            let root = source
                .as_deref()
                .map(|err| err as &(dyn StdError + 'static));

            if let Some(tagged) = root.and_then(most_specific_tagged) {
                return tagged;
            }

            let classified = match origin {
                FailureOrigin::Fetch => TaskError::network(message),
                FailureOrigin::Task => TaskError::generic(message),
            };
            match root.and_then(describe_causes) {
                Some(cause) => classified.with_cause(cause),
                None => classified,
            }
        }
    }
}

/// Classify a task body that did not return normally.
pub fn classify_panic(error: JoinError) -> TaskError {
    match error.try_into_panic() {
        Ok(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            TaskError::generic(format!("Task panicked: {detail}"))
        }
        Err(_) => TaskError::generic("Task body was aborted"),
    }
}

fn most_specific_tagged(error: &(dyn StdError + 'static)) -> Option<TaskError> {
    let mut best: Option<&TaskError> = None;
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(tagged) = err.downcast_ref::<TaskError>() {
            let more_specific = best.map_or(true, |b| {
                tagged.kind().specificity() < b.kind().specificity()
            });
            if more_specific {
                best = Some(tagged);
            }
        }
        current = err.source();
    }
    best.cloned()
}

/// Messages of everything below the top-level error, joined.
fn describe_causes(error: &(dyn StdError + 'static)) -> Option<String> {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(err) = current {
        causes.push(err.to_string());
        current = err.source();
    }
    (!causes.is_empty()).then(|| causes.join(": "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskbox_core::ErrorKind;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("lookup failed")]
    struct Lookup(#[source] TaskError);

    #[derive(Debug, Error)]
    #[error("request failed")]
    struct Request(#[source] std::io::Error);

    #[test]
    fn test_tagged_passes_through() {
        let err = TaskError::data("Invalid response format");
        assert_eq!(classify(Failure::from(err.clone())), err);
    }

    #[test]
    fn test_untyped_task_failure_is_generic() {
        let classified = classify(Failure::msg("Simulated error at step 3"));
        assert_eq!(classified.kind(), ErrorKind::Generic);
        assert_eq!(classified.message(), "Simulated error at step 3");
    }

    #[test]
    fn test_untyped_fetch_failure_is_network_with_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let classified = classify(Failure::from_error(FailureOrigin::Fetch, Request(io)));
        assert_eq!(
            classified,
            TaskError::network("request failed").with_cause("connection refused")
        );
    }

    #[test]
    fn test_tag_found_in_source_chain() {
        let wrapped = Lookup(TaskError::data("missing field 'main'"));
        let classified = classify(Failure::from_error(FailureOrigin::Task, wrapped));
        assert_eq!(classified, TaskError::data("missing field 'main'"));
    }

    #[tokio::test]
    async fn test_panic_is_generic() {
        let err = tokio::spawn(async { panic!("kaboom") }).await.unwrap_err();
        let classified = classify_panic(err);
        assert_eq!(classified.kind(), ErrorKind::Generic);
        assert_eq!(classified.message(), "Task panicked: kaboom");
    }

    #[tokio::test]
    async fn test_abort_is_generic() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let err = handle.await.unwrap_err();
        assert_eq!(classify_panic(err).message(), "Task body was aborted");
    }
}

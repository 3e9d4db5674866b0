//! Per-call time budgets

use kubevirt_client::KubeVirtError;
use std::future::Future;
use std::time::Duration;

/// Run a gateway call within `budget`; running out of time is reported as
/// an API failure.
pub(crate) async fn bounded<T, F>(budget: Duration, call: F) -> Result<T, KubeVirtError>
where
    F: Future<Output = Result<T, KubeVirtError>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(KubeVirtError::Api(format!("request timed out after {budget:?}"))),
    }
}

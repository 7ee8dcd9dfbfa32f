//! 우선순위 기반 대체(fallback) 체인.
//!
//! 후보를 순서대로 평가하여 처음으로 값을 내놓은 후보를 사용합니다.
//! 후보의 `Ok(None)`은 "값 없음", `Err`는 "소스 실패"이며 둘 다 다음 후보로 넘어갑니다.

use futures::future::BoxFuture;
use std::fmt::Debug;
use tracing::{debug, warn};

use crate::error::Result;

/// 값과 값을 내놓은 후보의 라벨.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T, L> {
    pub value: T,
    pub source: L,
}

/// 후보 하나. 퓨처는 앞선 후보가 모두 실패했을 때만 poll됩니다.
pub type Candidate<'a, T, L> = (L, BoxFuture<'a, Result<Option<T>>>);

/// 첫 번째로 값을 내놓은 후보의 결과를 반환합니다.
pub async fn resolve_first<'a, T, L>(
    what: &str,
    candidates: Vec<Candidate<'a, T, L>>,
) -> Option<Resolved<T, L>>
where
    L: Debug + Copy,
{
    for (source, candidate) in candidates {
        match candidate.await {
            Ok(Some(value)) => {
                debug!(what, source = ?source, "값 확정");
                return Some(Resolved { value, source });
            }
            Ok(None) => debug!(what, source = ?source, "값 없음, 다음 후보"),
            Err(e) => warn!(what, source = ?source, error = %e, "후보 실패, 다음 후보"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Src {
        Live,
        Cache,
        Persisted,
    }

    #[tokio::test]
    async fn test_skips_errors_and_empty() {
        let resolved = resolve_first(
            "rate",
            vec![
                (
                    Src::Live,
                    async { Err::<Option<i32>, _>(DataError::NoData("down".into())) }.boxed(),
                ),
                (Src::Cache, async { Ok(None) }.boxed()),
                (Src::Persisted, async { Ok(Some(42)) }.boxed()),
            ],
        )
        .await
        .unwrap();
        assert_eq!(resolved, Resolved { value: 42, source: Src::Persisted });
    }

    #[tokio::test]
    async fn test_later_candidates_not_polled() {
        let polled = AtomicUsize::new(0);
        let resolved = resolve_first(
            "rate",
            vec![
                (Src::Live, async { Ok(Some("live")) }.boxed()),
                (
                    Src::Cache,
                    async {
                        polled.fetch_add(1, Ordering::SeqCst);
                        Ok(Some("cache"))
                    }
                    .boxed(),
                ),
            ],
        )
        .await
        .unwrap();
        assert_eq!(resolved.source, Src::Live);
        assert_eq!(polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_fail() {
        let resolved: Option<Resolved<i32, Src>> =
            resolve_first(
                "rate",
                vec![(Src::Live, async { Ok::<_, DataError>(None) }.boxed())],
            )
            .await;
        assert!(resolved.is_none());
    }
}

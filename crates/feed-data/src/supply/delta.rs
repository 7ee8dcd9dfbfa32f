//! 기간별(24h / 7d / 30d) 공급량 변화량.
//!
//! # 계산 규칙
//!
//! - 기준 시각은 가장 최근 스냅샷의 타임스탬프입니다.
//! - 기간 안의 가장 오래된 관측치와 최신 관측치를 비교합니다.
//! - 기간 안에 관측치가 하나뿐이면 코인의 최근 두 관측치로 대체합니다 (forward-fill).
//! - 스냅샷이 하나뿐이거나 코인이 한 번만 관측되었으면 모든 기간을 0으로 둡니다.
//! - 이전 값이 0 이하이면 해당 기간은 `None`입니다.
//!
//! 순수 함수이며 입력 순서에 의존하지 않습니다.

use std::collections::BTreeMap;

use feed_core::{DeltaWindow, SupplyDelta, SupplySnapshot, WindowDelta};

/// 변화율(%)을 소수점 2자리로 반올림합니다. 이전 값이 0 이하이면 `None`.
pub fn percent_change(old: f64, new: f64) -> Option<WindowDelta> {
    if old.is_nan() || old <= 0.0 || !new.is_finite() {
        return None;
    }
    let change = ((new - old) / old * 100.0 * 100.0).round() / 100.0;
    Some(WindowDelta {
        change,
        absolute_change: new - old,
    })
}

/// 스냅샷 이력에서 코인별 변화량을 계산합니다.
///
/// 결과에는 가장 최근 스냅샷에 있는 코인만 포함됩니다.
pub fn compute_supply_deltas(snapshots: &[SupplySnapshot]) -> BTreeMap<String, SupplyDelta> {
    let mut ordered: Vec<&SupplySnapshot> = snapshots.iter().collect();
    ordered.sort_by_key(|s| s.timestamp_ms());

    let Some(latest) = ordered.last() else {
        return BTreeMap::new();
    };
    let latest_ms = latest.timestamp_ms();

    if ordered.len() == 1 {
        return latest
            .supplies
            .keys()
            .map(|id| (id.clone(), SupplyDelta::zeroed()))
            .collect();
    }

    latest
        .supplies
        .keys()
        .map(|id| {
            // (타임스탬프, 공급량) 오름차순
            let observations: Vec<(i64, f64)> = ordered
                .iter()
                .filter_map(|s| s.supplies.get(id).map(|v| (s.timestamp_ms(), *v)))
                .collect();

            // 신규 코인: 아직 계산 불가
            if observations.len() < 2 {
                return (id.clone(), SupplyDelta::default());
            }

            let (_, newest) = observations[observations.len() - 1];
            let (_, previous) = observations[observations.len() - 2];

            let mut delta = SupplyDelta::default();
            for window in DeltaWindow::ALL {
                let cutoff = latest_ms - window.millis();
                let in_window: Vec<&(i64, f64)> =
                    observations.iter().filter(|(ts, _)| *ts >= cutoff).collect();

                let old = if in_window.len() >= 2 {
                    in_window[0].1
                } else {
                    previous
                };
                delta.set(window, percent_change(old, newest));
            }

            (id.clone(), delta)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn snap(offset: Duration, coins: &[(&str, f64)]) -> SupplySnapshot {
        SupplySnapshot::capture(
            base() + offset,
            5,
            coins.iter().map(|(id, v)| (id.to_string(), *v)).collect(),
        )
    }

    #[test]
    fn test_day_window_uses_oldest_inside_window() {
        let history = vec![
            snap(Duration::zero(), &[("btc", 100.0)]),
            snap(Duration::hours(25), &[("btc", 110.0)]),
            snap(Duration::hours(26), &[("btc", 111.0)]),
        ];
        let deltas = compute_supply_deltas(&history);
        let btc = deltas["btc"];

        let day = btc.change_24h.unwrap();
        assert_eq!(day.change, 0.91);
        assert_eq!(day.absolute_change, 1.0);

        // 7일/30일 기간에는 t=0이 포함됨
        assert_eq!(btc.change_7d.unwrap().change, 11.0);
        assert_eq!(btc.change_1m.unwrap().absolute_change, 11.0);
    }

    #[test]
    fn test_single_snapshot_is_zeroed_not_null() {
        let deltas = compute_supply_deltas(&[snap(Duration::zero(), &[("btc", 100.0), ("eth", 0.0)])]);
        assert_eq!(deltas.len(), 2);
        for delta in deltas.values() {
            assert_eq!(*delta, SupplyDelta::zeroed());
        }
    }

    #[test]
    fn test_forward_fill_when_window_has_one_observation() {
        let history = vec![
            snap(Duration::zero(), &[("btc", 100.0)]),
            snap(Duration::hours(48), &[("btc", 102.0)]),
        ];
        let deltas = compute_supply_deltas(&history);
        let day = deltas["btc"].change_24h.unwrap();
        assert_eq!(day.change, 2.0);
        assert_eq!(day.absolute_change, 2.0);
    }

    #[test]
    fn test_newly_listed_coin_is_unresolved() {
        let history = vec![
            snap(Duration::zero(), &[("btc", 100.0)]),
            snap(Duration::hours(1), &[("btc", 100.0), ("new", 5.0)]),
        ];
        let deltas = compute_supply_deltas(&history);
        assert_eq!(deltas["new"], SupplyDelta::default());
        assert!(deltas["new"].change_24h.is_none());
        assert_ne!(deltas["new"], SupplyDelta::zeroed());
        assert_eq!(deltas["btc"].change_24h.unwrap().change, 0.0);
    }

    #[test]
    fn test_non_positive_old_value_is_null() {
        let history = vec![
            snap(Duration::zero(), &[("x", 0.0)]),
            snap(Duration::hours(1), &[("x", 10.0)]),
        ];
        let deltas = compute_supply_deltas(&history);
        assert_eq!(deltas["x"], SupplyDelta::default());
    }

    #[test]
    fn test_coins_absent_from_latest_are_dropped() {
        let history = vec![
            snap(Duration::zero(), &[("gone", 1.0), ("btc", 1.0)]),
            snap(Duration::hours(1), &[("btc", 2.0)]),
        ];
        let deltas = compute_supply_deltas(&history);
        assert!(!deltas.contains_key("gone"));
        assert!(deltas.contains_key("btc"));
    }

    #[test]
    fn test_empty_history() {
        assert!(compute_supply_deltas(&[]).is_empty());
    }

    #[test]
    fn test_percent_change_rounding() {
        assert_eq!(percent_change(3.0, 4.0).unwrap().change, 33.33);
        assert_eq!(percent_change(-1.0, 4.0), None);
    }

    proptest! {
        #[test]
        fn prop_input_order_does_not_matter(
            supplies in prop::collection::vec(1.0f64..1e9, 2..8),
            gaps in prop::collection::vec(1i64..72, 8),
        ) {
            let mut offset = Duration::zero();
            let history: Vec<SupplySnapshot> = supplies
                .iter()
                .zip(gaps.iter())
                .map(|(v, gap)| {
                    offset = offset + Duration::hours(*gap);
                    snap(offset, &[("coin", *v)])
                })
                .collect();

            let mut reversed = history.clone();
            reversed.reverse();

            prop_assert_eq!(compute_supply_deltas(&history), compute_supply_deltas(&reversed));
        }

        #[test]
        fn prop_positive_history_resolves_every_window(
            supplies in prop::collection::vec(1.0f64..1e9, 1..8),
        ) {
            let history: Vec<SupplySnapshot> = supplies
                .iter()
                .enumerate()
                .map(|(i, v)| snap(Duration::hours(i as i64 * 6), &[("coin", *v)]))
                .collect();

            let delta = compute_supply_deltas(&history)["coin"];
            for window in DeltaWindow::ALL {
                prop_assert!(delta.get(window).is_some());
            }
        }
    }
}

//! 저장소와 무관한 순수 검사 함수.
//!
//! 각 함수는 이미 조회된 봉/개수를 받아 [`Finding`]을 반환합니다.
//! [`QualityChecker`](crate::QualityChecker)가 조회와 종목 정보를 붙입니다.

use chrono::{DateTime, Duration, Utc};
use market_core::{Bar, Interval, TimeRange, ValidationError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use crate::types::{CheckKind, CheckStatus, Finding};

/// 주당 거래일 비율 (5/7). 공휴일은 고려하지 않습니다.
const TRADING_DAY_RATIO: f64 = 5.0 / 7.0;

/// 완전도 하한. 이 값 미만이면 incomplete.
const PARTIAL_THRESHOLD: f64 = 0.9;

/// 명목 간격의 이 배수를 넘는 공백을 gap으로 봅니다 (주말 허용).
const GAP_MULTIPLIER: i32 = 3;

/// 전일 대비 종가 변화율 한도 (%).
const EXTREME_CHANGE_PCT: Decimal = dec!(20);

const FRESH_LIMIT_DAYS: i64 = 1;
const STALE_LIMIT_DAYS: i64 = 3;

/// 구간 길이로부터 기대 거래일 수: `floor(days × 5/7)`.
pub fn expected_trading_days(range: TimeRange) -> u64 {
    let days = range.duration().num_seconds().max(0) as f64 / 86_400.0;
    (days * TRADING_DAY_RATIO).floor() as u64
}

/// 완전도 검사.
///
/// `integrity = actual / expected`. 기대값이 0이면 판단할 구간이 없으므로 완전으로 봅니다.
pub fn completeness(actual: u64, range: TimeRange) -> Finding {
    let expected = expected_trading_days(range);
    let integrity = if expected == 0 {
        1.0
    } else {
        actual as f64 / expected as f64
    };

    let (status, label, message) = if integrity >= 1.0 {
        (CheckStatus::Pass, "complete", "데이터 완전")
    } else if integrity >= PARTIAL_THRESHOLD {
        (CheckStatus::Warning, "partial", "데이터 일부 누락")
    } else {
        (CheckStatus::Error, "incomplete", "데이터 심각하게 누락")
    };

    Finding::new(
        CheckKind::Completeness,
        status,
        format!("{}, 완전도 {:.1}%", message, integrity * 100.0),
    )
    .with_details(json!({
        "start": range.start,
        "end": range.end,
        "actual_count": actual,
        "expected_days": expected,
        "integrity": integrity,
        "label": label,
    }))
}

/// 연속성 검사.
///
/// 연속한 두 봉의 간격이 명목 간격의 3배를 넘으면 gap입니다.
/// `bars`는 시간 오름차순이어야 합니다.
pub fn continuity(bars: &[Bar], interval: Interval) -> Finding {
    if bars.is_empty() {
        return Finding::new(CheckKind::Continuity, CheckStatus::Error, "데이터 없음")
            .with_details(json!({ "actual_count": 0, "gap_count": 0 }));
    }

    let limit = interval.duration() * GAP_MULTIPLIER;
    let gaps: Vec<Value> = bars
        .windows(2)
        .filter_map(|pair| {
            let delta = pair[1].timestamp - pair[0].timestamp;
            (delta > limit).then(|| {
                json!({
                    "from": pair[0].timestamp,
                    "to": pair[1].timestamp,
                    "hours": delta.num_hours(),
                })
            })
        })
        .collect();

    let status = CheckStatus::from_count(gaps.len());
    let message = match status {
        CheckStatus::Pass => format!("데이터 연속, 총 {}개 봉", bars.len()),
        CheckStatus::Warning => format!("데이터 대체로 연속, 공백 {}개 발견", gaps.len()),
        CheckStatus::Error => format!("데이터 불연속, 공백 {}개 발견", gaps.len()),
    };

    Finding::new(CheckKind::Continuity, status, message).with_details(json!({
        "actual_count": bars.len(),
        "gap_count": gaps.len(),
        "gaps": gaps,
    }))
}

fn is_price_violation(err: &ValidationError) -> bool {
    matches!(
        err,
        ValidationError::NonPositivePrice { .. }
            | ValidationError::LowAboveHigh { .. }
            | ValidationError::OpenOutOfRange { .. }
            | ValidationError::CloseOutOfRange { .. }
    )
}

/// 이상치 한 건의 상세 정보.
fn anomaly(bar: &Bar, kind: &str, extra: Value) -> Value {
    let mut entry = json!({
        "timestamp": bar.timestamp,
        "type": kind,
        "open": bar.open,
        "high": bar.high,
        "low": bar.low,
        "close": bar.close,
    });
    if let (Value::Object(map), Value::Object(extra)) = (&mut entry, extra) {
        map.extend(extra);
    }
    entry
}

/// 이상치 검사.
///
/// 봉마다 다음 순서로 검사합니다:
/// 1. 0 이하 가격 (`invalid_price`) → 이 봉은 더 검사하지 않음
/// 2. 고가/저가 범위 위반 (`price_logic_error`) → 이 봉은 더 검사하지 않음
/// 3. 전 봉 종가 대비 ±20% 초과 변화 (`extreme_change`)
/// 4. 거래량 0 (`zero_volume`)
pub fn anomalies(bars: &[Bar]) -> Finding {
    if bars.len() < 2 {
        return Finding::new(
            CheckKind::Anomalies,
            CheckStatus::Warning,
            "데이터 부족, 이상치 검사 불가",
        )
        .with_details(json!({ "total_bars": bars.len() }));
    }

    let mut found: Vec<Value> = Vec::new();

    for (i, bar) in bars.iter().enumerate() {
        if let Err(e) = bar.validate() {
            if is_price_violation(&e) {
                found.push(anomaly(bar, e.code(), json!({ "reason": e.to_string() })));
                continue;
            }
        }

        if i > 0 {
            let prev_close = bars[i - 1].close;
            if prev_close > Decimal::ZERO {
                let change_pct = (bar.close - prev_close) / prev_close * dec!(100);
                if change_pct.abs() > EXTREME_CHANGE_PCT {
                    found.push(anomaly(
                        bar,
                        "extreme_change",
                        json!({ "change_pct": change_pct.round_dp(2), "prev_close": prev_close }),
                    ));
                }
            }
        }

        if bar.volume.is_zero() {
            found.push(anomaly(bar, "zero_volume", json!({ "volume": bar.volume })));
        }
    }

    let status = CheckStatus::from_count(found.len());
    let message = match status {
        CheckStatus::Pass => "이상치 없음".to_string(),
        CheckStatus::Warning => format!("잠재적 이상치 {}개 발견", found.len()),
        CheckStatus::Error => format!("데이터 이상치 {}개 발견", found.len()),
    };

    Finding::new(CheckKind::Anomalies, status, message).with_details(json!({
        "total_bars": bars.len(),
        "anomaly_count": found.len(),
        "anomalies": found,
    }))
}

/// 신선도 검사.
///
/// 지연 = now − 최신 봉 시각. 1일 이하 pass, 3일 이하 warning, 그 외 error.
pub fn freshness(latest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Finding {
    let Some(latest) = latest else {
        return Finding::new(CheckKind::Freshness, CheckStatus::Error, "데이터 없음");
    };

    let delay = now - latest;
    let status = if delay <= Duration::days(FRESH_LIMIT_DAYS) {
        CheckStatus::Pass
    } else if delay <= Duration::days(STALE_LIMIT_DAYS) {
        CheckStatus::Warning
    } else {
        CheckStatus::Error
    };

    let date = latest.format("%Y-%m-%d");
    let message = match status {
        CheckStatus::Pass => format!("최신 데이터, 마지막 봉: {}", date),
        CheckStatus::Warning => format!("데이터 지연, 마지막 봉: {}", date),
        CheckStatus::Error => format!("데이터 심각하게 지연, 마지막 봉: {}", date),
    };

    Finding::new(CheckKind::Freshness, status, message).with_details(json!({
        "latest": latest,
        "delay_hours": delay.num_hours(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn bar_at(ts: DateTime<Utc>, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar::new("600519", "SH", Interval::D1, ts, open, high, low, close, dec!(100))
    }

    fn flat(n: i64, close: Decimal) -> Bar {
        bar_at(day(n), close, close, close, close)
    }

    fn anomaly_types(finding: &Finding) -> Vec<String> {
        finding.details["anomalies"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_expected_trading_days() {
        let range = TimeRange::new(day(0), day(30)).unwrap();
        assert_eq!(expected_trading_days(range), 21);
        let range = TimeRange::new(day(0), day(1)).unwrap();
        assert_eq!(expected_trading_days(range), 0);
    }

    #[test]
    fn test_completeness_thresholds() {
        let range = TimeRange::new(day(0), day(30)).unwrap();
        assert_eq!(completeness(21, range).status, CheckStatus::Pass);
        assert_eq!(completeness(25, range).status, CheckStatus::Pass);
        // 19/21 = 0.904
        assert_eq!(completeness(19, range).status, CheckStatus::Warning);
        // 18/21 = 0.857
        let finding = completeness(18, range);
        assert_eq!(finding.status, CheckStatus::Error);
        assert_eq!(finding.details["label"], "incomplete");
    }

    #[test]
    fn test_completeness_zero_expected() {
        let range = TimeRange::new(day(0), day(0)).unwrap();
        assert_eq!(completeness(0, range).status, CheckStatus::Pass);
    }

    #[test]
    fn test_continuity_single_gap_is_warning() {
        let bars: Vec<Bar> = [1, 2, 3, 8, 9].iter().map(|&n| flat(n, dec!(10))).collect();
        let finding = continuity(&bars, Interval::D1);
        assert_eq!(finding.status, CheckStatus::Warning);
        assert_eq!(finding.details["gap_count"], 1);
        let gap = &finding.details["gaps"][0];
        assert_eq!(gap["from"], json!(day(3)));
        assert_eq!(gap["to"], json!(day(8)));
    }

    #[test]
    fn test_continuity_weekend_is_not_gap() {
        // 금 → 월 (3일)은 허용
        let bars: Vec<Bar> = [0, 3, 4].iter().map(|&n| flat(n, dec!(10))).collect();
        assert_eq!(continuity(&bars, Interval::D1).status, CheckStatus::Pass);
    }

    #[test]
    fn test_continuity_no_data_and_many_gaps() {
        assert_eq!(continuity(&[], Interval::D1).status, CheckStatus::Error);

        let bars: Vec<Bar> = [0, 5, 10, 15].iter().map(|&n| flat(n, dec!(10))).collect();
        assert_eq!(continuity(&bars, Interval::D1).status, CheckStatus::Error);
    }

    #[test]
    fn test_anomaly_price_logic_error() {
        let bars = vec![
            flat(0, dec!(9)),
            bar_at(day(1), dec!(9), dec!(8), dec!(10), dec!(9)),
        ];
        let finding = anomalies(&bars);
        assert_eq!(anomaly_types(&finding), vec!["price_logic_error"]);
        assert_eq!(finding.status, CheckStatus::Warning);
    }

    #[test]
    fn test_anomaly_invalid_price_checked_first() {
        // close=0 이면서 범위도 위반하지만 invalid_price 하나만 기록
        let bars = vec![
            flat(0, dec!(10)),
            bar_at(day(1), dec!(10), dec!(8), dec!(12), dec!(0)),
        ];
        assert_eq!(anomaly_types(&anomalies(&bars)), vec!["invalid_price"]);
    }

    #[test]
    fn test_anomaly_extreme_change_and_zero_volume() {
        let mut jump = flat(1, dec!(12.5));
        jump.volume = Decimal::ZERO;
        let bars = vec![flat(0, dec!(10)), jump, flat(2, dec!(12))];

        let finding = anomalies(&bars);
        assert_eq!(anomaly_types(&finding), vec!["extreme_change", "zero_volume"]);
        assert_eq!(finding.status, CheckStatus::Warning);
    }

    #[test]
    fn test_anomaly_twenty_percent_is_not_extreme() {
        let bars = vec![flat(0, dec!(10)), flat(1, dec!(12)), flat(2, dec!(9.6))];
        assert_eq!(anomalies(&bars).status, CheckStatus::Pass);
    }

    #[test]
    fn test_anomaly_insufficient_data() {
        let finding = anomalies(&[flat(0, dec!(10))]);
        assert_eq!(finding.status, CheckStatus::Warning);
    }

    #[test]
    fn test_anomaly_error_above_two() {
        let bars: Vec<Bar> = (0..4)
            .map(|n| {
                let mut b = flat(n, dec!(10));
                b.volume = Decimal::ZERO;
                b
            })
            .collect();
        assert_eq!(anomalies(&bars).status, CheckStatus::Error);
    }

    #[test]
    fn test_freshness_boundaries() {
        let now = day(10);
        assert_eq!(
            freshness(Some(now - Duration::hours(23)), now).status,
            CheckStatus::Pass
        );
        assert_eq!(
            freshness(Some(now - Duration::hours(25)), now).status,
            CheckStatus::Warning
        );
        assert_eq!(
            freshness(Some(now - Duration::hours(72)), now).status,
            CheckStatus::Warning
        );
        assert_eq!(
            freshness(Some(now - Duration::hours(73)), now).status,
            CheckStatus::Error
        );
        assert_eq!(freshness(None, now).status, CheckStatus::Error);
    }
}

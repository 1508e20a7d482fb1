//! 기술 지표 계산 (MA, MACD, RSI, KDJ, BOLL).
//!
//! 모든 계산은 `Decimal`로 수행하며, 결과 벡터는 입력과 같은 길이입니다.
//! 윈도우가 채워지기 전 구간은 `None`입니다.

use market_core::{Bar, Indicator, IndicatorKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// 저장 소수 자릿수
const OUTPUT_SCALE: u32 = 4;

/// 이동평균 기간.
pub const MA_PERIODS: [usize; 4] = [5, 10, 20, 60];

/// RSI 기간.
pub const RSI_PERIODS: [usize; 3] = [6, 12, 24];

/// MACD 파라미터.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MacdParams {
    /// 단기 EMA 기간 (기본: 12).
    pub fast_period: usize,
    /// 장기 EMA 기간 (기본: 26).
    pub slow_period: usize,
    /// 시그널 기간 (기본: 9).
    pub signal_period: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

/// MACD 결과.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdResult {
    /// DIF (단기 EMA - 장기 EMA)
    pub dif: Decimal,
    /// DEA (DIF의 EMA)
    pub dea: Decimal,
    /// 히스토그램: 2 × (DIF - DEA)
    pub hist: Decimal,
}

/// KDJ 파라미터.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KdjParams {
    /// RSV 기간 (기본: 9)
    pub period: usize,
    /// K 평활 (기본: 3)
    pub k_smooth: usize,
    /// D 평활 (기본: 3)
    pub d_smooth: usize,
}

impl Default for KdjParams {
    fn default() -> Self {
        Self {
            period: 9,
            k_smooth: 3,
            d_smooth: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KdjResult {
    pub k: Decimal,
    pub d: Decimal,
    pub j: Decimal,
}

/// 볼린저 밴드 파라미터.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BollParams {
    /// 기간 (기본: 20)
    pub period: usize,
    /// 표준편차 배수 (기본: 2)
    pub width: Decimal,
}

impl Default for BollParams {
    fn default() -> Self {
        Self {
            period: 20,
            width: dec!(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollResult {
    pub upper: Decimal,
    pub mid: Decimal,
    pub lower: Decimal,
}

/// 지표 계산기.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndicatorCalculator;

impl IndicatorCalculator {
    pub fn new() -> Self {
        Self
    }

    /// 단순 이동평균.
    pub fn sma(&self, values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
        if period == 0 {
            return vec![None; values.len()];
        }
        let divisor = Decimal::from(period);
        (0..values.len())
            .map(|i| {
                if i + 1 < period {
                    None
                } else {
                    let sum: Decimal = values[i + 1 - period..=i].iter().sum();
                    Some(sum / divisor)
                }
            })
            .collect()
    }

    /// 지수 이동평균 (`alpha = 2 / (span + 1)`, 첫 값으로 시작).
    pub fn ema(&self, values: &[Decimal], span: usize) -> Vec<Decimal> {
        let alpha = dec!(2) / Decimal::from(span + 1);
        self.ewm(values, alpha)
    }

    /// 재귀 지수 가중 평균: `y_t = alpha × x_t + (1 - alpha) × y_{t-1}`, `y_0 = x_0`.
    fn ewm(&self, values: &[Decimal], alpha: Decimal) -> Vec<Decimal> {
        let one_minus_alpha = Decimal::ONE - alpha;
        let mut result = Vec::with_capacity(values.len());
        let mut prev: Option<Decimal> = None;
        for &value in values {
            let next = match prev {
                None => value,
                Some(p) => value * alpha + p * one_minus_alpha,
            };
            result.push(next);
            prev = Some(next);
        }
        result
    }

    /// MACD. 장기 EMA와 시그널이 모두 채워진 뒤부터 값이 있습니다.
    pub fn macd(&self, closes: &[Decimal], params: MacdParams) -> Vec<Option<MacdResult>> {
        let fast = self.ema(closes, params.fast_period);
        let slow = self.ema(closes, params.slow_period);
        let dif: Vec<Decimal> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let dea = self.ema(&dif, params.signal_period);

        let warmup = params.slow_period + params.signal_period;
        (0..closes.len())
            .map(|i| {
                if i + 2 < warmup {
                    None
                } else {
                    Some(MacdResult {
                        dif: dif[i],
                        dea: dea[i],
                        hist: dec!(2) * (dif[i] - dea[i]),
                    })
                }
            })
            .collect()
    }

    /// RSI (상승폭/하락폭 단순 평균).
    pub fn rsi(&self, closes: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
        let mut result = vec![None; closes.len()];
        if period == 0 || closes.len() <= period {
            return result;
        }

        let changes: Vec<Decimal> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let divisor = Decimal::from(period);
        for i in period..closes.len() {
            let window = &changes[i - period..i];
            let gain: Decimal = window.iter().filter(|c| c.is_sign_positive()).sum();
            let loss: Decimal = window
                .iter()
                .filter(|c| c.is_sign_negative())
                .map(|c| c.abs())
                .sum();
            let avg_gain = gain / divisor;
            let avg_loss = loss / divisor;

            result[i] = if avg_loss.is_zero() {
                if avg_gain.is_zero() {
                    None
                } else {
                    Some(dec!(100))
                }
            } else {
                let rs = avg_gain / avg_loss;
                Some(dec!(100) - dec!(100) / (Decimal::ONE + rs))
            };
        }
        result
    }

    /// KDJ.
    ///
    /// `RSV = (C - LLV) / (HHV - LLV) × 100`, K/D는 `alpha = 1/평활` 재귀 평균,
    /// `J = 3K - 2D`. 고저가 같으면 RSV는 50으로 둡니다.
    pub fn kdj(
        &self,
        high: &[Decimal],
        low: &[Decimal],
        close: &[Decimal],
        params: KdjParams,
    ) -> Vec<Option<KdjResult>> {
        let len = close.len().min(high.len()).min(low.len());
        let mut result = vec![None; close.len()];
        if params.period == 0 || len < params.period {
            return result;
        }

        let first = params.period - 1;
        let rsv: Vec<Decimal> = (first..len)
            .map(|i| {
                let window = i + 1 - params.period..=i;
                let hhv = high[window.clone()].iter().copied().max().unwrap_or_default();
                let llv = low[window].iter().copied().min().unwrap_or_default();
                let range = hhv - llv;
                if range.is_zero() {
                    dec!(50)
                } else {
                    (close[i] - llv) / range * dec!(100)
                }
            })
            .collect();

        let k = self.ewm(&rsv, Decimal::ONE / Decimal::from(params.k_smooth.max(1)));
        let d = self.ewm(&k, Decimal::ONE / Decimal::from(params.d_smooth.max(1)));
        for (offset, (k, d)) in k.into_iter().zip(d).enumerate() {
            result[first + offset] = Some(KdjResult {
                k,
                d,
                j: dec!(3) * k - dec!(2) * d,
            });
        }
        result
    }

    /// 볼린저 밴드 (표본 표준편차).
    pub fn boll(&self, closes: &[Decimal], params: BollParams) -> Vec<Option<BollResult>> {
        let period = params.period;
        let mids = self.sma(closes, period);
        if period < 2 {
            return vec![None; closes.len()];
        }
        let ddof = Decimal::from(period - 1);

        mids.iter()
            .enumerate()
            .map(|(i, mid)| {
                let mid = (*mid)?;
                let variance: Decimal = closes[i + 1 - period..=i]
                    .iter()
                    .map(|c| (c - mid) * (c - mid))
                    .sum::<Decimal>()
                    / ddof;
                let band = params.width * sqrt_decimal(variance);
                Some(BollResult {
                    upper: mid + band,
                    mid,
                    lower: mid - band,
                })
            })
            .collect()
    }

    /// 봉 목록(시간 오름차순)에서 다섯 종류 지표를 계산합니다.
    ///
    /// 필드가 하나도 없는 시점은 결과에서 제외됩니다.
    pub fn compute_all(&self, bars: &[Bar]) -> Vec<Indicator> {
        let Some(first) = bars.first() else {
            return Vec::new();
        };
        let symbol = first.symbol.as_str();
        let venue = first.venue.as_str();

        let closes: Vec<Decimal> = bars.iter().map(|b| b.close).collect();
        let highs: Vec<Decimal> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<Decimal> = bars.iter().map(|b| b.low).collect();

        let ma: Vec<(String, Vec<Option<Decimal>>)> = MA_PERIODS
            .iter()
            .map(|p| (format!("ma{}", p), self.sma(&closes, *p)))
            .collect();
        let rsi: Vec<(String, Vec<Option<Decimal>>)> = RSI_PERIODS
            .iter()
            .map(|p| (format!("rsi{}", p), self.rsi(&closes, *p)))
            .collect();
        let macd = self.macd(&closes, MacdParams::default());
        let kdj = self.kdj(&highs, &lows, &closes, KdjParams::default());
        let boll = self.boll(&closes, BollParams::default());

        let mut out = Vec::new();
        for (i, bar) in bars.iter().enumerate() {
            let ts = bar.timestamp;
            let new = |kind| Indicator::new(symbol, venue, kind, ts);

            let mut ind = new(IndicatorKind::Ma);
            for (name, series) in &ma {
                if let Some(v) = series[i] {
                    ind.set(name.as_str(), round(v));
                }
            }
            out.push(ind);

            let mut ind = new(IndicatorKind::Rsi);
            for (name, series) in &rsi {
                if let Some(v) = series[i] {
                    ind.set(name.as_str(), round(v));
                }
            }
            out.push(ind);

            if let Some(m) = macd[i] {
                out.push(
                    new(IndicatorKind::Macd)
                        .with_field("macd", round(m.dif))
                        .with_field("macd_signal", round(m.dea))
                        .with_field("macd_hist", round(m.hist)),
                );
            }
            if let Some(k) = kdj[i] {
                out.push(
                    new(IndicatorKind::Kdj)
                        .with_field("k", round(k.k))
                        .with_field("d", round(k.d))
                        .with_field("j", round(k.j)),
                );
            }
            if let Some(b) = boll[i] {
                out.push(
                    new(IndicatorKind::Boll)
                        .with_field("boll_upper", round(b.upper))
                        .with_field("boll_mid", round(b.mid))
                        .with_field("boll_lower", round(b.lower)),
                );
            }
        }
        out.retain(|ind| !ind.is_empty());
        out
    }
}

fn round(value: Decimal) -> Decimal {
    value.round_dp(OUTPUT_SCALE).normalize()
}

/// Decimal 제곱근 (Newton-Raphson).
fn sqrt_decimal(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut x = value;
    let two = dec!(2);

    // 10회 반복이면 충분한 정밀도
    for _ in 0..10 {
        x = (x + value / x) / two;
    }

    x
}

//! Per-`(symbol, timeframe)` candle ring and its lazy indicator projection
//! (spec.md §4.3-§4.4), grounded on `services/bot/candles/candles.py`.

pub mod indicators;

use kestrel_markets::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use indicators::IndicatorView;

/// A single OHLCV bar (spec.md §3 `Candle`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    fn flat(timestamp: i64, price: Decimal) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ZERO,
        }
    }
}

/// The result of feeding one trade into [`CandlesAggregator::update`]
/// (spec.md §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickType {
    None,
    SameCandle,
    NewCandle,
    MissingCandle,
}

/// A bounded ring of candles for one `(symbol, timeframe)` pair.
#[derive(Debug)]
pub struct CandlesAggregator {
    timeframe: Timeframe,
    period_ms: i64,
    limit: usize,
    ring: Vec<Candle>,
}

impl CandlesAggregator {
    pub fn new(timeframe: Timeframe, limit: usize) -> Self {
        Self {
            timeframe,
            period_ms: timeframe.period_ms(),
            limit,
            ring: Vec::new(),
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn ring(&self) -> &[Candle] {
        &self.ring
    }

    pub fn last(&self) -> Option<&Candle> {
        self.ring.last()
    }

    fn push(&mut self, candle: Candle) {
        self.ring.push(candle);
        if self.ring.len() > self.limit {
            self.ring.remove(0);
        }
    }

    /// Loads historical candles, synthesizing flat gap candles between
    /// consecutive snapshot entries (spec.md §4.3 `set_snapshot`).
    pub fn set_snapshot(&mut self, mut candles: Vec<Candle>) {
        self.ring.clear();
        if candles.len() > self.limit {
            let start = candles.len() - self.limit;
            candles.drain(..start);
        }

        let mut iter = candles.into_iter().peekable();
        while let Some(prev) = iter.next() {
            self.push(prev);
            if let Some(cur) = iter.peek() {
                let missing = (cur.timestamp - prev.timestamp) / self.period_ms - 1;
                for n in 1..=missing.max(0) {
                    let gap_ts = prev.timestamp + self.period_ms * n;
                    self.push(Candle::flat(gap_ts, prev.close));
                }
            }
        }
    }

    /// Bucket `timestamp` to its half-hour-aligned bar-open (spec.md §4.3
    /// "bucket `trade.t` to its half-hour-aligned bar-open").
    fn half_hour_bucket(timestamp: i64) -> i64 {
        const HALF_HOUR_MS: i64 = 30 * 60 * 1000;
        timestamp - timestamp.rem_euclid(HALF_HOUR_MS)
    }

    /// Feeds one trade tick into the ring (spec.md §4.3 `update`).
    pub fn update(&mut self, price: Decimal, quantity: Decimal, timestamp: i64) -> TickType {
        let Some(last) = self.ring.last().copied() else {
            let bucket = Self::half_hour_bucket(timestamp);
            self.push(Candle::flat(bucket, price));
            return TickType::None;
        };

        let tick = if timestamp < last.timestamp + self.period_ms {
            let idx = self.ring.len() - 1;
            let candle = &mut self.ring[idx];
            candle.close = price;
            candle.volume += quantity;
            candle.high = candle.high.max(price);
            candle.low = candle.low.min(price);
            TickType::SameCandle
        } else if timestamp >= last.timestamp + 2 * self.period_ms {
            let missing = (timestamp - last.timestamp) / self.period_ms - 1;
            for n in 1..=missing.max(0) {
                let gap_ts = last.timestamp + self.period_ms * n;
                self.push(Candle::flat(gap_ts, last.close));
            }
            TickType::MissingCandle
        } else {
            let new_ts = last.timestamp + self.period_ms;
            self.push(Candle {
                timestamp: new_ts,
                open: price,
                high: price,
                low: price,
                close: price,
                volume: quantity,
            });
            TickType::NewCandle
        };

        tick
    }
}

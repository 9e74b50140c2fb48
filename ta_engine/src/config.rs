//! Indicator parameterization, validated at construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndicatorConfigError {
    #[error("{name} period must be at least 1, got {value}")]
    InvalidPeriod { name: &'static str, value: usize },

    #[error("Bollinger window must be at least 2 for a sample deviation, got {period}")]
    BollingerWindow { period: usize },

    #[error("Bollinger multiplier must be a positive finite number, got {value}")]
    BollingerMultiplier { value: f64 },

    #[error("MACD fast period ({fast}) must be shorter than the slow period ({slow})")]
    MacdOrdering { fast: usize, slow: usize },

    #[error("EMA cross needs a short period ({short}) below the long period ({long})")]
    EmaCrossOrdering { short: usize, long: usize },
}

/// MACD line/signal periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdConfig {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// Bollinger window and band width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerConfig {
    pub period: usize,
    pub std_mult: f64,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            period: 20,
            std_mult: 2.0,
        }
    }
}

/// Which EMA pair the crossover signal watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaCrossConfig {
    pub short: usize,
    pub long: usize,
}

impl Default for EmaCrossConfig {
    fn default() -> Self {
        Self { short: 9, long: 55 }
    }
}

/// Full indicator battery parameters.
///
/// Defaults match the production report configuration; call
/// [`IndicatorConfig::validate`] after deserializing hand-written config so
/// bad parameters fail the load, not the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub sma_periods: Vec<usize>,
    pub ema_periods: Vec<usize>,
    pub rsi_period: usize,
    pub macd: MacdConfig,
    pub bollinger: BollingerConfig,
    pub ema_cross: EmaCrossConfig,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma_periods: vec![20, 50, 200],
            ema_periods: vec![9, 21, 55, 200],
            rsi_period: 14,
            macd: MacdConfig::default(),
            bollinger: BollingerConfig::default(),
            ema_cross: EmaCrossConfig::default(),
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), IndicatorConfigError> {
        for &p in &self.sma_periods {
            if p == 0 {
                return Err(IndicatorConfigError::InvalidPeriod {
                    name: "SMA",
                    value: p,
                });
            }
        }
        for &p in &self.ema_periods {
            if p == 0 {
                return Err(IndicatorConfigError::InvalidPeriod {
                    name: "EMA",
                    value: p,
                });
            }
        }
        if self.rsi_period == 0 {
            return Err(IndicatorConfigError::InvalidPeriod {
                name: "RSI",
                value: self.rsi_period,
            });
        }
        if self.macd.fast == 0 || self.macd.slow == 0 || self.macd.signal == 0 {
            return Err(IndicatorConfigError::InvalidPeriod {
                name: "MACD",
                value: 0,
            });
        }
        if self.macd.fast >= self.macd.slow {
            return Err(IndicatorConfigError::MacdOrdering {
                fast: self.macd.fast,
                slow: self.macd.slow,
            });
        }
        if self.bollinger.period < 2 {
            return Err(IndicatorConfigError::BollingerWindow {
                period: self.bollinger.period,
            });
        }
        if !(self.bollinger.std_mult.is_finite() && self.bollinger.std_mult > 0.0) {
            return Err(IndicatorConfigError::BollingerMultiplier {
                value: self.bollinger.std_mult,
            });
        }
        if self.ema_cross.short == 0 || self.ema_cross.short >= self.ema_cross.long {
            return Err(IndicatorConfigError::EmaCrossOrdering {
                short: self.ema_cross.short,
                long: self.ema_cross.long,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(IndicatorConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_periods_fail_validation() {
        let mut cfg = IndicatorConfig::default();
        cfg.sma_periods = vec![20, 0];
        assert!(cfg.validate().is_err());

        let mut cfg = IndicatorConfig::default();
        cfg.rsi_period = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_macd_fails_validation() {
        let mut cfg = IndicatorConfig::default();
        cfg.macd = MacdConfig {
            fast: 26,
            slow: 12,
            signal: 9,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn degenerate_bollinger_window_fails_validation() {
        let mut cfg = IndicatorConfig::default();
        cfg.bollinger.period = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = IndicatorConfig::default();
        cfg.bollinger.std_mult = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_ema_cross_fails_validation() {
        let mut cfg = IndicatorConfig::default();
        cfg.ema_cross = EmaCrossConfig { short: 55, long: 9 };
        assert!(cfg.validate().is_err());
    }
}

//! Trade statistics and the final report.
//!
//! [`Stats`] is fed every closed position in close order and keeps:
//! - trade counts, gross profit and gross loss
//! - one [`MonthlyResult`] per calendar month of the close dates
//! - the balance after each close, for the drawdown

use std::fmt;

use chrono::Datelike;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::PercentCalculus;
use crate::engine::Position;

/// Trades closed in one calendar month.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyResult {
    /// Calendar year of the close dates.
    pub year: i32,
    /// 1 to 12.
    pub month: u32,
    /// Number of closed trades.
    pub total_trades: usize,
    /// Trades closed with a positive PnL.
    pub win_trades: usize,
    /// Trades closed with a zero or negative PnL.
    pub lost_trades: usize,
}

/// Share of winning trades.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WinRate {
    /// No trade was closed.
    NoTrades,
    /// Percentage of winning trades, in `[0, 100]`.
    Rate(f64),
}

impl fmt::Display for WinRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTrades => f.write_str("no trades"),
            Self::Rate(rate) => write!(f, "{rate:.2}%"),
        }
    }
}

/// Running trade statistics.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Stats {
    initial_balance: f64,
    total_trades: usize,
    win_trades: usize,
    lost_trades: usize,
    total_earned: f64,
    total_lost: f64,
    monthly: Vec<MonthlyResult>,
    balances: Vec<f64>,
}

impl Stats {
    /// Creates empty statistics.
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            total_trades: 0,
            win_trades: 0,
            lost_trades: 0,
            total_earned: 0.0,
            total_lost: 0.0,
            monthly: Vec::new(),
            balances: Vec::new(),
        }
    }

    /// Records a closed position and the account balance right after it.
    ///
    /// Open positions are ignored.
    pub fn record(&mut self, position: &Position, balance: f64) {
        let Some(closure) = position.closure() else {
            return;
        };
        let win = closure.pnl > 0.0;

        self.total_trades += 1;
        if win {
            self.win_trades += 1;
            self.total_earned += closure.pnl;
        } else {
            self.lost_trades += 1;
            self.total_lost += closure.pnl.abs();
        }
        self.balances.push(balance);

        let (year, month) = (closure.time.year(), closure.time.month());
        let index = match self.monthly.iter().position(|m| m.year == year && m.month == month) {
            Some(index) => index,
            None => {
                self.monthly.push(MonthlyResult {
                    year,
                    month,
                    total_trades: 0,
                    win_trades: 0,
                    lost_trades: 0,
                });
                self.monthly.len() - 1
            }
        };
        let entry = &mut self.monthly[index];
        entry.total_trades += 1;
        if win {
            entry.win_trades += 1;
        } else {
            entry.lost_trades += 1;
        }
    }

    /// Returns the number of closed trades.
    pub fn total_trades(&self) -> usize {
        self.total_trades
    }

    /// Returns the number of winning trades.
    pub fn win_trades(&self) -> usize {
        self.win_trades
    }

    /// Returns the number of losing trades.
    pub fn lost_trades(&self) -> usize {
        self.lost_trades
    }

    /// Returns the gross profit.
    pub fn total_earned(&self) -> f64 {
        self.total_earned
    }

    /// Returns the gross loss, as a positive amount.
    pub fn total_lost(&self) -> f64 {
        self.total_lost
    }

    /// Returns the net realized PnL.
    pub fn total_pnl(&self) -> f64 {
        self.total_earned - self.total_lost
    }

    /// Returns the monthly breakdown in order of first appearance.
    pub fn monthly(&self) -> &[MonthlyResult] {
        &self.monthly
    }

    /// Returns the win rate, or [`WinRate::NoTrades`].
    pub fn win_rate(&self) -> WinRate {
        let decided = self.win_trades + self.lost_trades;
        if decided == 0 {
            return WinRate::NoTrades;
        }
        WinRate::Rate(self.win_trades as f64 / decided as f64 * 100.0)
    }

    /// Computes the profit factor: gross profit over gross loss.
    ///
    /// `None` when nothing was lost.
    pub fn profit_factor(&self) -> Option<f64> {
        (self.total_lost > 0.0).then(|| self.total_earned / self.total_lost)
    }

    /// Computes the maximum drawdown of the closed-trade balances as a percentage.
    pub fn max_drawdown(&self) -> f64 {
        let mut max_peak = self.initial_balance;
        let mut max_drawdown = 0.0;

        for &balance in &self.balances {
            if balance > max_peak {
                max_peak = balance;
            }
            let drawdown = (max_peak - balance) / max_peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown * 100.0
    }

    /// Drops every recorded trade.
    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.initial_balance);
    }
}

/// Outcome of a simulation run.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Balance at the start of the run.
    pub initial_balance: f64,
    /// Balance at the end of the run, never below zero.
    pub final_balance: f64,
    /// `(final − initial) / initial × 100`.
    pub percent_change: f64,
    /// Number of closed trades.
    pub total_trades: usize,
    /// Trades closed with a positive PnL.
    pub win_trades: usize,
    /// Trades closed with a zero or negative PnL.
    pub lost_trades: usize,
    /// Share of winning trades.
    pub win_rate: WinRate,
    /// Net realized PnL.
    pub total_pnl: f64,
    /// Gross profit.
    pub total_earned: f64,
    /// Gross loss, as a positive amount.
    pub total_lost: f64,
    /// `None` when nothing was lost.
    pub profit_factor: Option<f64>,
    /// Percentage.
    pub max_drawdown: f64,
    /// Positions still open at the end; their stakes are not part of the final balance.
    pub open_positions: usize,
    /// The drawdown guard stopped the run early.
    pub halted: bool,
    /// Per-month breakdown in chronological order.
    pub monthly: Vec<MonthlyResult>,
}

impl Report {
    /// Builds the report from the statistics and the final account balance.
    pub fn new(stats: &Stats, balance: f64, open_positions: usize, halted: bool) -> Self {
        let final_balance = balance.max(0.0);
        Self {
            initial_balance: stats.initial_balance,
            final_balance,
            percent_change: stats.initial_balance.change(final_balance),
            total_trades: stats.total_trades(),
            win_trades: stats.win_trades(),
            lost_trades: stats.lost_trades(),
            win_rate: stats.win_rate(),
            total_pnl: stats.total_pnl(),
            total_earned: stats.total_earned(),
            total_lost: stats.total_lost(),
            profit_factor: stats.profit_factor(),
            max_drawdown: stats.max_drawdown(),
            open_positions,
            halted,
            monthly: stats.monthly().to_vec(),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Backtest Report ===")?;
        writeln!(f, "Initial Balance: {:.2}", self.initial_balance)?;
        writeln!(f, "Final Balance: {:.2}", self.final_balance)?;
        writeln!(f, "Gain/Loss: {:.2}%", self.percent_change)?;
        writeln!(f, "Total PnL: {:.2}", self.total_pnl)?;
        writeln!(
            f,
            "Trades: {} (won {}, lost {}, open {})",
            self.total_trades, self.win_trades, self.lost_trades, self.open_positions
        )?;
        writeln!(f, "Win Rate: {}", self.win_rate)?;
        match self.profit_factor {
            Some(factor) => writeln!(f, "Profit Factor: {factor:.2}")?,
            None => writeln!(f, "Profit Factor: n/a")?,
        }
        writeln!(f, "Max Drawdown: {:.2}%", self.max_drawdown)?;
        if self.halted {
            writeln!(f, "Stopped early by the drawdown guard")?;
        }

        if !self.monthly.is_empty() {
            writeln!(f)?;
            writeln!(f, "{:<8} | {:>6} | {:>4} | {:>4}", "Month", "Trades", "Won", "Lost")?;
            for month in &self.monthly {
                writeln!(
                    f,
                    "{:04}-{:02}  | {:>6} | {:>4} | {:>4}",
                    month.year, month.month, month.total_trades, month.win_trades, month.lost_trades
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PnlModel;
    use crate::engine::{Account, Candle, ExitReason, PositionManager};

    const DAY: i64 = 86_400_000;
    // 2024-01-01T00:00:00Z
    const JAN_1: i64 = 1_704_067_200_000;

    fn candle(time: i64, close: f64) -> Candle {
        Candle::try_from((time, close, close + 1.0, close - 1.0, close, 1.0)).unwrap()
    }

    /// Opens and closes one position, recording it.
    fn trade(
        stats: &mut Stats,
        manager: &mut PositionManager,
        account: &mut Account,
        close_time: i64,
        exit_price: f64,
    ) {
        let id = manager.open(&candle(close_time - 60_000, 100.0), account, 0.05, 0.15).unwrap();
        let position = manager
            .close(
                id,
                &candle(close_time, exit_price),
                exit_price,
                ExitReason::MacdCross,
                account,
                &PnlModel::Leveraged,
            )
            .unwrap();
        stats.record(&position, account.balance());
    }

    #[test]
    fn monthly_aggregation() {
        let mut account = Account::new(10_000.0, 1.0, 0.1).unwrap();
        let mut manager = PositionManager::new();
        let mut stats = Stats::new(10_000.0);

        trade(&mut stats, &mut manager, &mut account, JAN_1 + DAY, 110.0);
        trade(&mut stats, &mut manager, &mut account, JAN_1 + 20 * DAY, 90.0);
        // February
        trade(&mut stats, &mut manager, &mut account, JAN_1 + 35 * DAY, 105.0);

        assert_eq!(
            stats.monthly(),
            &[
                MonthlyResult {
                    year: 2024,
                    month: 1,
                    total_trades: 2,
                    win_trades: 1,
                    lost_trades: 1,
                },
                MonthlyResult {
                    year: 2024,
                    month: 2,
                    total_trades: 1,
                    win_trades: 1,
                    lost_trades: 0,
                },
            ]
        );
        assert_eq!(stats.total_trades(), 3);
        assert_eq!(stats.win_rate(), WinRate::Rate(2.0 / 3.0 * 100.0));
    }

    #[test]
    fn open_positions_are_not_recorded() {
        let mut account = Account::new(10_000.0, 1.0, 0.1).unwrap();
        let mut manager = PositionManager::new();
        let mut stats = Stats::new(10_000.0);

        let id = manager.open(&candle(JAN_1, 100.0), &mut account, 0.05, 0.15).unwrap();
        stats.record(manager.get(id).unwrap(), account.balance());
        assert_eq!(stats.total_trades(), 0);
    }

    #[test]
    fn zero_trades() {
        let stats = Stats::new(10_000.0);
        assert_eq!(stats.win_rate(), WinRate::NoTrades);
        assert_eq!(stats.profit_factor(), None);
        assert_eq!(stats.max_drawdown(), 0.0);

        let report = Report::new(&stats, 10_000.0, 0, false);
        assert_eq!(report.percent_change, 0.0);
        assert!(report.to_string().contains("Win Rate: no trades"));
    }

    #[test]
    fn profit_factor_and_drawdown() {
        let mut account = Account::new(1_000.0, 1.0, 0.5).unwrap();
        let mut manager = PositionManager::new();
        let mut stats = Stats::new(1_000.0);

        // stake 500, +20%: balance 1100
        trade(&mut stats, &mut manager, &mut account, JAN_1, 120.0);
        // stake 550, -20%: balance 990
        trade(&mut stats, &mut manager, &mut account, JAN_1 + DAY, 80.0);

        assert!((stats.profit_factor().unwrap() - 100.0 / 110.0).abs() < 1e-9);
        // (1100 - 990) / 1100
        assert!((stats.max_drawdown() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn report_clamps_balance() {
        let stats = Stats::new(100.0);
        let report = Report::new(&stats, -5.0, 0, true);
        assert_eq!(report.final_balance, 0.0);
        assert_eq!(report.percent_change, -100.0);
        assert!(report.halted);
    }
}

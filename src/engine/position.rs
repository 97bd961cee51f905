use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::PnlModel;
use crate::engine::{Account, Candle};
use crate::errors::{Error, Result};
use crate::signals::ExitDecision;

/// Sequential position identifier, starting at 1.
pub type PositionId = u32;

/// Why a position was closed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The candle body crossed the stop-loss price.
    StopLoss,
    /// The candle body crossed the take-profit price.
    TakeProfit,
    /// EMA crossed below SMA.
    EmaSmaCross,
    /// MACD crossed below its signal line.
    MacdCross,
    /// RSI above the overbought level.
    RsiOverbought,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::StopLoss => "stop-loss",
            Self::TakeProfit => "take-profit",
            Self::EmaSmaCross => "ema/sma cross",
            Self::MacdCross => "macd cross",
            Self::RsiOverbought => "rsi overbought",
        };
        f.write_str(reason)
    }
}

/// Terminal record of a closed position.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Closure {
    /// Open time of the candle that closed the position.
    pub time: DateTime<Utc>,
    /// Exit price.
    pub price: f64,
    /// Realized profit and loss.
    pub pnl: f64,
    /// Exit trigger.
    pub reason: ExitReason,
}

/// Lifecycle state: `Open -> Closed`, never reopened.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionStatus {
    /// Still exposed to the market.
    Open,
    /// Closed and settled.
    Closed(Closure),
}

/// A long position with fixed stop-loss and take-profit levels.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    id: PositionId,
    open_time: DateTime<Utc>,
    entry_price: f64,
    stake: f64,
    size: f64,
    stop_loss: f64,
    take_profit: f64,
    status: PositionStatus,
}

impl Position {
    pub(crate) fn new(
        id: PositionId,
        open_time: DateTime<Utc>,
        entry_price: f64,
        stake: f64,
        leverage: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Self {
        Self {
            id,
            open_time,
            entry_price,
            stake,
            size: stake * leverage,
            stop_loss,
            take_profit,
            status: PositionStatus::Open,
        }
    }

    /// Returns the identifier.
    pub fn id(&self) -> PositionId {
        self.id
    }

    /// Returns the open time.
    pub fn open_time(&self) -> DateTime<Utc> {
        self.open_time
    }

    /// Returns the entry price.
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Returns the quote-currency amount debited from the balance at entry.
    pub fn stake(&self) -> f64 {
        self.stake
    }

    /// Returns the leveraged notional (`stake × leverage`).
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Returns the stop-loss price.
    pub fn stop_loss(&self) -> f64 {
        self.stop_loss
    }

    /// Returns the take-profit price.
    pub fn take_profit(&self) -> f64 {
        self.take_profit
    }

    /// Returns the lifecycle state.
    pub fn status(&self) -> PositionStatus {
        self.status
    }

    /// Returns true while the position is open.
    pub fn is_open(&self) -> bool {
        matches!(self.status, PositionStatus::Open)
    }

    /// Returns the closure record, if closed.
    pub fn closure(&self) -> Option<&Closure> {
        match &self.status {
            PositionStatus::Closed(closure) => Some(closure),
            PositionStatus::Open => None,
        }
    }

    /// Returns the realized profit and loss, if closed.
    pub fn pnl(&self) -> Option<f64> {
        self.closure().map(|c| c.pnl)
    }

    /// Leveraged price-delta profit and loss at `price`.
    pub fn estimate_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price * self.size
    }

    /// Profit and loss realized when closing at `price` for `reason`.
    ///
    /// Indicator exits always realize the leveraged price delta; stop-loss and
    /// take-profit follow the configured model.
    pub fn realize(&self, price: f64, reason: ExitReason, model: &PnlModel) -> f64 {
        match (model, reason) {
            (PnlModel::FixedMultiple { .. }, ExitReason::StopLoss) => -self.stake,
            (PnlModel::FixedMultiple { take_profit_multiple }, ExitReason::TakeProfit) => {
                self.stake * take_profit_multiple - self.stake
            }
            _ => self.estimate_pnl(price),
        }
    }

    fn close(&mut self, closure: Closure) -> Result<()> {
        if !self.is_open() {
            return Err(Error::PositionClosed(self.id));
        }
        self.status = PositionStatus::Closed(closure);
        Ok(())
    }
}

/// Owns every position of a run and drives their lifecycle.
///
/// Positions live in an arena indexed by id; the open set keeps entry order so exits
/// are evaluated oldest first. Closed positions are kept for reporting only.
#[derive(Debug, Clone, Default)]
pub struct PositionManager {
    arena: Vec<Position>,
    open: Vec<PositionId>,
}

impl PositionManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the position with `id`.
    pub fn get(&self, id: PositionId) -> Option<&Position> {
        let index = (id as usize).checked_sub(1)?;
        self.arena.get(index)
    }

    /// Returns an iterator over every position ever opened, in id order.
    pub fn positions(&self) -> std::slice::Iter<'_, Position> {
        self.arena.iter()
    }

    /// Returns the open positions in entry order.
    pub fn open_positions(&self) -> Vec<&Position> {
        self.open.iter().filter_map(|id| self.get(*id)).collect()
    }

    /// Returns an iterator over the closed positions.
    pub fn closed_positions(&self) -> impl Iterator<Item = &Position> {
        self.arena.iter().filter(|p| !p.is_open())
    }

    /// Returns the number of open positions.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Returns the number of closed positions.
    pub fn closed_count(&self) -> usize {
        self.arena.len() - self.open.len()
    }

    /// Opens a long position at the candle close.
    ///
    /// The stake is `balance × risk_per_trade`; stop-loss and take-profit are placed at
    /// `stop_loss_pct` below and `take_profit_pct` above the entry and never move.
    ///
    /// ### Returns
    /// The id of the new position, or an error if the account cannot stake.
    pub fn open(
        &mut self,
        candle: &Candle,
        account: &mut Account,
        stop_loss_pct: f64,
        take_profit_pct: f64,
    ) -> Result<PositionId> {
        use crate::PercentCalculus;

        let entry_price = candle.close();
        let stake = account.next_stake();
        account.stake(stake)?;

        let id = self.arena.len() as PositionId + 1;
        let position = Position::new(
            id,
            candle.time(),
            entry_price,
            stake,
            account.leverage(),
            entry_price.subpercent(stop_loss_pct * 100.0),
            entry_price.addpercent(take_profit_pct * 100.0),
        );
        debug!(
            id,
            entry_price,
            stake,
            size = position.size(),
            stop_loss = position.stop_loss(),
            take_profit = position.take_profit(),
            "opened position"
        );
        self.arena.push(position);
        self.open.push(id);
        Ok(id)
    }

    /// Closes an open position and settles it on the account.
    ///
    /// ### Returns
    /// The closed position record.
    pub fn close(
        &mut self,
        id: PositionId,
        candle: &Candle,
        price: f64,
        reason: ExitReason,
        account: &mut Account,
        model: &PnlModel,
    ) -> Result<Position> {
        let slot = self.open.iter().position(|open| *open == id).ok_or(Error::PositionNotFound(id))?;
        let index = (id as usize).checked_sub(1).ok_or(Error::PositionNotFound(id))?;
        let position = self.arena.get_mut(index).ok_or(Error::PositionNotFound(id))?;

        let pnl = position.realize(price, reason, model);
        position.close(Closure {
            time: candle.time(),
            price,
            pnl,
            reason,
        })?;
        account.settle(position.stake(), pnl)?;
        self.open.remove(slot);

        debug!(id, price, pnl, %reason, balance = account.balance(), "closed position");
        Ok(*position)
    }

    /// Runs the per-candle exit check over every open position.
    ///
    /// For each position the stop-loss is checked first, then the take-profit (both
    /// against the candle body), then the indicator exit returned by `exit`.
    ///
    /// ### Returns
    /// The positions closed on this candle, in entry order.
    pub fn check<F>(
        &mut self,
        candle: &Candle,
        account: &mut Account,
        model: &PnlModel,
        mut exit: F,
    ) -> Result<Vec<Position>>
    where
        F: FnMut(&Position) -> ExitDecision,
    {
        let mut closed = Vec::new();
        for id in self.open.clone() {
            let position = *self.get(id).ok_or(Error::PositionNotFound(id))?;

            let trigger = if candle.brackets(position.stop_loss()) {
                Some((position.stop_loss(), ExitReason::StopLoss))
            } else if candle.brackets(position.take_profit()) {
                Some((position.take_profit(), ExitReason::TakeProfit))
            } else {
                exit(&position).reason().map(|reason| (candle.close(), reason))
            };

            if let Some((price, reason)) = trigger {
                closed.push(self.close(id, candle, price, reason, account, model)?);
            }
        }
        Ok(closed)
    }

    /// Drops every position.
    pub(crate) fn reset(&mut self) {
        self.arena.clear();
        self.open.clear();
    }
}

//! Strategy backtesting module.
//!
//! Drives the deterministic pipeline: signal generation, portfolio
//! simulation, performance analysis, result assembly.

mod engine;
mod metrics;
mod report;
mod simulator;

pub use engine::{BacktestConfig, BacktestEngine};
pub use metrics::{
    drawdown_periods, max_drawdown, monthly_returns, DrawdownPeriod, MonthlyReturn,
    PerformanceMetrics,
};
pub use report::{BacktestResult, PortfolioSummary, PositionStatus};
pub use simulator::{EquityPoint, PortfolioSimulator, PortfolioState, Position, Trade};

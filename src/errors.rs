pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Starting capital must be strictly positive.
    #[error("capital must be positive (got: {0})")]
    NonPositiveCapital(f64),

    /// Commission rate must be a finite, non-negative fraction of notional.
    #[error("commission rate must be a finite fraction >= 0 (got: {0})")]
    InvalidCommission(f64),

    /// An integer parameter (position cap, daily entry cap, exit horizon,
    /// ATR period) must be at least 1.
    #[error("{0} must be at least 1 (got: {1})")]
    ZeroCount(&'static str, usize),

    /// A fractional parameter (entry limit, profit target, position size)
    /// is not a finite fraction in a usable range.
    #[error("{0} must be a finite fraction (got: {1})")]
    InvalidFraction(&'static str, f64),

    /// The ATR multiplier scales the stop distance and cannot be negative.
    #[error("atr_multiplier must be finite and non-negative (got: {0})")]
    InvalidAtrMultiplier(f64),

    /// The exit priority must name each exit rule exactly once.
    #[error("exit priority must name each exit rule exactly once")]
    InvalidExitPriority,

    /// The backtest end date precedes the start date.
    #[error("end date {1} precedes start date {0}")]
    InvalidDateWindow(chrono::NaiveDate, chrono::NaiveDate),

    /// No symbol has any bar inside the backtest window.
    #[error("no trading dates between {0} and {1}")]
    EmptyCalendar(chrono::NaiveDate, chrono::NaiveDate),

    /// The price data contains no symbols. Simulating requires at least one.
    #[error("price data is empty: the simulation requires at least one symbol")]
    MarketDataEmpty,

    /// A price series was constructed without any bars.
    #[error("price series is empty: a series requires at least one bar")]
    EmptySeries,

    /// Bars must be strictly ascending by date, with no duplicates.
    #[error("price series is not strictly ascending at {0}")]
    NonAscendingSeries(chrono::NaiveDate),

    /// A second pending order was placed for a symbol that already has one.
    #[error("pending order already exists for {0}")]
    DuplicateOrder(String),

    /// A second position was opened for a symbol that already has one.
    #[error("position already open for {0}")]
    DuplicatePosition(String),

    /// A close was requested for a symbol with no open position.
    #[error("no open position for {0}")]
    PositionNotFound(String),

    /// I/O error occurred.
    // utils.rs
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

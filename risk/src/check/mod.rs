mod lot_size;
mod min_notional;

pub use lot_size::{LotSizeCheck, LotSizeError};
pub use min_notional::{MinNotionalCheck, MinNotionalError};

/// General interface for a single pre-trade risk check.
///
/// See [`MinNotionalCheck`] for a concrete example.
pub trait RiskCheck {
    type Input;
    type Error;

    /// Returns the name of the risk check, used in log lines.
    fn name() -> &'static str;

    /// Performs the check against `input`, returning `Err` with a reason on
    /// failure.
    fn check(&self, input: &Self::Input) -> Result<(), Self::Error>;
}

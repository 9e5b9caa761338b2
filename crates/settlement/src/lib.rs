//! `ffmarket-settlement` — payout ledger domain.
//!
//! Pure settlement logic: sale lifecycle, pending-balance aggregation, payout
//! batch validation, and the weekly disbursement schedule. Storage and
//! transaction boundaries live in `ffmarket-infra`.

pub mod balance;
pub mod payout;
pub mod sale;
pub mod schedule;

pub use balance::{due_partners, pending_balance, PartnerBalance};
pub use payout::{validate_batch, Payout, PayoutMethod, PayoutStatus};
pub use sale::{Sale, SaleStatus};
pub use schedule::next_payout_date;

/// Minimum pending balance (minor units) at which a disbursement is offered.
///
/// An explicit manual payout may still process a smaller amount; the threshold
/// only gates what `due_partners` lists by default.
pub const DEFAULT_PAYOUT_THRESHOLD: ffmarket_core::Amount =
    ffmarket_core::Amount::from_minor(2500);

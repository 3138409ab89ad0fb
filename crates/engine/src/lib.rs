//! Customer reward redemption.
//!
//! A walk-in customer scans a branch-issued token, registers, optionally
//! passes the review gate, and spins a wheel whose outcome is decided by the
//! reward backend. The wheel only visualizes that outcome; the voucher is
//! issued when the wheel has visually stopped.
//!
//! The backend is reached only through [`RewardBackend`] and
//! [`AddressLookup`]; see the `client` crate for the HTTP implementation.

pub use backend::{AddressLookup, NoAddressLookup, RewardBackend};
pub use deeplink::{DeepLink, Token};
pub use error::{BackendError, ErrorKind, FlowError, SessionError, WheelError};
pub use events::SessionEvent;
pub use fraud::DAILY_SPIN_CAP;
pub use identity::{FormError, Phone, RegistrationForm};
pub use review::ReviewGate;
pub use session::{PlayAttempt, Session, SessionOptions, SessionWarning, Stage};
pub use voucher::{ShareOutcome, ShareReceipt, ShareSurface, Voucher, VoucherArtifact};
pub use wheel::{SpinPlan, Wheel};

mod backend;
pub mod deeplink;
mod error;
mod events;
pub mod fraud;
pub mod identity;
mod review;
mod session;
pub mod voucher;
pub mod wheel;

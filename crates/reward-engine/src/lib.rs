//! Task completion and reward settlement.
//!
//! Components receive only the store capabilities they need:
//! [`Settlement`] settles completions and pays referral bonuses,
//! [`TaskCatalog`] creates and lists tasks, [`ReferralResolver`] links users
//! to their referrers. Persistence lives behind the traits in [`store`].

pub mod catalog;
pub mod error;
pub mod policy;
pub mod referral;
pub mod settlement;
pub mod store;

#[cfg(test)]
mod memory;

pub use catalog::{MAX_TASK_PRICE, TaskCatalog};
pub use error::EngineError;
pub use policy::compute_referral_bonus;
pub use referral::ReferralResolver;
pub use settlement::{ReferralPayout, Settled, Settlement};
pub use store::{CompletionStore, StoreError, TaskStore, UnitOfWork, UserStore};

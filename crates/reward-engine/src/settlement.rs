//! Settles task completions.
//!
//! A completion moves through `Validating -> Settling -> Committed`. Missing
//! entities end in `Rejected` before anything is written; a store failure while
//! settling ends in `Failed` with the unit of work rolled back. Only after the
//! commit does the post-commit hook pay the referral bonus, and nothing it does
//! can fail the settlement.

use std::sync::Arc;

use reward_types::{Task, TaskId, User, UserId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::policy::compute_referral_bonus;
use crate::referral::ReferralResolver;
use crate::store::{CompletionStore, StoreError, TaskStore, UserStore};

/// Outcome of a successful settlement. The worker was always paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub user_id: UserId,
    pub task_id: TaskId,
    pub credited: i64,
    pub referral: ReferralPayout,
}

/// What the post-commit hook did. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferralPayout {
    NotReferred,
    Paid { referrer: UserId, bonus: i64 },
    ReferrerMissing(UserId),
    Failed(UserId),
    /// Cancelled between commit and payout.
    Skipped,
}

pub struct Settlement {
    users: Arc<dyn UserStore>,
    tasks: Arc<dyn TaskStore>,
    completions: Arc<dyn CompletionStore>,
    referrals: ReferralResolver,
}

impl Settlement {
    pub fn new(
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        completions: Arc<dyn CompletionStore>,
        referrals: ReferralResolver,
    ) -> Self {
        Self {
            users,
            tasks,
            completions,
            referrals,
        }
    }

    /// Records that `user_id` completed `task_id` and pays them the task price.
    ///
    /// `cancel` is checked between steps. Cancellation before the commit rolls
    /// the unit back and returns `Cancelled`; after the commit it only skips
    /// the referral payout.
    pub fn complete_task(
        &self,
        user_id: UserId,
        task_id: TaskId,
        cancel: &CancellationToken,
    ) -> Result<Settled, EngineError> {
        checkpoint(cancel)?;

        let (user, task) = self.validate(user_id, task_id)?;

        checkpoint(cancel)?;

        self.settle(&user, &task, cancel)?;
        info!(user_id = %user_id, task_id = %task_id, price = task.price, "Task settled");

        let referral = if cancel.is_cancelled() {
            warn!(user_id = %user_id, task_id = %task_id, "Cancelled after commit, referral payout skipped");
            ReferralPayout::Skipped
        } else {
            self.pay_referral_bonus(&user, &task)
        };

        Ok(Settled {
            user_id,
            task_id,
            credited: task.price,
            referral,
        })
    }

    /// Advisory existence checks. The unique key on completions is what
    /// actually guards against double settlement.
    fn validate(&self, user_id: UserId, task_id: TaskId) -> Result<(User, Task), EngineError> {
        let task = self.tasks.get_task(task_id).map_err(|e| {
            debug!(task_id = %task_id, "Completion rejected: {}", e);
            EngineError::from(e)
        })?;
        let user = self.users.get_user(user_id).map_err(|e| {
            debug!(user_id = %user_id, "Completion rejected: {}", e);
            EngineError::from(e)
        })?;
        Ok((user, task))
    }

    /// One atomic unit: record the completion, credit the price, commit.
    /// Every early return drops the unit, which rolls it back.
    fn settle(&self, user: &User, task: &Task, cancel: &CancellationToken) -> Result<(), EngineError> {
        let mut unit = self.completions.begin()?;

        match unit.record_completion(user.id, task.id) {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                info!(user_id = %user.id, task_id = %task.id, "Task already completed");
                return Err(EngineError::Conflict("already completed".into()));
            }
            Err(e) => return Err(failed(user, task, e)),
        }

        unit.adjust_balance(user.id, task.price)
            .map_err(|e| failed(user, task, e))?;

        checkpoint(cancel)?;

        unit.commit().map_err(|e| failed(user, task, e))
    }

    /// Post-commit hook. Every failure is logged and swallowed.
    fn pay_referral_bonus(&self, user: &User, task: &Task) -> ReferralPayout {
        let Some(referrer_id) = self.referrals.resolve_referrer(user) else {
            return ReferralPayout::NotReferred;
        };

        match self.users.get_user(referrer_id) {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {
                warn!(user_id = %user.id, referrer_id = %referrer_id, "Referrer not found, no bonus paid");
                return ReferralPayout::ReferrerMissing(referrer_id);
            }
            Err(e) => {
                error!(user_id = %user.id, referrer_id = %referrer_id, "Failed to load referrer: {:#}", e);
                return ReferralPayout::Failed(referrer_id);
            }
        }

        let bonus = compute_referral_bonus(task.price);
        match self.users.adjust_balance(referrer_id, bonus) {
            Ok(()) => {
                info!(referrer_id = %referrer_id, user_id = %user.id, bonus, "Referral bonus paid");
                ReferralPayout::Paid {
                    referrer: referrer_id,
                    bonus,
                }
            }
            Err(StoreError::NotFound(_)) => {
                warn!(referrer_id = %referrer_id, "Referrer vanished before bonus credit");
                ReferralPayout::ReferrerMissing(referrer_id)
            }
            Err(e) => {
                error!(referrer_id = %referrer_id, bonus, "Failed to credit referral bonus: {:#}", e);
                ReferralPayout::Failed(referrer_id)
            }
        }
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), EngineError> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    Ok(())
}

fn failed(user: &User, task: &Task, err: StoreError) -> EngineError {
    error!(user_id = %user.id, task_id = %task.id, "Settlement failed, rolled back: {}", err);
    EngineError::from(err)
}

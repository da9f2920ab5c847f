//! In-memory store with failure injection, for engine tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use reward_types::{NewTask, NewUser, Task, TaskId, User, UserId};
use tokio_util::sync::CancellationToken;

use crate::store::{CompletionStore, StoreError, TaskStore, UnitOfWork, UserStore};

#[derive(Default, Clone)]
struct State {
    users: BTreeMap<UserId, User>,
    tasks: BTreeMap<TaskId, Task>,
    completions: BTreeMap<(UserId, TaskId), DateTime<Utc>>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    /// Balance credits inside a unit of work fail.
    pub fail_unit_credit: AtomicBool,
    /// `commit` fails.
    pub fail_commit: AtomicBool,
    /// Balance credits outside a unit of work (referral payouts) fail.
    pub fail_direct_credit: AtomicBool,
    /// Cancelled when a unit of work credits a balance, before its commit.
    pub cancel_on_unit_credit: Mutex<Option<CancellationToken>>,
    /// Cancelled right after a unit of work commits.
    pub cancel_after_commit: Mutex<Option<CancellationToken>>,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn seed_user(&self, username: &str, refer_from: Option<UserId>) -> UserId {
        let mut state = self.state();
        let id = UserId(state.next_id());
        state.users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                password_hash: "hash".to_string(),
                email: format!("{username}@example.com"),
                balance: 0,
                refer_code: Some(format!("code-{username}")),
                refer_from,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn seed_task(&self, title: &str, price: i64) -> TaskId {
        let mut state = self.state();
        let id = TaskId(state.next_id());
        state.tasks.insert(
            id,
            Task {
                id,
                title: title.to_string(),
                description: String::new(),
                price,
            },
        );
        id
    }

    pub fn balance(&self, id: UserId) -> i64 {
        self.state().users[&id].balance
    }

    pub fn completion_count(&self) -> usize {
        self.state().completions.len()
    }
}

impl UserStore for MemoryStore {
    fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        self.state()
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn find_by_refer_code(&self, refer_code: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| u.refer_code.as_deref() == Some(refer_code))
            .cloned())
    }

    fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        Ok(self
            .state()
            .users
            .values()
            .any(|u| u.username == username || u.email == email))
    }

    fn create_user(&self, user: &NewUser) -> Result<UserId, StoreError> {
        if self.username_or_email_taken(&user.username, &user.email)? {
            return Err(StoreError::Conflict("user already exists".into()));
        }
        let mut state = self.state();
        let id = UserId(state.next_id());
        state.users.insert(
            id,
            User {
                id,
                username: user.username.clone(),
                password_hash: user.password_hash.clone(),
                email: user.email.clone(),
                balance: 0,
                refer_code: Some(user.refer_code.clone()),
                refer_from: None,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn adjust_balance(&self, id: UserId, delta: i64) -> Result<(), StoreError> {
        if self.fail_direct_credit.load(Ordering::SeqCst) {
            return Err(StoreError::Internal(anyhow!("injected credit failure")));
        }
        let mut state = self.state();
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;
        user.balance = user.balance.checked_add(delta).ok_or(StoreError::Overflow(id))?;
        Ok(())
    }

    fn link_referrer(&self, id: UserId, referrer: UserId) -> Result<bool, StoreError> {
        let mut state = self.state();
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;
        if user.refer_from.is_some() {
            return Ok(false);
        }
        user.refer_from = Some(referrer);
        Ok(true)
    }

    fn leaderboard(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.state().users.values().cloned().collect();
        users.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.id.cmp(&b.id)));
        Ok(users)
    }
}

impl TaskStore for MemoryStore {
    fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        self.state()
            .tasks
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("task"))
    }

    fn exists_with_content(&self, title: &str, description: &str) -> Result<bool, StoreError> {
        Ok(self
            .state()
            .tasks
            .values()
            .any(|t| t.title == title && t.description == description))
    }

    fn insert_task(&self, task: &NewTask) -> Result<TaskId, StoreError> {
        if self.exists_with_content(&task.title, &task.description)? {
            return Err(StoreError::Conflict("duplicate task".into()));
        }
        let mut state = self.state();
        let id = TaskId(state.next_id());
        state.tasks.insert(
            id,
            Task {
                id,
                title: task.title.clone(),
                description: task.description.clone(),
                price: task.price,
            },
        );
        Ok(id)
    }

    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.state().tasks.values().cloned().collect())
    }
}

impl CompletionStore for MemoryStore {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError> {
        let guard = self.state();
        let staged = guard.clone();
        Ok(Box::new(MemoryUnit {
            guard,
            staged,
            store: self,
        }))
    }

    fn count_for_user(&self, id: UserId) -> Result<u64, StoreError> {
        Ok(self
            .state()
            .completions
            .keys()
            .filter(|(user_id, _)| *user_id == id)
            .count() as u64)
    }
}

/// Stages writes on a copy of the state; only `commit` publishes them.
struct MemoryUnit<'a> {
    guard: MutexGuard<'a, State>,
    staged: State,
    store: &'a MemoryStore,
}

impl UnitOfWork for MemoryUnit<'_> {
    fn record_completion(&mut self, user_id: UserId, task_id: TaskId) -> Result<(), StoreError> {
        if self.staged.completions.contains_key(&(user_id, task_id)) {
            return Err(StoreError::Conflict("task already completed".into()));
        }
        self.staged.completions.insert((user_id, task_id), Utc::now());
        Ok(())
    }

    fn adjust_balance(&mut self, user_id: UserId, delta: i64) -> Result<(), StoreError> {
        if self.store.fail_unit_credit.load(Ordering::SeqCst) {
            return Err(StoreError::Internal(anyhow!("injected balance failure")));
        }
        let user = self
            .staged
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound("user"))?;
        user.balance = user
            .balance
            .checked_add(delta)
            .ok_or(StoreError::Overflow(user_id))?;
        fire(&self.store.cancel_on_unit_credit);
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.store.fail_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Internal(anyhow!("injected commit failure")));
        }
        let MemoryUnit {
            mut guard,
            staged,
            store,
        } = *self;
        *guard = staged;
        drop(guard);
        fire(&store.cancel_after_commit);
        Ok(())
    }
}

fn fire(hook: &Mutex<Option<CancellationToken>>) {
    if let Some(token) = hook.lock().unwrap().as_ref() {
        token.cancel();
    }
}

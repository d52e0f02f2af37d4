//! 内存存储实现

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::model::{NewUser, User, UserId, UserPatch};
use super::store::{StoreError, UserStore, EMAIL_UNIQUE_CONSTRAINT};

/// 进程内的用户表
///
/// 唯一性检查和写入在同一次加锁内完成，并发创建同一 email 时只有一个成功。
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: UserId,
    users: BTreeMap<UserId, User>,
}

impl MemoryState {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|user| user.email == email && Some(user.id) != except)
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

fn unique_violation() -> StoreError {
    StoreError::UniqueViolation {
        constraint: EMAIL_UNIQUE_CONSTRAINT.to_string(),
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut state = self.lock()?;
        if state.email_taken(&new_user.email, None) {
            return Err(unique_violation());
        }

        let id = state
            .last_id
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend("user id sequence exhausted".to_string()))?;
        state.last_id = id;

        let now = Utc::now();
        let user = User {
            id,
            name: new_user.name,
            email: new_user.email,
            age: new_user.age,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn select_all(&self) -> Result<Vec<User>, StoreError> {
        let state = self.lock()?;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(users)
    }

    async fn select_by_id(&self, id: UserId) -> Result<User, StoreError> {
        let state = self.lock()?;
        state.users.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, user: User) -> Result<User, StoreError> {
        let mut state = self.lock()?;
        if state.email_taken(&user.email, Some(user.id)) {
            return Err(unique_violation());
        }

        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or(StoreError::NotFound(user.id))?;
        stored.name = user.name;
        stored.email = user.email;
        stored.age = user.age;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn update_fields(&self, id: UserId, patch: UserPatch) -> Result<User, StoreError> {
        let mut state = self.lock()?;
        let mut user = state.users.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        patch.apply_to(&mut user);
        if state.email_taken(&user.email, Some(id)) {
            return Err(unique_violation());
        }

        user.updated_at = Utc::now();
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn delete_by_id(&self, id: UserId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.users.remove(&id).map(|_| ()).ok_or(StoreError::NotFound(id))
    }
}

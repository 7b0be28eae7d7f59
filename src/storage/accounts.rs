use chrono::Utc;

use super::db::{email_key, Database, StoreError, UnitOfWork};
use super::models::{Account, NewAccount};
use super::tables::*;

impl Database {
    // ========================================================================
    // Credential operations
    // ========================================================================

    /// Create an account. Username and email must both be unused.
    pub fn create_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        let uow = self.begin_unit_of_work()?;
        let account = insert_account(&uow, new)?;
        uow.commit()?;

        tracing::debug!(account_id = account.id, username = %account.username, "Created account");
        Ok(account)
    }

    /// Create `new` only if no account exists yet. Check and insert share one
    /// write transaction, so two first logins cannot both succeed.
    pub fn create_first_account(&self, new: NewAccount) -> Result<Option<Account>, StoreError> {
        let uow = self.begin_unit_of_work()?;
        if uow.count(ACCOUNTS)? > 0 {
            return Ok(None);
        }
        let account = insert_account(&uow, new)?;
        uow.commit()?;

        tracing::info!(account_id = account.id, username = %account.username, "Created first account on login");
        Ok(Some(account))
    }

    pub fn get_account(&self, id: u64) -> Result<Account, StoreError> {
        self.fetch(ACCOUNTS, id)?.ok_or(StoreError::NotFound("Account"))
    }

    pub fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        match self.lookup(ACCOUNT_USERNAMES, username.trim())? {
            Some(id) => Ok(self.fetch(ACCOUNTS, id)?),
            None => Ok(None),
        }
    }

    /// All accounts, optionally only the active ones
    pub fn list_accounts(&self, active_only: bool) -> Result<Vec<Account>, StoreError> {
        let accounts: Vec<Account> = self.scan(ACCOUNTS)?;
        Ok(accounts
            .into_iter()
            .filter(|a| !active_only || a.is_active)
            .collect())
    }

    /// The only mutable field of an account
    pub fn set_account_active(&self, id: u64, is_active: bool) -> Result<Account, StoreError> {
        let uow = self.begin_unit_of_work()?;
        let mut account: Account = uow
            .load(ACCOUNTS, id)?
            .ok_or(StoreError::NotFound("Account"))?;
        account.is_active = is_active;
        uow.store(ACCOUNTS, id, &account)?;
        uow.commit()?;

        tracing::debug!(account_id = id, is_active, "Changed account activation");
        Ok(account)
    }

    pub fn delete_account(&self, id: u64) -> Result<(), StoreError> {
        let uow = self.begin_unit_of_work()?;
        let account: Account = uow
            .load(ACCOUNTS, id)?
            .ok_or(StoreError::NotFound("Account"))?;

        uow.delete(ACCOUNTS, id)?;
        uow.unlink(ACCOUNT_USERNAMES, &account.username)?;
        uow.unlink(ACCOUNT_EMAILS, &email_key(&account.email))?;
        uow.commit()?;

        tracing::debug!(account_id = id, "Deleted account");
        Ok(())
    }
}

fn insert_account(uow: &UnitOfWork, new: NewAccount) -> Result<Account, StoreError> {
    let username = new.username.trim().to_string();
    let key = email_key(&new.email);

    if uow.lookup(ACCOUNT_USERNAMES, &username)?.is_some() {
        return Err(StoreError::Conflict(
            "Username already registered".to_string(),
        ));
    }
    if uow.lookup(ACCOUNT_EMAILS, &key)?.is_some() {
        return Err(StoreError::Conflict("Email already registered".to_string()));
    }

    let account = Account {
        created_at: Utc::now(),
        email: new.email.trim().to_string(),
        id: uow.next_id("accounts")?,
        is_active: true,
        password_hash: new.password_hash,
        username,
    };

    uow.store(ACCOUNTS, account.id, &account)?;
    uow.link(ACCOUNT_USERNAMES, &account.username, account.id)?;
    uow.link(ACCOUNT_EMAILS, &key, account.id)?;
    Ok(account)
}

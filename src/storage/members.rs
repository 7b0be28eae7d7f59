use chrono::Utc;

use super::db::{email_key, Database, StoreError};
use super::models::{Member, MemberFilter, MemberPatch, MemberStats, MemberStatus, NewMember};
use super::tables::*;

impl Database {
    // ========================================================================
    // Membership operations
    // ========================================================================

    /// Register a member. Emails are unique regardless of case.
    pub fn create_member(&self, new: NewMember) -> Result<Member, StoreError> {
        let uow = self.begin_unit_of_work()?;
        let key = email_key(&new.email);
        if uow.lookup(MEMBER_EMAILS, &key)?.is_some() {
            return Err(StoreError::Conflict(
                "Member with this email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let member = Member {
            active_loan_count: 0,
            created_at: now,
            email: new.email.trim().to_string(),
            id: uow.next_id("members")?,
            joined_at: now,
            membership_type: new.membership_type,
            name: new.name,
            phone: new.phone,
            status: new.status,
            updated_at: now,
        };

        uow.store(MEMBERS, member.id, &member)?;
        uow.link(MEMBER_EMAILS, &key, member.id)?;
        uow.commit()?;

        tracing::debug!(member_id = member.id, "Created member");
        Ok(member)
    }

    pub fn get_member(&self, id: u64) -> Result<Member, StoreError> {
        self.fetch(MEMBERS, id)?.ok_or(StoreError::NotFound("Member"))
    }

    /// All members matching the filter, in id order
    pub fn list_members(&self, filter: &MemberFilter) -> Result<Vec<Member>, StoreError> {
        let members: Vec<Member> = self.scan(MEMBERS)?;
        Ok(members.into_iter().filter(|m| filter.matches(m)).collect())
    }

    /// Apply a partial update. The loan counter is not part of the patch.
    pub fn update_member(&self, id: u64, patch: MemberPatch) -> Result<Member, StoreError> {
        let uow = self.begin_unit_of_work()?;
        let current: Member = uow
            .load(MEMBERS, id)?
            .ok_or(StoreError::NotFound("Member"))?;

        let mut member = current.clone();
        if let Some(email) = patch.email {
            let old_key = email_key(&current.email);
            let new_key = email_key(&email);
            if new_key != old_key {
                if !uow.claim(MEMBER_EMAILS, &new_key, id)? {
                    return Err(StoreError::Conflict(
                        "Member with this email already exists".to_string(),
                    ));
                }
                uow.unlink(MEMBER_EMAILS, &old_key)?;
            }
            member.email = email.trim().to_string();
        }
        if let Some(name) = patch.name {
            member.name = name;
        }
        if let Some(phone) = patch.phone {
            member.phone = phone;
        }
        if let Some(membership_type) = patch.membership_type {
            member.membership_type = membership_type;
        }
        if let Some(status) = patch.status {
            member.status = status;
        }
        member.updated_at = Utc::now();

        uow.store(MEMBERS, id, &member)?;
        uow.commit()?;

        tracing::debug!(member_id = id, "Updated member");
        Ok(member)
    }

    /// Remove a member. Members holding loans cannot be removed.
    pub fn delete_member(&self, id: u64) -> Result<(), StoreError> {
        let uow = self.begin_unit_of_work()?;
        let member: Member = uow
            .load(MEMBERS, id)?
            .ok_or(StoreError::NotFound("Member"))?;

        if member.active_loan_count > 0 {
            return Err(StoreError::Conflict(
                "Member has active loans and cannot be deleted".to_string(),
            ));
        }

        uow.delete(MEMBERS, id)?;
        uow.unlink(MEMBER_EMAILS, &email_key(&member.email))?;
        uow.commit()?;

        tracing::debug!(member_id = id, "Deleted member");
        Ok(())
    }

    pub fn member_stats(&self) -> Result<MemberStats, StoreError> {
        let members: Vec<Member> = self.scan(MEMBERS)?;
        let mut stats = MemberStats {
            total_members: members.len() as u64,
            ..Default::default()
        };
        for member in &members {
            match member.status {
                MemberStatus::Active => stats.active += 1,
                MemberStatus::Expired => stats.expired += 1,
                MemberStatus::Inactive => stats.inactive += 1,
            }
        }
        Ok(stats)
    }
}

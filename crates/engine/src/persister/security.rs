use std::mem;

use hearth_core::model::{SecurityRole, SecurityUser};
use hearth_core::{Key, ModelType};
use hearth_storage::mapper::{SecurityRoleMapping, SecurityUserMapping, SecurityUserRoleMapping};
use hearth_storage::{TableMap, tables};

use super::{Persister, fetch, obsolete_stored, required_key, sync};
use crate::cache::LoadDepth;
use crate::context::DataContext;
use crate::error::EngineError;
use crate::persistence::{base, hydrate, identified};

#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityRolePersister;

impl Persister for SecurityRolePersister {
    type Model = SecurityRole;

    fn model_type(&self) -> ModelType {
        ModelType::SecurityRole
    }

    fn query_table(&self) -> &'static TableMap {
        &tables::SECURITY_ROLE
    }

    fn insert(&self, ctx: &DataContext<'_>, mut role: SecurityRole) -> Result<SecurityRole, EngineError> {
        ctx.in_transaction(|ctx| {
            let key = identified::assign_key(&mut role);
            ctx.touch(key)?;
            base::insert::<SecurityRoleMapping>(ctx, &mut role)?;
            ctx.forget(key);
            Ok(role)
        })
    }

    fn update(&self, ctx: &DataContext<'_>, mut role: SecurityRole) -> Result<SecurityRole, EngineError> {
        let key = required_key(&role, ModelType::SecurityRole)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            let existing = identified::load_existing::<SecurityRoleMapping>(ctx, key)?;
            base::update::<SecurityRoleMapping>(ctx, &mut role, &existing)?;
            ctx.forget(key);
            Ok(role)
        })
    }

    fn obsolete(&self, ctx: &DataContext<'_>, role: SecurityRole) -> Result<SecurityRole, EngineError> {
        let key = required_key(&role, ModelType::SecurityRole)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            obsolete_stored::<SecurityRoleMapping>(ctx, key, &role.meta, base::obsolete::<SecurityRoleMapping>)?;
            ctx.forget(key);
            self.get(ctx, key)
        })
    }

    fn load(&self, ctx: &DataContext<'_>, key: Key, depth: LoadDepth) -> Result<Option<SecurityRole>, EngineError> {
        hydrate(
            ctx,
            key,
            depth,
            |ctx| identified::load::<SecurityRoleMapping>(ctx, key),
            |_, _| Ok(()),
        )
    }
}

/// Users and their role memberships.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityUserPersister;

impl Persister for SecurityUserPersister {
    type Model = SecurityUser;

    fn model_type(&self) -> ModelType {
        ModelType::SecurityUser
    }

    fn query_table(&self) -> &'static TableMap {
        &tables::SECURITY_USER
    }

    fn insert(&self, ctx: &DataContext<'_>, mut user: SecurityUser) -> Result<SecurityUser, EngineError> {
        ctx.in_transaction(|ctx| {
            let key = identified::assign_key(&mut user);
            ctx.touch(key)?;
            base::insert::<SecurityUserMapping>(ctx, &mut user)?;
            user.roles = sync::<SecurityUserRoleMapping>(ctx, key, mem::take(&mut user.roles))?;
            ctx.forget(key);
            Ok(user)
        })
    }

    fn update(&self, ctx: &DataContext<'_>, mut user: SecurityUser) -> Result<SecurityUser, EngineError> {
        let key = required_key(&user, ModelType::SecurityUser)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            let existing = identified::load_existing::<SecurityUserMapping>(ctx, key)?;
            base::update::<SecurityUserMapping>(ctx, &mut user, &existing)?;
            user.roles = sync::<SecurityUserRoleMapping>(ctx, key, mem::take(&mut user.roles))?;
            ctx.forget(key);
            Ok(user)
        })
    }

    fn obsolete(&self, ctx: &DataContext<'_>, user: SecurityUser) -> Result<SecurityUser, EngineError> {
        let key = required_key(&user, ModelType::SecurityUser)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            obsolete_stored::<SecurityUserMapping>(ctx, key, &user.meta, base::obsolete::<SecurityUserMapping>)?;
            ctx.forget(key);
            self.get(ctx, key)
        })
    }

    fn load(&self, ctx: &DataContext<'_>, key: Key, depth: LoadDepth) -> Result<Option<SecurityUser>, EngineError> {
        hydrate(
            ctx,
            key,
            depth,
            |ctx| identified::load::<SecurityUserMapping>(ctx, key),
            |ctx, user| {
                user.roles = fetch::<SecurityUserRoleMapping>(ctx, key)?;
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::services;
    use hearth_core::model::Membership;
    use hearth_storage::SqliteStore;

    #[test]
    fn user_roles_reconcile() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);

        let clerk = SecurityRolePersister
            .insert(&ctx, SecurityRole {
                name: Some("clerk".into()),
                ..Default::default()
            })
            .unwrap();
        let nurse = SecurityRolePersister
            .insert(&ctx, SecurityRole {
                name: Some("nurse".into()),
                ..Default::default()
            })
            .unwrap();

        let mut user = SecurityUser::named("alice");
        user.roles = vec![Membership::to(clerk.key.unwrap())];
        let mut saved = SecurityUserPersister.insert(&ctx, user).unwrap();
        saved.roles = vec![Membership::to(nurse.key.unwrap())];
        SecurityUserPersister.update(&ctx, saved.clone()).unwrap();

        let loaded = SecurityUserPersister.get(&ctx, saved.key.unwrap()).unwrap();
        assert_eq!(loaded.roles.len(), 1);
        assert_eq!(loaded.roles[0].target_key, nurse.key);
        assert_eq!(loaded.roles[0].source_key, saved.key);
    }

    #[test]
    fn obsolete_role_is_hidden_from_default_queries() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);

        let role = SecurityRolePersister
            .insert(&ctx, SecurityRole {
                name: Some("temp".into()),
                ..Default::default()
            })
            .unwrap();
        let obsoleted = SecurityRolePersister.obsolete(&ctx, role).unwrap();
        assert!(obsoleted.meta.is_obsolete());

        let page = SecurityRolePersister
            .query(&ctx, &hearth_storage::Predicate::All, &Default::default(), None)
            .unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.total, 0);
    }
}

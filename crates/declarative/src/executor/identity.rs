use std::collections::HashMap;

use super::Applied;
use crate::backend::{AttachedPolicy, IdentityBackend, RoleInfo};
use crate::context::{ApplyEvent, EventKind, EventSink};
use crate::error::{Result, ResultExt};
use crate::model::{IdentityModel, Role, normalize};
use crate::planner::{Plan, describe};
use crate::policy::PolicyRenderer;
use crate::types::{ApplySummary, Entity, ExecuteOptions, IdentityOp, Operation};

/// Converges roles and their attached policies
///
/// Roles are processed desired-first, then removals. Within a role the
/// login policies are converged before managed references. A stale policy
/// is always detached before it is deleted, and a new one is always created
/// before it is attached.
pub struct IdentityApplier<'a, B: ?Sized, S> {
    backend: &'a mut B,
    renderer: PolicyRenderer,
    events: S,
    completed: ApplySummary,
}

/// Bookkeeping for one pass
struct Pass {
    dry_run: bool,
    plan: Plan<IdentityOp>,
}

impl<'a, B, S> IdentityApplier<'a, B, S>
where
    B: IdentityBackend + ?Sized,
    S: EventSink,
{
    pub fn new(backend: &'a mut B, renderer: PolicyRenderer, events: S) -> Self {
        Self {
            backend,
            renderer,
            events,
            completed: ApplySummary::default(),
        }
    }

    /// Changes made by the last run, including one that failed part way
    pub fn completed(&self) -> &ApplySummary {
        &self.completed
    }

    /// Compare without mutating anything
    pub fn plan(&mut self, desired: &IdentityModel) -> Result<Plan<IdentityOp>> {
        let applied = self.apply(desired, &ExecuteOptions { dry_run: true })?;
        Ok(applied.plan)
    }

    pub fn apply(
        &mut self,
        desired: &IdentityModel,
        opts: &ExecuteOptions,
    ) -> Result<Applied<IdentityOp>> {
        self.completed = ApplySummary::default();
        let mut pass = Pass {
            dry_run: opts.dry_run,
            plan: Plan::new(),
        };

        let documents = self.backend.policy_documents().observing("policy documents")?;
        let roles = self.backend.list_roles().observing("roles")?;
        log::debug!(
            "Observed {} roles and {} policy documents",
            roles.len(),
            documents.len()
        );

        for role in desired.roles() {
            let existing = roles.iter().find(|r| normalize(&r.name) == role.name);
            let (info, created) = match existing {
                Some(info) => (info.clone(), false),
                None => (self.create_role(&mut pass, &role.name)?, true),
            };

            let changed = self
                .converge_policies(&mut pass, &info, Some(role), &documents, created)
                .during("failed when updating role", &role.name)?;
            if changed && !created && !pass.dry_run {
                self.events
                    .emit(ApplyEvent::new(Entity::Role, EventKind::Updated, &role.name));
            }
        }

        for info in &roles {
            if desired.lookup_role(&info.name).is_some() {
                continue;
            }
            self.converge_policies(&mut pass, info, None, &documents, false)
                .during("failed when deleting role", &info.name)?;
            let op = IdentityOp::DeleteRole {
                role: info.name.clone(),
            };
            self.step(&mut pass, op, |backend| {
                backend
                    .delete_login_role(info)
                    .during("failed deleting role", &info.name)
            })?;
        }

        Ok(Applied {
            plan: pass.plan,
            summary: self.completed.clone(),
        })
    }

    fn create_role(&mut self, pass: &mut Pass, name: &str) -> Result<RoleInfo> {
        let op = IdentityOp::CreateRole {
            role: name.to_string(),
        };
        announce(&op, pass.dry_run);
        let info = if pass.dry_run {
            RoleInfo {
                name: name.to_string(),
                arn: String::new(),
            }
        } else {
            self.backend
                .create_or_update_login_role(name)
                .during("failed when creating role", name)?
        };
        self.record(pass, op);
        Ok(info)
    }

    /// Bring the policies attached to `info` in line with `desired`.
    ///
    /// With no desired role every attached policy is drained. Returns
    /// whether anything changed.
    fn converge_policies(
        &mut self,
        pass: &mut Pass,
        info: &RoleInfo,
        desired: Option<&Role>,
        documents: &HashMap<String, String>,
        created: bool,
    ) -> Result<bool> {
        let attached = if created && pass.dry_run {
            Vec::new()
        } else {
            self.backend
                .list_attached_policies(info)
                .during("failed listing policies of role", &info.name)?
        };
        let (login, managed): (Vec<&AttachedPolicy>, Vec<&AttachedPolicy>) = attached
            .iter()
            .partition(|a| a.arn == self.renderer.policy_arn(&a.name));
        let before = pass.plan.len();

        if let Some(role) = desired {
            for policy in role.login_policies() {
                let name = policy.name();
                let document = self
                    .renderer
                    .render(policy)
                    .during("failed rendering policy", name)?;
                let current = login.iter().find(|a| normalize(&a.name) == name);

                match current {
                    Some(current) => {
                        let previous = documents.get(&current.name);
                        if previous == Some(&document) {
                            log::info!("No changes detected in policy {name}");
                            self.completed.no_change += 1;
                            continue;
                        }
                        let op = IdentityOp::UpdatePolicy {
                            role: role.name.clone(),
                            policy: name.to_string(),
                            previous: previous.cloned(),
                            document: document.clone(),
                        };
                        self.step(pass, op, |backend| {
                            remove_policy(backend, info, current)?;
                            add_policy(backend, info, name, &document)
                        })?;
                    }
                    None => {
                        let op = IdentityOp::CreatePolicy {
                            role: role.name.clone(),
                            policy: name.to_string(),
                            document: document.clone(),
                        };
                        self.step(pass, op, |backend| {
                            add_policy(backend, info, name, &document)
                        })?;
                    }
                }
            }
        }

        for current in &login {
            if desired.is_some_and(|r| r.lookup_login_policy(&current.name).is_some()) {
                continue;
            }
            let op = IdentityOp::DeletePolicy {
                role: info.name.clone(),
                policy: current.name.clone(),
            };
            self.step(pass, op, |backend| remove_policy(backend, info, current))?;
        }

        if let Some(role) = desired {
            for arn in role.managed_policies() {
                if attached.iter().any(|a| a.arn == *arn) {
                    continue;
                }
                let op = IdentityOp::AttachManagedPolicy {
                    role: role.name.clone(),
                    arn: arn.clone(),
                };
                self.step(pass, op, |backend| {
                    backend
                        .attach_policy(info, arn)
                        .during("failed attaching managed policy", arn)
                })?;
            }
        }

        for current in &managed {
            if desired.is_some_and(|r| r.references_policy(&current.arn)) {
                continue;
            }
            let op = IdentityOp::DetachManagedPolicy {
                role: info.name.clone(),
                arn: current.arn.clone(),
            };
            self.step(pass, op, |backend| {
                backend
                    .detach_policy(info, &current.arn)
                    .during("failed detaching managed policy", &current.arn)
            })?;
        }

        Ok(pass.plan.len() > before)
    }

    /// Run `mutate` unless this is a dry run, then record `op`.
    fn step(
        &mut self,
        pass: &mut Pass,
        op: IdentityOp,
        mutate: impl FnOnce(&mut B) -> Result<()>,
    ) -> Result<()> {
        announce(&op, pass.dry_run);
        if !pass.dry_run {
            mutate(&mut *self.backend)?;
        }
        self.record(pass, op);
        Ok(())
    }

    fn record(&mut self, pass: &mut Pass, op: IdentityOp) {
        if !pass.dry_run {
            self.completed.add(op.change());
            self.events
                .emit(ApplyEvent::new(op.entity(), op.change().into(), op.target()));
        }
        pass.plan.push(op);
    }
}

/// Detach then delete
fn remove_policy<B>(backend: &mut B, role: &RoleInfo, policy: &AttachedPolicy) -> Result<()>
where
    B: IdentityBackend + ?Sized,
{
    backend
        .detach_policy(role, &policy.arn)
        .during("failed detaching policy", &policy.name)?;
    backend
        .delete_policy(&policy.arn)
        .during("failed deleting policy", &policy.name)
}

/// Create then attach
fn add_policy<B>(backend: &mut B, role: &RoleInfo, name: &str, document: &str) -> Result<()>
where
    B: IdentityBackend + ?Sized,
{
    let policy = backend
        .create_or_update_policy(name, document)
        .during("failed creating policy", name)?;
    backend
        .attach_policy(role, &policy.arn)
        .during("failed attaching policy", name)
}

fn announce(op: &IdentityOp, dry_run: bool) {
    if dry_run {
        log::debug!("planned: {}", describe(op));
        return;
    }
    match op {
        IdentityOp::CreateRole { role } => log::info!("Creating role {role}"),
        IdentityOp::DeleteRole { role } => log::info!("Deleting role {role}"),
        IdentityOp::CreatePolicy { role, policy, .. } => {
            log::info!("Creating policy {policy} for role {role}")
        }
        IdentityOp::UpdatePolicy { role, policy, .. } => {
            log::info!("Replacing policy {policy} attached to {role}")
        }
        IdentityOp::DeletePolicy { role, policy } => {
            log::info!("Deleting policy {policy} attached to {role}")
        }
        IdentityOp::AttachManagedPolicy { role, arn } => {
            log::info!("Attaching managed policy {arn} to {role}")
        }
        IdentityOp::DetachManagedPolicy { role, arn } => {
            log::info!("Detaching managed policy {arn} from {role}")
        }
    }
}

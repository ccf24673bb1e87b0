//! Plans for every selected system

use anyhow::{Context, Result};
use declarative::{
    IdentityApplier, IdentityOp, LoginApplier, LoginOp, NoEvents, Plan, PlanSummary,
    PolicyRenderer, WarehouseApplier, WarehouseOp,
};
use serde_json::{Map, Value};

use crate::cli::System;
use crate::resolver::Desired;
use crate::state::LocalState;

/// One plan per selected system; unselected systems stay `None`
#[derive(Debug, Default)]
pub struct SystemPlans {
    pub warehouse: Option<Plan<WarehouseOp>>,
    pub identity: Option<Plan<IdentityOp>>,
    pub login: Option<Plan<LoginOp>>,
}

impl SystemPlans {
    pub fn summary(&self) -> PlanSummary {
        let parts = [
            self.warehouse.as_ref().map(Plan::summary),
            self.identity.as_ref().map(Plan::summary),
            self.login.as_ref().map(Plan::summary),
        ];
        parts
            .into_iter()
            .flatten()
            .fold(PlanSummary::default(), |mut total, part| {
                total.additions += part.additions;
                total.modifications += part.modifications;
                total.removals += part.removals;
                total
            })
    }

    pub fn has_changes(&self) -> bool {
        self.summary().has_changes()
    }

    /// Steps of every planned system, keyed by system name
    pub fn to_json(&self) -> Result<Value> {
        let mut map = Map::new();
        if let Some(plan) = &self.warehouse {
            map.insert(System::Warehouse.name().into(), serde_json::to_value(plan)?);
        }
        if let Some(plan) = &self.identity {
            map.insert(System::Identity.name().into(), serde_json::to_value(plan)?);
        }
        if let Some(plan) = &self.login {
            map.insert(System::Login.name().into(), serde_json::to_value(plan)?);
        }
        Ok(Value::Object(map))
    }
}

/// Observe the selected systems and plan them against `desired`
pub fn plan(
    state: &mut LocalState,
    desired: &Desired,
    renderer: &PolicyRenderer,
    systems: &[System],
) -> Result<SystemPlans> {
    let mut plans = SystemPlans::default();

    for system in systems {
        match system {
            System::Warehouse => {
                let plan = WarehouseApplier::new(&mut state.warehouse, NoEvents)
                    .plan(&desired.warehouse)
                    .context("Failed to plan warehouse")?;
                plans.warehouse = Some(plan);
            }
            System::Identity => {
                let plan = IdentityApplier::new(&mut state.identity, renderer.clone(), NoEvents)
                    .plan(&desired.identity)
                    .context("Failed to plan identity")?;
                plans.identity = Some(plan);
            }
            System::Login => {
                let plan = LoginApplier::new(&mut state.login, NoEvents)
                    .plan(&desired.login)
                    .context("Failed to plan login")?;
                plans.login = Some(plan);
            }
        }
    }

    log::debug!("Planned {} changes", plans.summary().total());
    Ok(plans)
}

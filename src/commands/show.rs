use anyhow::Result;
use declarative::diff::grants_of;
use declarative::{IdentityModel, LoginModel, WarehouseModel};

use super::resolve_grants;
use crate::cli::{System, SystemArgs};
use crate::config::Settings;
use crate::ui;

pub fn run(settings: &Settings, args: &SystemArgs) -> Result<()> {
    let desired = resolve_grants(settings)?;
    ui::header(&format!("Grants: {}", settings.grants.display()));
    ui::kv("Account", &settings.account_id);
    ui::kv("Region", &settings.region);

    for system in args.selected() {
        let lines = match system {
            System::Warehouse => warehouse_lines(&desired.warehouse),
            System::Identity => identity_lines(&desired.identity),
            System::Login => login_lines(&desired.login),
        };
        ui::section(system.name());
        if lines.is_empty() {
            ui::dim("(empty)");
        }
        for line in lines {
            println!("  {line}");
        }
    }
    Ok(())
}

fn member(group: Option<&str>) -> String {
    group.map(|g| format!(" (member of {g})")).unwrap_or_default()
}

fn warehouse_lines(model: &WarehouseModel) -> Vec<String> {
    let mut lines = Vec::new();
    for cluster in model.clusters() {
        lines.push(format!("cluster {}", cluster.identifier));
        for group in cluster.groups() {
            let grants: Vec<String> = grants_of(group).iter().map(ToString::to_string).collect();
            lines.push(format!("├─ group {} [{}]", group.name, grants.join(", ")));
        }
        for user in cluster.users() {
            lines.push(format!("├─ user {}{}", user.name, member(user.group.as_deref())));
        }
        for database in cluster.databases() {
            let owner = database
                .owner
                .as_ref()
                .map(|o| format!(" (owner {o})"))
                .unwrap_or_default();
            lines.push(format!("└─ database {}{owner}", database.name));
            for schema in database.external_schemas() {
                lines.push(format!(
                    "   ├─ external schema {} <- {}",
                    schema.name, schema.catalog
                ));
            }
            for group in database.groups() {
                lines.push(format!("   ├─ group {}", group.name));
            }
            for user in database.users() {
                lines.push(format!(
                    "   ├─ user {}{}",
                    user.name,
                    member(user.group.as_deref())
                ));
            }
        }
    }
    lines
}

fn identity_lines(model: &IdentityModel) -> Vec<String> {
    let mut lines = Vec::new();
    for role in model.roles() {
        lines.push(format!("role {}", role.name));
        for arn in role.managed_policies() {
            lines.push(format!("├─ managed policy {arn}"));
        }
        for policy in role.login_policies() {
            let databases: Vec<String> = policy
                .databases()
                .iter()
                .map(|d| format!("{}/{}", d.cluster_identifier, d.name))
                .collect();
            lines.push(format!(
                "└─ policy {} for {} [{}]",
                policy.database_username,
                policy.email,
                databases.join(", ")
            ));
        }
    }
    lines
}

fn login_lines(model: &LoginModel) -> Vec<String> {
    model
        .users()
        .iter()
        .map(|user| format!("{} -> {}", user.email, user.roles().join(", ")))
        .collect()
}

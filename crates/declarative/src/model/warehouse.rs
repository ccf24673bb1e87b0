//! Warehouse model: clusters, databases, groups, users and schema grants.

use super::name::{Keyed, Named, normalize};

/// A schema inside a database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub name: String,
}

/// A schema backed by an external catalog database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSchema {
    pub name: String,
    /// Identifier of the external catalog database backing the schema
    pub catalog: String,
}

/// A named collection of users carrying schema grants
#[derive(Debug, Clone)]
pub struct Group {
    pub name: String,
    granted_schemas: Named<Schema>,
    granted_external_schemas: Named<ExternalSchema>,
}

/// A warehouse user, optionally a member of a group in the same scope
///
/// The group is referenced by name only; the user never owns it.
#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
    pub group: Option<String>,
}

/// A database within a cluster
#[derive(Debug, Clone)]
pub struct Database {
    pub cluster_identifier: String,
    pub name: String,
    pub owner: Option<String>,
    groups: Named<Group>,
    users: Named<User>,
    external_schemas: Named<ExternalSchema>,
}

/// A warehouse cluster hosting databases
#[derive(Debug, Clone)]
pub struct Cluster {
    pub identifier: String,
    databases: Named<Database>,
    groups: Named<Group>,
    users: Named<User>,
}

/// Mapping from cluster identifier to cluster
#[derive(Debug, Clone, Default)]
pub struct WarehouseModel {
    clusters: Named<Cluster>,
}

impl Keyed for Schema {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for ExternalSchema {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for Group {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for User {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for Database {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for Cluster {
    fn key(&self) -> &str {
        &self.identifier
    }
}

impl WarehouseModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_cluster(&mut self, identifier: &str) -> &mut Cluster {
        self.clusters.declare_with(identifier, Cluster::new)
    }

    pub fn lookup_cluster(&self, identifier: &str) -> Option<&Cluster> {
        self.clusters.get(identifier)
    }

    pub fn lookup_cluster_mut(&mut self, identifier: &str) -> Option<&mut Cluster> {
        self.clusters.get_mut(identifier)
    }

    pub fn clusters(&self) -> &Named<Cluster> {
        &self.clusters
    }

    /// Look up a database by cluster and name
    pub fn lookup_database(&self, cluster_identifier: &str, name: &str) -> Option<&Database> {
        self.lookup_cluster(cluster_identifier)
            .and_then(|cluster| cluster.lookup_database(name))
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

impl Cluster {
    fn new(identifier: String) -> Self {
        Self {
            identifier,
            databases: Named::new(),
            groups: Named::new(),
            users: Named::new(),
        }
    }

    pub fn declare_database(&mut self, name: &str) -> &mut Database {
        let cluster = self.identifier.clone();
        self.databases
            .declare_with(name, |name| Database::new(cluster, name, None))
    }

    /// Declare a database with an owner. An already-declared database keeps its owner.
    pub fn declare_database_with_owner(&mut self, name: &str, owner: &str) -> &mut Database {
        let cluster = self.identifier.clone();
        let owner = normalize(owner);
        self.databases
            .declare_with(name, |name| Database::new(cluster, name, Some(owner)))
    }

    pub fn lookup_database(&self, name: &str) -> Option<&Database> {
        self.databases.get(name)
    }

    pub fn lookup_database_mut(&mut self, name: &str) -> Option<&mut Database> {
        self.databases.get_mut(name)
    }

    pub fn databases(&self) -> &Named<Database> {
        &self.databases
    }

    pub fn declare_group(&mut self, name: &str) -> &mut Group {
        self.groups.declare_with(name, Group::new)
    }

    pub fn lookup_group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn lookup_group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.get_mut(name)
    }

    pub fn groups(&self) -> &Named<Group> {
        &self.groups
    }

    /// Declare a cluster user, optionally a member of `group`.
    ///
    /// `group` should name a group already declared on this cluster.
    pub fn declare_user(&mut self, name: &str, group: Option<&str>) -> &mut User {
        self.users.declare_with(name, |name| User::new(name, group))
    }

    pub fn lookup_user(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    pub fn users(&self) -> &Named<User> {
        &self.users
    }
}

impl Database {
    fn new(cluster_identifier: String, name: String, owner: Option<String>) -> Self {
        Self {
            cluster_identifier,
            name,
            owner,
            groups: Named::new(),
            users: Named::new(),
            external_schemas: Named::new(),
        }
    }

    /// `cluster/database`
    pub fn identifier(&self) -> String {
        format!("{}/{}", self.cluster_identifier, self.name)
    }

    pub fn declare_group(&mut self, name: &str) -> &mut Group {
        self.groups.declare_with(name, Group::new)
    }

    pub fn lookup_group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn lookup_group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.get_mut(name)
    }

    pub fn groups(&self) -> &Named<Group> {
        &self.groups
    }

    pub fn declare_user(&mut self, name: &str, group: Option<&str>) -> &mut User {
        self.users.declare_with(name, |name| User::new(name, group))
    }

    pub fn lookup_user(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    pub fn users(&self) -> &Named<User> {
        &self.users
    }

    pub fn declare_external_schema(&mut self, name: &str, catalog: &str) -> &mut ExternalSchema {
        self.external_schemas
            .declare_with(name, |name| ExternalSchema::new(name, catalog))
    }

    pub fn lookup_external_schema(&self, name: &str) -> Option<&ExternalSchema> {
        self.external_schemas.get(name)
    }

    pub fn external_schemas(&self) -> &Named<ExternalSchema> {
        &self.external_schemas
    }
}

impl Group {
    fn new(name: String) -> Self {
        Self {
            name,
            granted_schemas: Named::new(),
            granted_external_schemas: Named::new(),
        }
    }

    /// Grant usage on a schema. Granting twice is a no-op.
    pub fn grant_schema(&mut self, name: &str) {
        self.granted_schemas.declare_with(name, |name| Schema { name });
    }

    /// Grant usage on an external schema. Granting twice is a no-op.
    pub fn grant_external_schema(&mut self, name: &str, catalog: &str) {
        self.granted_external_schemas
            .declare_with(name, |name| ExternalSchema::new(name, catalog));
    }

    pub fn granted_schemas(&self) -> &Named<Schema> {
        &self.granted_schemas
    }

    pub fn granted_external_schemas(&self) -> &Named<ExternalSchema> {
        &self.granted_external_schemas
    }

    /// Names of every granted schema, regular before external
    pub fn granted(&self) -> Vec<&str> {
        self.granted_schemas
            .iter()
            .map(|s| s.name.as_str())
            .chain(self.granted_external_schemas.iter().map(|s| s.name.as_str()))
            .collect()
    }

    pub fn lookup_granted_schema(&self, name: &str) -> Option<&Schema> {
        self.granted_schemas.get(name)
    }

    pub fn lookup_granted_external_schema(&self, name: &str) -> Option<&ExternalSchema> {
        self.granted_external_schemas.get(name)
    }
}

impl User {
    fn new(name: String, group: Option<&str>) -> Self {
        Self {
            name,
            group: group.map(normalize),
        }
    }
}

impl ExternalSchema {
    fn new(name: String, catalog: &str) -> Self {
        Self {
            name,
            catalog: catalog.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_cluster_returns_existing() {
        let mut model = WarehouseModel::new();
        let first = model.declare_cluster("dev") as *const Cluster;
        let second = model.declare_cluster("DEV") as *const Cluster;

        assert!(std::ptr::eq(first, second));
        assert_eq!(model.clusters().len(), 1);
    }

    #[test]
    fn test_declare_group_per_scope() {
        let mut model = WarehouseModel::new();
        let cluster = model.declare_cluster("dev");
        cluster.declare_group("BIAnalyst");
        cluster.declare_group("bianalyst");
        let database = cluster.declare_database("jwr");
        database.declare_group("bianalyst");

        let cluster = model.lookup_cluster("dev").unwrap();
        assert_eq!(cluster.groups().len(), 1);
        assert_eq!(cluster.lookup_database("jwr").unwrap().groups().len(), 1);
        assert!(cluster.lookup_group("BIANALYST").is_some());
    }

    #[test]
    fn test_database_owner_first_write_wins() {
        let mut model = WarehouseModel::new();
        let cluster = model.declare_cluster("dev");
        cluster.declare_database_with_owner("jwr", "jwr_bianalyst");
        cluster.declare_database_with_owner("jwr", "someone_else");
        cluster.declare_database("jwr");

        let database = model.lookup_database("dev", "jwr").unwrap();
        assert_eq!(database.owner.as_deref(), Some("jwr_bianalyst"));
        assert_eq!(database.identifier(), "dev/jwr");
    }

    #[test]
    fn test_user_references_group_by_normalized_name() {
        let mut model = WarehouseModel::new();
        let cluster = model.declare_cluster("dev");
        cluster.declare_group("bianalyst");
        cluster.declare_user("JWR_BIAnalyst", Some("BIAnalyst"));

        let user = model
            .lookup_cluster("dev")
            .unwrap()
            .lookup_user("jwr_bianalyst")
            .unwrap();
        assert_eq!(user.name, "jwr_bianalyst");
        assert_eq!(user.group.as_deref(), Some("bianalyst"));
    }

    #[test]
    fn test_grants_are_deduplicated_sets() {
        let mut model = WarehouseModel::new();
        let group = model.declare_cluster("dev").declare_group("bianalyst");
        group.grant_schema("Public");
        group.grant_schema("public");
        group.grant_schema("sales");
        group.grant_external_schema("lake", "glue_lake");
        group.grant_external_schema("LAKE", "other_catalog");

        assert_eq!(group.granted(), vec!["public", "sales", "lake"]);
        assert_eq!(
            group.lookup_granted_external_schema("lake").unwrap().catalog,
            "glue_lake"
        );
        assert!(group.lookup_granted_schema("PUBLIC").is_some());
    }
}

//! Canonical rendering of database login policy documents.
//!
//! The rendered text is compared byte-for-byte against the document stored
//! in the identity system, so rendering must be deterministic: fields are
//! serialized in declaration order and statements follow the policy's
//! allow-entry order.

use serde::Serialize;

use crate::error::Result;
use crate::model::DatabaseLoginPolicy;

/// IAM path holding every login policy, keeping them apart from other
/// customer policies of the same account
pub const LOGIN_POLICY_PATH: &str = "/database-login/";

const POLICY_VERSION: &str = "2012-10-17";
const CREDENTIALS_ACTION: &str = "redshift:GetClusterCredentials";

#[derive(Serialize)]
struct Document<'a> {
    #[serde(rename = "Version")]
    version: &'a str,
    #[serde(rename = "Statement")]
    statement: Vec<Statement<'a>>,
}

#[derive(Serialize)]
struct Statement<'a> {
    #[serde(rename = "Effect")]
    effect: &'a str,
    #[serde(rename = "Action")]
    action: &'a str,
    #[serde(rename = "Resource")]
    resource: [String; 2],
    #[serde(rename = "Condition")]
    condition: Condition,
}

#[derive(Serialize)]
struct Condition {
    #[serde(rename = "StringLike")]
    string_like: UserIdMatch,
}

#[derive(Serialize)]
struct UserIdMatch {
    #[serde(rename = "aws:userid")]
    user_id: String,
}

/// Renders login policies for one account and region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRenderer {
    account_id: String,
    region: String,
}

impl PolicyRenderer {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// ARN of the login policy `name` in this account
    pub fn policy_arn(&self, name: &str) -> String {
        format!(
            "arn:aws:iam::{}:policy{LOGIN_POLICY_PATH}{name}",
            self.account_id
        )
    }

    fn db_user_arn(&self, cluster: &str, username: &str) -> String {
        format!(
            "arn:aws:redshift:{}:{}:dbuser:{}/{}",
            self.region, self.account_id, cluster, username
        )
    }

    fn db_name_arn(&self, cluster: &str, database: &str) -> String {
        format!(
            "arn:aws:redshift:{}:{}:dbname:{}/{}",
            self.region, self.account_id, cluster, database
        )
    }

    /// Render the policy document: one statement per allowed database, each
    /// letting the policy's subject fetch credentials as its login username.
    pub fn render(&self, policy: &DatabaseLoginPolicy) -> Result<String> {
        let statement = policy
            .databases()
            .iter()
            .map(|access| Statement {
                effect: "Allow",
                action: CREDENTIALS_ACTION,
                resource: [
                    self.db_user_arn(&access.cluster_identifier, &policy.database_username),
                    self.db_name_arn(&access.cluster_identifier, &access.name),
                ],
                condition: Condition {
                    string_like: UserIdMatch {
                        user_id: format!("*:{}", policy.email),
                    },
                },
            })
            .collect();

        let document = Document {
            version: POLICY_VERSION,
            statement,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

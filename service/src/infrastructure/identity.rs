use std::collections::{HashMap, HashSet};

use anyhow::anyhow;
use editorial_common::ArticleId;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::domain::identity::{Actor, EditorialAction, Permissions};

/// Grants every action to this role name in the permissions config.
const ALL_ACTIONS: &str = "*";

#[derive(Debug, Clone)]
enum RoleGrant {
    All,
    Only(HashSet<EditorialAction>),
}

/// Static role to action policy read from the configuration.
///
/// An actor may perform an action when any of its roles grants it.
#[derive(Debug, Clone, Default)]
pub struct RolePermissions {
    grants: HashMap<String, RoleGrant>,
}

impl RolePermissions {
    pub fn from_roles(roles: &HashMap<String, Vec<String>>) -> anyhow::Result<Self> {
        let mut grants = HashMap::with_capacity(roles.len());

        for (role, actions) in roles {
            let grant = if actions.iter().any(|action| action == ALL_ACTIONS) {
                RoleGrant::All
            } else {
                let actions = actions
                    .iter()
                    .map(|action| action.parse::<EditorialAction>())
                    .collect::<Result<HashSet<_>, _>>()
                    .map_err(|err| anyhow!("invalid permissions for role '{role}': {err}"))?;
                RoleGrant::Only(actions)
            };
            grants.insert(role.clone(), grant);
        }

        Ok(Self { grants })
    }

    fn allows(&self, actor: &Actor, action: EditorialAction) -> bool {
        actor
            .roles
            .iter()
            .filter_map(|role| self.grants.get(role))
            .any(|grant| match grant {
                RoleGrant::All => true,
                RoleGrant::Only(actions) => actions.contains(&action),
            })
    }
}

impl Permissions for RolePermissions {
    fn can_perform<'a>(
        &'a self,
        actor: &'a Actor,
        action: EditorialAction,
        _article_id: Option<ArticleId>,
    ) -> BoxFuture<'a, bool> {
        futures::future::ready(self.allows(actor, action)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use editorial_common::test_utils::actor;

    use super::*;

    fn roles(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(role, actions)| (role.to_string(), actions.iter().map(|a| a.to_string()).collect()))
            .collect()
    }

    #[tokio::test]
    async fn any_role_may_grant() {
        let permissions = RolePermissions::from_roles(&roles(&[
            ("author", &["create_article"]),
            ("reviewer", &["approve"]),
        ]))
        .unwrap();
        let both = Actor::new(actor("dana"), ["author", "reviewer"]);

        assert!(permissions.can_perform(&both, EditorialAction::Approve, None).await);
        assert!(!permissions.can_perform(&both, EditorialAction::PublishNow, None).await);
    }

    #[tokio::test]
    async fn wildcard_grants_everything() {
        let permissions = RolePermissions::from_roles(&roles(&[("editor", &["*"])])).unwrap();
        let editor = Actor::new(actor("eve"), ["editor"]);

        assert!(permissions.can_perform(&editor, EditorialAction::RetryChannel, Some(ArticleId::generate())).await);
    }

    #[tokio::test]
    async fn actor_without_roles_may_do_nothing() {
        let permissions = RolePermissions::from_roles(&roles(&[("editor", &["*"])])).unwrap();
        let nobody = Actor::new(actor("nobody"), Vec::<String>::new());

        assert!(!permissions.can_perform(&nobody, EditorialAction::CreateArticle, None).await);
    }

    #[test]
    fn unknown_action_names_are_rejected() {
        let err = RolePermissions::from_roles(&roles(&[("author", &["publish_everything"])])).unwrap_err();
        assert!(err.to_string().contains("author"));
    }
}

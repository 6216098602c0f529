//! Embed to JOIN inference.
//!
//! Without a schema there is no way to know which column links two tables,
//! so the key is a naming convention: the embedded table holds
//! `<parent>_id` referencing `<parent>.id`. Every JOIN built this way is
//! reported as a warning and a `fk.<relation>` metadata entry.

use crate::ast::EmbeddedResource;
use crate::config::ConvertOptions;
use crate::error::{ConvertError, ConvertResult};
use crate::transpiler::traits::{escape_identifier, qualified};

/// Naming convention for embed join keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyPolicy {
    /// Foreign-key column on the embedded table. `{table}` is the parent.
    pub fk_template: String,
    /// Key column on the parent table.
    pub primary_key: String,
}

impl Default for ForeignKeyPolicy {
    fn default() -> Self {
        Self::from_options(&ConvertOptions::default())
    }
}

/// One inferred JOIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    /// `LEFT JOIN posts ON posts.users_id = users.id`
    pub clause: String,
    /// Name the embed's columns are qualified with.
    pub qualifier: String,
    /// `posts.users_id = users.id`
    pub key: String,
}

impl ForeignKeyPolicy {
    pub fn new(fk_template: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            fk_template: fk_template.into(),
            primary_key: primary_key.into(),
        }
    }

    pub fn from_options(options: &ConvertOptions) -> Self {
        Self::new(options.fk_template.clone(), options.primary_key.clone())
    }

    /// Foreign-key column referencing `parent`.
    pub fn foreign_key(&self, parent: &str) -> String {
        self.fk_template.replace("{table}", parent)
    }

    /// The JOIN for one embed of `table`. Nested embeds cannot be joined.
    pub fn plan(&self, table: &str, embed: &EmbeddedResource) -> ConvertResult<JoinPlan> {
        if embed.depth() > 1 {
            return Err(ConvertError::embed_too_deep(embed.name(), embed.to_select_item()));
        }

        let qualifier = embed.name().to_string();
        let key = format!(
            "{} = {}",
            qualified(Some(&qualifier), &self.foreign_key(table)),
            qualified(Some(table), &self.primary_key)
        );
        let join = if embed.inner { "INNER JOIN" } else { "LEFT JOIN" };
        let target = match &embed.alias {
            Some(alias) => format!("{} AS {}", escape_identifier(&embed.relation), escape_identifier(alias)),
            None => escape_identifier(&embed.relation),
        };
        Ok(JoinPlan {
            clause: format!("{} {} ON {}", join, target, key),
            qualifier,
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_convention() {
        let policy = ForeignKeyPolicy::default();
        let plan = policy.plan("users", &EmbeddedResource::new("posts")).unwrap();
        assert_eq!(plan.clause, "LEFT JOIN posts ON posts.users_id = users.id");
        assert_eq!(plan.key, "posts.users_id = users.id");
        assert_eq!(plan.qualifier, "posts");
    }

    #[test]
    fn test_inner_alias_and_custom_template() {
        let policy = ForeignKeyPolicy::new("{table}_ref", "uuid");
        let mut embed = EmbeddedResource::new("users");
        embed.alias = Some("author".into());
        embed.inner = true;
        let plan = policy.plan("posts", &embed).unwrap();
        assert_eq!(plan.clause, "INNER JOIN users AS author ON author.posts_ref = posts.uuid");
    }

    #[test]
    fn test_nested_embed_is_too_deep() {
        let mut posts = EmbeddedResource::new("posts");
        posts.embeds.push(EmbeddedResource::new("comments"));
        let err = ForeignKeyPolicy::default().plan("users", &posts).unwrap_err();
        assert_eq!(err.code(), "EMBED_TOO_DEEP");
    }
}

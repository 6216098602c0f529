use serde::{Deserialize, Serialize};

use crate::ast::{Column, Filter, OrderSpec};

/// A related table requested alongside the main one, e.g. `posts(title,year)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    pub relation: String,
    /// `author:users(name)` embeds `users` under the name `author`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// `users!inner(name)` asks for an inner join.
    #[serde(default)]
    pub inner: bool,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order: Vec<OrderSpec>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub embeds: Vec<EmbeddedResource>,
}

impl EmbeddedResource {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            alias: None,
            inner: false,
            columns: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            embeds: Vec::new(),
        }
    }

    pub fn columns<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.columns = cols.into_iter().map(|c| Column::parse(c.as_ref())).collect();
        self
    }

    /// The name this embed is addressed by: its alias, else its relation.
    pub fn name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.relation)
    }

    /// Nesting depth, 1 for an embed with no embeds of its own.
    pub fn depth(&self) -> usize {
        1 + self.embeds.iter().map(|e| e.depth()).max().unwrap_or(0)
    }

    /// The `select` fragment for this embed: `alias:relation!inner(cols)`.
    pub fn to_select_item(&self) -> String {
        let mut item = String::new();
        if let Some(alias) = &self.alias {
            item.push_str(alias);
            item.push(':');
        }
        item.push_str(&self.relation);
        if self.inner {
            item.push_str("!inner");
        }
        let mut inner: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
        inner.extend(self.embeds.iter().map(|e| e.to_select_item()));
        item.push('(');
        item.push_str(&inner.join(","));
        item.push(')');
        item
    }
}

/// Find the embed addressed by `name` (alias or relation) among `embeds`.
pub fn find_embed_mut<'a>(
    embeds: &'a mut [EmbeddedResource],
    name: &str,
) -> Option<&'a mut EmbeddedResource> {
    embeds.iter_mut().find(|e| e.name() == name)
}

//! The `select` column list shared by the REST wire and the DSL:
//! `name,author:users!inner(name),posts(title,comments(body))`.

use crate::ast::{Column, EmbeddedResource};
use crate::error::ConvertResult;
use crate::parser::scan::{find_top_level, matching_close, split_top_level};

/// Columns and embeds carved out of one `select` list.
#[derive(Debug, Default, PartialEq)]
pub struct Selection {
    pub columns: Vec<Column>,
    pub embeds: Vec<EmbeddedResource>,
    pub warnings: Vec<String>,
}

/// Parse a `select` list. Items containing `(` become embeds, recursively.
/// An empty list selects `*`.
pub fn parse_select(raw: &str, max_depth: usize) -> ConvertResult<Selection> {
    let mut selection = Selection::default();
    for item in split_top_level(raw.trim(), ',', max_depth)? {
        match find_top_level(item, '(', max_depth)? {
            Some(open) => {
                let embed = parse_embed(item, open, max_depth, &mut selection.warnings)?;
                selection.embeds.push(embed);
            }
            None => {
                let column = Column::parse(item);
                column.check_cast()?;
                selection.columns.push(column);
            }
        }
    }
    if selection.columns.is_empty() && selection.embeds.is_empty() {
        selection.columns.push(Column::star());
    }
    Ok(selection)
}

fn parse_embed(
    item: &str,
    open: usize,
    max_depth: usize,
    warnings: &mut Vec<String>,
) -> ConvertResult<EmbeddedResource> {
    let close = matching_close(item, open, max_depth)?;
    if !item[close + 1..].trim().is_empty() {
        warnings.push(format!("ignored trailing text after embed '{}'", &item[..=close]));
    }

    let mut head = item[..open].trim();
    if let Some(rest) = head.strip_prefix("...") {
        warnings.push(format!("spread embed '{}' is kept as a nested embed", rest));
        head = rest;
    }
    let (alias, head) = match head.split_once(':') {
        Some((alias, rest)) => (Some(alias.trim().to_string()), rest.trim()),
        None => (None, head),
    };
    let (relation, hint) = match head.split_once('!') {
        Some((relation, hint)) => (relation.trim(), Some(hint.trim())),
        None => (head, None),
    };

    let mut embed = EmbeddedResource::new(relation);
    embed.alias = alias;
    match hint {
        Some("inner") => embed.inner = true,
        Some("left") | None => {}
        Some(other) => warnings.push(format!(
            "join hint '!{}' on '{}' is ignored; keys are inferred by naming convention",
            other, relation
        )),
    }

    let inner = parse_select(&item[open + 1..close], max_depth.saturating_sub(1))?;
    embed.columns = inner.columns;
    embed.embeds = inner.embeds;
    warnings.extend(inner.warnings);
    Ok(embed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_columns() {
        let sel = parse_select("id,name", 8).unwrap();
        assert_eq!(sel.columns, vec![Column::named("id"), Column::named("name")]);
        assert!(sel.embeds.is_empty());
    }

    #[test]
    fn test_casts_must_be_type_names() {
        let sel = parse_select("id::text,tags::text[]", 8).unwrap();
        assert_eq!(sel.columns[1].cast.as_deref(), Some("text[]"));

        let err = parse_select("name::text FROM secrets;DROP TABLE users;--", 8).unwrap_err();
        assert_eq!(err.code(), "INVALID_COLUMN");
        let err = parse_select("posts(title::int; DELETE FROM posts)", 8).unwrap_err();
        assert_eq!(err.code(), "INVALID_COLUMN");
    }

    #[test]
    fn test_embed_is_carved_out() {
        let sel = parse_select("name,posts(title,year)", 8).unwrap();
        assert_eq!(sel.columns, vec![Column::named("name")]);
        assert_eq!(sel.embeds.len(), 1);
        assert_eq!(sel.embeds[0].relation, "posts");
        assert_eq!(
            sel.embeds[0].columns,
            vec![Column::named("title"), Column::named("year")]
        );
    }

    #[test]
    fn test_alias_and_hints() {
        let sel = parse_select("id,author:users!inner(name),tags!post_tags(label)", 8).unwrap();
        assert_eq!(sel.embeds[0].alias.as_deref(), Some("author"));
        assert_eq!(sel.embeds[0].relation, "users");
        assert!(sel.embeds[0].inner);
        assert!(!sel.embeds[1].inner);
        assert_eq!(sel.warnings.len(), 1);
    }

    #[test]
    fn test_nested_embeds() {
        let sel = parse_select("posts(title,comments(body))", 8).unwrap();
        assert!(sel.columns.is_empty());
        assert_eq!(sel.embeds[0].depth(), 2);
    }

    #[test]
    fn test_empty_selects_star() {
        let sel = parse_select("", 8).unwrap();
        assert_eq!(sel.columns, vec![Column::star()]);
    }
}

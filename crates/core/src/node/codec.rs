//! Canonical string form of nodes
//!
//! ```text
//! a.b.c                   plain permission (wildcard if it ends in `.*`)
//! group.<name>            inherit from a group
//! meta.<key>.<value>      key/value option
//! prefix.<priority>.<v>   chat prefix
//! suffix.<priority>.<v>   chat suffix
//! ```
//!
//! Inside meta/prefix/suffix payloads `\` and `.` are written as `\\` and `\.`.

use super::NodeKind;
use crate::error::{NodeError, NodeResult};

pub(crate) const GROUP_PREFIX: &str = "group";
pub(crate) const META_PREFIX: &str = "meta";
pub(crate) const PREFIX_PREFIX: &str = "prefix";
pub(crate) const SUFFIX_PREFIX: &str = "suffix";

/// Escape `\` and `.` inside a payload segment
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || c == '.' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Reverse [`escape`]
pub fn unescape(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split at the first `.` that is not escaped
fn split_unescaped(s: &str) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '.' => return Some((&s[..i], &s[i + 1..])),
            _ => {}
        }
    }
    None
}

/// Parse a permission string into its canonical form and kind
pub(crate) fn parse(permission: &str) -> NodeResult<(String, NodeKind)> {
    let permission = permission.trim();
    if permission.is_empty() {
        return Err(NodeError::EmptyPermission);
    }

    if let Some((head, rest)) = split_unescaped(permission) {
        match head.to_lowercase().as_str() {
            GROUP_PREFIX => {
                let group = unescape(rest).trim().to_lowercase();
                if group.is_empty() {
                    return Err(NodeError::EmptyGroupName);
                }
                return Ok((encode_inheritance(&group), NodeKind::Inheritance { group }));
            }
            META_PREFIX => {
                if let Some((key, value)) = split_unescaped(rest) {
                    let key = unescape(key).trim().to_lowercase();
                    if key.is_empty() {
                        return Err(NodeError::EmptyMetaKey);
                    }
                    let value = unescape(value);
                    return Ok((encode_meta(&key, &value), NodeKind::Meta { key, value }));
                }
            }
            kind @ (PREFIX_PREFIX | SUFFIX_PREFIX) => {
                if let Some((priority, value)) = split_unescaped(rest) {
                    let priority: i32 = priority
                        .trim()
                        .parse()
                        .map_err(|_| NodeError::InvalidPriority(priority.to_string()))?;
                    let value = unescape(value);
                    let is_prefix = kind == PREFIX_PREFIX;
                    let canonical = encode_chat_meta(is_prefix, priority, &value);
                    let kind = if is_prefix {
                        NodeKind::Prefix { priority, value }
                    } else {
                        NodeKind::Suffix { priority, value }
                    };
                    return Ok((canonical, kind));
                }
            }
            _ => {}
        }
    }

    let plain = permission.to_lowercase();
    if plain.starts_with('.') || plain.ends_with('.') || plain.contains("..") {
        return Err(NodeError::IllegalSeparator(plain));
    }
    Ok((plain, NodeKind::Permission))
}

pub(crate) fn encode_inheritance(group: &str) -> String {
    format!("{}.{}", GROUP_PREFIX, group)
}

pub(crate) fn encode_meta(key: &str, value: &str) -> String {
    format!("{}.{}.{}", META_PREFIX, escape(key), escape(value))
}

pub(crate) fn encode_chat_meta(is_prefix: bool, priority: i32, value: &str) -> String {
    let head = if is_prefix { PREFIX_PREFIX } else { SUFFIX_PREFIX };
    format!("{}.{}.{}", head, priority, escape(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trip() {
        let raw = r"a.b\c";
        assert_eq!(escape(raw), r"a\.b\\c");
        assert_eq!(unescape(&escape(raw)), raw);
    }

    #[test]
    fn test_split_skips_escaped_dots() {
        assert_eq!(split_unescaped(r"a\.b.c"), Some((r"a\.b", "c")));
        assert_eq!(split_unescaped(r"a\.b"), None);
    }

    #[test]
    fn test_parse_plain() {
        let (canonical, kind) = parse("  Example.PERM ").unwrap();
        assert_eq!(canonical, "example.perm");
        assert_eq!(kind, NodeKind::Permission);
    }

    #[test]
    fn test_parse_group() {
        let (canonical, kind) = parse("group.Admin").unwrap();
        assert_eq!(canonical, "group.admin");
        assert_eq!(
            kind,
            NodeKind::Inheritance {
                group: "admin".to_string()
            }
        );
        assert_eq!(parse("group."), Err(NodeError::EmptyGroupName));
    }

    #[test]
    fn test_parse_meta_keeps_value_case() {
        let (canonical, kind) = parse(r"meta.Rank.Top\.Dog").unwrap();
        assert_eq!(canonical, r"meta.rank.Top\.Dog");
        assert_eq!(
            kind,
            NodeKind::Meta {
                key: "rank".to_string(),
                value: "Top.Dog".to_string()
            }
        );
        assert_eq!(parse("meta..x"), Err(NodeError::EmptyMetaKey));
    }

    #[test]
    fn test_parse_chat_meta() {
        let (canonical, kind) = parse("prefix.10.[VIP]").unwrap();
        assert_eq!(canonical, "prefix.10.[VIP]");
        assert_eq!(
            kind,
            NodeKind::Prefix {
                priority: 10,
                value: "[VIP]".to_string()
            }
        );

        let (_, kind) = parse("suffix.-5.x").unwrap();
        assert_eq!(
            kind,
            NodeKind::Suffix {
                priority: -5,
                value: "x".to_string()
            }
        );

        assert!(matches!(
            parse("prefix.high.x"),
            Err(NodeError::InvalidPriority(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_separators() {
        assert_eq!(parse(""), Err(NodeError::EmptyPermission));
        assert_eq!(parse("   "), Err(NodeError::EmptyPermission));
        assert!(matches!(parse("a..b"), Err(NodeError::IllegalSeparator(_))));
        assert!(matches!(parse(".a"), Err(NodeError::IllegalSeparator(_))));
        assert!(matches!(parse("a."), Err(NodeError::IllegalSeparator(_))));
    }

    #[test]
    fn test_structured_heads_without_payload_are_plain() {
        assert_eq!(parse("meta.only").unwrap().1, NodeKind::Permission);
        assert_eq!(parse("prefix").unwrap().1, NodeKind::Permission);
    }
}

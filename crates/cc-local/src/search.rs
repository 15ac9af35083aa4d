use std::collections::HashSet;

use regex::RegexBuilder;

use cc_base::error::{BackendError, BackendResult};
use cc_base::types::SearchResult;

use crate::index::TreeIndex;

/// Filter the index by a case-insensitive substring of node titles.
///
/// Matches keep their ancestors (so they stay reachable) and, for
/// directories, their whole subtree. An empty query returns the full tree
/// with every node counted as a match.
pub fn search(index: &TreeIndex, query: Option<&str>) -> BackendResult<SearchResult> {
    let term = query.unwrap_or_default().trim();
    if term.is_empty() {
        return Ok(SearchResult { results: index.to_tree(), match_count: index.len() });
    }

    let pattern = RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .map_err(|e| BackendError::Process(format!("invalid search term: {}", e)))?;

    let matches: HashSet<&str> =
        index.nodes.values().filter(|n| pattern.is_match(&n.title)).map(|n| n.id.as_str()).collect();

    let mut keep: HashSet<String> = HashSet::new();
    for id in &matches {
        add_ancestors(id, index, &mut keep);
        add_descendants(id, index, &mut keep);
    }

    let results = index.top_level.iter().filter_map(|id| index.build_node(id, &|n: &str| keep.contains(n))).collect();
    Ok(SearchResult { results, match_count: matches.len() })
}

/// Insert `id` and every ancestor of it.
pub fn add_ancestors(id: &str, index: &TreeIndex, keep: &mut HashSet<String>) {
    let mut cur = Some(id.to_string());
    while let Some(cid) = cur {
        cur = index.get(&cid).and_then(|n| n.parent.clone());
        keep.insert(cid);
    }
}

/// Insert `id` and its whole subtree.
pub fn add_descendants(id: &str, index: &TreeIndex, keep: &mut HashSet<String>) {
    let mut stack = vec![id.to_string()];
    while let Some(cur) = stack.pop() {
        if let Some(node) = index.get(&cur) {
            stack.extend(node.child_ids.iter().cloned());
        }
        keep.insert(cur);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_base::types::TreeNode;
    use pretty_assertions::assert_eq;

    fn index() -> TreeIndex {
        TreeIndex::from_tree(&[
            TreeNode::directory(
                "/p/docs",
                "docs",
                vec![TreeNode::file("/p/docs/Guide.md", "Guide.md"), TreeNode::file("/p/docs/api.md", "api.md")],
            ),
            TreeNode::directory("/p/src", "src", vec![TreeNode::file("/p/src/lib.rs", "lib.rs")]),
        ])
    }

    #[test]
    fn empty_query_returns_everything() {
        let idx = index();
        for q in [None, Some(""), Some("   ")] {
            let r = search(&idx, q).expect("search");
            assert_eq!(r.match_count, 5);
            assert_eq!(r.results.len(), 2);
        }
    }

    #[test]
    fn file_match_keeps_ancestors_only() {
        let r = search(&index(), Some("guide")).expect("search");
        assert_eq!(r.match_count, 1);
        assert_eq!(
            r.results,
            vec![TreeNode::directory("/p/docs", "docs", vec![TreeNode::file("/p/docs/Guide.md", "Guide.md")])]
        );
    }

    #[test]
    fn directory_match_keeps_subtree() {
        let r = search(&index(), Some("SRC")).expect("search");
        assert_eq!(r.match_count, 1);
        assert_eq!(r.results[0].children.len(), 1);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let r = search(&index(), Some(".*")).expect("search");
        assert_eq!(r.match_count, 0);
        assert!(r.results.is_empty());
    }
}

//! Arena-backed documentation tree.
//!
//! Nodes live in a flat arena and refer to each other through [`NodeId`]
//! handles. Children are owned top-down through `children`; the `parent`
//! handle is a lookup-only relation that is written exclusively by
//! [`DocTree::set_parent`] and the relink passes ([`DocTree::set_parents_downwards`],
//! [`DocTree::relink`]). Appending or merging never touches it, so a relink
//! must follow any structural change before upward queries are made.

use docsmith_shared::{DocsmithError, Result, Stat};
use tracing::{debug, warn};

use crate::node::{Content, Node, NodeSelector};

/// Handle to a node inside a [`DocTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A vertex of the documentation tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Name, unique among siblings once merging completes.
    pub name: String,
    /// Content descriptors.
    pub content: Content,
    /// Pending child resolution request.
    pub node_selector: Option<NodeSelector>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    stats: Vec<Stat>,
    source_location: Option<String>,
}

impl TreeNode {
    fn detached(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            content: node.content.clone(),
            node_selector: node.node_selector.clone(),
            children: Vec::new(),
            parent: None,
            stats: Vec::new(),
            source_location: None,
        }
    }

    /// Whether this node carries content (as opposed to being a container).
    pub fn is_document(&self) -> bool {
        self.content.is_document()
    }

    /// Ordered child handles.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Outcome of a [`DocTree::union`] merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnionReport {
    /// Names appended without a collision.
    pub appended: Vec<String>,
    /// `(original, new)` names of colliding nodes appended under a new name.
    pub renamed: Vec<(String, String)>,
    /// Incoming nodes skipped because an identical sibling already existed.
    pub identical: usize,
    /// Incoming nodes dropped because their collision could not be resolved.
    pub unresolved: Vec<String>,
}

/// A forest of documentation nodes.
#[derive(Debug, Clone, Default)]
pub struct DocTree {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl DocTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level nodes, in insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Insert a fragment as a new top-level tree. Parent links are not set.
    pub fn add_root(&mut self, node: Node) -> NodeId {
        let id = self.insert(node);
        self.roots.push(id);
        id
    }

    /// Append a fragment as the last child of `parent`. Parent links are not set.
    pub fn append_child(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.insert(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode::detached(&node));
        let children: Vec<NodeId> = node.nodes.into_iter().map(|child| self.insert(child)).collect();
        self.nodes[id.0].children = children;
        id
    }

    /// Rebuild the owned fragment rooted at `id`.
    pub fn to_node(&self, id: NodeId) -> Node {
        let n = &self.nodes[id.0];
        Node {
            name: n.name.clone(),
            content: n.content.clone(),
            node_selector: n.node_selector.clone(),
            nodes: n.children.iter().map(|c| self.to_node(*c)).collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Parent links
    // -----------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.nodes[id.0].parent = parent;
    }

    /// Walk the subtree under `id` and point every child at its container.
    pub fn set_parents_downwards(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let children = self.nodes[current.0].children.clone();
            for child in children {
                self.nodes[child.0].parent = Some(current);
                stack.push(child);
            }
        }
    }

    /// Relink the whole forest: roots get no parent, everything else its container.
    pub fn relink(&mut self) {
        for root in self.roots.clone() {
            self.nodes[root.0].parent = None;
            self.set_parents_downwards(root);
        }
    }

    /// Ancestors of `id`, root first, immediate parent last.
    pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
        match self.nodes[id.0].parent {
            None => Vec::new(),
            Some(parent) => {
                let mut chain = self.parents(parent);
                chain.push(parent);
                chain
            }
        }
    }

    /// The root of the tree containing `id`, or `None` if `id` is a root.
    pub fn root(&self, id: NodeId) -> Option<NodeId> {
        self.parents(id).first().copied()
    }

    /// Siblings of `id`, or `None` if it has no parent.
    pub fn peers(&self, id: NodeId) -> Option<Vec<NodeId>> {
        let parent = self.nodes[id.0].parent?;
        Some(
            self.nodes[parent.0]
                .children
                .iter()
                .copied()
                .filter(|c| *c != id)
                .collect(),
        )
    }

    /// Names of the ancestors of `id` joined by `separator`, skipping unnamed ones.
    pub fn path(&self, id: NodeId, separator: &str) -> String {
        self.parents(id)
            .into_iter()
            .map(|p| self.nodes[p.0].name.as_str())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }

    // -----------------------------------------------------------------------
    // Relative paths
    // -----------------------------------------------------------------------

    /// POSIX-style relative path from `from` to `to`, anywhere in the forest.
    ///
    /// A descendant is addressed as `./a/b`; an ancestor as `../..` followed by
    /// its name; a node on another branch climbs from `from`'s container to the
    /// deepest common ancestor (`.` when that is the container itself) and then
    /// descends. Nodes in different trees climb to the forest level and
    /// descend through the other tree's root. `from == to` yields its name.
    pub fn relative_path(&self, from: NodeId, to: NodeId) -> String {
        if from == to {
            return self.nodes[from.0].name.clone();
        }
        let mut from_chain = self.parents(from);
        from_chain.push(from);
        let mut to_chain = self.parents(to);
        to_chain.push(to);

        let common = to_chain.iter().rev().find(|n| from_chain.contains(n)).copied();
        let mut segments: Vec<&str> = Vec::new();

        let Some(common) = common else {
            climb(&mut segments, from_chain.len());
            segments.extend(to_chain.iter().map(|n| self.nodes[n.0].name.as_str()));
            return segments.join("/");
        };

        let from_idx = position(&from_chain, common);
        let to_idx = position(&to_chain, common);

        if common == from {
            segments.push(".");
            segments.extend(to_chain[to_idx + 1..].iter().map(|n| self.nodes[n.0].name.as_str()));
        } else if common == to {
            segments.extend(std::iter::repeat_n("..", from_chain.len() - from_idx - 1));
            segments.push(self.nodes[to.0].name.as_str());
        } else {
            climb(&mut segments, from_chain.len() - from_idx - 1);
            segments.extend(to_chain[to_idx + 1..].iter().map(|n| self.nodes[n.0].name.as_str()));
        }
        segments.join("/")
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Find the node that references `source` in any content descriptor.
    ///
    /// `any` itself is checked first, then its whole tree depth-first from
    /// the root. The first match wins.
    pub fn find_by_source(&self, source: &str, any: NodeId) -> Option<NodeId> {
        if self.nodes[any.0].content.references(source) {
            return Some(any);
        }
        let root = self.root(any).unwrap_or(any);
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if self.nodes[current.0].content.references(source) {
                return Some(current);
            }
            stack.extend(self.nodes[current.0].children.iter().rev());
        }
        None
    }

    /// Document nodes of the whole forest, depth-first in child order.
    pub fn documents(&self) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if self.nodes[current.0].is_document() {
                found.push(current);
            }
            stack.extend(self.nodes[current.0].children.iter().rev());
        }
        found
    }

    /// Recursively sort children by name, descending, at every level under `id`.
    pub fn sort_by_name(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let mut children = std::mem::take(&mut self.nodes[current.0].children);
            children.sort_by(|a, b| self.nodes[b.0].name.cmp(&self.nodes[a.0].name));
            stack.extend(children.iter().copied());
            self.nodes[current.0].children = children;
        }
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Merge `incoming` into the children of the container `target`.
    ///
    /// Shallow-with-rename policy: a node whose name is free is appended; a
    /// node deep-equal to the same-named child is skipped; any other
    /// collision is appended as a new sibling under `generate_name(node)`.
    /// When the generator yields an empty or unchanged name, or a name that
    /// is also taken, the incoming node is dropped and the existing child
    /// wins. Existing children are never modified. Parent links are not
    /// updated; call [`DocTree::relink`] afterwards.
    pub fn union<F>(
        &mut self,
        target: NodeId,
        incoming: Vec<Node>,
        mut generate_name: F,
    ) -> Result<UnionReport>
    where
        F: FnMut(&Node) -> String,
    {
        if self.nodes[target.0].is_document() {
            return Err(DocsmithError::structural(format!(
                "not a container node {}",
                self.display_path(target)
            )));
        }

        let mut report = UnionReport::default();
        for mut node in incoming {
            let Some(existing) = self.child_by_name(target, &node.name) else {
                report.appended.push(node.name.clone());
                self.append_child(target, node);
                continue;
            };

            if self.to_node(existing) == node {
                report.identical += 1;
                continue;
            }

            let new_name = generate_name(&node);
            if new_name.is_empty() || new_name == node.name {
                warn!(
                    node = %node.name,
                    container = %self.display_path(target),
                    "unresolved name collision, keeping existing node"
                );
                report.unresolved.push(node.name);
                continue;
            }
            if self.child_by_name(target, &new_name).is_some() {
                warn!(
                    node = %node.name,
                    new_name = %new_name,
                    container = %self.display_path(target),
                    "generated name is taken, keeping existing node"
                );
                report.unresolved.push(node.name);
                continue;
            }

            debug!(from = %node.name, to = %new_name, "renaming colliding node");
            let original = std::mem::replace(&mut node.name, new_name.clone());
            report.renamed.push((original, new_name));
            self.append_child(target, node);
        }
        Ok(report)
    }

    fn child_by_name(&self, container: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[container.0]
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].name == name)
    }

    fn display_path(&self, id: NodeId) -> String {
        let path = self.path(id, "/");
        if path.is_empty() {
            self.nodes[id.0].name.clone()
        } else {
            format!("{path}/{}", self.nodes[id.0].name)
        }
    }

    // -----------------------------------------------------------------------
    // Auxiliary data
    // -----------------------------------------------------------------------

    pub fn add_stats(&mut self, id: NodeId, stats: impl IntoIterator<Item = Stat>) {
        self.nodes[id.0].stats.extend(stats);
    }

    pub fn stats(&self, id: NodeId) -> &[Stat] {
        &self.nodes[id.0].stats
    }

    pub fn set_source_location(&mut self, id: NodeId, location: impl Into<String>) {
        self.nodes[id.0].source_location = Some(location.into());
    }

    pub fn source_location(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].source_location.as_deref()
    }
}

/// Push `..` for every level above the container of the chain's last node,
/// or `.` when there is none.
fn climb(segments: &mut Vec<&str>, below_common: usize) {
    if below_common > 1 {
        segments.extend(std::iter::repeat_n("..", below_common - 1));
    } else {
        segments.push(".");
    }
}

fn position(chain: &[NodeId], id: NodeId) -> usize {
    chain.iter().position(|n| *n == id).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::generate_new_name;

    /// root
    /// ├── guides
    /// │   ├── install.md
    /// │   └── advanced
    /// │       └── tuning.md
    /// └── api
    ///     └── client.md
    fn sample() -> (DocTree, NodeId) {
        let mut tree = DocTree::new();
        let root = tree.add_root(Node::container(
            "root",
            vec![
                Node::container(
                    "guides",
                    vec![
                        Node::document("install.md", "docs/install.md"),
                        Node::container(
                            "advanced",
                            vec![Node::document("tuning.md", "docs/tuning.md")],
                        ),
                    ],
                ),
                Node::container("api", vec![Node::document("client.md", "docs/client.md")]),
            ],
        ));
        tree.relink();
        (tree, root)
    }

    fn by_name(tree: &DocTree, name: &str) -> NodeId {
        (0..tree.len())
            .map(NodeId)
            .find(|id| tree.node(*id).name == name)
            .unwrap_or_else(|| panic!("no node named {name}"))
    }

    fn depth(tree: &DocTree, id: NodeId) -> usize {
        tree.parents(id).len()
    }

    /// Follow a path produced by `relative_path`. `None` is the forest level.
    fn resolve(tree: &DocTree, from: NodeId, path: &str) -> Option<NodeId> {
        let segments: Vec<&str> = path.split('/').collect();
        let base = match segments[0] {
            "." if segments.len() > 1 && child_named(tree, Some(from), segments[1]).is_some() => {
                Some(from)
            }
            _ => tree.parent(from),
        };
        let mut at = base;
        for segment in segments {
            match segment {
                "." => {}
                ".." => at = at.and_then(|n| tree.parent(n)),
                name => at = Some(child_named(tree, at, name)?),
            }
        }
        at
    }

    fn child_named(tree: &DocTree, at: Option<NodeId>, name: &str) -> Option<NodeId> {
        let candidates: Vec<NodeId> = match at {
            Some(n) => tree.children(n).to_vec(),
            None => tree.roots().to_vec(),
        };
        candidates.into_iter().find(|c| tree.node(*c).name == name)
    }

    #[test]
    fn relative_path_to_self_is_name() {
        let (tree, _) = sample();
        let install = by_name(&tree, "install.md");
        assert_eq!(tree.relative_path(install, install), "install.md");
    }

    #[test]
    fn relative_path_to_descendant() {
        let (tree, root) = sample();
        let tuning = by_name(&tree, "tuning.md");
        let guides = by_name(&tree, "guides");
        assert_eq!(tree.relative_path(guides, tuning), "./advanced/tuning.md");
        assert_eq!(tree.relative_path(root, tuning), "./guides/advanced/tuning.md");
    }

    #[test]
    fn relative_path_to_ancestor() {
        let (tree, root) = sample();
        let tuning = by_name(&tree, "tuning.md");
        let guides = by_name(&tree, "guides");

        let path = tree.relative_path(tuning, guides);
        assert_eq!(path, "../../guides");
        let ups = path.split('/').filter(|s| *s == "..").count();
        assert_eq!(ups, depth(&tree, tuning) - depth(&tree, guides));

        assert_eq!(tree.relative_path(tuning, root), "../../../root");
    }

    #[test]
    fn relative_path_across_branches() {
        let (tree, _) = sample();
        let install = by_name(&tree, "install.md");
        let tuning = by_name(&tree, "tuning.md");
        let client = by_name(&tree, "client.md");

        assert_eq!(tree.relative_path(install, tuning), "./advanced/tuning.md");
        assert_eq!(tree.relative_path(tuning, install), "../install.md");
        assert_eq!(tree.relative_path(tuning, client), "../../api/client.md");
    }

    #[test]
    fn relative_path_between_trees() {
        let (mut tree, _) = sample();
        let other = tree.add_root(Node::container(
            "blog",
            vec![Node::document("post.md", "blog/post.md")],
        ));
        tree.relink();
        let install = by_name(&tree, "install.md");
        let post = by_name(&tree, "post.md");

        assert_eq!(tree.relative_path(install, post), "../../blog/post.md");
        assert_eq!(tree.relative_path(other, install), "./root/guides/install.md");
        assert_eq!(resolve(&tree, install, "../../blog/post.md"), Some(post));
    }

    #[test]
    fn relative_path_round_trips_for_every_pair() {
        let (tree, _) = sample();
        for a in (0..tree.len()).map(NodeId) {
            for b in (0..tree.len()).map(NodeId) {
                if a == b {
                    continue;
                }
                let path = tree.relative_path(a, b);
                assert_eq!(
                    resolve(&tree, a, &path),
                    Some(b),
                    "{} -> {} via {path}",
                    tree.node(a).name,
                    tree.node(b).name
                );
            }
        }
    }

    #[test]
    fn parents_root_peers_and_path() {
        let (tree, root) = sample();
        let tuning = by_name(&tree, "tuning.md");
        let guides = by_name(&tree, "guides");
        let api = by_name(&tree, "api");

        let names: Vec<&str> = tree.parents(tuning).iter().map(|p| tree.node(*p).name.as_str()).collect();
        assert_eq!(names, vec!["root", "guides", "advanced"]);
        assert_eq!(tree.root(tuning), Some(root));
        assert_eq!(tree.root(root), None);
        assert_eq!(tree.peers(guides), Some(vec![api]));
        assert_eq!(tree.peers(root), None);
        assert_eq!(tree.path(tuning, "/"), "root/guides/advanced");
    }

    #[test]
    fn path_skips_unnamed_ancestors() {
        let mut tree = DocTree::new();
        let root = tree.add_root(Node::container(
            "",
            vec![Node::container("guides", vec![Node::document("a.md", "a.md")])],
        ));
        tree.relink();
        let a = by_name(&tree, "a.md");
        assert_eq!(tree.path(a, "/"), "guides");
        assert_eq!(tree.path(root, "/"), "");
    }

    #[test]
    fn append_does_not_set_parent_until_relink() {
        let (mut tree, root) = sample();
        let faq = tree.append_child(root, Node::document("faq.md", "faq.md"));
        assert_eq!(tree.parent(faq), None);
        tree.set_parents_downwards(root);
        assert_eq!(tree.parent(faq), Some(root));
    }

    #[test]
    fn find_by_source_searches_whole_tree() {
        let (mut tree, _) = sample();
        let install = by_name(&tree, "install.md");
        let client = by_name(&tree, "client.md");
        tree.node_mut(client)
            .content
            .content_selectors
            .push(crate::node::ContentSelector::new("shared/snippet.md"));

        assert_eq!(tree.find_by_source("docs/install.md", install), Some(install));
        assert_eq!(tree.find_by_source("docs/client.md", install), Some(client));
        assert_eq!(tree.find_by_source("shared/snippet.md", install), Some(client));
        assert_eq!(tree.find_by_source("missing.md", install), None);
    }

    #[test]
    fn sort_by_name_is_descending_at_every_level() {
        let (mut tree, root) = sample();
        let guides = by_name(&tree, "guides");
        tree.sort_by_name(root);

        let top: Vec<&str> = tree.children(root).iter().map(|c| tree.node(*c).name.as_str()).collect();
        assert_eq!(top, vec!["guides", "api"]);
        let nested: Vec<&str> = tree.children(guides).iter().map(|c| tree.node(*c).name.as_str()).collect();
        assert_eq!(nested, vec!["install.md", "advanced"]);
    }

    #[test]
    fn documents_in_depth_first_order() {
        let (tree, _) = sample();
        let names: Vec<&str> = tree.documents().iter().map(|d| tree.node(*d).name.as_str()).collect();
        assert_eq!(names, vec!["install.md", "tuning.md", "client.md"]);
    }

    #[test]
    fn union_appends_new_and_skips_identical() {
        let (mut tree, root) = sample();
        let incoming = vec![
            Node::container("api", vec![Node::document("client.md", "docs/client.md")]),
            Node::document("faq.md", "docs/faq.md"),
        ];

        let report = tree.union(root, incoming.clone(), generate_new_name).expect("union");
        assert_eq!(report.appended, vec!["faq.md".to_string()]);
        assert_eq!(report.identical, 1);

        let after_once = tree.to_node(root);
        let report = tree.union(root, incoming, generate_new_name).expect("union again");
        assert!(report.appended.is_empty());
        assert_eq!(report.identical, 2);
        assert_eq!(tree.to_node(root), after_once);
    }

    #[test]
    fn union_renames_conflicting_node_without_touching_existing() {
        let (mut tree, _) = sample();
        let guides = by_name(&tree, "guides");
        let install = by_name(&tree, "install.md");
        let before = tree.to_node(install);

        let incoming = vec![Node::document("install.md", "other-repo/setup/install.md")];
        let report = tree.union(guides, incoming, generate_new_name).expect("union");
        tree.relink();

        assert_eq!(
            report.renamed,
            vec![("install.md".to_string(), "setup/install.md".to_string())]
        );
        assert_eq!(tree.to_node(install), before);
        let names: Vec<&str> = tree.children(guides).iter().map(|c| tree.node(*c).name.as_str()).collect();
        assert_eq!(names, vec!["install.md", "advanced", "setup/install.md"]);
    }

    #[test]
    fn union_drops_unresolvable_conflict() {
        let (mut tree, root) = sample();
        let incoming = vec![Node::container("guides", vec![Node::document("new.md", "new.md")])];
        let report = tree.union(root, incoming, generate_new_name).expect("union");

        assert_eq!(report.unresolved, vec!["guides".to_string()]);
        assert_eq!(tree.children(root).len(), 2);
    }

    #[test]
    fn union_into_document_is_structural_error() {
        let (mut tree, _) = sample();
        let install = by_name(&tree, "install.md");
        let err = tree
            .union(install, vec![Node::document("x.md", "x.md")], generate_new_name)
            .unwrap_err();
        assert!(matches!(err, DocsmithError::Structural { .. }));
        assert!(err.to_string().contains("root/guides/install.md"));
    }

    #[test]
    fn stats_and_source_location() {
        let (mut tree, root) = sample();
        tree.add_stats(root, [Stat::new("content", "1 byte")]);
        tree.add_stats(root, [Stat::new("links", "0")]);
        assert_eq!(tree.stats(root).len(), 2);
        assert_eq!(tree.stats(root)[1].title, "links");

        tree.set_source_location(root, "/repo/docs");
        assert_eq!(tree.source_location(root), Some("/repo/docs"));
    }
}

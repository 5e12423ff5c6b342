//! Expression tree produced by the parser.
//!
//! Trees are plain owned values: a [`Node`] owns its children and never points
//! back at its parent. Parent lookups go through a [`NodePath`] computed on
//! demand from the root.

use std::fmt;
use std::sync::Arc;

/// Leaf payload of an expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    /// Operator name in the head position of a list.
    Operator(String),
    Number(f64),
    Text(String),
    /// `@name` reference into the variable store. Stored without the sigil.
    Variable(String),
}

impl Atom {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Atom::Operator(_) => "operator",
            Atom::Number(_) => "number",
            Atom::Text(_) => "string",
            Atom::Variable(_) => "variable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Atom(Atom),
    /// Operator application. The first child is always an operator atom.
    List(Vec<Node>),
}

/// Immutable node of a parsed formula. `offset` is the byte offset of the
/// node's first character in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub offset: usize,
}

impl Node {
    pub fn atom(atom: Atom, offset: usize) -> Self {
        Self {
            kind: NodeKind::Atom(atom),
            offset,
        }
    }

    pub fn list(children: Vec<Node>, offset: usize) -> Self {
        Self {
            kind: NodeKind::List(children),
            offset,
        }
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match &self.kind {
            NodeKind::Atom(atom) => Some(atom),
            NodeKind::List(_) => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::List(children) => children,
            NodeKind::Atom(_) => &[],
        }
    }

    /// Operator name when this node is an operator application.
    pub fn operator(&self) -> Option<&str> {
        match self.children().first().and_then(Node::as_atom) {
            Some(Atom::Operator(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Argument nodes of an operator application (everything after the head).
    pub fn args(&self) -> &[Node] {
        match self.children() {
            [] => &[],
            [_, rest @ ..] => rest,
        }
    }

    pub fn variable_name(&self) -> Option<&str> {
        match self.as_atom() {
            Some(Atom::Variable(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Follows `path` from this node. Each step indexes into `children()`.
    pub fn at(&self, path: &NodePath) -> Option<&Node> {
        path.0
            .iter()
            .try_fold(self, |node, &index| node.children().get(index))
    }

    /// Structural equality ignoring source offsets.
    pub fn equivalent(&self, other: &Node) -> bool {
        match (&self.kind, &other.kind) {
            (NodeKind::Atom(a), NodeKind::Atom(b)) => a == b,
            (NodeKind::List(a), NodeKind::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            _ => false,
        }
    }

    /// Depth of the tree rooted here; an atom has depth 1.
    pub fn depth(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(Node::depth)
            .max()
            .unwrap_or(0)
    }

    /// Visits every node in pre-order together with its path from `self`.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&NodePath, &Node),
    {
        let mut stack = vec![(NodePath::root(), self)];
        while let Some((path, node)) = stack.pop() {
            visit(&path, node);
            for (index, child) in node.children().iter().enumerate().rev() {
                stack.push((path.child(index), child));
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Atom(Atom::Operator(name)) => f.write_str(name),
            NodeKind::Atom(Atom::Number(value)) => write!(f, "{value}"),
            NodeKind::Atom(Atom::Variable(name)) => write!(f, "@{name}"),
            NodeKind::Atom(Atom::Text(text)) => {
                f.write_str("\"")?;
                for ch in text.chars() {
                    match ch {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str("\"")
            }
            NodeKind::List(children) => {
                f.write_str("(")?;
                for (index, child) in children.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Child-index path from a formula root to one of its nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(pub Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(index);
        Self(steps)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

/// Operator head that was not in the registry when the formula was parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedOperator {
    pub name: String,
    pub offset: usize,
}

/// A parsed formula, shared read-only by whichever event or goal owns it.
#[derive(Debug, Clone)]
pub struct Formula {
    root: Arc<Node>,
    unresolved: Vec<UnresolvedOperator>,
}

impl Formula {
    pub fn new(root: Node, unresolved: Vec<UnresolvedOperator>) -> Self {
        Self {
            root: Arc::new(root),
            unresolved,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Operator heads accepted in permissive mode without a registry entry.
    pub fn unresolved(&self) -> &[UnresolvedOperator] {
        &self.unresolved
    }

    /// Walks up from `path` and returns the path of the closest enclosing
    /// operator application.
    pub fn enclosing_operator(&self, path: &NodePath) -> Option<(NodePath, &str)> {
        let mut cursor = Some(path.clone());
        while let Some(current) = cursor {
            if let Some(name) = self.root.at(&current).and_then(Node::operator) {
                return Some((current, name));
            }
            cursor = current.parent();
        }
        None
    }

    pub fn equivalent(&self, other: &Formula) -> bool {
        self.root.equivalent(&other.root)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}

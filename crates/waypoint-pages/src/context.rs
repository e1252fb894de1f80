//! Route context arena.
//!
//! Every mounted route scope owns one node. Nodes form a chain: a node has at
//! most one child, and creating a second child under the same parent drops the
//! previous one (with its descendants). Nodes are removed when their scope is
//! dropped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use waypoint_urls::{FlatRoute, MatchOptions, RouteMatch, first_match};

/// Identifier of a node in a [`RouteContextTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(usize);

#[derive(Default)]
struct ContextNode {
	parent: Option<ContextId>,
	child: Option<ContextId>,
	active_route: Option<Rc<FlatRoute>>,
	routes: Vec<Rc<FlatRoute>>,
}

#[derive(Default)]
struct Arena {
	nodes: HashMap<ContextId, ContextNode>,
	next: usize,
}

impl Arena {
	fn remove_subtree(&mut self, id: ContextId) {
		let mut next = Some(id);
		while let Some(current) = next {
			next = self.nodes.remove(&current).and_then(|node| node.child);
		}
	}
}

/// Arena of route contexts shared by all scopes of one router.
#[derive(Clone, Default)]
pub struct RouteContextTree {
	arena: Rc<RefCell<Arena>>,
}

impl fmt::Debug for RouteContextTree {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteContextTree")
			.field("nodes", &self.len())
			.finish()
	}
}

impl RouteContextTree {
	/// Creates an empty arena.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a node below `parent`, replacing the parent's current child.
	pub fn create(&self, parent: Option<ContextId>, routes: Vec<Rc<FlatRoute>>) -> ContextId {
		let mut arena = self.arena.borrow_mut();
		let id = ContextId(arena.next);
		arena.next += 1;

		if let Some(parent_id) = parent {
			let previous = arena
				.nodes
				.get_mut(&parent_id)
				.and_then(|node| node.child.replace(id));
			if let Some(previous) = previous {
				tracing::debug!(?parent_id, ?previous, "replacing child route context");
				arena.remove_subtree(previous);
			}
		}

		arena.nodes.insert(
			id,
			ContextNode {
				parent,
				routes,
				..ContextNode::default()
			},
		);
		id
	}

	/// Removes `id` and its descendants and detaches it from its parent.
	pub fn remove(&self, id: ContextId) {
		let mut arena = self.arena.borrow_mut();
		let Some(parent) = arena.nodes.get(&id).map(|node| node.parent) else {
			return;
		};
		if let Some(parent) = parent.and_then(|parent| arena.nodes.get_mut(&parent)) {
			if parent.child == Some(id) {
				parent.child = None;
			}
		}
		arena.remove_subtree(id);
	}

	/// Returns whether `id` is still registered.
	pub fn contains(&self, id: ContextId) -> bool {
		self.arena.borrow().nodes.contains_key(&id)
	}

	/// Number of registered nodes.
	pub fn len(&self) -> usize {
		self.arena.borrow().nodes.len()
	}

	/// Returns `true` if no node is registered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// The parent of `id`.
	pub fn parent(&self, id: ContextId) -> Option<ContextId> {
		self.arena.borrow().nodes.get(&id)?.parent
	}

	/// The single child of `id`.
	pub fn child(&self, id: ContextId) -> Option<ContextId> {
		self.arena.borrow().nodes.get(&id)?.child
	}

	/// Ancestors of `id`, nearest first.
	pub fn ancestors(&self, id: ContextId) -> Vec<ContextId> {
		let arena = self.arena.borrow();
		let mut out = Vec::new();
		let mut next = arena.nodes.get(&id).and_then(|node| node.parent);
		while let Some(current) = next {
			out.push(current);
			next = arena.nodes.get(&current).and_then(|node| node.parent);
		}
		out
	}

	/// The active route of `id`.
	pub fn active_route(&self, id: ContextId) -> Option<Rc<FlatRoute>> {
		self.arena.borrow().nodes.get(&id)?.active_route.clone()
	}

	/// Sets the active route of `id`.
	pub fn set_active_route(&self, id: ContextId, route: Option<Rc<FlatRoute>>) {
		if let Some(node) = self.arena.borrow_mut().nodes.get_mut(&id) {
			node.active_route = route;
		}
	}

	/// The routes `id` resolves against.
	pub fn routes(&self, id: ContextId) -> Vec<Rc<FlatRoute>> {
		self.arena
			.borrow()
			.nodes
			.get(&id)
			.map(|node| node.routes.clone())
			.unwrap_or_default()
	}

	/// Replaces the routes `id` resolves against.
	pub fn set_routes(&self, id: ContextId, routes: Vec<Rc<FlatRoute>>) {
		if let Some(node) = self.arena.borrow_mut().nodes.get_mut(&id) {
			node.routes = routes;
		}
	}

	/// Matches `pathname` against the routes of `id`, then of each ancestor,
	/// returning the first scope that matches.
	pub fn current_match(
		&self,
		id: ContextId,
		pathname: &str,
		options: &MatchOptions,
	) -> Option<RouteMatch> {
		std::iter::once(id)
			.chain(self.ancestors(id))
			.find_map(|scope| first_match(pathname, &self.routes(scope), options))
	}
}

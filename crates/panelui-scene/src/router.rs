#![forbid(unsafe_code)]

//! Event routing.
//!
//! Explicitly targeted events go straight to their node with no tree
//! walk and no fallback. Position events descend from the root: each
//! node first checks itself (hit-test, not disabled, a listener bound
//! for the kind) and consumes the event on a match; only an unconsumed
//! event recurses into children, higher z before lower. The handled
//! flag is set after the consuming node's listeners run.
//!
//! Listeners receive the whole tree mutably. To make that sound, the
//! listener list is detached from the node while it runs and restored
//! afterwards; listeners bound to the same node and kind during
//! dispatch are kept, appended after the restored ones.

use panelui_core::event::{Event, EventTarget};
use panelui_core::id::NodeId;
use panelui_core::state::WidgetState;

use crate::error::SceneError;
use crate::tree::SceneTree;

impl SceneTree {
    /// Route one event through the tree.
    ///
    /// Returns whether a listener consumed it. An explicitly targeted
    /// event whose node has been despawned is an error so the caller
    /// can log the stale reference.
    pub fn dispatch(&mut self, event: &mut Event) -> Result<bool, SceneError> {
        match event.target {
            EventTarget::Node(node) => {
                let target = self.node_ref(node)?;
                if target.state.contains(WidgetState::DISABLED) {
                    return Ok(false);
                }
                if !self.listens_for(node, event.kind) {
                    return Ok(false);
                }
                self.invoke(node, event);
                Ok(true)
            }
            EventTarget::Position { x, y } => Ok(self.deliver(NodeId::ROOT, x, y, event)),
        }
    }

    /// Top-down descent for position events. A hidden node drops the
    /// event for its whole subtree; a disabled node skips only its own
    /// match, its children still see the event.
    fn deliver(&mut self, id: NodeId, x: u16, y: u16, event: &mut Event) -> bool {
        let Ok(node) = self.node_ref(id) else {
            return false;
        };
        if !node.visible {
            return false;
        }
        let hit = !node.state.contains(WidgetState::DISABLED) && node.bounds().contains(x, y);
        if hit && self.listens_for(id, event.kind) {
            self.invoke(id, event);
            return true;
        }

        // Topmost children first; absolutely positioned children may
        // lie outside the container, so the descent does not require
        // the container itself to be hit.
        let Ok(children) = self.children_by_z(id) else {
            return false;
        };
        for child in children.into_iter().rev() {
            if self.deliver(child, x, y, event) {
                return true;
            }
        }
        false
    }

    /// Run a node's listeners for the event's kind, then mark the event
    /// handled.
    fn invoke(&mut self, id: NodeId, event: &mut Event) {
        let Ok(node) = self.node_mut(id) else {
            return;
        };
        let Some(mut taken) = node.listeners.remove(&event.kind) else {
            return;
        };
        #[cfg(feature = "tracing")]
        tracing::trace!(node = %id, kind = ?event.kind, "dispatch");
        for listener in &mut taken {
            listener(self, id, event);
        }
        event.mark_handled();
        if let Ok(node) = self.node_mut(id) {
            match node.listeners.get_mut(&event.kind) {
                Some(bound_during_dispatch) => {
                    taken.append(bound_during_dispatch);
                    node.listeners.insert(event.kind, taken);
                }
                None => {
                    node.listeners.insert(event.kind, taken);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use panelui_core::event::EventKind;
    use panelui_render::color::Rgb565;

    use super::*;
    use crate::tree::tests::Swatch;
    use crate::tree::{Arrangement, Node};

    fn counter() -> (Rc<RefCell<Vec<NodeId>>>, impl Fn() -> Rc<RefCell<Vec<NodeId>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let handle = log.clone();
        (log, move || handle.clone())
    }

    fn log_listener(
        log: Rc<RefCell<Vec<NodeId>>>,
    ) -> impl FnMut(&mut SceneTree, NodeId, &mut Event) + 'static {
        move |_, id, _| log.borrow_mut().push(id)
    }

    #[test]
    fn explicit_target_skips_the_walk() {
        let (log, clone) = counter();
        let mut tree = SceneTree::new(100, 100);
        let a = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)).with_size(50, 50))
            .unwrap();
        let b = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::BLUE)).with_size(50, 50))
            .unwrap();
        tree.bind(a, EventKind::Focus, log_listener(clone())).unwrap();
        tree.bind(b, EventKind::Focus, log_listener(clone())).unwrap();
        tree.layout().unwrap();

        let mut ev = Event::for_node(EventKind::Focus, b, 0);
        assert!(tree.dispatch(&mut ev).unwrap());
        assert!(ev.is_handled());
        assert_eq!(*log.borrow(), vec![b]);
    }

    #[test]
    fn explicit_target_without_listener_is_not_handled() {
        let mut tree = SceneTree::new(100, 100);
        let a = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)))
            .unwrap();
        let mut ev = Event::for_node(EventKind::Click, a, 0);
        assert!(!tree.dispatch(&mut ev).unwrap());
        assert!(!ev.is_handled());
    }

    #[test]
    fn explicit_target_on_despawned_node_errors() {
        let mut tree = SceneTree::new(100, 100);
        let a = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)))
            .unwrap();
        tree.despawn(a).unwrap();
        let mut ev = Event::for_node(EventKind::Click, a, 0);
        assert_eq!(
            tree.dispatch(&mut ev).unwrap_err(),
            SceneError::UnknownNode { node: a }
        );
    }

    #[test]
    fn listening_container_consumes_before_its_children() {
        let (log, clone) = counter();
        let mut tree = SceneTree::new(100, 100);
        let panel = tree
            .add_child(NodeId::ROOT, Node::branch(Arrangement::Free))
            .unwrap();
        let button = tree
            .add_child(panel, Node::leaf(Swatch::new(Rgb565::RED)).with_size(20, 20).with_offset(10, 10))
            .unwrap();
        tree.bind(panel, EventKind::Click, log_listener(clone())).unwrap();
        tree.bind(button, EventKind::Click, log_listener(clone())).unwrap();
        tree.layout().unwrap();

        // The panel checks itself first; a hit consumes the event even
        // over a point inside a listening child.
        let mut on_button = Event::at_position(EventKind::Click, 15, 15, 0);
        assert!(tree.dispatch(&mut on_button).unwrap());
        assert_eq!(*log.borrow(), vec![panel]);
    }

    #[test]
    fn descent_reaches_children_when_the_container_does_not_listen() {
        let (log, clone) = counter();
        let mut tree = SceneTree::new(100, 100);
        let panel = tree
            .add_child(NodeId::ROOT, Node::branch(Arrangement::Free))
            .unwrap();
        let button = tree
            .add_child(panel, Node::leaf(Swatch::new(Rgb565::RED)).with_size(20, 20).with_offset(10, 10))
            .unwrap();
        tree.bind(button, EventKind::Click, log_listener(clone())).unwrap();
        tree.layout().unwrap();

        let mut on_button = Event::at_position(EventKind::Click, 15, 15, 0);
        assert!(tree.dispatch(&mut on_button).unwrap());
        // A miss on every listener leaves the event unhandled.
        let mut on_nothing = Event::at_position(EventKind::Click, 80, 80, 1);
        assert!(!tree.dispatch(&mut on_nothing).unwrap());
        assert_eq!(*log.borrow(), vec![button]);
    }

    #[test]
    fn higher_z_sibling_wins_the_hit_test() {
        let (log, clone) = counter();
        let mut tree = SceneTree::new(100, 100);
        let under = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)).with_size(40, 40))
            .unwrap();
        let over = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(Swatch::new(Rgb565::BLUE)).with_size(40, 40).with_z(5),
            )
            .unwrap();
        tree.bind(under, EventKind::Click, log_listener(clone())).unwrap();
        tree.bind(over, EventKind::Click, log_listener(clone())).unwrap();
        tree.layout().unwrap();

        let mut ev = Event::at_position(EventKind::Click, 10, 10, 0);
        assert!(tree.dispatch(&mut ev).unwrap());
        assert_eq!(*log.borrow(), vec![over]);
    }

    #[test]
    fn hidden_subtree_never_hit_tests() {
        let (log, clone) = counter();
        let mut tree = SceneTree::new(100, 100);
        let panel = tree
            .add_child(NodeId::ROOT, Node::branch(Arrangement::Free))
            .unwrap();
        let button = tree
            .add_child(panel, Node::leaf(Swatch::new(Rgb565::RED)).with_size(20, 20))
            .unwrap();
        tree.bind(button, EventKind::Click, log_listener(clone())).unwrap();
        tree.layout().unwrap();
        tree.hide(panel).unwrap();

        let mut ev = Event::at_position(EventKind::Click, 5, 5, 0);
        assert!(!tree.dispatch(&mut ev).unwrap());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn disabled_node_ignores_events() {
        let (log, clone) = counter();
        let mut tree = SceneTree::new(100, 100);
        let button = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(Swatch::new(Rgb565::RED))
                    .with_size(20, 20)
                    .with_state(WidgetState::DISABLED),
            )
            .unwrap();
        tree.bind(button, EventKind::Click, log_listener(clone())).unwrap();
        tree.layout().unwrap();

        let mut by_position = Event::at_position(EventKind::Click, 5, 5, 0);
        assert!(!tree.dispatch(&mut by_position).unwrap());
        let mut by_node = Event::for_node(EventKind::Click, button, 1);
        assert!(!tree.dispatch(&mut by_node).unwrap());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn disabled_container_does_not_block_its_children() {
        let (log, clone) = counter();
        let mut tree = SceneTree::new(100, 100);
        let panel = tree
            .add_child(
                NodeId::ROOT,
                Node::branch(Arrangement::Free).with_state(WidgetState::DISABLED),
            )
            .unwrap();
        let button = tree
            .add_child(panel, Node::leaf(Swatch::new(Rgb565::RED)).with_size(20, 20))
            .unwrap();
        tree.bind(panel, EventKind::Click, log_listener(clone())).unwrap();
        tree.bind(button, EventKind::Click, log_listener(clone())).unwrap();
        tree.layout().unwrap();

        // The disabled panel skips its own match but the walk continues
        // into the child.
        let mut ev = Event::at_position(EventKind::Click, 5, 5, 0);
        assert!(tree.dispatch(&mut ev).unwrap());
        assert!(ev.is_handled());
        assert_eq!(*log.borrow(), vec![button]);
    }

    #[test]
    fn listener_may_mutate_the_tree() {
        let mut tree = SceneTree::new(100, 100);
        let button = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)).with_size(20, 20))
            .unwrap();
        tree.bind(button, EventKind::Click, |tree, id, _| {
            let state = tree.state(id).unwrap_or_default();
            let _ = tree.set_state(id, state | WidgetState::CHECKED);
        })
        .unwrap();
        tree.layout().unwrap();

        let mut ev = Event::at_position(EventKind::Click, 5, 5, 0);
        assert!(tree.dispatch(&mut ev).unwrap());
        assert!(tree.state(button).unwrap().contains(WidgetState::CHECKED));
        // The listener survives its own dispatch.
        let mut again = Event::at_position(EventKind::Click, 5, 5, 1);
        assert!(tree.dispatch(&mut again).unwrap());
    }

    #[test]
    fn unbind_clears_all_listeners_for_the_kind() {
        let (log, clone) = counter();
        let mut tree = SceneTree::new(100, 100);
        let button = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)).with_size(20, 20))
            .unwrap();
        tree.bind(button, EventKind::Click, log_listener(clone())).unwrap();
        tree.bind(button, EventKind::Click, log_listener(clone())).unwrap();
        tree.unbind(button, EventKind::Click).unwrap();
        tree.layout().unwrap();

        let mut ev = Event::at_position(EventKind::Click, 5, 5, 0);
        assert!(!tree.dispatch(&mut ev).unwrap());
        assert!(log.borrow().is_empty());
    }
}

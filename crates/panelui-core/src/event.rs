#![forbid(unsafe_code)]

//! Input event model.
//!
//! Events are produced by input device drivers (touch panels, rotary
//! encoders, switches) and routed through the scene tree once per
//! scheduler cycle. The press/click timing state machines (`idle →
//! pressed → released | long-pressed`, double-click windows) belong to
//! the drivers; the router only consumes the resulting event kinds.
//!
//! An event is immutable until a listener consumes it; the only mutation
//! the router performs is setting the terminal `handled` flag.

use std::collections::BTreeMap;

use crate::id::NodeId;

/// The kind of an input event.
///
/// Kinds are `Ord` so listener registries can key on them with
/// deterministic iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// Finger down on a touch surface.
    TouchStart,
    /// Finger moved while down.
    TouchMove,
    /// Finger lifted.
    TouchEnd,
    /// Button or key pressed.
    Press,
    /// Button or key released.
    Release,
    /// Press held past the driver's long-press threshold.
    LongPress,
    /// Release after a long press.
    LongPressRelease,
    /// Press + release within the click window.
    Click,
    /// Two clicks within the double-click window.
    DoubleClick,
    /// Rotary encoder turned counter-clockwise.
    RotateLeft,
    /// Rotary encoder turned clockwise.
    RotateRight,
    /// Scroll gesture or wheel.
    Scroll,
    /// Widget gained focus.
    Focus,
    /// Widget lost focus.
    Unfocus,
    /// A widget's value changed.
    ValueChange,
    /// Application-defined event.
    Custom(u16),
}

/// How an event finds its destination node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    /// Deliver directly to a specific node, no tree walk.
    Node(NodeId),
    /// Hit-test a screen coordinate from the root down.
    Position {
        /// Screen x in pixels.
        x: u16,
        /// Screen y in pixels.
        y: u16,
    },
}

/// An input event.
#[derive(Debug, Clone)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Where it should go.
    pub target: EventTarget,
    /// Driver-supplied values (encoder ticks, pressure, ...).
    pub payload: BTreeMap<String, i64>,
    /// Monotonic timestamp in milliseconds, as reported by the driver.
    pub timestamp_ms: u64,
    handled: bool,
}

impl Event {
    /// Create an event aimed at a screen coordinate.
    #[must_use]
    pub fn at_position(kind: EventKind, x: u16, y: u16, timestamp_ms: u64) -> Self {
        Self {
            kind,
            target: EventTarget::Position { x, y },
            payload: BTreeMap::new(),
            timestamp_ms,
            handled: false,
        }
    }

    /// Create an event aimed at an explicit node.
    #[must_use]
    pub fn for_node(kind: EventKind, node: NodeId, timestamp_ms: u64) -> Self {
        Self {
            kind,
            target: EventTarget::Node(node),
            payload: BTreeMap::new(),
            timestamp_ms,
            handled: false,
        }
    }

    /// Attach a payload value (builder style).
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: i64) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Look up a payload value.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<i64> {
        self.payload.get(key).copied()
    }

    /// Whether a listener has already consumed this event.
    #[inline]
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        self.handled
    }

    /// Mark the event consumed. Terminal: there is no way back.
    #[inline]
    pub fn mark_handled(&mut self) {
        self.handled = true;
    }
}

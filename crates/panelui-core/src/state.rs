#![forbid(unsafe_code)]

//! Widget interaction state flags.

use bitflags::bitflags;

bitflags! {
    /// Interaction state of a node.
    ///
    /// Empty flags mean the default released/idle state. `DISABLED` nodes
    /// never match events during routing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WidgetState: u8 {
        /// Toggled or selected.
        const CHECKED  = 1 << 0;
        /// Holds input focus.
        const FOCUSED  = 1 << 1;
        /// Being edited (e.g. via an encoder).
        const EDITED   = 1 << 2;
        /// Pointer hovering.
        const HOVERED  = 1 << 3;
        /// Under pressure (touch or button held).
        const PRESSED  = 1 << 4;
        /// Mid-scroll.
        const SCROLLED = 1 << 5;
        /// Ignores all events.
        const DISABLED = 1 << 6;
    }
}

#[cfg(test)]
mod tests {
    use super::WidgetState;

    #[test]
    fn default_is_empty() {
        assert_eq!(WidgetState::default(), WidgetState::empty());
    }

    #[test]
    fn flags_combine() {
        let s = WidgetState::FOCUSED | WidgetState::PRESSED;
        assert!(s.contains(WidgetState::PRESSED));
        assert!(!s.contains(WidgetState::DISABLED));
    }
}

// SPDX-License-Identifier: MPL-2.0

//! Pointer gesture tracking for the overlay surface.
//!
//! Positions are surface-local, as Wayland reports them. Because the surface
//! follows the pointer while dragging, the pointer stays near the anchor in
//! surface coordinates and the delta is taken against the anchor, minus
//! whatever offset is still waiting to be applied.

/// Linux input code for the primary (left) mouse button.
pub const BTN_LEFT: u32 = 0x110;

/// Maximum gap between the two presses of a double-click.
pub const DOUBLE_CLICK_MS: u32 = 400;

/// Maximum pointer travel between the two presses of a double-click.
pub const DOUBLE_CLICK_SLOP: f64 = 4.0;

/// Drag-to-move state.
///
/// Margin changes take effect only once the compositor processes the
/// commit. Motion events queued before that are still relative to the old
/// surface position, so offsets that were sent but not yet applied are
/// subtracted from each new delta.
#[derive(Debug, Default)]
pub struct DragTracker {
    anchor: Option<(f64, f64)>,
    /// Sum of offsets sent to the compositor and not yet acknowledged
    unapplied: (i32, i32),
}

impl DragTracker {
    pub fn press(&mut self, position: (f64, f64)) {
        // The anchor is expressed against the position the window is heading to
        self.anchor = Some((
            position.0 - self.unapplied.0 as f64,
            position.1 - self.unapplied.1 as f64,
        ));
    }

    pub fn release(&mut self) {
        self.anchor = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.anchor.is_some()
    }

    /// Offset the window should move by for a motion event, if dragging.
    ///
    /// The returned offset counts as in flight until [`applied`](Self::applied)
    /// is called with it.
    pub fn motion(&mut self, position: (f64, f64)) -> Option<(i32, i32)> {
        let (ax, ay) = self.anchor?;
        let dx = (position.0 - ax).round() as i32 - self.unapplied.0;
        let dy = (position.1 - ay).round() as i32 - self.unapplied.1;
        if dx == 0 && dy == 0 {
            return None;
        }

        self.unapplied.0 += dx;
        self.unapplied.1 += dy;
        Some((dx, dy))
    }

    /// The compositor has applied a previously returned offset.
    pub fn applied(&mut self, offset: (i32, i32)) {
        self.unapplied.0 -= offset.0;
        self.unapplied.1 -= offset.1;
    }
}

/// Detects primary-button double-clicks from press timestamps.
#[derive(Debug, Default)]
pub struct ClickTracker {
    last_press: Option<(u32, (f64, f64))>,
}

impl ClickTracker {
    /// Register a press at `time` (ms, compositor clock). Returns `true` when
    /// it completes a double-click; the tracker then resets so a third press
    /// starts over.
    pub fn press(&mut self, time: u32, position: (f64, f64)) -> bool {
        if let Some((last_time, last_pos)) = self.last_press {
            let elapsed = time.wrapping_sub(last_time);
            let travel = (position.0 - last_pos.0).hypot(position.1 - last_pos.1);

            if elapsed <= DOUBLE_CLICK_MS && travel <= DOUBLE_CLICK_SLOP {
                self.last_press = None;
                return true;
            }
        }

        self.last_press = Some((time, position));
        false
    }
}

//! Generic events and the native event merger
//!
//! An adopted window is read by two X connections. The toolkit connection
//! receives keyboard, motion and window events and translates them itself.
//! Button presses can only be selected by one client, and the window
//! manager's close message is delivered to the window's creator, so both
//! arrive on the bridge connection. [`EventMerger`] drains that connection,
//! turns the interesting events into [`GenericEvent`]s, pushes them into the
//! toolkit queue and then lets the toolkit poll return the next event.

use std::collections::VecDeque;

/// Identifier the toolkit assigns to a window it knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowId(pub u32);

/// Wheel direction, mirrors the "flipped" flag of common toolkits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WheelDirection {
    Normal,
    Flipped,
}

/// Window-level notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowEvent {
    Close,
    Shown,
    Hidden,
    Exposed,
    Moved(i32, i32),
    Resized(u32, u32),
    Enter,
    Leave,
    FocusGained,
    FocusLost,
}

/// Toolkit-level event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenericEvent {
    Quit,
    Window {
        window: WindowId,
        event: WindowEvent,
    },
    MouseButtonDown {
        window: WindowId,
        button: u8,
        x: i32,
        y: i32,
    },
    MouseButtonUp {
        window: WindowId,
        button: u8,
        x: i32,
        y: i32,
    },
    MouseWheel {
        window: WindowId,
        x: i32,
        y: i32,
        direction: WheelDirection,
    },
    MouseMotion {
        window: WindowId,
        x: i32,
        y: i32,
    },
    KeyDown {
        window: WindowId,
        keycode: u8,
        keysym: u32,
    },
    KeyUp {
        window: WindowId,
        keycode: u8,
        keysym: u32,
    },
}

/// A generic event queue that can be fed from outside.
pub trait GenericEventPump {
    /// Append an event to the back of the queue.
    fn push_event(&mut self, event: GenericEvent);

    /// Non-blocking: return the next event, if any.
    fn poll_event(&mut self) -> Option<GenericEvent>;
}

/// FIFO backing store of the toolkit queue.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<GenericEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl GenericEventPump for EventQueue {
    fn push_event(&mut self, event: GenericEvent) {
        self.events.push_back(event);
    }

    fn poll_event(&mut self) -> Option<GenericEvent> {
        self.events.pop_front()
    }
}

/// The subset of X11 events the merger understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeEvent {
    ButtonPress { button: u8, x: i16, y: i16 },
    ButtonRelease { button: u8, x: i16, y: i16 },
    ClientMessage { message_type: u32, data0: u32 },
    ConnectionLost,
    Other,
}

/// Source of native events, bounded per call.
pub trait NativeEventSource {
    /// Number of events that can be read right now without blocking.
    fn pending(&mut self) -> usize;

    /// Dequeue one event. Only called up to `pending()` times.
    fn next_event(&mut self) -> Option<NativeEvent>;
}

/// First X button code used for wheel motion.
pub const WHEEL_FIRST_BUTTON: u8 = 4;
/// Last X button code used for wheel motion.
pub const WHEEL_LAST_BUTTON: u8 = 7;
/// Codes above the wheel range are shifted down by this much, so X button 8
/// becomes the first extra button (4).
pub const EXTRA_BUTTON_SHIFT: u8 = 4;

/// Translates bridge-owned native events into the toolkit queue.
#[derive(Debug, Clone)]
pub struct EventMerger {
    window: WindowId,
    wm_protocols: u32,
    wm_delete_window: u32,
    connection_lost: bool,
}

impl EventMerger {
    pub fn new(window: WindowId, wm_protocols: u32, wm_delete_window: u32) -> Self {
        Self {
            window,
            wm_protocols,
            wm_delete_window,
            connection_lost: false,
        }
    }

    /// Window the merged events are attributed to.
    pub fn window(&self) -> WindowId {
        self.window
    }

    /// Drain what is pending on `source`, inject translations into `queue`,
    /// then return the queue's next event.
    pub fn poll_event<S, Q>(&mut self, source: &mut S, queue: &mut Q) -> Option<GenericEvent>
    where
        S: NativeEventSource + ?Sized,
        Q: GenericEventPump + ?Sized,
    {
        let pending = source.pending();
        for _ in 0..pending {
            let Some(native) = source.next_event() else {
                break;
            };
            self.translate(native, |event| queue.push_event(event));
        }

        queue.poll_event()
    }

    /// Translate one native event, emitting zero or more generic events.
    pub fn translate(&mut self, native: NativeEvent, mut emit: impl FnMut(GenericEvent)) {
        match native {
            NativeEvent::ButtonPress { button, x, y } => {
                if !is_wheel_button(button) {
                    emit(GenericEvent::MouseButtonDown {
                        window: self.window,
                        button: remap_button(button),
                        x: x as i32,
                        y: y as i32,
                    });
                }
            }
            NativeEvent::ButtonRelease { button, x, y } => {
                if let Some((dx, dy, direction)) = wheel_ticks(button) {
                    emit(GenericEvent::MouseWheel {
                        window: self.window,
                        x: dx,
                        y: dy,
                        direction,
                    });
                } else {
                    emit(GenericEvent::MouseButtonUp {
                        window: self.window,
                        button: remap_button(button),
                        x: x as i32,
                        y: y as i32,
                    });
                }
            }
            NativeEvent::ClientMessage {
                message_type,
                data0,
            } => {
                if message_type == self.wm_protocols && data0 == self.wm_delete_window {
                    log::debug!("Close requested by window manager");
                    emit(GenericEvent::Window {
                        window: self.window,
                        event: WindowEvent::Close,
                    });
                    emit(GenericEvent::Quit);
                }
            }
            NativeEvent::ConnectionLost => {
                if !self.connection_lost {
                    self.connection_lost = true;
                    log::error!("Lost connection to the X server");
                    emit(GenericEvent::Quit);
                }
            }
            NativeEvent::Other => {}
        }
    }
}

/// True for the X button codes that encode wheel motion.
pub fn is_wheel_button(button: u8) -> bool {
    (WHEEL_FIRST_BUTTON..=WHEEL_LAST_BUTTON).contains(&button)
}

/// Wheel ticks (x, y) and direction for a wheel button code.
pub fn wheel_ticks(button: u8) -> Option<(i32, i32, WheelDirection)> {
    let (x, y) = match button {
        4 => (0, 1),
        5 => (0, -1),
        6 => (1, 0),
        7 => (-1, 0),
        _ => return None,
    };
    let direction = if button & 1 == 1 {
        WheelDirection::Flipped
    } else {
        WheelDirection::Normal
    };
    Some((x, y, direction))
}

/// Compact X button numbering after removing the wheel codes.
pub fn remap_button(button: u8) -> u8 {
    if button > WHEEL_LAST_BUTTON {
        button - EXTRA_BUTTON_SHIFT
    } else {
        button
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROTOCOLS: u32 = 300;
    const DELETE: u32 = 301;
    const WIN: WindowId = WindowId(1);

    struct FakeSource {
        events: VecDeque<NativeEvent>,
        pending_calls: usize,
    }

    impl FakeSource {
        fn new(events: Vec<NativeEvent>) -> Self {
            Self {
                events: events.into(),
                pending_calls: 0,
            }
        }
    }

    impl NativeEventSource for FakeSource {
        fn pending(&mut self) -> usize {
            self.pending_calls += 1;
            self.events.len()
        }

        fn next_event(&mut self) -> Option<NativeEvent> {
            self.events.pop_front()
        }
    }

    fn merger() -> EventMerger {
        EventMerger::new(WIN, PROTOCOLS, DELETE)
    }

    fn drain(queue: &mut EventQueue) -> Vec<GenericEvent> {
        std::iter::from_fn(|| queue.poll_event()).collect()
    }

    #[test]
    fn test_wheel_buttons_only_emit_on_release() {
        let mut m = merger();
        let mut out = Vec::new();
        for button in 4..=7u8 {
            m.translate(NativeEvent::ButtonPress { button, x: 0, y: 0 }, |e| out.push(e));
        }
        assert!(out.is_empty());

        for button in 4..=7u8 {
            m.translate(NativeEvent::ButtonRelease { button, x: 0, y: 0 }, |e| out.push(e));
        }
        assert_eq!(out.len(), 4);
        assert!(out
            .iter()
            .all(|e| matches!(e, GenericEvent::MouseWheel { .. })));
    }

    #[test]
    fn test_wheel_axes_and_direction() {
        assert_eq!(wheel_ticks(4), Some((0, 1, WheelDirection::Normal)));
        assert_eq!(wheel_ticks(5), Some((0, -1, WheelDirection::Flipped)));
        assert_eq!(wheel_ticks(6), Some((1, 0, WheelDirection::Normal)));
        assert_eq!(wheel_ticks(7), Some((-1, 0, WheelDirection::Flipped)));
        assert_eq!(wheel_ticks(3), None);
        assert_eq!(wheel_ticks(8), None);
    }

    #[test]
    fn test_button_codes_above_wheel_are_remapped() {
        let mut m = merger();
        let mut out = Vec::new();
        m.translate(NativeEvent::ButtonPress { button: 8, x: 3, y: 4 }, |e| out.push(e));
        m.translate(NativeEvent::ButtonRelease { button: 9, x: 3, y: 4 }, |e| out.push(e));
        m.translate(NativeEvent::ButtonPress { button: 1, x: 3, y: 4 }, |e| out.push(e));

        assert_eq!(
            out,
            vec![
                GenericEvent::MouseButtonDown { window: WIN, button: 4, x: 3, y: 4 },
                GenericEvent::MouseButtonUp { window: WIN, button: 5, x: 3, y: 4 },
                GenericEvent::MouseButtonDown { window: WIN, button: 1, x: 3, y: 4 },
            ]
        );
    }

    #[test]
    fn test_close_message_emits_close_then_quit_once() {
        let mut source = FakeSource::new(vec![NativeEvent::ClientMessage {
            message_type: PROTOCOLS,
            data0: DELETE,
        }]);
        let mut queue = EventQueue::new();
        let mut m = merger();

        let first = m.poll_event(&mut source, &mut queue);
        assert_eq!(
            first,
            Some(GenericEvent::Window { window: WIN, event: WindowEvent::Close })
        );
        assert_eq!(m.poll_event(&mut source, &mut queue), Some(GenericEvent::Quit));
        assert_eq!(m.poll_event(&mut source, &mut queue), None);
    }

    #[test]
    fn test_unrelated_client_messages_are_ignored() {
        let mut m = merger();
        let mut out = Vec::new();
        m.translate(
            NativeEvent::ClientMessage { message_type: PROTOCOLS, data0: 999 },
            |e| out.push(e),
        );
        m.translate(
            NativeEvent::ClientMessage { message_type: 42, data0: DELETE },
            |e| out.push(e),
        );
        m.translate(NativeEvent::Other, |e| out.push(e));
        assert!(out.is_empty());
    }

    #[test]
    fn test_poll_drains_pending_before_delegating() {
        let mut source = FakeSource::new(vec![
            NativeEvent::ButtonPress { button: 1, x: 0, y: 0 },
            NativeEvent::ButtonRelease { button: 1, x: 0, y: 0 },
        ]);
        let mut queue = EventQueue::new();
        queue.push_event(GenericEvent::MouseMotion { window: WIN, x: 5, y: 5 });
        let mut m = merger();

        // Toolkit events already queued come first, injected ones follow in order.
        assert_eq!(
            m.poll_event(&mut source, &mut queue),
            Some(GenericEvent::MouseMotion { window: WIN, x: 5, y: 5 })
        );
        assert!(source.events.is_empty());
        assert_eq!(source.pending_calls, 1);
        let rest = drain(&mut queue);
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn test_connection_lost_quits_once() {
        let mut m = merger();
        let mut out = Vec::new();
        m.translate(NativeEvent::ConnectionLost, |e| out.push(e));
        m.translate(NativeEvent::ConnectionLost, |e| out.push(e));
        assert_eq!(out, vec![GenericEvent::Quit]);
    }
}

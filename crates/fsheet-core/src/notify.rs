//! Boundary traits toward the UI layer.
//!
//! The engine never talks to widgets directly. After completing work it
//! fires these fire-and-forget notifications, and before a rebuild forced
//! by a direct grid edit under manual order it asks one blocking yes/no
//! question. Both traits have inert defaults so headless use (tests, bulk
//! import) needs no wiring.
//!
//! # Contract
//!
//! - Notifier calls happen only *after* the mutation is complete and the
//!   undo record is in place; implementations must not mutate the document
//!   from inside a callback.
//! - [`ConfirmEdit::confirm`] blocks the calling thread; the engine treats
//!   `false` as "abort before the first write".

/// Fire-and-forget display notifications.
pub trait Notifier {
    /// Row contents changed; re-render visible rows.
    fn rows_changed(&mut self) {}

    /// The node graph was rebuilt; re-render everything.
    fn structure_rebuilt(&mut self) {}

    /// Move the selection to the node with this folded key, if the view
    /// currently shows it.
    fn select_node(&mut self, _key: &str) {}
}

/// Blocking yes/no query used before a structural rebuild forced by a
/// direct ID/parent cell edit while manual order is active.
pub trait ConfirmEdit {
    /// Return `true` to proceed with the rebuild, `false` to abort the
    /// edit before any write happens.
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Notifier that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {}

/// Prompt that always answers yes. The default for headless documents;
/// interactive front ends substitute a real dialog.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullConfirm;

impl ConfirmEdit for NullConfirm {
    fn confirm(&mut self, _prompt: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        rebuilt: usize,
        selected: Vec<String>,
    }

    impl Notifier for Recording {
        fn structure_rebuilt(&mut self) {
            self.rebuilt += 1;
        }
        fn select_node(&mut self, key: &str) {
            self.selected.push(key.to_owned());
        }
    }

    #[test]
    fn recording_notifier_observes_calls() {
        let mut n = Recording::default();
        n.structure_rebuilt();
        n.select_node("alpha");
        assert_eq!(n.rebuilt, 1);
        assert_eq!(n.selected, vec!["alpha".to_owned()]);
    }

    #[test]
    fn null_confirm_says_yes() {
        assert!(NullConfirm.confirm("rebuild?"));
    }
}

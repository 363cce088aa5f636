//! The `window` mode: listing and activating open windows needs a live
//! connection to a display backend (X11/Wayland window manager queries)
//! that this picker does not own — out of scope here, same as the spec's
//! Non-goal on display-server integration. This stub always reports zero
//! entries so a user who selects `window` mode gets an empty list rather
//! than a crash or a silently wrong one.

use crate::{AcceptEvent, Mode, ModeResult, StateFlags};

#[derive(Debug, Default)]
pub struct WindowMode;

impl WindowMode {
    pub fn new() -> Self {
        Self
    }
}

impl Mode for WindowMode {
    fn name(&self) -> &str {
        "window"
    }

    fn init(&mut self) -> anyhow::Result<()> {
        tracing::warn!("window mode has no display-backend integration; listing will be empty");
        Ok(())
    }

    fn num_entries(&self) -> u32 {
        0
    }

    fn display(&self, _idx: u32, _want_text: bool) -> (Option<String>, StateFlags) {
        (None, StateFlags::empty())
    }

    fn completion(&self, _idx: u32) -> String {
        String::new()
    }

    fn result(&mut self, _event: AcceptEvent, _input: &str, _idx: Option<u32>) -> ModeResult {
        ModeResult::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_reports_zero_entries() {
        let mut mode = WindowMode::new();
        mode.init().unwrap();
        assert_eq!(mode.num_entries(), 0);
    }
}

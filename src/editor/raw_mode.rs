use std::io;
use std::sync::Once;

use crossterm::terminal;

static SET_PANIC_HOOK: Once = Once::new();

/// Raw mode for the duration of one `read_line`. Commands always run with the
/// terminal back in cooked mode so Ctrl-C reaches them as SIGINT.
pub struct RawModeGuard {
    was_raw: bool,
}

impl RawModeGuard {
    pub fn enter() -> io::Result<Self> {
        // a panic while raw would leave the terminal unusable
        SET_PANIC_HOOK.call_once(|| {
            let prev = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                let _ = terminal::disable_raw_mode();
                prev(info);
            }));
        });

        let was_raw = terminal::is_raw_mode_enabled()?;
        if !was_raw {
            terminal::enable_raw_mode()?;
        }
        Ok(Self { was_raw })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if !self.was_raw {
            let _ = terminal::disable_raw_mode();
        }
    }
}

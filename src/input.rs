use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::time::Duration;

/// What a key press asks the app to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Quit,
    Back,
    ToggleVariant,
    ToggleGlitch,
    ToggleHud,
    ToggleHelp,
    Reseed,
}

/// Drain whatever keys are pending without blocking the frame. Capped so a
/// paste storm cannot stall the animation.
pub(crate) fn collect_keys_nonblocking(max_wait: Duration) -> Result<Vec<KeyCode>> {
    let mut keys = Vec::new();
    let timeout = Duration::from_millis(1).min(max_wait);
    while event::poll(timeout)? {
        if let Event::Key(k) = event::read()? {
            if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                keys.push(k.code);
                if keys.len() >= 32 {
                    break;
                }
            }
        }
    }
    Ok(keys)
}

pub(crate) fn map_key(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') => Some(Action::Quit),
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Char('v') | KeyCode::Char('V') => Some(Action::ToggleVariant),
        KeyCode::Char('g') | KeyCode::Char('G') => Some(Action::ToggleGlitch),
        KeyCode::Char('h') | KeyCode::Char('H') => Some(Action::ToggleHud),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Action::Reseed),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        _ => None,
    }
}

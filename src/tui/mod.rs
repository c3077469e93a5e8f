//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! translates keyboard events into core::Action values, and turns the
//! `Effect`s returned by `update()` into spawned tasks.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Redraw Strategy
//!
//! - **Streaming**: draws every ~80ms so the spinner and live text move.
//! - **Idle**: sleeps up to 500ms, only redraws on input or task results.

mod component;
mod components;
mod event;
pub mod markdown;
mod ui;

use std::io::stdout;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crossterm::cursor::{SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::core::action::{Action, Effect, update};
use crate::core::config::ResolvedConfig;
use crate::core::state::App;
use crate::core::tasks::{self, Services};
use crate::cortex::{CortexAgentClient, CortexError, CortexThreadsClient};
use crate::tui::component::EventHandler;
use crate::tui::components::{InputBox, InputEvent, MessageListState, ThreadEvent, ThreadListState};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

/// Where keystrokes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Sidebar,
}

/// TUI-specific presentation state (not part of core business logic)
pub struct TuiState {
    pub message_list: MessageListState,
    pub input_box: InputBox,
    pub thread_list: ThreadListState,
    pub focus: Focus,
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            message_list: MessageListState::new(),
            input_box: InputBox::new(),
            thread_list: ThreadListState::new(),
            focus: Focus::Input, // User expects to type immediately
        }
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        // Kitty keyboard protocol is ignored by terminals that lack it
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
        info!("Terminal modes enabled (mouse, bracketed paste, keyboard enhancement)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste
        );
    }
}

/// Builds both service clients from a resolved config.
pub fn build_services(config: &ResolvedConfig) -> Result<Services, CortexError> {
    let endpoints = config.endpoints();
    let threads = CortexThreadsClient::new(&endpoints, config.request_timeout)?;
    let agent = CortexAgentClient::new(&endpoints, config.request_timeout, config.stream_idle_timeout)?;
    Ok(Services {
        threads: Arc::new(threads),
        agent: Arc::new(agent),
    })
}

/// Runs effects against the services. Holds the token of the turn in flight.
struct EffectRunner {
    services: Services,
    application: String,
    tx: mpsc::Sender<Action>,
    active_turn: Option<CancellationToken>,
}

impl EffectRunner {
    /// Returns true when the app should quit.
    fn run(&mut self, effect: Effect) -> bool {
        match effect {
            Effect::None => {}
            Effect::Quit => return true,
            Effect::SpawnTurn(request) => {
                info!("Spawning turn (thread={:?})", request.thread_id);
                let cancel = CancellationToken::new();
                self.active_turn = Some(cancel.clone());
                let services = self.services.clone();
                let tx = self.tx.clone();
                tokio::spawn(tasks::run_turn(services, request, tx, cancel));
            }
            Effect::CancelStream => match &self.active_turn {
                Some(token) => {
                    info!("Cancelling active turn");
                    token.cancel();
                }
                None => debug!("Cancel requested with no turn in flight"),
            },
            Effect::LoadThread(id) => {
                let services = self.services.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move { tasks::load_thread(&services, &id, &tx).await });
            }
            Effect::RefreshThreads => {
                let services = self.services.clone();
                let application = self.application.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move { tasks::refresh_threads(&services, &application, &tx).await });
            }
            Effect::DeleteThread(id) => {
                let services = self.services.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move { tasks::delete_thread(&services, &id, &tx).await });
            }
        }
        false
    }

    fn apply(&mut self, app: &mut App, action: Action) -> bool {
        if matches!(action, Action::StreamEnded { .. }) {
            self.active_turn = None;
        }
        let effect = update(app, action);
        self.run(effect)
    }
}

pub fn run(config: ResolvedConfig) -> std::io::Result<()> {
    let services = build_services(&config).map_err(std::io::Error::other)?;
    let mut app = App::from_config(&config);
    let mut tui = TuiState::new();

    let (tx, rx) = mpsc::channel();
    let mut effects = EffectRunner {
        services,
        application: app.application.clone(),
        tx,
        active_turn: None,
    };

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    effects.run(Effect::RefreshThreads);

    let start_time = Instant::now();
    let mut needs_redraw = true;

    loop {
        if app.is_streaming {
            needs_redraw = true;
        }

        if needs_redraw {
            tui.thread_list.sync(&app.threads);
            let spinner_frame = (start_time.elapsed().as_secs_f32() * 12.0) as usize;
            terminal.draw(|f| ui::draw_ui(f, &app, &mut tui, spinner_frame))?;
            needs_redraw = false;
        }

        let timeout = if app.is_streaming {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(500)
        };
        let first_event = poll_event_timeout(timeout);
        if first_event.is_some() {
            needs_redraw = true;
        }

        let mut should_quit = false;
        // Drain everything pending before the next draw
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            let sidebar_visible = terminal
                .size()
                .map(|s| ui::sidebar_visible(ratatui::layout::Rect::new(0, 0, s.width, s.height)))
                .unwrap_or(true);
            if handle_event(event, &mut app, &mut tui, &mut effects, sidebar_visible) {
                should_quit = true;
                break;
            }
        }
        if should_quit {
            break;
        }

        // Results from background tasks
        while let Ok(action) = rx.try_recv() {
            needs_redraw = true;
            debug!("Event loop received: {:?}", action);
            let reset_scroll = matches!(action, Action::ThreadLoaded { .. });
            if effects.apply(&mut app, action) {
                should_quit = true;
            }
            if reset_scroll {
                tui.message_list.reset();
            }
        }
        if should_quit {
            break;
        }
    }

    if let Some(token) = effects.active_turn.take() {
        token.cancel();
    }
    ratatui::restore();
    info!("Cortex chat exiting");
    Ok(())
}

/// Routes one terminal event. Returns true when the app should quit.
fn handle_event(
    event: TuiEvent,
    app: &mut App,
    tui: &mut TuiState,
    effects: &mut EffectRunner,
    sidebar_visible: bool,
) -> bool {
    match event {
        TuiEvent::Resize => return false,
        TuiEvent::ForceQuit => return effects.apply(app, Action::Quit),
        TuiEvent::NewThread => {
            let quit = effects.apply(app, Action::NewThread);
            tui.message_list.reset();
            return quit;
        }
        TuiEvent::ScrollUp
        | TuiEvent::ScrollDown
        | TuiEvent::ScrollPageUp
        | TuiEvent::ScrollPageDown => {
            tui.message_list.handle_event(&event);
            return false;
        }
        TuiEvent::Escape if app.is_streaming => return effects.apply(app, Action::CancelGeneration),
        TuiEvent::Escape if app.error.is_some() => return effects.apply(app, Action::DismissError),
        TuiEvent::ToggleFocus => {
            tui.focus = match tui.focus {
                Focus::Input if sidebar_visible => Focus::Sidebar,
                _ => Focus::Input,
            };
            return false;
        }
        _ => {}
    }

    match tui.focus {
        Focus::Sidebar => {
            if matches!(event, TuiEvent::Escape) {
                tui.focus = Focus::Input;
                return false;
            }
            let Some(thread_event) = tui.thread_list.handle_event(&event) else {
                return false;
            };
            let action = match thread_event {
                ThreadEvent::Open(id) => {
                    tui.message_list.reset();
                    tui.focus = Focus::Input;
                    Action::SelectThread(id)
                }
                ThreadEvent::CreateNew => {
                    tui.message_list.reset();
                    tui.focus = Focus::Input;
                    Action::NewThread
                }
                ThreadEvent::Delete(id) => Action::DeleteThread(id),
                ThreadEvent::Refresh => Action::RefreshThreads,
            };
            effects.apply(app, action)
        }
        Focus::Input => {
            // Keep the typed prompt while an answer is still streaming
            tui.input_box.disabled = app.is_streaming;
            match tui.input_box.handle_event(&event) {
                Some(InputEvent::Submit(text)) => effects.apply(app, Action::Submit(text)),
                Some(InputEvent::ContentChanged) | None => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeThreadStore, ScriptedAgent, test_app};

    fn runner() -> (EffectRunner, mpsc::Receiver<Action>) {
        let (tx, rx) = mpsc::channel();
        let runner = EffectRunner {
            services: Services {
                threads: Arc::new(FakeThreadStore::default()),
                agent: Arc::new(ScriptedAgent::default()),
            },
            application: "test-app".to_string(),
            tx,
            active_turn: None,
        };
        (runner, rx)
    }

    fn type_text(text: &str, app: &mut App, tui: &mut TuiState, effects: &mut EffectRunner) {
        for c in text.chars() {
            handle_event(TuiEvent::InputChar(c), app, tui, effects, true);
        }
    }

    #[tokio::test]
    async fn test_enter_submits_and_spawns_turn() {
        let (mut effects, _rx) = runner();
        let mut app = test_app();
        let mut tui = TuiState::new();

        type_text("hello", &mut app, &mut tui, &mut effects);
        handle_event(TuiEvent::Submit, &mut app, &mut tui, &mut effects, true);

        assert!(app.is_streaming);
        assert!(effects.active_turn.is_some());
        assert!(tui.input_box.buffer.is_empty());
    }

    #[tokio::test]
    async fn test_escape_cancels_active_turn() {
        let (mut effects, _rx) = runner();
        let mut app = test_app();
        let mut tui = TuiState::new();
        type_text("hello", &mut app, &mut tui, &mut effects);
        handle_event(TuiEvent::Submit, &mut app, &mut tui, &mut effects, true);

        let token = effects.active_turn.clone().unwrap();
        handle_event(TuiEvent::Escape, &mut app, &mut tui, &mut effects, true);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_tab_toggles_focus_only_when_sidebar_visible() {
        let (mut effects, _rx) = runner();
        let mut app = test_app();
        let mut tui = TuiState::new();

        handle_event(TuiEvent::ToggleFocus, &mut app, &mut tui, &mut effects, false);
        assert_eq!(tui.focus, Focus::Input);
        handle_event(TuiEvent::ToggleFocus, &mut app, &mut tui, &mut effects, true);
        assert_eq!(tui.focus, Focus::Sidebar);
        handle_event(TuiEvent::Escape, &mut app, &mut tui, &mut effects, true);
        assert_eq!(tui.focus, Focus::Input);
    }

    #[test]
    fn test_sidebar_keys_do_not_type() {
        let (mut effects, _rx) = runner();
        let mut app = test_app();
        let mut tui = TuiState::new();
        tui.focus = Focus::Sidebar;

        handle_event(TuiEvent::InputChar('x'), &mut app, &mut tui, &mut effects, true);
        assert!(tui.input_box.buffer.is_empty());
    }

    #[tokio::test]
    async fn test_enter_while_streaming_keeps_draft() {
        let (mut effects, _rx) = runner();
        let mut app = test_app();
        let mut tui = TuiState::new();
        type_text("first", &mut app, &mut tui, &mut effects);
        handle_event(TuiEvent::Submit, &mut app, &mut tui, &mut effects, true);

        type_text("second", &mut app, &mut tui, &mut effects);
        handle_event(TuiEvent::Submit, &mut app, &mut tui, &mut effects, true);
        assert_eq!(tui.input_box.buffer, "second");
        assert_eq!(app.transcript.len(), 1);
    }

    #[test]
    fn test_ctrl_c_quits() {
        let (mut effects, _rx) = runner();
        let mut app = test_app();
        let mut tui = TuiState::new();
        assert!(handle_event(TuiEvent::ForceQuit, &mut app, &mut tui, &mut effects, true));
    }

    #[test]
    fn test_stream_end_clears_active_turn() {
        let (mut effects, _rx) = runner();
        let mut app = test_app();
        effects.active_turn = Some(CancellationToken::new());
        effects.apply(&mut app, Action::StreamEnded { error: None });
        assert!(effects.active_turn.is_none());
    }
}

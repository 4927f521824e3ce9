use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::host::{Host, SystemHost};
use crate::link::{GatewayLink, LinkEvent};
use crate::protocol::decode_event;
use crate::render::Renderer;
use crate::shell::{run_shell_escape, ShellOutcome};
use crate::state::{Phase, SessionMachine, Step};
use crate::util::endpoint_label;

pub const FRAME_INTERVAL: Duration = Duration::from_millis(33);
const DOUBLE_INTERRUPT_EXIT_WINDOW: Duration = Duration::from_millis(900);

pub enum UserInput {
    Line(String),
    Interrupt,
    Quit,
}

/// The surface the app loop drives. `poll_input` must return within one
/// frame's worth of waiting so the loop keeps its repaint cadence.
pub trait Frontend: Renderer {
    fn poll_input(&mut self) -> Option<UserInput>;
    fn render_frame(&mut self, status: &str);
    fn should_quit(&self) -> bool;
}

/// Wires the machine to the link and a frontend: one pass per frame polls
/// input, drains link events through the decoder, feeds back shell results,
/// and flushes the coalesced renders.
pub struct App<H: Host> {
    machine: SessionMachine<H>,
    link: GatewayLink,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    shell_tx: mpsc::UnboundedSender<(String, ShellOutcome)>,
    shell_rx: mpsc::UnboundedReceiver<(String, ShellOutcome)>,
    endpoint: String,
    connected: bool,
    last_interrupt: Option<Instant>,
    terminate: Arc<AtomicBool>,
}

impl App<SystemHost> {
    pub fn new(config: &Config) -> Self {
        let (link, link_rx) = GatewayLink::connect(&config.gateway_url);
        Self::with_parts(
            SessionMachine::new(SystemHost),
            link,
            link_rx,
            &config.gateway_url,
        )
    }
}

impl<H: Host> App<H> {
    pub fn with_parts(
        machine: SessionMachine<H>,
        link: GatewayLink,
        link_rx: mpsc::UnboundedReceiver<LinkEvent>,
        gateway_url: &str,
    ) -> Self {
        let (shell_tx, shell_rx) = mpsc::unbounded_channel();
        Self {
            machine,
            link,
            link_rx,
            shell_tx,
            shell_rx,
            endpoint: endpoint_label(gateway_url),
            connected: false,
            last_interrupt: None,
            terminate: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn run<F: Frontend>(mut self, frontend: &mut F) -> Result<()> {
        self.spawn_terminate_watch();
        let mut last_flush = Instant::now();

        loop {
            if frontend.should_quit() || self.terminate.load(Ordering::SeqCst) {
                break;
            }

            if let Some(input) = frontend.poll_input() {
                match input {
                    UserInput::Line(line) => {
                        let step = self.machine.handle_input(&line);
                        self.apply_step(step, frontend);
                    }
                    UserInput::Interrupt => {
                        if self.handle_interrupt(frontend) {
                            break;
                        }
                    }
                    UserInput::Quit => break,
                }
            }

            while let Ok(event) = self.link_rx.try_recv() {
                match event {
                    LinkEvent::Connected => self.connected = true,
                    LinkEvent::Disconnected => self.connected = false,
                    LinkEvent::Frame(frame) => match decode_event(&frame) {
                        Ok(event) => {
                            let step = self.machine.handle_event(event);
                            self.apply_step(step, frontend);
                        }
                        Err(error) => {
                            tracing::debug!(%error, "dropped undecodable frame");
                        }
                    },
                }
            }

            while let Ok((command, outcome)) = self.shell_rx.try_recv() {
                let step = self.machine.shell_finished(&command, outcome);
                self.apply_step(step, frontend);
            }

            if last_flush.elapsed() >= FRAME_INTERVAL {
                for op in self.machine.flush_dirty() {
                    frontend.apply(op);
                }
                last_flush = Instant::now();
            }

            frontend.render_frame(&self.status_line());
        }

        // Clean link shutdown before the terminal is handed back.
        self.link.disconnect().await;
        Ok(())
    }

    fn apply_step<F: Frontend>(&mut self, step: Step, frontend: &mut F) {
        for op in step.ops {
            frontend.apply(op);
        }
        for command in step.outbound {
            self.link.send(command.to_frame());
        }
        if let Some(command) = step.shell {
            let tx = self.shell_tx.clone();
            let working_dir = self.machine.host().working_dir();
            tokio::spawn(async move {
                let outcome = run_shell_escape(&command, &working_dir).await;
                let _ = tx.send((command, outcome));
            });
        }
    }

    /// First interrupt aborts the in-flight turn (advisory); a second one
    /// inside the exit window quits.
    fn handle_interrupt<F: Frontend>(&mut self, frontend: &mut F) -> bool {
        let now = Instant::now();
        let doubled = self
            .last_interrupt
            .is_some_and(|previous| now.duration_since(previous) <= DOUBLE_INTERRUPT_EXIT_WINDOW);
        self.last_interrupt = Some(now);
        if doubled {
            return true;
        }
        if self.machine.phase() != Phase::Idle {
            let step = self.machine.handle_input("/abort");
            self.apply_step(step, frontend);
        }
        false
    }

    fn status_line(&self) -> String {
        let conn = if self.connected { "up" } else { "down" };
        let model = self.machine.current_model().unwrap_or("?");
        let mut status = format!(
            "gw:{} conn:{conn} model:{model} turn:{}",
            self.endpoint,
            self.machine.turn_count()
        );
        match self.machine.phase() {
            Phase::Idle => {}
            Phase::TurnActive => status.push_str(" streaming"),
            Phase::ToolRunning => status.push_str(" tool"),
        }
        if self.machine.compacting() {
            status.push_str(&format!(
                " compacting({} queued)",
                self.machine.queued_inputs()
            ));
        }
        status
    }

    fn spawn_terminate_watch(&self) {
        let terminate = Arc::clone(&self.terminate);
        tokio::spawn(async move {
            if let Ok(mut sigterm) =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            {
                sigterm.recv().await;
                terminate.store(true, Ordering::SeqCst);
            }
        });
    }
}

use crate::format::{
    format_compaction_summary, format_context_info, format_model_info, format_model_list,
};
use crate::host::Host;
use crate::protocol::{ClientCommand, ServerEvent};
use crate::render::scheduler::RenderScheduler;
use crate::render::RenderOp;
use crate::shell::ShellOutcome;
use crate::state::barrier::CompactionBarrier;
use crate::state::block::{BlockId, BlockKind, BlockLedger};
use crate::tool_preview::{tool_header, tool_status_marker};
use crate::truncate::truncate_display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    TurnActive,
    ToolRunning,
}

#[derive(Debug)]
struct ActiveTool {
    tool_name: String,
    tool_call_id: String,
    header: String,
    partial: String,
}

/// Per-turn scratch state, reset at `turn_start` and dropped when the turn
/// ends. `accumulated_text` mirrors every delta of the turn regardless of
/// how the text is split across blocks.
#[derive(Debug, Default)]
struct TurnState {
    accumulated_text: String,
    active_tool: Option<ActiveTool>,
}

/// Output of one machine step: render operations to apply immediately,
/// outbound commands for the transport link, and an optional local
/// shell-escape request the caller runs off the event path.
#[derive(Debug, Default)]
pub struct Step {
    pub ops: Vec<RenderOp>,
    pub outbound: Vec<ClientCommand>,
    pub shell: Option<String>,
}

/// The session event-stream state machine. Consumes decoded gateway events
/// in arrival order, owns the block ledger and the compaction barrier, and
/// classifies user input into outbound commands. Streaming updates go
/// through the render scheduler; everything structural renders
/// synchronously.
pub struct SessionMachine<H: Host> {
    host: H,
    phase: Phase,
    turn: TurnState,
    turn_counter: u64,
    ledger: BlockLedger,
    barrier: CompactionBarrier,
    scheduler: RenderScheduler,
    current_model: Option<String>,
    dropped_events: u64,
}

impl<H: Host> SessionMachine<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            phase: Phase::Idle,
            turn: TurnState::default(),
            turn_counter: 0,
            ledger: BlockLedger::new(),
            barrier: CompactionBarrier::new(),
            scheduler: RenderScheduler::new(),
            current_model: None,
            dropped_events: 0,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn compacting(&self) -> bool {
        self.barrier.is_active()
    }

    pub fn queued_inputs(&self) -> usize {
        self.barrier.len()
    }

    pub fn turn_count(&self) -> u64 {
        self.turn_counter
    }

    pub fn current_model(&self) -> Option<&str> {
        self.current_model.as_deref()
    }

    /// Events that arrived in a state where they have no meaning. Diagnostic
    /// only; the stream stays consumable.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    pub fn accumulated_turn_text(&self) -> &str {
        &self.turn.accumulated_text
    }

    /// One transition per server event.
    pub fn handle_event(&mut self, event: ServerEvent) -> Step {
        let mut step = Step::default();
        match event {
            ServerEvent::UserMessage { message } => {
                self.push_final(BlockKind::UserEcho, message, &mut step);
            }
            ServerEvent::TurnStart => {
                self.finalize_open_blocks(&mut step);
                self.turn_counter += 1;
                self.turn = TurnState::default();
                self.phase = Phase::TurnActive;
                let (_, block) = self.ledger.open_text(String::new());
                step.ops.push(RenderOp::Append(block));
            }
            ServerEvent::TextDelta { delta } => {
                if self.phase == Phase::Idle {
                    self.drop_event("text_delta");
                    return step;
                }
                self.turn.accumulated_text.push_str(&delta);
                let id = match self.ledger.open_text_id() {
                    Some(id) => id,
                    None => {
                        // Text resuming after a tool or a mid-turn
                        // compaction: open a fresh segment.
                        let (_, block) = self.ledger.open_text(String::new());
                        let id = block.id;
                        step.ops.push(RenderOp::Append(block));
                        id
                    }
                };
                self.ledger.append_text(id, &delta);
                self.scheduler.mark_dirty(id);
            }
            ServerEvent::ToolStart {
                tool_name,
                tool_call_id,
                args,
            } => {
                if self.phase == Phase::Idle {
                    self.drop_event("tool_start");
                    return step;
                }
                self.finalize_open_text(&mut step);
                let header = tool_header(&tool_name, &args);
                let (previous, block) =
                    self.ledger
                        .open_tool(&tool_name, &tool_call_id, header.clone());
                if let Some(previous) = previous {
                    self.scheduler.cancel(previous.id);
                    step.ops.push(RenderOp::Update(previous));
                }
                step.ops.push(RenderOp::Append(block));
                self.turn.active_tool = Some(ActiveTool {
                    tool_name,
                    tool_call_id,
                    header,
                    partial: String::new(),
                });
                self.phase = Phase::ToolRunning;
            }
            ServerEvent::ToolUpdate {
                tool_call_id,
                partial_result,
                ..
            } => {
                let open_tool = self.ledger.open_tool_id();
                let text = match self.turn.active_tool.as_mut() {
                    Some(tool) if tool.tool_call_id == tool_call_id => {
                        tool.partial.push_str(&partial_result);
                        Some(format!(
                            "{}\n{}",
                            tool.header,
                            truncate_display(&tool.partial)
                        ))
                    }
                    _ => None,
                };
                match (text, open_tool) {
                    (Some(text), Some(id)) => {
                        self.ledger.set_text(id, text);
                        self.scheduler.mark_dirty(id);
                    }
                    _ => self.drop_event("tool_update"),
                }
            }
            ServerEvent::ToolEnd {
                tool_call_id,
                tool_name,
                result,
                is_error,
            } => {
                let open_tool = self.ledger.open_tool_id();
                match (self.turn.active_tool.take(), open_tool) {
                    (Some(tool), Some(id)) if tool.tool_call_id == tool_call_id => {
                        let status = tool_status_marker(&tool_name, is_error);
                        let body = result.trim_end();
                        let text = if body.is_empty() {
                            format!("{}\n{status}", tool.header)
                        } else {
                            format!("{}\n{}\n{status}", tool.header, truncate_display(body))
                        };
                        self.ledger.set_text(id, text);
                        self.finalize_block(id, &mut step);
                        self.phase = Phase::TurnActive;
                    }
                    (active_tool, _) => {
                        self.turn.active_tool = active_tool;
                        self.drop_event("tool_end");
                    }
                }
            }
            ServerEvent::TurnEnd | ServerEvent::AgentEnd => {
                if self.phase == Phase::Idle {
                    self.drop_event("turn_end");
                    return step;
                }
                self.finalize_open_blocks(&mut step);
                self.turn = TurnState::default();
                self.phase = Phase::Idle;
            }
            ServerEvent::Error { message } => {
                self.finalize_open_blocks(&mut step);
                self.push_final(BlockKind::Error, message, &mut step);
                self.turn = TurnState::default();
                self.phase = Phase::Idle;
            }
            ServerEvent::ContextInfo {
                system,
                tools,
                user,
                assistant,
                tool_results,
                context_window,
            } => {
                let text = format_context_info(
                    system,
                    tools,
                    user,
                    assistant,
                    tool_results,
                    context_window,
                    self.host.columns(),
                );
                self.push_final(BlockKind::Notice, text, &mut step);
            }
            ServerEvent::CompactionStart => {
                self.barrier.activate();
                self.push_final(
                    BlockKind::Notice,
                    "[compacting context...]".to_string(),
                    &mut step,
                );
            }
            ServerEvent::CompactionEnd {
                summary,
                tokens_before,
            } => {
                self.barrier.deactivate();
                self.scheduler.clear();
                self.ledger.clear();
                step.ops.push(RenderOp::Clear);
                self.push_final(
                    BlockKind::CompactionSummary,
                    format_compaction_summary(&summary, tokens_before),
                    &mut step,
                );
                step.outbound.extend(self.barrier.drain());
            }
            ServerEvent::ModelList {
                models,
                current,
                reasoning_effort,
            } => {
                let text = format_model_list(&models, &current, reasoning_effort.as_deref());
                self.current_model = Some(current);
                self.push_final(BlockKind::Notice, text, &mut step);
            }
            ServerEvent::ModelSet { model } => {
                self.push_final(BlockKind::Notice, format!("[model set: {model}]"), &mut step);
                self.current_model = Some(model);
            }
            ServerEvent::ModelInfo {
                model,
                name,
                description,
                context_length,
                pricing,
                max_completion_tokens,
            } => {
                let text = format_model_info(
                    &model,
                    name.as_deref(),
                    description.as_deref(),
                    context_length,
                    &pricing,
                    max_completion_tokens,
                );
                self.push_final(BlockKind::Notice, text, &mut step);
            }
            ServerEvent::ReasoningEffortSet { effort, error } => match (effort, error) {
                (_, Some(error)) => {
                    self.push_final(BlockKind::Error, format!("[effort: {error}]"), &mut step);
                }
                (Some(effort), None) => {
                    self.push_final(
                        BlockKind::Notice,
                        format!("[reasoning effort: {effort}]"),
                        &mut step,
                    );
                }
                (None, None) => self.drop_event("reasoning_effort_set"),
            },
        }
        step
    }

    /// Classifies one line of user input. Recognized command forms route to
    /// dedicated outbound messages and bypass the compaction barrier; plain
    /// text is conversation content and is queued while compacting.
    pub fn handle_input(&mut self, line: &str) -> Step {
        let mut step = Step::default();
        let input = line.trim();
        if input.is_empty() {
            return step;
        }

        if let Some(rest) = input.strip_prefix('!') {
            let command = rest.trim();
            if command.is_empty() {
                self.push_final(
                    BlockKind::Error,
                    "[shell: empty command]".to_string(),
                    &mut step,
                );
            } else {
                step.shell = Some(command.to_string());
            }
            return step;
        }

        if let Some(command) = self.classify_command(input) {
            if command == ClientCommand::Abort {
                self.push_final(BlockKind::Notice, "[Abort sent]".to_string(), &mut step);
            }
            step.outbound.push(command);
            return step;
        }

        let command = if self.phase == Phase::Idle {
            ClientCommand::Prompt {
                message: input.to_string(),
            }
        } else {
            ClientCommand::Steer {
                message: input.to_string(),
            }
        };
        if self.barrier.is_active() && command.is_prompt_class() {
            tracing::debug!(queued = self.barrier.len() + 1, "input held by compaction barrier");
            self.barrier.enqueue(command);
        } else {
            step.outbound.push(command);
        }
        step
    }

    /// Renders the result of a local shell escape. Empty output, non-zero
    /// exits, and timeouts surface as error blocks; nothing crosses the
    /// wire.
    pub fn shell_finished(&mut self, command: &str, outcome: ShellOutcome) -> Step {
        let mut step = Step::default();
        let mut text = format!("! {command}");
        let body = outcome.output.trim_end();
        if body.is_empty() {
            text.push_str("\n(no output)");
        } else {
            text.push('\n');
            text.push_str(&truncate_display(body));
        }

        let failed = if outcome.timed_out {
            text.push_str("\n[shell: timed out after 30s]");
            true
        } else {
            match outcome.exit_code {
                Some(0) => false,
                Some(code) => {
                    text.push_str(&format!("\n[shell: exit {code}]"));
                    true
                }
                None => true,
            }
        };

        let kind = if failed || body.is_empty() {
            BlockKind::Error
        } else {
            BlockKind::Notice
        };
        self.push_final(kind, text, &mut step);
        step
    }

    /// One scheduling tick: drains the dirty set into update operations
    /// carrying the latest block content.
    pub fn flush_dirty(&mut self) -> Vec<RenderOp> {
        self.scheduler
            .take_dirty()
            .into_iter()
            .filter_map(|id| self.ledger.snapshot(id).map(RenderOp::Update))
            .collect()
    }

    pub fn has_pending_renders(&self) -> bool {
        self.scheduler.has_pending()
    }

    fn classify_command(&self, input: &str) -> Option<ClientCommand> {
        match input {
            "/abort" => Some(ClientCommand::Abort),
            "/context" => Some(ClientCommand::ContextRequest),
            "/compact" => Some(ClientCommand::Compact),
            "/models" => Some(ClientCommand::ModelListRequest),
            "/model" => Some(ClientCommand::ModelInfoRequest {
                model_id: self.current_model.clone().unwrap_or_default(),
            }),
            _ => {
                if let Some(rest) = input.strip_prefix("/model ") {
                    let model_id = rest.trim();
                    return Some(if model_id.is_empty() {
                        ClientCommand::ModelInfoRequest {
                            model_id: self.current_model.clone().unwrap_or_default(),
                        }
                    } else {
                        ClientCommand::SelectModel {
                            model_id: model_id.to_string(),
                        }
                    });
                }
                if let Some(rest) = input.strip_prefix("/effort ") {
                    let effort = rest.trim();
                    if !effort.is_empty() {
                        return Some(ClientCommand::SetReasoningEffort {
                            effort: effort.to_string(),
                        });
                    }
                }
                None
            }
        }
    }

    fn push_final(&mut self, kind: BlockKind, text: String, step: &mut Step) {
        let block = self.ledger.push_final(kind, text);
        step.ops.push(RenderOp::Append(block));
    }

    fn finalize_block(&mut self, id: BlockId, step: &mut Step) {
        self.scheduler.cancel(id);
        if let Some(block) = self.ledger.finalize(id) {
            step.ops.push(RenderOp::Update(block));
        }
    }

    fn finalize_open_text(&mut self, step: &mut Step) {
        if let Some(id) = self.ledger.open_text_id() {
            self.finalize_block(id, step);
        }
    }

    fn finalize_open_blocks(&mut self, step: &mut Step) {
        self.finalize_open_text(step);
        if let Some(id) = self.ledger.open_tool_id() {
            self.finalize_block(id, step);
        }
    }

    fn drop_event(&mut self, event_name: &str) {
        self.dropped_events += 1;
        tracing::debug!(event = event_name, phase = ?self.phase, "event dropped with no effect");
    }
}

//! Interactive application state: tree projection over the latest
//! snapshot, cursor, overlays, and key handling. All remote work is
//! returned as a `Command` for the event loop to dispatch; nothing here
//! ever blocks.

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use cwc_client::SourceError;
use cwc_core::WatchConfig;
use cwc_engine::Snapshot;
use std::collections::HashMap;

pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Function,
    Execution,
}

/// Identity of the job under the cursor when an action fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRef {
    pub id: String,
    pub kind: JobKind,
    pub terminal: bool,
}

/// Flattened tree row: indices into the snapshot, rebuilt on every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeRow {
    Parent { job_idx: usize },
    Child { job_idx: usize, child_idx: usize },
}

/// At most one overlay at a time; a new one replaces the previous.
#[derive(Debug, PartialEq, Eq)]
pub enum Overlay {
    None,
    Logs {
        job: JobRef,
        /// `None` while the fetch is in flight; Esc is ignored until the
        /// result lands.
        content: Option<String>,
        scroll: u16,
    },
    ConfirmStop { job: JobRef },
}

/// Remote work the event loop must dispatch off the input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FetchLogs(JobRef),
    DispatchStop(JobRef),
    Quit,
}

/// Results of dispatched commands, delivered over the action channel.
#[derive(Debug)]
pub enum ActionEvent {
    LogsLoaded { job_id: String, text: String },
    StopFinished { job_id: String, outcome: Result<(), SourceError> },
}

pub struct App {
    pub config: WatchConfig,
    pub snapshot: Snapshot,
    pub rows: Vec<TreeRow>,
    pub cursor: usize,
    pub overlay: Overlay,
    pub status_note: Option<String>,
    pub spinner_frame: usize,
    expanded: HashMap<String, bool>,
}

pub fn empty_snapshot() -> Snapshot {
    Snapshot {
        jobs: Vec::new(),
        taken_at: Utc::now(),
        last_refresh_at: None,
        listing_error: None,
    }
}

impl App {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            snapshot: empty_snapshot(),
            rows: Vec::new(),
            cursor: 0,
            overlay: Overlay::None,
            status_note: None,
            spinner_frame: 0,
            expanded: HashMap::new(),
        }
    }

    /// Adopt a fresh snapshot: non-terminal parents start expanded,
    /// terminal parents collapsed; the user's own toggles stick around
    /// for as long as the job stays listed.
    pub fn set_snapshot(&mut self, snapshot: Snapshot) {
        for job in &snapshot.jobs {
            let default_open = !job.status.is_terminal();
            self.expanded.entry(job.id.clone()).or_insert(default_open);
        }
        let listed: std::collections::HashSet<&str> =
            snapshot.jobs.iter().map(|job| job.id.as_str()).collect();
        self.expanded.retain(|id, _| listed.contains(id.as_str()));
        self.snapshot = snapshot;
        self.rebuild_rows();
    }

    pub fn advance_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
    }

    pub fn spinner_char(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_frame]
    }

    pub fn is_expanded(&self, job_id: &str) -> bool {
        self.expanded.get(job_id).copied().unwrap_or(false)
    }

    fn rebuild_rows(&mut self) {
        self.rows.clear();
        let visible = self.config.limit.max(1) as usize;
        for (job_idx, job) in self.snapshot.jobs.iter().enumerate().take(visible) {
            self.rows.push(TreeRow::Parent { job_idx });
            if self.is_expanded(&job.id) {
                for child_idx in 0..job.children.len() {
                    self.rows.push(TreeRow::Child { job_idx, child_idx });
                }
            }
        }
        if self.cursor >= self.rows.len() {
            self.cursor = self.rows.len().saturating_sub(1);
        }
    }

    pub fn selected(&self) -> Option<JobRef> {
        match self.rows.get(self.cursor)? {
            TreeRow::Parent { job_idx } => {
                let job = self.snapshot.jobs.get(*job_idx)?;
                Some(JobRef {
                    id: job.id.clone(),
                    kind: JobKind::Function,
                    terminal: job.status.is_terminal(),
                })
            }
            TreeRow::Child { job_idx, child_idx } => {
                let child = self.snapshot.jobs.get(*job_idx)?.children.get(*child_idx)?;
                Some(JobRef {
                    id: child.id.clone(),
                    kind: JobKind::Execution,
                    terminal: child.status.is_terminal(),
                })
            }
        }
    }

    fn move_cursor(&mut self, step: i32) {
        if self.rows.is_empty() {
            self.cursor = 0;
            return;
        }
        let last = self.rows.len() as i32 - 1;
        self.cursor = (self.cursor as i32 + step).clamp(0, last) as usize;
    }

    fn toggle_selected_expansion(&mut self) {
        if let Some(TreeRow::Parent { job_idx }) = self.rows.get(self.cursor).copied() {
            if let Some(job) = self.snapshot.jobs.get(job_idx) {
                let open = self.is_expanded(&job.id);
                self.expanded.insert(job.id.clone(), !open);
                self.rebuild_rows();
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        match &mut self.overlay {
            Overlay::Logs { content, scroll, .. } => {
                match key.code {
                    KeyCode::Up => *scroll = scroll.saturating_sub(1),
                    KeyCode::Down => *scroll = scroll.saturating_add(1),
                    KeyCode::Esc | KeyCode::Char('q') => {
                        // Dismiss is blocked while the fetch is in flight.
                        if content.is_some() {
                            self.overlay = Overlay::None;
                        }
                    }
                    _ => {}
                }
                None
            }
            Overlay::ConfirmStop { job } => {
                match key.code {
                    KeyCode::Enter | KeyCode::Char('y') => {
                        let job = job.clone();
                        self.overlay = Overlay::None;
                        self.status_note = Some(format!("stop requested for {}", job.id));
                        Some(Command::DispatchStop(job))
                    }
                    KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('q') => {
                        self.overlay = Overlay::None;
                        self.status_note = Some("stop canceled".to_string());
                        None
                    }
                    _ => None,
                }
            }
            Overlay::None => self.handle_main_key(key),
        }
    }

    fn handle_main_key(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Command::Quit)
            }
            KeyCode::Char('q') => Some(Command::Quit),
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_cursor(-1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_cursor(1);
                None
            }
            KeyCode::Enter => {
                self.toggle_selected_expansion();
                None
            }
            KeyCode::Char('l') => {
                let job = self.selected()?;
                self.overlay = Overlay::Logs {
                    job: job.clone(),
                    content: None,
                    scroll: 0,
                };
                Some(Command::FetchLogs(job))
            }
            KeyCode::Char('s') => {
                let job = self.selected()?;
                if job.terminal {
                    // Rejected locally; nothing is sent to the remote.
                    self.status_note =
                        Some(format!("{} already finished; stop not sent", job.id));
                    return None;
                }
                self.overlay = Overlay::ConfirmStop { job };
                None
            }
            _ => None,
        }
    }

    pub fn apply_action_event(&mut self, event: ActionEvent) {
        match event {
            ActionEvent::LogsLoaded { job_id, text } => {
                if let Overlay::Logs { job, content, .. } = &mut self.overlay {
                    if job.id == job_id && content.is_none() {
                        *content = Some(text);
                    }
                }
            }
            ActionEvent::StopFinished { job_id, outcome } => {
                self.status_note = Some(match outcome {
                    Ok(()) => format!("stop accepted for {job_id}"),
                    Err(SourceError::CancelRejected(message)) => {
                        format!("stop rejected: {message}")
                    }
                    Err(err) => format!("stop failed for {job_id}: {err}"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use cwc_core::{ExecutionJob, ExecutionStatus, FunctionJob, JobStatus, ResolveState};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid test timestamp")
    }

    fn parent(id: &str, status: JobStatus, children: Vec<ExecutionJob>) -> FunctionJob {
        let mut job = FunctionJob::new(id);
        job.status = status;
        job.created_at = Some(ts(0));
        job.children = children;
        job.children_resolved = ResolveState::Partial;
        job
    }

    fn child(id: &str, parent_id: &str, status: ExecutionStatus) -> ExecutionJob {
        let mut job = ExecutionJob::new(id, parent_id);
        job.status = status;
        job
    }

    fn snapshot(jobs: Vec<FunctionJob>) -> Snapshot {
        Snapshot {
            jobs,
            taken_at: ts(100),
            last_refresh_at: Some(ts(100)),
            listing_error: None,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_with_two_parents() -> App {
        let mut app = App::new(WatchConfig::default());
        app.set_snapshot(snapshot(vec![
            parent(
                "job-run",
                JobStatus::Running,
                vec![
                    child("exec-1", "job-run", ExecutionStatus::Running),
                    child("exec-2", "job-run", ExecutionStatus::Queued),
                ],
            ),
            parent(
                "job-done",
                JobStatus::Done,
                vec![child("exec-3", "job-done", ExecutionStatus::Done)],
            ),
        ]));
        app
    }

    #[test]
    fn tree_expands_running_and_collapses_terminal_by_default() {
        let app = app_with_two_parents();
        assert_eq!(
            app.rows,
            vec![
                TreeRow::Parent { job_idx: 0 },
                TreeRow::Child { job_idx: 0, child_idx: 0 },
                TreeRow::Child { job_idx: 0, child_idx: 1 },
                TreeRow::Parent { job_idx: 1 },
            ]
        );
    }

    #[test]
    fn enter_toggles_expansion_of_the_selected_parent() {
        let mut app = app_with_two_parents();
        app.cursor = 3; // job-done
        assert_eq!(app.handle_key(key(KeyCode::Enter)), None);
        assert_eq!(app.rows.len(), 5);
        assert!(app.is_expanded("job-done"));

        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.rows.len(), 4);
    }

    #[test]
    fn cursor_clamps_at_both_ends_and_survives_shrinking() {
        let mut app = app_with_two_parents();
        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.cursor, 0);
        for _ in 0..10 {
            app.handle_key(key(KeyCode::Down));
        }
        assert_eq!(app.cursor, 3);

        app.set_snapshot(snapshot(vec![parent("job-run", JobStatus::Running, Vec::new())]));
        assert!(app.cursor < app.rows.len());
    }

    #[test]
    fn stop_on_terminal_job_is_a_local_no_op() {
        let mut app = app_with_two_parents();
        app.cursor = 3; // job-done, terminal
        let command = app.handle_key(key(KeyCode::Char('s')));
        assert_eq!(command, None);
        assert_eq!(app.overlay, Overlay::None);
        assert!(app.status_note.as_deref().unwrap_or_default().contains("not sent"));
    }

    #[test]
    fn stop_dispatches_only_after_explicit_confirm() {
        let mut app = app_with_two_parents();
        app.cursor = 1; // exec-1, running child
        assert_eq!(app.handle_key(key(KeyCode::Char('s'))), None);
        assert!(matches!(app.overlay, Overlay::ConfirmStop { .. }));

        // Declining sends nothing.
        assert_eq!(app.handle_key(key(KeyCode::Esc)), None);
        assert_eq!(app.overlay, Overlay::None);
        assert_eq!(app.status_note.as_deref(), Some("stop canceled"));

        // Confirming dispatches against the selected child.
        app.handle_key(key(KeyCode::Char('s')));
        let command = app.handle_key(key(KeyCode::Enter));
        match command {
            Some(Command::DispatchStop(job)) => {
                assert_eq!(job.id, "exec-1");
                assert_eq!(job.kind, JobKind::Execution);
            }
            other => panic!("expected DispatchStop, got {other:?}"),
        }
    }

    #[test]
    fn logs_overlay_blocks_dismiss_until_loaded() {
        let mut app = app_with_two_parents();
        let command = app.handle_key(key(KeyCode::Char('l')));
        assert!(matches!(command, Some(Command::FetchLogs(ref job)) if job.id == "job-run"));

        // Still loading: Esc is ignored.
        app.handle_key(key(KeyCode::Esc));
        assert!(matches!(app.overlay, Overlay::Logs { .. }));

        app.apply_action_event(ActionEvent::LogsLoaded {
            job_id: "job-run".to_string(),
            text: "line one".to_string(),
        });
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.overlay, Overlay::None);
    }

    #[test]
    fn stale_logs_results_do_not_clobber_a_newer_overlay() {
        let mut app = app_with_two_parents();
        app.handle_key(key(KeyCode::Char('l')));
        app.apply_action_event(ActionEvent::LogsLoaded {
            job_id: "job-other".to_string(),
            text: "wrong job".to_string(),
        });
        match &app.overlay {
            Overlay::Logs { content, .. } => assert!(content.is_none()),
            other => panic!("expected logs overlay, got {other:?}"),
        }
    }

    #[test]
    fn stop_outcomes_surface_as_notes() {
        let mut app = app_with_two_parents();
        app.apply_action_event(ActionEvent::StopFinished {
            job_id: "exec-1".to_string(),
            outcome: Ok(()),
        });
        assert!(app.status_note.as_deref().unwrap_or_default().contains("accepted"));

        app.apply_action_event(ActionEvent::StopFinished {
            job_id: "exec-1".to_string(),
            outcome: Err(SourceError::CancelRejected("already finished".to_string())),
        });
        assert!(app.status_note.as_deref().unwrap_or_default().contains("rejected"));
    }

    #[test]
    fn quit_keys() {
        let mut app = app_with_two_parents();
        assert_eq!(app.handle_key(key(KeyCode::Char('q'))), Some(Command::Quit));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.handle_key(ctrl_c), Some(Command::Quit));
    }
}

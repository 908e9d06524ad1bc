use cwc_core::{ExecutionStatus, JobStatus};
use ratatui::style::{Color, Modifier, Style};

/// Colors by semantic status group, with a global kill switch for
/// `--no-color` terminals.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub color_enabled: bool,
}

impl Theme {
    pub fn new(no_color: bool) -> Self {
        Self {
            color_enabled: !no_color,
        }
    }

    fn styled(&self, color: Color) -> Style {
        if self.color_enabled {
            Style::default().fg(color)
        } else {
            Style::default()
        }
    }

    pub fn job_status(&self, status: JobStatus) -> Style {
        self.styled(job_status_color(status))
    }

    pub fn execution_status(&self, status: ExecutionStatus) -> Style {
        self.styled(execution_status_color(status))
    }

    pub fn id(&self) -> Style {
        self.styled(Color::White)
    }

    pub fn muted(&self) -> Style {
        self.styled(Color::DarkGray)
    }

    pub fn error(&self) -> Style {
        self.styled(Color::Red)
    }

    pub fn notice(&self) -> Style {
        self.styled(Color::Yellow)
    }

    pub fn title(&self) -> Style {
        if self.color_enabled {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        }
    }

    pub fn selected(&self) -> Style {
        if self.color_enabled {
            Style::default().bg(Color::Rgb(40, 48, 62)).add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::REVERSED)
        }
    }
}

fn job_status_color(status: JobStatus) -> Color {
    match status {
        JobStatus::Running => Color::Yellow,
        JobStatus::Done => Color::Green,
        JobStatus::Error => Color::Red,
        JobStatus::Canceled => Color::Magenta,
        JobStatus::Queued => Color::Cyan,
        JobStatus::Initializing => Color::Blue,
        JobStatus::Unknown => Color::DarkGray,
    }
}

fn execution_status_color(status: ExecutionStatus) -> Color {
    match status {
        ExecutionStatus::Running => Color::Yellow,
        ExecutionStatus::Done => Color::Green,
        ExecutionStatus::Error => Color::Red,
        ExecutionStatus::Canceled => Color::Magenta,
        ExecutionStatus::Queued => Color::Cyan,
        ExecutionStatus::Initializing => Color::Blue,
        ExecutionStatus::Unknown => Color::DarkGray,
    }
}

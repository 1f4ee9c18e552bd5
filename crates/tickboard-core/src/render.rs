use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::app::{Notice, NoticeKind};
use crate::clock::{format_clock_12h, format_date};
use crate::config::Config;
use crate::task::Task;
use crate::view::{Tab, View};

/// Presentation boundary: draws a projected view and shows notices.
pub trait RenderGateway {
    fn render(&mut self, view: &View<'_>) -> anyhow::Result<()>;
    fn notify(&mut self, notice: &Notice) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub struct Renderer<O, E> {
    out: O,
    err: E,
    color: bool,
}

impl Renderer<io::Stdout, io::Stderr> {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            out: io::stdout(),
            err: io::stderr(),
            color: color && io::stdout().is_terminal(),
        })
    }
}

impl<O: Write, E: Write> Renderer<O, E> {
    pub fn with_writers(out: O, err: E, color: bool) -> Self {
        Self { out, err, color }
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }

    /// Plain command output such as export and config listings.
    pub fn print_line(&mut self, line: &str) -> anyhow::Result<()> {
        writeln!(self.out, "{line}")?;
        Ok(())
    }

    /// Write `question` without a newline and flush so it shows before stdin is read.
    pub fn prompt(&mut self, question: &str) -> anyhow::Result<()> {
        write!(self.out, "{question}")?;
        self.out.flush()?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id.short()))]
    pub fn print_task_info(&mut self, task: &Task) -> anyhow::Result<()> {
        let out = &mut self.out;

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(
            out,
            "status      {}",
            if task.is_completed { "completed" } else { "active" }
        )?;
        writeln!(
            out,
            "description {}",
            task.description.as_deref().unwrap_or_default()
        )?;
        writeln!(
            out,
            "category    {}",
            task.category.as_deref().unwrap_or_default()
        )?;
        writeln!(out, "priority    {}", task.priority.as_str())?;

        if let Some(start) = task.start_time {
            writeln!(out, "start       {}", start.format("%H:%M"))?;
        }
        if let Some(end) = task.end_time {
            writeln!(out, "end         {}", end.format("%H:%M"))?;
        }
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", format_date(due))?;
        }
        writeln!(out, "color       {}", task.card_color.as_str())?;

        Ok(())
    }

    fn write_tab_bar(&mut self, display_tab: Tab, keyword: Option<&str>) -> anyhow::Result<()> {
        let labels: Vec<String> = Tab::ALL
            .iter()
            .map(|tab| {
                if *tab == display_tab {
                    self.paint(&format!("[{}]", tab.label()), "1")
                } else {
                    format!(" {} ", tab.label())
                }
            })
            .collect();
        writeln!(self.out, "{}", labels.join(" "))?;

        if let Some(keyword) = keyword {
            writeln!(self.out, "search: \"{keyword}\"")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl<O: Write, E: Write> RenderGateway for Renderer<O, E> {
    #[tracing::instrument(skip(self, view), fields(shown = view.tasks.len()))]
    fn render(&mut self, view: &View<'_>) -> anyhow::Result<()> {
        self.write_tab_bar(view.display_tab, view.keyword.as_deref())?;

        if let Some(reason) = view.empty_reason() {
            writeln!(self.out, "{}", reason.message())?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Title".to_string(),
            "Priority".to_string(),
            "Category".to_string(),
            "Time".to_string(),
            "Due".to_string(),
            "Description".to_string(),
        ];

        let mut rows = Vec::with_capacity(view.tasks.len());
        for task in &view.tasks {
            let done = if task.is_completed { "[x]" } else { "[ ]" };
            let title = self.paint(&task.title, task.card_color.ansi_code());
            let mut row = vec![
                self.paint(&task.id.short(), "33"),
                done.to_string(),
                title,
                task.priority.as_str().to_string(),
                task.category.clone().unwrap_or_default(),
                time_range(task),
                task.due_date.map(format_date).unwrap_or_default(),
                task
                    .description
                    .clone()
                    .unwrap_or_else(|| "No description".to_string()),
            ];
            if task.is_completed {
                row = row.iter().map(|cell| self.paint(cell, "2")).collect();
            }
            rows.push(row);
        }

        write_table(&mut self.out, headers, rows)?;
        self.out.flush()?;
        Ok(())
    }

    fn notify(&mut self, notice: &Notice) -> anyhow::Result<()> {
        let code = match notice.kind {
            NoticeKind::Success => "32",
            NoticeKind::Info => "34",
            NoticeKind::Danger => "31",
        };
        let text = self.paint(&notice.text, code);
        writeln!(self.err, "{text}")?;
        Ok(())
    }
}

/// `9:00 AM - 10:30 AM` when both ends are set, otherwise `No time set`.
pub fn time_range(task: &Task) -> String {
    match (task.start_time, task.end_time) {
        (Some(start), Some(end)) => {
            format!("{} - {}", format_clock_12h(start), format_clock_12h(end))
        }
        _ => "No time set".to_string(),
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::{RenderGateway, Renderer, strip_ansi, time_range};
    use crate::app::Notice;
    use crate::task::{Task, TaskDraft};
    use crate::view::{Tab, project};

    fn render_to_string(tasks: &[Task], tab: Tab, keyword: Option<&str>, color: bool) -> String {
        let mut renderer = Renderer::with_writers(Vec::new(), Vec::new(), color);
        renderer
            .render(&project(tasks, tab, keyword))
            .expect("render");
        let (out, _) = renderer.into_writers();
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn empty_states_differ_for_search() {
        let tasks = vec![Task::from_draft(TaskDraft::titled("Buy milk"))];

        let none_active = render_to_string(&tasks, Tab::Completed, None, false);
        assert!(none_active.contains("No tasks available"));

        let none_found = render_to_string(&tasks, Tab::Completed, Some("taxes"), false);
        assert!(none_found.contains("No tasks found"));
        assert!(none_found.contains("[All]"));
    }

    #[test]
    fn rows_show_fallbacks_and_short_id() {
        let task = Task::from_draft(TaskDraft::titled("Buy milk"));
        let out = render_to_string(std::slice::from_ref(&task), Tab::All, None, false);

        assert!(out.contains(&task.id.short()));
        assert!(out.contains("No description"));
        assert!(out.contains("No time set"));
        assert!(out.contains("[ ]"));
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn colored_output_aligns_on_visible_width() {
        let mut done = Task::from_draft(TaskDraft::titled("Pay bills"));
        done.is_completed = true;
        let out = render_to_string(&[done], Tab::All, None, true);

        assert!(out.contains('\x1b'));
        let plain = strip_ansi(&out);
        assert!(plain.contains("[x]"));
        let header_line = plain.lines().nth(2).expect("header");
        let row_line = plain.lines().nth(4).expect("row");
        assert_eq!(
            header_line.find("Done").expect("done header"),
            row_line.find("[x]").expect("done cell")
        );
    }

    #[test]
    fn time_range_needs_both_ends() {
        let mut task = Task::from_draft(TaskDraft::titled("Standup"));
        task.start_time = NaiveTime::from_hms_opt(9, 0, 0);
        assert_eq!(time_range(&task), "No time set");

        task.end_time = NaiveTime::from_hms_opt(13, 30, 0);
        assert_eq!(time_range(&task), "9:00 AM - 1:30 PM");
    }

    #[test]
    fn plain_lines_and_prompts_use_the_output_writer() {
        let mut renderer = Renderer::with_writers(Vec::new(), Vec::new(), true);
        renderer.prompt("Delete? ").expect("prompt");
        renderer.print_line("color = on").expect("line");
        let (out, err) = renderer.into_writers();
        assert_eq!(String::from_utf8(out).expect("utf8"), "Delete? color = on\n");
        assert!(err.is_empty());
    }

    #[test]
    fn notices_go_to_the_error_writer() {
        let mut renderer = Renderer::with_writers(Vec::new(), Vec::new(), false);
        renderer
            .notify(&Notice::success("Task created successfully!"))
            .expect("notify");
        let (out, err) = renderer.into_writers();
        assert!(out.is_empty());
        assert_eq!(
            String::from_utf8(err).expect("utf8"),
            "Task created successfully!\n"
        );
    }
}

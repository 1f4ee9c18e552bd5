use std::fs;
use std::io::{
  self,
  BufRead,
  Read,
  Write
};
use std::process::ExitCode;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Local,
  NaiveDate,
  NaiveTime
};
use tracing::{
  debug,
  info,
  instrument
};

use crate::app::{
  Action,
  App,
  Notice
};
use crate::cli::{
  AddArgs,
  Command,
  EditArgs
};
use crate::clock::{
  parse_clock_time,
  parse_due_date
};
use crate::config::Config;
use crate::datastore::{
  KeyValueStore,
  decode_task_value,
  encode_task_document
};
use crate::render::{
  RenderGateway,
  Renderer
};
use crate::task::{
  CardColor,
  Priority,
  TaskDraft,
  TaskId,
  TaskPatch
};

/// Run one command against the board and
/// redraw. Store errors are shown as
/// notices and turn into a failing exit
/// code; bad input is returned as an error.
#[instrument(skip(app, cfg, renderer))]
pub fn dispatch<S, O, E>(
  app: &mut App<S>,
  cfg: &Config,
  renderer: &mut Renderer<O, E>,
  command: Command
) -> anyhow::Result<ExitCode>
where
  S: KeyValueStore,
  O: Write,
  E: Write
{
  let today = Local::now().date_naive();

  let action = match command {
    | Command::Add(args) => {
      info!("command add");
      Action::Create(build_draft(
        args, cfg, today
      )?)
    }
    | Command::Edit(args) => {
      info!("command edit");
      let id = match app
        .store()
        .resolve(&args.id)
      {
        | Ok(id) => id,
        | Err(err) => {
          return report(renderer, &err);
        }
      };
      let patch = build_patch(args, today)?;
      if patch.is_empty() {
        return Err(anyhow!(
          "edit: nothing to change"
        ));
      }
      Action::Update {
        id,
        patch
      }
    }
    | Command::Delete {
      id,
      yes
    } => {
      info!("command delete");
      let id = match app.store().resolve(&id)
      {
        | Ok(id) => id,
        | Err(err) => {
          return report(renderer, &err);
        }
      };
      let ask = !yes
        && cfg
          .get_bool("confirmation")
          .unwrap_or(true);
      if ask
        && !confirm_delete(
          app,
          id,
          renderer,
          &mut io::stdin().lock()
        )?
      {
        renderer
          .print_line("Task not deleted.")?;
        return Ok(ExitCode::SUCCESS);
      }
      Action::Delete(id)
    }
    | Command::Toggle {
      id
    } => {
      info!("command toggle");
      match app.store().resolve(&id) {
        | Ok(id) => Action::ToggleCompleted(id),
        | Err(err) => {
          return report(renderer, &err);
        }
      }
    }
    | Command::Tab {
      tab
    } => {
      info!(%tab, "command tab");
      Action::SelectTab(tab)
    }
    | Command::Search {
      keyword
    } => {
      info!("command search");
      Action::Search(keyword.join(" "))
    }
    | Command::Import {
      path
    } => {
      info!(path = %path.display(), "command import");
      let raw = read_import_source(&path)?;
      let value: serde_json::Value =
        serde_json::from_str(&raw)
          .with_context(|| {
            format!(
              "failed parsing {}",
              path.display()
            )
          })?;
      let (tasks, _) =
        decode_task_value("import", value)
          .with_context(|| {
            format!(
              "unrecognized task data in {}",
              path.display()
            )
          })?;
      debug!(
        count = tasks.len(),
        "decoded import"
      );
      Action::Import(tasks)
    }
    | Command::List => {
      info!("command list");
      renderer.render(&app.view())?;
      return Ok(ExitCode::SUCCESS);
    }
    | Command::Show {
      id
    } => {
      info!("command show");
      let task = match app
        .store()
        .resolve(&id)
        .map(|id| app.store().get(id))
      {
        | Ok(Some(task)) => task,
        | Ok(None) => {
          return Err(anyhow!(
            "task vanished: {id}"
          ));
        }
        | Err(err) => {
          return report(renderer, &err);
        }
      };
      renderer.print_task_info(task)?;
      return Ok(ExitCode::SUCCESS);
    }
    | Command::Export => {
      info!("command export");
      let doc = encode_task_document(
        app.store().tasks()
      )?;
      renderer.print_line(
        &serde_json::to_string_pretty(&doc)?
      )?;
      return Ok(ExitCode::SUCCESS);
    }
    | Command::Config => {
      info!("command config");
      for (k, v) in cfg.iter() {
        renderer
          .print_line(&format!("{k} = {v}"))?;
      }
      return Ok(ExitCode::SUCCESS);
    }
  };

  match app.dispatch(action) {
    | Ok(notice) => {
      if let Some(notice) = notice {
        renderer.notify(&notice)?;
      }
      renderer.render(&app.view())?;
      Ok(ExitCode::SUCCESS)
    }
    | Err(err) => report(renderer, &err)
  }
}

fn report<O: Write, E: Write>(
  renderer: &mut Renderer<O, E>,
  err: &crate::error::StoreError
) -> anyhow::Result<ExitCode> {
  debug!(error = %err, "action failed");
  renderer.notify(&Notice::from_error(err))?;
  Ok(ExitCode::FAILURE)
}

#[instrument(skip(args, cfg))]
fn build_draft(
  args: AddArgs,
  cfg: &Config,
  today: NaiveDate
) -> anyhow::Result<TaskDraft> {
  let title = args.title.join(" ");
  let title = title.trim();
  if title.is_empty() {
    return Err(anyhow!(
      "add: title is required"
    ));
  }

  let priority = match args.priority {
    | Some(raw) => raw.parse::<Priority>()?,
    | None => cfg.default_priority()?
  };
  let card_color = match args.color {
    | Some(raw) => {
      raw.parse::<CardColor>()?
    }
    | None => cfg.default_color()?
  };

  Ok(TaskDraft {
    title:       title.to_string(),
    description: args.description,
    category:    args.category,
    priority:    Some(priority),
    start_time:  parse_time_arg(
      args.start.as_deref()
    )?
    .flatten(),
    end_time:    parse_time_arg(
      args.end.as_deref()
    )?
    .flatten(),
    due_date:    parse_date_arg(
      args.due.as_deref(),
      today
    )?
    .flatten(),
    card_color:  Some(card_color)
  })
}

#[instrument(skip(args))]
fn build_patch(
  args: EditArgs,
  today: NaiveDate
) -> anyhow::Result<TaskPatch> {
  if let Some(title) = args.title.as_ref()
    && title.trim().is_empty()
  {
    return Err(anyhow!(
      "edit: title cannot be empty"
    ));
  }

  Ok(TaskPatch {
    title:       args.title,
    description: args
      .description
      .map(|d| Some(d).filter(|d| !d.trim().is_empty())),
    category:    args
      .category
      .map(|c| Some(c).filter(|c| !c.trim().is_empty())),
    priority:    args
      .priority
      .map(|p| p.parse::<Priority>())
      .transpose()?,
    start_time:  parse_time_arg(
      args.start.as_deref()
    )?,
    end_time:    parse_time_arg(
      args.end.as_deref()
    )?,
    due_date:    parse_date_arg(
      args.due.as_deref(),
      today
    )?,
    card_color:  args
      .color
      .map(|c| c.parse::<CardColor>())
      .transpose()?
  })
}

// Outer `None`: flag absent. `Some(None)`:
// flag given with an empty value.
fn parse_time_arg(
  raw: Option<&str>
) -> anyhow::Result<Option<Option<NaiveTime>>>
{
  match raw.map(str::trim) {
    | None => Ok(None),
    | Some("") => Ok(Some(None)),
    | Some(raw) => {
      Ok(Some(Some(parse_clock_time(raw)?)))
    }
  }
}

fn parse_date_arg(
  raw: Option<&str>,
  today: NaiveDate
) -> anyhow::Result<Option<Option<NaiveDate>>>
{
  match raw.map(str::trim) {
    | None => Ok(None),
    | Some("") => Ok(Some(None)),
    | Some(raw) => {
      Ok(Some(Some(parse_due_date(
        raw, today
      )?)))
    }
  }
}

fn confirm_delete<S, O, E, R>(
  app: &App<S>,
  id: TaskId,
  renderer: &mut Renderer<O, E>,
  input: &mut R
) -> anyhow::Result<bool>
where
  S: KeyValueStore,
  O: Write,
  E: Write,
  R: BufRead
{
  let title = app
    .store()
    .get(id)
    .map(|task| task.title.clone())
    .unwrap_or_default();

  renderer.prompt(&format!(
    "Are you sure you want to delete \
     \"{title}\"? (yes/no) "
  ))?;

  let mut answer = String::new();
  input
    .read_line(&mut answer)
    .context("failed reading confirmation")?;
  Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
  matches!(
    answer
      .trim()
      .to_ascii_lowercase()
      .as_str(),
    "y" | "yes"
  )
}

fn read_import_source(
  path: &std::path::Path
) -> anyhow::Result<String> {
  if path.as_os_str() == "-" {
    let mut raw = String::new();
    io::stdin()
      .read_to_string(&mut raw)
      .context("failed reading stdin")?;
    return Ok(raw);
  }
  fs::read_to_string(path).with_context(
    || {
      format!(
        "failed to read {}",
        path.display()
      )
    }
  )
}

#[cfg(test)]
mod tests {
  use std::process::ExitCode;

  use chrono::{
    NaiveDate,
    NaiveTime
  };

  use super::{
    build_patch,
    confirm_delete,
    dispatch,
    is_affirmative,
    parse_time_arg
  };
  use crate::app::App;
  use crate::cli::{
    AddArgs,
    Command,
    EditArgs
  };
  use crate::config::Config;
  use crate::datastore::{
    DataStore,
    MemoryStore
  };
  use crate::render::Renderer;
  use crate::task::{
    CardColor,
    Priority
  };
  use crate::view::Tab;

  type TestRenderer =
    Renderer<Vec<u8>, Vec<u8>>;

  fn setup()
  -> (App<MemoryStore>, Config, TestRenderer)
  {
    let app = App::open(DataStore::new(
      MemoryStore::new()
    ))
    .expect("open app");
    (
      app,
      Config::default(),
      Renderer::with_writers(
        Vec::new(),
        Vec::new(),
        false
      )
    )
  }

  fn add(title: &str) -> Command {
    Command::Add(AddArgs {
      title:       vec![title.to_string()],
      description: None,
      category:    None,
      priority:    None,
      start:       Some("9:00".to_string()),
      end:         None,
      due:         None,
      color:       None
    })
  }

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1)
      .expect("valid date")
  }

  #[test]
  fn add_uses_config_defaults_and_renders()
  {
    let (mut app, mut cfg, mut renderer) =
      setup();
    cfg.apply_overrides([(
      "default.color".to_string(),
      "green".to_string()
    )]);

    let code = dispatch(
      &mut app,
      &cfg,
      &mut renderer,
      add("Buy milk")
    )
    .expect("dispatch");
    assert_eq!(code, ExitCode::SUCCESS);

    let task = &app.store().tasks()[0];
    assert_eq!(task.card_color, CardColor::Green);
    assert_eq!(task.priority, Priority::Medium);
    assert_eq!(
      task.start_time,
      NaiveTime::from_hms_opt(9, 0, 0)
    );

    let (out, err) = renderer.into_writers();
    let out =
      String::from_utf8(out).expect("utf8");
    let err =
      String::from_utf8(err).expect("utf8");
    assert!(out.contains("Buy milk"));
    assert!(
      err.contains("Task created successfully!")
    );
  }

  #[test]
  fn duplicate_add_reports_and_fails() {
    let (mut app, cfg, mut renderer) =
      setup();
    dispatch(
      &mut app,
      &cfg,
      &mut renderer,
      add("Buy milk")
    )
    .expect("first");
    let code = dispatch(
      &mut app,
      &cfg,
      &mut renderer,
      add("BUY MILK")
    )
    .expect("second");
    assert_eq!(code, ExitCode::FAILURE);
    assert_eq!(app.store().len(), 1);

    let (_, err) = renderer.into_writers();
    assert!(
      String::from_utf8(err)
        .expect("utf8")
        .contains("Task title already exists!")
    );
  }

  #[test]
  fn toggle_and_tab_by_short_id() {
    let (mut app, cfg, mut renderer) =
      setup();
    dispatch(
      &mut app,
      &cfg,
      &mut renderer,
      add("Pay bills")
    )
    .expect("add");
    let short = app.store().tasks()[0]
      .id
      .short()[..4]
      .to_string();

    dispatch(
      &mut app,
      &cfg,
      &mut renderer,
      crate::cli::Command::Toggle {
        id: short
      }
    )
    .expect("toggle");
    assert!(app.store().tasks()[0].is_completed);

    dispatch(
      &mut app,
      &cfg,
      &mut renderer,
      Command::Tab {
        tab: Tab::Completed
      }
    )
    .expect("tab");
    assert_eq!(app.tab(), Tab::Completed);
    assert_eq!(app.view().tasks.len(), 1);
  }

  #[test]
  fn unknown_id_is_a_failed_action() {
    let (mut app, cfg, mut renderer) =
      setup();
    let code = dispatch(
      &mut app,
      &cfg,
      &mut renderer,
      Command::Delete {
        id:  "ffff".to_string(),
        yes: true
      }
    )
    .expect("dispatch");
    assert_eq!(code, ExitCode::FAILURE);
  }

  #[test]
  fn edit_flags_map_to_partial_patch() {
    let patch = build_patch(
      EditArgs {
        id:          "abc".to_string(),
        title:       None,
        description: Some(String::new()),
        category:    None,
        priority:    Some("low".to_string()),
        start:       Some("".to_string()),
        end:         Some("5:30 pm".to_string()),
        due:         Some("+1d".to_string()),
        color:       None
      },
      today()
    )
    .expect("patch");

    assert_eq!(patch.title, None);
    assert_eq!(patch.description, Some(None));
    assert_eq!(patch.category, None);
    assert_eq!(patch.priority, Some(Priority::Low));
    assert_eq!(patch.start_time, Some(None));
    assert_eq!(
      patch.end_time,
      Some(NaiveTime::from_hms_opt(17, 30, 0))
    );
    assert_eq!(
      patch.due_date,
      Some(NaiveDate::from_ymd_opt(2026, 3, 2))
    );
  }

  #[test]
  fn blank_edit_title_is_rejected_at_input() {
    let result = build_patch(
      EditArgs {
        id:          "abc".to_string(),
        title:       Some("  ".to_string()),
        description: None,
        category:    None,
        priority:    None,
        start:       None,
        end:         None,
        due:         None,
        color:       None
      },
      today()
    );
    assert!(result.is_err());
  }

  #[test]
  fn time_arg_distinguishes_absent_and_empty()
  {
    assert_eq!(
      parse_time_arg(None).expect("none"),
      None
    );
    assert_eq!(
      parse_time_arg(Some(" "))
        .expect("empty"),
      Some(None)
    );
    assert!(
      parse_time_arg(Some("25:00")).is_err()
    );
  }

  #[test]
  fn confirmation_answers() {
    assert!(is_affirmative("yes\n"));
    assert!(is_affirmative(" Y "));
    assert!(!is_affirmative("no"));
    assert!(!is_affirmative(""));
  }

  #[test]
  fn export_and_config_write_to_renderer_output()
  {
    let (mut app, cfg, mut renderer) =
      setup();
    dispatch(
      &mut app,
      &cfg,
      &mut renderer,
      add("Buy milk")
    )
    .expect("add");
    let mut renderer = Renderer::with_writers(
      Vec::new(),
      Vec::new(),
      false
    );

    dispatch(
      &mut app,
      &cfg,
      &mut renderer,
      Command::Export
    )
    .expect("export");
    dispatch(
      &mut app,
      &cfg,
      &mut renderer,
      Command::Config
    )
    .expect("config");

    let (out, _) = renderer.into_writers();
    let out =
      String::from_utf8(out).expect("utf8");
    assert!(out.contains("\"version\": 1"));
    assert!(out.contains("\"title\": \"Buy milk\""));
    assert!(out.contains("confirmation = on"));
  }

  #[test]
  fn declined_delete_prompt_keeps_task() {
    let (mut app, cfg, mut renderer) =
      setup();
    dispatch(
      &mut app,
      &cfg,
      &mut renderer,
      add("Pay bills")
    )
    .expect("add");
    let id = app.store().tasks()[0].id;
    let mut renderer = Renderer::with_writers(
      Vec::new(),
      Vec::new(),
      false
    );

    let confirmed = confirm_delete(
      &app,
      id,
      &mut renderer,
      &mut "no\n".as_bytes()
    )
    .expect("prompt");
    assert!(!confirmed);
    assert_eq!(app.store().len(), 1);

    let (out, _) = renderer.into_writers();
    assert_eq!(
      String::from_utf8(out).expect("utf8"),
      "Are you sure you want to delete \
       \"Pay bills\"? (yes/no) "
    );
  }
}

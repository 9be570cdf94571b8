use std::io::Write;

use anyhow::Result;
use hellolove_bus::{EventBus, Topic};
use hellolove_core::{CommandRegistry, Effect, SessionController, SettingsPatch};
use hellolove_schema::{BusMessage, Role, Settings};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReplCommand {
    Quit,
    Help,
    Tasks,
    Done(usize),
    Remove(usize),
    Speak(usize),
    Listen,
    Settings,
    Rename(String),
    Theme,
    Submit(String),
    Skip,
    Invalid(String),
}

/// Maps one line of REPL input. `:`-prefixed lines are local commands,
/// everything else goes to the session.
pub(crate) fn parse_repl_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Skip;
    }
    if line == "quit" || line == "exit" {
        return ReplCommand::Quit;
    }
    let Some(rest) = line.strip_prefix(':') else {
        return ReplCommand::Submit(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let index = || -> Option<usize> { arg.parse::<usize>().ok().filter(|n| *n > 0) };

    match name {
        "help" => ReplCommand::Help,
        "tasks" => ReplCommand::Tasks,
        "listen" => ReplCommand::Listen,
        "settings" => ReplCommand::Settings,
        "theme" => ReplCommand::Theme,
        "name" if !arg.is_empty() => ReplCommand::Rename(arg.to_string()),
        "done" => index().map_or_else(|| usage(":done <n>"), ReplCommand::Done),
        "rm" => index().map_or_else(|| usage(":rm <n>"), ReplCommand::Remove),
        "speak" => index().map_or_else(|| usage(":speak <n>"), ReplCommand::Speak),
        "name" => usage(":name <assistant name>"),
        other => ReplCommand::Invalid(format!("unknown repl command :{other}, try :help")),
    }
}

fn usage(text: &str) -> ReplCommand {
    ReplCommand::Invalid(format!("usage: {text}"))
}

const REPL_HELP: &str = "\
  :tasks           list tasks
  :done <n>        toggle task n
  :rm <n>          delete task n
  :speak <n>       speak message n (again to stop)
  :listen          toggle voice input
  :name <name>     rename the assistant
  :theme           switch light/dark theme
  quit | exit      leave";

/// Slash commands come from the registry so added handlers are listed too.
fn help_text(registry: &CommandRegistry) -> String {
    let mut out = String::new();
    for (name, description) in registry.describe() {
        out.push_str(&format!("  /{name:<15} {description}\n"));
    }
    out.push_str(REPL_HELP);
    out
}

pub(crate) async fn run_repl(session: SessionController, bus: &EventBus) -> Result<()> {
    spawn_reply_printer(bus, session.settings().get().await).await;

    println!("hellolove REPL. Type ':help' for commands, 'quit' to exit.");
    println!("---");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }

        match parse_repl_line(&input) {
            ReplCommand::Quit => break,
            ReplCommand::Skip => {}
            ReplCommand::Help => println!("{}", help_text(session.interpreter().registry())),
            ReplCommand::Invalid(msg) => eprintln!("{msg}"),
            ReplCommand::Submit(text) => {
                let Some(submission) = session.submit_input(&text).await else {
                    continue;
                };
                if submission.interpretation.effect == Some(Effect::OpenSettings) {
                    print_settings(&session.settings().get().await);
                }
            }
            ReplCommand::Tasks => print_tasks(&session).await,
            ReplCommand::Done(n) => {
                let Some(task) = session.tasks().list().await.into_iter().nth(n - 1) else {
                    eprintln!("no task #{n}");
                    continue;
                };
                if let Some(completed) = session.toggle_task(&task.id).await {
                    let mark = if completed { "done" } else { "open" };
                    println!("#{n} {} is now {mark}", task.title);
                }
            }
            ReplCommand::Remove(n) => {
                let Some(task) = session.tasks().list().await.into_iter().nth(n - 1) else {
                    eprintln!("no task #{n}");
                    continue;
                };
                if session.delete_task(&task.id).await {
                    println!("removed: {}", task.title);
                }
            }
            ReplCommand::Speak(n) => {
                let Some(message) = session.conversation().list().await.into_iter().nth(n - 1) else {
                    eprintln!("no message #{n}");
                    continue;
                };
                if message.role != Role::Assistant {
                    eprintln!("only assistant messages can be spoken");
                } else if !session.toggle_speech(&message.id).await {
                    println!("stopped speaking");
                }
            }
            ReplCommand::Listen => {
                let listening = session.toggle_listening().await;
                match session.ui_state().await.voice_error {
                    Some(err) => eprintln!("{err}"),
                    None if listening => println!("listening..."),
                    None => println!("stopped listening"),
                }
            }
            ReplCommand::Settings => print_settings(&session.settings().get().await),
            ReplCommand::Rename(name) => {
                let patch = SettingsPatch {
                    assistant_name: Some(name),
                    ..Default::default()
                };
                match session.update_settings(patch).await {
                    Ok(settings) => println!("assistant is now {}", settings.assistant_name),
                    Err(err) => eprintln!("Error: {err}"),
                }
            }
            ReplCommand::Theme => {
                let theme = session.settings().get().await.theme.toggled();
                let patch = SettingsPatch {
                    theme: Some(theme),
                    ..Default::default()
                };
                if let Err(err) = session.update_settings(patch).await {
                    eprintln!("Error: {err}");
                }
            }
        }
    }

    Ok(())
}

/// Prints assistant replies as they are appended to the conversation.
async fn spawn_reply_printer(bus: &EventBus, initial: Settings) {
    let mut rx = bus
        .subscribe_many(&[
            Topic::MessageAppended,
            Topic::SettingsChanged,
            Topic::SpeakingChanged,
        ])
        .await;
    tokio::spawn(async move {
        let mut name = initial.assistant_name;
        while let Some(msg) = rx.recv().await {
            match msg {
                BusMessage::MessageAppended { message } if message.role == Role::Assistant => {
                    println!("{name}: {}", message.text);
                }
                BusMessage::SettingsChanged { settings } => name = settings.assistant_name,
                BusMessage::SpeakingChanged {
                    message_id: Some(id),
                } => {
                    tracing::debug!(message_id = %id, "speaking");
                }
                _ => {}
            }
        }
    });
}

async fn print_tasks(session: &SessionController) {
    let tasks = session.tasks().list().await;
    if tasks.is_empty() {
        println!("No tasks yet. Create one using /task command.");
        return;
    }
    for (idx, task) in tasks.iter().enumerate() {
        let check = if task.completed { "x" } else { " " };
        println!(
            "{:>3}. [{check}] {} ({})",
            idx + 1,
            task.title,
            task.priority.as_str()
        );
    }
}

fn print_settings(settings: &Settings) {
    let on_off = |v: bool| if v { "on" } else { "off" };
    println!("assistant name:  {}", settings.assistant_name);
    println!("theme:           {:?}", settings.theme);
    println!("voice:           {}", on_off(settings.voice_enabled));
    println!("language:        {}", settings.language);
    println!("notifications:   {}", on_off(settings.notifications));
    println!("task reminders:  {}", on_off(settings.task_reminders));
}

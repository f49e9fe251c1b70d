//! Line-oriented console for driving a session from stdin

use super::session::ClassifierSession;
use crate::utils::error::{AppError, AppResult};
use std::io;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

pub const HELP: &str = "\
commands:
  add <label>                 register a class
  example <label>             add the next frame as an example
  record <label> [seconds]    add every frame for a while; a trailing
                              number is the duration, quote labels that
                              end in one: record \"model 3\"
  count                       examples per class
  status                      recording status
  clear <label>               remove a class and its examples
  reset                       remove every class
  save [path]                 write the dataset
  load <path>                 replace the dataset from a file
  help                        this text
  quit                        exit";

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    AddClass(String),
    AddExample(String),
    Record {
        label: String,
        seconds: Option<f64>,
    },
    Count,
    Status,
    Clear(String),
    Reset,
    Save(Option<PathBuf>),
    Load(PathBuf),
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line. Labels may contain spaces.
    pub fn parse(line: &str) -> AppResult<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let label = |usage: &str| -> AppResult<String> {
            if rest.is_empty() {
                Err(AppError::InvalidInput(format!("usage: {}", usage)))
            } else {
                Ok(rest.to_string())
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "add" => Ok(Self::AddClass(label("add <label>")?)),
            "example" => Ok(Self::AddExample(label("example <label>")?)),
            "record" => parse_record(&label("record <label> [seconds]")?),
            "count" | "counts" => Ok(Self::Count),
            "status" => Ok(Self::Status),
            "clear" => Ok(Self::Clear(label("clear <label>")?)),
            "reset" => Ok(Self::Reset),
            "load" => Ok(Self::Load(PathBuf::from(label("load <path>")?))),
            "save" => Ok(Self::Save(
                (!rest.is_empty()).then(|| PathBuf::from(rest)),
            )),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(AppError::InvalidInput(format!(
                "unknown command '{}', try 'help'",
                other
            ))),
        }
    }
}

/// `<label> [seconds]` or `"<label>" [seconds]`
fn parse_record(rest: &str) -> AppResult<ConsoleCommand> {
    if let Some(quoted) = rest.strip_prefix('"') {
        let (name, tail) = quoted
            .split_once('"')
            .ok_or_else(|| AppError::InvalidInput("unterminated quote".to_string()))?;
        let tail = tail.trim();
        let seconds = if tail.is_empty() {
            None
        } else {
            Some(tail.parse::<f64>().map_err(|_| {
                AppError::InvalidInput(format!("'{}' is not a number of seconds", tail))
            })?)
        };
        return Ok(ConsoleCommand::Record {
            label: name.to_string(),
            seconds,
        });
    }

    // A trailing number is the duration
    match rest.rsplit_once(char::is_whitespace) {
        Some((name, secs)) if secs.parse::<f64>().is_ok() => Ok(ConsoleCommand::Record {
            label: name.trim().to_string(),
            seconds: secs.parse().ok(),
        }),
        _ => Ok(ConsoleCommand::Record {
            label: rest.to_string(),
            seconds: None,
        }),
    }
}

/// Run a command against the session and describe the outcome
pub fn execute(session: &ClassifierSession, command: ConsoleCommand) -> AppResult<String> {
    match command {
        ConsoleCommand::AddClass(label) => {
            let label = session.add_class(&label)?;
            Ok(format!("class '{}' registered", label))
        }
        ConsoleCommand::AddExample(label) => {
            session.add_example(&label)?;
            Ok(format!("next frame goes to '{}'", label))
        }
        ConsoleCommand::Record { label, seconds } => {
            session.start_recording(&label, seconds)?;
            let status = session.recording_status();
            Ok(format!(
                "recording '{}' for {:.1}s",
                label,
                status.remaining_ms as f64 / 1000.0
            ))
        }
        ConsoleCommand::Count => {
            let counts = session.get_class_counts();
            let registered = session.registered_classes();
            if registered.is_empty() {
                return Ok("no classes".to_string());
            }
            let lines: Vec<String> = registered
                .iter()
                .map(|label| format!("{}: {}", label, counts.get(label).copied().unwrap_or(0)))
                .collect();
            Ok(lines.join("\n"))
        }
        ConsoleCommand::Status => {
            let status = session.recording_status();
            Ok(match (status.active, status.target_label) {
                (true, Some(label)) => format!(
                    "recording '{}': {} examples, {}ms left",
                    label, status.examples_added, status.remaining_ms
                ),
                (false, Some(label)) => format!(
                    "idle (last recording '{}' added {} examples)",
                    label, status.examples_added
                ),
                _ => "idle".to_string(),
            })
        }
        ConsoleCommand::Clear(label) => {
            let removed = session.clear_class(&label)?;
            Ok(format!("cleared '{}' ({} examples)", label, removed))
        }
        ConsoleCommand::Reset => {
            session.clear_all();
            Ok("all classes removed".to_string())
        }
        ConsoleCommand::Load(path) => {
            let examples = session.load_dataset(&path)?;
            Ok(format!(
                "loaded {} examples in {} classes",
                examples,
                session.registered_classes().len()
            ))
        }
        ConsoleCommand::Save(path) => {
            let path = session.save_dataset(path.as_deref())?;
            Ok(format!("saved to {}", path.display()))
        }
        ConsoleCommand::Help => Ok(HELP.to_string()),
        ConsoleCommand::Quit => Ok(String::new()),
    }
}

/// Read commands from stdin until `quit`, end of input or Ctrl-C
pub async fn run_console(session: &ClassifierSession) -> io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match ConsoleCommand::parse(&line) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(command) => match execute(session, command) {
                Ok(output) => println!("{}", output),
                Err(e) => println!("Error: {}", e),
            },
            Err(e) => println!("Error: {}", e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FeatureVector;
    use crate::config::AppConfig;
    use tempfile::tempdir;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ConsoleCommand::parse("add  golden retriever ").unwrap(),
            ConsoleCommand::AddClass("golden retriever".to_string())
        );
        assert_eq!(
            ConsoleCommand::parse("record cat 2.5").unwrap(),
            ConsoleCommand::Record {
                label: "cat".to_string(),
                seconds: Some(2.5)
            }
        );
        assert_eq!(
            ConsoleCommand::parse("record open hand").unwrap(),
            ConsoleCommand::Record {
                label: "open hand".to_string(),
                seconds: None
            }
        );
        assert_eq!(ConsoleCommand::parse("COUNT").unwrap(), ConsoleCommand::Count);
        assert_eq!(ConsoleCommand::parse("save").unwrap(), ConsoleCommand::Save(None));
        assert_eq!(
            ConsoleCommand::parse("save out.json").unwrap(),
            ConsoleCommand::Save(Some(PathBuf::from("out.json")))
        );
        assert_eq!(ConsoleCommand::parse("exit").unwrap(), ConsoleCommand::Quit);
        assert_eq!(
            ConsoleCommand::parse("load saved/model.json").unwrap(),
            ConsoleCommand::Load(PathBuf::from("saved/model.json"))
        );
    }

    #[test]
    fn test_parse_quoted_record_label() {
        assert_eq!(
            ConsoleCommand::parse("record model 3").unwrap(),
            ConsoleCommand::Record {
                label: "model".to_string(),
                seconds: Some(3.0)
            }
        );
        assert_eq!(
            ConsoleCommand::parse(r#"record "model 3""#).unwrap(),
            ConsoleCommand::Record {
                label: "model 3".to_string(),
                seconds: None
            }
        );
        assert_eq!(
            ConsoleCommand::parse(r#"record "model 3" 1.5"#).unwrap(),
            ConsoleCommand::Record {
                label: "model 3".to_string(),
                seconds: Some(1.5)
            }
        );
        assert!(ConsoleCommand::parse(r#"record "model 3"#).is_err());
        assert!(ConsoleCommand::parse(r#"record "model" soon"#).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(ConsoleCommand::parse("add").is_err());
        assert!(ConsoleCommand::parse("clear   ").is_err());
        assert!(ConsoleCommand::parse("dance").is_err());
        assert!(ConsoleCommand::parse("load").is_err());
    }

    #[test]
    fn test_execute_count_and_clear() {
        let dir = tempdir().unwrap();
        let session = ClassifierSession::new(AppConfig {
            dataset_path: Some(dir.path().join("model.json")),
            ..AppConfig::default()
        });
        session.add_class("empty").unwrap();
        session
            .add_example_vector(FeatureVector::new(vec![1.0]).unwrap(), "one")
            .unwrap();

        let counts = execute(&session, ConsoleCommand::Count).unwrap();
        assert_eq!(counts, "empty: 0\none: 1");

        let cleared = execute(&session, ConsoleCommand::Clear("one".to_string())).unwrap();
        assert_eq!(cleared, "cleared 'one' (1 examples)");
        assert!(execute(&session, ConsoleCommand::Clear("one".to_string())).is_err());
    }

    #[test]
    fn test_execute_save() {
        let dir = tempdir().unwrap();
        let session = ClassifierSession::new(AppConfig::default());
        session
            .add_example_vector(FeatureVector::new(vec![1.0, 2.0]).unwrap(), "a")
            .unwrap();
        let path = dir.path().join("saved.json");

        let output = execute(&session, ConsoleCommand::Save(Some(path.clone()))).unwrap();

        assert!(output.starts_with("saved to"));
        assert!(path.exists());

        execute(&session, ConsoleCommand::Reset).unwrap();
        assert_eq!(execute(&session, ConsoleCommand::Count).unwrap(), "no classes");

        let loaded = execute(&session, ConsoleCommand::Load(path)).unwrap();
        assert_eq!(loaded, "loaded 1 examples in 1 classes");
    }
}

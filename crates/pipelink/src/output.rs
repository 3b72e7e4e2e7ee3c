use libpipelink::{PipeStatus, StatusEvent};
use serde::Serialize;

/// One line of `--json` output
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutputLine<'a> {
    Status(StatusEvent),
    Message { text: &'a str },
    Terminate,
}

/// Prints client events to stdout, as text or JSON lines
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn status(&self, status: PipeStatus, count: u64) {
        if self.json {
            self.emit(&OutputLine::Status(StatusEvent::new(status, count)));
        } else if status != PipeStatus::MessageCount {
            eprintln!("[{}]", status);
        }
    }

    pub fn message(&self, text: &str) {
        if self.json {
            self.emit(&OutputLine::Message { text });
        } else {
            println!("{}", text);
        }
    }

    pub fn terminate(&self) {
        if self.json {
            self.emit(&OutputLine::Terminate);
        } else {
            eprintln!("[exit requested by peer]");
        }
    }

    fn emit(&self, line: &OutputLine<'_>) {
        match serde_json::to_string(line) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Failed to encode output: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_lines_are_tagged() {
        let line = OutputLine::Status(StatusEvent::new(PipeStatus::MessageCount, 4));
        assert_eq!(
            serde_json::to_string(&line).unwrap(),
            r#"{"event":"status","status":"message_count","count":4}"#
        );

        let line = OutputLine::Message { text: "hi" };
        assert_eq!(
            serde_json::to_string(&line).unwrap(),
            r#"{"event":"message","text":"hi"}"#
        );

        assert_eq!(
            serde_json::to_string(&OutputLine::Terminate).unwrap(),
            r#"{"event":"terminate"}"#
        );
    }
}

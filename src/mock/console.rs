use std::collections::VecDeque;

use crate::console::{ConsoleEvent, ConsoleInput};

/// Console input from a fixed script.
///
/// `None` entries stand for polls that find nothing typed yet. Once the
/// script runs out, the console reports end of input.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConsole {
    script: VecDeque<Option<String>>,
    prompts: Vec<String>,
}

impl ScriptedConsole {
    pub fn new<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut console = Self::default();
        for line in lines {
            console = console.then_line(line);
        }
        console
    }

    pub fn then_line(mut self, line: &str) -> Self {
        self.script.push_back(Some(line.to_string()));
        self
    }

    /// `polls` polls that find no input.
    pub fn then_idle(mut self, polls: usize) -> Self {
        self.script.extend(std::iter::repeat_n(None, polls));
        self
    }

    /// Prompts shown for blocking reads.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl ConsoleInput for ScriptedConsole {
    fn poll_line(&mut self) -> Option<ConsoleEvent> {
        match self.script.pop_front() {
            Some(Some(line)) => Some(ConsoleEvent::Line(line)),
            Some(None) => None,
            None => Some(ConsoleEvent::Closed),
        }
    }

    fn read_line(&mut self, prompt: &str) -> ConsoleEvent {
        self.prompts.push(prompt.to_string());
        while let Some(entry) = self.script.pop_front() {
            if let Some(line) = entry {
                return ConsoleEvent::Line(line);
            }
        }
        ConsoleEvent::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_polls_then_lines_then_closed() {
        let mut console = ScriptedConsole::default()
            .then_idle(1)
            .then_line("e2e4");
        assert_eq!(console.poll_line(), None);
        assert_eq!(console.poll_line(), Some(ConsoleEvent::Line("e2e4".into())));
        assert_eq!(console.poll_line(), Some(ConsoleEvent::Closed));
    }

    #[test]
    fn blocking_read_skips_idle_entries() {
        let mut console = ScriptedConsole::default().then_idle(3).then_line("Nf3");
        assert_eq!(console.read_line("move? "), ConsoleEvent::Line("Nf3".into()));
        assert_eq!(console.prompts(), ["move? "]);
        assert_eq!(console.read_line("move? "), ConsoleEvent::Closed);
    }
}

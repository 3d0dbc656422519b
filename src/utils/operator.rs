//! Interaction with the person at the bench.
//!
//! Every prompt in solo goes through [`Operator`], so the hardware workflows can be
//! driven from a script in tests. Invalid answers never abort a workflow: `choose`
//! falls back to its default and `ask_parsed` re-prompts.

use std::{
    collections::VecDeque,
    fmt::Display,
    io::{self, BufRead, Write},
    str::FromStr,
};

pub trait Operator {
    /// Show `message` and block until the operator acknowledges it.
    fn pause(&mut self, message: &str);

    fn confirm(&mut self, question: &str, default: bool) -> bool;

    /// Free-text answer. An empty answer yields `default` (or an empty string).
    fn ask(&mut self, question: &str, default: Option<&str>) -> String;

    /// Pick one of `options`, returning its index. Out-of-range or unparsable input
    /// returns `default`.
    fn choose(&mut self, question: &str, options: &[String], default: usize) -> usize;
}

/// Ask until the answer parses as `T`.
pub fn ask_parsed<T>(operator: &mut dyn Operator, question: &str, default: T) -> T
where
    T: FromStr + Display,
{
    let default_text = default.to_string();
    loop {
        let answer = operator.ask(question, Some(&default_text));
        match answer.trim().parse::<T>() {
            Ok(value) => return value,
            Err(_) => println!("'{}' is not a valid value, please try again.", answer.trim()),
        }
    }
}

/// Interpret a 1-based menu answer.
pub fn parse_choice(answer: &str, len: usize, default: usize) -> usize {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => n - 1,
        _ => default,
    }
}

/// Interpret a yes/no answer; anything unrecognised yields `default`.
pub fn parse_confirm(answer: &str, default: bool) -> bool {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

/// Reads answers from the process's stdin.
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl ConsoleOperator {
    fn read_line(&self, prompt: &str) -> String {
        print!("{prompt}");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if let Err(e) = io::stdin().lock().read_line(&mut line) {
            tracing::warn!(error = %e, "failed to read operator input");
        }
        line.trim_end_matches(['\r', '\n']).to_string()
    }
}

impl Operator for ConsoleOperator {
    fn pause(&mut self, message: &str) {
        self.read_line(&format!("{message} "));
    }

    fn confirm(&mut self, question: &str, default: bool) -> bool {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        parse_confirm(&self.read_line(&format!("{question} {hint}: ")), default)
    }

    fn ask(&mut self, question: &str, default: Option<&str>) -> String {
        let prompt = match default {
            Some(d) if !d.is_empty() => format!("{question} [{d}]: "),
            _ => format!("{question}: "),
        };
        let answer = self.read_line(&prompt);
        let answer = answer.trim();
        if answer.is_empty() {
            default.unwrap_or_default().to_string()
        } else {
            answer.to_string()
        }
    }

    fn choose(&mut self, question: &str, options: &[String], default: usize) -> usize {
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, option);
        }
        let answer = self.read_line(&format!("{question} [{}]: ", default + 1));
        parse_choice(&answer, options.len(), default)
    }
}

/// Replays a fixed list of answers. Once the script runs out every prompt takes its
/// default, so a short script never hangs a test.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<String>,
    /// Every prompt shown, in order.
    pub transcript: Vec<String>,
}

impl ScriptedOperator {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, prompt: &str) -> Option<String> {
        self.transcript.push(prompt.to_string());
        self.answers.pop_front()
    }
}

impl Operator for ScriptedOperator {
    fn pause(&mut self, message: &str) {
        self.next(message);
    }

    fn confirm(&mut self, question: &str, default: bool) -> bool {
        match self.next(question) {
            Some(answer) => parse_confirm(&answer, default),
            None => default,
        }
    }

    fn ask(&mut self, question: &str, default: Option<&str>) -> String {
        match self.next(question) {
            Some(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            _ => default.unwrap_or_default().to_string(),
        }
    }

    fn choose(&mut self, question: &str, options: &[String], default: usize) -> usize {
        match self.next(question) {
            Some(answer) => parse_choice(&answer, options.len(), default),
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice_out_of_range_falls_back() {
        assert_eq!(parse_choice("2", 3, 0), 1);
        assert_eq!(parse_choice("0", 3, 0), 0);
        assert_eq!(parse_choice("7", 3, 1), 1);
        assert_eq!(parse_choice("abc", 3, 2), 2);
    }

    #[test]
    fn test_parse_confirm() {
        assert!(parse_confirm("Y", false));
        assert!(!parse_confirm("no", true));
        assert!(parse_confirm("", true));
        assert!(!parse_confirm("maybe", false));
    }

    #[test]
    fn test_scripted_operator_defaults_when_exhausted() {
        let mut op = ScriptedOperator::new(["n"]);
        assert!(!op.confirm("first?", true));
        assert!(op.confirm("second?", true));
        assert_eq!(op.ask("name", Some("front")), "front");
        assert_eq!(op.transcript.len(), 3);
    }

    #[test]
    fn test_ask_parsed_reprompts_on_garbage() {
        let mut op = ScriptedOperator::new(["ten", "12"]);
        let n: u32 = ask_parsed(&mut op, "episodes", 5);
        assert_eq!(n, 12);
        assert_eq!(op.remaining(), 0);
    }
}

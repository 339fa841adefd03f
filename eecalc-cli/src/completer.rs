use std::sync::{Arc, Mutex, PoisonError};

use eecalc::{BaseUnit, Session};
use rustyline::{
    self,
    completion::{extract_word, Completer, Pair},
};

pub const COMMANDS: [&str; 5] = ["help", "list", "clear", "quit", "exit"];

pub struct EecalcCompleter {
    pub session: Arc<Mutex<Session>>,
}

impl EecalcCompleter {
    fn words(&self) -> Vec<String> {
        let mut words: Vec<String> = COMMANDS.iter().map(|c| c.to_string()).collect();
        words.push("abs(".into());

        for unit in BaseUnit::all() {
            if !unit.shorthand().is_empty() {
                words.push(unit.shorthand().to_string());
            }
        }

        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        for variable in session.variables().iter() {
            words.push(variable.name().to_string());
        }

        words.sort();
        words.dedup();
        words
    }
}

impl Completer for EecalcCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let (pos_word, word_part) = extract_word(line, pos, None, |c| !c.is_alphabetic());

        let candidates = self
            .words()
            .into_iter()
            .filter(|w| !word_part.is_empty() && w.starts_with(word_part))
            .map(|w| Pair {
                display: w.clone(),
                replacement: w,
            })
            .collect();

        Ok((pos_word, candidates))
    }
}

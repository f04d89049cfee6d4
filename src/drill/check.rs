//! Grading replies to the numbers drill

use super::numbers::number_word;
use super::Language;
use crate::state_machine::{ChatId, Screen};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const NO_EXERCISE_TEXT: &str = "No active exercise for this chat";

/// Numbers sent in the latest drill for a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumbersExercise {
    pub lang: Language,
    /// Shown as digits, answered with words
    pub numerical: Vec<u32>,
    /// Shown as words, answered with digits
    pub text: Vec<u32>,
}

impl NumbersExercise {
    pub fn expected_answers(&self) -> usize {
        self.numerical.len() + self.text.len()
    }
}

/// Result of grading one reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grade {
    TooFewAnswers { expected: usize },
    Scored { score: usize, total: usize, report: String },
}

impl Grade {
    pub fn into_screen(self) -> Screen {
        match self {
            Grade::TooFewAnswers { expected } => {
                Screen::text(format!("❌ Please send {expected} answers."))
            }
            Grade::Scored { report, .. } => Screen::text(report).markdown(),
        }
    }
}

/// Score a reply: words for the numerical section, digits for the text section
pub fn grade(exercise: &NumbersExercise, reply: &str) -> Grade {
    let answers: Vec<String> = reply.split_whitespace().map(str::to_lowercase).collect();
    let total = exercise.expected_answers();
    if answers.len() < total {
        return Grade::TooFewAnswers { expected: total };
    }

    let lang = exercise.lang;
    let word = |n: u32| number_word(lang, n).unwrap_or_default();
    let mut score = 0;
    let mut report = String::from("🔢 *Numbers*\n");

    let (words, digits) = answers.split_at(exercise.numerical.len());
    for (answer, &n) in words.iter().zip(&exercise.numerical) {
        let expected = word(n);
        let correct = *answer == expected;
        score += usize::from(correct);
        let _ = writeln!(report, "{} {n} - {expected}", mark(correct));
    }

    report.push_str("\n📝 *Text Numbers*\n");
    for (answer, &n) in digits.iter().zip(&exercise.text) {
        let correct = answer.parse::<u32>().is_ok_and(|given| given == n);
        score += usize::from(correct);
        let _ = writeln!(report, "{} {} - {n}", mark(correct), word(n));
    }

    let _ = write!(report, "\nTotal score : {score}/{total}");
    Grade::Scored {
        score,
        total,
        report,
    }
}

fn mark(correct: bool) -> &'static str {
    if correct {
        "✅"
    } else {
        "❌"
    }
}

/// Latest numbers exercise per chat
#[derive(Debug, Default)]
pub struct Exercises {
    active: Mutex<HashMap<ChatId, NumbersExercise>>,
}

impl Exercises {
    pub fn new() -> Self {
        Self::default()
    }

    fn active(&self) -> MutexGuard<'_, HashMap<ChatId, NumbersExercise>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the chat's exercise with a newly sent one
    pub fn set(&self, chat_id: ChatId, exercise: NumbersExercise) {
        self.active().insert(chat_id, exercise);
    }

    pub fn get(&self, chat_id: ChatId) -> Option<NumbersExercise> {
        self.active().get(&chat_id).cloned()
    }

    /// Grade a reply against the chat's exercise
    pub fn check(&self, chat_id: ChatId, reply: &str) -> Screen {
        let Some(exercise) = self.get(chat_id) else {
            tracing::debug!(chat_id = %chat_id, "No active exercise");
            return Screen::text(NO_EXERCISE_TEXT);
        };
        let grade = grade(&exercise, reply);
        match &grade {
            Grade::TooFewAnswers { expected } => {
                tracing::info!(chat_id = %chat_id, expected, "Too few answers");
            }
            Grade::Scored { score, total, .. } => {
                tracing::info!(chat_id = %chat_id, score, total, "Exercise graded");
            }
        }
        grade.into_screen()
    }
}

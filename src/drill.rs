//! Daily drills: number words and irregular verbs

pub mod check;
pub mod numbers;
pub mod verbs;

pub use check::{grade, Exercises, NumbersExercise};

use crate::state_machine::Screen;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Kind of daily drill a chat can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Numbers,
    Verbs,
}

impl Task {
    pub const ALL: [Task; 2] = [Task::Numbers, Task::Verbs];

    pub fn as_str(self) -> &'static str {
        match self {
            Task::Numbers => "numbers",
            Task::Verbs => "verbs",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Task::Numbers => "📘 Daily numbers",
            Task::Verbs => "📖 Irregular verbs",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = DrillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "numbers" => Ok(Task::Numbers),
            "verbs" => Ok(Task::Verbs),
            _ => Err(DrillError::UnknownTask(s.to_string())),
        }
    }
}

/// Language a drill is taught in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    De,
    En,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::De, Language::En];

    pub fn code(self) -> &'static str {
        match self {
            Language::De => "DE",
            Language::En => "EN",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Language::De => "🇩🇪",
            Language::En => "🇬🇧",
        }
    }

    /// Button label
    pub fn label(self) -> &'static str {
        match self {
            Language::De => "🇩🇪 Deutsch",
            Language::En => "🇬🇧 English",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = DrillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DE" => Ok(Language::De),
            "EN" => Ok(Language::En),
            _ => Err(DrillError::UnknownLanguage(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum DrillError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),
    #[error("Unknown language: {0}")]
    UnknownLanguage(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}:{line}: expected infinitive;past;participle;translation")]
    Malformed { path: PathBuf, line: usize },
    #[error("No verbs in {0}")]
    Empty(PathBuf),
}

/// A composed drill message plus what its answers will be checked against
#[derive(Debug, Clone, PartialEq)]
pub struct Drill {
    pub screen: Screen,
    pub exercise: Option<NumbersExercise>,
}

/// Compose today's drill of `task` in `lang`
pub fn compose<R: Rng + ?Sized>(
    task: Task,
    lang: Language,
    data_dir: &Path,
    rng: &mut R,
) -> Result<Drill, DrillError> {
    match task {
        Task::Numbers => {
            let exercise = numbers::daily(lang, rng);
            Ok(Drill {
                screen: numbers::render(&exercise),
                exercise: Some(exercise),
            })
        }
        Task::Verbs => Ok(Drill {
            screen: verbs::daily(data_dir, lang, rng)?,
            exercise: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_task_and_language_parsing() {
        assert_eq!("numbers".parse::<Task>().unwrap(), Task::Numbers);
        assert_eq!("Verbs".parse::<Task>().unwrap(), Task::Verbs);
        assert!(matches!(
            "audio".parse::<Task>(),
            Err(DrillError::UnknownTask(t)) if t == "audio"
        ));
        assert_eq!("de".parse::<Language>().unwrap(), Language::De);
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Task::Verbs).unwrap(), "\"verbs\"");
        assert_eq!(serde_json::to_string(&Language::De).unwrap(), "\"DE\"");
        let lang: Language = serde_json::from_str("\"EN\"").unwrap();
        assert_eq!(lang, Language::En);
    }

    #[test]
    fn test_compose_numbers_keeps_exercise() {
        let mut rng = StdRng::seed_from_u64(7);
        let drill = compose(Task::Numbers, Language::De, Path::new("/nonexistent"), &mut rng)
            .unwrap();
        let exercise = drill.exercise.unwrap();
        assert_eq!(exercise.lang, Language::De);
        assert_eq!(exercise.numerical.len(), numbers::BATCH_SIZE);
        assert_eq!(exercise.text.len(), numbers::BATCH_SIZE);
    }

    #[test]
    fn test_compose_verbs_without_file() {
        let mut rng = StdRng::seed_from_u64(7);
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            compose(Task::Verbs, Language::En, dir.path(), &mut rng),
            Err(DrillError::Io { .. })
        ));
    }
}

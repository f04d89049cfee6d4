//! Irregular verb of the day

use super::{DrillError, Language};
use crate::state_machine::Screen;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};

/// One line of `verbs_<lang>.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verb {
    pub infinitive: String,
    pub past: String,
    pub participle: String,
    pub translation: String,
}

impl Verb {
    fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split(';').map(str::trim);
        let verb = Verb {
            infinitive: fields.next()?.to_string(),
            past: fields.next()?.to_string(),
            participle: fields.next()?.to_string(),
            translation: fields.next()?.to_string(),
        };
        if verb.infinitive.is_empty() {
            return None;
        }
        Some(verb)
    }
}

pub fn verbs_path(data_dir: &Path, lang: Language) -> PathBuf {
    data_dir.join(format!("verbs_{}.txt", lang.code().to_lowercase()))
}

/// Parse the verb list for `lang`, skipping blank lines
pub fn load(data_dir: &Path, lang: Language) -> Result<Vec<Verb>, DrillError> {
    let path = verbs_path(data_dir, lang);
    let content = std::fs::read_to_string(&path).map_err(|source| DrillError::Io {
        path: path.clone(),
        source,
    })?;

    let mut verbs = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let verb = Verb::parse(line).ok_or_else(|| DrillError::Malformed {
            path: path.clone(),
            line: i + 1,
        })?;
        verbs.push(verb);
    }
    if verbs.is_empty() {
        return Err(DrillError::Empty(path));
    }
    Ok(verbs)
}

pub fn daily<R: Rng + ?Sized>(
    data_dir: &Path,
    lang: Language,
    rng: &mut R,
) -> Result<Screen, DrillError> {
    let verbs = load(data_dir, lang)?;
    let verb = verbs
        .choose(rng)
        .ok_or_else(|| DrillError::Empty(verbs_path(data_dir, lang)))?;
    Ok(render(verb, lang))
}

pub fn render(verb: &Verb, lang: Language) -> Screen {
    Screen::text(format!(
        "📖{} <b>Daily Irregular verbs</b>\n\n\
         <b>{}</b> - <tg-spoiler>{}</tg-spoiler>\n\
         Forms: <tg-spoiler><b>{} - {} - {}</b></tg-spoiler>",
        lang.emoji(),
        escape(&verb.infinitive),
        escape(&verb.translation),
        escape(&verb.infinitive),
        escape(&verb.past),
        escape(&verb.participle),
    ))
    .html()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

//! The bot's dialogues: subscribe, unsubscribe and edit

mod edit;
mod subscribe;
mod unsubscribe;

pub use edit::EditConversation;
pub use subscribe::SubscribeConversation;
pub use unsubscribe::UnsubscribeConversation;

use crate::drill::{Language, Task};
use crate::state_machine::{Answers, Button, StepError};
use crate::store::SubInfo;
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

pub const NO_SUBSCRIPTIONS_TEXT: &str = "You have no subscriptions";

/// `HH:MM` with an optional `+X` / `-X` hour offset
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<hour>\d\d):(?P<minute>\d\d)(?P<timezone>[+-]\d)?$").unwrap()
});

static TIMEZONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]\d$").unwrap());

/// A wall-clock time typed by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
    pub timezone: Option<i32>,
}

/// Parse `HH:MM[+X|-X]`, rejecting hours past 23 and minutes past 59
pub fn parse_time(text: &str) -> Option<ClockTime> {
    let caps = TIME_RE.captures(text.trim())?;
    let hour: u32 = caps["hour"].parse().ok()?;
    let minute: u32 = caps["minute"].parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    let timezone = match caps.name("timezone") {
        Some(tz) => Some(tz.as_str().parse().ok()?),
        None => None,
    };
    Some(ClockTime {
        hour,
        minute,
        timezone,
    })
}

/// Parse a `+X` / `-X` hour offset
pub fn parse_timezone(text: &str) -> Option<i32> {
    let text = text.trim();
    if !TIMEZONE_RE.is_match(text) {
        return None;
    }
    text.parse().ok()
}

/// Typed answer stored by an earlier step
fn answer<T: FromStr>(answers: &Answers, key: &str) -> Result<T, StepError> {
    let raw = answers.require(key)?;
    raw.parse()
        .map_err(|_| StepError::Invalid(format!("{key}={raw}")))
}

/// Button payload identifying one subscription, e.g. `numbers_DE`
fn sub_key(sub: &SubInfo) -> String {
    format!("{}_{}", sub.task, sub.lang)
}

fn parse_sub_key(value: &str) -> Result<(Task, Language), StepError> {
    let invalid = || StepError::Invalid(format!("subscription {value:?}"));
    let (task, lang) = value.split_once('_').ok_or_else(invalid)?;
    Ok((
        task.parse().map_err(|_| invalid())?,
        lang.parse().map_err(|_| invalid())?,
    ))
}

/// `📘 Daily numbers - 🇩🇪 - 9:05 GMT+2`
pub fn subscription_label(sub: &SubInfo) -> String {
    format!(
        "{} - {} - {}",
        sub.task.display_name(),
        sub.lang.emoji(),
        sub.schedule()
    )
}

/// One `task:` button per subscription
fn subscription_buttons(subs: &[SubInfo]) -> Vec<Vec<Button>> {
    subs.iter()
        .map(|sub| {
            vec![Button::new(
                subscription_label(sub),
                format!("task:{}", sub_key(sub)),
            )]
        })
        .collect()
}

fn language_buttons() -> Vec<Vec<Button>> {
    vec![Language::ALL
        .iter()
        .map(|lang| Button::new(lang.label(), format!("lang:{lang}")))
        .collect()]
}

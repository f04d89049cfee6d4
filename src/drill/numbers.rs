//! Number words and the daily numbers drill

use super::check::NumbersExercise;
use super::Language;
use crate::state_machine::Screen;
use rand::Rng;

/// Numbers per drill section
pub const BATCH_SIZE: usize = 3;

/// Drills sample from `1..=MAX_NUMBER`
pub const MAX_NUMBER: u32 = 99;

const DE_ONES: [&str; 20] = [
    "", "eins", "zwei", "drei", "vier", "fünf", "sechs", "sieben", "acht", "neun", "zehn", "elf",
    "zwölf", "dreizehn", "vierzehn", "fünfzehn", "sechzehn", "siebzehn", "achtzehn", "neunzehn",
];
const DE_TENS: [&str; 10] = [
    "", "", "zwanzig", "dreißig", "vierzig", "fünfzig", "sechzig", "siebzig", "achtzig", "neunzig",
];

const EN_ONES: [&str; 20] = [
    "", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
];
const EN_TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Spelled-out form of `n` as the drill expects it back: lowercase, one word.
///
/// German puts the ones first (`einundzwanzig`), English glues tens and ones
/// (`twentyone`). `None` outside `1..=99`.
pub fn number_word(lang: Language, n: u32) -> Option<String> {
    if !(1..=MAX_NUMBER).contains(&n) {
        return None;
    }
    let (ones, tens) = match lang {
        Language::De => (&DE_ONES, &DE_TENS),
        Language::En => (&EN_ONES, &EN_TENS),
    };
    let n = n as usize;
    if n < 20 {
        return Some(ones[n].to_string());
    }
    let (t, o) = (n / 10, n % 10);
    Some(match (lang, o) {
        (_, 0) => tens[t].to_string(),
        // "eins" loses its s in compounds
        (Language::De, 1) => format!("einund{}", tens[t]),
        (Language::De, _) => format!("{}und{}", ones[o], tens[t]),
        (Language::En, _) => format!("{}{}", tens[t], ones[o]),
    })
}

/// Draw `2 * BATCH_SIZE` distinct numbers: the first batch is shown as
/// digits to translate, the second as words to read back.
pub fn daily<R: Rng + ?Sized>(lang: Language, rng: &mut R) -> NumbersExercise {
    let drawn: Vec<u32> = rand::seq::index::sample(rng, MAX_NUMBER as usize, BATCH_SIZE * 2)
        .into_iter()
        .map(|i| i as u32 + 1)
        .collect();
    let (numerical, text) = drawn.split_at(BATCH_SIZE);
    NumbersExercise {
        lang,
        numerical: numerical.to_vec(),
        text: text.to_vec(),
    }
}

pub fn render(exercise: &NumbersExercise) -> Screen {
    let digits = exercise
        .numerical
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join("  ");
    let words = exercise
        .text
        .iter()
        .filter_map(|&n| number_word(exercise.lang, n))
        .collect::<Vec<_>>()
        .join("\n");
    Screen::text(format!(
        "📘{} *Daily Numbers*\n\n\
         🔢 *Numbers (translate)*\n{digits}\n\n\
         📝 *Text Numbers*\n\n{words}\n\n\
         Reply with {} answers separated by spaces: words first, then digits.",
        exercise.lang.emoji(),
        exercise.expected_answers(),
    ))
    .markdown()
}

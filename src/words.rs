//! French spelling of invoice amounts for the closing statement.
//!
//! Traditional orthography: hyphens only below one hundred, `et` before `un`
//! and `onze` in the tens that take it, and the plural `s` on `vingts` and
//! `cents` only when nothing but `millions`/`milliards` follows.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{InvoiceError, Result};

/// Largest amount that gets spelled out.
pub const MAX_SPELLED: u64 = 999_999_999_999;

pub const OVERFLOW_PLACEHOLDER: &str = "montant trop élevé";

const UNITS: [&str; 17] = [
    "zéro", "un", "deux", "trois", "quatre", "cinq", "six", "sept", "huit", "neuf", "dix", "onze",
    "douze", "treize", "quatorze", "quinze", "seize",
];

const TENS: [&str; 7] = ["", "dix", "vingt", "trente", "quarante", "cinquante", "soixante"];

/// Spells the integer part of `amount`; the fraction is truncated.
pub fn amount_in_words(amount: Decimal) -> Result<String> {
    let whole = amount.trunc();
    let magnitude = whole
        .abs()
        .to_u64()
        .filter(|n| *n <= MAX_SPELLED)
        .ok_or_else(|| InvoiceError::RenderOverflow(amount.to_string()))?;

    let words = spell(magnitude);
    if whole.is_sign_negative() && magnitude > 0 {
        Ok(format!("moins {}", words))
    } else {
        Ok(words)
    }
}

/// Like [`amount_in_words`], with the placeholder in place of an overflow.
pub fn amount_in_words_or_placeholder(amount: Decimal) -> String {
    amount_in_words(amount).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to overflow placeholder");
        OVERFLOW_PLACEHOLDER.to_string()
    })
}

fn spell(n: u64) -> String {
    if n == 0 {
        return UNITS[0].to_string();
    }

    let milliards = n / 1_000_000_000;
    let millions = (n / 1_000_000) % 1_000;
    let thousands = (n / 1_000) % 1_000;
    let rest = n % 1_000;

    let mut parts: Vec<String> = Vec::new();
    for (count, singular, plural) in [(milliards, "milliard", "milliards"), (millions, "million", "millions")] {
        if count == 0 {
            continue;
        }
        // `millions` and `milliards` are nouns, so `cents`/`vingts` keep the s.
        let noun = if count == 1 { singular } else { plural };
        parts.push(format!("{} {}", below_thousand(count, true), noun));
    }

    if thousands == 1 {
        parts.push("mille".to_string());
    } else if thousands > 1 {
        parts.push(format!("{} mille", below_thousand(thousands, false)));
    }

    if rest > 0 {
        parts.push(below_thousand(rest, true));
    }

    parts.join(" ")
}

/// `plural_final` is false when the group is followed by `mille`.
fn below_thousand(n: u64, plural_final: bool) -> String {
    let hundreds = n / 100;
    let rest = n % 100;

    let mut out = match hundreds {
        0 => String::new(),
        1 => "cent".to_string(),
        h if rest == 0 && plural_final => format!("{} cents", UNITS[h as usize]),
        h => format!("{} cent", UNITS[h as usize]),
    };

    if rest > 0 {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&below_hundred(rest, plural_final));
    }
    out
}

fn below_hundred(n: u64, plural_final: bool) -> String {
    match n {
        0..=16 => UNITS[n as usize].to_string(),
        17..=19 => format!("dix-{}", UNITS[(n - 10) as usize]),
        20..=69 => tens_and_units(TENS[(n / 10) as usize], n % 10),
        70..=79 => match n - 60 {
            11 => "soixante et onze".to_string(),
            r => format!("soixante-{}", below_hundred(r, plural_final)),
        },
        80 if plural_final => "quatre-vingts".to_string(),
        80 => "quatre-vingt".to_string(),
        _ => format!("quatre-vingt-{}", below_hundred(n - 80, plural_final)),
    }
}

fn tens_and_units(tens: &str, unit: u64) -> String {
    match unit {
        0 => tens.to_string(),
        1 => format!("{} et un", tens),
        u => format!("{}-{}", tens, UNITS[u as usize]),
    }
}

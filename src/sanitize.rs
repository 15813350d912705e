/// Maps text onto what the builtin PDF fonts can draw (Latin-1). Typographic
/// quotes, dashes and spaces get their plain equivalents; anything else
/// outside the range becomes `?`. Applying it twice changes nothing.
pub fn sanitize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '`' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => out.push('"'),
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\t' => out.push(' '),
            '\u{200B}' | '\u{FEFF}' => {}
            '\u{20AC}' => out.push_str("EUR"),
            c if c.is_control() => {}
            c if (c as u32) < 0x100 => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

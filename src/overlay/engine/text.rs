/// Punctuation cleanup applied to translated text before wrapping.
///
/// Full-width periods and ellipsis characters become ASCII periods, whitespace sitting
/// between two periods is dropped, and any run of three or more periods is collapsed
/// to exactly `...`.
///
/// Whitespace removal chains through a whole spaced run, so `. . .` becomes `...`. A
/// single pass of a `\.\s+\.` regex replacement would leave `.. .` instead.
pub fn normalize_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|ch| match ch {
            '．' | '…' => '.',
            other => other,
        })
        .collect();
    collapse_period_runs(&join_spaced_periods(&replaced))
}

fn join_spaced_periods(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        out.push(ch);
        idx += 1;
        if ch != '.' {
            continue;
        }
        let mut lookahead = idx;
        while lookahead < chars.len() && chars[lookahead].is_whitespace() {
            lookahead += 1;
        }
        if lookahead > idx && chars.get(lookahead) == Some(&'.') {
            idx = lookahead;
        }
    }
    out
}

fn collapse_period_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for ch in text.chars() {
        if ch == '.' {
            run += 1;
            continue;
        }
        push_periods(&mut out, run);
        run = 0;
        out.push(ch);
    }
    push_periods(&mut out, run);
    out
}

fn push_periods(out: &mut String, run: usize) {
    let count = if run >= 3 { 3 } else { run };
    for _ in 0..count {
        out.push('.');
    }
}

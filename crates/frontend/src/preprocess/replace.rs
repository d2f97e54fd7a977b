//! Pseudo-text replacement shared by `REPLACE` and `COPY ... REPLACING`.
//!
//! Matching is token-wise and case-insensitive inside one line's coding area.
//! `LEADING` / `TRAILING` operands and `:TAG:` style operands replace part of a word.

/// How an operand is matched against the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Whole token sequence
    Tokens,
    /// Prefix of a word
    Leading,
    /// Suffix of a word
    Trailing,
    /// Anywhere inside a word (`==:TAG:==`)
    Partial,
}

/// One `operand-1 BY operand-2` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub mode: MatchMode,
    /// Upper-cased tokens of operand-1
    pub pattern: Vec<String>,
    /// Replacement text, inserted verbatim
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    PseudoText(String),
    Word(String),
}

impl Operand {
    fn text(&self) -> &str {
        match self {
            Self::PseudoText(text) | Self::Word(text) => text,
        }
    }
}

/// Parse `==a== BY ==b== [LEADING ==c== BY ==d==]...`
pub fn parse_operands(body: &str) -> Result<Vec<Replacement>, String> {
    let operands = split_operands(body)?;
    let mut out = Vec::new();
    let mut idx = 0;

    while idx < operands.len() {
        let mut mode = MatchMode::Tokens;
        if let Operand::Word(word) = &operands[idx] {
            if word.eq_ignore_ascii_case("LEADING") {
                mode = MatchMode::Leading;
                idx += 1;
            } else if word.eq_ignore_ascii_case("TRAILING") {
                mode = MatchMode::Trailing;
                idx += 1;
            }
        }

        let from = operands
            .get(idx)
            .ok_or_else(|| "missing replacing operand".to_string())?;
        match operands.get(idx + 1) {
            Some(Operand::Word(by)) if by.eq_ignore_ascii_case("BY") => {}
            _ => return Err(format!("expected BY after {}", from.text())),
        }
        let to = operands
            .get(idx + 2)
            .ok_or_else(|| format!("missing replacement for {}", from.text()))?;

        let pattern: Vec<String> = words(from.text())
            .into_iter()
            .map(|(_, _, word)| word.to_ascii_uppercase())
            .collect();
        if pattern.is_empty() {
            return Err("empty pseudo-text cannot be replaced".to_string());
        }

        if mode == MatchMode::Tokens && pattern.len() == 1 && pattern[0].contains(':') {
            mode = MatchMode::Partial;
        }
        if mode != MatchMode::Tokens && pattern.len() != 1 {
            return Err(format!("partial-word operand must be one word: {}", from.text()));
        }

        out.push(Replacement {
            mode,
            pattern,
            replacement: to.text().trim().to_string(),
        });
        idx += 3;
    }

    if out.is_empty() {
        return Err("no replacement operands".to_string());
    }
    Ok(out)
}

fn split_operands(body: &str) -> Result<Vec<Operand>, String> {
    let chars: Vec<char> = body.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || c == ',' || c == ';' {
            i += 1;
            continue;
        }

        if c == '=' && chars.get(i + 1) == Some(&'=') {
            let start = i + 2;
            let mut end = start;
            while end + 1 < chars.len() && !(chars[end] == '=' && chars[end + 1] == '=') {
                end += 1;
            }
            if end + 1 >= chars.len() {
                return Err("unterminated pseudo-text".to_string());
            }
            out.push(Operand::PseudoText(chars[start..end].iter().collect()));
            i = end + 2;
            continue;
        }

        if c == '"' || c == '\'' {
            let mut end = i + 1;
            while end < chars.len() && chars[end] != c {
                end += 1;
            }
            if end >= chars.len() {
                return Err("unterminated literal operand".to_string());
            }
            out.push(Operand::Word(chars[i..=end].iter().collect()));
            i = end + 1;
            continue;
        }

        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() && chars[i] != ',' && chars[i] != ';' {
            i += 1;
        }
        out.push(Operand::Word(chars[start..i].iter().collect()));
    }

    Ok(out)
}

/// Split text into (start, end, word) char offsets; literals stay one word,
/// and a separator period or comma is not part of the word.
pub(crate) fn words(text: &str) -> Vec<(usize, usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        if c == '"' || c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != c {
                i += 1;
            }
            i = (i + 1).min(chars.len());
        } else if matches!(c, '(' | ')') {
            i += 1;
        } else {
            while i < chars.len() && !chars[i].is_whitespace() && !matches!(chars[i], '(' | ')') {
                if matches!(chars[i], '.' | ',' | ';')
                    && chars.get(i + 1).map_or(true, |n| n.is_whitespace())
                {
                    break;
                }
                i += 1;
            }
            if i == start {
                // lone separator
                i += 1;
            }
        }
        out.push((start, i, chars[start..i].iter().collect()));
    }

    out
}

/// Apply replacements to one coding area. Returns `None` when nothing matched.
#[must_use]
pub fn apply(content: &str, replacements: &[Replacement]) -> Option<String> {
    if replacements.is_empty() {
        return None;
    }

    let chars: Vec<char> = content.chars().collect();
    let tokens = words(content);
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    let mut changed = false;
    let mut i = 0;

    'outer: while i < tokens.len() {
        for rep in replacements {
            match rep.mode {
                MatchMode::Tokens => {
                    let len = rep.pattern.len();
                    if i + len > tokens.len() {
                        continue;
                    }
                    let matched = rep
                        .pattern
                        .iter()
                        .zip(&tokens[i..i + len])
                        .all(|(p, (_, _, word))| word.eq_ignore_ascii_case(p));
                    if matched {
                        out.extend(&chars[cursor..tokens[i].0]);
                        out.push_str(&rep.replacement);
                        cursor = tokens[i + len - 1].1;
                        changed = true;
                        i += len;
                        continue 'outer;
                    }
                }
                MatchMode::Leading | MatchMode::Trailing | MatchMode::Partial => {
                    let (start, end, word) = &tokens[i];
                    if let Some(rewritten) = rewrite_word(word, rep) {
                        out.extend(&chars[cursor..*start]);
                        out.push_str(&rewritten);
                        cursor = *end;
                        changed = true;
                        i += 1;
                        continue 'outer;
                    }
                }
            }
        }
        i += 1;
    }

    if !changed {
        return None;
    }
    out.extend(&chars[cursor..]);
    Some(out)
}

fn rewrite_word(word: &str, rep: &Replacement) -> Option<String> {
    let pattern = &rep.pattern[0];
    let upper = word.to_ascii_uppercase();
    match rep.mode {
        MatchMode::Leading if upper.starts_with(pattern.as_str()) && upper.len() > pattern.len() => {
            Some(format!("{}{}", rep.replacement, &word[pattern.len()..]))
        }
        MatchMode::Trailing if upper.ends_with(pattern.as_str()) && upper.len() > pattern.len() => {
            Some(format!(
                "{}{}",
                &word[..word.len() - pattern.len()],
                rep.replacement
            ))
        }
        MatchMode::Partial if upper.contains(pattern.as_str()) => {
            let mut result = String::new();
            let mut rest = word;
            let mut rest_upper = upper.as_str();
            while let Some(pos) = rest_upper.find(pattern.as_str()) {
                result.push_str(&rest[..pos]);
                result.push_str(&rep.replacement);
                rest = &rest[pos + pattern.len()..];
                rest_upper = &rest_upper[pos + pattern.len()..];
            }
            result.push_str(rest);
            Some(result)
        }
        _ => None,
    }
}

//! Regex normalization for reverse URL construction.
//!
//! [`normalize`] turns a regex pattern into the list of reconstruction
//! possibilities a reverse lookup can try: pairs of a format string (with
//! `%(name)s` placeholders) and the ordered parameter names it consumes.
//! Repeated sections keep their minimum occurrence count, optional groups
//! that carry parameters produce both the with- and without- variant,
//! character classes are represented by their first element, lookarounds are
//! ignored, and positional groups are assigned the synthetic names `_0`,
//! `_1`, ... in order.
//!
//! Disjunctions (`|`) and other non-reversible constructs make the whole
//! pattern fall back to a single literal possibility with no parameters;
//! such a candidate can still be returned verbatim by a reverse lookup that
//! supplies no arguments, and fails the final match check otherwise.

use std::collections::HashMap;

/// One reconstruction possibility: a format string containing `%(name)s`
/// placeholders and the parameter names in order of appearance.
pub(crate) type Possibility = (String, Vec<String>);

#[derive(Debug, Clone)]
enum Part {
    /// A literal character.
    Char(char),
    /// A capture group, rendered as a `%(name)s` placeholder. `param` is
    /// `None` for named backreferences, which re-render an earlier value.
    Group { fmt: String, param: Option<String> },
    /// A non-capturing group's contents, regrouped so a quantifier can apply
    /// to it as a unit.
    NonCapture(Vec<Part>),
    /// Alternative renderings; `None` is the empty alternative.
    Choice(Vec<Option<Part>>),
}

struct NonReversible;

/// Decodes a pattern character-by-character, resolving escapes.
///
/// Escape sequences yield a representative character with the escaped flag
/// set: `\d` yields `'0'`, `\s` yields `' '`, `\w` yields `'x'`, and so on.
/// Zero-width escapes (anchors, word boundaries) yield nothing.
struct CharDecoder<'a> {
    chars: std::str::Chars<'a>,
}

impl Iterator for CharDecoder<'_> {
    type Item = (char, bool);

    fn next(&mut self) -> Option<(char, bool)> {
        loop {
            let c = self.chars.next()?;
            if c != '\\' {
                return Some((c, false));
            }
            let escaped = self.chars.next()?;
            let representative = match escaped {
                'A' | 'b' | 'B' | 'Z' | 'z' => continue,
                'd' => '0',
                'D' | 'S' | 'w' => 'x',
                's' => ' ',
                'W' => '!',
                other => other,
            };
            return Some((representative, true));
        }
    }
}

/// Normalizes `pattern` into its reverse-reconstruction possibilities.
///
/// Never fails: a pattern the algorithm cannot handle is returned as a
/// single literal possibility with no parameters.
pub(crate) fn normalize(pattern: &str) -> Vec<Possibility> {
    try_normalize(pattern).unwrap_or_else(|NonReversible| vec![(pattern.to_string(), Vec::new())])
}

#[allow(clippy::too_many_lines)]
fn try_normalize(pattern: &str) -> Result<Vec<Possibility>, NonReversible> {
    let mut iter = CharDecoder {
        chars: pattern.chars(),
    };
    let mut result: Vec<Part> = Vec::new();
    let mut non_capturing_groups: Vec<usize> = Vec::new();
    let mut num_args = 0usize;
    // A lookahead character handed back by quantifier parsing.
    let mut pending: Option<(char, bool)> = None;

    loop {
        let Some((ch, escaped)) = pending.take().or_else(|| iter.next()) else {
            break;
        };
        if escaped {
            result.push(Part::Char(ch));
            continue;
        }
        match ch {
            '.' => result.push(Part::Char('.')),
            '|' => return Err(NonReversible),
            '^' => {}
            '$' => break,
            ')' => {
                // Only a non-capturing group's closer reaches the main loop;
                // capturing groups are consumed whole below.
                let start = non_capturing_groups.pop().ok_or(NonReversible)?;
                let inner = result.split_off(start);
                result.push(Part::NonCapture(inner));
            }
            '[' => {
                // The first element of the class stands in for the whole
                // class; the rest is skipped.
                let (first, _) = iter.next().ok_or(NonReversible)?;
                result.push(Part::Char(first));
                loop {
                    let (c, esc) = iter.next().ok_or(NonReversible)?;
                    if !esc && c == ']' {
                        break;
                    }
                }
            }
            '(' => {
                let (ch2, esc2) = iter.next().ok_or(NonReversible)?;
                if ch2 != '?' || esc2 {
                    // A positional group.
                    let name = format!("_{num_args}");
                    num_args += 1;
                    result.push(Part::Group {
                        fmt: format!("%({name})s"),
                        param: Some(name),
                    });
                    walk_to_end(ch2, &mut iter);
                } else {
                    let (ch3, _) = iter.next().ok_or(NonReversible)?;
                    match ch3 {
                        // Lookahead/lookbehind assertions contribute nothing.
                        '!' | '=' | '<' => walk_to_end(ch3, &mut iter),
                        ':' => non_capturing_groups.push(result.len()),
                        'P' => {
                            let (ch4, _) = iter.next().ok_or(NonReversible)?;
                            let terminal = match ch4 {
                                '<' => '>',
                                '=' => ')',
                                _ => return Err(NonReversible),
                            };
                            let mut name = String::new();
                            let mut c = iter.next().ok_or(NonReversible)?;
                            while c.0 != terminal {
                                name.push(c.0);
                                c = iter.next().ok_or(NonReversible)?;
                            }
                            if terminal == '>' {
                                result.push(Part::Group {
                                    fmt: format!("%({name})s"),
                                    param: Some(name),
                                });
                                walk_to_end(c.0, &mut iter);
                            } else {
                                // A named backreference: the parenthesis is
                                // already consumed.
                                result.push(Part::Group {
                                    fmt: format!("%({name})s"),
                                    param: None,
                                });
                            }
                        }
                        _ => return Err(NonReversible),
                    }
                }
            }
            '*' | '?' | '+' | '{' => {
                let (count, lookahead) = get_quantifier(ch, &mut iter)?;
                if let Some(la) = lookahead {
                    pending = Some(la);
                }
                if count == 0 {
                    let last = result.pop().ok_or(NonReversible)?;
                    if contains_group(&last) {
                        // A zero-minimum quantifier over a parameter group
                        // also permits one occurrence; keep both renderings.
                        result.push(Part::Choice(vec![None, Some(last)]));
                    }
                } else if count > 1 {
                    let last = result.last().cloned().ok_or(NonReversible)?;
                    for _ in 1..count {
                        result.push(last.clone());
                    }
                }
            }
            c => result.push(Part::Char(c)),
        }
    }

    Ok(flatten_seq(&result))
}

/// Skips to the closing parenthesis of the current group. `start` is the
/// first character after the opening sequence, which may itself open a
/// nested group.
fn walk_to_end(start: char, iter: &mut CharDecoder<'_>) {
    let mut nesting = usize::from(start == '(');
    for (c, esc) in iter {
        if esc {
            continue;
        }
        if c == '(' {
            nesting += 1;
        } else if c == ')' {
            if nesting == 0 {
                return;
            }
            nesting -= 1;
        }
    }
}

/// Parses a quantifier starting at `ch`, returning the minimum occurrence
/// count and, when the parse had to look one character ahead, that
/// character for the caller to process next.
fn get_quantifier(
    ch: char,
    iter: &mut CharDecoder<'_>,
) -> Result<(usize, Option<(char, bool)>), NonReversible> {
    if matches!(ch, '*' | '?' | '+') {
        let mut lookahead = iter.next();
        // A trailing '?' just makes the quantifier non-greedy.
        if let Some(('?', false)) = lookahead {
            lookahead = None;
        }
        let count = usize::from(ch == '+');
        return Ok((count, lookahead));
    }

    // A '{m}', '{m,}' or '{m,n}' quantifier: the minimum is the first value.
    let mut quant = String::new();
    loop {
        let (c, _) = iter.next().ok_or(NonReversible)?;
        if c == '}' {
            break;
        }
        quant.push(c);
    }
    let min = quant
        .split(',')
        .next()
        .and_then(|v| v.parse::<usize>().ok())
        .ok_or(NonReversible)?;

    let mut lookahead = iter.next();
    if let Some(('?', false)) = lookahead {
        lookahead = None;
    }
    Ok((min, lookahead))
}

/// Returns `true` if the part renders at least one capture group.
fn contains_group(part: &Part) -> bool {
    match part {
        Part::Group { .. } => true,
        Part::NonCapture(inner) => inner.iter().any(contains_group),
        Part::Char(_) | Part::Choice(_) => false,
    }
}

/// Flattens a parsed part sequence into the cartesian product of its
/// choice alternatives.
fn flatten_seq(parts: &[Part]) -> Vec<Possibility> {
    let mut results: Vec<Possibility> = vec![(String::new(), Vec::new())];
    for part in parts {
        match part {
            Part::Char(c) => {
                for (text, _) in &mut results {
                    text.push(*c);
                }
            }
            Part::Group { fmt, param } => {
                for (text, params) in &mut results {
                    text.push_str(fmt);
                    if let Some(p) = param {
                        params.push(p.clone());
                    }
                }
            }
            Part::NonCapture(inner) => {
                results = combine(&results, &flatten_seq(inner));
            }
            Part::Choice(items) => {
                let mut alternatives = Vec::new();
                for item in items {
                    alternatives.extend(flatten_part(item.as_ref()));
                }
                results = combine(&results, &alternatives);
            }
        }
    }
    results
}

fn flatten_part(part: Option<&Part>) -> Vec<Possibility> {
    match part {
        None => vec![(String::new(), Vec::new())],
        Some(p) => flatten_seq(std::slice::from_ref(p)),
    }
}

fn combine(left: &[Possibility], right: &[Possibility]) -> Vec<Possibility> {
    let mut out = Vec::with_capacity(left.len() * right.len());
    for (l_text, l_params) in left {
        for (r_text, r_params) in right {
            let mut params = l_params.clone();
            params.extend(r_params.iter().cloned());
            out.push((format!("{l_text}{r_text}"), params));
        }
    }
    out
}

/// Substitutes `%(name)s` placeholders in a normalize format string.
///
/// Returns `None` when a placeholder has no substitution, which makes the
/// reverse candidate fail rather than panic. Characters other than the
/// placeholder introducer pass through unchanged.
pub(crate) fn substitute(format: &str, subs: &HashMap<String, String>) -> Option<String> {
    let mut out = String::with_capacity(format.len());
    let mut rest = format;
    while let Some(pos) = rest.find("%(") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        let end = after.find(")s")?;
        let name = &after[..end];
        out.push_str(subs.get(name)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Some(out)
}

/// parse model catalog documents with structure like
/// ```text
/// # comment
/// [section]
/// key = value
/// ```
/// into a list of sections, each with its `key = value` entries in file order.
/// Lines starting with `#`, `;`, `%` or `//` are comments. The value is the rest of the line,
/// so it may itself contain `=`, `[` or quotes (formulas do).
use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::{all_consuming, rest},
    sequence::{delimited, separated_pair, terminated},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogSyntaxError {
    #[error("line {line}: unterminated section header `{content}`")]
    UnterminatedSection { line: usize, content: String },
    #[error("line {line}: entry outside of any section `{content}`")]
    EntryOutsideSection { line: usize, content: String },
    #[error("line {line}: expected `[name]` or `key = value`, found `{content}`")]
    Malformed { line: usize, content: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub key: String,
    pub value: String,
    /// 1-based line number
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawSection {
    pub name: String,
    pub line: usize,
    pub entries: Vec<RawEntry>,
}

impl RawSection {
    /// last value given for `key`
    pub fn get(&self, key: &str) -> Option<&RawEntry> {
        self.entries.iter().rev().find(|entry| entry.key == key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Line<'a> {
    Blank,
    Header(&'a str),
    Entry(&'a str, &'a str),
}

/// Parses a key (word characters without spaces)
pub(crate) fn parse_key(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_').parse(input)
}

/// `[name]`, optional trailing blanks
pub(crate) fn parse_header(input: &str) -> IResult<&str, &str> {
    all_consuming(terminated(
        delimited(
            char('['),
            take_while1(|c: char| c != '[' && c != ']'),
            char(']'),
        ),
        space0,
    ))
    .parse(input)
}

/// `key = value`; the value is everything after the first `=`
pub(crate) fn parse_key_value(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(parse_key, delimited(space0, char('='), space0), rest).parse(input)
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#')
        || trimmed.starts_with(';')
        || trimmed.starts_with('%')
        || trimmed.starts_with("//")
}

pub(crate) fn classify_line(line_no: usize, raw: &str) -> Result<Line<'_>, CatalogSyntaxError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || is_comment(trimmed) {
        return Ok(Line::Blank);
    }
    if trimmed.starts_with('[') {
        return match parse_header(trimmed) {
            Ok((_, name)) if !name.trim().is_empty() => Ok(Line::Header(name.trim())),
            Ok(_) => Err(CatalogSyntaxError::Malformed {
                line: line_no,
                content: trimmed.to_string(),
            }),
            Err(_) if trimmed.contains(']') => Err(CatalogSyntaxError::Malformed {
                line: line_no,
                content: trimmed.to_string(),
            }),
            Err(_) => Err(CatalogSyntaxError::UnterminatedSection {
                line: line_no,
                content: trimmed.to_string(),
            }),
        };
    }
    match parse_key_value(trimmed) {
        Ok((_, (key, value))) => Ok(Line::Entry(key, value.trim_end())),
        Err(_) => Err(CatalogSyntaxError::Malformed {
            line: line_no,
            content: trimmed.to_string(),
        }),
    }
}

/// Parses the entire document into sections, in file order.
pub fn parse_catalog(input: &str) -> Result<Vec<RawSection>, CatalogSyntaxError> {
    let mut sections: Vec<RawSection> = Vec::new();
    for (index, raw) in input.lines().enumerate() {
        let line_no = index + 1;
        match classify_line(line_no, raw)? {
            Line::Blank => {}
            Line::Header(name) => sections.push(RawSection {
                name: name.to_string(),
                line: line_no,
                entries: Vec::new(),
            }),
            Line::Entry(key, value) => match sections.last_mut() {
                Some(section) => section.entries.push(RawEntry {
                    key: key.to_string(),
                    value: value.to_string(),
                    line: line_no,
                }),
                None => {
                    return Err(CatalogSyntaxError::EntryOutsideSection {
                        line: line_no,
                        content: raw.trim().to_string(),
                    });
                }
            },
        }
    }
    Ok(sections)
}

/// Writes one section back in the document format.
pub fn format_section<'a, I>(name: &str, entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let mut out = format!("[{}]\n", name);
    for (key, value) in entries {
        out.push_str(&format!("{} = {}\n", key, value));
    }
    out
}

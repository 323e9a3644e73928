//! Nom-based IRC line parser.
//!
//! Produces borrowed slices into the input; [`super::Message`] turns them
//! into owned values.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

/// RFC 2812: at most 15 parameters.
const MAX_PARAMS: usize = 15;

/// Message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Command name: `1*letter / 3digit`, followed by a space or the end of line.
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;
    if !rest.is_empty() && !rest.starts_with(' ') {
        return Err(nom::Err::Error(nom::error::Error::new(rest, ErrorKind::Space)));
    }

    let letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let numeric = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());

    if letters || numeric {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Parameters after the command. Runs of spaces count as one separator;
/// a `:`-prefixed parameter swallows the rest of the line.
fn parse_params(input: &str) -> (&str, SmallVec<[&str; MAX_PARAMS]>) {
    let mut params: SmallVec<[&str; MAX_PARAMS]> = SmallVec::new();
    let mut rest = input;

    while rest.starts_with(' ') && params.len() < MAX_PARAMS {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            rest = "";
            break;
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (rest, params)
}

/// A parsed line with borrowed slices.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedLine<'a> {
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: SmallVec<[&'a str; MAX_PARAMS]>,
}

fn parse_line(input: &str) -> IResult<&str, ParsedLine<'_>> {
    let (input, _) = space0(input)?;
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;
    let (input, command) = parse_command(input)?;
    let (rest, params) = parse_params(input);

    Ok((
        rest,
        ParsedLine {
            prefix,
            command,
            params,
        },
    ))
}

impl<'a> ParsedLine<'a> {
    /// Parse a line that has already had its terminator stripped.
    ///
    /// On failure returns the byte offset where parsing stopped.
    pub fn parse(input: &'a str) -> Result<Self, usize> {
        match parse_line(input) {
            Ok((_rest, line)) => Ok(line),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(input.len() - e.input.len()),
            Err(nom::Err::Incomplete(_)) => Err(input.len()),
        }
    }
}

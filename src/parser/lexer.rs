// Token-level parsers shared by every step parser

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, take_while},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, recognize, value},
    number::complete::double,
    sequence::{delimited, pair},
    IResult,
};

/// Wrap a parser so it tolerates surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Bare column or config name: letter or underscore, then alphanumerics, `_` or `.`
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
        )),
        |s: &str| s.to_string(),
    )(input)
}

/// Double-quoted string with `\"` and `\\` escapes
pub fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        map(tag_empty_string, |_| String::new()),
        delimited(
            char('"'),
            escaped_transform(
                is_not("\\\""),
                '\\',
                alt((value("\\", char('\\')), value("\"", char('"')))),
            ),
            char('"'),
        ),
    ))(input)
}

fn tag_empty_string(input: &str) -> IResult<&str, &str> {
    recognize(pair(char('"'), char('"')))(input)
}

pub fn number_literal(input: &str) -> IResult<&str, f64> {
    double(input)
}

/// A field reference: quoted when it contains spaces, bare otherwise
pub fn field_name(input: &str) -> IResult<&str, String> {
    alt((string_literal, identifier))(input)
}

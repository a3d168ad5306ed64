// Step parsers: one function per DSL keyword
//
// Every step has the shape `name(key: value, ...)`. Arguments may appear in
// any order; required ones are checked after the list is parsed.

use super::ast::{BarStep, ColorStep, FillStep, MapStep, Step};
use super::lexer::{field_name, number_literal, string_literal, ws};
use crate::aggregate::{Reducer, Reduction, SortOrder};
use crate::scale::Normalization;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{map, map_res},
    error::{Error, ErrorKind},
    multi::separated_list0,
    sequence::{delimited, preceded},
    IResult,
};

#[derive(Debug)]
enum Arg {
    Field(String),
    Map(String),
    Value(String),
    Into(String),
    Rules(String),
    By(String),
    Reduce(Reducer, String),
    Order(SortOrder),
    Palette(String),
    Norm(Normalization),
    Ramp(String),
    Elevation(f64),
    Y(String),
    Title(String),
    Lon(String),
    Lat(String),
    Size(f64),
}

fn text_arg<'a>(key: &'static str, wrap: fn(String) -> Arg) -> impl FnMut(&'a str) -> IResult<&'a str, Arg> {
    map(preceded(ws(tag(key)), ws(field_name)), wrap)
}

fn number_arg<'a>(key: &'static str, wrap: fn(f64) -> Arg) -> impl FnMut(&'a str) -> IResult<&'a str, Arg> {
    map(preceded(ws(tag(key)), ws(number_literal)), wrap)
}

fn reduce_arg<'a>(key: &'static str, reducer: Reducer) -> impl FnMut(&'a str) -> IResult<&'a str, Arg> {
    map(preceded(ws(tag(key)), ws(field_name)), move |f| Arg::Reduce(reducer, f))
}

/// `keyword( arg, arg, ... )`
fn call<'a, P>(keyword: &'static str, arg: P) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<Arg>>
where
    P: FnMut(&'a str) -> IResult<&'a str, Arg>,
{
    preceded(
        ws(tag(keyword)),
        delimited(ws(char('(')), separated_list0(ws(char(',')), arg), ws(char(')'))),
    )
}

fn missing(input: &str) -> nom::Err<Error<&str>> {
    nom::Err::Failure(Error::new(input, ErrorKind::Verify))
}

pub fn parse_remap(input: &str) -> IResult<&str, Step> {
    let (rest, args) = call(
        "remap",
        alt((text_arg("field:", Arg::Field), text_arg("map:", Arg::Map))),
    )(input)?;

    let (mut field, mut map_name) = (None, None);
    for arg in args {
        match arg {
            Arg::Field(f) => field = Some(f),
            Arg::Map(m) => map_name = Some(m),
            _ => {}
        }
    }
    let field = field.ok_or_else(|| missing(input))?;
    Ok((rest, Step::Remap { field, map: map_name }))
}

pub fn parse_fill_null(input: &str) -> IResult<&str, Step> {
    let (rest, args) = call(
        "fill_null",
        alt((
            text_arg("field:", Arg::Field),
            map(preceded(ws(tag("value:")), ws(string_literal)), Arg::Value),
        )),
    )(input)?;

    let (mut field, mut value) = (None, None);
    for arg in args {
        match arg {
            Arg::Field(f) => field = Some(f),
            Arg::Value(v) => value = Some(v),
            _ => {}
        }
    }
    match (field, value) {
        (Some(field), Some(value)) => Ok((rest, Step::FillNull { field, value })),
        _ => Err(missing(input)),
    }
}

pub fn parse_bucket(input: &str) -> IResult<&str, Step> {
    let (rest, args) = call(
        "bucket",
        alt((
            text_arg("field:", Arg::Field),
            text_arg("into:", Arg::Into),
            text_arg("rules:", Arg::Rules),
        )),
    )(input)?;

    let (mut field, mut into, mut rules) = (None, None, None);
    for arg in args {
        match arg {
            Arg::Field(f) => field = Some(f),
            Arg::Into(i) => into = Some(i),
            Arg::Rules(r) => rules = Some(r),
            _ => {}
        }
    }
    match (field, into) {
        (Some(field), Some(into)) => Ok((rest, Step::Bucket { field, into, rules })),
        _ => Err(missing(input)),
    }
}

pub fn parse_drop_null(input: &str) -> IResult<&str, Step> {
    let (rest, args) = call("drop_null", text_arg("field:", Arg::Field))(input)?;
    let field = args
        .into_iter()
        .find_map(|a| match a {
            Arg::Field(f) => Some(f),
            _ => None,
        })
        .ok_or_else(|| missing(input))?;
    Ok((rest, Step::DropNull { field }))
}

/// `summarize(by: land_use, sum: lot_area, mean: floors, count: pin)`
pub fn parse_summarize(input: &str) -> IResult<&str, Step> {
    let (rest, args) = call(
        "summarize",
        alt((
            text_arg("by:", Arg::By),
            reduce_arg("sum:", Reducer::Sum),
            reduce_arg("mean:", Reducer::Mean),
            reduce_arg("count:", Reducer::Count),
        )),
    )(input)?;

    let mut by = None;
    let mut reductions = Vec::new();
    for arg in args {
        match arg {
            Arg::By(b) => by = Some(b),
            Arg::Reduce(reducer, field) => reductions.push(Reduction::new(field, reducer)),
            _ => {}
        }
    }
    if reductions.is_empty() {
        return Err(missing(input));
    }
    let by = by.ok_or_else(|| missing(input))?;
    Ok((rest, Step::Summarize { by, reductions }))
}

pub fn parse_sort(input: &str) -> IResult<&str, Step> {
    let (rest, args) = call(
        "sort",
        alt((
            text_arg("by:", Arg::By),
            map(
                preceded(ws(tag("order:")), map_res(ws(field_name), |s| s.parse::<SortOrder>())),
                Arg::Order,
            ),
        )),
    )(input)?;

    let mut by = None;
    let mut order = SortOrder::default();
    for arg in args {
        match arg {
            Arg::By(b) => by = Some(b),
            Arg::Order(o) => order = o,
            _ => {}
        }
    }
    let by = by.ok_or_else(|| missing(input))?;
    Ok((rest, Step::Sort { by, order }))
}

pub fn parse_color(input: &str) -> IResult<&str, Step> {
    let (rest, args) = call(
        "color",
        alt((text_arg("field:", Arg::Field), text_arg("palette:", Arg::Palette))),
    )(input)?;

    let mut step = ColorStep { field: String::new(), palette: None };
    for arg in args {
        match arg {
            Arg::Field(f) => step.field = f,
            Arg::Palette(p) => step.palette = Some(p),
            _ => {}
        }
    }
    if step.field.is_empty() {
        return Err(missing(input));
    }
    Ok((rest, Step::Color(step)))
}

/// `fill(field: floors, norm: log, ramp: heat, elevation: 3)`
pub fn parse_fill(input: &str) -> IResult<&str, Step> {
    let (rest, args) = call(
        "fill",
        alt((
            text_arg("field:", Arg::Field),
            map(
                preceded(ws(tag("norm:")), map_res(ws(field_name), |s| s.parse::<Normalization>())),
                Arg::Norm,
            ),
            text_arg("ramp:", Arg::Ramp),
            number_arg("elevation:", Arg::Elevation),
        )),
    )(input)?;

    let mut step = FillStep {
        field: String::new(),
        norm: Normalization::default(),
        ramp: None,
        elevation: None,
    };
    for arg in args {
        match arg {
            Arg::Field(f) => step.field = f,
            Arg::Norm(n) => step.norm = n,
            Arg::Ramp(r) => step.ramp = Some(r),
            Arg::Elevation(e) => step.elevation = Some(e),
            _ => {}
        }
    }
    if step.field.is_empty() {
        return Err(missing(input));
    }
    Ok((rest, Step::Fill(step)))
}

pub fn parse_bar(input: &str) -> IResult<&str, Step> {
    let (rest, args) = call(
        "bar",
        alt((
            text_arg("y:", Arg::Y),
            text_arg("palette:", Arg::Palette),
            map(preceded(ws(tag("title:")), ws(string_literal)), Arg::Title),
        )),
    )(input)?;

    let mut step = BarStep::default();
    for arg in args {
        match arg {
            Arg::Y(y) => step.y = y,
            Arg::Palette(p) => step.palette = Some(p),
            Arg::Title(t) => step.title = Some(t),
            _ => {}
        }
    }
    if step.y.is_empty() {
        return Err(missing(input));
    }
    Ok((rest, Step::Bar(step)))
}

pub fn parse_map(input: &str) -> IResult<&str, Step> {
    let (rest, args) = call(
        "map",
        alt((
            text_arg("lon:", Arg::Lon),
            text_arg("lat:", Arg::Lat),
            number_arg("size:", Arg::Size),
            map(preceded(ws(tag("title:")), ws(string_literal)), Arg::Title),
        )),
    )(input)?;

    let mut step = MapStep::default();
    for arg in args {
        match arg {
            Arg::Lon(l) => step.lon = Some(l),
            Arg::Lat(l) => step.lat = Some(l),
            Arg::Size(s) => step.size = Some(s),
            Arg::Title(t) => step.title = Some(t),
            _ => {}
        }
    }
    Ok((rest, Step::Map(step)))
}

/// Parse any step. `fill_null` is tried before `fill` since both share a prefix.
pub fn parse_step(input: &str) -> IResult<&str, Step> {
    alt((
        parse_remap,
        parse_fill_null,
        parse_bucket,
        parse_drop_null,
        parse_summarize,
        parse_sort,
        parse_color,
        parse_fill,
        parse_bar,
        parse_map,
    ))(input)
}

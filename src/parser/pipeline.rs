// Pipeline parser: step | step | ...

use super::ast::Pipeline;
use super::lexer::ws;
use super::steps::parse_step;
use anyhow::{anyhow, Result};
use nom::{
    bytes::complete::tag,
    combinator::{eof, opt},
    multi::separated_list1,
    IResult,
};

/// Parse a complete pipeline, consuming all input
pub fn parse_steps(input: &str) -> IResult<&str, Pipeline> {
    // Optional leading "|"
    let (input, _) = opt(ws(tag("|")))(input)?;
    let (input, steps) = separated_list1(ws(tag("|")), parse_step)(input)?;
    let (input, _) = ws(eof)(input)?;
    Ok((input, Pipeline { steps }))
}

/// Parse DSL text into a [`Pipeline`], reporting where parsing stopped
pub fn parse_pipeline(input: &str) -> Result<Pipeline> {
    match parse_steps(input) {
        Ok((_, pipeline)) => Ok(pipeline),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let near: String = e.input.trim().chars().take(40).collect();
            if near.is_empty() {
                Err(anyhow!("Parse error: unexpected end of pipeline"))
            } else {
                Err(anyhow!("Parse error near '{}'", near))
            }
        }
        Err(nom::Err::Incomplete(_)) => Err(anyhow!("Parse error: incomplete pipeline")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Step;

    #[test]
    fn test_parse_full_summary_pipeline() {
        let pipeline = parse_pipeline(
            r#"remap(field: land_use) | fill_null(field: land_use, value: "Unknown")
               | summarize(by: land_use, sum: lot_area) | sort(by: lot_area_sum, order: desc)
               | bar(y: lot_area_sum)"#,
        )
        .unwrap();
        let names: Vec<&str> = pipeline.steps.iter().map(Step::name).collect();
        assert_eq!(names, vec!["remap", "fill_null", "summarize", "sort", "bar"]);
    }

    #[test]
    fn test_parse_leading_pipe() {
        let pipeline = parse_pipeline("| drop_null(field: floors) | fill(field: floors)").unwrap();
        assert_eq!(pipeline.steps.len(), 2);
    }

    #[test]
    fn test_parse_unknown_step() {
        let err = parse_pipeline("remap(field: a) | explode(field: a)").unwrap_err();
        assert!(err.to_string().contains("Parse error"), "{}", err);
    }

    #[test]
    fn test_parse_trailing_garbage() {
        assert!(parse_pipeline("remap(field: a) extra").is_err());
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_pipeline("   ").is_err());
    }
}

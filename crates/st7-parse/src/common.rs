//! Grammar pieces shared by the levels and timing languages.

use regex::{Captures, Regex};
use st7_model::{Spec, MAX_SPECSET_NUM};

use crate::context::ParserContext;
use crate::error::Result;

/// A signed decimal number with optional exponent.
const NUMBER: &str = r"[+\-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+\-]?\d+)?";

/// Regexes common to the levels and timing files.
#[derive(Debug)]
pub struct CommonGrammar {
    pub eqnset: Regex,
    pub spec_declaration: Regex,
    pub spec_values: Regex,
    pub assignment: Regex,
    pub specset: Regex,
    eqsp: Regex,
}

impl CommonGrammar {
    /// Compile the shared grammar; `language` is `LEV` or `TIM`.
    pub fn new(language: &str) -> Result<Self> {
        Ok(Self {
            eqnset: Regex::new(r#"^EQNSET\s+(?P<num>\d+)\s*(?P<desc>.*)$"#)?,
            spec_declaration: Regex::new(r"^(?P<name>[A-Za-z_]\w*)\s*(?:\[(?P<unit>[^\]]*)\])?$")?,
            spec_values: Regex::new(&format!(
                r"^(?P<name>[A-Za-z_]\w*)\s+(?P<act>{NUMBER})(?:\s+(?P<min>{NUMBER}))?(?:\s+(?P<max>{NUMBER}))?\s*(?:\[(?P<unit>[^\]]*)\]|(?P<bare_unit>[A-Za-z]\w*))?\s*(?:#\s*(?P<comment>.*))?$"
            ))?,
            assignment: Regex::new(r"^(?P<name>\w+)\s*=\s*(?P<expr>.+)$")?,
            specset: Regex::new(r#"^SPECSET\s+(?P<num>\d+)\s*(?P<desc>.*)$"#)?,
            eqsp: Regex::new(&format!(r"^EQSP\s+{language},[A-Z]+,#\d+$"))?,
        })
    }

    /// Validate the strict form of an `EQSP` section marker.
    pub fn check_eqsp<S>(&self, ctx: &ParserContext<S>, line: &str) -> Result<()> {
        if self.eqsp.is_match(line) {
            Ok(())
        } else {
            Err(ctx.syntax(line, "malformed EQSP section marker"))
        }
    }

    /// Build a [`Spec`] from a match of [`CommonGrammar::spec_values`].
    pub fn spec_from<S>(&self, ctx: &ParserContext<S>, line: &str, caps: &Captures<'_>) -> Result<Spec> {
        let number = |name: &str| -> Result<Option<f64>> {
            match caps.name(name) {
                Some(m) => m
                    .as_str()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| ctx.syntax(line, format!("invalid {name} value"))),
                None => Ok(None),
            }
        };
        let actual = number("act")?.ok_or_else(|| ctx.syntax(line, "missing actual value"))?;
        let unit = caps
            .name("unit")
            .or_else(|| caps.name("bare_unit"))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        Ok(Spec {
            name: caps["name"].to_string(),
            actual,
            minimum: number("min")?,
            maximum: number("max")?,
            unit,
            comment: caps
                .name("comment")
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        })
    }
}

/// Parse a decimal set/block number.
pub fn parse_num<S>(ctx: &ParserContext<S>, line: &str, text: &str) -> Result<u32> {
    text.parse()
        .map_err(|_| ctx.syntax(line, format!("invalid number '{text}'")))
}

/// A SPECSET number, which must fit the two digits of its spec set id.
pub fn parse_specset_num<S>(ctx: &ParserContext<S>, line: &str, text: &str) -> Result<u32> {
    let num = parse_num(ctx, line, text)?;
    if num > MAX_SPECSET_NUM {
        return Err(ctx.syntax(
            line,
            format!("SPECSET number {num} is above {MAX_SPECSET_NUM}"),
        ));
    }
    Ok(num)
}

/// Whether `line` is an `hp93000,<language>,<d>.<d>` header of any format
/// version.
pub fn is_header(line: &str, language: &str) -> bool {
    let version = line
        .strip_prefix("hp93000,")
        .and_then(|rest| rest.strip_prefix(language))
        .and_then(|rest| rest.strip_prefix(','))
        .map(str::as_bytes);
    matches!(version, Some([major, b'.', minor]) if major.is_ascii_digit() && minor.is_ascii_digit())
}

/// Strip surrounding whitespace and double quotes.
pub fn unquote(text: &str) -> String {
    text.trim().trim_matches('"').trim().to_string()
}

/// Keywords that look like spec declarations but never are.
pub fn is_reserved_word(word: &str) -> bool {
    matches!(
        word,
        "EQSP" | "SPECS" | "EQUATIONS" | "NOOP" | "SYNC" | "PHASE" | "STATEMAP"
    )
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoder for the hOCR `title` attribute.
//
// The attribute is an unordered bag of `key value...` properties separated by
// semicolons, e.g. `bbox 10 20 110 50; baseline 0.003 -8; x_wconf 93`. The
// same microformat is reused by every element kind, each carrying a different
// subset, so every property is optional. Each recognised key has its own
// pattern matched against the whole string: a malformed property leaves only
// its own field unset and never hides the others.

use std::sync::LazyLock;

use regex::Regex;
use schriftwerk_core::{Baseline, BoundingBox};
use tracing::trace;

static BBOX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bbbox\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)").expect("valid bbox regex")
});
static BASELINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bbaseline\s+([-\d.]+)\s+([-\d.]+)").expect("valid baseline regex")
});
static X_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bx_size\s+([\d.]+)").expect("valid x_size regex"));
static X_DESCENDERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bx_descenders\s+([\d.]+)").expect("valid x_descenders regex")
});
static X_ASCENDERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bx_ascenders\s+([\d.]+)").expect("valid x_ascenders regex"));
static X_WCONF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bx_wconf\s+(\d+)").expect("valid x_wconf regex"));
static PPAGENO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bppageno\s+(\d+)").expect("valid ppageno regex"));
static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimage\s+"((?:[^"\\]|\\.)*)""#).expect("valid image regex")
});
static ESCAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(.)").expect("valid escape regex"));

/// Typed view of an hOCR `title` attribute.
///
/// A field is `Some` only when its property was present and its value parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TitleAttributes {
    /// `bbox x0 y0 x1 y1`.
    pub bbox: Option<BoundingBox>,
    /// `baseline slope offset`.
    pub baseline: Option<Baseline>,
    /// `x_size` — line height in pixels, used as the font size.
    pub x_size: Option<f64>,
    /// `x_descenders`.
    pub x_descenders: Option<f64>,
    /// `x_ascenders`.
    pub x_ascenders: Option<f64>,
    /// `x_wconf` — word confidence, 0-100.
    pub x_wconf: Option<u32>,
    /// `ppageno` — physical page number.
    pub page_no: Option<u32>,
    /// `image "path"` — source image reference.
    pub image: Option<String>,
}

/// Parse a `title` attribute string. Never fails; unrecognised or malformed
/// properties are simply absent from the result.
pub fn parse_title(title: &str) -> TitleAttributes {
    let attrs = TitleAttributes {
        bbox: parse_bbox(title),
        baseline: parse_baseline(title),
        x_size: capture(&X_SIZE_RE, title).and_then(parse_decimal),
        x_descenders: capture(&X_DESCENDERS_RE, title).and_then(parse_decimal),
        x_ascenders: capture(&X_ASCENDERS_RE, title).and_then(parse_decimal),
        x_wconf: capture(&X_WCONF_RE, title)
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|conf| *conf <= 100),
        page_no: capture(&PPAGENO_RE, title).and_then(|raw| raw.parse().ok()),
        image: capture(&IMAGE_RE, title).map(|raw| ESCAPE_RE.replace_all(raw, "$1").into_owned()),
    };
    trace!(title, ?attrs, "title attributes parsed");
    attrs
}

/// First capture group of `re` in `haystack`.
fn capture<'h>(re: &Regex, haystack: &'h str) -> Option<&'h str> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn parse_bbox(title: &str) -> Option<BoundingBox> {
    let caps = BBOX_RE.captures(title)?;
    let coord = |idx: usize| caps.get(idx)?.as_str().parse::<i64>().ok();
    BoundingBox::new(coord(1)?, coord(2)?, coord(3)?, coord(4)?)
}

fn parse_baseline(title: &str) -> Option<Baseline> {
    let caps = BASELINE_RE.captures(title)?;
    let slope = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let offset = caps.get(2)?.as_str().parse::<f64>().ok()?;
    Some(Baseline { slope, offset })
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

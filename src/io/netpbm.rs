//! Plain-text netpbm reader and writer (`P2` grayscale, `P3` color).
//!
//! Layout: magic, optional `#` comment lines, `width height`, `max_value`,
//! then `width * height * channels` whitespace-separated samples. Comments
//! that appear before the pixel data are kept on the grid and written back
//! out on save.

use std::fmt::Write as _;

use conv_kernel::{GridKind, PixelGrid, Sample};

use crate::error::{FilterError, FilterResult};

/// Parse a complete plain-text raster. `origin` is only used in error messages.
pub fn parse(text: &str, origin: &str) -> FilterResult<PixelGrid> {
    let mut tokens = Tokens::new(text);

    let magic = tokens
        .next()
        .ok_or_else(|| FilterError::load(origin, "empty file"))?;
    let kind = GridKind::from_magic(magic).ok_or_else(|| {
        FilterError::load(origin, format!("unsupported magic number '{}'", magic))
            .with_recovery_suggestion("Only plain-text P2 and P3 rasters are parsed as text")
    })?;

    let width = header_value(&mut tokens, origin, "width")?;
    let height = header_value(&mut tokens, origin, "height")?;
    let max_value = header_value(&mut tokens, origin, "max value")?;
    if width == 0 || height == 0 {
        return Err(FilterError::load(
            origin,
            format!("invalid dimensions {}x{}", width, height),
        ));
    }
    let max_value = Sample::try_from(max_value)
        .ok()
        .filter(|max| *max > 0)
        .ok_or_else(|| {
            FilterError::load(
                origin,
                format!("max value {} outside 1..=65535", max_value),
            )
        })?;
    let comments = tokens.take_comments();

    let expected = kind.sample_count(width, height).ok_or_else(|| {
        FilterError::load(
            origin,
            format!("dimensions {}x{} overflow the sample count", width, height),
        )
    })?;
    // The header is untrusted; never reserve more than the text could hold.
    let mut samples = Vec::with_capacity(expected.min(text.len() / 2 + 1));
    for token in tokens.by_ref() {
        if samples.len() == expected {
            return Err(FilterError::load(
                origin,
                format!("more than {} samples in pixel data", expected),
            ));
        }
        let value: u32 = token.parse().map_err(|_| {
            FilterError::load(origin, format!("invalid sample '{}'", token))
        })?;
        if value > u32::from(max_value) {
            return Err(FilterError::load(
                origin,
                format!(
                    "sample {} has value {} outside [0, {}]",
                    samples.len(),
                    value,
                    max_value
                ),
            ));
        }
        samples.push(value as Sample);
    }
    if samples.len() != expected {
        return Err(FilterError::load(
            origin,
            format!(
                "unexpected end of pixel data: expected {} samples, found {}",
                expected,
                samples.len()
            ),
        ));
    }

    let grid = PixelGrid::from_samples(kind, width, height, max_value, samples)
        .map_err(|e| FilterError::load(origin, e.to_string()))?;
    Ok(grid.with_comments(comments))
}

/// Render a grid as plain text, one line per pixel row.
pub fn render(grid: &PixelGrid) -> String {
    let digits = grid.max_value().to_string().len() + 1;
    let mut out = String::with_capacity(grid.samples().len() * digits + 64);

    let _ = writeln!(out, "{}", grid.kind().magic());
    for comment in grid.comments() {
        let _ = writeln!(out, "# {}", comment);
    }
    let _ = writeln!(out, "{} {}", grid.width(), grid.height());
    let _ = writeln!(out, "{}", grid.max_value());

    for row in grid.samples().chunks_exact(grid.row_len()) {
        let mut first = true;
        for sample in row {
            if !first {
                out.push(' ');
            }
            first = false;
            let _ = write!(out, "{}", sample);
        }
        out.push('\n');
    }
    out
}

fn header_value(tokens: &mut Tokens<'_>, origin: &str, field: &str) -> FilterResult<u32> {
    let token = tokens
        .next()
        .ok_or_else(|| FilterError::load(origin, format!("missing {} in header", field)))?;
    token
        .parse()
        .map_err(|_| FilterError::load(origin, format!("invalid {} '{}'", field, token)))
}

/// Whitespace tokenizer that strips `#` comments, remembering the ones seen
/// until [`Tokens::take_comments`] is called.
struct Tokens<'a> {
    lines: std::str::Lines<'a>,
    current: std::str::SplitWhitespace<'a>,
    comments: Vec<String>,
    collecting: bool,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            current: "".split_whitespace(),
            comments: Vec::new(),
            collecting: true,
        }
    }

    /// Comments seen so far. Later comments are dropped.
    fn take_comments(&mut self) -> Vec<String> {
        self.collecting = false;
        std::mem::take(&mut self.comments)
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            if let Some(token) = self.current.next() {
                return Some(token);
            }
            let line = self.lines.next()?;
            let data = match line.split_once('#') {
                Some((data, comment)) => {
                    if self.collecting {
                        self.comments.push(comment.trim().to_string());
                    }
                    data
                }
                None => line,
            };
            self.current = data.split_whitespace();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conv_kernel::PixelValue;

    const GRAY: &str = "P2\n# written by hand\n3 2\n15\n0 1 2\n13 14 15\n";

    #[test]
    fn test_parse_grayscale_with_comment() {
        let grid = parse(GRAY, "gray.pgm").unwrap();
        assert_eq!(grid.kind(), GridKind::Scalar);
        assert_eq!(grid.dimensions(), (3, 2));
        assert_eq!(grid.max_value(), 15);
        assert_eq!(grid.comments(), ["written by hand"]);
        assert_eq!(grid.get(2, 1), Some(PixelValue::Scalar(15)));
    }

    #[test]
    fn test_parse_color_tolerates_free_layout() {
        let text = "P3 2 1 255 # trailing\n255 0 0\n0 0 255";
        let grid = parse(text, "color.ppm").unwrap();
        assert_eq!(grid.kind(), GridKind::Triple);
        assert_eq!(grid.get(1, 0), Some(PixelValue::Triple([0, 0, 255])));
        assert_eq!(grid.comments(), ["trailing"]);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let cases = [
            ("", "empty"),
            ("P5\n1 1\n255\n0", "binary magic"),
            ("P2\n2 2\n255\n1 2 3", "short data"),
            ("P2\n1 1\n255\n1 2", "long data"),
            ("P2\n1 1\n10\n11", "out of range"),
            ("P2\n1 1\n0\n0", "zero max"),
            ("P2\n0 1\n255\n", "zero width"),
            ("P2\n1 1\n70000\n0", "max too large"),
            ("P2\n1 x\n255\n0", "bad height"),
            ("P3\n4294967295 4294967295\n255\n0\n", "overflowing dimensions"),
            ("P2\n100000 100000\n255\n0\n", "header larger than data"),
        ];
        for (text, label) in cases {
            let err = parse(text, "bad.pgm").unwrap_err();
            assert_eq!(err.category(), "load", "{}", label);
        }
    }

    #[test]
    fn test_render_layout() {
        let grid = parse(GRAY, "gray.pgm").unwrap();
        assert_eq!(render(&grid), GRAY);
    }

    #[test]
    fn test_render_then_parse_keeps_comments_and_samples() {
        let text = "P3\n# one\n# two\n1 2\n255\n1 2 3\n4 5 6\n";
        let grid = parse(text, "c.ppm").unwrap();
        let again = parse(&render(&grid), "c.ppm").unwrap();
        assert_eq!(again, grid);
        assert_eq!(render(&grid), text);
    }
}

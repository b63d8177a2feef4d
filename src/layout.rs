//! Reading order and label-anchored value search
//!
//! A [`Page`] holds the tokens of one page sorted top-to-bottom, left-to-right.
//! Lines are never materialized; "same line" is always decided pairwise with a
//! vertical tolerance band.

use crate::config::ExtractionConfig;
use crate::record::Token;
use regex::Regex;
use std::cmp::Ordering;

/// Reading-order comparator with a vertical tolerance band.
///
/// Tokens more than `line_tolerance` apart vertically sort by descending `y`;
/// otherwise they share a visual line and sort by ascending `x`. The relation
/// is not transitive for chains of near-threshold deltas.
pub fn reading_order(a: &Token, b: &Token, line_tolerance: f32) -> Ordering {
    let y_diff = b.y - a.y;
    if y_diff.abs() > line_tolerance {
        b.y.partial_cmp(&a.y).unwrap_or(Ordering::Equal)
    } else {
        a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal)
    }
}

/// Sort tokens into reading order (stable)
///
/// Insertion sort: `slice::sort_by` may panic on comparators that are not a
/// total order, and [`reading_order`] is not one.
pub fn sort_reading_order(tokens: &mut [Token], line_tolerance: f32) {
    for i in 1..tokens.len() {
        let mut j = i;
        while j > 0 && reading_order(&tokens[j - 1], &tokens[j], line_tolerance) == Ordering::Greater
        {
            tokens.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// One page's tokens in reading order
#[derive(Debug, Clone)]
pub struct Page {
    tokens: Vec<Token>,
    full_text: String,
    config: ExtractionConfig,
}

impl Page {
    pub fn new(mut tokens: Vec<Token>, config: &ExtractionConfig) -> Self {
        sort_reading_order(&mut tokens, config.line_tolerance);
        let full_text = tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            tokens,
            full_text,
            config: config.clone(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// All token text, space-joined in reading order
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// First token whose text matches `pattern`
    pub fn find_label(&self, pattern: &Regex) -> Option<&Token> {
        self.tokens.iter().find(|t| pattern.is_match(&t.text))
    }

    /// Tokens right of `label` on its line, within `max_distance`, in page order
    pub fn same_line_right<'a>(
        &'a self,
        label: &'a Token,
        max_distance: f32,
    ) -> impl Iterator<Item = &'a Token> + 'a {
        let tolerance = self.config.same_line_tolerance;
        self.tokens.iter().filter(move |t| {
            (t.y - label.y).abs() < tolerance && t.x > label.x && (t.x - label.x) < max_distance
        })
    }

    /// Value text for a label: same-line tokens to the right, else the line below.
    pub fn value_after(&self, label: &Token, max_distance: f32) -> String {
        let mut same_line: Vec<&Token> = self.same_line_right(label, max_distance).collect();
        if !same_line.is_empty() {
            same_line.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
            return join_text(&same_line);
        }

        let below: Vec<&Token> = self
            .tokens
            .iter()
            .filter(|t| {
                t.y < label.y
                    && (label.y - t.y) < self.config.below_line_distance
                    && (t.x - label.x).abs() < self.config.below_line_x_tolerance
            })
            .collect();
        join_text(&below)
    }

    /// Locate the first token matching `pattern` and return its value
    pub fn value_after_label(&self, pattern: &Regex) -> String {
        match self.find_label(pattern) {
            Some(label) => self.value_after(label, self.config.max_value_distance),
            None => String::new(),
        }
    }
}

fn join_text(tokens: &[&Token]) -> String {
    tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(tokens: Vec<Token>) -> Page {
        Page::new(tokens, &ExtractionConfig::default())
    }

    fn texts(page: &Page) -> Vec<&str> {
        page.tokens().iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_sort_top_to_bottom_left_to_right() {
        let p = page(vec![
            Token::new("c", 10.0, 100.0),
            Token::new("b", 200.0, 500.0),
            Token::new("a", 10.0, 502.0),
        ]);
        assert_eq!(texts(&p), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_line_tolerance_boundary() {
        // exactly 4 apart is still one line
        let p = page(vec![Token::new("right", 100.0, 504.0), Token::new("left", 10.0, 500.0)]);
        assert_eq!(texts(&p), vec!["left", "right"]);

        let p = page(vec![Token::new("low", 10.0, 500.0), Token::new("high", 100.0, 504.5)]);
        assert_eq!(texts(&p), vec!["high", "low"]);
    }

    #[test]
    fn test_full_text_joined_in_reading_order() {
        let p = page(vec![Token::new("world", 60.0, 700.0), Token::new("hello", 10.0, 700.0)]);
        assert_eq!(p.full_text(), "hello world");
    }

    #[test]
    fn test_sort_tolerates_nan() {
        let mut tokens = vec![
            Token::new("a", f32::NAN, 10.0),
            Token::new("b", 5.0, f32::NAN),
            Token::new("c", 1.0, 20.0),
        ];
        sort_reading_order(&mut tokens, 4.0);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_find_label_none() {
        let p = page(vec![Token::new("Fecha", 10.0, 700.0)]);
        let re = Regex::new("(?i)chofer").unwrap();
        assert!(p.find_label(&re).is_none());
        assert_eq!(p.value_after_label(&re), "");
    }

    #[test]
    fn test_value_same_line() {
        let p = page(vec![
            Token::new("Chofer", 10.0, 600.0),
            Token::new("PEREZ", 150.0, 601.0),
            Token::new("JUAN", 90.0, 599.0),
            Token::new("far away", 400.0, 600.0),
            Token::new("left", 5.0, 600.0),
        ]);
        let re = Regex::new("(?i)chofer").unwrap();
        assert_eq!(p.value_after_label(&re), "JUAN PEREZ");
    }

    #[test]
    fn test_value_below_fallback() {
        let p = page(vec![
            Token::new("Chofer", 100.0, 600.0),
            Token::new("JUAN PEREZ", 120.0, 588.0),
            Token::new("too far down", 100.0, 570.0),
            Token::new("too far right", 250.0, 590.0),
        ]);
        let re = Regex::new("(?i)chofer").unwrap();
        assert_eq!(p.value_after_label(&re), "JUAN PEREZ");
    }

    #[test]
    fn test_value_missing() {
        let p = page(vec![Token::new("Chofer", 100.0, 600.0)]);
        let label = p.tokens()[0].clone();
        assert_eq!(p.value_after(&label, 300.0), "");
    }
}

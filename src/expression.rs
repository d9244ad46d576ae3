// SPDX-License-Identifier: GPL-3.0-only
//! Brightness expression grammar
//!
//! Turns strings such as `50%`, `+10%`, `10%-`, `+0.1`, `0.1-` or `0.5` into a
//! target brightness relative to the current one. The result is not clamped;
//! clamping belongs to the controller.

use crate::error::ExpressionError;

/// Evaluate `expression` against `current` (normalized 0.0-1.0)
///
/// Forms are checked in order: `<p>%-`, `+<p>%`, `<p>%`, `+<n>`, `<n>-`,
/// then a plain number.
pub fn evaluate(current: f64, expression: &str) -> Result<f64, ExpressionError> {
    let expr = expression.trim();

    if let Some(percent) = expr.strip_suffix("%-") {
        return Ok(current - number(percent, expression)? / 100.0);
    }
    if let Some(percent) = expr.strip_prefix('+').and_then(|s| s.strip_suffix('%')) {
        return Ok(current + number(percent, expression)? / 100.0);
    }
    if let Some(percent) = expr.strip_suffix('%') {
        return Ok(number(percent, expression)? / 100.0);
    }
    if let Some(delta) = expr.strip_prefix('+') {
        return Ok(current + number(delta, expression)?);
    }
    if let Some(delta) = expr.strip_suffix('-') {
        return Ok(current - number(delta, expression)?);
    }

    if expr.contains(['%', '-', '+']) {
        return Err(ExpressionError::InvalidFormat {
            expression: expression.to_string(),
        });
    }

    number(expr, expression)
}

fn number(text: &str, expression: &str) -> Result<f64, ExpressionError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| {
            // "1-2%" passes the suffix check but is malformed, not a bad number
            if text.contains(['%', '-', '+']) {
                ExpressionError::InvalidFormat {
                    expression: expression.to_string(),
                }
            } else {
                ExpressionError::InvalidNumber {
                    expression: expression.to_string(),
                }
            }
        })
}

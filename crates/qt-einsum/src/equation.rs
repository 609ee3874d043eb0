use std::fmt;

use crate::error::{EinsumError, Result};

/// One side of an einsum equation: an ordered list of index labels with an
/// optional ellipsis marking where unnamed axes sit.
///
/// For the spec `"...x"`, `labels` is `['x']` and `ellipsis` is `Some(0)`:
/// the unnamed axes come before the `x` axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandSpec {
    /// Named index labels in order, ellipsis not included.
    pub labels: Vec<char>,
    /// Position within `labels` where the ellipsis sits, if present.
    pub ellipsis: Option<usize>,
}

impl OperandSpec {
    /// Number of named (non-ellipsis) axes.
    pub fn named(&self) -> usize {
        self.labels.len()
    }

    /// True if this spec carries an ellipsis.
    pub fn has_ellipsis(&self) -> bool {
        self.ellipsis.is_some()
    }
}

impl fmt::Display for OperandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.labels.iter().enumerate() {
            if self.ellipsis == Some(i) {
                write!(f, "...")?;
            }
            write!(f, "{}", label)?;
        }
        if self.ellipsis == Some(self.labels.len()) {
            write!(f, "...")?;
        }
        Ok(())
    }
}

/// A parsed two-operand einsum equation with an explicit output spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equation {
    pub lhs: OperandSpec,
    pub rhs: OperandSpec,
    pub out: OperandSpec,
}

/// Parse an einsum equation of the form `"<lhs>,<rhs>-><out>"`.
///
/// Index labels are ASCII letters; `...` may appear at most once per spec.
/// Whitespace between tokens is ignored. The output spec may be empty
/// (scalar output). Each named label may appear at most once per spec,
/// and every output label must appear in at least one operand.
pub fn parse(eqn: &str) -> Result<Equation> {
    let (inputs, out_text) = eqn
        .split_once("->")
        .ok_or_else(|| EinsumError::MissingArrow(eqn.to_string()))?;

    let operands: Vec<&str> = inputs.split(',').collect();
    if operands.len() != 2 {
        return Err(EinsumError::OperandCount {
            got: operands.len(),
        });
    }

    let lhs = parse_spec(operands[0])?;
    let rhs = parse_spec(operands[1])?;
    let out = parse_spec(out_text)?;

    for &label in &out.labels {
        if !lhs.labels.contains(&label) && !rhs.labels.contains(&label) {
            return Err(EinsumError::UnknownOutputLabel { label });
        }
    }
    if out.has_ellipsis() && !lhs.has_ellipsis() && !rhs.has_ellipsis() {
        return Err(EinsumError::UnexpectedOutputEllipsis);
    }

    Ok(Equation { lhs, rhs, out })
}

fn parse_spec(text: &str) -> Result<OperandSpec> {
    let mut labels = Vec::new();
    let mut ellipsis = None;

    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '.' {
            if i + 2 >= chars.len() || chars[i + 1] != '.' || chars[i + 2] != '.' {
                return Err(EinsumError::InvalidLabel {
                    ch,
                    spec: text.trim().to_string(),
                });
            }
            if ellipsis.is_some() {
                return Err(EinsumError::MultipleEllipses {
                    spec: text.trim().to_string(),
                });
            }
            ellipsis = Some(labels.len());
            i += 3;
        } else if ch.is_ascii_alphabetic() {
            if labels.contains(&ch) {
                return Err(EinsumError::RepeatedLabel {
                    label: ch,
                    spec: text.trim().to_string(),
                });
            }
            labels.push(ch);
            i += 1;
        } else {
            return Err(EinsumError::InvalidLabel {
                ch,
                spec: text.trim().to_string(),
            });
        }
    }

    Ok(OperandSpec { labels, ellipsis })
}

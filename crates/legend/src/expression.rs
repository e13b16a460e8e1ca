use serde_json::Value;

/// Offset of the first `(input, output)` pair in `interpolate` and `step`.
///
/// `["interpolate", ["linear"], input, v1, o1, ...]`
/// `["step", input, base, v1, o1, ...]`
pub const RAMP_PAIRS_OFFSET: usize = 3;

/// The paint expression forms a legend can summarize.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A single uniform value.
    Literal(Value),
    Interpolate { stops: Vec<(Value, Value)> },
    /// `base` applies below the first stop and has no input value.
    Step { base: Value, stops: Vec<(Value, Value)> },
    Match {
        cases: Vec<(Value, Value)>,
        fallback: Option<Value>,
    },
    /// Branch outputs in order, fallback last. Conditions are not kept.
    Case { outputs: Vec<Value> },
    Unknown(String),
}

impl Expression {
    pub fn parse(value: &Value) -> Self {
        let Value::Array(items) = value else {
            return Expression::Literal(value.clone());
        };
        let Some(head) = items.first().and_then(Value::as_str) else {
            // A bare JSON array is data, not an expression.
            return Expression::Literal(value.clone());
        };
        match head {
            "literal" => Expression::Literal(items.get(1).cloned().unwrap_or(Value::Null)),
            "interpolate" | "interpolate-hcl" | "interpolate-lab" => Expression::Interpolate {
                stops: pairs(items.get(RAMP_PAIRS_OFFSET..).unwrap_or_default()),
            },
            "step" => Expression::Step {
                base: items.get(2).cloned().unwrap_or(Value::Null),
                stops: pairs(items.get(RAMP_PAIRS_OFFSET..).unwrap_or_default()),
            },
            "match" => {
                let args = items.get(2..).unwrap_or_default();
                // Odd argument count: the trailing value is the fallback.
                let (cases, fallback) = match args.len() % 2 {
                    1 => (&args[..args.len() - 1], args.last().cloned()),
                    _ => (args, None),
                };
                Expression::Match {
                    cases: pairs(cases),
                    fallback,
                }
            }
            "case" => {
                let args = items.get(1..).unwrap_or_default();
                let mut outputs: Vec<Value> = args.chunks_exact(2).map(|c| c[1].clone()).collect();
                if args.len() % 2 == 1
                    && let Some(fallback) = args.last()
                {
                    outputs.push(fallback.clone());
                }
                Expression::Case { outputs }
            }
            other => Expression::Unknown(other.to_string()),
        }
    }
}

fn pairs(items: &[Value]) -> Vec<(Value, Value)> {
    items
        .chunks_exact(2)
        .map(|c| (c[0].clone(), c[1].clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::Expression;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_ramps_from_fixed_offset() {
        let e = Expression::parse(&json!([
            "interpolate", ["linear"], ["get", "value"], 0, "#fff", 100, "#000"
        ]));
        assert_eq!(
            e,
            Expression::Interpolate {
                stops: vec![(json!(0), json!("#fff")), (json!(100), json!("#000"))]
            }
        );

        let e = Expression::parse(&json!(["step", ["get", "value"], "#eee", 10, "#aaa", 20, "#555"]));
        assert_eq!(
            e,
            Expression::Step {
                base: json!("#eee"),
                stops: vec![(json!(10), json!("#aaa")), (json!(20), json!("#555"))]
            }
        );
    }

    #[test]
    fn match_separates_fallback() {
        let e = Expression::parse(&json!(["match", ["get", "kind"], "a", "red", ["b", "c"], "blue", "gray"]));
        assert_eq!(
            e,
            Expression::Match {
                cases: vec![(json!("a"), json!("red")), (json!(["b", "c"]), json!("blue"))],
                fallback: Some(json!("gray")),
            }
        );
    }

    #[test]
    fn case_keeps_outputs_only() {
        let e = Expression::parse(&json!([
            "case",
            ["<", ["get", "v"], 0], "blue",
            [">", ["get", "v"], 0], "red",
            "white"
        ]));
        assert_eq!(
            e,
            Expression::Case {
                outputs: vec![json!("blue"), json!("red"), json!("white")]
            }
        );
    }

    #[test]
    fn literals_and_unknown_heads() {
        assert_eq!(Expression::parse(&json!("#ff0000")), Expression::Literal(json!("#ff0000")));
        assert_eq!(Expression::parse(&json!(["literal", 3])), Expression::Literal(json!(3)));
        assert_eq!(
            Expression::parse(&json!(["coalesce", 1, 2])),
            Expression::Unknown("coalesce".into())
        );
    }
}
